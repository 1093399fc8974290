//! Artifact storage for encoded renditions and thumbnails.
//!
//! This crate provides:
//! - An S3 client for uploads and connectivity checks
//! - Storage configuration from the environment
//! - The `ArtifactPublisher` seam with remote (S3) and local variants

pub mod client;
pub mod config;
pub mod error;
pub mod publisher;

pub use client::S3Client;
pub use config::{StorageBackend, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use publisher::{
    build_publisher, ArtifactKind, ArtifactPublisher, LocalPublisher, RemotePublisher,
};
