//! Publication of finished artifacts.
//!
//! The backend is chosen once at startup. Remote publication uploads under
//! `videos/` and `thumbnails/`; local publication only computes a URL under
//! `/processed/` for a file that already sits in the processed directory.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::client::S3Client;
use crate::config::{StorageBackend, StorageConfig};
use crate::error::{StorageError, StorageResult};

/// What is being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// An encoded rendition (MP4)
    Rendition,
    /// The job thumbnail (JPEG)
    Thumbnail,
}

impl ArtifactKind {
    /// Object key for `filename` under this kind's prefix.
    pub fn object_key(&self, filename: &str) -> String {
        match self {
            ArtifactKind::Rendition => format!("videos/{}", filename),
            ArtifactKind::Thumbnail => format!("thumbnails/{}", filename),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Rendition => "video/mp4",
            ArtifactKind::Thumbnail => "image/jpeg",
        }
    }
}

/// Makes a finished file reachable and returns its public URL.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Publish `local_path` as `filename`, returning the public URL.
    async fn publish(
        &self,
        local_path: &Path,
        filename: &str,
        kind: ArtifactKind,
    ) -> StorageResult<String>;

    /// True if publishing involves a network upload.
    fn is_remote(&self) -> bool;

    /// Check the backend is usable.
    async fn check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Uploads to an S3 bucket.
pub struct RemotePublisher {
    client: S3Client,
    base_url: String,
}

impl RemotePublisher {
    pub fn new(client: S3Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Public URL for an object key.
    pub fn url_for(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}

#[async_trait]
impl ArtifactPublisher for RemotePublisher {
    async fn publish(
        &self,
        local_path: &Path,
        filename: &str,
        kind: ArtifactKind,
    ) -> StorageResult<String> {
        let key = kind.object_key(filename);
        self.client
            .upload_file(local_path, &key, kind.content_type())
            .await?;
        Ok(self.url_for(&key))
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn check(&self) -> StorageResult<()> {
        self.client.check_connectivity().await
    }
}

/// Serves artifacts from the processed directory of this service.
#[derive(Debug, Clone)]
pub struct LocalPublisher {
    base_url: String,
}

impl LocalPublisher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ArtifactPublisher for LocalPublisher {
    async fn publish(
        &self,
        local_path: &Path,
        filename: &str,
        _kind: ArtifactKind,
    ) -> StorageResult<String> {
        if !tokio::fs::try_exists(local_path).await? {
            return Err(StorageError::not_found(local_path.display().to_string()));
        }
        Ok(join_url(&self.base_url, &format!("processed/{}", filename)))
    }

    fn is_remote(&self) -> bool {
        false
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Construct the publisher selected by `config`.
pub async fn build_publisher(config: &StorageConfig) -> StorageResult<Arc<dyn ArtifactPublisher>> {
    match config.backend {
        StorageBackend::S3 => {
            let client = S3Client::new(config).await?;
            info!(bucket = client.bucket(), "Publishing artifacts to S3");
            Ok(Arc::new(RemotePublisher::new(client, config.remote_base_url())))
        }
        StorageBackend::Local => {
            info!(base_url = %config.local_base_url, "Serving artifacts locally");
            Ok(Arc::new(LocalPublisher::new(config.local_base_url.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys() {
        assert_eq!(
            ArtifactKind::Rendition.object_key("v1_720p.mp4"),
            "videos/v1_720p.mp4"
        );
        assert_eq!(
            ArtifactKind::Thumbnail.object_key("v1_thumbnail.jpg"),
            "thumbnails/v1_thumbnail.jpg"
        );
    }

    #[tokio::test]
    async fn test_local_url_for_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1_240p.mp4");
        std::fs::write(&path, b"mp4").unwrap();

        let publisher = LocalPublisher::new("http://localhost:5000/");
        let url = publisher
            .publish(&path, "v1_240p.mp4", ArtifactKind::Rendition)
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:5000/processed/v1_240p.mp4");
        assert!(!publisher.is_remote());
    }

    #[tokio::test]
    async fn test_local_missing_thumbnail_has_no_url() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = LocalPublisher::new("http://localhost:5000");
        let err = publisher
            .publish(
                &dir.path().join("v1_thumbnail.jpg"),
                "v1_thumbnail.jpg",
                ArtifactKind::Thumbnail,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remote_urls() {
        let config = StorageConfig {
            backend: StorageBackend::S3,
            bucket: "vidiox-videos".to_string(),
            access_key_id: Some("test".to_string()),
            secret_access_key: Some("test".to_string()),
            ..StorageConfig::default()
        };
        let client = S3Client::new(&config).await.unwrap();
        let publisher = RemotePublisher::new(client, config.remote_base_url());

        assert!(publisher.is_remote());
        assert_eq!(
            publisher.url_for(&ArtifactKind::Thumbnail.object_key("v1_thumbnail.jpg")),
            "https://vidiox-videos.s3.amazonaws.com/thumbnails/v1_thumbnail.jpg"
        );
    }
}
