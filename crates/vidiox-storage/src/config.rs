//! Storage configuration.

use std::str::FromStr;

use crate::error::{StorageError, StorageResult};

/// Where finished artifacts are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Upload to an S3-compatible bucket
    S3,
    /// Serve from the processed-output directory
    Local,
}

impl FromStr for StorageBackend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            other => Err(StorageError::config_error(format!(
                "unknown STORAGE_BACKEND '{}' (expected s3 or local)",
                other
            ))),
        }
    }
}

/// Configuration for artifact publication.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Selected backend
    pub backend: StorageBackend,
    /// Bucket name
    pub bucket: String,
    /// Region
    pub region: String,
    /// Custom S3 API endpoint (MinIO, R2, ...)
    pub endpoint_url: Option<String>,
    /// Base for public object URLs; defaults to the virtual-hosted bucket URL
    pub public_base_url: Option<String>,
    /// Static access key, when not using the default provider chain
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
    /// Base URL of this service, used for local artifact URLs
    pub local_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "vidiox-videos".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            public_base_url: None,
            access_key_id: None,
            secret_access_key: None,
            local_base_url: "http://localhost:5000".to_string(),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let access_key_id = var("AWS_ACCESS_KEY_ID");
        let secret_access_key = var("AWS_SECRET_ACCESS_KEY");
        let bucket = var("S3_BUCKET");

        let backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None if access_key_id.is_some() || bucket.is_some() => StorageBackend::S3,
            None => StorageBackend::Local,
        };

        Ok(Self {
            backend,
            bucket: bucket.unwrap_or(defaults.bucket),
            region: var("S3_REGION")
                .or_else(|| var("AWS_REGION"))
                .unwrap_or(defaults.region),
            endpoint_url: var("S3_ENDPOINT_URL"),
            public_base_url: var("S3_PUBLIC_BASE_URL"),
            access_key_id,
            secret_access_key,
            local_base_url: var("PUBLIC_BASE_URL").unwrap_or(defaults.local_base_url),
        })
    }

    /// Base of public object URLs for the remote backend.
    pub fn remote_base_url(&self) -> String {
        match &self.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3.amazonaws.com", self.bucket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> StorageResult<StorageConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StorageConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_to_local_without_credentials() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.backend, StorageBackend::Local);
        assert_eq!(cfg.bucket, "vidiox-videos");
        assert_eq!(cfg.local_base_url, "http://localhost:5000");
    }

    #[test]
    fn test_credentials_or_bucket_select_s3() {
        let cfg = config(&[("AWS_ACCESS_KEY_ID", "AKIA"), ("AWS_SECRET_ACCESS_KEY", "s")]).unwrap();
        assert_eq!(cfg.backend, StorageBackend::S3);

        let cfg = config(&[("S3_BUCKET", "media")]).unwrap();
        assert_eq!(cfg.backend, StorageBackend::S3);
        assert_eq!(cfg.remote_base_url(), "https://media.s3.amazonaws.com");
    }

    #[test]
    fn test_explicit_backend_wins() {
        let cfg = config(&[("S3_BUCKET", "media"), ("STORAGE_BACKEND", "LOCAL")]).unwrap();
        assert_eq!(cfg.backend, StorageBackend::Local);
        assert!(config(&[("STORAGE_BACKEND", "gcs")]).is_err());
    }

    #[test]
    fn test_public_base_url_override() {
        let cfg = config(&[("S3_PUBLIC_BASE_URL", "https://cdn.example.com/")]).unwrap();
        assert_eq!(cfg.remote_base_url(), "https://cdn.example.com");
    }
}
