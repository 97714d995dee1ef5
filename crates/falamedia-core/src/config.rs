//! Configuration module
//!
//! Process configuration for the pipeline: storage backend, database, and
//! the pipeline's fixed limits. Loaded once at startup from the environment;
//! a missing remote endpoint or credential is a fatal startup error, never a
//! pipeline-time error.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants;

const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 60;

/// Supported object-storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            other => Err(anyhow::anyhow!("unknown storage backend: {}", other)),
        }
    }
}

/// Process configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Pipeline limits
    pub max_image_size_bytes: u64,
    pub compression_threshold_bytes: u64,
    pub jpeg_quality: u8,
    pub upload_timeout: Duration,
    /// Best-effort delete of the uploaded object when the binding write
    /// fails. Off by default: the observed client behavior leaves the
    /// orphaned object in place.
    pub compensate_on_bind_failure: bool,
}

impl Config {
    /// Load configuration from the environment (and `.env` when present).
    ///
    /// Returns an error when the database URL or the selected backend's
    /// settings are absent; callers are expected to treat that as fatal.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL not configured"))?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<StorageBackend>()?;

        let max_image_size_bytes = env::var("MAX_IMAGE_SIZE_MB")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(constants::MAX_IMAGE_SIZE_BYTES);

        let compression_threshold_bytes = env::var("COMPRESSION_THRESHOLD_KB")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|kb| kb * 1024)
            .unwrap_or(constants::COMPRESSION_THRESHOLD_BYTES);

        let jpeg_quality = env::var("JPEG_QUALITY")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(constants::JPEG_QUALITY)
            .clamp(1, 100);

        let upload_timeout = Duration::from_secs(
            env::var("UPLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS),
        );

        let compensate_on_bind_failure = env::var("COMPENSATE_ON_BIND_FAILURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Config {
            database_url,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok().or(env::var("AWS_REGION").ok()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            max_image_size_bytes,
            compression_threshold_bytes,
            jpeg_quality,
            upload_timeout,
            compensate_on_bind_failure,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the selected backend has everything it needs.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    anyhow::bail!("S3_BUCKET not configured");
                }
                if self.s3_region.is_none() {
                    anyhow::bail!("S3_REGION or AWS_REGION not configured");
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_PATH not configured");
                }
                if self.local_storage_base_url.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_BASE_URL not configured");
                }
            }
        }
        Ok(())
    }
}
