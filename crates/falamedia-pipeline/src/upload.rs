//! Upload coordination: asset bytes to the bucket, public URL back.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use falamedia_core::{MediaAsset, PipelineError};
use falamedia_storage::Storage;

/// Reads the local asset, decodes it for transport, pushes it to the bucket
/// with upsert semantics, and resolves the permanent public URL.
///
/// The remote write is bounded by a timeout; the write itself is atomic
/// from the caller's perspective (the object exists fully or not at all),
/// so there is no partial cleanup on failure.
pub struct UploadCoordinator {
    storage: Arc<dyn Storage>,
    timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(storage: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { storage, timeout }
    }

    /// Upload the asset at `storage_key` and return its public URL.
    pub async fn upload(
        &self,
        asset: &MediaAsset,
        storage_key: &str,
    ) -> Result<String, PipelineError> {
        let data = match asset.base64_payload.as_deref() {
            Some(payload) => base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| PipelineError::Upload(format!("invalid base64 payload: {}", e)))?,
            None => tokio::fs::read(&asset.local_uri).await.map_err(|e| {
                PipelineError::Upload(format!(
                    "could not read {}: {}",
                    asset.local_uri.display(),
                    e
                ))
            })?,
        };

        let content_type = format!("image/{}", asset.extension());

        let url = tokio::time::timeout(
            self.timeout,
            self.storage.upload_with_key(storage_key, data, &content_type),
        )
        .await
        .map_err(|_| {
            PipelineError::Upload(format!(
                "upload timed out after {}s",
                self.timeout.as_secs()
            ))
        })??;

        Ok(url)
    }
}
