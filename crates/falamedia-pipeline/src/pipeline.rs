//! The pipeline orchestrator.
//!
//! Sequences permission check, capture, validation, conditional
//! re-encoding, storage upload, and the binding write. States move forward
//! only: `Idle → PermissionCheck → Capturing → Validating → Compressing? →
//! Uploading → Binding → Done | Failed`, with `Cancelled` as a terminal
//! state distinct from `Failed`. There is no retry-from-middle; a failed run
//! restarts the caller at `Idle`.

use std::sync::Arc;

use falamedia_core::{
    BindingStore, CaptureOptions, Config, OwnerKind, OwnerReference, PipelineError,
    PipelineOutcome, PipelineStage, constants,
};
use falamedia_processing::{CompressionEngine, SizeValidator};
use falamedia_storage::{keys, Storage};

use crate::capture::{Capture, CaptureSource};
use crate::permissions::{PermissionBroker, PermissionHost};
use crate::single_flight::SingleFlight;
use crate::upload::UploadCoordinator;

/// Progress callback for UI surfaces; reports coarse stage transitions so a
/// caller can render a spinner or percentage without polling.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, owner: &OwnerReference, stage: PipelineStage);
}

/// Pipeline tuning knobs, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_image_size_bytes: u64,
    pub compression_threshold_bytes: u64,
    pub jpeg_quality: u8,
    pub upload_timeout: std::time::Duration,
    pub compensate_on_bind_failure: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_image_size_bytes: constants::MAX_IMAGE_SIZE_BYTES,
            compression_threshold_bytes: constants::COMPRESSION_THRESHOLD_BYTES,
            jpeg_quality: constants::JPEG_QUALITY,
            upload_timeout: std::time::Duration::from_secs(60),
            compensate_on_bind_failure: false,
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_image_size_bytes: config.max_image_size_bytes,
            compression_threshold_bytes: config.compression_threshold_bytes,
            jpeg_quality: config.jpeg_quality,
            upload_timeout: config.upload_timeout,
            compensate_on_bind_failure: config.compensate_on_bind_failure,
        }
    }
}

/// The media ingestion and storage-binding pipeline.
///
/// One instance serves the whole process; runs for different owners proceed
/// concurrently, runs for the same owner key are single-flighted.
pub struct MediaPipeline {
    permissions: PermissionBroker,
    capture: Arc<dyn CaptureSource>,
    validator: SizeValidator,
    compressor: CompressionEngine,
    uploader: UploadCoordinator,
    storage: Arc<dyn Storage>,
    bindings: Arc<dyn BindingStore>,
    flight: SingleFlight,
    compensate_on_bind_failure: bool,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl MediaPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        bindings: Arc<dyn BindingStore>,
        capture: Arc<dyn CaptureSource>,
        permission_host: Arc<dyn PermissionHost>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            permissions: PermissionBroker::new(permission_host),
            capture,
            validator: SizeValidator::new(settings.max_image_size_bytes),
            compressor: CompressionEngine::new(
                settings.compression_threshold_bytes,
                settings.jpeg_quality,
            ),
            uploader: UploadCoordinator::new(storage.clone(), settings.upload_timeout),
            storage,
            bindings,
            flight: SingleFlight::new(),
            compensate_on_bind_failure: settings.compensate_on_bind_failure,
            progress: None,
        }
    }

    /// Attach a progress sink. Call before wrapping the pipeline in an `Arc`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    fn emit(&self, owner: &OwnerReference, stage: PipelineStage) {
        if let Some(sink) = &self.progress {
            sink.stage(owner, stage);
        }
    }

    /// Run the pipeline for one owner.
    ///
    /// `item_name` is required for vocabulary-item owners (it names the
    /// stored object) and ignored otherwise. A second call for an owner key
    /// already in flight awaits the first call's result.
    pub async fn run(
        self: &Arc<Self>,
        owner: OwnerReference,
        item_name: Option<String>,
        options: CaptureOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        if owner.key.is_empty() {
            return Err(PipelineError::Configuration("empty owner key".to_string()));
        }

        let this = Arc::clone(self);
        let key = owner.key.clone();
        self.flight
            .run(&key, async move { this.run_inner(owner, item_name, options).await })
            .await
    }

    /// Update a caregiver's own profile photo.
    pub async fn update_profile_photo(
        self: &Arc<Self>,
        user_key: &str,
        options: CaptureOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.run(
            OwnerReference::new(OwnerKind::UserProfile, user_key),
            None,
            options,
        )
        .await
    }

    /// Update a child profile's photo.
    pub async fn update_child_photo(
        self: &Arc<Self>,
        child_key: &str,
        options: CaptureOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.run(
            OwnerReference::new(OwnerKind::ChildProfile, child_key),
            None,
            options,
        )
        .await
    }

    /// Upload the image for a custom vocabulary item.
    pub async fn upload_vocabulary_image(
        self: &Arc<Self>,
        item_key: &str,
        item_name: &str,
        options: CaptureOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.run(
            OwnerReference::new(OwnerKind::VocabularyItem, item_key),
            Some(item_name.to_string()),
            options,
        )
        .await
    }

    #[tracing::instrument(skip(self, options), fields(owner = %owner))]
    async fn run_inner(
        &self,
        owner: OwnerReference,
        item_name: Option<String>,
        options: CaptureOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.emit(&owner, PipelineStage::PermissionCheck);
        if !self.permissions.ensure().await {
            return Err(PipelineError::PermissionDenied);
        }

        self.emit(&owner, PipelineStage::Capturing);
        let asset = match self.capture.capture(options.mode, &options).await? {
            Capture::Asset(asset) => asset,
            Capture::Cancelled => {
                tracing::info!(owner = %owner, "picker dismissed, run cancelled");
                return Ok(PipelineOutcome::Cancelled);
            }
        };

        self.emit(&owner, PipelineStage::Validating);
        self.validator
            .validate(asset.byte_size, asset.mime_type.as_deref())?;

        self.emit(&owner, PipelineStage::Compressing);
        let prepared = self.compressor.compress_if_needed(&asset).await;
        let reencoded_tmp =
            (prepared.local_uri != asset.local_uri).then(|| prepared.local_uri.clone());

        let storage_key = keys::object_key(
            &owner,
            item_name.as_deref(),
            chrono::Utc::now().timestamp_millis(),
            prepared.extension(),
        )?;

        self.emit(&owner, PipelineStage::Uploading);
        let uploaded = self.uploader.upload(&prepared, &storage_key).await;

        // The re-encoded temp file is transient to this run; drop it whether
        // or not the upload went through.
        if let Some(tmp) = reencoded_tmp {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                tracing::debug!(path = %tmp.display(), error = %e, "temp file cleanup failed");
            }
        }

        let public_url = uploaded?;

        self.emit(&owner, PipelineStage::Binding);
        if let Err(bind_err) = self.bindings.bind_image_url(&owner, &public_url).await {
            self.handle_bind_failure(&owner, &storage_key).await;
            return Err(bind_err.into());
        }

        self.emit(&owner, PipelineStage::Done);
        tracing::info!(owner = %owner, key = %storage_key, "image stored and bound");
        Ok(PipelineOutcome::Completed {
            public_url,
            storage_key,
        })
    }

    /// The upload and the binding write are two phases with no transaction
    /// across them. By default a binding failure leaves the uploaded object
    /// in place (the bucket is keyed by owner, so a later successful run
    /// simply supersedes it); with compensation enabled the object is
    /// deleted best-effort instead.
    async fn handle_bind_failure(&self, owner: &OwnerReference, storage_key: &str) {
        if self.compensate_on_bind_failure {
            match self.storage.delete(storage_key).await {
                Ok(()) => {
                    tracing::info!(owner = %owner, key = %storage_key, "compensating delete after binding failure")
                }
                Err(e) => {
                    tracing::warn!(owner = %owner, key = %storage_key, error = %e, "compensating delete failed, object orphaned")
                }
            }
        } else {
            tracing::error!(owner = %owner, key = %storage_key, "binding failed after upload, object left in bucket");
        }
    }
}
