//! Capture seam: drives the host camera/library chooser and normalizes
//! its result into a [`MediaAsset`].
//!
//! Dismissing the picker is [`Capture::Cancelled`], not an error; callers
//! must not surface an error dialog for it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use falamedia_core::{CaptureMode, CaptureOptions, MediaAsset, PipelineError};

/// Normalized picker result.
#[derive(Debug, Clone)]
pub enum Capture {
    Asset(MediaAsset),
    /// The user dismissed the picker.
    Cancelled,
}

/// Host seam for the camera/library pickers. Options are pass-through;
/// `quality` is a 0-1 hint honored by the picker itself, independent of the
/// pipeline's re-encoding step.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn capture(
        &self,
        mode: CaptureMode,
        options: &CaptureOptions,
    ) -> Result<Capture, PipelineError>;
}

/// Capture source backed by a file on disk.
///
/// The library-mode source for hosts without pickers (the CLI, tests): the
/// "chosen" image is the configured path. Reads the asset's size and infers
/// its content type from the extension; encodes a transport payload when
/// the options ask for one.
pub struct FileCaptureSource {
    path: PathBuf,
}

impl FileCaptureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn mime_from_path(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg".to_string()),
        "png" => Some("image/png".to_string()),
        "gif" => Some("image/gif".to_string()),
        _ => None,
    }
}

#[async_trait]
impl CaptureSource for FileCaptureSource {
    async fn capture(
        &self,
        _mode: CaptureMode,
        options: &CaptureOptions,
    ) -> Result<Capture, PipelineError> {
        let meta = tokio::fs::metadata(&self.path).await.map_err(|e| {
            PipelineError::Capture(format!("{}: {}", self.path.display(), e))
        })?;

        let base64_payload = if options.wants_base64 {
            let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
                PipelineError::Capture(format!("{}: {}", self.path.display(), e))
            })?;
            Some(base64::engine::general_purpose::STANDARD.encode(bytes))
        } else {
            None
        };

        Ok(Capture::Asset(MediaAsset {
            local_uri: self.path.clone(),
            byte_size: meta.len(),
            mime_type: mime_from_path(&self.path),
            base64_payload,
        }))
    }
}
