//! Domain models for the media ingestion pipeline.
//!
//! Everything here is transient: a [`MediaAsset`] and its derived values
//! exist only within one pipeline invocation and are discarded after the
//! upload completes or fails.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_IMAGE_EXTENSION;

/// Which kind of remote record receives the resulting image URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    UserProfile,
    ChildProfile,
    VocabularyItem,
}

impl OwnerKind {
    /// Bucket scope objects for this owner kind are stored under.
    pub fn scope(self) -> &'static str {
        match self {
            OwnerKind::UserProfile | OwnerKind::ChildProfile => {
                crate::constants::PROFILE_PHOTO_SCOPE
            }
            OwnerKind::VocabularyItem => crate::constants::VOCABULARY_IMAGE_SCOPE,
        }
    }

    /// Table holding the owning record.
    pub fn table(self) -> &'static str {
        match self {
            OwnerKind::UserProfile | OwnerKind::ChildProfile => "profiles",
            OwnerKind::VocabularyItem => "vocabulary_items",
        }
    }

    /// Column conventionally bound to the resolved URL.
    pub fn binding_column(self) -> &'static str {
        match self {
            OwnerKind::UserProfile | OwnerKind::ChildProfile => "avatar_url",
            OwnerKind::VocabularyItem => "image_url",
        }
    }
}

/// Identifies the record that will hold the uploaded image's URL.
/// Immutable for the duration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: OwnerKind,
    pub key: String,
}

impl OwnerReference {
    pub fn new(kind: OwnerKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for OwnerReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.table(), self.key)
    }
}

/// A captured (or re-encoded) local image awaiting upload.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// Location of the asset on the local filesystem.
    pub local_uri: PathBuf,
    /// On-disk size in bytes as reported at capture time.
    pub byte_size: u64,
    /// Content type, when the capture path reports one.
    pub mime_type: Option<String>,
    /// Transport-ready payload, when the picker was asked for one.
    pub base64_payload: Option<String>,
}

impl MediaAsset {
    /// File extension used for the storage path and content-type header.
    ///
    /// Derived from the content type when known, else from the local path,
    /// else `jpg` (some capture paths report neither).
    pub fn extension(&self) -> &str {
        if let Some(mime) = self.mime_type.as_deref() {
            match mime.to_ascii_lowercase().as_str() {
                "image/jpeg" | "image/jpg" => return "jpg",
                "image/png" => return "png",
                "image/gif" => return "gif",
                _ => {}
            }
        }
        match Path::new(&self.local_uri)
            .extension()
            .and_then(|e| e.to_str())
        {
            Some(ext) if matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg") => "jpg",
            Some(ext) if ext.eq_ignore_ascii_case("png") => "png",
            Some(ext) if ext.eq_ignore_ascii_case("gif") => "gif",
            _ => DEFAULT_IMAGE_EXTENSION,
        }
    }
}

/// Which host picker to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Camera,
    Library,
    /// Let the host surface its own camera-or-library chooser.
    PromptUser,
}

/// Pass-through configuration for the host picker.
///
/// `quality` is a 0-1 hint honored by the picker itself, independent of the
/// pipeline's own re-encoding step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub mode: CaptureMode,
    pub allow_editing: bool,
    pub aspect_ratio: (u32, u32),
    pub quality: f32,
    pub wants_base64: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Library,
            allow_editing: true,
            aspect_ratio: (1, 1),
            quality: 0.7,
            wants_base64: true,
        }
    }
}

/// Coarse pipeline stages reported to an optional progress sink.
/// Transitions are forward-only; a failed run restarts the caller at Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    PermissionCheck,
    Capturing,
    Validating,
    Compressing,
    Uploading,
    Binding,
    Done,
}

/// Terminal value of a successful (or user-cancelled) pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PipelineOutcome {
    /// The image is durably stored and its URL bound to the owner record.
    Completed {
        public_url: String,
        storage_key: String,
    },
    /// The user dismissed the picker. Not an error; no upload was made.
    Cancelled,
}

/// Flat URL-or-error shape consumed by UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub url: Option<String>,
    pub error: Option<String>,
}

impl UploadResult {
    pub fn from_run(result: &Result<PipelineOutcome, crate::PipelineError>) -> Self {
        match result {
            Ok(PipelineOutcome::Completed { public_url, .. }) => Self {
                url: Some(public_url.clone()),
                error: None,
            },
            Ok(PipelineOutcome::Cancelled) => Self {
                url: None,
                error: None,
            },
            Err(e) => Self {
                url: None,
                error: Some(e.to_string()),
            },
        }
    }
}
