//! Error types module
//!
//! The pipeline's terminal error taxonomy. Every variant renders as a
//! human-readable string for the invoking UI; none carry retry state.
//!
//! Variants hold owned strings rather than source errors so that a pipeline
//! result can be cloned and handed to every caller sharing a single-flight
//! run. Crate-local errors (`StorageError`, `ValidationError`, ...) convert
//! into `PipelineError` at the crate boundary via `From`.

/// Terminal pipeline errors.
///
/// User dismissal of the picker is *not* an error; it is the
/// [`PipelineOutcome::Cancelled`](crate::models::PipelineOutcome) terminal
/// state and callers must not surface an error dialog for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The user declined the camera/library permission prompt.
    /// Recoverable: a later run re-prompts.
    #[error("camera or photo library access was denied")]
    PermissionDenied,

    /// The host picker failed (distinct from the user dismissing it).
    #[error("capture failed: {0}")]
    Capture(String),

    /// Size/format rules rejected the asset. Terminal for this attempt;
    /// the user must pick a different image.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Read, decode, or remote-write failure during the storage push.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The database write after a successful upload failed. The stored
    /// object is left in place unless compensation is enabled.
    #[error("binding update failed: {0}")]
    Binding(String),

    /// Invalid owner reference or missing process configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
