//! FalaMedia Pipeline Library
//!
//! The media ingestion and storage-binding pipeline: turns a caregiver's
//! camera/gallery interaction into a durably stored, publicly addressable
//! image bound to its owning record (a user profile, a child profile, or a
//! vocabulary item).
//!
//! UI collaborators consume a single asynchronous entry point,
//! [`MediaPipeline::run`], plus progress and error callbacks. Everything the
//! pipeline needs from the host platform enters through two seams:
//! [`PermissionHost`] for OS permission dialogs and [`CaptureSource`] for
//! the camera/library pickers.

pub mod capture;
pub mod permissions;
pub mod pipeline;
pub mod single_flight;
pub mod upload;

// Re-export commonly used types
pub use capture::{Capture, CaptureSource, FileCaptureSource};
pub use permissions::{AlwaysGranted, PermissionBroker, PermissionHost};
pub use pipeline::{MediaPipeline, PipelineSettings, ProgressSink};
pub use single_flight::SingleFlight;
pub use upload::UploadCoordinator;
