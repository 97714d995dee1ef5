//! FalaMedia Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! binding contract shared across all FalaMedia components.

pub mod bindings;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use bindings::{BindingError, BindingStore};
pub use config::{Config, StorageBackend};
pub use error::PipelineError;
pub use models::{
    CaptureMode, CaptureOptions, MediaAsset, OwnerKind, OwnerReference, PipelineOutcome,
    PipelineStage, UploadResult,
};
