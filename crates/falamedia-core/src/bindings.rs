//! Binding contract between the pipeline and the relational store.
//!
//! The pipeline only ever needs two things from the app's data layer: an
//! owning-entity key and a column to commit the resolved URL into. This
//! trait is that contract; the Postgres implementation lives in
//! `falamedia-db` and tests substitute an in-memory store.

use async_trait::async_trait;

use crate::models::OwnerReference;

/// Errors from the single-row binding write.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindingError {
    #[error("owner record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<BindingError> for crate::PipelineError {
    fn from(e: BindingError) -> Self {
        crate::PipelineError::Binding(e.to_string())
    }
}

/// Writes a resolved public URL into the owning record's designated column.
///
/// Exactly one update statement per call, keyed by the owner key. No
/// transaction spans the object-storage write and this write; see the
/// pipeline documentation for how that gap is handled.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Bind `url` to the owner's avatar/image column.
    async fn bind_image_url(&self, owner: &OwnerReference, url: &str) -> Result<(), BindingError>;

    /// Read back the currently bound URL, if any.
    async fn fetch_bound_url(&self, owner: &OwnerReference)
        -> Result<Option<String>, BindingError>;
}
