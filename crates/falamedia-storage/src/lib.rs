//! FalaMedia Storage Library
//!
//! Object-storage abstraction and implementations for the media pipeline.
//! Includes the Storage trait, S3-compatible and local-filesystem backends,
//! and storage-key construction.
//!
//! # Storage key format
//!
//! Keys are owner-scoped and derived without I/O:
//!
//! - **Profile/child avatars**: `profile_photos/{owner_key}_{epoch_millis}.{ext}`
//! - **Vocabulary items**: `vocabulary_images/{owner_key}/{slug(item_name)}.{ext}`
//!
//! Keys are not content hashes; rapid repeated uploads for one owner collide
//! only within the same millisecond. Keys must not contain `..` or a leading
//! `/`. Key construction is centralized in the `keys` module so all backends
//! stay consistent.

pub mod factory;
pub mod keys;
pub mod local;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
