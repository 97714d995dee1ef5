//! Shared constants for the media pipeline.

/// Hard ceiling for a candidate image, in bytes (5 MiB).
pub const MAX_IMAGE_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Assets larger than this are re-encoded before upload (1 MiB).
pub const COMPRESSION_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Fixed quality factor for JPEG re-encoding (mozjpeg scale, 0-100).
pub const JPEG_QUALITY: u8 = 70;

/// Content types accepted by the size/format validator.
pub const ALLOWED_CONTENT_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// Bucket scope for user and child profile photos.
pub const PROFILE_PHOTO_SCOPE: &str = "profile_photos";

/// Bucket scope for custom vocabulary item images.
pub const VOCABULARY_IMAGE_SCOPE: &str = "vocabulary_images";

/// Extension used when the capture path reports no usable content type.
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";
