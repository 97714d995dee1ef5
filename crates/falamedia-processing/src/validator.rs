//! Size/format validation for candidate images.

use falamedia_core::{constants, PipelineError};

/// Validation errors for candidate images
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("image is too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("unsupported image format: {content_type} (use JPG, PNG or GIF)")]
    UnsupportedFormat { content_type: String },

    #[error("empty image")]
    Empty,
}

impl From<ValidationError> for PipelineError {
    fn from(e: ValidationError) -> Self {
        PipelineError::Validation(e.to_string())
    }
}

/// Image validator
///
/// Pure checks against the fixed limits; applied in order, size first.
/// The content type is optional because some capture paths do not report
/// one, and its absence alone never fails validation.
#[derive(Debug, Clone)]
pub struct SizeValidator {
    max_bytes: u64,
    allowed_content_types: Vec<String>,
}

impl Default for SizeValidator {
    fn default() -> Self {
        Self::new(constants::MAX_IMAGE_SIZE_BYTES)
    }
}

impl SizeValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            allowed_content_types: constants::ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Validate a candidate asset's byte size and (optional) content type.
    pub fn validate(
        &self,
        byte_size: u64,
        content_type: Option<&str>,
    ) -> Result<(), ValidationError> {
        if byte_size == 0 {
            return Err(ValidationError::Empty);
        }
        if byte_size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: byte_size,
                max: self.max_bytes,
            });
        }

        if let Some(content_type) = content_type {
            let normalized = content_type.to_lowercase();
            if !self.allowed_content_types.contains(&normalized) {
                return Err(ValidationError::UnsupportedFormat {
                    content_type: content_type.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn oversize_fails_regardless_of_content_type() {
        let validator = SizeValidator::default();
        for mime in [Some("image/jpeg"), Some("image/png"), None] {
            assert!(matches!(
                validator.validate(6 * MIB, mime),
                Err(ValidationError::TooLarge { .. })
            ));
        }
    }

    #[test]
    fn boundary_is_inclusive() {
        let validator = SizeValidator::default();
        assert!(validator.validate(5 * MIB, Some("image/png")).is_ok());
        assert!(validator.validate(5 * MIB + 1, Some("image/png")).is_err());
    }

    #[test]
    fn known_formats_pass_case_insensitively() {
        let validator = SizeValidator::default();
        assert!(validator.validate(1024, Some("image/jpeg")).is_ok());
        assert!(validator.validate(1024, Some("IMAGE/PNG")).is_ok());
        assert!(validator.validate(1024, Some("image/gif")).is_ok());
        assert!(validator.validate(1024, Some("image/jpg")).is_ok());
    }

    #[test]
    fn unknown_format_fails() {
        let validator = SizeValidator::default();
        assert!(matches!(
            validator.validate(1024, Some("image/bmp")),
            Err(ValidationError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn absent_content_type_does_not_fail() {
        let validator = SizeValidator::default();
        assert!(validator.validate(1024, None).is_ok());
    }

    #[test]
    fn empty_asset_fails() {
        let validator = SizeValidator::default();
        assert!(matches!(
            validator.validate(0, Some("image/png")),
            Err(ValidationError::Empty)
        ));
    }

    #[test]
    fn size_is_checked_before_format() {
        let validator = SizeValidator::default();
        // Both rules violated: the size rule wins, per the contract order.
        assert!(matches!(
            validator.validate(6 * MIB, Some("image/bmp")),
            Err(ValidationError::TooLarge { .. })
        ));
    }
}
