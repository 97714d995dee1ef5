//! FalaMedia Processing Library
//!
//! Pre-upload asset processing: size/format validation and conditional
//! JPEG re-encoding of oversized captures.

pub mod compress;
pub mod validator;

pub use compress::CompressionEngine;
pub use validator::{SizeValidator, ValidationError};
