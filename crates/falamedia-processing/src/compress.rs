//! Conditional re-encoding of oversized captures.
//!
//! Assets over the threshold are re-encoded to JPEG at a fixed quality
//! factor before upload. Failure here is never fatal: the engine falls back
//! to the original file, which is still subject to the 5 MiB ceiling.

use std::io::Write;
use std::path::Path;

use falamedia_core::{constants, MediaAsset};

/// Internal re-encoding errors. Callers never see these; they surface only
/// as a logged fallback to the original asset.
#[derive(Debug, thiserror::Error)]
enum CompressError {
    #[error("could not read asset: {0}")]
    Read(String),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode JPEG: {0}")]
    Encode(String),

    #[error("could not write re-encoded file: {0}")]
    Write(String),

    #[error("re-encoded output is larger than the input")]
    Grew,
}

/// Conditional JPEG re-encoder.
#[derive(Debug, Clone)]
pub struct CompressionEngine {
    threshold_bytes: u64,
    jpeg_quality: u8,
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new(
            constants::COMPRESSION_THRESHOLD_BYTES,
            constants::JPEG_QUALITY,
        )
    }
}

impl CompressionEngine {
    pub fn new(threshold_bytes: u64, jpeg_quality: u8) -> Self {
        Self {
            threshold_bytes,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Re-encode the asset to JPEG if its on-disk size exceeds the
    /// threshold; identity otherwise.
    ///
    /// Returns a new transient asset pointing at the re-encoded temp file,
    /// or the input asset unchanged when no re-encode was needed or the
    /// re-encode failed.
    pub async fn compress_if_needed(&self, asset: &MediaAsset) -> MediaAsset {
        let size = match tokio::fs::metadata(&asset.local_uri).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(
                    uri = %asset.local_uri.display(),
                    error = %e,
                    "could not stat asset, skipping compression"
                );
                return asset.clone();
            }
        };

        if size <= self.threshold_bytes {
            return asset.clone();
        }

        match self.reencode(&asset.local_uri, size).await {
            Ok(compressed) => {
                tracing::debug!(
                    uri = %asset.local_uri.display(),
                    original_bytes = size,
                    compressed_bytes = compressed.byte_size,
                    "asset re-encoded before upload"
                );
                compressed
            }
            Err(e) => {
                // Explicit fallback branch: the original file goes through
                // uncompressed, still subject to the size ceiling.
                tracing::warn!(
                    uri = %asset.local_uri.display(),
                    size_bytes = size,
                    error = %e,
                    "re-encoding failed, uploading original asset"
                );
                asset.clone()
            }
        }
    }

    async fn reencode(&self, uri: &Path, input_size: u64) -> Result<MediaAsset, CompressError> {
        let data = tokio::fs::read(uri)
            .await
            .map_err(|e| CompressError::Read(e.to_string()))?;

        let quality = self.jpeg_quality;
        // Image decode/encode is CPU-bound; run off the async pool.
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&data, quality))
            .await
            .map_err(|e| CompressError::Encode(e.to_string()))??;

        if jpeg.len() as u64 >= input_size {
            return Err(CompressError::Grew);
        }

        let mut tmp = tempfile::Builder::new()
            .prefix("falamedia_")
            .suffix(".jpg")
            .tempfile()
            .map_err(|e| CompressError::Write(e.to_string()))?;
        tmp.write_all(&jpeg)
            .map_err(|e| CompressError::Write(e.to_string()))?;
        // The pipeline owns the file from here and removes it after upload.
        let (_file, path) = tmp
            .keep()
            .map_err(|e| CompressError::Write(e.to_string()))?;

        Ok(MediaAsset {
            local_uri: path,
            byte_size: jpeg.len() as u64,
            mime_type: Some("image/jpeg".to_string()),
            base64_payload: None,
        })
    }
}

fn encode_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>, CompressError> {
    let img = image::load_from_memory(data).map_err(|e| CompressError::Decode(e.to_string()))?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp
        .start_compress(Vec::new())
        .map_err(|e| CompressError::Encode(e.to_string()))?;
    comp.write_scanlines(&rgb)
        .map_err(|e| CompressError::Encode(e.to_string()))?;
    comp.finish()
        .map_err(|e| CompressError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn asset_at(path: PathBuf, byte_size: u64) -> MediaAsset {
        MediaAsset {
            local_uri: path,
            byte_size,
            mime_type: Some("image/png".to_string()),
            base64_payload: None,
        }
    }

    /// Deterministic pseudo-noise image; noisy enough that its PNG encoding
    /// lands well above a 1 KiB threshold.
    fn noisy_png() -> Vec<u8> {
        let mut img = RgbImage::new(200, 200);
        let mut state: u32 = 0x12345678;
        for y in 0..200 {
            for x in 0..200 {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                let r = (state >> 24) as u8;
                let g = (state >> 16) as u8;
                let b = (state >> 8) as u8;
                img.put_pixel(x, y, Rgb([r, g, b]));
            }
        }
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn small_asset_is_returned_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.png");
        std::fs::write(&path, b"tiny").unwrap();

        let engine = CompressionEngine::default();
        let asset = asset_at(path.clone(), 4);
        let out = engine.compress_if_needed(&asset).await;

        assert_eq!(out.local_uri, path);
        assert_eq!(out.mime_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn oversized_asset_is_reencoded_to_smaller_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.png");
        let png = noisy_png();
        std::fs::write(&path, &png).unwrap();
        let input_size = png.len() as u64;
        assert!(input_size > 1024);

        let engine = CompressionEngine::new(1024, 70);
        let asset = asset_at(path.clone(), input_size);
        let out = engine.compress_if_needed(&asset).await;

        assert_ne!(out.local_uri, path);
        assert_eq!(out.mime_type.as_deref(), Some("image/jpeg"));
        assert!(out.byte_size <= input_size);

        let on_disk = std::fs::read(&out.local_uri).unwrap();
        assert_eq!(on_disk.len() as u64, out.byte_size);
        let decoded = image::load_from_memory(&on_disk).unwrap();
        assert_eq!(decoded.width(), 200);

        std::fs::remove_file(&out.local_uri).ok();
    }

    #[tokio::test]
    async fn undecodable_asset_falls_back_to_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let engine = CompressionEngine::new(1024, 70);
        let asset = asset_at(path.clone(), 4096);
        let out = engine.compress_if_needed(&asset).await;

        assert_eq!(out.local_uri, path);
        assert_eq!(out.byte_size, 4096);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_original() {
        let engine = CompressionEngine::default();
        let asset = asset_at(PathBuf::from("/nonexistent/file.png"), 2_000_000);
        let out = engine.compress_if_needed(&asset).await;
        assert_eq!(out.local_uri, PathBuf::from("/nonexistent/file.png"));
    }
}
