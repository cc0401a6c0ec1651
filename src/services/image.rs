//! Image Preprocessor
//!
//! Decodes client-supplied base64 images, validates them, and re-encodes to
//! JPEG under a configurable size cap. The re-encode loop steps quality down
//! by 5 until the payload fits or quality reaches 50, so it is bounded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during image preprocessing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to decode base64 image: {0}")]
    Base64(String),

    #[error("Invalid or unsupported image data: {0}")]
    Invalid(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Image preprocessor with a size cap and an initial JPEG quality.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    max_bytes: usize,
    quality: u8,
}

impl ImagePreprocessor {
    pub fn new(max_bytes: usize, quality: u8) -> Self {
        Self {
            max_bytes,
            quality: quality.clamp(1, 100),
        }
    }

    /// Strip an optional `data:image/...;base64,` prefix and decode.
    pub fn decode_base64(input: &str) -> Result<Vec<u8>, ImageError> {
        let payload = if input.starts_with("data:image") {
            input.split_once(',').map(|(_, rest)| rest).unwrap_or(input)
        } else {
            input
        };
        STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageError::Base64(e.to_string()))
    }

    /// Whether the bytes parse as a supported image format.
    pub fn validate(&self, data: &[u8]) -> bool {
        image::load_from_memory(data).is_ok()
    }

    /// Re-encode to RGB JPEG under the size cap and return it base64-encoded.
    pub fn process(&self, data: &[u8]) -> Result<String, ImageError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ImageError::Invalid(e.to_string()))?;
        // Flattens alpha and palette formats to plain RGB.
        let rgb = img.to_rgb8();

        let mut quality = self.quality;
        let mut out = Vec::new();
        loop {
            out.clear();
            JpegEncoder::new_with_quality(&mut out, quality)
                .encode_image(&rgb)
                .map_err(|e| ImageError::Encode(e.to_string()))?;

            if out.len() <= self.max_bytes || quality <= 50 {
                break;
            }
            quality -= 5;
        }

        debug!(
            input_bytes = data.len(),
            output_bytes = out.len(),
            quality,
            "Image re-encoded"
        );
        Ok(STANDARD.encode(&out))
    }
}
