//! Downscaling of oversized uploads.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

/// Limits applied before upload.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub threshold_bytes: usize,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            threshold_bytes: 4 * 1024 * 1024,
            max_dimension: 2048,
            jpeg_quality: 85,
        }
    }
}

/// Payload ready for upload.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    /// Whether the bytes were re-encoded.
    pub normalized: bool,
}

/// Best-effort content type from a file name.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn jpeg_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    format!("{stem}.jpg")
}

/// Returns the payload to upload.
///
/// Payloads at or under the threshold pass through untouched. Larger ones
/// are decoded, shrunk to fit `max_dimension` with the aspect ratio kept,
/// and re-encoded as JPEG. If decoding or encoding fails the original bytes
/// are sent.
pub fn normalize(bytes: Vec<u8>, file_name: &str, options: &NormalizeOptions) -> Payload {
    let original = |bytes: Vec<u8>| Payload {
        content_type: guess_content_type(file_name).to_string(),
        file_name: file_name.to_string(),
        bytes,
        normalized: false,
    };

    if bytes.len() <= options.threshold_bytes {
        return original(bytes);
    }

    let image = match image::load_from_memory(&bytes) {
        Ok(image) => image,
        Err(e) => {
            warn!(error = %e, size = bytes.len(), "Could not decode oversized image, sending as is");
            return original(bytes);
        }
    };

    let (width, height) = image.dimensions();
    let image = if width.max(height) > options.max_dimension {
        image.resize(options.max_dimension, options.max_dimension, FilterType::Triangle)
    } else {
        image
    };

    match encode_jpeg(&image, options.jpeg_quality) {
        Ok(encoded) => {
            debug!(
                from_bytes = bytes.len(),
                to_bytes = encoded.len(),
                width = image.width(),
                height = image.height(),
                "Normalized upload"
            );
            Payload {
                bytes: encoded,
                file_name: jpeg_name(file_name),
                content_type: "image/jpeg".to_string(),
                normalized: true,
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not re-encode image, sending as is");
            original(bytes)
        }
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
    Ok(out)
}
