//! Server-side handling of uploaded image attachments.
//!
//! The client performs advisory size/format checks; everything is re-checked
//! here before bytes are forwarded upstream.

use base64::Engine;
use image::ImageFormat;
use thiserror::Error;

use crate::gemini::ImageAttachment;

/// Per-file ceiling, matching the client-side limit.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Formats the generation API accepts as-is.
const FORWARDABLE_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/bmp"];

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("attachment is empty")]
    Empty,

    #[error("attachment exceeds the {} MiB limit", MAX_ATTACHMENT_BYTES / (1024 * 1024))]
    TooLarge,
}

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

fn transcode_to_png(bytes: &[u8]) -> Option<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).ok()?;
    let mut output = Vec::new();
    decoded
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .ok()?;
    Some(output)
}

/// Validate one uploaded file and coerce it into a format the generation
/// API accepts. Supported formats pass through untouched; anything else is
/// transcoded to PNG when decodable, or forwarded relabeled as JPEG as a
/// last resort.
pub fn prepare_attachment(
    bytes: &[u8],
    declared_mime: Option<&str>,
) -> Result<ImageAttachment, AttachmentError> {
    if bytes.is_empty() {
        return Err(AttachmentError::Empty);
    }
    if bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge);
    }

    let mime_type = detect_mime_type(bytes)
        .map(str::to_string)
        .or_else(|| declared_mime.map(|value| value.trim().to_lowercase()))
        .unwrap_or_default();

    let engine = &base64::engine::general_purpose::STANDARD;
    if FORWARDABLE_MIME_TYPES.contains(&mime_type.as_str()) {
        return Ok(ImageAttachment {
            mime_type,
            data: engine.encode(bytes),
        });
    }

    if let Some(png) = transcode_to_png(bytes) {
        tracing::debug!(from = %mime_type, "transcoded unsupported attachment to png");
        return Ok(ImageAttachment {
            mime_type: "image/png".to_string(),
            data: engine.encode(png),
        });
    }

    tracing::warn!(mime = %mime_type, "undecodable attachment forwarded as jpeg");
    Ok(ImageAttachment {
        mime_type: "image/jpeg".to_string(),
        data: engine.encode(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use image::{ImageFormat, RgbImage};

    fn encode(format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(detect_mime_type(&encode(ImageFormat::Png)), Some("image/png"));
        assert_eq!(detect_mime_type(&encode(ImageFormat::Bmp)), Some("image/bmp"));
        assert_eq!(
            detect_mime_type(&encode(ImageFormat::WebP)),
            Some("image/webp")
        );
        assert_eq!(detect_mime_type(b"plain text"), None);
    }

    #[test]
    fn supported_formats_pass_through_unchanged() {
        let png = encode(ImageFormat::Png);
        let attachment = prepare_attachment(&png, None).unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&attachment.data)
            .unwrap();
        assert_eq!(decoded, png);
    }

    #[test]
    fn webp_is_transcoded_to_png() {
        let webp = encode(ImageFormat::WebP);
        let attachment = prepare_attachment(&webp, Some("image/webp")).unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&attachment.data)
            .unwrap();
        assert_eq!(detect_mime_type(&decoded), Some("image/png"));
    }

    #[test]
    fn undecodable_bytes_fall_back_to_jpeg_relabel() {
        let bytes = b"definitely not an image".to_vec();
        let attachment = prepare_attachment(&bytes, Some("image/avif")).unwrap();
        assert_eq!(attachment.mime_type, "image/jpeg");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&attachment.data)
            .unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn sniffed_mime_wins_over_the_declared_type() {
        let jpeg = encode(ImageFormat::Jpeg);
        let attachment = prepare_attachment(&jpeg, Some("image/png")).unwrap();
        assert_eq!(attachment.mime_type, "image/jpeg");
    }

    #[test]
    fn empty_and_oversize_files_are_rejected() {
        assert!(matches!(
            prepare_attachment(&[], None),
            Err(AttachmentError::Empty)
        ));
        let oversize = vec![0u8; MAX_ATTACHMENT_BYTES + 1];
        assert!(matches!(
            prepare_attachment(&oversize, None),
            Err(AttachmentError::TooLarge)
        ));
    }
}
