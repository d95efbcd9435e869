//! Decoding with content-based format detection, and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;

use crate::error::TransformError;

/// Decode `bytes`, sniffing the format from content rather than any name.
pub fn decode(bytes: &[u8], max_dimension: u32) -> Result<DynamicImage, TransformError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(format!("Cannot detect image format: {e}")))?;
    if reader.format().is_none() {
        return Err(TransformError::Decode("Unrecognized image format".into()));
    }
    let image = reader
        .decode()
        .map_err(|e| TransformError::Decode(e.to_string()))?;

    let (width, height) = image.dimensions();
    if width > max_dimension || height > max_dimension {
        return Err(TransformError::ImageTooLarge {
            width,
            height,
            max_dim: max_dimension,
        });
    }
    Ok(image)
}

/// Encode as baseline JPEG. Alpha is dropped; JPEG has no alpha channel.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, TransformError> {
    let rgb = image.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_support::png;

    #[test]
    fn test_format_detected_by_content() {
        let img = decode(&png(12, 8), 100).unwrap();
        assert_eq!(img.dimensions(), (12, 8));
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(decode(&[], 100), Err(TransformError::Decode(_))));
    }

    #[test]
    fn test_encode_rgba_as_jpeg() {
        let rgba = DynamicImage::new_rgba8(16, 16);
        let jpeg = encode_jpeg(&rgba, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_truncated_png_fails() {
        let bytes = png(64, 64);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(decode(truncated, 100), Err(TransformError::Decode(_))));
    }
}
