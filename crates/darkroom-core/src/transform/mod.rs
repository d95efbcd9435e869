//! Stateless image transformations, dispatched on [`TaskType`].
//!
//! Every transform decodes the input, applies its operation and re-encodes as
//! JPEG. Failures leave the input untouched and produce no output.

mod codec;
mod glyph;
mod resize;
mod thumbnail;
mod watermark;

pub use codec::{decode, encode_jpeg};

use crate::config::{LimitsConfig, TransformConfig};
use crate::error::TransformError;
use crate::types::TaskType;

pub trait Transformer: Send + Sync {
    fn transform(&self, input: &[u8], task_type: TaskType) -> Result<Vec<u8>, TransformError>;

    /// Dispatch by type name. Unknown names are rejected before any decoding.
    fn transform_named(&self, input: &[u8], name: &str) -> Result<Vec<u8>, TransformError> {
        let task_type: TaskType = name.parse()?;
        self.transform(input, task_type)
    }
}

/// The resize / thumbnail / watermark implementation backed by `image`.
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    config: TransformConfig,
    max_image_dimension: u32,
}

impl ImageTransformer {
    pub fn new(config: TransformConfig, limits: &LimitsConfig) -> Self {
        Self {
            config,
            max_image_dimension: limits.max_image_dimension,
        }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }
}

impl Transformer for ImageTransformer {
    fn transform(&self, input: &[u8], task_type: TaskType) -> Result<Vec<u8>, TransformError> {
        let image = decode(input, self.max_image_dimension)?;
        let output = match task_type {
            TaskType::Resize => resize::apply(&image, self.config.width, self.config.height),
            TaskType::Thumbnail => {
                thumbnail::apply(&image, self.config.width, self.config.height)
            }
            TaskType::Watermark => watermark::apply(&image, &self.config.watermark),
        };
        encode_jpeg(&output, self.config.jpeg_quality)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::png;
    use super::*;
    use image::GenericImageView;

    fn transformer() -> ImageTransformer {
        ImageTransformer::new(TransformConfig::default(), &LimitsConfig::default())
    }

    fn dimensions(jpeg: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg).unwrap();
        img.dimensions()
    }

    #[test]
    fn test_resize_produces_exact_target_jpeg() {
        let out = transformer().transform(&png(320, 200), TaskType::Resize).unwrap();
        assert_eq!(dimensions(&out), (800, 800));
    }

    #[test]
    fn test_thumbnail_is_tenth_of_target() {
        let out = transformer()
            .transform(&png(640, 480), TaskType::Thumbnail)
            .unwrap();
        assert_eq!(dimensions(&out), (80, 80));
    }

    #[test]
    fn test_watermark_keeps_dimensions() {
        let out = transformer()
            .transform(&png(300, 120), TaskType::Watermark)
            .unwrap();
        assert_eq!(dimensions(&out), (300, 120));
    }

    #[test]
    fn test_undecodable_input_is_an_error() {
        let input = b"definitely not an image".to_vec();
        let before = input.clone();
        let err = transformer().transform(&input, TaskType::Resize).unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
        assert_eq!(input, before);
    }

    #[test]
    fn test_unknown_type_name_is_rejected() {
        let err = transformer()
            .transform_named(&png(20, 20), "sepia")
            .unwrap_err();
        assert!(matches!(err, TransformError::UnknownType(name) if name == "sepia"));

        let out = transformer().transform_named(&png(20, 20), "thumbnail").unwrap();
        assert_eq!(dimensions(&out), (80, 80));
    }

    #[test]
    fn test_oversized_input_is_rejected() {
        let limits = LimitsConfig {
            max_image_dimension: 100,
            ..LimitsConfig::default()
        };
        let transformer = ImageTransformer::new(TransformConfig::default(), &limits);
        let err = transformer
            .transform(&png(101, 10), TaskType::Resize)
            .unwrap_err();
        assert!(matches!(err, TransformError::ImageTooLarge { width: 101, .. }));
    }
}
