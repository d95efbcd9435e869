use image::imageops::FilterType;
use image::DynamicImage;

/// Stretch to exactly `width` x `height`, ignoring aspect ratio.
pub(crate) fn apply(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    image.resize_exact(width, height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_resize_ignores_aspect_ratio() {
        let img = DynamicImage::new_rgb8(1000, 500);
        assert_eq!(apply(&img, 800, 800).dimensions(), (800, 800));
        assert_eq!(apply(&img, 30, 90).dimensions(), (30, 90));
    }
}
