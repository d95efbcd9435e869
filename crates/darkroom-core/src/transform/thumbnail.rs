//! Crop-to-fill thumbnails at a tenth of the resize target.

use image::imageops::FilterType;
use image::DynamicImage;

pub(crate) fn apply(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (w, h) = ((width / 10).max(1), (height / 10).max(1));
    image.resize_to_fill(w, h, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    #[test]
    fn test_thumbnail_fills_exact_box() {
        let img = DynamicImage::new_rgb8(1920, 1080);
        assert_eq!(apply(&img, 800, 800).dimensions(), (80, 80));
        assert_eq!(apply(&img, 1280, 720).dimensions(), (128, 72));
    }

    #[test]
    fn test_thumbnail_crops_instead_of_letterboxing() {
        // Wide image: red centre band, blue edges. A centred crop keeps red.
        let img = RgbImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let thumb = apply(&DynamicImage::ImageRgb8(img), 100, 100).to_rgb8();
        let centre = thumb.get_pixel(5, 5);
        assert!(centre[0] > 200 && centre[2] < 50, "{centre:?}");
    }

    #[test]
    fn test_tiny_target_never_collapses_to_zero() {
        let img = DynamicImage::new_rgb8(50, 50);
        assert_eq!(apply(&img, 5, 5).dimensions(), (1, 1));
    }
}
