//! Text label on a translucent box in the bottom-right corner.

use image::{DynamicImage, Pixel, Rgba, RgbaImage};

use super::glyph;
use crate::config::WatermarkConfig;

const TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 120]);

pub(crate) fn apply(image: &DynamicImage, config: &WatermarkConfig) -> DynamicImage {
    let mut canvas = image.to_rgba8();
    let (width, height) = canvas.dimensions();
    let scale = config.scale.max(1);
    let padding = scale.saturating_mul(2);

    let box_w = glyph::text_width(&config.label, scale).saturating_add(padding.saturating_mul(2));
    let box_h = glyph::HEIGHT.saturating_mul(scale).saturating_add(padding.saturating_mul(2));
    // Anchored to the corner; shrinks off the left/top edge on small images.
    let x0 = width.saturating_sub(box_w.saturating_add(config.margin));
    let y0 = height.saturating_sub(box_h.saturating_add(config.margin));

    fill_rect(&mut canvas, x0, y0, box_w, box_h, BACKGROUND);

    let mut pen_x = x0.saturating_add(padding);
    let pen_y = y0.saturating_add(padding);
    for c in config.label.chars() {
        if pen_x >= width || pen_y >= height {
            break;
        }
        draw_glyph(&mut canvas, c, pen_x, pen_y, scale);
        pen_x = pen_x.saturating_add(glyph::ADVANCE.saturating_mul(scale));
    }

    DynamicImage::ImageRgba8(canvas)
}

fn fill_rect(canvas: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    let x1 = x0.saturating_add(w).min(width);
    let y1 = y0.saturating_add(h).min(height);
    for y in y0..y1 {
        for x in x0..x1 {
            if color[3] == u8::MAX {
                canvas.put_pixel(x, y, color);
            } else {
                canvas.get_pixel_mut(x, y).blend(&color);
            }
        }
    }
}

fn draw_glyph(canvas: &mut RgbaImage, c: char, x0: u32, y0: u32, scale: u32) {
    let bitmap = glyph::glyph(c);
    for row in 0..glyph::HEIGHT {
        for col in 0..glyph::WIDTH {
            if glyph::is_set(&bitmap, col, row) {
                let x = x0.saturating_add(col.saturating_mul(scale));
                let y = y0.saturating_add(row.saturating_mul(scale));
                fill_rect(canvas, x, y, scale, scale, TEXT);
            }
        }
    }
}
