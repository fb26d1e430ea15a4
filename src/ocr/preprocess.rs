use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use super::engine::TextDetection;
use crate::detection::filters::to_grayscale;

/// Pixel rectangle `(x, y, width, height)` enclosing every detection.
///
/// Uses the smallest top-left and the largest bottom-right corner of all
/// quads, truncated to integers and clamped to the image. Returns `None` when
/// the result is empty.
pub fn label_region(
    detections: &[TextDetection],
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let first = detections.first()?;
    let (mut x_min, mut y_min) = (first.quad.top_left().x, first.quad.top_left().y);
    let (mut x_max, mut y_max) = (first.quad.bottom_right().x, first.quad.bottom_right().y);

    for d in &detections[1..] {
        let (tl, br) = (d.quad.top_left(), d.quad.bottom_right());
        x_min = x_min.min(tl.x);
        y_min = y_min.min(tl.y);
        x_max = x_max.max(br.x);
        y_max = y_max.max(br.y);
    }

    // Float to int casts saturate: negatives become 0
    let x0 = (x_min as u32).min(width);
    let y0 = (y_min as u32).min(height);
    let x1 = (x_max as u32).min(width);
    let y1 = (y_max as u32).min(height);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some((x0, y0, x1 - x0, y1 - y0))
}

/// Scaled size of one crop dimension after dropping `compression_ratio`.
fn compressed(dimension: u32, compression_ratio: f32) -> u32 {
    (dimension as f64 * (1.0 - compression_ratio as f64)).round().max(0.0) as u32
}

/// Crops the label area around all detections, shrinks it to save memory,
/// and converts it to grayscale.
///
/// Returns `None` when the detections enclose no pixels or the shrunk image
/// would have a zero dimension.
pub fn label_crop(
    image: &RgbImage,
    detections: &[TextDetection],
    compression_ratio: f32,
) -> Option<GrayImage> {
    let (x, y, w, h) = label_region(detections, image.width(), image.height())?;

    let new_width = compressed(w, compression_ratio);
    let new_height = compressed(h, compression_ratio);
    if new_width == 0 || new_height == 0 {
        return None;
    }

    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    let resized = imageops::resize(&cropped, new_width, new_height, FilterType::Triangle);

    Some(to_grayscale(&resized))
}
