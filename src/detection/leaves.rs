//! Leaf region detection.
//!
//! Leaves are darker than the scanner background. A heavy blur turns each
//! leaf into a smooth blob, two thresholds turn the blobs into a white-on-black
//! mask, and the outer contours of that mask are filtered by area and by
//! bounding-box size.

use image::{GrayImage, RgbImage, imageops};
use imageproc::contours::{BorderType, find_contours};
use tracing::debug;

use super::filters::{box_blur, threshold_binary, threshold_binary_inv, to_grayscale};
use crate::config::DetectorConfig;
use crate::geometry::{BoundingBox, bounding_rect, polygon_area};

/// Detects leaves in a raw scan.
///
/// Returns one box per leaf, sorted left to right by `x1`. An image with no
/// leaf-sized region yields an empty list.
pub fn detect_leaves(image: &RgbImage, config: &DetectorConfig) -> Vec<BoundingBox> {
    let mask = foreground_mask(image, config);
    leaf_boxes(&mask, config)
}

/// Builds the binary mask in which leaves are white (`max_binary_value`)
/// and the background is black.
///
/// The first threshold flattens color variation per channel before the
/// grayscale conversion; the second, inverted, threshold makes anything that
/// is not near-white foreground. Both thresholds run in place, so at most one
/// full-size color buffer is alive at a time.
pub fn foreground_mask(image: &RgbImage, config: &DetectorConfig) -> GrayImage {
    let [kernel_width, kernel_height] = config.blur_kernel_size;
    let binarized = threshold_binary(
        box_blur(image, kernel_width, kernel_height),
        config.binary_threshold,
        config.max_binary_value,
    );
    let grayscale = to_grayscale(&binarized);
    drop(binarized);
    threshold_binary_inv(grayscale, config.inverse_threshold, config.max_binary_value)
}

/// Copies the mask into a frame one background pixel wider on every side.
///
/// `find_contours` reports a region touching the image edge as a hole with no
/// parent and nests everything traced after it below that hole. With a
/// background frame every region has a proper outer border.
fn pad_mask(mask: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut padded, mask, 1, 1);
    padded
}

/// Turns the outermost contours of a foreground mask into leaf boxes.
///
/// Contours nested inside holes of another region are ignored, regions
/// touching the image edge are not. Area and box dimensions are independent
/// gates; a contour has to pass both.
pub fn leaf_boxes(mask: &GrayImage, config: &DetectorConfig) -> Vec<BoundingBox> {
    let contours = find_contours::<i32>(&pad_mask(mask));
    let total = contours.len();

    let mut boxes: Vec<BoundingBox> = contours
        .iter()
        .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        .filter_map(|c| leaf_box(&c.points, config))
        .collect();

    boxes.sort_by_key(|b| b.x1);

    debug!(
        "Leaf detection: {} contours, {} leaves kept",
        total,
        boxes.len()
    );

    boxes
}

fn leaf_box(points: &[imageproc::point::Point<i32>], config: &DetectorConfig) -> Option<BoundingBox> {
    if polygon_area(points) <= config.min_contour_area {
        return None;
    }

    // Points are in padded coordinates, one pixel right of and below the mask
    let (x, y, w, h) = bounding_rect(points)?;
    if w <= config.min_width || h.saturating_sub(config.top_offset) <= config.min_height {
        return None;
    }

    let (x, y) = (x.saturating_sub(1), y.saturating_sub(1));
    Some(BoundingBox::new(x, y + config.top_offset, x + w, y + h))
}
