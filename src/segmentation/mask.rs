//! Area measurement on segmentation masks.

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::path::Path;

use crate::detection::filters::to_grayscale;

/// Gray level of each class in an exported mask.
pub const BACKGROUND_LEVEL: u8 = 63;
pub const HEALTHY_LEVEL: u8 = 127;
pub const OIDIUM_LEVEL: u8 = 191;
pub const RUST_LEVEL: u8 = 255;

/// Per-class areas of one leaf in mm², rounded to 3 decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassAreas {
    pub background: f64,
    pub healthy: f64,
    pub oidium: f64,
    pub rust: f64,
    /// Sum of the three leaf classes
    pub leaf: f64,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Counts class pixels and converts them to areas.
pub fn measure_areas(mask: &GrayImage, pixel_area: f64) -> ClassAreas {
    let mut counts = [0u64; 256];
    for pixel in mask.pixels() {
        counts[pixel[0] as usize] += 1;
    }
    let area = |level: u8| round3(counts[level as usize] as f64 * pixel_area);

    let healthy = area(HEALTHY_LEVEL);
    let oidium = area(OIDIUM_LEVEL);
    let rust = area(RUST_LEVEL);

    ClassAreas {
        background: area(BACKGROUND_LEVEL),
        healthy,
        oidium,
        rust,
        leaf: round3(healthy + oidium + rust),
    }
}

/// Loads a mask as single-channel gray levels.
///
/// Color masks are reduced with the same luma weights as the detector, so a
/// gray mask saved as RGB keeps its class levels.
pub fn load_mask(path: &Path) -> Result<GrayImage> {
    let image = image::open(path).with_context(|| format!("Failed to open mask {}", path.display()))?;
    Ok(match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => to_grayscale(&other.to_rgb8()),
    })
}
