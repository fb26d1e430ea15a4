//! Leaf detection on raw scans.
//!
//! This module provides:
//! - The usability gate that screens scans by height
//! - Pixel filters reproducing the tuned OpenCV preprocessing
//! - The leaf region detector producing left-to-right bounding boxes

pub mod filters;
pub mod gate;
pub mod leaves;

pub use gate::{is_usable, MAX_HEIGHT_FILE, MIN_HEIGHT_FILE};
pub use leaves::{detect_leaves, foreground_mask, leaf_boxes};
