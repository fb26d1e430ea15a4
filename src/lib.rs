//! Leaf Segmenter
//!
//! Batch processing of scanned vine leaf sheets: finds each leaf on a raw
//! scan, reads the sample label next to it, hands the leaf crops to a pixel
//! classifier and measures healthy, oidium and rust areas per leaf.

pub mod config;
pub mod detection;
pub mod geometry;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod segmentation;

pub use config::PipelineConfig;
pub use geometry::BoundingBox;
