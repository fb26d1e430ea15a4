//! Pixel classification of extracted leaves and area measurement.
//!
//! Segmentation itself is delegated to an external engine behind the
//! [`Segmenter`] trait; this module prepares its inputs and reads its masks.

pub mod color_space;
pub mod ilastik;
pub mod mask;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use color_space::{ColorSpace, convert_files, convert_image};
pub use ilastik::{IlastikSegmenter, mask_path_for};
pub use mask::{ClassAreas, load_mask, measure_areas};

/// Engine turning leaf images into class masks.
///
/// For each input `<stem>.<ext>` an implementation must write the mask
/// returned by [`mask_path_for`] into `output_dir`.
pub trait Segmenter: Send + Sync {
    fn segment(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<()>;
}
