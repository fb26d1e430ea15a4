//! Batch driver: raw scans in, leaf crops, label fields and areas out.
//!
//! Stages run in order and each one logs its start, end and duration:
//! 1. Extraction of leaves and labels
//! 2. Color space conversion
//! 3. Leaves segmentation
//! 4. Results analysis

pub mod csv_writer;
pub mod extraction;
pub mod summary;

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::ocr::{LabelExtractor, TextReader};
use crate::paths::{Workspace, list_images};
use crate::segmentation::{ColorSpace, Segmenter, convert_files, load_mask, mask_path_for, measure_areas};

pub use csv_writer::{LeafRecord, write_results};
pub use extraction::{Extraction, SourceImage, Triage, extract_all, process_image, triage};
pub use summary::{RunSummary, StageTiming, export_to_json};

/// Where to read scans and write results.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Runs `work` as a named stage, logging its duration into the summary.
fn stage<T>(summary: &mut RunSummary, name: &str, work: impl FnOnce() -> Result<T>) -> Result<T> {
    info!("Start of {}.", name);
    let start = Instant::now();
    let result = work()?;
    let seconds = start.elapsed().as_secs_f64();
    info!("End of {}. ({:.0}s)", name, seconds);
    summary.record_stage(name, seconds);
    Ok(result)
}

/// Processes every scan in `options.input_dir`.
///
/// Without a segmenter the run stops after extraction and the CSV has empty
/// area columns.
pub fn run<R: TextReader>(
    config: &PipelineConfig,
    extractor: &LabelExtractor<R>,
    segmenter: Option<&dyn Segmenter>,
    options: &RunOptions,
) -> Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::new();
    info!("Start of process.");

    let workspace = Workspace::create(&options.output_dir)?;
    let images = list_images(&options.input_dir)?;
    summary.source_images = images.len();
    info!("Found {} images in {}", images.len(), options.input_dir.display());

    let (sorted, extraction) = stage(&mut summary, "extraction of leaves and labels", || {
        let sorted = triage(&images, &config.gate, &workspace)?;
        let extraction = extract_all(
            &sorted.usable,
            extractor,
            &config.detector,
            &workspace,
            config.workers,
        )?;
        Ok((sorted, extraction))
    })?;
    summary.usable_images = sorted.usable.len();
    summary.unusable_images = sorted.unusable;
    summary.failed_images = sorted.failed + extraction.failed;
    summary.leaves_extracted = extraction.records.len();
    let mut records = extraction.records;

    match segmenter {
        Some(segmenter) => {
            let color_space = config.segmentation.color_space;
            let leaves: Vec<PathBuf> = records
                .iter()
                .map(|r| workspace.files.join(&r.new_file_name))
                .collect();

            let inputs = stage(&mut summary, "color space conversion", || {
                if color_space == ColorSpace::None {
                    return Ok(leaves.clone());
                }
                convert_files(&leaves, &workspace.color_space_dir(), color_space)
            })?;

            stage(&mut summary, "leaves segmentation", || {
                segmenter.segment(&inputs, &workspace.segmented)?;
                if color_space != ColorSpace::None {
                    let dir = workspace.color_space_dir();
                    fs::remove_dir_all(&dir)
                        .with_context(|| format!("Failed to remove {}", dir.display()))?;
                }
                Ok(())
            })?;

            let pixel_area = config.measurement.pixel_area();
            let measured = stage(&mut summary, "results analysis", || {
                Ok(measure_records(&mut records, &workspace.segmented, pixel_area))
            })?;
            summary.leaves_measured = measured;
            summary.missing_masks = records.len() - measured;
        }
        None => {
            info!("Segmentation skipped; area columns left empty");
            summary.segmentation_skipped = true;
        }
    }

    write_results(&workspace.csv_path(), &records)?;
    summary.total_seconds = start.elapsed().as_secs_f64();
    export_to_json(&summary, &workspace.summary_path())?;

    info!(
        "End of process. ({:.0}s) {} leaves from {} usable images, results in {}",
        summary.total_seconds,
        summary.leaves_extracted,
        summary.usable_images,
        workspace.results.display()
    );

    Ok(summary)
}

/// Fills in areas for every record whose mask exists. Returns how many
/// records were measured.
pub fn measure_records(records: &mut [LeafRecord], mask_dir: &Path, pixel_area: f64) -> usize {
    records
        .par_iter_mut()
        .map(|record| {
            let mask_path = mask_path_for(Path::new(&record.new_file_name), mask_dir);
            if !mask_path.exists() {
                warn!("No mask for {}", record.new_file_name);
                return 0;
            }
            match load_mask(&mask_path) {
                Ok(mask) => {
                    record.set_areas(&measure_areas(&mask, pixel_area));
                    1
                }
                Err(e) => {
                    warn!("{:#}", e);
                    0
                }
            }
        })
        .sum()
}
