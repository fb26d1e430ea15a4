//! Run summary and its JSON export.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Wall-clock time spent in one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub name: String,
    pub seconds: f64,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Local start time, `%Y-%m-%dT%H:%M:%S`
    pub started_at: String,
    pub source_images: usize,
    pub usable_images: usize,
    pub unusable_images: usize,
    /// Images that could not be read, decoded, or OCRed
    pub failed_images: usize,
    pub leaves_extracted: usize,
    pub leaves_measured: usize,
    pub missing_masks: usize,
    pub segmentation_skipped: bool,
    pub stages: Vec<StageTiming>,
    pub total_seconds: f64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            ..Self::default()
        }
    }

    pub fn record_stage(&mut self, name: &str, seconds: f64) {
        self.stages.push(StageTiming {
            name: name.to_string(),
            seconds,
        });
    }
}

/// Writes `summary.json` next to the results CSV.
pub fn export_to_json(summary: &RunSummary, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)
        .with_context(|| format!("Failed to write run summary to {}", output_path.display()))?;
    writer.flush()?;
    Ok(())
}
