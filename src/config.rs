//! Configuration types for the leaf pipeline.
//!
//! Loads settings from a JSON file at startup. Every section and every field
//! has a default, so a partial file only overrides what it names. The loaded
//! value is passed down explicitly to each stage; nothing here is global.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::segmentation::ColorSpace;

/// Scan-size envelope for the usability gate.
///
/// Detection thresholds are absolute pixel values tuned for one scanner
/// setup; scans outside this height range come from a different setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Smallest accepted image height (inclusive)
    pub min_height: u32,
    /// Largest accepted image height (inclusive)
    pub max_height: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_height: crate::detection::MIN_HEIGHT_FILE,
            max_height: crate::detection::MAX_HEIGHT_FILE,
        }
    }
}

/// Leaf region detector parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Averaging blur kernel [width, height]; large enough to wash out veins
    /// and texture so each leaf becomes one smooth blob
    pub blur_kernel_size: [u32; 2],
    /// First-stage per-channel threshold
    pub binary_threshold: u8,
    /// Value written for pixels above a threshold
    pub max_binary_value: u8,
    /// Second-stage inverted threshold on the grayscale image
    pub inverse_threshold: u8,
    /// Contours with an area at or below this are discarded (px²)
    pub min_contour_area: f64,
    /// Bounding boxes must be strictly wider than this
    pub min_width: u32,
    /// Bounding boxes must be strictly taller than this, after `top_offset`
    pub min_height: u32,
    /// Pixels trimmed from the top of every box to drop the stipule and
    /// petiole strip. 0 disables the trim.
    pub top_offset: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: [80, 80],
            binary_threshold: 128,
            max_binary_value: 255,
            inverse_threshold: 245,
            min_contour_area: 600_000.0,
            min_width: 400,
            min_height: 5_000,
            top_offset: 0,
        }
    }
}

/// Label field extractor parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum vertical midpoint gap (px) between two detections of one line
    pub grouping_threshold: f32,
    /// Fraction of linear size dropped from the label crop (0.9 keeps 10%)
    pub compression_ratio: f32,
    /// Detections whose whole text equals one of these are discarded
    pub ignored_texts: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            grouping_threshold: 100.0,
            compression_ratio: 0.9,
            // Printed marker on the label template, always picked up by OCR
            ignored_texts: vec!["T".to_string()],
        }
    }
}

/// How Tesseract words are turned into text detections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrGranularity {
    /// One detection per recognized word
    Word,
    /// One detection per recognized line, words joined by spaces
    Line,
}

/// Tesseract OCR settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit tesseract executable; searched on PATH when unset
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory; searched when unset
    pub tessdata_dir: Option<PathBuf>,
    /// Tesseract language code
    pub language: String,
    /// Tesseract page segmentation mode (11 = sparse text)
    pub page_segmentation_mode: u8,
    /// Word- or line-level detections
    pub granularity: OcrGranularity,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            language: "eng".to_string(),
            page_segmentation_mode: 11,
            granularity: OcrGranularity::Line,
        }
    }
}

/// External segmentation engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// ilastik launcher (`run_ilastik.sh` on Linux/macOS, `ilastik.exe` on Windows)
    pub ilastik_path: PathBuf,
    /// Trained pixel classification project (.ilp)
    pub project_path: Option<PathBuf>,
    /// Color space the project was trained on
    pub color_space: ColorSpace,
    /// ilastik export source name
    pub export_source: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            ilastik_path: PathBuf::from("run_ilastik.sh"),
            project_path: None,
            color_space: ColorSpace::Lab,
            export_source: "Simple Segmentation".to_string(),
        }
    }
}

/// Physical calibration for area measurement.
///
/// Labels have a known printed width, which gives the scanner resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Label width in pixels on the scan
    pub label_width_pixels: f64,
    /// Label width in millimetres
    pub label_width_mm: f64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            label_width_pixels: 700.0,
            label_width_mm: 12.7,
        }
    }
}

impl MeasurementConfig {
    /// Area covered by one pixel, in mm².
    pub fn pixel_area(&self) -> f64 {
        (self.label_width_mm / self.label_width_pixels).powi(2)
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub gate: GateConfig,
    pub detector: DetectorConfig,
    pub extractor: ExtractorConfig,
    pub ocr: OcrConfig,
    pub segmentation: SegmentationConfig,
    pub measurement: MeasurementConfig,
    /// Source images processed concurrently. Scans are several hundred
    /// megabytes once decoded, so keep this small.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            detector: DetectorConfig::default(),
            extractor: ExtractorConfig::default(),
            ocr: OcrConfig::default(),
            segmentation: SegmentationConfig::default(),
            measurement: MeasurementConfig::default(),
            workers: 2,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a JSON file, or returns defaults if the file
    /// doesn't exist. A file that exists but can't be read or parsed is an error.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "{} not found. Using default config.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;

        tracing::info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, config_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, json)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detector_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.blur_kernel_size, [80, 80]);
        assert_eq!(config.min_contour_area, 600_000.0);
        assert_eq!(config.min_width, 400);
        assert_eq!(config.min_height, 5_000);
        assert_eq!(config.top_offset, 0, "stipule trim is off by default");
    }

    #[test]
    fn test_pixel_area() {
        let measurement = MeasurementConfig::default();
        let expected = (12.7 / 700.0_f64).powi(2);
        assert!((measurement.pixel_area() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"detector": {"top_offset": 200}, "extractor": {"grouping_threshold": 50.0}, "workers": 4}"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();

        assert_eq!(config.detector.top_offset, 200);
        assert_eq!(config.detector.min_height, 5_000);
        assert_eq!(config.extractor.grouping_threshold, 50.0);
        assert_eq!(config.extractor.ignored_texts, vec!["T".to_string()]);
        assert_eq!(config.workers, 4);
        assert_eq!(config.gate, GateConfig::default());
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(PipelineConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PipelineConfig::default();
        config.segmentation.color_space = ColorSpace::Hsv;
        config.ocr.granularity = OcrGranularity::Word;
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"color_space\": \"hsv\""));
        assert!(content.contains("\"granularity\": \"word\""));
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }
}
