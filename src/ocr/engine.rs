use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::{OcrConfig, OcrGranularity};
use crate::geometry::Quad;

/// One OCR hit: where the text is, what it says, and how sure the engine is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub quad: Quad,
    pub text: String,
    /// Engine confidence in 0.0..=1.0
    pub confidence: f32,
}

impl TextDetection {
    pub fn new(quad: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence,
        }
    }

    pub fn vertical_midpoint(&self) -> f32 {
        self.quad.vertical_midpoint()
    }

    pub fn horizontal_midpoint(&self) -> f32 {
        self.quad.horizontal_midpoint()
    }
}

/// Source of text detections for an image.
///
/// Implementations give no guarantee on detection order, confidence
/// calibration, or absence of duplicates.
pub trait TextReader: Send + Sync {
    fn read_text(&self, image: &RgbImage) -> Result<Vec<TextDetection>>;
}

/// Text reader backed by the Tesseract command-line tool.
///
/// Resolves the executable and tessdata once; every call then runs one
/// Tesseract process with TSV output.
#[derive(Debug, Clone)]
pub struct TesseractReader {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    language: String,
    page_segmentation_mode: u8,
    granularity: OcrGranularity,
}

impl TesseractReader {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
        let tessdata_dir = config
            .tessdata_dir
            .clone()
            .or_else(|| find_tessdata_dir(&config.language));

        match &tessdata_dir {
            Some(dir) => debug!("Using tessdata at {}", dir.display()),
            None => debug!("No tessdata directory found, relying on Tesseract defaults"),
        }

        Ok(Self {
            executable,
            tessdata_dir,
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            granularity: config.granularity,
        })
    }
}

impl TextReader for TesseractReader {
    fn read_text(&self, image: &RgbImage) -> Result<Vec<TextDetection>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(tessdata) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let output = command
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        let detections = parse_tsv_output(&tsv_content, self.granularity);
        debug!("Tesseract returned {} detections", detections.len());
        Ok(detections)
    }
}

/// A recognized word row from Tesseract TSV output.
#[derive(Debug, Clone)]
struct TsvWord {
    /// (page, block, paragraph, line)
    line_key: (i32, i32, i32, i32),
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    confidence: f32,
    text: String,
}

fn parse_tsv_words(tsv: &str) -> Vec<TsvWord> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let number = |i: usize| fields[i].trim().parse::<i32>().unwrap_or(-1);
        let (left, top) = (number(6) as f32, number(7) as f32);
        let (width, height) = (number(8) as f32, number(9) as f32);
        if left < 0.0 || top < 0.0 || width < 0.0 || height < 0.0 {
            continue;
        }

        words.push(TsvWord {
            line_key: (number(1), number(2), number(3), number(4)),
            left,
            top,
            right: left + width,
            bottom: top + height,
            confidence: conf,
            text: text.to_string(),
        });
    }

    words
}

/// Parses Tesseract TSV output into text detections.
///
/// Only word rows (level 5) with text and a non-negative confidence are used.
/// Confidence is rescaled from Tesseract's 0-100 to 0-1. In line mode, words
/// sharing a page/block/paragraph/line are merged into one detection covering
/// their union.
pub fn parse_tsv_output(tsv: &str, granularity: OcrGranularity) -> Vec<TextDetection> {
    let words = parse_tsv_words(tsv);

    if granularity == OcrGranularity::Word {
        return words
            .into_iter()
            .map(|w| {
                let quad = Quad::from_rect(w.left, w.top, w.right - w.left, w.bottom - w.top);
                TextDetection::new(quad, w.text, w.confidence / 100.0)
            })
            .collect();
    }

    let mut detections = Vec::new();
    let mut current: Option<(TsvWord, usize)> = None;

    for word in words {
        if let Some((line, count)) = current.as_mut() {
            if line.line_key == word.line_key {
                line.left = line.left.min(word.left);
                line.top = line.top.min(word.top);
                line.right = line.right.max(word.right);
                line.bottom = line.bottom.max(word.bottom);
                line.confidence += word.confidence;
                line.text.push(' ');
                line.text.push_str(&word.text);
                *count += 1;
                continue;
            }
        }

        // Moved to a new line: save the previous one
        if let Some((line, count)) = current.replace((word, 1)) {
            detections.push(line_detection(line, count));
        }
    }

    // Don't forget the last line
    if let Some((line, count)) = current {
        detections.push(line_detection(line, count));
    }

    detections
}

fn line_detection(line: TsvWord, word_count: usize) -> TextDetection {
    let quad = Quad::from_rect(
        line.left,
        line.top,
        line.right - line.left,
        line.bottom - line.top,
    );
    let avg_conf = line.confidence / word_count as f32;
    TextDetection::new(quad, line.text, avg_conf / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    fn sample() -> String {
        tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t2000\t3000\t-1\t",
            "4\t1\t1\t1\t1\t0\t100\t200\t400\t60\t-1\t",
            "5\t1\t1\t1\t1\t1\t100\t200\t150\t60\t91.5\tcode",
            "5\t1\t1\t1\t1\t2\t260\t205\t120\t50\t88.5\tchamp",
            "5\t1\t1\t1\t1\t3\t400\t210\t100\t40\t-1\t ",
            "5\t1\t1\t1\t2\t1\t110\t400\t90\t50\t75\tR1234",
        ])
    }

    #[test]
    fn test_parse_word_granularity() {
        let detections = parse_tsv_output(&sample(), OcrGranularity::Word);

        assert_eq!(detections.len(), 3);
        assert_eq!(detections[0].text, "code");
        assert_eq!(detections[0].quad.top_left(), Point::new(100.0, 200.0));
        assert_eq!(detections[0].quad.bottom_right(), Point::new(250.0, 260.0));
        assert!((detections[0].confidence - 0.915).abs() < 1e-6);
        assert_eq!(detections[2].text, "R1234");
    }

    #[test]
    fn test_parse_line_granularity_merges_words() {
        let detections = parse_tsv_output(&sample(), OcrGranularity::Line);

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].text, "code champ");
        assert_eq!(detections[0].quad.top_left(), Point::new(100.0, 200.0));
        assert_eq!(detections[0].quad.bottom_right(), Point::new(380.0, 260.0));
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(detections[1].text, "R1234");
        assert!((detections[1].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_parse_skips_malformed_rows() {
        let content = tsv(&["garbage", "5\t1\t1\t1\t1\t1\t10\t10", "5\t1\t1\t1\t1\t1\tx\t10\t5\t5\t90\tEPO"]);
        assert!(parse_tsv_output(&content, OcrGranularity::Word).is_empty());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_tsv_output("", OcrGranularity::Line).is_empty());
        assert!(parse_tsv_output(HEADER, OcrGranularity::Line).is_empty());
    }

    #[test]
    fn test_detection_midpoints() {
        let d = TextDetection::new(Quad::from_rect(0.0, 10.0, 100.0, 20.0), "M 12", 0.9);
        assert_eq!(d.vertical_midpoint(), 20.0);
        assert_eq!(d.horizontal_midpoint(), 50.0);
    }
}
