//! Label field extraction from text detections.
//!
//! A label carries five fields. `R` and `P` are written with their letter
//! glued to the value; the others sit on a line next to a keyword, so they
//! are found by grouping detections into lines first.

use anyhow::Result;
use image::{GrayImage, RgbImage};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::engine::{TextDetection, TextReader};
use super::preprocess::label_crop;
use crate::config::ExtractorConfig;

/// Detections sharing one label line, sorted left to right.
pub type DetectionGroup = Vec<TextDetection>;

const CODE_CHAMP_KEYWORDS: &[&str] = &["code", "champ"];
const M_KEYWORDS: &[&str] = &["M"];
const EPO_KEYWORDS: &[&str] = &["EPO"];

/// Any run of decimal digits
const NUMBER_PATTERN: &str = r"\d+";

/// The five label fields. `None` means the field was not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelFields {
    pub r: Option<String>,
    pub p: Option<String>,
    pub code_champ: Option<String>,
    pub m: Option<String>,
    pub epo: Option<String>,
}

/// Fields decoded from one label plus the shrunk grayscale label image.
#[derive(Debug, Clone)]
pub struct LabelReading {
    pub fields: LabelFields,
    pub label_crop: Option<GrayImage>,
}

/// Stable sort by vertical midpoint, top of the label first.
pub fn sort_detections(detections: &mut [TextDetection]) {
    detections.sort_by(|a, b| a.vertical_midpoint().total_cmp(&b.vertical_midpoint()));
}

/// Drops detections whose whole text is one of `ignored`.
pub fn remove_unwanted(detections: Vec<TextDetection>, ignored: &[String]) -> Vec<TextDetection> {
    detections
        .into_iter()
        .filter(|d| !ignored.iter().any(|i| *i == d.text))
        .collect()
}

fn strip_first_char(text: &str) -> String {
    let mut chars = text.chars();
    chars.next();
    chars.as_str().to_string()
}

/// Text of the first detection starting with `prefix`, minus its first character.
pub fn first_value_starting_with(detections: &[TextDetection], prefix: char) -> Option<String> {
    detections
        .iter()
        .find(|d| d.text.starts_with(prefix))
        .map(|d| strip_first_char(&d.text))
}

/// Text of the last detection starting with `prefix`, minus its first character.
pub fn last_value_starting_with(detections: &[TextDetection], prefix: char) -> Option<String> {
    detections
        .iter()
        .rev()
        .find(|d| d.text.starts_with(prefix))
        .map(|d| strip_first_char(&d.text))
}

/// Drops every detection whose text starts with one of `prefixes`.
pub fn remove_starting_with(detections: Vec<TextDetection>, prefixes: &[char]) -> Vec<TextDetection> {
    detections
        .into_iter()
        .filter(|d| !prefixes.iter().any(|&p| d.text.starts_with(p)))
        .collect()
}

/// Splits vertically sorted detections into lines.
///
/// A new group starts whenever the vertical midpoint jumps by more than
/// `threshold` from the previous detection. Each group is then sorted by
/// horizontal midpoint.
pub fn group_detections(detections: Vec<TextDetection>, threshold: f32) -> Vec<DetectionGroup> {
    let mut groups: Vec<DetectionGroup> = Vec::new();
    let mut current: DetectionGroup = Vec::new();
    let mut previous_y: Option<f32> = None;

    for detection in detections {
        let y = detection.vertical_midpoint();
        if let Some(prev) = previous_y {
            if (y - prev).abs() > threshold {
                groups.push(std::mem::take(&mut current));
            }
        }
        previous_y = Some(y);
        current.push(detection);
    }

    if !current.is_empty() {
        groups.push(current);
    }

    for group in &mut groups {
        group.sort_by(|a, b| a.horizontal_midpoint().total_cmp(&b.horizontal_midpoint()));
    }

    groups
}

/// Number on the first line mentioning one of `keywords`.
///
/// Only the first group containing a keyword is searched; if its detections
/// hold no digits the field is absent even when a later group would match.
pub fn number_from_groups(
    groups: &[DetectionGroup],
    keywords: &[&str],
    number: &Regex,
) -> Option<String> {
    let group = groups
        .iter()
        .find(|g| g.iter().any(|d| keywords.iter().any(|k| d.text.contains(k))))?;

    group
        .iter()
        .find_map(|d| number.find(&d.text))
        .map(|m| m.as_str().to_string())
}

/// Decodes label fields, using an injected OCR reader.
pub struct LabelExtractor<R> {
    reader: R,
    config: ExtractorConfig,
    number: Regex,
}

impl<R: TextReader> LabelExtractor<R> {
    pub fn new(reader: R, config: ExtractorConfig) -> Result<Self> {
        Ok(Self {
            reader,
            config,
            number: Regex::new(NUMBER_PATTERN)?,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Runs OCR on the image, then decodes the detections.
    pub fn read_label(&self, image: &RgbImage) -> Result<LabelReading> {
        let detections = self.reader.read_text(image)?;
        debug!("OCR found {} text detections", detections.len());
        Ok(self.extract_label_fields(image, detections))
    }

    /// Decodes the five label fields from text detections.
    ///
    /// With no detections every field is absent and the crop is an all-black
    /// image of the input's size.
    pub fn extract_label_fields(
        &self,
        image: &RgbImage,
        mut detections: Vec<TextDetection>,
    ) -> LabelReading {
        if detections.is_empty() {
            return LabelReading {
                fields: LabelFields::default(),
                label_crop: Some(GrayImage::new(image.width(), image.height())),
            };
        }

        let crop = label_crop(image, &detections, self.config.compression_ratio);

        sort_detections(&mut detections);
        let detections = remove_unwanted(detections, &self.config.ignored_texts);

        let r = first_value_starting_with(&detections, 'R');
        // Stray P-prefixed text can appear above the real field
        let p = last_value_starting_with(&detections, 'P');

        let remaining = remove_starting_with(detections, &['R', 'P']);
        let groups = group_detections(remaining, self.config.grouping_threshold);

        let fields = LabelFields {
            r,
            p,
            code_champ: number_from_groups(&groups, CODE_CHAMP_KEYWORDS, &self.number),
            m: number_from_groups(&groups, M_KEYWORDS, &self.number),
            epo: number_from_groups(&groups, EPO_KEYWORDS, &self.number),
        };
        debug!("Label fields: {:?}", fields);

        LabelReading {
            fields,
            label_crop: crop,
        }
    }
}
