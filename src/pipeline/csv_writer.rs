//! CSV writer for per-leaf results.
//!
//! One row per extracted leaf: where it came from, the label fields read
//! from its source image, and the measured areas in mm².

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::ocr::LabelFields;
use crate::segmentation::ClassAreas;

/// CSV header row, in column order.
pub const CSV_HEADER: [&str; 13] = [
    "Original_File_Name",
    "New_File_Name",
    "Label",
    "Leaf_Number",
    "R",
    "P",
    "Code_Champ",
    "M",
    "EPO",
    "leaf_area",
    "healthy_leaf_area",
    "oidium_area",
    "rust_area",
];

/// One result row. Absent values are written as empty cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafRecord {
    #[serde(rename = "Original_File_Name")]
    pub original_file_name: String,
    #[serde(rename = "New_File_Name")]
    pub new_file_name: String,
    /// Number of the source image among usable files, from 1
    #[serde(rename = "Label")]
    pub label: usize,
    /// Position of the leaf in its source image, left to right, from 1
    #[serde(rename = "Leaf_Number")]
    pub leaf_number: usize,
    #[serde(rename = "R")]
    pub r: Option<String>,
    #[serde(rename = "P")]
    pub p: Option<String>,
    #[serde(rename = "Code_Champ")]
    pub code_champ: Option<String>,
    #[serde(rename = "M")]
    pub m: Option<String>,
    #[serde(rename = "EPO")]
    pub epo: Option<String>,
    pub leaf_area: Option<f64>,
    pub healthy_leaf_area: Option<f64>,
    pub oidium_area: Option<f64>,
    pub rust_area: Option<f64>,
}

impl LeafRecord {
    pub fn new(
        original_file_name: &str,
        new_file_name: String,
        label: usize,
        leaf_number: usize,
        fields: &LabelFields,
    ) -> Self {
        Self {
            original_file_name: original_file_name.to_string(),
            new_file_name,
            label,
            leaf_number,
            r: fields.r.clone(),
            p: fields.p.clone(),
            code_champ: fields.code_champ.clone(),
            m: fields.m.clone(),
            epo: fields.epo.clone(),
            leaf_area: None,
            healthy_leaf_area: None,
            oidium_area: None,
            rust_area: None,
        }
    }

    pub fn set_areas(&mut self, areas: &ClassAreas) {
        self.leaf_area = Some(areas.leaf);
        self.healthy_leaf_area = Some(areas.healthy);
        self.oidium_area = Some(areas.oidium);
        self.rust_area = Some(areas.rust);
    }
}

/// Writes all records to `path`, replacing any existing file.
///
/// The header is written even when there are no records.
pub fn write_results(path: &Path, records: &[LeafRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writer
        .write_record(CSV_HEADER)
        .context("Failed to write CSV header")?;
    for record in records {
        writer.serialize(record).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV file")?;

    Ok(())
}
