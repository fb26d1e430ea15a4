//! Leaf and label extraction from raw scans.

use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use image::imageops;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::csv_writer::LeafRecord;
use crate::config::{DetectorConfig, GateConfig};
use crate::detection::detect_leaves;
use crate::geometry::BoundingBox;
use crate::ocr::{LabelExtractor, LabelReading, TextReader};
use crate::paths::Workspace;

/// A usable scan with its position among usable files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub file_name: String,
    pub label_number: usize,
}

/// Result of sorting the input files before processing.
#[derive(Debug, Default)]
pub struct Triage {
    pub usable: Vec<SourceImage>,
    pub unusable: usize,
    pub failed: usize,
}

/// Result of processing all usable scans.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Leaf rows ordered by label number, then leaf number
    pub records: Vec<LeafRecord>,
    pub failed: usize,
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Applies the usability gate to every input and numbers the usable ones.
///
/// Only image headers are read. Unusable scans are copied into the
/// workspace; files whose header can't be read are counted as failed.
pub fn triage(images: &[PathBuf], gate: &GateConfig, workspace: &Workspace) -> Result<Triage> {
    let mut triage = Triage::default();

    for path in images {
        let file_name = file_name_of(path);
        let (width, height) = match image::image_dimensions(path) {
            Ok(dims) => dims,
            Err(e) => {
                warn!("Skipping {}: {}", file_name, e);
                triage.failed += 1;
                continue;
            }
        };

        if !gate.accepts_height(height) {
            info!(
                "{} is unusable ({}x{}), copied to {}",
                file_name,
                width,
                height,
                workspace.unusable.display()
            );
            let target = workspace.unusable_path(&file_name);
            fs::copy(path, &target)
                .with_context(|| format!("Failed to copy {} to {}", path.display(), target.display()))?;
            triage.unusable += 1;
            continue;
        }

        triage.usable.push(SourceImage {
            path: path.clone(),
            file_name,
            label_number: triage.usable.len() + 1,
        });
    }

    Ok(triage)
}

/// Runs leaf detection and label reading on the same scan concurrently.
fn analyze<R: TextReader>(
    image: &RgbImage,
    extractor: &LabelExtractor<R>,
    detector: &DetectorConfig,
) -> Result<(Vec<BoundingBox>, LabelReading)> {
    let (boxes, reading) = std::thread::scope(|s| {
        let detection = s.spawn(|| detect_leaves(image, detector));
        let reading = extractor.read_label(image);
        (detection.join(), reading)
    });

    let boxes = boxes.map_err(|_| anyhow!("Leaf detection panicked"))?;
    Ok((boxes, reading?))
}

/// Processes one usable scan: saves its label image and leaf crops and
/// returns one record per leaf.
pub fn process_image<R: TextReader>(
    source: &SourceImage,
    extractor: &LabelExtractor<R>,
    detector: &DetectorConfig,
    workspace: &Workspace,
) -> Result<Vec<LeafRecord>> {
    let image = image::open(&source.path)
        .with_context(|| format!("Failed to decode {}", source.path.display()))?
        .to_rgb8();

    let (boxes, reading) = analyze(&image, extractor, detector)?;

    if let Some(crop) = &reading.label_crop {
        let label_path = workspace.label_path(source.label_number);
        crop.save(&label_path)
            .with_context(|| format!("Failed to write {}", label_path.display()))?;
    }

    let mut records = Vec::with_capacity(boxes.len());
    for (j, bbox) in boxes.iter().enumerate() {
        let leaf_number = j + 1;
        let leaf_path = workspace.leaf_path(source.label_number, leaf_number);
        imageops::crop_imm(&image, bbox.x1, bbox.y1, bbox.width(), bbox.height())
            .to_image()
            .save(&leaf_path)
            .with_context(|| format!("Failed to write {}", leaf_path.display()))?;

        records.push(LeafRecord::new(
            &source.file_name,
            Workspace::leaf_file_name(source.label_number, leaf_number),
            source.label_number,
            leaf_number,
            &reading.fields,
        ));
    }

    info!(
        "{} -> label {}: {} leaves, fields {:?}",
        source.file_name,
        source.label_number,
        records.len(),
        reading.fields
    );

    Ok(records)
}

/// Processes all usable scans on a pool of `workers` threads.
///
/// A scan that fails is logged and counted; the others still complete.
pub fn extract_all<R: TextReader>(
    sources: &[SourceImage],
    extractor: &LabelExtractor<R>,
    detector: &DetectorConfig,
    workspace: &Workspace,
    workers: usize,
) -> Result<Extraction> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("Failed to build worker pool")?;
    debug!("Extracting {} images on {} workers", sources.len(), pool.current_num_threads());

    let results: Vec<Result<Vec<LeafRecord>>> = pool.install(|| {
        sources
            .par_iter()
            .map(|source| process_image(source, extractor, detector, workspace))
            .collect()
    });

    let mut extraction = Extraction::default();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(records) => extraction.records.extend(records),
            Err(e) => {
                warn!("Failed to process {}: {:#}", source.file_name, e);
                extraction.failed += 1;
            }
        }
    }

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::geometry::Quad;
    use crate::ocr::TextDetection;
    use image::Rgb;
    use tempfile::tempdir;

    struct FakeReader(Vec<TextDetection>);

    impl TextReader for FakeReader {
        fn read_text(&self, _image: &RgbImage) -> Result<Vec<TextDetection>> {
            Ok(self.0.clone())
        }
    }

    fn small_detector() -> DetectorConfig {
        DetectorConfig {
            blur_kernel_size: [1, 1],
            min_contour_area: 100.0,
            min_width: 10,
            min_height: 20,
            ..DetectorConfig::default()
        }
    }

    fn small_gate() -> GateConfig {
        GateConfig {
            min_height: 100,
            max_height: 300,
        }
    }

    fn scan() -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for (x0, y0, w, h) in [(120, 30, 40, 120), (20, 40, 30, 100)] {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    img.put_pixel(x, y, Rgb([40, 100, 30]));
                }
            }
        }
        img
    }

    #[test]
    fn test_triage_numbers_usable_files() {
        let dir = tempdir().unwrap();
        let ws = Workspace::create(&dir.path().join("out")).unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();

        let a = input.join("a.png");
        let b = input.join("b.png");
        let c = input.join("c.png");
        let broken = input.join("d.png");
        RgbImage::new(10, 150).save(&a).unwrap();
        RgbImage::new(10, 50).save(&b).unwrap();
        RgbImage::new(10, 300).save(&c).unwrap();
        fs::write(&broken, "not an image").unwrap();

        let triage = triage(&[a.clone(), b, c.clone(), broken], &small_gate(), &ws).unwrap();

        assert_eq!(triage.unusable, 1);
        assert_eq!(triage.failed, 1);
        assert_eq!(
            triage.usable,
            vec![
                SourceImage { path: a, file_name: "a.png".to_string(), label_number: 1 },
                SourceImage { path: c, file_name: "c.png".to_string(), label_number: 2 },
            ]
        );
        assert!(ws.unusable.join("Unusable_File_b.png").exists());
    }

    #[test]
    fn test_process_image_writes_leaves_and_label() {
        let dir = tempdir().unwrap();
        let ws = Workspace::create(dir.path()).unwrap();
        let path = dir.path().join("scan.png");
        scan().save(&path).unwrap();

        let reader = FakeReader(vec![
            TextDetection::new(Quad::from_rect(60.0, 160.0, 50.0, 20.0), "R77", 0.9),
            TextDetection::new(Quad::from_rect(60.0, 180.0, 50.0, 10.0), "EPO 3", 0.9),
        ]);
        let extractor = LabelExtractor::new(reader, ExtractorConfig {
            compression_ratio: 0.0,
            ..ExtractorConfig::default()
        })
        .unwrap();
        let source = SourceImage { path, file_name: "scan.png".to_string(), label_number: 4 };

        let records = process_image(&source, &extractor, &small_detector(), &ws).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].new_file_name, "4_leaf1.png");
        assert_eq!(records[1].leaf_number, 2);
        assert!(records.iter().all(|r| r.r.as_deref() == Some("77")));
        assert!(records.iter().all(|r| r.epo.as_deref() == Some("3")));

        let leaf1 = image::open(ws.leaf_path(4, 1)).unwrap();
        assert_eq!((leaf1.width(), leaf1.height()), (30, 100));
        let leaf2 = image::open(ws.leaf_path(4, 2)).unwrap();
        assert_eq!((leaf2.width(), leaf2.height()), (40, 120));

        let label = image::open(ws.label_path(4)).unwrap();
        assert_eq!((label.width(), label.height()), (50, 30));
    }

    #[test]
    fn test_process_image_without_text_writes_blank_label() {
        let dir = tempdir().unwrap();
        let ws = Workspace::create(dir.path()).unwrap();
        let path = dir.path().join("scan.png");
        scan().save(&path).unwrap();

        let extractor = LabelExtractor::new(FakeReader(Vec::new()), ExtractorConfig::default()).unwrap();
        let source = SourceImage { path, file_name: "scan.png".to_string(), label_number: 1 };

        let records = process_image(&source, &extractor, &small_detector(), &ws).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.r.is_none() && r.m.is_none()));
        let label = image::open(ws.label_path(1)).unwrap().to_luma8();
        assert_eq!(label.dimensions(), (200, 200));
        // JPEG may shift a flat black image by a level or two
        assert!(label.pixels().all(|p| p[0] <= 2));
    }

    #[test]
    fn test_extract_all_counts_failures_and_keeps_order() {
        let dir = tempdir().unwrap();
        let ws = Workspace::create(dir.path()).unwrap();

        let mut sources = Vec::new();
        for (i, name) in ["a.png", "b.png", "c.png"].iter().enumerate() {
            let path = dir.path().join(name);
            if i == 1 {
                fs::write(&path, "garbage").unwrap();
            } else {
                scan().save(&path).unwrap();
            }
            sources.push(SourceImage { path, file_name: name.to_string(), label_number: i + 1 });
        }
        let extractor = LabelExtractor::new(FakeReader(Vec::new()), ExtractorConfig::default()).unwrap();

        let extraction = extract_all(&sources, &extractor, &small_detector(), &ws, 2).unwrap();

        assert_eq!(extraction.failed, 1);
        let names: Vec<&str> = extraction.records.iter().map(|r| r.new_file_name.as_str()).collect();
        assert_eq!(names, vec!["1_leaf1.png", "1_leaf2.png", "3_leaf1.png", "3_leaf2.png"]);
    }
}
