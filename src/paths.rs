//! Filesystem layout: the results workspace and input discovery.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

pub const RESULTS_DIR: &str = "Results";
pub const FILE_DIR: &str = "File";
pub const UNUSABLE_FILE_DIR: &str = "Unusable_File";
pub const LABELS_DIR: &str = "Labels";
pub const SEGMENTED_DIR: &str = "segmented_leaves";
pub const COLOR_SPACE_DIR: &str = "color_space";

pub const CONFIG_FILE: &str = "leaf_segmenter.json";
pub const LOG_FILE: &str = "leaf_segmenter.log";
pub const RESULTS_CSV: &str = "results.csv";
pub const SUMMARY_JSON: &str = "summary.json";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the default config path: `<exe_dir>/leaf_segmenter.json`
pub fn get_default_config_path() -> PathBuf {
    get_exe_dir().join(CONFIG_FILE)
}

/// Output directories of one run, all under `<output>/Results/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub results: PathBuf,
    pub files: PathBuf,
    pub unusable: PathBuf,
    pub labels: PathBuf,
    pub segmented: PathBuf,
}

impl Workspace {
    /// Lays out the workspace paths without touching the filesystem.
    pub fn at(output_dir: &Path) -> Self {
        let results = output_dir.join(RESULTS_DIR);
        Self {
            files: results.join(FILE_DIR),
            unusable: results.join(UNUSABLE_FILE_DIR),
            labels: results.join(LABELS_DIR),
            segmented: results.join(SEGMENTED_DIR),
            results,
        }
    }

    /// Creates the workspace directories.
    ///
    /// Fails if `Results/File` already exists so a previous run is never
    /// mixed with this one.
    pub fn create(output_dir: &Path) -> Result<Self> {
        let workspace = Self::at(output_dir);
        if workspace.files.exists() {
            bail!(
                "{} already exists; move or delete the previous results first",
                workspace.files.display()
            );
        }

        for dir in [
            &workspace.files,
            &workspace.unusable,
            &workspace.labels,
            &workspace.segmented,
        ] {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        Ok(workspace)
    }

    pub fn color_space_dir(&self) -> PathBuf {
        self.results.join(COLOR_SPACE_DIR)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.results.join(RESULTS_CSV)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.results.join(SUMMARY_JSON)
    }

    /// `Labels/Labels_<n>.jpg`
    pub fn label_path(&self, label_number: usize) -> PathBuf {
        self.labels.join(format!("Labels_{}.jpg", label_number))
    }

    /// Name of the `leaf_number`-th leaf of source image `label_number`.
    pub fn leaf_file_name(label_number: usize, leaf_number: usize) -> String {
        format!("{}_leaf{}.png", label_number, leaf_number)
    }

    pub fn leaf_path(&self, label_number: usize, leaf_number: usize) -> PathBuf {
        self.files.join(Self::leaf_file_name(label_number, leaf_number))
    }

    /// `Unusable_File/Unusable_File_<name>`
    pub fn unusable_path(&self, file_name: &str) -> PathBuf {
        self.unusable.join(format!("Unusable_File_{}", file_name))
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Lists image files directly inside `input_dir`, sorted by file name.
pub fn list_images(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read input directory {}", input_dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_create_layout() {
        let dir = tempdir().unwrap();
        let ws = Workspace::create(dir.path()).unwrap();

        let results = dir.path().join("Results");
        assert_eq!(ws.results, results);
        for name in ["File", "Unusable_File", "Labels", "segmented_leaves"] {
            assert!(results.join(name).is_dir(), "{} missing", name);
        }
        assert!(!ws.color_space_dir().exists());
    }

    #[test]
    fn test_workspace_refuses_existing_results() {
        let dir = tempdir().unwrap();
        Workspace::create(dir.path()).unwrap();
        assert!(Workspace::create(dir.path()).is_err());
    }

    #[test]
    fn test_workspace_file_names() {
        let ws = Workspace::at(Path::new("/out"));
        assert_eq!(ws.label_path(3), PathBuf::from("/out/Results/Labels/Labels_3.jpg"));
        assert_eq!(ws.leaf_path(3, 2), PathBuf::from("/out/Results/File/3_leaf2.png"));
        assert_eq!(
            ws.unusable_path("scan.jpg"),
            PathBuf::from("/out/Results/Unusable_File/Unusable_File_scan.jpg")
        );
        assert_eq!(ws.csv_path(), PathBuf::from("/out/Results/results.csv"));
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["b.JPG", "a.png", "c.jpeg", "notes.txt", "d.tif"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let images = list_images(dir.path()).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.png", "b.JPG", "c.jpeg"]);
    }

    #[test]
    fn test_list_images_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(list_images(&dir.path().join("missing")).is_err());
    }
}
