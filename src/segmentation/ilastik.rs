use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::Segmenter;
use crate::config::SegmentationConfig;

/// Suffix ilastik appends to each input nickname.
pub const MASK_SUFFIX: &str = "_Simple_Segmentation";

/// Mask file written for `input` inside `output_dir`.
pub fn mask_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    output_dir.join(format!("{}{}.png", stem, MASK_SUFFIX))
}

/// Segmenter running a trained ilastik pixel classification project in
/// headless mode.
#[derive(Debug, Clone)]
pub struct IlastikSegmenter {
    executable: PathBuf,
    project: PathBuf,
    export_source: String,
}

impl IlastikSegmenter {
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        let project = config
            .project_path
            .clone()
            .context("No ilastik project configured (set segmentation.project_path or pass --project)")?;
        if !project.exists() {
            bail!("ilastik project not found: {}", project.display());
        }

        Ok(Self {
            executable: config.ilastik_path.clone(),
            project,
            export_source: config.export_source.clone(),
        })
    }

    fn command(&self, inputs: &[PathBuf], output_dir: &Path) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("--headless")
            .arg(format!("--project={}", self.project.display()))
            .arg(format!("--export_source={}", self.export_source))
            .arg("--output_format=png")
            .arg(format!(
                "--output_filename_format={}",
                output_dir.join(format!("{{nickname}}{}.png", MASK_SUFFIX)).display()
            ))
            .args(inputs);
        command
    }
}

impl Segmenter for IlastikSegmenter {
    fn segment(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<()> {
        if inputs.is_empty() {
            debug!("No leaves to segment");
            return Ok(());
        }

        info!(
            "Running ilastik on {} leaves with project {}",
            inputs.len(),
            self.project.display()
        );

        let output = self
            .command(inputs, output_dir)
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ilastik failed ({}): {}", output.status, stderr.trim());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mask_path_for() {
        let mask = mask_path_for(Path::new("/r/File/3_leaf2.png"), Path::new("/r/segmented_leaves"));
        assert_eq!(
            mask,
            PathBuf::from("/r/segmented_leaves/3_leaf2_Simple_Segmentation.png")
        );
    }

    #[test]
    fn test_new_requires_project() {
        let config = SegmentationConfig::default();
        assert!(IlastikSegmenter::new(&config).is_err());

        let dir = tempdir().unwrap();
        let config = SegmentationConfig {
            project_path: Some(dir.path().join("missing.ilp")),
            ..SegmentationConfig::default()
        };
        assert!(IlastikSegmenter::new(&config).is_err());
    }

    #[test]
    fn test_command_arguments() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("leaves.ilp");
        std::fs::write(&project, "").unwrap();
        let config = SegmentationConfig {
            project_path: Some(project.clone()),
            ..SegmentationConfig::default()
        };
        let segmenter = IlastikSegmenter::new(&config).unwrap();

        let inputs = vec![PathBuf::from("a/1_leaf1.png"), PathBuf::from("a/1_leaf2.png")];
        let out = Path::new("out");
        let command = segmenter.command(&inputs, out);
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(command.get_program(), "run_ilastik.sh");
        assert_eq!(args[0], "--headless");
        assert_eq!(args[1], format!("--project={}", project.display()));
        assert_eq!(args[2], "--export_source=Simple Segmentation");
        assert_eq!(args[3], "--output_format=png");
        assert_eq!(
            args[4],
            format!(
                "--output_filename_format={}",
                out.join("{nickname}_Simple_Segmentation.png").display()
            )
        );
        assert_eq!(&args[5..], &["a/1_leaf1.png", "a/1_leaf2.png"]);
    }

    #[test]
    fn test_segment_without_inputs_skips_process() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("leaves.ilp");
        std::fs::write(&project, "").unwrap();
        let config = SegmentationConfig {
            ilastik_path: dir.path().join("does-not-exist"),
            project_path: Some(project),
            ..SegmentationConfig::default()
        };
        let segmenter = IlastikSegmenter::new(&config).unwrap();

        assert!(segmenter.segment(&[], dir.path()).is_ok());
        let inputs = vec![dir.path().join("x.png")];
        assert!(segmenter.segment(&inputs, dir.path()).is_err());
    }
}
