//! Leaf Segmenter command-line tool.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use leaf_segmenter::config::PipelineConfig;
use leaf_segmenter::detection::detect_leaves;
use leaf_segmenter::logging::{init_logging, install_panic_hook};
use leaf_segmenter::ocr::{LabelExtractor, TesseractReader, ensure_tessdata, find_tesseract_executable};
use leaf_segmenter::paths::{self, LOG_FILE};
use leaf_segmenter::pipeline::{self, RunOptions};
use leaf_segmenter::segmentation::{ColorSpace, IlastikSegmenter, Segmenter};

#[derive(Parser)]
#[command(name = "leaf-segmenter", version, about = "Leaf extraction, label reading and disease area measurement")]
struct Cli {
    /// Configuration file (defaults to leaf_segmenter.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a directory of scans
    Run {
        /// Directory containing the raw scans
        #[arg(short, long)]
        input: PathBuf,
        /// Directory where Results/ is created
        #[arg(short, long)]
        output: PathBuf,
        /// Trained ilastik project (.ilp)
        #[arg(short, long)]
        project: Option<PathBuf>,
        /// Color space the project was trained on
        #[arg(long, value_enum)]
        color_space: Option<ColorSpace>,
        /// Number of scans processed in parallel
        #[arg(long)]
        workers: Option<usize>,
        /// Stop after extracting leaves and labels
        #[arg(long)]
        skip_segmentation: bool,
    },
    /// Detect leaves and read the label of one scan, printing JSON
    Inspect {
        image: PathBuf,
    },
    /// Check Tesseract and download trained data if missing
    SetupOcr,
    /// Write the effective configuration as JSON
    WriteConfig {
        /// Target file (defaults to the config path)
        path: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<(PipelineConfig, PathBuf)> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(paths::get_default_config_path);
    let config = PipelineConfig::load(&path)?;
    Ok((config, path))
}

fn run(
    mut config: PipelineConfig,
    options: RunOptions,
    project: Option<PathBuf>,
    color_space: Option<ColorSpace>,
    workers: Option<usize>,
    skip_segmentation: bool,
) -> Result<()> {
    if let Some(project) = project {
        config.segmentation.project_path = Some(project);
    }
    if let Some(color_space) = color_space {
        config.segmentation.color_space = color_space;
    }
    if let Some(workers) = workers {
        config.workers = workers;
    }

    if !options.input_dir.is_dir() {
        bail!("Input directory not found: {}", options.input_dir.display());
    }

    // Fail before extraction if segmentation can't run at the end
    let segmenter = if skip_segmentation {
        None
    } else {
        Some(IlastikSegmenter::new(&config.segmentation)?)
    };

    let reader = TesseractReader::new(&config.ocr)?;
    let extractor = LabelExtractor::new(reader, config.extractor.clone())?;

    let summary = pipeline::run(
        &config,
        &extractor,
        segmenter.as_ref().map(|s| s as &dyn Segmenter),
        &options,
    )?;

    if summary.failed_images > 0 {
        warn!("{} images could not be processed", summary.failed_images);
    }
    Ok(())
}

fn inspect(config: &PipelineConfig, image_path: &Path) -> Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("Failed to open {}", image_path.display()))?
        .to_rgb8();

    let usable = config.gate.is_usable(&image);
    if !usable {
        warn!(
            "{} is outside the usable height range {}..={}",
            image_path.display(),
            config.gate.min_height,
            config.gate.max_height
        );
    }

    let reader = TesseractReader::new(&config.ocr)?;
    let extractor = LabelExtractor::new(reader, config.extractor.clone())?;
    let reading = extractor.read_label(&image)?;
    let leaves = detect_leaves(&image, &config.detector);

    let report = serde_json::json!({
        "file": image_path.display().to_string(),
        "width": image.width(),
        "height": image.height(),
        "usable": usable,
        "leaves": leaves,
        "fields": reading.fields,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn setup_ocr(config: &PipelineConfig) -> Result<()> {
    let executable = find_tesseract_executable(config.ocr.tesseract_path.as_deref())?;
    info!("Tesseract: {}", executable.display());

    let tessdata = match &config.ocr.tessdata_dir {
        Some(dir) => dir.clone(),
        None => ensure_tessdata(&config.ocr.language)?,
    };
    info!("Tessdata: {}", tessdata.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Command::Run { output, .. } => Some(output.join(LOG_FILE)),
        _ => None,
    };
    init_logging(log_file.as_deref())?;
    install_panic_hook();

    let (config, config_path) = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            input,
            output,
            project,
            color_space,
            workers,
            skip_segmentation,
        } => {
            let options = RunOptions {
                input_dir: input,
                output_dir: output,
            };
            run(config, options, project, color_space, workers, skip_segmentation)
        }
        Command::Inspect { image } => inspect(&config, &image),
        Command::SetupOcr => setup_ocr(&config),
        Command::WriteConfig { path } => {
            let path = path.unwrap_or(config_path);
            config.save(&path)?;
            info!("Config written to {}", path.display());
            Ok(())
        }
    }
}
