//! Command-line inference over image files.
//!
//! ```bash
//! neuroscan --profile lenient scans/a.png scans/b.jpg
//! neuroscan --validate-only --compact scans/*.png
//! ```
//!
//! Settings come from the environment (and `.env`); flags override them.
//! Results are printed to stdout as a JSON array, logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::error;

use neuroscan::config::{Settings, ValidationProfile};
use neuroscan::imaging;
use neuroscan::logging::init_tracing;
use neuroscan::{InferencePipeline, Status, ValidationResult};

#[derive(Parser)]
#[command(name = "neuroscan", version)]
#[command(about = "Validate brain MRI scans and classify tumor type")]
struct Cli {
    /// Image files to process.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Validation profile: strict or lenient.
    #[arg(long)]
    profile: Option<ValidationProfile>,

    /// Model artifact (JSON dense network).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Side length of the classifier input.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    image_size: Option<u32>,

    /// Only run the validation gate.
    #[arg(long)]
    validate_only: bool,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

#[derive(Serialize)]
struct ValidationReport {
    image_path: String,
    #[serde(flatten)]
    result: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("neuroscan: {e}");
            return ExitCode::from(2);
        }
    };
    init_tracing(&settings.log_filter);

    if let Some(profile) = cli.profile {
        settings.profile = profile;
        settings.thresholds = profile.thresholds();
    }
    if let Some(model) = cli.model {
        settings.model_path = model;
    }
    if let Some(size) = cli.image_size {
        settings.image_size = size;
    }

    let pipeline = InferencePipeline::from_settings(&settings);

    let (json, failed) = if cli.validate_only {
        let reports: Vec<ValidationReport> = cli.images.iter().map(|p| validate_one(&pipeline, p)).collect();
        let failed = reports.iter().any(|r| r.error.is_some());
        (render(&reports, cli.compact), failed)
    } else {
        let results = pipeline.predict_batch(&cli.images);
        let failed = results.iter().any(|r| r.status == Status::Error);
        (render(&results, cli.compact), failed)
    };

    match json {
        Ok(text) => println!("{text}"),
        Err(e) => {
            error!(error = %e, "cannot serialise results");
            return ExitCode::FAILURE;
        }
    }
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn validate_one(pipeline: &InferencePipeline, path: &Path) -> ValidationReport {
    let image_path = path.to_string_lossy().into_owned();
    let outcome = imaging::read_file(path).and_then(|bytes| pipeline.validate(&bytes));
    match outcome {
        Ok(result) => ValidationReport { image_path, result: Some(result), error: None },
        Err(e) => ValidationReport { image_path, result: None, error: Some(e.to_string()) },
    }
}

fn render<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}
