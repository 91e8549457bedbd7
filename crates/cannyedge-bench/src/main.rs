//! cannyedge-bench: CLI tool for edge pipeline experimentation and diagnostics.
//!
//! Runs the Canny pipeline on a given image file with configurable
//! parameters, printing per-stage timing and metrics. Useful for:
//!
//! - Tuning the smoothing kernel and threshold overrides
//! - Comparing auto thresholds across images
//! - Measuring per-step durations to identify bottlenecks
//! - Dumping every stage as PNG for visual inspection
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin cannyedge-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use cannyedge_pipeline::diagnostics::{PipelineDiagnostics, StdClock};
use cannyedge_pipeline::{KernelSize, PipelineParameters, Stage, StagedResult, Step};
use clap::Parser;

/// Edge pipeline experimentation and diagnostics.
///
/// Runs grayscale, smoothing, gradient, suppression, threshold and
/// hysteresis steps on an image and prints per-step diagnostics.
#[derive(Parser)]
#[command(name = "cannyedge-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Gaussian kernel size [default: 5]. Normalized to the nearest odd
    /// value in 3..=25.
    #[arg(long, allow_negative_numbers = true)]
    kernel_size: Option<i32>,

    /// Low threshold override (0-255). Omit for the auto value.
    #[arg(long)]
    low: Option<i32>,

    /// High threshold override (0-255). Omit for the auto value.
    #[arg(long)]
    high: Option<i32>,

    /// Only write this stage (0 original, 1 smoothed, 2 gradient
    /// magnitude, 3 suppressed, 4 final edges) to `--output-dir`.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(0..=u64::from(Stage::MAX_INDEX)))]
    stage: Option<u8>,

    /// Full pipeline parameters as a JSON string.
    ///
    /// When provided, `--kernel-size`, `--low` and `--high` are ignored.
    /// The JSON must be a valid `PipelineParameters` serialization.
    #[arg(long)]
    params_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Write stage images as PNG into this directory (first run only).
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

/// Build [`PipelineParameters`] from CLI arguments.
///
/// If `--params-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn parameters_from_cli(cli: &Cli) -> Result<PipelineParameters, String> {
    if let Some(ref json) = cli.params_json {
        return serde_json::from_str::<PipelineParameters>(json)
            .map(PipelineParameters::normalized)
            .map_err(|e| format!("Error parsing --params-json: {e}"));
    }

    let mut parameters = PipelineParameters {
        kernel_size: cli.kernel_size.map_or(KernelSize::DEFAULT, KernelSize::new),
        ..PipelineParameters::default()
    };
    parameters.set_thresholds(cli.low, cli.high);
    Ok(parameters)
}

/// Stages selected for PNG output.
fn stages_to_write(cli: &Cli) -> Vec<Stage> {
    cli.stage
        .and_then(Stage::from_index)
        .map_or_else(|| Stage::ALL.to_vec(), |stage| vec![stage])
}

/// File name for a stage image, e.g. `4-final-edges.png`.
fn stage_file_name(stage: Stage) -> String {
    let slug = stage.label().to_lowercase().replace(' ', "-");
    format!("{}-{slug}.png", stage.index())
}

/// Encode and write the selected stages. Errors are reported, not fatal.
fn write_stages(dir: &Path, staged: &StagedResult, stages: &[Stage]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Error creating {}: {e}", dir.display());
        return;
    }
    for &stage in stages {
        let path = dir.join(stage_file_name(stage));
        let png = match cannyedge_pipeline::render::encode_png(&staged.display(stage)) {
            Ok(png) => png,
            Err(e) => {
                eprintln!("Error encoding {stage}: {e}");
                continue;
            }
        };
        match std::fs::write(&path, &png) {
            Ok(()) => eprintln!("{stage} written to {} ({} bytes)", path.display(), png.len()),
            Err(e) => eprintln!("Error writing {}: {e}", path.display()),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let parameters = match parameters_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let original = match image::open(&cli.image_path) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        original.width(),
        original.height(),
    );
    eprintln!("Parameters: {parameters:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }
        tracing::debug!(run, "pipeline run starting");

        match cannyedge_pipeline::diagnostics::process_with_diagnostics(
            original.clone(),
            parameters,
            &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                if run == 0
                    && let Some(ref dir) = cli.output_dir
                {
                    write_stages(dir, &staged, &stages_to_write(&cli));
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| millis(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Step", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for step in Step::ALL {
        let step_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.get(step))
            .map(|s| millis(s.duration))
            .collect();

        if step_durations.is_empty() {
            continue;
        }

        let step_mean = step_durations.iter().sum::<f64>() / step_durations.len() as f64;
        println!("{:<24} {step_mean:>10.3}ms", step.label());
    }
}
