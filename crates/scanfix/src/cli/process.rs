//! The `scanfix process` command for correcting a file or a folder of scans.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use scanfix_core::pipeline::{DiscoveredFile, FileDiscovery, ProcessingPipeline};
use scanfix_core::{BatchSummary, Config, FileConfigStore};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::outcomes::emit_outcomes;

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Image file or directory to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output subdirectory name, created next to the input
    #[arg(short, long)]
    pub output: Option<String>,

    /// Color profile to apply (defaults to the configured profile)
    #[arg(short, long)]
    pub profile: Option<PathBuf>,

    /// Print recent outcomes as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, config_path: &Path) -> anyhow::Result<()> {
    let store = FileConfigStore::open(config_path)?;
    let mut config = store.config();
    if let Some(name) = &args.output {
        config.watch.output_dir = name.clone();
    }
    if let Some(profile) = &args.profile {
        config.profile.path = Some(profile.clone());
    }
    config.validate()?;

    let profile = config.profile_path().context(
        "A color profile is required. Pass --profile or run `scanfix config set-profile <PATH>`",
    )?;
    if !profile.is_file() {
        anyhow::bail!("Color profile not found: {}", profile.display());
    }

    let pipeline = ProcessingPipeline::from_config(&config)?;
    let input = scanfix_core::config::expand_tilde(&args.input);

    if input.is_file() {
        process_single(&pipeline, &input, &config, args.json).await
    } else if input.is_dir() {
        process_directory(&pipeline, &input, &config, args.json).await
    } else {
        anyhow::bail!("Input not found: {}", input.display())
    }
}

// ── Single-file processing ─────────────────────────────────────────────────

async fn process_single(
    pipeline: &ProcessingPipeline,
    input: &Path,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    let parent = match input.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let output_dir = parent.join(&config.watch.output_dir);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;

    let result = pipeline.process(input, &output_dir).await;
    if json {
        emit_outcomes(&pipeline.recent_outcomes(), true)?;
    }
    let output = result?;
    eprintln!("Corrected scan written to {}", output.display());
    Ok(())
}

// ── Batch processing ───────────────────────────────────────────────────────

async fn process_directory(
    pipeline: &ProcessingPipeline,
    dir: &Path,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    let files = FileDiscovery::discover(dir);
    if files.is_empty() {
        tracing::warn!("No supported image files found in {:?}", dir);
        return Ok(());
    }
    tracing::info!(
        "Found {} image(s) to process ({:.1} MB)",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0
    );

    let output_dir = dir.join(&config.watch.output_dir);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;

    let progress = create_progress_bar(files.len() as u64);
    let summary = run_batch(pipeline, &files, &output_dir, &progress).await;
    progress.finish_and_clear();

    print_summary(&summary);
    emit_outcomes(&pipeline.recent_outcomes(), json)
}

/// Process files one after another; a failed file never stops the batch.
async fn run_batch(
    pipeline: &ProcessingPipeline,
    files: &[DiscoveredFile],
    output_dir: &Path,
    progress: &ProgressBar,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let start_time = Instant::now();

    for file in files {
        match pipeline.process(&file.path, output_dir).await {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!("Failed: {:?} - {}", file.path, e);
            }
        }

        // Update progress bar with rate
        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let processed = summary.succeeded + summary.failed;
            progress.set_message(format!("{:.1} img/sec", processed as f64 / elapsed));
        }
    }

    summary.total_seconds = start_time.elapsed().as_secs_f64();
    summary
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(concat!(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] ",
            "{pos}/{len} ({percent}%) {msg}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after batch processing.
fn print_summary(summary: &BatchSummary) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.succeeded + summary.failed);
    eprintln!("    Duration:     {:>7.1}s", summary.total_seconds);
    eprintln!("    Rate:         {:>7.1} img/sec", summary.rate());
    eprintln!("  ====================================");
}
