//! The `scanfix watch` command: correct scans as they arrive.

use anyhow::Context;
use clap::Args;
use scanfix_core::{Config, FileConfigStore, Scanfix};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::outcomes::emit_outcomes;

/// How long to wait for dispatched files after the watcher stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Arguments for the `watch` command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory to watch (defaults to the configured watch directory)
    pub dir: Option<PathBuf>,

    /// Output subdirectory name inside the watched directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Color profile to apply (defaults to the configured profile)
    #[arg(short, long)]
    pub profile: Option<PathBuf>,

    /// Quiet period before a new file is processed, in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Print recent outcomes as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Execute the watch command.
pub async fn execute(args: WatchArgs, config_path: &Path) -> anyhow::Result<()> {
    let store = FileConfigStore::open(config_path)?;
    let config = resolve_config(store.config(), &args)?;

    let dir = config.watch_dir().context(
        "No watch directory. Pass one, or set it with `scanfix config set-watch-dir <DIR>`",
    )?;
    if config.profile_path().is_none() {
        tracing::warn!("No color profile configured; using built-in parameters");
    }

    let scanfix = Scanfix::new(config)?;
    let watcher = scanfix.watcher()?;
    watcher.start()?;

    eprintln!(
        "Watching {} → {} (Ctrl-C to stop)",
        dir.display(),
        watcher.output_dir().display()
    );

    tokio::signal::ctrl_c().await?;
    eprintln!("Stopping...");
    watcher.stop().await;

    if !watcher.wait_idle(DRAIN_TIMEOUT).await {
        tracing::warn!(
            "{} file(s) still processing after {:?}",
            watcher.in_flight(),
            DRAIN_TIMEOUT
        );
    }

    emit_outcomes(&scanfix.pipeline().recent_outcomes(), args.json)
}

/// Apply command-line overrides on top of the stored configuration.
fn resolve_config(mut config: Config, args: &WatchArgs) -> anyhow::Result<Config> {
    if let Some(dir) = &args.dir {
        config.watch.dir = Some(dir.clone());
    }
    if let Some(name) = &args.output {
        config.watch.output_dir = name.clone();
    }
    if let Some(profile) = &args.profile {
        config.profile.path = Some(profile.clone());
    }
    if let Some(settle_ms) = args.settle_ms {
        config.watch.settle_ms = settle_ms;
    }
    config.validate()?;
    Ok(config)
}
