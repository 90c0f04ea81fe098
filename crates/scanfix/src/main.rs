//! Scanfix CLI - color-correct scans as they land in a folder.
//!
//! Scanfix watches a directory for new TIFF and JPEG scans and writes a
//! color-corrected copy of each one into an output subdirectory.
//!
//! # Usage
//!
//! ```bash
//! # Watch the configured scan folder until Ctrl-C
//! scanfix watch
//!
//! # Watch a specific folder with a given profile
//! scanfix watch ~/Scans --profile ~/profiles/scanner.icc
//!
//! # Correct a single file or every scan in a folder
//! scanfix process ~/Scans/scan1.tif
//! scanfix process ~/Scans/
//!
//! # View or edit configuration
//! scanfix config show
//! scanfix config set-watch-dir ~/Scans
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Scanfix - color-correct scanned images as they arrive.
#[derive(Parser, Debug)]
#[command(name = "scanfix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "SCANFIX_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a folder and correct new scans until interrupted
    Watch(cli::watch::WatchArgs),

    /// Correct a single image or every image in a folder
    Process(cli::process::ProcessArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// Open the output folder in the file manager
    Open(cli::open::OpenArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(scanfix_core::config::expand_tilde)
        .unwrap_or_else(scanfix_core::Config::default_path);

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = if config_path.exists() {
        match scanfix_core::Config::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. \
                     Check your config file with `scanfix config path`."
                );
                scanfix_core::Config::default()
            }
        }
    } else {
        scanfix_core::Config::default()
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs, cli.log_file.as_deref());

    tracing::debug!("Scanfix v{}", scanfix_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Watch(args) => cli::watch::execute(args, &config_path).await,
        Commands::Process(args) => cli::process::execute(args, &config_path).await,
        Commands::Config(args) => cli::config::execute(args, &config_path).await,
        Commands::Open(args) => cli::open::execute(args, &config_path).await,
    }
}
