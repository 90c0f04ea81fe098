//! Scanfix Core - color correction for freshly scanned images.
//!
//! Scanfix watches a directory for new TIFF and JPEG scans, runs each one
//! through a color-correction transform, and writes the result to an output
//! subdirectory. A bounded history of recent outcomes is kept in memory.
//!
//! # Architecture
//!
//! ```text
//! notify event → DirectoryWatcher → ProcessingPipeline → Decode → Transform → Encode
//!                                                      ↘ HistoryLog
//! ```
//!
//! Batch and single-file callers skip the watcher and call the pipeline
//! directly.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scanfix_core::{Config, Scanfix};
//!
//! #[tokio::main]
//! async fn main() -> scanfix_core::Result<()> {
//!     let config = Config::load()?;
//!     let scanfix = Scanfix::new(config)?;
//!
//!     let watcher = scanfix.watcher()?;
//!     watcher.start()?;
//!     tokio::signal::ctrl_c().await?;
//!     watcher.stop().await;
//!
//!     for outcome in scanfix.pipeline().recent_outcomes() {
//!         println!("{} {}", outcome.source_file_name, outcome.succeeded);
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod types;
pub mod watcher;

// Re-exports for convenient access
pub use config::{Config, ConfigStore, FileConfigStore};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, ScanfixError, WatchError};
pub use history::HistoryLog;
pub use pipeline::{ProcessingPipeline, Transform, TransformParameters};
pub use types::{BatchSummary, ProcessingOutcome};
pub use watcher::{DirectoryWatcher, WatchState};

use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scanfix instance - a configuration plus the pipeline built from it.
pub struct Scanfix {
    config: Config,
    pipeline: Arc<ProcessingPipeline>,
}

impl Scanfix {
    /// Create a new instance, loading the configured profile if any.
    pub fn new(config: Config) -> Result<Self> {
        tracing::debug!("Initializing scanfix v{}", VERSION);
        let pipeline = Arc::new(ProcessingPipeline::from_config(&config)?);
        Ok(Self { config, pipeline })
    }

    /// Create a new instance from the default config file.
    pub fn with_defaults() -> Result<Self> {
        let config = Config::load()?;
        Self::new(config)
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the processing pipeline.
    pub fn pipeline(&self) -> &Arc<ProcessingPipeline> {
        &self.pipeline
    }

    /// A watcher over the configured watch directory, sharing this pipeline.
    pub fn watcher(&self) -> Result<DirectoryWatcher> {
        let watcher = DirectoryWatcher::from_config(&self.config, Arc::clone(&self.pipeline))?;
        Ok(watcher)
    }
}
