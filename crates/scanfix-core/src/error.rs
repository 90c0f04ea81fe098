//! Error types for the scanfix pipeline.
//!
//! Errors are organized by concern so that callers can tell a per-file
//! failure (which never stops a watch session or a batch) from a failure to
//! start watching or to load configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for scanfix operations.
#[derive(Error, Debug)]
pub enum ScanfixError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Per-file pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Directory watching errors
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Failed to persist the config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

/// Per-file processing errors.
///
/// All of these are local to a single `process` call: they end up in a failed
/// [`ProcessingOutcome`](crate::types::ProcessingOutcome) and are logged.
/// `ParameterLoad` is the exception, surfaced only by parameter swaps.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Extension is not one of tiff/tif/jpg/jpeg
    #[error("Unsupported format for {path}: {extension:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Source file unreadable or not a valid image container
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Output could not be encoded or written
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// The color transform rejected the image or its parameters
    #[error("Transform failed for {path}: {message}")]
    Transform { path: PathBuf, message: String },

    /// Transform parameters could not be read or parsed
    #[error("Failed to load transform parameters from {path}: {message}")]
    ParameterLoad { path: PathBuf, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },
}

/// Directory watching errors.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watch target is missing, not a directory, or cannot be subscribed to
    #[error("Cannot watch {path}: {message}")]
    Subscription { path: PathBuf, message: String },
}

/// Convenience type alias for scanfix results.
pub type Result<T> = std::result::Result<T, ScanfixError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
