//! Pipeline orchestration: decode → transform → encode for one input file.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::history::{HistoryLog, DEFAULT_MAX_RECENT};
use crate::types::ProcessingOutcome;

use super::codec::ImageCodec;
use super::params::TransformParameters;
use super::transform::{SaturationContrast, Transform};

/// Runs the correction pipeline and records every attempt in the history log.
///
/// `process` may be called concurrently from watcher tasks and batch drivers.
/// Calls share only the history log and the parameter handle; parameters are
/// swapped as a whole `Arc`, so a call sees either the old or the new value.
pub struct ProcessingPipeline {
    codec: ImageCodec,
    transform: Arc<dyn Transform>,
    parameters: RwLock<Arc<TransformParameters>>,
    history: Arc<HistoryLog>,
    decode_timeout: Duration,
    permits: Option<Arc<Semaphore>>,
}

impl ProcessingPipeline {
    /// Create a pipeline with an explicit transform and starting parameters.
    pub fn new(
        config: &Config,
        transform: Arc<dyn Transform>,
        parameters: TransformParameters,
    ) -> Self {
        let permits = match config.processing.max_concurrent {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self {
            codec: ImageCodec::new(config.processing.jpeg_quality),
            transform,
            parameters: RwLock::new(Arc::new(parameters)),
            history: Arc::new(HistoryLog::new(DEFAULT_MAX_RECENT)),
            decode_timeout: Duration::from_millis(config.limits.decode_timeout_ms),
            permits,
        }
    }

    /// Create a pipeline with the default transform and the configured profile.
    ///
    /// Without a configured profile the built-in parameters are used.
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        let parameters = match config.profile_path() {
            Some(path) => TransformParameters::load(&path)?,
            None => TransformParameters::builtin(),
        };
        tracing::debug!("Initial transform parameters: {}", parameters.describe());
        Ok(Self::new(
            config,
            Arc::new(SaturationContrast::default()),
            parameters,
        ))
    }

    /// Share an existing history log instead of the pipeline's own.
    pub fn with_history(mut self, history: Arc<HistoryLog>) -> Self {
        self.history = history;
        self
    }

    /// Correct one image, writing `output_dir/<file name>`.
    ///
    /// The output directory must already exist. Exactly one outcome is
    /// recorded per call, on success and on failure.
    pub async fn process(&self, input: &Path, output_dir: &Path) -> PipelineResult<PathBuf> {
        let attempted_at = Utc::now();
        let start = Instant::now();
        let params = self.parameters();
        let output_path = output_path_for(input, output_dir);

        let permit = match &self.permits {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };

        tracing::info!("Processing image: {:?}", input);
        tracing::debug!("Transform: {}", self.transform.name());
        let result = self.run(input, &output_path, params, permit).await;

        let outcome = match &result {
            Ok(()) => ProcessingOutcome::success(
                input.to_path_buf(),
                output_path.clone(),
                attempted_at,
            ),
            Err(e) => ProcessingOutcome::failure(
                input.to_path_buf(),
                output_path.clone(),
                attempted_at,
                e.to_string(),
            ),
        };
        self.history.record(outcome);

        match result {
            Ok(()) => {
                tracing::info!(
                    "Successfully processed {:?} -> {:?} ({:.2}s)",
                    input,
                    output_path,
                    start.elapsed().as_secs_f64()
                );
                Ok(output_path)
            }
            Err(e) => {
                tracing::error!("Failed to process {:?}: {}", input, e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        input: &Path,
        output_path: &Path,
        params: Arc<TransformParameters>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> PipelineResult<()> {
        let format = ImageCodec::detect(input)?;
        let codec = self.codec;

        // Decode. The permit is held by the blocking task until the decode
        // returns, including after a timeout.
        let decode_start = Instant::now();
        let decode_path = input.to_path_buf();
        let decoded = timeout(self.decode_timeout, async {
            tokio::task::spawn_blocking(move || (codec.decode(&decode_path), permit)).await
        })
        .await;
        let (image, permit) = match decoded {
            Ok(Ok((Ok((image, _)), permit))) => (image, permit),
            Ok(Ok((Err(e), _))) => return Err(e),
            Ok(Err(e)) => {
                return Err(PipelineError::Decode {
                    path: input.to_path_buf(),
                    message: format!("Task join error: {}", e),
                })
            }
            Err(_) => {
                return Err(PipelineError::Timeout {
                    path: input.to_path_buf(),
                    stage: "decode".to_string(),
                    timeout_ms: self.decode_timeout.as_millis() as u64,
                })
            }
        };
        tracing::trace!("  Decode: {:?}", decode_start.elapsed());

        // Transform + encode
        let encode_start = Instant::now();
        let transform = Arc::clone(&self.transform);
        let source = input.to_path_buf();
        let destination = output_path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let corrected = transform
                .apply(&image, &params)
                .map_err(|e| attach_path(e, &source))?;
            codec.encode(&corrected, &destination, format)
        })
        .await
        .map_err(|e| PipelineError::Transform {
            path: input.to_path_buf(),
            message: format!("Task join error: {}", e),
        })??;
        tracing::trace!("  Transform+encode: {:?}", encode_start.elapsed());

        Ok(())
    }

    /// Load new parameters from a profile file and make them active.
    ///
    /// On failure the previous parameters stay active.
    pub fn update_parameters(&self, path: &Path) -> PipelineResult<()> {
        match TransformParameters::load(path) {
            Ok(params) => {
                self.set_parameters(params);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Keeping previous transform parameters: {}", e);
                Err(e)
            }
        }
    }

    /// Replace the active parameters; applies to calls that start afterwards.
    pub fn set_parameters(&self, params: TransformParameters) {
        tracing::info!("Transform parameters set to {}", params.describe());
        let mut slot = self
            .parameters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(params);
    }

    /// The currently active parameters.
    pub fn parameters(&self) -> Arc<TransformParameters> {
        let slot = self
            .parameters
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&slot)
    }

    /// Snapshot of the most recent outcomes, newest first.
    pub fn recent_outcomes(&self) -> Vec<ProcessingOutcome> {
        self.history.snapshot()
    }

    pub fn history(&self) -> Arc<HistoryLog> {
        Arc::clone(&self.history)
    }
}

/// Output location: the input's file name, unchanged, under `output_dir`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => output_dir.join(name),
        None => output_dir.join("unknown"),
    }
}

fn attach_path(err: PipelineError, source: &Path) -> PipelineError {
    match err {
        PipelineError::Transform { path, message } if path.as_os_str().is_empty() => {
            PipelineError::Transform {
                path: source.to_path_buf(),
                message,
            }
        }
        other => other,
    }
}
