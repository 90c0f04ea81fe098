//! Core data types shared by the pipeline, the history log, and the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The recorded result of one `process` call.
///
/// Exactly one outcome is produced per call, whether it succeeded or not.
/// Outcomes are immutable once built; the history log owns them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    /// Base name of the source file (e.g. "scan1.jpg")
    pub source_file_name: String,

    /// When processing of this file started
    pub attempted_at: DateTime<Utc>,

    /// Full path of the source image
    pub source_path: PathBuf,

    /// Where the corrected image was (or would have been) written
    pub output_path: PathBuf,

    /// Whether the output was written
    pub succeeded: bool,

    /// Failure description, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ProcessingOutcome {
    /// Build a successful outcome.
    pub fn success(
        source_path: PathBuf,
        output_path: PathBuf,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_file_name: file_name_of(&source_path),
            attempted_at,
            source_path,
            output_path,
            succeeded: true,
            error_detail: None,
        }
    }

    /// Build a failed outcome with the given error detail.
    pub fn failure(
        source_path: PathBuf,
        output_path: PathBuf,
        attempted_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source_file_name: file_name_of(&source_path),
            attempted_at,
            source_path,
            output_path,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// Counters for a batch run over a directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchSummary {
    /// Files written successfully
    pub succeeded: usize,

    /// Files that failed to decode, transform, or encode
    pub failed: usize,

    /// Total processing time in seconds
    pub total_seconds: f64,
}

impl BatchSummary {
    /// Images per second over the whole run.
    pub fn rate(&self) -> f64 {
        if self.total_seconds > 0.0 {
            (self.succeeded + self.failed) as f64 / self.total_seconds
        } else {
            0.0
        }
    }
}

fn file_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome_has_no_detail() {
        let outcome = ProcessingOutcome::success(
            PathBuf::from("/scans/scan1.jpg"),
            PathBuf::from("/scans/fixed/scan1.jpg"),
            Utc::now(),
        );
        assert_eq!(outcome.source_file_name, "scan1.jpg");
        assert!(outcome.succeeded);
        assert!(outcome.error_detail.is_none());

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(!json.contains("error_detail"));
    }

    #[test]
    fn test_failure_outcome_keeps_detail() {
        let outcome = ProcessingOutcome::failure(
            PathBuf::from("/scans/broken.tiff"),
            PathBuf::from("/scans/fixed/broken.tiff"),
            Utc::now(),
            "Decode error",
        );
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_detail.as_deref(), Some("Decode error"));

        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: ProcessingOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }

    #[test]
    fn test_batch_summary_rate() {
        let summary = BatchSummary {
            succeeded: 8,
            failed: 2,
            total_seconds: 5.0,
        };
        assert!((summary.rate() - 2.0).abs() < f64::EPSILON);
        assert_eq!(BatchSummary::default().rate(), 0.0);
    }
}
