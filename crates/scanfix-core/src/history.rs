//! Bounded, thread-safe log of recent processing outcomes.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::types::ProcessingOutcome;

/// Number of outcomes a pipeline keeps.
pub const DEFAULT_MAX_RECENT: usize = 10;

/// Ring of the last N outcomes, newest first.
///
/// Recording is the only mutation. Reads hand out a copied snapshot, so a
/// reader iterating the result never sees an append land mid-iteration.
#[derive(Debug)]
pub struct HistoryLog {
    entries: Mutex<VecDeque<ProcessingOutcome>>,
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECENT)
    }
}

impl HistoryLog {
    /// Create a log that keeps at most `capacity` outcomes (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Insert an outcome as the newest entry, evicting the oldest past capacity.
    pub fn record(&self, outcome: ProcessingOutcome) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(outcome);
        entries.truncate(self.capacity);
    }

    /// Copy of the current entries, newest first.
    pub fn snapshot(&self) -> Vec<ProcessingOutcome> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }

    /// The most recently recorded outcome, if any.
    pub fn latest(&self) -> Option<ProcessingOutcome> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn outcome(name: &str) -> ProcessingOutcome {
        ProcessingOutcome::success(
            PathBuf::from("/scans").join(name),
            PathBuf::from("/scans/fixed").join(name),
            Utc::now(),
        )
    }

    #[test]
    fn test_newest_first() {
        let log = HistoryLog::default();
        log.record(outcome("a.jpg"));
        log.record(outcome("b.jpg"));

        let snapshot = log.snapshot();
        assert_eq!(snapshot[0].source_file_name, "b.jpg");
        assert_eq!(snapshot[1].source_file_name, "a.jpg");
        assert_eq!(log.latest().unwrap().source_file_name, "b.jpg");
    }

    #[test]
    fn test_bounded_to_capacity() {
        let log = HistoryLog::default();
        for i in 0..25 {
            log.record(outcome(&format!("scan{i}.jpg")));
        }

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), DEFAULT_MAX_RECENT);
        let names: Vec<_> = snapshot.iter().map(|o| o.source_file_name.as_str()).collect();
        let expected: Vec<String> = (15..25).rev().map(|i| format!("scan{i}.jpg")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let log = HistoryLog::new(3);
        log.record(outcome("a.jpg"));
        let snapshot = log.snapshot();
        log.record(outcome("b.jpg"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let log = HistoryLog::new(0);
        log.record(outcome("a.jpg"));
        log.record(outcome("b.jpg"));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_records() {
        let log = Arc::new(HistoryLog::new(50));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..5 {
                        log.record(outcome(&format!("t{t}_{i}.jpg")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 40);
    }
}
