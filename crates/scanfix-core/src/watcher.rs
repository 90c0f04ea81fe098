//! Directory watcher that feeds newly arrived scans into the pipeline.
//!
//! Raw `notify` events are coalesced by `notify-debouncer-full`, which only
//! hands over a path once it has been quiet for the settle period, so a file
//! that is still being written is dispatched once, after the writer is done.
//! Settled batches are forwarded into a tokio channel and consumed by a single
//! event loop task. Each dispatch runs on its own task.

use notify::event::{CreateKind, ModifyKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::WatchError;
use crate::pipeline::{is_supported, ProcessingPipeline};

/// Default quiet period before a changed file is dispatched.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// Shortest settle period the debouncer is given.
const MIN_SETTLE: Duration = Duration::from_millis(10);

/// Upper bound on the debouncer's poll interval; `stop` waits at most this long.
const MAX_TICK: Duration = Duration::from_millis(100);

/// Lifecycle of a [`DirectoryWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchState::Created => "created",
            WatchState::Running => "running",
            WatchState::Stopping => "stopping",
            WatchState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Resources owned by the running session; released together on stop.
struct Session {
    debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
    shutdown: oneshot::Sender<()>,
    event_loop: JoinHandle<()>,
}

/// Watches one directory and processes supported images written into it.
///
/// Corrected files go to `output_dir`, which is created on start and never
/// dispatched from. A watcher runs at most once: after `stop` it stays
/// `Stopped` and `start` is rejected.
pub struct DirectoryWatcher {
    dir: PathBuf,
    output_dir: PathBuf,
    settle: Duration,
    pipeline: Arc<ProcessingPipeline>,
    state: Mutex<WatchState>,
    session: Mutex<Option<Session>>,
    in_flight: Arc<AtomicUsize>,
}

impl DirectoryWatcher {
    pub fn new(
        dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        pipeline: Arc<ProcessingPipeline>,
    ) -> Self {
        Self {
            dir: dir.into(),
            output_dir: output_dir.into(),
            settle: DEFAULT_SETTLE,
            pipeline,
            state: Mutex::new(WatchState::Created),
            session: Mutex::new(None),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build a watcher for the configured watch directory.
    pub fn from_config(
        config: &Config,
        pipeline: Arc<ProcessingPipeline>,
    ) -> Result<Self, WatchError> {
        let (dir, output_dir) = match (config.watch_dir(), config.full_output_dir()) {
            (Some(dir), Some(output_dir)) => (dir, output_dir),
            _ => {
                return Err(WatchError::Subscription {
                    path: PathBuf::new(),
                    message: "no watch directory configured".to_string(),
                })
            }
        };
        Ok(Self::new(dir, output_dir, pipeline)
            .with_settle(Duration::from_millis(config.watch.settle_ms)))
    }

    /// Set the quiet period a path must see before it is dispatched.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn pipeline(&self) -> &Arc<ProcessingPipeline> {
        &self.pipeline
    }

    pub fn state(&self) -> WatchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of dispatched files whose processing has not finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: WatchState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Subscribe to the directory and start the event loop.
    ///
    /// Must be called from within a tokio runtime. On failure a `Created`
    /// watcher stays `Created` and `start` may be retried. A watcher that has
    /// been stopped cannot be started again.
    pub fn start(&self) -> Result<(), WatchError> {
        // State changes happen with the session lock held.
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        match self.state() {
            WatchState::Created => {}
            WatchState::Running => {
                return Err(self.subscription_error("watcher is already running"))
            }
            WatchState::Stopping | WatchState::Stopped => {
                return Err(self.subscription_error("watcher has been stopped"))
            }
        }

        match std::fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(self.subscription_error("not a directory")),
            Err(e) => return Err(self.subscription_error(e.to_string())),
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| WatchError::Subscription {
            path: self.output_dir.clone(),
            message: format!("cannot create output directory: {}", e),
        })?;

        let settle = self.settle.max(MIN_SETTLE);
        let tick = (settle / 4).min(MAX_TICK);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(settle, Some(tick), move |result: DebounceEventResult| {
            // Receiver is gone once the session has stopped.
            let _ = tx.send(result);
        })
        .map_err(|e| self.subscription_error(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| self.subscription_error(e.to_string()))?;

        let mut excluded = vec![self.output_dir.clone()];
        if let Ok(canonical) = std::fs::canonicalize(&self.output_dir) {
            if canonical != self.output_dir {
                excluded.push(canonical);
            }
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let event_loop = EventLoop {
            batches: rx,
            shutdown: shutdown_rx,
            pipeline: Arc::clone(&self.pipeline),
            output_dir: self.output_dir.clone(),
            excluded,
            in_flight: Arc::clone(&self.in_flight),
        };
        let handle = tokio::spawn(event_loop.run());

        *session = Some(Session {
            debouncer,
            shutdown: shutdown_tx,
            event_loop: handle,
        });
        self.set_state(WatchState::Running);
        tracing::info!(
            "Watching {:?} (output: {:?}, settle: {:?})",
            self.dir,
            self.output_dir,
            settle
        );
        Ok(())
    }

    /// Stop watching and release the subscription. Calling it again is a no-op.
    ///
    /// Settled batches already delivered are dispatched before the event loop
    /// exits; changes still inside the settle window are dropped. Dispatched
    /// processing may still be in flight when this returns.
    pub async fn stop(&self) {
        let session = {
            let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let session = slot.take();
            if session.is_some() {
                self.set_state(WatchState::Stopping);
            }
            session
        };
        let Some(Session {
            debouncer,
            shutdown,
            event_loop,
        }) = session
        else {
            return;
        };

        // Joins the debouncer thread, which drops the OS watch.
        if let Err(e) = tokio::task::spawn_blocking(move || debouncer.stop()).await {
            tracing::warn!("Debouncer shutdown failed: {}", e);
        }
        let _ = shutdown.send(());
        if let Err(e) = event_loop.await {
            tracing::warn!("Watch loop ended abnormally: {}", e);
        }
        self.set_state(WatchState::Stopped);
        tracing::info!("Stopped watching {:?}", self.dir);
    }

    /// Wait until no dispatched file is still being processed.
    ///
    /// Returns `false` if work is still in flight after `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }

    fn subscription_error(&self, message: impl Into<String>) -> WatchError {
        WatchError::Subscription {
            path: self.dir.clone(),
            message: message.into(),
        }
    }
}

struct EventLoop {
    batches: mpsc::UnboundedReceiver<DebounceEventResult>,
    shutdown: oneshot::Receiver<()>,
    pipeline: Arc<ProcessingPipeline>,
    output_dir: PathBuf,
    excluded: Vec<PathBuf>,
    in_flight: Arc<AtomicUsize>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = &mut self.shutdown => break,
                received = self.batches.recv() => match received {
                    Some(batch) => self.handle(batch),
                    None => break,
                },
            }
        }

        while let Ok(batch) = self.batches.try_recv() {
            self.handle(batch);
        }
    }

    fn handle(&self, batch: DebounceEventResult) {
        let events = match batch {
            Ok(events) => events,
            Err(errors) => {
                for e in errors {
                    tracing::warn!("Watch backend error: {}", e);
                }
                return;
            }
        };

        let mut paths = BTreeSet::new();
        for event in events.iter().filter(|e| is_significant(&e.kind)) {
            for path in &event.paths {
                if accepts(path, &self.excluded) {
                    tracing::debug!("Change detected: {:?}", path);
                    paths.insert(path.clone());
                }
            }
        }
        for path in paths {
            self.dispatch(path);
        }
    }

    fn dispatch(&self, path: PathBuf) {
        if !path.is_file() {
            tracing::debug!("Skipping {:?}: no longer a file", path);
            return;
        }

        tracing::info!("Dispatching {:?}", path);
        let guard = InFlight::enter(&self.in_flight);
        let pipeline = Arc::clone(&self.pipeline);
        let output_dir = self.output_dir.clone();
        tokio::spawn(async move {
            let _guard = guard;
            // Failures are logged and recorded by the pipeline.
            let _ = pipeline.process(&path, &output_dir).await;
        });
    }
}

/// Counts one in-flight dispatch for as long as it is alive.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Only file creation and content modification trigger processing.
fn is_significant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other)
    )
}

fn accepts(path: &Path, excluded: &[PathBuf]) -> bool {
    !excluded.iter().any(|dir| path.starts_with(dir)) && is_supported(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::{ImageCodec, RasterFormat, Transform, TransformParameters};
    use crate::types::ProcessingOutcome;
    use image::{DynamicImage, Rgb, RgbImage};
    use notify::event::{AccessKind, DataChange, RemoveKind, RenameMode};
    use std::sync::Condvar;

    /// Passes images through, but only once the gate has been opened.
    #[derive(Default)]
    struct GatedTransform {
        open: Mutex<bool>,
        opened: Condvar,
    }

    impl GatedTransform {
        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.opened.notify_all();
        }
    }

    impl Transform for GatedTransform {
        fn apply(
            &self,
            image: &DynamicImage,
            _params: &TransformParameters,
        ) -> Result<DynamicImage, PipelineError> {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.opened.wait(open).unwrap();
            }
            Ok(image.clone())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
            Rgb([(x * 4) as u8, (y * 5) as u8, 120])
        }))
    }

    fn write_image(path: &Path, format: RasterFormat) {
        ImageCodec::default()
            .encode(&sample_image(), path, format)
            .unwrap();
    }

    fn watcher_for(dir: &Path, settle_ms: u64) -> DirectoryWatcher {
        let pipeline = Arc::new(ProcessingPipeline::from_config(&Config::default()).unwrap());
        DirectoryWatcher::new(dir, dir.join("fixed"), pipeline)
            .with_settle(Duration::from_millis(settle_ms))
    }

    async fn wait_for_outcomes(watcher: &DirectoryWatcher, count: usize) -> Vec<ProcessingOutcome> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let outcomes = watcher.pipeline().recent_outcomes();
            if outcomes.len() >= count || Instant::now() >= deadline {
                return outcomes;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_new_scan_is_corrected() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_for(dir.path(), 50);
        watcher.start().unwrap();
        assert_eq!(watcher.state(), WatchState::Running);
        assert!(dir.path().join("fixed").is_dir());

        write_image(&dir.path().join("scan1.jpg"), RasterFormat::Jpeg);

        let outcomes = wait_for_outcomes(&watcher, 1).await;
        assert!(watcher.wait_idle(Duration::from_secs(10)).await);
        assert_eq!(outcomes[0].source_file_name, "scan1.jpg");
        assert!(outcomes[0].succeeded);
        assert!(dir.path().join("fixed").join("scan1.jpg").exists());

        watcher.stop().await;
        assert_eq!(watcher.state(), WatchState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_only_supported_files_are_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_for(dir.path(), 50);
        watcher.start().unwrap();

        std::fs::write(dir.path().join("a.txt"), b"notes").unwrap();
        std::fs::write(dir.path().join("b.png"), b"not handled").unwrap();
        write_image(&dir.path().join("fixed").join("old.jpg"), RasterFormat::Jpeg);
        write_image(&dir.path().join("c.tiff"), RasterFormat::Tiff);

        let outcomes = wait_for_outcomes(&watcher, 1).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(watcher.wait_idle(Duration::from_secs(10)).await);
        watcher.stop().await;

        let outcomes_after = watcher.pipeline().recent_outcomes();
        assert_eq!(outcomes_after.len(), 1);
        assert_eq!(outcomes[0].source_file_name, "c.tiff");
        assert!(dir.path().join("fixed").join("c.tiff").exists());
        assert!(!dir.path().join("fixed").join("b.png").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_broken_scan_is_recorded_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_for(dir.path(), 50);
        watcher.start().unwrap();

        std::fs::write(dir.path().join("broken.tiff"), b"this is not a tiff").unwrap();

        let outcomes = wait_for_outcomes(&watcher, 1).await;
        assert!(watcher.wait_idle(Duration::from_secs(10)).await);
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].succeeded);
        assert!(outcomes[0].error_detail.is_some());
        assert!(!dir.path().join("fixed").join("broken.tiff").exists());
        // The watcher keeps running after a failed file.
        assert_eq!(watcher.state(), WatchState::Running);

        watcher.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unsettled_change_is_dropped_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_for(dir.path(), 60_000);
        watcher.start().unwrap();

        write_image(&dir.path().join("late.jpg"), RasterFormat::Jpeg);
        tokio::time::sleep(Duration::from_millis(300)).await;

        watcher.stop().await;
        assert_eq!(watcher.state(), WatchState::Stopped);
        assert!(watcher.wait_idle(Duration::from_secs(10)).await);
        assert!(watcher.pipeline().recent_outcomes().is_empty());
        assert!(!dir.path().join("fixed").join("late.jpg").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_returns_while_processing() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(GatedTransform::default());
        let pipeline = Arc::new(ProcessingPipeline::new(
            &Config::default(),
            gate.clone(),
            TransformParameters::builtin(),
        ));
        let watcher = DirectoryWatcher::new(dir.path(), dir.path().join("fixed"), pipeline)
            .with_settle(Duration::from_millis(50));
        watcher.start().unwrap();

        write_image(&dir.path().join("scan.jpg"), RasterFormat::Jpeg);
        let deadline = Instant::now() + Duration::from_secs(10);
        while watcher.in_flight() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(watcher.in_flight(), 1);

        watcher.stop().await;
        assert_eq!(watcher.state(), WatchState::Stopped);
        assert_eq!(watcher.in_flight(), 1);
        assert!(watcher.pipeline().recent_outcomes().is_empty());

        gate.open();
        let outcomes = wait_for_outcomes(&watcher, 1).await;
        assert!(watcher.wait_idle(Duration::from_secs(10)).await);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded);
        assert!(dir.path().join("fixed").join("scan.jpg").exists());
    }

    #[tokio::test]
    async fn test_start_on_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let watcher = watcher_for(&missing, 50);

        let err = watcher.start().unwrap_err();
        assert!(matches!(err, WatchError::Subscription { .. }));
        assert_eq!(watcher.state(), WatchState::Created);
        assert!(!missing.join("fixed").exists());

        std::fs::create_dir(&missing).unwrap();
        watcher.start().unwrap();
        assert_eq!(watcher.state(), WatchState::Running);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_start_on_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scan.jpg");
        std::fs::write(&file, b"x").unwrap();

        let err = watcher_for(&file, 50).start().unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_for(dir.path(), 50);

        watcher.stop().await;
        assert_eq!(watcher.state(), WatchState::Created);

        watcher.start().unwrap();
        assert!(watcher.start().is_err());
        watcher.stop().await;
        watcher.stop().await;
        assert_eq!(watcher.state(), WatchState::Stopped);
    }

    #[tokio::test]
    async fn test_stopped_watcher_cannot_restart() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_for(dir.path(), 50);
        watcher.start().unwrap();
        watcher.stop().await;

        let err = watcher.start().unwrap_err();
        assert!(matches!(err, WatchError::Subscription { .. }));
        assert!(err.to_string().contains("stopped"));
        assert_eq!(watcher.state(), WatchState::Stopped);
    }

    #[test]
    fn test_from_config_requires_watch_dir() {
        let pipeline = Arc::new(ProcessingPipeline::from_config(&Config::default()).unwrap());
        assert!(DirectoryWatcher::from_config(&Config::default(), Arc::clone(&pipeline)).is_err());

        let mut config = Config::default();
        config.watch.dir = Some(PathBuf::from("/scans"));
        config.watch.settle_ms = 120;
        let watcher = DirectoryWatcher::from_config(&config, pipeline).unwrap();
        assert_eq!(watcher.output_dir(), Path::new("/scans/fixed"));
        assert_eq!(watcher.settle, Duration::from_millis(120));
    }

    #[test]
    fn test_significant_events() {
        assert!(is_significant(&EventKind::Create(CreateKind::File)));
        assert!(is_significant(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(!is_significant(&EventKind::Create(CreateKind::Folder)));
        assert!(!is_significant(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_significant(&EventKind::Modify(ModifyKind::Name(
            RenameMode::Both
        ))));
        assert!(!is_significant(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn test_accepts_filters_extension_and_output_dir() {
        let excluded = vec![PathBuf::from("/scans/fixed")];
        assert!(accepts(Path::new("/scans/c.tiff"), &excluded));
        assert!(accepts(Path::new("/scans/C.JPG"), &excluded));
        assert!(!accepts(Path::new("/scans/a.txt"), &excluded));
        assert!(!accepts(Path::new("/scans/b.png"), &excluded));
        assert!(!accepts(Path::new("/scans/fixed/c.tiff"), &excluded));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(WatchState::Stopping.to_string(), "stopping");
    }
}
