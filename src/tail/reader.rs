// src/tail/reader.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{FileAccessError, WatcherError};
use crate::fs::FileSystem;
use crate::tail::changes::{ChangeSource, FileChange, Subscription};
use crate::tail::cursor::{ReadLimits, TailCursor};

/// Receiver of a reader's output.
///
/// Implementations must tolerate being called after the reader was stopped
/// (a batch may already be in flight) and treat that as a no-op.
pub trait LineSink: Send + Sync {
    /// A batch of complete lines, in file order.
    fn deliver(&self, lines: Vec<String>);

    /// The reader hit a fatal error and has stopped itself.
    fn fail(&self, error: WatcherError);
}

/// What a single notification produced.
enum ReaderStep {
    Stopped,
    Lines { lines: Vec<String>, more_pending: bool },
    Failed { lines: Vec<String>, error: WatcherError },
}

/// Tails one file: turns change notifications into ordered line batches.
///
/// The reader owns its cursor and subscription. It holds the sink only as a
/// callback handle; the sink must not own the reader back.
pub struct TailReader {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    changes: Arc<dyn ChangeSource>,
    sink: Arc<dyn LineSink>,
    limits: ReadLimits,
    cursor: Arc<Mutex<Option<TailCursor>>>,
    stopped: Arc<AtomicBool>,
    subscription: Option<Box<dyn Subscription>>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for TailReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailReader")
            .field("path", &self.path)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl TailReader {
    pub fn new(
        path: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        changes: Arc<dyn ChangeSource>,
        sink: Arc<dyn LineSink>,
    ) -> Self {
        Self {
            path: path.into(),
            fs,
            changes,
            sink,
            limits: ReadLimits::default(),
            cursor: Arc::new(Mutex::new(None)),
            stopped: Arc::new(AtomicBool::new(true)),
            subscription: None,
            task: None,
        }
    }

    pub fn with_limits(mut self, limits: ReadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Current read offset, if running.
    pub fn offset(&self) -> Option<u64> {
        let guard = self.cursor.lock().unwrap_or_else(|p| p.into_inner());
        guard.as_ref().map(|c| c.offset())
    }

    /// Open the file, seek to its end and subscribe to change notifications.
    ///
    /// The path must already be expanded. Must be called from within a Tokio
    /// runtime. Starting a running reader is a no-op.
    pub fn start(&mut self) -> Result<(), FileAccessError> {
        if self.is_running() {
            return Ok(());
        }

        let cursor = TailCursor::open_at_end(self.fs.as_ref(), &self.path, self.limits)?;

        let (tx, rx) = mpsc::unbounded_channel::<FileChange>();
        let self_tx = tx.downgrade();
        let subscription = self
            .changes
            .subscribe(&self.path, tx)
            .map_err(|e| FileAccessError::WatchUnavailable(self.path.clone(), format!("{e:#}")))?;

        // Fresh shared state: a read left over from an earlier run keeps its
        // own cursor and stop flag.
        self.cursor = Arc::new(Mutex::new(Some(cursor)));
        self.stopped = Arc::new(AtomicBool::new(false));
        self.subscription = Some(subscription);

        let worker = ReaderWorker {
            path: self.path.clone(),
            fs: Arc::clone(&self.fs),
            sink: Arc::clone(&self.sink),
            cursor: Arc::clone(&self.cursor),
            stopped: Arc::clone(&self.stopped),
        };
        self.task = Some(tokio::spawn(worker.run(rx, self_tx)));

        info!(path = ?self.path, "tail reader started");
        Ok(())
    }

    /// Cancel the subscription, close the file and forget the cursor and
    /// buffered fragment. Safe to call repeatedly or before `start`.
    ///
    /// Never waits on the cursor lock. A read already in flight finishes on
    /// its blocking thread, sees the stop flag and drops the cursor there.
    pub fn stop(&mut self) {
        let was_running = !self.stopped.swap(true, Ordering::SeqCst);

        self.subscription = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.cursor = Arc::new(Mutex::new(None));

        if was_running {
            debug!(path = ?self.path, "tail reader stopped");
        }
    }
}

impl Drop for TailReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the background task.
struct ReaderWorker {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn LineSink>,
    cursor: Arc<Mutex<Option<TailCursor>>>,
    stopped: Arc<AtomicBool>,
}

impl ReaderWorker {
    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<FileChange>,
        self_tx: mpsc::WeakUnboundedSender<FileChange>,
    ) {
        while let Some(change) = rx.recv().await {
            // Coalesce a burst of notifications into one read.
            let mut removed = change == FileChange::Removed;
            while let Ok(next) = rx.try_recv() {
                removed |= next == FileChange::Removed;
            }

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            let fs = Arc::clone(&self.fs);
            let cursor = Arc::clone(&self.cursor);
            let stopped = Arc::clone(&self.stopped);
            let step = match tokio::task::spawn_blocking(move || {
                process_change(&cursor, fs.as_ref(), &stopped, removed)
            })
            .await
            {
                Ok(step) => step,
                Err(err) => {
                    warn!(path = ?self.path, error = %err, "tail read task failed");
                    break;
                }
            };

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            match step {
                ReaderStep::Stopped => break,
                ReaderStep::Lines {
                    lines,
                    more_pending,
                } => {
                    if !lines.is_empty() {
                        self.sink.deliver(lines);
                    }
                    if more_pending {
                        if let Some(tx) = self_tx.upgrade() {
                            let _ = tx.send(FileChange::Modified);
                        }
                    }
                }
                ReaderStep::Failed { lines, error } => {
                    if !lines.is_empty() {
                        self.sink.deliver(lines);
                    }
                    self.stopped.store(true, Ordering::SeqCst);
                    warn!(path = ?self.path, error = %error, "tail reader failed; stopping");
                    self.sink.fail(error);
                    break;
                }
            }
        }
        debug!(path = ?self.path, "tail reader loop finished");
    }
}

fn process_change(
    cursor: &Mutex<Option<TailCursor>>,
    fs: &dyn FileSystem,
    stopped: &AtomicBool,
    removed: bool,
) -> ReaderStep {
    let mut guard = cursor.lock().unwrap_or_else(|p| p.into_inner());
    if stopped.load(Ordering::SeqCst) {
        *guard = None;
        return ReaderStep::Stopped;
    }
    let Some(active) = guard.as_mut() else {
        return ReaderStep::Stopped;
    };

    let result = active.read_new_lines();
    if stopped.load(Ordering::SeqCst) {
        *guard = None;
        return ReaderStep::Stopped;
    }

    match result {
        Ok(outcome) => {
            // An open descriptor keeps reading fine after unlink, so check the
            // path itself as well.
            if removed || !fs.exists(active.path()) {
                let error = WatcherError::FileDeleted(active.path().to_path_buf());
                *guard = None;
                return ReaderStep::Failed {
                    lines: outcome.lines,
                    error,
                };
            }
            ReaderStep::Lines {
                lines: outcome.lines,
                more_pending: outcome.more_pending,
            }
        }
        Err(error) => {
            *guard = None;
            ReaderStep::Failed {
                lines: Vec::new(),
                error,
            }
        }
    }
}
