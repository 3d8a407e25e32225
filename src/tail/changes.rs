// src/tail/changes.rs

//! OS change notifications for a single watched file.
//!
//! [`NotifyChangeSource`] wraps `notify`; [`ManualChangeSource`] lets tests
//! fire notifications by hand.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What happened to a watched file, reduced to what the tail reader needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    /// Content was written, extended or its metadata touched.
    Modified,
    /// The file was removed or renamed away.
    Removed,
}

pub type ChangeSender = mpsc::UnboundedSender<FileChange>;

/// Keeps a subscription alive; dropping it cancels the subscription.
pub trait Subscription: Send {}

pub trait ChangeSource: Send + Sync + Debug {
    fn subscribe(&self, path: &Path, tx: ChangeSender) -> Result<Box<dyn Subscription>>;
}

/// Map a `notify` event kind onto [`FileChange`]. Pure access events are
/// ignored.
pub fn classify_event(kind: &EventKind) -> Option<FileChange> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Remove(_) => Some(FileChange::Removed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(FileChange::Removed),
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any | EventKind::Other => {
            Some(FileChange::Modified)
        }
    }
}

struct NotifySubscription {
    _inner: RecommendedWatcher,
}

impl Subscription for NotifySubscription {}

/// Change source backed by the platform's recommended `notify` watcher.
#[derive(Debug, Clone, Default)]
pub struct NotifyChangeSource;

impl ChangeSource for NotifyChangeSource {
    fn subscribe(&self, path: &Path, tx: ChangeSender) -> Result<Box<dyn Subscription>> {
        let watched = path.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(change) = classify_event(&event.kind) {
                        // A closed channel means the reader stopped; nothing to do.
                        let _ = tx.send(change);
                    }
                }
                Err(err) => {
                    warn!(path = ?watched, error = %err, "file watch error");
                }
            },
            Config::default(),
        )
        .with_context(|| format!("creating watcher for {:?}", path))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {:?}", path))?;

        debug!(?path, "subscribed to file notifications");
        Ok(Box::new(NotifySubscription { _inner: watcher }))
    }
}

type SubscriberMap = HashMap<PathBuf, Vec<(u64, ChangeSender)>>;

/// Change source driven by the test: call [`ManualChangeSource::fire`] to
/// deliver a notification to every live subscriber of a path.
#[derive(Debug, Clone, Default)]
pub struct ManualChangeSource {
    subscribers: Arc<Mutex<SubscriberMap>>,
    next_id: Arc<Mutex<u64>>,
    fail_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl ManualChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self, path: impl AsRef<Path>, change: FileChange) {
        let subs = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(list) = subs.get(path.as_ref()) {
            for (_, tx) in list {
                let _ = tx.send(change);
            }
        }
    }

    pub fn subscriber_count(&self, path: impl AsRef<Path>) -> usize {
        let subs = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        subs.get(path.as_ref()).map(|l| l.len()).unwrap_or(0)
    }

    /// Make future subscriptions to `path` fail.
    pub fn fail_subscriptions_for(&self, path: impl AsRef<Path>) {
        self.fail_paths
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(path.as_ref().to_path_buf());
    }
}

struct ManualSubscription {
    subscribers: Arc<Mutex<SubscriberMap>>,
    path: PathBuf,
    id: u64,
}

impl Subscription for ManualSubscription {}

impl Drop for ManualSubscription {
    fn drop(&mut self) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(list) = subs.get_mut(&self.path) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                subs.remove(&self.path);
            }
        }
    }
}

impl ChangeSource for ManualChangeSource {
    fn subscribe(&self, path: &Path, tx: ChangeSender) -> Result<Box<dyn Subscription>> {
        if self
            .fail_paths
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .any(|p| p == path)
        {
            anyhow::bail!("subscriptions disabled for {:?}", path);
        }

        let id = {
            let mut next = self.next_id.lock().unwrap_or_else(|p| p.into_inner());
            *next += 1;
            *next
        };
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(path.to_path_buf())
            .or_default()
            .push((id, tx));

        Ok(Box::new(ManualSubscription {
            subscribers: Arc::clone(&self.subscribers),
            path: path.to_path_buf(),
            id,
        }))
    }
}
