//! Per-list file watchers for picking up external edits.
//!
//! Every list directory gets its own non-recursive [`notify`] subscription.
//! Subscriptions never touch store state: the notify callback only filters
//! the raw event and posts a [`WatchEvent`] on a bounded channel. The primary
//! actor drains that channel and runs the reconciler itself, so the in-memory
//! lists have exactly one writer.
//!
//! # Lifecycle
//!
//! A subscription starts `Running`. It moves to `Stopped` when the
//! notification source reports an error (a [`WatchEvent::WatchStopped`] is
//! posted) or when the registry shuts down. There is no retry: a stopped list
//! keeps working but loses live change detection until the next start.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tokio::sync::mpsc;
//! use kitchentodo_store::watcher::{WatchEvent, WatchRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(64);
//!     let mut watches = WatchRegistry::new(tx);
//!     watches.watch(1, Path::new("/home/me/.local/share/kitchentodo/1 Todo"))?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             WatchEvent::ListChanged(list_id) => println!("list {list_id} changed"),
//!             WatchEvent::WatchStopped { list_id, reason } => {
//!                 println!("list {list_id} no longer watched: {reason}");
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, trace, warn};

use crate::types::ListId;

/// Events posted by list watchers to the primary actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// An entry inside the list's directory was created, modified or removed.
    ListChanged(ListId),

    /// The list's notification source failed; its subscription is stopped.
    WatchStopped {
        list_id: ListId,
        reason: String,
    },
}

/// State of a single list subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Running,
    Stopped,
}

/// Errors that can occur while establishing a subscription.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The list directory does not exist or is inaccessible.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    /// The registry has been shut down.
    #[error("watch registry is shut down")]
    ShutDown,
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// A live subscription on one list directory.
#[derive(Debug)]
struct Subscription {
    dir: PathBuf,
    running: Arc<AtomicBool>,

    /// Kept alive to maintain the subscription. Dropping it stops the
    /// notification thread.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,
}

/// Owns one subscription per watched list.
#[derive(Debug)]
pub struct WatchRegistry {
    /// `None` once shut down, so the channel closes when the last
    /// subscription is dropped.
    sender: Option<mpsc::Sender<WatchEvent>>,
    subscriptions: HashMap<ListId, Subscription>,

    /// Set when a change could not be queued because the channel was full.
    overflowed: Arc<AtomicBool>,
}

impl WatchRegistry {
    /// Creates an empty registry posting events to `sender`.
    #[must_use]
    pub fn new(sender: mpsc::Sender<WatchEvent>) -> Self {
        Self {
            sender: Some(sender),
            subscriptions: HashMap::new(),
            overflowed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts watching `dir` on behalf of `list_id`.
    ///
    /// An existing subscription for the same list is replaced, which is how a
    /// renamed list moves its watch to the new path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist, the watcher cannot be
    /// created, or the registry has been shut down.
    pub fn watch(&mut self, list_id: ListId, dir: &Path) -> Result<()> {
        let sender = self.sender.clone().ok_or(WatcherError::ShutDown)?;

        if !dir.is_dir() {
            return Err(WatcherError::DirectoryNotFound(dir.to_path_buf()));
        }

        // Drop any previous subscription before the new one starts
        self.unwatch(list_id);

        let running = Arc::new(AtomicBool::new(true));
        let watcher = create_watcher(
            list_id,
            dir.to_path_buf(),
            Arc::clone(&running),
            Arc::clone(&self.overflowed),
            sender,
        )?;

        debug!(list_id, dir = %dir.display(), "Started watching list");

        self.subscriptions.insert(
            list_id,
            Subscription {
                dir: dir.to_path_buf(),
                running,
                watcher,
            },
        );
        Ok(())
    }

    /// Cancels the subscription of a list. Returns `false` if there was none.
    pub fn unwatch(&mut self, list_id: ListId) -> bool {
        match self.subscriptions.remove(&list_id) {
            Some(subscription) => {
                subscription.running.store(false, Ordering::Release);
                debug!(list_id, dir = %subscription.dir.display(), "Stopped watching list");
                true
            }
            None => false,
        }
    }

    /// Returns the state of a list's subscription, or `None` if it has none.
    #[must_use]
    pub fn state(&self, list_id: ListId) -> Option<WatchState> {
        self.subscriptions.get(&list_id).map(|subscription| {
            if subscription.running.load(Ordering::Acquire) {
                WatchState::Running
            } else {
                WatchState::Stopped
            }
        })
    }

    /// Returns the directory a list is watched at.
    #[must_use]
    pub fn watched_dir(&self, list_id: ListId) -> Option<&Path> {
        self.subscriptions
            .get(&list_id)
            .map(|subscription| subscription.dir.as_path())
    }

    /// Returns the number of subscriptions, running or stopped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if there are no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns and clears the overflow flag.
    ///
    /// When set, at least one change notification was dropped, so every list
    /// should be reconciled.
    pub fn take_overflow(&self) -> bool {
        self.overflowed.swap(false, Ordering::AcqRel)
    }

    /// Stops every subscription and closes the event channel.
    ///
    /// Events already queued can still be drained; after that the receiver
    /// yields `None`.
    pub fn shutdown(&mut self) {
        for subscription in self.subscriptions.values() {
            subscription.running.store(false, Ordering::Release);
        }
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        self.sender = None;

        info!(subscriptions = count, "Watch registry shut down");
    }
}

#[cfg(test)]
impl WatchRegistry {
    /// Runs a raw notify result through a list's subscription, as its watcher
    /// thread would.
    pub(crate) fn dispatch(
        &self,
        list_id: ListId,
        res: std::result::Result<Event, notify::Error>,
    ) {
        let (Some(sender), Some(subscription)) =
            (self.sender.as_ref(), self.subscriptions.get(&list_id))
        else {
            return;
        };
        handle_notify_event(
            res,
            list_id,
            &subscription.dir,
            &subscription.running,
            &self.overflowed,
            sender,
        );
    }

    /// Returns a sender for posting events directly.
    pub(crate) fn sender(&self) -> Option<mpsc::Sender<WatchEvent>> {
        self.sender.clone()
    }
}

/// Creates the notify watcher for one list directory.
fn create_watcher(
    list_id: ListId,
    dir: PathBuf,
    running: Arc<AtomicBool>,
    overflowed: Arc<AtomicBool>,
    sender: mpsc::Sender<WatchEvent>,
) -> Result<RecommendedWatcher> {
    let watch_dir = dir.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            handle_notify_event(res, list_id, &dir, &running, &overflowed, &sender);
        },
        Config::default(),
    )?;

    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    Ok(watcher)
}

/// Handles a raw notify event for one list.
///
/// Runs on the notify thread, so it never blocks: events are posted with
/// `try_send`.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    list_id: ListId,
    dir: &Path,
    running: &AtomicBool,
    overflowed: &AtomicBool,
    sender: &mpsc::Sender<WatchEvent>,
) {
    if !running.load(Ordering::Acquire) {
        return;
    }

    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(list_id, error = %e, "List watcher failed, live sync stopped");
            running.store(false, Ordering::Release);
            let stopped = WatchEvent::WatchStopped {
                list_id,
                reason: e.to_string(),
            };
            if let Err(e) = sender.try_send(stopped) {
                warn!(list_id, error = %e, "Failed to report stopped watcher");
            }
            return;
        }
    };

    trace!(list_id, kind = ?event.kind, paths = ?event.paths, "Received notify event");

    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return;
    }

    if !event.paths.iter().any(|path| is_item_entry(path, dir)) {
        trace!(list_id, "Ignoring event outside list entries");
        return;
    }

    match sender.try_send(WatchEvent::ListChanged(list_id)) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(list_id, "Watch channel full, scheduling full resync");
            overflowed.store(true, Ordering::Release);
        }
        Err(TrySendError::Closed(_)) => {
            debug!(list_id, "Watch channel closed, stopping watcher");
            running.store(false, Ordering::Release);
        }
    }
}

/// Returns `true` for a visible entry directly inside the list directory.
///
/// Events on the directory itself (such as its own rename) are not item
/// changes.
fn is_item_entry(path: &Path, dir: &Path) -> bool {
    if path == dir {
        return false;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| !name.starts_with('.'))
}
