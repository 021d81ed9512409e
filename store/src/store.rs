//! The live store: manager, reconciler and watchers behind one owner.
//!
//! [`Store`] is the primary actor. It owns the in-memory lists, performs every
//! user-initiated mutation and is the only place the reconciler runs. List
//! watchers post [`WatchEvent`]s on a bounded channel; [`Store::next_change`]
//! drains them, reloads the affected lists and hands back [`StoreEvent`]s for
//! the presentation layer.
//!
//! # Example
//!
//! ```no_run
//! use kitchentodo_store::{Config, Store, StoreEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = Store::open(&Config::from_env()?)?;
//!     let list_id = store.create_list("Groceries")?.id;
//!     store.add_item(list_id, "Milk")?;
//!
//!     while let Some(event) = store.next_change().await {
//!         if let StoreEvent::ListChanged { list_id, .. } = event {
//!             println!("{list_id} changed on disk");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::manager::StoreManager;
use crate::reconciler::{self, ItemsReport, ListsReport};
use crate::types::{Item, ItemId, ListId, TodoList};
use crate::watcher::{WatchEvent, WatchRegistry, WatchState};

/// Change notifications handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A list was reloaded from disk after an external change.
    ListChanged {
        list_id: ListId,
        report: ItemsReport,
    },

    /// Live sync for a list has stopped and will not resume.
    WatchStopped { list_id: ListId, reason: String },
}

/// A KitchenTodo store with live sync.
#[derive(Debug)]
pub struct Store {
    manager: StoreManager,
    watches: WatchRegistry,
    watch_rx: mpsc::Receiver<WatchEvent>,
    pending: VecDeque<StoreEvent>,

    /// Watch events received but not yet reconciled. Kept on the store so a
    /// cancelled [`Store::next_change`] does not lose them.
    batch: Vec<WatchEvent>,

    /// When the current batch closes.
    batch_deadline: Option<Instant>,
    debounce: Duration,
}

impl Store {
    /// Opens the store at `config.root`, loading every list and starting one
    /// watcher per list.
    ///
    /// The root is created if missing, and an empty store gets the default
    /// list. Lists whose watcher cannot be started still load; they just run
    /// without live sync.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the root cannot be created or read.
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.root).map_err(|e| StoreError::io(&config.root, e))?;

        let mut manager = StoreManager::new(&config.root);
        reconciler::load_lists(&mut manager)?;

        if config.event_buffer == 0 {
            warn!("Event buffer of 0 is not usable, using 1");
        }
        let (tx, watch_rx) = mpsc::channel(config.event_buffer.max(1));
        let mut store = Self {
            manager,
            watches: WatchRegistry::new(tx),
            watch_rx,
            pending: VecDeque::new(),
            batch: Vec::new(),
            batch_deadline: None,
            debounce: config.debounce,
        };

        let ids: Vec<ListId> = store.manager.lists().iter().map(|list| list.id).collect();
        for id in ids {
            store.subscribe(id);
        }

        info!(
            root = %config.root.display(),
            lists = store.manager.lists().len(),
            watched = store.watches.len(),
            "Store opened"
        );

        Ok(store)
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.manager.root()
    }

    /// Returns every list in display order.
    #[must_use]
    pub fn lists(&self) -> &[TodoList] {
        self.manager.lists()
    }

    /// Returns the list with the given id, if known.
    #[must_use]
    pub fn list(&self, id: ListId) -> Option<&TodoList> {
        self.manager.list(id)
    }

    /// Returns the highest list id allocated or seen on disk.
    #[must_use]
    pub fn last_list_id(&self) -> ListId {
        self.manager.last_list_id()
    }

    /// Returns the live-sync state of a list, or `None` if it is not watched.
    #[must_use]
    pub fn watch_state(&self, id: ListId) -> Option<WatchState> {
        self.watches.state(id)
    }

    /// Creates a list and starts watching it.
    ///
    /// # Errors
    ///
    /// See [`StoreManager::create_list`].
    pub fn create_list(&mut self, name: &str) -> Result<&TodoList> {
        let id = self.manager.create_list(name)?.id;
        self.subscribe(id);
        self.manager.list(id).ok_or(StoreError::ListNotFound(id))
    }

    /// Stops watching a list, then deletes it.
    ///
    /// If the deletion fails while the list is still known, its watcher is
    /// restarted.
    ///
    /// # Errors
    ///
    /// See [`StoreManager::delete_list`].
    pub fn delete_list(&mut self, id: ListId) -> Result<TodoList> {
        self.watches.unwatch(id);

        let result = self.manager.delete_list(id);
        if result.is_err() && self.manager.list(id).is_some() {
            self.subscribe(id);
        }
        result
    }

    /// Renames a list and moves its watcher to the new directory.
    ///
    /// # Errors
    ///
    /// See [`StoreManager::rename_list`].
    pub fn rename_list(&mut self, id: ListId, new_name: &str) -> Result<()> {
        self.manager.rename_list(id, new_name)?;
        if !self.is_watching_current_dir(id) {
            self.subscribe(id);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// See [`StoreManager::add_item`].
    pub fn add_item(&mut self, list_id: ListId, label: &str) -> Result<Item> {
        self.manager.add_item(list_id, label)
    }

    /// # Errors
    ///
    /// See [`StoreManager::toggle_item`].
    pub fn toggle_item(&mut self, list_id: ListId, item_id: ItemId, complete: bool) -> Result<()> {
        self.manager.toggle_item(list_id, item_id, complete)
    }

    /// # Errors
    ///
    /// See [`StoreManager::clear_completed`].
    pub fn clear_completed(&mut self, list_id: ListId) -> Result<Vec<ItemId>> {
        self.manager.clear_completed(list_id)
    }

    /// Rescans the store root, picking up lists created or renamed on disk.
    ///
    /// Newly discovered lists are watched. Lists whose directory moved get
    /// their watcher moved with them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the root cannot be read.
    pub fn reload(&mut self) -> Result<ListsReport> {
        let report = reconciler::load_lists(&mut self.manager)?;

        let ids: Vec<ListId> = self.manager.lists().iter().map(|list| list.id).collect();
        for id in ids {
            if !self.is_watching_current_dir(id) {
                self.subscribe(id);
            }
        }

        Ok(report)
    }

    /// Reloads one list from disk without waiting for a watcher event.
    ///
    /// # Errors
    ///
    /// See [`reconciler::reload_list`].
    pub fn sync_list(&mut self, id: ListId) -> Result<ItemsReport> {
        reconciler::reload_list(&mut self.manager, id)
    }

    /// Waits for the next change notification.
    ///
    /// After the first watcher event arrives, waits for the debounce window
    /// and drains everything queued, so each affected list is reloaded once
    /// per batch. Returns `None` once the store has been shut down and every
    /// queued event has been handled.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Events received before the future is
    /// dropped stay buffered on the store, and the next call finishes the
    /// same debounce window instead of starting a new one.
    pub async fn next_change(&mut self) -> Option<StoreEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            if self.batch.is_empty() {
                let first = self.watch_rx.recv().await?;
                self.batch.push(first);
                self.batch_deadline = Some(Instant::now() + self.debounce);
            }

            if let Some(deadline) = self.batch_deadline {
                tokio::time::sleep_until(deadline).await;
            }

            while let Ok(event) = self.watch_rx.try_recv() {
                self.batch.push(event);
            }

            self.batch_deadline = None;
            let batch = std::mem::take(&mut self.batch);
            self.process_batch(batch);
        }
    }

    /// Stops every watcher. Pending notifications can still be drained with
    /// [`next_change`](Self::next_change), which then returns `None`.
    pub fn shutdown(&mut self) {
        self.watches.shutdown();
        info!(root = %self.manager.root().display(), "Store shut down");
    }

    fn process_batch(&mut self, batch: Vec<WatchEvent>) {
        let received = batch.len();
        let mut changed: Vec<ListId> = Vec::new();

        for event in batch {
            match event {
                WatchEvent::ListChanged(list_id) => {
                    if !changed.contains(&list_id) {
                        changed.push(list_id);
                    }
                }
                WatchEvent::WatchStopped { list_id, reason } => {
                    if self.manager.list(list_id).is_none() {
                        debug!(list_id, "Dropping stop event for unknown list");
                        continue;
                    }
                    warn!(list_id, reason = %reason, "Live sync stopped for list");
                    self.pending
                        .push_back(StoreEvent::WatchStopped { list_id, reason });
                }
            }
        }

        if self.watches.take_overflow() {
            warn!("Watch events were dropped, reloading every list");
            changed = self.manager.lists().iter().map(|list| list.id).collect();
        }

        debug!(received, lists = changed.len(), "Processing watch events");

        for list_id in changed {
            match reconciler::reload_list(&mut self.manager, list_id) {
                Ok(report) => {
                    debug!(
                        list_id,
                        added = report.added,
                        updated = report.updated,
                        skipped = report.skipped,
                        "Reloaded list"
                    );
                    self.pending
                        .push_back(StoreEvent::ListChanged { list_id, report });
                }
                Err(StoreError::ListNotFound(_)) => {
                    debug!(list_id, "Dropping change event for unknown list");
                }
                Err(e) => {
                    warn!(list_id, error = %e, "Failed to reload list");
                }
            }
        }
    }

    fn is_watching_current_dir(&self, id: ListId) -> bool {
        match (self.manager.path_of(id), self.watches.watched_dir(id)) {
            (Ok(path), Some(watched)) => path == watched,
            _ => false,
        }
    }

    /// Starts the watcher for a list. Failures are logged and the list keeps
    /// working without live sync.
    fn subscribe(&mut self, id: ListId) {
        let dir = match self.manager.path_of(id) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(list_id = id, error = %e, "Not watching unknown list");
                return;
            }
        };

        if let Err(source) = self.watches.watch(id, &dir) {
            let err = StoreError::WatchSetup { list_id: id, source };
            warn!(list_id = id, error = %err, "List runs without live sync");
        }
    }
}
