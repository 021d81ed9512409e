//! KitchenTodo store - a hierarchical to-do store kept on disk.
//!
//! Every list is a directory named `"<id> <name>"` under the store root and
//! every item is a small file named by its id:
//!
//! ```text
//! ~/.local/share/kitchentodo/
//!   1 Todo/
//!     1            "0\nMilk\n"
//!     2            "1\nEggs\n"
//! ```
//!
//! # Overview
//!
//! The store mirrors that tree in memory, persists every mutation before
//! applying it, and keeps in sync with edits made by other processes through
//! one file watcher per list. Watchers never touch state: they post events to
//! the owning [`Store`], which reloads the affected lists itself.
//!
//! # Modules
//!
//! - [`types`]: Lists, items and their id types
//! - [`record`]: Item record codec and file I/O
//! - [`manager`]: Create, delete and rename lists; add, toggle and clear items
//! - [`reconciler`]: Loading disk state and merging it into memory
//! - [`watcher`]: Per-list file system watchers
//! - [`store`]: The live store tying the above together
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for store operations

pub mod config;
pub mod error;
pub mod manager;
pub mod reconciler;
pub mod record;
pub mod store;
pub mod types;
pub mod watcher;

pub use config::{Config, ConfigError};
pub use error::{Result, StoreError};
pub use manager::StoreManager;
pub use reconciler::{ItemsReport, ListsReport};
pub use record::RecordError;
pub use store::{Store, StoreEvent};
pub use types::{Item, ItemId, ListId, TodoList, DEFAULT_LIST_NAME};
pub use watcher::{WatchEvent, WatchRegistry, WatchState, WatcherError};
