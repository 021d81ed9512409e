//! Error types for the KitchenTodo store.
//!
//! Every failure is scoped to one entity (a list, an item, a scan entry or a
//! watch subscription). Only an unusable store root is fatal, and that is left
//! to the caller of [`Store::open`](crate::store::Store::open) to decide.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;
use crate::record::RecordError;
use crate::types::{ItemId, ListId};
use crate::watcher::WatcherError;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A file or directory expected to exist is missing.
    #[error("not found: {0}")]
    PathNotFound(PathBuf),

    /// No list with this id is known to the store.
    #[error("list {0} not found")]
    ListNotFound(ListId),

    /// The list has no item with this id.
    #[error("item {item_id} not found in list {list_id}")]
    ItemNotFound { list_id: ListId, item_id: ItemId },

    /// Open, read, write, rename, or delete failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A malformed item record.
    #[error("record error: {0}")]
    Record(RecordError),

    /// A store root entry whose name is not `"<id> <name>"`.
    #[error("invalid list directory name: {0:?}")]
    InvalidListEntry(String),

    /// A list name that cannot be used as a directory name.
    #[error("invalid list name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// An item label that cannot be stored as a single record line.
    #[error("invalid item label: {0}")]
    InvalidLabel(&'static str),

    /// The watch subscription for a list could not be established.
    #[error("failed to watch list {list_id}: {source}")]
    WatchSetup {
        list_id: ListId,
        #[source]
        source: WatcherError,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns `true` for every "expected to exist but missing" failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound(_) | Self::ListNotFound(_) | Self::ItemNotFound { .. }
        )
    }
}

/// Record I/O failures are store I/O failures; only parse errors stay
/// wrapped as [`StoreError::Record`].
impl From<RecordError> for StoreError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(path) => Self::PathNotFound(path),
            RecordError::Io { path, source } => Self::Io { path, source },
            other => Self::Record(other),
        }
    }
}

/// A specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_not_found_display() {
        let err = StoreError::ListNotFound(4);
        assert_eq!(err.to_string(), "list 4 not found");

        let err = StoreError::ItemNotFound {
            list_id: 1,
            item_id: 9,
        };
        assert_eq!(err.to_string(), "item 9 not found in list 1");
    }

    #[test]
    fn store_error_io_display_includes_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = StoreError::io(Path::new("/store/1 Todo"), io_err);
        assert_eq!(err.to_string(), "I/O error on /store/1 Todo: access denied");
    }

    #[test]
    fn store_error_invalid_name_display() {
        let err = StoreError::InvalidName {
            name: "a/b".to_string(),
            reason: "must not contain '/'",
        };
        assert_eq!(
            err.to_string(),
            "invalid list name \"a/b\": must not contain '/'"
        );
    }

    #[test]
    fn is_not_found_groups_missing_entities() {
        assert!(StoreError::PathNotFound(PathBuf::from("/x")).is_not_found());
        assert!(StoreError::ListNotFound(1).is_not_found());
        assert!(StoreError::ItemNotFound {
            list_id: 1,
            item_id: 2
        }
        .is_not_found());

        assert!(!StoreError::InvalidLabel("empty").is_not_found());
        assert!(!StoreError::Record(RecordError::Empty).is_not_found());
    }

    #[test]
    fn record_errors_map_onto_store_taxonomy() {
        let err: StoreError = RecordError::NotFound(PathBuf::from("/x/1")).into();
        assert!(matches!(err, StoreError::PathNotFound(_)));
        assert!(err.is_not_found());

        let err: StoreError = RecordError::Io {
            path: PathBuf::from("/x/1"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        }
        .into();
        assert!(matches!(err, StoreError::Io { .. }));

        let err: StoreError = RecordError::MissingLabel.into();
        assert!(matches!(err, StoreError::Record(RecordError::MissingLabel)));
    }

    #[test]
    fn watch_setup_display() {
        let err = StoreError::WatchSetup {
            list_id: 3,
            source: WatcherError::DirectoryNotFound(PathBuf::from("/store/3 Work")),
        };
        assert_eq!(
            err.to_string(),
            "failed to watch list 3: watch directory does not exist: /store/3 Work"
        );
    }

    #[test]
    fn config_error_to_store_error_conversion() {
        let err: StoreError = ConfigError::NoHomeDirectory.into();
        assert!(matches!(err, StoreError::Config(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: failed to determine home directory"
        );
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = StoreError::io(Path::new("/store/1 Todo/3"), io_err);
        assert!(err.source().is_some());
    }
}
