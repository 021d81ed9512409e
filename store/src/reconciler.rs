//! Loads disk state into a [`StoreManager`] and merges external changes.
//!
//! Both scans are merges rather than replacements, so they serve the startup
//! bootstrap and every later resync alike:
//!
//! - [`load_lists`] walks the store root, registers list directories it has
//!   not seen, refreshes the ones it has, and raises the list id high-water
//!   mark. An empty store gets a default "Todo" list.
//! - [`load_items`] walks one list directory. Known items are updated in place
//!   (their position never changes), unknown items are appended, and the item
//!   id high-water mark is raised. Items whose files vanished are kept.
//!
//! Running either scan twice with no disk change in between changes nothing.
//! A malformed or unreadable entry is logged and skipped; it never aborts the
//! rest of the scan.
//!
//! Directory enumeration order is up to the filesystem, so items discovered
//! by a fresh load are not guaranteed to come back in creation order. Lists
//! are registered in ascending id order.

use std::fs;
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::error::{Result, StoreError};
use crate::manager::StoreManager;
use crate::record::{self, RecordError};
use crate::types::{ListId, TodoList, DEFAULT_LIST_NAME};

/// Outcome of a [`load_items`] merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemsReport {
    /// Items appended because they were not in memory yet.
    pub added: usize,
    /// Items already in memory whose label or flag changed.
    pub updated: usize,
    /// Entries skipped because they could not be read or parsed.
    pub skipped: usize,
}

impl ItemsReport {
    /// Returns `true` if the merge changed the in-memory list.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Outcome of a [`load_lists`] scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListsReport {
    /// Lists registered by this scan, in registration order.
    pub discovered: Vec<ListId>,
    /// Root entries skipped because their names did not parse.
    pub skipped: usize,
    /// Whether the default list had to be created.
    pub created_default: bool,
}

/// Splits a list directory name `"<id> <name>"` on its first space.
///
/// # Errors
///
/// Returns [`StoreError::InvalidListEntry`] if there is no space, the id is
/// not a plain decimal number, or the name is empty.
pub fn parse_list_dir_name(entry: &str) -> Result<(ListId, &str)> {
    let invalid = || StoreError::InvalidListEntry(entry.to_string());

    let (id, name) = entry.split_once(' ').ok_or_else(invalid)?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) || name.is_empty() {
        return Err(invalid());
    }
    let id = id.parse::<ListId>().map_err(|_| invalid())?;

    Ok((id, name))
}

/// Scans the store root and merges every list directory into `manager`.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the root itself cannot be read, or the error
/// from creating the default list. Per-entry failures are only logged.
pub fn load_lists(manager: &mut StoreManager) -> Result<ListsReport> {
    let root = manager.root().to_path_buf();
    let entries = fs::read_dir(&root).map_err(|e| StoreError::io(&root, e))?;

    let mut report = ListsReport::default();
    let mut found: Vec<(ListId, String)> = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to read store entry");
                continue;
            }
        };

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            warn!(entry = ?file_name, "Skipping non UTF-8 store entry");
            report.skipped += 1;
            continue;
        };

        if name.starts_with('.') {
            trace!(entry = name, "Skipping hidden store entry");
            continue;
        }

        if !entry.path().is_dir() {
            debug!(entry = name, "Skipping non-directory store entry");
            continue;
        }

        match parse_list_dir_name(name) {
            Ok((id, list_name)) => found.push((id, list_name.to_string())),
            Err(e) => {
                warn!(entry = name, error = %e, "Skipping unparseable list directory");
                report.skipped += 1;
            }
        }
    }

    found.sort();

    for group in found.chunk_by(|a, b| a.0 == b.0) {
        let id = group[0].0;

        // A known list keeps its own directory over a stray duplicate
        let chosen = manager
            .list(id)
            .and_then(|list| group.iter().position(|(_, name)| *name == list.name))
            .unwrap_or(0);
        for (_, duplicate) in group.iter().enumerate().filter(|(i, _)| *i != chosen) {
            warn!(list_id = id, name = %duplicate.1, "Skipping duplicate list id");
            report.skipped += 1;
        }

        let name = group[chosen].1.clone();
        manager.last_list_id = manager.last_list_id.max(id);

        let index = match manager.index_of(id) {
            Ok(index) => {
                let list = &mut manager.lists[index];
                if list.name != name {
                    info!(list_id = id, from = %list.name, to = %name, "List renamed on disk");
                    list.name = name;
                }
                index
            }
            Err(_) => {
                manager.lists.push(TodoList::new(id, name));
                report.discovered.push(id);
                manager.lists.len() - 1
            }
        };

        let dir = manager.list_path(&manager.lists[index]);
        if let Err(e) = load_items(&dir, &mut manager.lists[index]) {
            warn!(list_id = id, error = %e, "Failed to load list items");
        }
    }

    if manager.lists.is_empty() {
        let id = manager.create_list(DEFAULT_LIST_NAME)?.id;
        info!(list_id = id, "Created default list");
        report.discovered.push(id);
        report.created_default = true;
    }

    info!(
        root = %root.display(),
        lists = manager.lists.len(),
        discovered = report.discovered.len(),
        skipped = report.skipped,
        "Loaded lists"
    );

    Ok(report)
}

/// Scans one list directory and merges its item records into `list`.
///
/// # Errors
///
/// Returns [`StoreError::PathNotFound`] if the directory is missing, or
/// [`StoreError::Io`] if it cannot be enumerated.
pub fn load_items(dir: &Path, list: &mut TodoList) -> Result<ItemsReport> {
    if !dir.is_dir() {
        return Err(StoreError::PathNotFound(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut report = ItemsReport::default();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read list entry");
                report.skipped += 1;
                continue;
            }
        };

        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            debug!(path = %path.display(), "Skipping non-file list entry");
            continue;
        }

        let item = match record::read_item(&path) {
            Ok(item) => item,
            Err(RecordError::NotFound(_)) => {
                // Deleted between enumeration and read
                trace!(path = %path.display(), "Item file vanished during scan");
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable item record");
                report.skipped += 1;
                continue;
            }
        };

        list.observe_item_id(item.id);

        match list.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                if *existing != item {
                    *existing = item;
                    report.updated += 1;
                }
            }
            None => {
                list.items.push(item);
                report.added += 1;
            }
        }
    }

    debug!(
        list_id = list.id,
        added = report.added,
        updated = report.updated,
        skipped = report.skipped,
        "Loaded items"
    );

    Ok(report)
}

/// Reloads the items of one registered list from its directory.
///
/// # Errors
///
/// Returns [`StoreError::ListNotFound`] for an unknown id, otherwise the
/// errors of [`load_items`].
pub fn reload_list(manager: &mut StoreManager, id: ListId) -> Result<ItemsReport> {
    let index = manager.index_of(id)?;
    let dir = manager.list_path(&manager.lists[index]);
    load_items(&dir, &mut manager.lists[index])
}
