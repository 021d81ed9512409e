//! List and item CRUD over the on-disk store layout.
//!
//! The manager owns the in-memory lists and keeps them in step with the
//! directory tree:
//!
//! ```text
//! <root>/
//!   <list-id> <list-name>/
//!     <item-id>              "<0|1>\n<label>\n"
//! ```
//!
//! Ids come from monotonic high-water marks (`last_list_id` per store,
//! [`TodoList::last_item_id`] per list). An id is consumed as soon as it is
//! allocated, even when the write that follows fails, so ids are never reused.
//!
//! Mutations persist first and update memory second: a failed write leaves
//! the in-memory model untouched and surfaces as an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::record;
use crate::types::{Item, ItemId, ListId, TodoList};

/// In-memory mirror of the store root plus the CRUD operations on it.
#[derive(Debug)]
pub struct StoreManager {
    root: PathBuf,
    pub(crate) lists: Vec<TodoList>,
    pub(crate) last_list_id: ListId,
}

impl StoreManager {
    /// Creates an empty manager for the given root. Nothing is read from disk;
    /// see [`reconciler::load_lists`](crate::reconciler::load_lists).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lists: Vec::new(),
            last_list_id: 0,
        }
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns all lists in display order.
    #[must_use]
    pub fn lists(&self) -> &[TodoList] {
        &self.lists
    }

    /// Returns the list with the given id, if present.
    #[must_use]
    pub fn list(&self, id: ListId) -> Option<&TodoList> {
        self.lists.iter().find(|list| list.id == id)
    }

    /// Returns the highest list id allocated or observed so far.
    #[must_use]
    pub fn last_list_id(&self) -> ListId {
        self.last_list_id
    }

    /// Returns `<root>/<id> <name>` for a list.
    #[must_use]
    pub fn list_path(&self, list: &TodoList) -> PathBuf {
        self.root.join(list.dir_name())
    }

    /// Returns `<root>/<id> <name>/<item-id>` for an item of a list.
    #[must_use]
    pub fn item_path(&self, list: &TodoList, item_id: ItemId) -> PathBuf {
        self.list_path(list).join(item_id.to_string())
    }

    /// Returns the directory of the list with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ListNotFound`] for an unknown id.
    pub fn path_of(&self, id: ListId) -> Result<PathBuf> {
        self.list(id)
            .map(|list| self.list_path(list))
            .ok_or(StoreError::ListNotFound(id))
    }

    pub(crate) fn index_of(&self, id: ListId) -> Result<usize> {
        self.lists
            .iter()
            .position(|list| list.id == id)
            .ok_or(StoreError::ListNotFound(id))
    }

    /// Creates a list directory and registers the list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if the name cannot be a directory
    /// name, or [`StoreError::Io`] if the directory cannot be created.
    pub fn create_list(&mut self, name: &str) -> Result<&TodoList> {
        validate_name(name)?;

        self.last_list_id += 1;
        let list = TodoList::new(self.last_list_id, name);
        let path = self.list_path(&list);

        fs::create_dir(&path).map_err(|e| StoreError::io(&path, e))?;
        info!(list_id = list.id, path = %path.display(), "Created list");

        self.lists.push(list);
        Ok(&self.lists[self.lists.len() - 1])
    }

    /// Deletes a list's item files and directory, then forgets the list.
    ///
    /// If the directory is already gone the list is still forgotten and
    /// [`StoreError::PathNotFound`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ListNotFound`] for an unknown id,
    /// [`StoreError::PathNotFound`] as described above, or [`StoreError::Io`]
    /// if the directory cannot be removed (the list is kept in that case).
    pub fn delete_list(&mut self, id: ListId) -> Result<TodoList> {
        let index = self.index_of(id)?;
        let path = self.list_path(&self.lists[index]);

        if !path.is_dir() {
            self.lists.remove(index);
            warn!(list_id = id, path = %path.display(), "List directory already gone");
            return Err(StoreError::PathNotFound(path));
        }

        let entries = fs::read_dir(&path).map_err(|e| StoreError::io(&path, e))?;
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if let Err(e) = fs::remove_file(&entry_path) {
                warn!(path = %entry_path.display(), error = %e, "Failed to delete item file");
            }
        }

        fs::remove_dir(&path).map_err(|e| StoreError::io(&path, e))?;
        info!(list_id = id, path = %path.display(), "Deleted list");

        Ok(self.lists.remove(index))
    }

    /// Renames a list and its directory.
    ///
    /// Renaming to the current name touches nothing on disk, but still fails
    /// if the list directory has gone missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for an unusable name,
    /// [`StoreError::ListNotFound`] for an unknown id,
    /// [`StoreError::PathNotFound`] for a same-name rename of a missing
    /// directory, or [`StoreError::Io`] if the target directory already exists
    /// or the rename fails.
    pub fn rename_list(&mut self, id: ListId, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let index = self.index_of(id)?;

        if self.lists[index].name == new_name {
            let path = self.list_path(&self.lists[index]);
            if !path.is_dir() {
                return Err(StoreError::PathNotFound(path));
            }
            return Ok(());
        }

        let from = self.list_path(&self.lists[index]);
        let to = self.root.join(format!("{id} {new_name}"));

        // rename(2) silently replaces an empty target directory
        if to.exists() {
            return Err(StoreError::io(
                &to,
                io::Error::new(io::ErrorKind::AlreadyExists, "rename target already exists"),
            ));
        }

        fs::rename(&from, &to).map_err(|e| StoreError::io(&from, e))?;
        info!(
            list_id = id,
            from = %from.display(),
            to = %to.display(),
            "Renamed list"
        );

        self.lists[index].name = new_name.to_string();
        Ok(())
    }

    /// Appends a new incomplete item to a list and writes its record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidLabel`] for an empty or multi-line label,
    /// [`StoreError::ListNotFound`] for an unknown list, or [`StoreError::Io`]
    /// if the record cannot be written (the item is not added).
    pub fn add_item(&mut self, list_id: ListId, label: &str) -> Result<Item> {
        validate_label(label)?;
        let index = self.index_of(list_id)?;
        let dir = self.list_path(&self.lists[index]);

        let list = &mut self.lists[index];
        let item = Item::new(list.allocate_item_id(), label);
        record::write_item(&dir.join(item.id.to_string()), &item)?;

        debug!(list_id, item_id = item.id, "Added item");
        list.items.push(item.clone());
        Ok(item)
    }

    /// Sets the completion flag of an item and rewrites its record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ListNotFound`] or [`StoreError::ItemNotFound`]
    /// for unknown ids, or [`StoreError::Io`] if the record cannot be written
    /// (the flag is left unchanged).
    pub fn toggle_item(&mut self, list_id: ListId, item_id: ItemId, complete: bool) -> Result<()> {
        let index = self.index_of(list_id)?;
        let dir = self.list_path(&self.lists[index]);

        let list = &mut self.lists[index];
        let position = list
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(StoreError::ItemNotFound { list_id, item_id })?;

        let mut updated = list.items[position].clone();
        updated.complete = complete;
        record::write_item(&dir.join(item_id.to_string()), &updated)?;

        debug!(list_id, item_id, complete, "Toggled item");
        list.items[position] = updated;
        Ok(())
    }

    /// Deletes every completed item, preserving the order of the rest.
    ///
    /// Returns the ids that were removed. An item whose file cannot be deleted
    /// is logged and kept; a file that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ListNotFound`] for an unknown list.
    pub fn clear_completed(&mut self, list_id: ListId) -> Result<Vec<ItemId>> {
        let index = self.index_of(list_id)?;
        let dir = self.list_path(&self.lists[index]);

        let list = &mut self.lists[index];
        let mut removed = Vec::new();

        for item in list.items.iter().filter(|item| item.complete) {
            let path = dir.join(item.id.to_string());
            match fs::remove_file(&path) {
                Ok(()) => removed.push(item.id),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Completed item file already gone");
                    removed.push(item.id);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete completed item");
                }
            }
        }

        list.items.retain(|item| !removed.contains(&item.id));
        info!(list_id, removed = removed.len(), "Cleared completed items");

        Ok(removed)
    }
}

/// Checks that a list name can be used verbatim in `"<id> <name>"`.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.contains('/') {
        "must not contain '/'"
    } else if name.contains('\0') {
        "must not contain NUL"
    } else if name.contains(['\n', '\r']) {
        "must be a single line"
    } else if name.starts_with('.') {
        "must not start with '.'"
    } else {
        return Ok(());
    };

    Err(StoreError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Checks that a label fits on the single label line of a record.
pub(crate) fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(StoreError::InvalidLabel("label must not be empty"));
    }
    if label.contains(['\n', '\r']) {
        return Err(StoreError::InvalidLabel("label must be a single line"));
    }
    Ok(())
}
