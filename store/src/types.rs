//! Data model for the to-do store.
//!
//! A store holds an ordered sequence of [`TodoList`]s, each owning an ordered
//! sequence of [`Item`]s. Both levels allocate ids from a monotonic high-water
//! mark that is never lowered, so ids are never reused. All types serialize to
//! camelCase JSON for snapshots.

use serde::{Deserialize, Serialize};

/// Identifier of a list, unique within the store.
pub type ListId = u64;

/// Identifier of an item, unique within its list.
pub type ItemId = u64;

/// Name of the list synthesized when the store root holds no lists.
pub const DEFAULT_LIST_NAME: &str = "Todo";

/// A single to-do entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub label: String,
    pub complete: bool,
}

impl Item {
    /// Creates an incomplete item.
    #[must_use]
    pub fn new(id: ItemId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            complete: false,
        }
    }
}

/// A named, ordered collection of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    pub id: ListId,
    pub name: String,

    /// Items in display order (newest last).
    pub items: Vec<Item>,

    /// Highest item id ever allocated or observed on disk.
    pub last_item_id: ItemId,
}

impl TodoList {
    /// Creates an empty list.
    #[must_use]
    pub fn new(id: ListId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            items: Vec::new(),
            last_item_id: 0,
        }
    }

    /// Returns the item with the given id, if present.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Returns the on-disk directory name, `"<id> <name>"`.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{} {}", self.id, self.name)
    }

    /// Allocates the next item id.
    pub(crate) fn allocate_item_id(&mut self) -> ItemId {
        self.last_item_id += 1;
        self.last_item_id
    }

    /// Raises the high-water mark to at least `id`.
    pub(crate) fn observe_item_id(&mut self, id: ItemId) {
        self.last_item_id = self.last_item_id.max(id);
    }

    /// Number of items marked complete.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.complete).count()
    }
}
