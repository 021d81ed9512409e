//! Integration tests for the store lifecycle.
//!
//! These tests drive the public [`Store`] API against a temporary store root
//! and check that every mutation survives a fresh open.

use std::fs;
use std::path::{Path, PathBuf};

use kitchentodo_store::config::Config;
use kitchentodo_store::error::StoreError;
use kitchentodo_store::store::Store;
use kitchentodo_store::types::DEFAULT_LIST_NAME;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn store_root(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("kitchentodo")
}

fn open(temp_dir: &TempDir) -> Store {
    Store::open(&Config::with_root(store_root(temp_dir))).expect("store should open")
}

/// Lists the entry names in a directory, sorted.
fn entry_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Startup
// =============================================================================

#[test]
fn empty_store_gets_default_list() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);

    assert_eq!(store.lists().len(), 1);
    let list = &store.lists()[0];
    assert_eq!(list.id, 1);
    assert_eq!(list.name, DEFAULT_LIST_NAME);
    assert!(list.items.is_empty());
    assert_eq!(entry_names(&store_root(&temp_dir)), vec!["1 Todo"]);
}

#[test]
fn default_list_is_not_recreated_on_reopen() {
    let temp_dir = TempDir::new().unwrap();
    drop(open(&temp_dir));

    let store = open(&temp_dir);
    assert_eq!(store.lists().len(), 1);
    assert_eq!(store.last_list_id(), 1);
}

#[test]
fn open_skips_malformed_entries() {
    let temp_dir = TempDir::new().unwrap();
    let root = store_root(&temp_dir);
    fs::create_dir_all(root.join("3 Work")).unwrap();
    fs::create_dir_all(root.join("not a list")).unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::write(root.join("3 Work").join("1"), "0\nShip it\n").unwrap();
    fs::write(root.join("3 Work").join("2"), "").unwrap();
    fs::write(root.join("3 Work").join("notes"), "0\nignored\n").unwrap();

    let store = open(&temp_dir);

    assert_eq!(store.lists().len(), 1);
    let list = store.list(3).unwrap();
    assert_eq!(list.name, "Work");
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].label, "Ship it");
}

// =============================================================================
// Mutations
// =============================================================================

#[test]
fn grocery_list_walkthrough() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);

    let list_id = store.create_list("Groceries").unwrap().id;
    let milk = store.add_item(list_id, "Milk").unwrap();
    let eggs = store.add_item(list_id, "Eggs").unwrap();
    assert_eq!((milk.id, eggs.id), (1, 2));

    store.toggle_item(list_id, milk.id, true).unwrap();
    let removed = store.clear_completed(list_id).unwrap();
    assert_eq!(removed, vec![1]);

    let list = store.list(list_id).unwrap();
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].label, "Eggs");
    assert!(!list.items[0].complete);

    let dir = store_root(&temp_dir).join(format!("{list_id} Groceries"));
    assert_eq!(entry_names(&dir), vec!["2"]);
}

#[test]
fn item_ids_are_never_reused() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);

    assert_eq!(store.add_item(1, "Milk").unwrap().id, 1);
    assert_eq!(store.add_item(1, "Eggs").unwrap().id, 2);

    store.toggle_item(1, 2, true).unwrap();
    store.clear_completed(1).unwrap();
    assert_eq!(store.add_item(1, "Bread").unwrap().id, 3);

    // The high-water mark is recovered from the files that remain
    drop(store);
    let mut store = open(&temp_dir);
    assert_eq!(store.add_item(1, "Butter").unwrap().id, 4);
}

#[test]
fn list_ids_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);
    let groceries = store.create_list("Groceries").unwrap().id;
    let chores = store.create_list("Chores").unwrap().id;
    assert_eq!((groceries, chores), (2, 3));
    drop(store);

    let mut store = open(&temp_dir);
    let names: Vec<(u64, &str)> = store
        .lists()
        .iter()
        .map(|list| (list.id, list.name.as_str()))
        .collect();
    assert_eq!(names, vec![(1, "Todo"), (2, "Groceries"), (3, "Chores")]);

    assert_eq!(store.create_list("Garden").unwrap().id, 4);
}

#[test]
fn toggle_round_trips_through_disk() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);
    store.add_item(1, "Water the plants").unwrap();
    store.toggle_item(1, 1, true).unwrap();
    drop(store);

    let mut store = open(&temp_dir);
    let item = store.list(1).unwrap().item(1).unwrap().clone();
    assert_eq!(item.label, "Water the plants");
    assert!(item.complete);

    store.toggle_item(1, 1, false).unwrap();
    drop(store);

    let store = open(&temp_dir);
    assert!(!store.list(1).unwrap().item(1).unwrap().complete);
}

#[test]
fn rename_moves_every_item() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);
    store.add_item(1, "Milk").unwrap();
    store.add_item(1, "Eggs").unwrap();

    store.rename_list(1, "Shopping").unwrap();

    let root = store_root(&temp_dir);
    assert!(!root.join("1 Todo").exists());
    let dir = root.join("1 Shopping");
    assert_eq!(entry_names(&dir), vec!["1", "2"]);
    assert_eq!(fs::read_to_string(dir.join("1")).unwrap(), "0\nMilk\n");
    assert_eq!(fs::read_to_string(dir.join("2")).unwrap(), "0\nEggs\n");

    drop(store);
    let store = open(&temp_dir);
    assert_eq!(store.list(1).unwrap().name, "Shopping");
    assert_eq!(store.list(1).unwrap().items.len(), 2);
}

#[test]
fn rename_onto_existing_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);
    fs::create_dir(store_root(&temp_dir).join("1 Taken")).unwrap();

    let err = store.rename_list(1, "Taken").unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
    assert_eq!(store.list(1).unwrap().name, "Todo");
}

#[test]
fn deleted_list_is_not_recovered() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);
    let id = store.create_list("Groceries").unwrap().id;
    store.add_item(id, "Milk").unwrap();

    let deleted = store.delete_list(id).unwrap();
    assert_eq!(deleted.items.len(), 1);
    assert!(!store_root(&temp_dir).join("2 Groceries").exists());
    drop(store);

    let store = open(&temp_dir);
    assert!(store.list(id).is_none());
    assert_eq!(store.lists().len(), 1);
}

#[test]
fn deleted_list_id_is_not_reused_in_process() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);
    let id = store.create_list("Groceries").unwrap().id;

    store.delete_list(id).unwrap();
    assert_eq!(store.create_list("Hardware").unwrap().id, id + 1);
}

#[test]
fn invalid_input_is_rejected_without_side_effects() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open(&temp_dir);

    assert!(matches!(
        store.create_list("a/b"),
        Err(StoreError::InvalidName { .. })
    ));
    assert!(matches!(
        store.add_item(1, "two\nlines"),
        Err(StoreError::InvalidLabel(_))
    ));
    assert!(matches!(
        store.add_item(9, "Milk"),
        Err(StoreError::ListNotFound(9))
    ));
    assert!(matches!(
        store.toggle_item(1, 5, true),
        Err(StoreError::ItemNotFound { list_id: 1, item_id: 5 })
    ));

    assert_eq!(store.lists().len(), 1);
    assert!(store.list(1).unwrap().items.is_empty());
    assert_eq!(entry_names(&store_root(&temp_dir)), vec!["1 Todo"]);
}
