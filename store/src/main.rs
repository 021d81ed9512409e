//! KitchenTodo - hierarchical to-do lists stored as plain files.
//!
//! # Commands
//!
//! - `kitchentodo show`: Print every list and item
//! - `kitchentodo create-list`, `delete-list`, `rename-list`: Manage lists
//! - `kitchentodo add`, `toggle`, `clear`: Manage items
//! - `kitchentodo watch`: Follow external edits until interrupted
//!
//! # Environment Variables
//!
//! See the [`config`](kitchentodo_store::config) module for available
//! configuration options.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kitchentodo_store::config::Config;
use kitchentodo_store::store::{Store, StoreEvent};
use kitchentodo_store::types::{ItemId, ListId, TodoList};

/// KitchenTodo - hierarchical to-do lists stored as plain files.
///
/// Every list is a directory and every item a small file, so lists can be
/// edited by hand or synced with other tools.
#[derive(Parser, Debug)]
#[command(name = "kitchentodo")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    KITCHENTODO_DIR            Store root (default: ~/.local/share/kitchentodo)
    KITCHENTODO_DEBOUNCE_MS    Change coalescing window (default: 50)
    KITCHENTODO_EVENT_BUFFER   Watcher event capacity (default: 256)

EXAMPLES:
    # Create a list and add to it
    kitchentodo create-list Groceries
    kitchentodo add 2 Milk

    # Mark item 1 of list 2 done, then clear it
    kitchentodo toggle 2 1
    kitchentodo clear 2

    # Follow changes made by other programs
    kitchentodo watch
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print every list and its items.
    Show {
        /// Print the lists as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a new list.
    CreateList {
        /// Name of the list.
        name: String,
    },

    /// Delete a list and all of its items.
    DeleteList {
        /// Id of the list to delete.
        list_id: ListId,
    },

    /// Rename a list.
    RenameList {
        /// Id of the list to rename.
        list_id: ListId,

        /// New name of the list.
        name: String,
    },

    /// Add an item to a list.
    Add {
        /// Id of the list.
        list_id: ListId,

        /// Text of the item.
        label: String,
    },

    /// Mark an item done (or not done with --undone).
    Toggle {
        /// Id of the list.
        list_id: ListId,

        /// Id of the item.
        item_id: ItemId,

        /// Mark the item as not done.
        #[arg(long)]
        undone: bool,
    },

    /// Delete every completed item of a list.
    Clear {
        /// Id of the list.
        list_id: ListId,
    },

    /// Follow changes made to the store by other programs.
    ///
    /// Prints one line per changed list until Ctrl+C or SIGTERM.
    Watch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // One-shot commands keep stderr quiet unless RUST_LOG asks otherwise
    match cli.command {
        Command::Watch => init_logging("info"),
        _ => init_logging("warn"),
    }

    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Watch => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;
            runtime.block_on(run_watch(config))
        }
        command => run_command(&config, command),
    }
}

/// Runs a one-shot command against the store.
fn run_command(config: &Config, command: Command) -> Result<()> {
    let mut store = Store::open(config).with_context(|| {
        format!("Failed to open store at {}", config.root.display())
    })?;
    let mut stdout = io::stdout().lock();

    match command {
        Command::Show { json } => {
            if json {
                let output = serde_json::to_string_pretty(store.lists())
                    .context("Failed to serialize lists")?;
                writeln!(stdout, "{output}")?;
            } else {
                for list in store.lists() {
                    print_list(&mut stdout, list)?;
                }
            }
        }
        Command::CreateList { name } => {
            let list = store
                .create_list(&name)
                .with_context(|| format!("Failed to create list {name:?}"))?;
            writeln!(stdout, "Created list {} {}", list.id, list.name)?;
        }
        Command::DeleteList { list_id } => {
            let list = store
                .delete_list(list_id)
                .with_context(|| format!("Failed to delete list {list_id}"))?;
            writeln!(
                stdout,
                "Deleted list {} {} ({} items)",
                list.id,
                list.name,
                list.items.len()
            )?;
        }
        Command::RenameList { list_id, name } => {
            store
                .rename_list(list_id, &name)
                .with_context(|| format!("Failed to rename list {list_id}"))?;
            writeln!(stdout, "Renamed list {list_id} to {name}")?;
        }
        Command::Add { list_id, label } => {
            let item = store
                .add_item(list_id, &label)
                .with_context(|| format!("Failed to add item to list {list_id}"))?;
            writeln!(stdout, "Added item {} to list {list_id}", item.id)?;
        }
        Command::Toggle {
            list_id,
            item_id,
            undone,
        } => {
            store
                .toggle_item(list_id, item_id, !undone)
                .with_context(|| format!("Failed to update item {item_id} of list {list_id}"))?;
            let state = if undone { "not done" } else { "done" };
            writeln!(stdout, "Marked item {item_id} of list {list_id} {state}")?;
        }
        Command::Clear { list_id } => {
            let removed = store
                .clear_completed(list_id)
                .with_context(|| format!("Failed to clear list {list_id}"))?;
            writeln!(
                stdout,
                "Removed {} completed items from list {list_id}",
                removed.len()
            )?;
        }
        Command::Watch => unreachable!("watch runs on the async runtime"),
    }

    Ok(())
}

/// Runs the live-sync loop until a shutdown signal arrives.
async fn run_watch(config: Config) -> Result<()> {
    info!(
        root = %config.root.display(),
        debounce_ms = config.debounce.as_millis(),
        "Starting KitchenTodo watch"
    );

    let mut store = Store::open(&config).with_context(|| {
        format!("Failed to open store at {}", config.root.display())
    })?;

    for list in store.lists() {
        println!("{} {}: {} items", list.id, list.name, list.items.len());
    }

    info!("Watching for changes. Press Ctrl+C to stop.");

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received");
                break;
            }

            event = store.next_change() => {
                match event {
                    Some(StoreEvent::ListChanged { list_id, report }) => {
                        if let Some(list) = store.list(list_id) {
                            println!(
                                "{} {}: {} items (+{} added, {} updated)",
                                list.id,
                                list.name,
                                list.items.len(),
                                report.added,
                                report.updated
                            );
                        }
                    }
                    Some(StoreEvent::WatchStopped { list_id, reason }) => {
                        warn!(list_id, reason = %reason, "Live sync stopped");
                        println!("{list_id}: live sync stopped ({reason})");
                    }
                    None => break,
                }
            }
        }
    }

    store.shutdown();
    info!("KitchenTodo watch stopped");
    Ok(())
}

fn print_list(out: &mut impl Write, list: &TodoList) -> io::Result<()> {
    writeln!(
        out,
        "{} {} ({}/{} done)",
        list.id,
        list.name,
        list.completed_count(),
        list.items.len()
    )?;
    for item in &list.items {
        let mark = if item.complete { 'x' } else { ' ' };
        writeln!(out, "  [{mark}] {} {}", item.id, item.label)?;
    }
    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => result.context("Failed to install Ctrl+C handler"),
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    }
}
