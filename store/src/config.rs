//! Configuration module for the KitchenTodo store.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `KITCHENTODO_DIR` | No | `~/.local/share/kitchentodo` | Store root directory |
//! | `KITCHENTODO_DEBOUNCE_MS` | No | 50 | Window for coalescing watcher events (0 disables) |
//! | `KITCHENTODO_EVENT_BUFFER` | No | 256 | Watcher event channel capacity |
//!
//! # Example
//!
//! ```no_run
//! use kitchentodo_store::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Store root: {}", config.root.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

/// Store directory relative to the home directory.
const DEFAULT_STORE_DIR: &str = ".local/share/kitchentodo";

/// Default coalescing window for watcher events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Default watcher event channel capacity.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root directory holding one subdirectory per list.
    pub root: PathBuf,

    /// How long to wait after a watcher event before reconciling, so bursts
    /// of writes to the same list collapse into one reload.
    pub debounce: Duration,

    /// Capacity of the channel carrying watcher events to the primary actor.
    pub event_buffer: usize,
}

impl Config {
    /// Creates a config with default settings for an explicit store root.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `KITCHENTODO_DIR` is unset and the home directory cannot be determined
    /// - `KITCHENTODO_DEBOUNCE_MS` is set but is not a non-negative integer
    /// - `KITCHENTODO_EVENT_BUFFER` is set but is not a positive integer
    pub fn from_env() -> Result<Self, ConfigError> {
        // Optional: KITCHENTODO_DIR (default: ~/.local/share/kitchentodo)
        let root = match env::var("KITCHENTODO_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_STORE_DIR)
            }
        };

        // Optional: KITCHENTODO_DEBOUNCE_MS (default: 50)
        let debounce_ms = match env::var("KITCHENTODO_DEBOUNCE_MS") {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "KITCHENTODO_DEBOUNCE_MS".to_string(),
                message: format!("expected non-negative integer, got '{val}'"),
            })?,
            Err(_) => DEFAULT_DEBOUNCE_MS,
        };

        // Optional: KITCHENTODO_EVENT_BUFFER (default: 256, must be > 0)
        let event_buffer = match env::var("KITCHENTODO_EVENT_BUFFER") {
            Ok(val) => {
                let size = val
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "KITCHENTODO_EVENT_BUFFER".to_string(),
                        message: format!("expected positive integer, got '{val}'"),
                    })?;
                if size == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "KITCHENTODO_EVENT_BUFFER".to_string(),
                        message: "buffer size must be greater than 0".to_string(),
                    });
                }
                size
            }
            Err(_) => DEFAULT_EVENT_BUFFER,
        };

        Ok(Self {
            root,
            debounce: Duration::from_millis(debounce_ms),
            event_buffer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to run tests with isolated environment variables.
    /// Clears all KITCHENTODO_* vars before the test and restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("KITCHENTODO_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        for (key, _) in env::vars().filter(|(k, _)| k.starts_with("KITCHENTODO_")) {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    #[test]
    #[serial]
    fn test_default_config() {
        with_clean_env(|| {
            let config = Config::from_env().expect("should parse default config");

            assert!(config.root.ends_with(DEFAULT_STORE_DIR));
            assert_eq!(config.debounce, Duration::from_millis(DEFAULT_DEBOUNCE_MS));
            assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        });
    }

    #[test]
    #[serial]
    fn test_full_config() {
        with_clean_env(|| {
            env::set_var("KITCHENTODO_DIR", "/custom/store");
            env::set_var("KITCHENTODO_DEBOUNCE_MS", "0");
            env::set_var("KITCHENTODO_EVENT_BUFFER", "8");

            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.root, PathBuf::from("/custom/store"));
            assert_eq!(config.debounce, Duration::ZERO);
            assert_eq!(config.event_buffer, 8);
        });
    }

    #[test]
    #[serial]
    fn test_empty_dir_falls_back_to_home() {
        with_clean_env(|| {
            env::set_var("KITCHENTODO_DIR", "");

            let config = Config::from_env().expect("should parse config");
            assert!(config.root.ends_with(DEFAULT_STORE_DIR));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_debounce() {
        with_clean_env(|| {
            env::set_var("KITCHENTODO_DEBOUNCE_MS", "soon");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "KITCHENTODO_DEBOUNCE_MS"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_zero_event_buffer_rejected() {
        with_clean_env(|| {
            env::set_var("KITCHENTODO_EVENT_BUFFER", "0");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "KITCHENTODO_EVENT_BUFFER" && message.contains("greater than 0")
            ));
        });
    }

    #[test]
    fn test_with_root_uses_defaults() {
        let config = Config::with_root("/tmp/todo");
        assert_eq!(config.root, PathBuf::from("/tmp/todo"));
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::NoHomeDirectory.to_string(),
            "failed to determine home directory"
        );

        let err = ConfigError::InvalidValue {
            key: "KITCHENTODO_EVENT_BUFFER".to_string(),
            message: "expected positive integer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for KITCHENTODO_EVENT_BUFFER: expected positive integer"
        );
    }
}
