//! On-disk record codec for a single item.
//!
//! Each item lives in a file named after its id, holding two lines:
//!
//! ```text
//! 1
//! Buy milk
//! ```
//!
//! The first character of the first line is the completion flag (`'1'` means
//! complete, anything else means incomplete). The second line is the label,
//! stored verbatim. Further lines are ignored and reserved for metadata.
//!
//! # Constraints
//!
//! Files are read whole before parsing, so records of any length decode
//! correctly. Labels must still be single-line: the codec does not reject an
//! embedded newline on encode, and such a label decodes as its first line.
//!
//! # Example
//!
//! ```
//! use kitchentodo_store::record::{decode, encode};
//! use kitchentodo_store::types::Item;
//!
//! let item = Item { id: 4, label: "Eggs".to_string(), complete: true };
//! let text = encode(&item);
//! assert_eq!(text, "1\nEggs\n");
//! assert_eq!(decode(4, &text).unwrap(), item);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{Item, ItemId};

/// Errors produced while reading, writing, or parsing an item record.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record file does not exist.
    #[error("record not found: {0}")]
    NotFound(PathBuf),

    /// The record has no completion line.
    #[error("record is empty")]
    Empty,

    /// The record has a completion line but no label line.
    #[error("record is missing its label line")]
    MissingLabel,

    /// The file name is not a decimal item id.
    #[error("invalid item file name: {0:?}")]
    InvalidId(String),

    /// Reading or writing the record file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for record operations.
pub type Result<T> = std::result::Result<T, RecordError>;

/// Encodes an item as `"<0|1>\n<label>\n"`.
#[must_use]
pub fn encode(item: &Item) -> String {
    format!("{}\n{}\n", u8::from(item.complete), item.label)
}

/// Decodes the textual record of the item with the given id.
///
/// # Errors
///
/// Returns [`RecordError::Empty`] when there is no completion line and
/// [`RecordError::MissingLabel`] when there is no label line.
pub fn decode(id: ItemId, text: &str) -> Result<Item> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let complete = match lines.first() {
        Some(flag) if !flag.is_empty() => flag.starts_with('1'),
        _ => return Err(RecordError::Empty),
    };

    // "1\n" splits into ["1", ""]: the empty tail is not a label line unless
    // it was itself newline-terminated.
    let label = match lines.get(1) {
        Some(label) if !label.is_empty() || lines.len() > 2 => (*label).to_string(),
        _ => return Err(RecordError::MissingLabel),
    };

    Ok(Item {
        id,
        label,
        complete,
    })
}

/// Parses an item file name into its id.
///
/// # Errors
///
/// Returns [`RecordError::InvalidId`] unless the name is a plain decimal `u64`.
pub fn parse_item_file_name(name: &str) -> Result<ItemId> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordError::InvalidId(name.to_string()));
    }
    name.parse::<ItemId>()
        .map_err(|_| RecordError::InvalidId(name.to_string()))
}

/// Reads and decodes the item stored at `path`.
///
/// The item id comes from the file name. The existence check happens before
/// the read and is not atomic with it.
///
/// # Errors
///
/// Returns [`RecordError::NotFound`] if the file does not exist, a parse error
/// for a malformed name or body, or [`RecordError::Io`] if reading fails.
pub fn read_item(path: &Path) -> Result<Item> {
    if !path.exists() {
        return Err(RecordError::NotFound(path.to_path_buf()));
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let id = parse_item_file_name(name)?;

    let text = fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
    decode(id, &text)
}

/// Writes `item` to `path`, replacing any previous content.
///
/// # Errors
///
/// Returns [`RecordError::Io`] if the file cannot be written.
pub fn write_item(path: &Path, item: &Item) -> Result<()> {
    fs::write(path, encode(item)).map_err(|e| RecordError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_incomplete_and_complete() {
        assert_eq!(encode(&Item::new(1, "Milk")), "0\nMilk\n");

        let done = Item {
            id: 2,
            label: "Eggs".to_string(),
            complete: true,
        };
        assert_eq!(encode(&done), "1\nEggs\n");
    }

    #[test]
    fn test_decode_completion_flag_uses_first_character() {
        assert!(decode(1, "1\nA\n").unwrap().complete);
        assert!(decode(1, "10\nA\n").unwrap().complete);
        assert!(!decode(1, "0\nA\n").unwrap().complete);
        assert!(!decode(1, "x\nA\n").unwrap().complete);
        assert!(!decode(1, "true\nA\n").unwrap().complete);
    }

    #[test]
    fn test_decode_ignores_extra_lines() {
        let item = decode(9, "1\nWater plants\npriority=high\nmore\n").unwrap();
        assert_eq!(item.id, 9);
        assert_eq!(item.label, "Water plants");
        assert!(item.complete);
    }

    #[test]
    fn test_decode_without_trailing_newline() {
        let item = decode(3, "0\nNo newline").unwrap();
        assert_eq!(item.label, "No newline");
    }

    #[test]
    fn test_decode_strips_carriage_returns() {
        let item = decode(3, "1\r\nWindows\r\n").unwrap();
        assert!(item.complete);
        assert_eq!(item.label, "Windows");
    }

    #[test]
    fn test_decode_keeps_label_whitespace() {
        let item = decode(1, "0\n  padded label \n").unwrap();
        assert_eq!(item.label, "  padded label ");
    }

    #[test]
    fn test_decode_empty_record() {
        assert!(matches!(decode(1, ""), Err(RecordError::Empty)));
        assert!(matches!(decode(1, "\nlabel\n"), Err(RecordError::Empty)));
    }

    #[test]
    fn test_decode_missing_label() {
        assert!(matches!(decode(1, "1"), Err(RecordError::MissingLabel)));
        assert!(matches!(decode(1, "1\n"), Err(RecordError::MissingLabel)));
    }

    #[test]
    fn test_decode_allows_empty_label_line() {
        let item = decode(1, "0\n\n").unwrap();
        assert_eq!(item.label, "");
    }

    #[test]
    fn test_label_longer_than_a_read_chunk_round_trips() {
        let long_label = "x".repeat(4096);
        let item = Item::new(5, long_label.clone());

        let decoded = decode(5, &encode(&item)).unwrap();
        assert_eq!(decoded.label, long_label);
    }

    #[test]
    fn test_embedded_newline_decodes_first_line_only() {
        let item = Item::new(1, "first\nsecond");
        let decoded = decode(1, &encode(&item)).unwrap();
        assert_eq!(decoded.label, "first");
    }

    #[test]
    fn test_parse_item_file_name() {
        assert_eq!(parse_item_file_name("42").unwrap(), 42);
        assert!(parse_item_file_name("").is_err());
        assert!(parse_item_file_name("4x").is_err());
        assert!(parse_item_file_name("+4").is_err());
        assert!(parse_item_file_name("notes.txt").is_err());
        assert!(parse_item_file_name("99999999999999999999999").is_err());
    }

    #[test]
    fn test_read_item_not_found() {
        let dir = TempDir::new().unwrap();
        let result = read_item(&dir.path().join("1"));
        assert!(matches!(result, Err(RecordError::NotFound(_))));
    }

    #[test]
    fn test_write_then_read_item() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("12");
        let item = Item {
            id: 12,
            label: "Call plumber".to_string(),
            complete: true,
        };

        write_item(&path, &item).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\nCall plumber\n");
        assert_eq!(read_item(&path).unwrap(), item);
    }

    #[test]
    fn test_read_item_rejects_non_numeric_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes");
        fs::write(&path, "0\nhello\n").unwrap();

        assert!(matches!(read_item(&path), Err(RecordError::InvalidId(_))));
    }

    #[test]
    fn test_write_item_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone").join("1");

        let result = write_item(&path, &Item::new(1, "x"));
        assert!(matches!(result, Err(RecordError::Io { .. })));
    }
}
