//! Whole-store document format
//!
//! One pretty-printed JSON object per store, mapping each key to its
//! envelope:
//!
//! ```json
//! {
//!   "hue:bridge:1": {
//!     "class": "acme.Thing",
//!     "value": { "label": "Bridge" }
//!   }
//! }
//! ```
//!
//! Only the envelope structure is parsed here. Payloads stay as JSON trees
//! and are decoded lazily by the entry codec.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use jsonvault_core::StorageEntry;

use crate::error::{ReadError, WriteError};

/// Parsed store contents, key → entry
pub type EntryMap = HashMap<String, StorageEntry>;

/// Render entries as the persisted document
///
/// Keys are written in sorted order so successive snapshots diff cleanly.
pub fn serialize_document(entries: &BTreeMap<String, StorageEntry>) -> Result<String, WriteError> {
    serde_json::to_string_pretty(entries).map_err(|e| WriteError::Serialize(e.to_string()))
}

/// Parse a persisted document from text
pub fn parse_document(path: &Path, text: &str) -> Result<EntryMap, ReadError> {
    serde_json::from_str(text).map_err(|e| ReadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read and parse the document stored at `path`
///
/// An empty file is a parse error, not an empty store.
pub fn read_document(path: &Path) -> Result<EntryMap, ReadError> {
    let text = fs::read_to_string(path).map_err(|source| ReadError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> BTreeMap<String, StorageEntry> {
        let mut entries = BTreeMap::new();
        entries.insert(
            "b".to_string(),
            StorageEntry::new("acme.Count", json!(3)),
        );
        entries.insert(
            "a".to_string(),
            StorageEntry::new("acme.Thing", json!({"label": "Bridge"})),
        );
        entries
    }

    #[test]
    fn test_serialized_shape() {
        let text = serialize_document(&sample()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(
            doc,
            json!({
                "a": {"class": "acme.Thing", "value": {"label": "Bridge"}},
                "b": {"class": "acme.Count", "value": 3}
            })
        );
        // pretty-printed, sorted
        assert!(text.contains('\n'));
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn test_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");
        fs::write(&path, serialize_document(&sample()).unwrap()).unwrap();

        let entries = read_document(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["a"].type_name(), "acme.Thing");
        assert_eq!(entries["b"].payload(), &json!(3));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_document(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(ReadError::Unavailable { .. })));
    }

    #[test]
    fn test_malformed_documents_are_parse_errors() {
        let path = Path::new("db.json");
        for text in [
            "",
            "   \n",
            "{\"a\": ",
            "null",
            "[1, 2]",
            "{\"a\": {\"class\": \"x\"}}",
            "{\"a\": {\"value\": 1}}",
            "{\"a\": 5}",
        ] {
            assert!(
                matches!(parse_document(path, text), Err(ReadError::Parse { .. })),
                "expected parse error for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_empty_object_is_empty_store() {
        let entries = parse_document(Path::new("db.json"), "{}").unwrap();
        assert!(entries.is_empty());
    }
}
