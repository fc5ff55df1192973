//! Manifest: document file name → source URL
//!
//! Entries are kept in persistence order and serialized as one pretty-printed
//! JSON object, e.g.
//!
//! ```json
//! {
//!   "doc_1.txt": "http://a/",
//!   "doc_2.txt": "http://a/x"
//! }
//! ```

use crate::store::{atomic_write, document_id, StorageKey, StoreError};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::path::Path;

/// One manifest row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file_name: String,
    pub source: String,
}

/// In-memory manifest for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the entry for a freshly persisted document
    pub fn record(&mut self, key: &StorageKey, source: &str) {
        self.entries.push(ManifestEntry {
            file_name: key.file_name().to_string(),
            source: source.to_string(),
        });
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source URL recorded for a document file
    pub fn source_of(&self, file_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.file_name == file_name)
            .map(|entry| entry.source.as_str())
    }

    /// Serializes the manifest to `path`, replacing any previous file atomically
    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        atomic_write(path, json.as_bytes())
    }

    /// Reads a manifest written by [`Manifest::write`]
    ///
    /// Entries come back ordered by document id; keys that are not document
    /// file names are kept and sorted last.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let map: BTreeMap<String, String> =
            serde_json::from_str(&content).map_err(|e| StoreError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut entries: Vec<ManifestEntry> = map
            .into_iter()
            .map(|(file_name, source)| ManifestEntry { file_name, source })
            .collect();
        entries.sort_by_key(|entry| document_id(&entry.file_name).unwrap_or(u64::MAX));

        Ok(Self { entries })
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.file_name, &entry.source)?;
        }
        map.end()
    }
}
