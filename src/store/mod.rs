//! Document store for the ingested corpus
//!
//! This module handles everything written to the store directory:
//! - one immutable `doc_<n>.txt` file per persisted page
//! - the manifest mapping file names to source URLs
//! - a lock file that keeps two runs off the same directory
//!
//! Document ids start at 1 and advance only when a file has been written,
//! so ids are dense over successfully persisted pages.

mod manifest;
mod verify;

pub use manifest::{Manifest, ManifestEntry};
pub use verify::{verify_store, VerifyReport};

use crate::config::{ManifestMode, StoreConfig};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Name of the lock file held for the duration of a run
pub const LOCK_FILE: &str = ".ingest.lock";

const DOC_PREFIX: &str = "doc_";
const DOC_EXTENSION: &str = ".txt";

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Store directory {0} is locked by another run")]
    Locked(PathBuf),

    #[error("Store directory {dir} already holds {documents} documents; pass --fresh to replace them")]
    NotEmpty { dir: PathBuf, documents: usize },

    #[error("Manifest {path} is invalid: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File name for a document id
pub fn document_file_name(id: u64) -> String {
    format!("{}{}{}", DOC_PREFIX, id, DOC_EXTENSION)
}

/// Parses the id out of a document file name
pub fn document_id(file_name: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(DOC_PREFIX)?
        .strip_suffix(DOC_EXTENSION)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|id| *id >= 1)
}

/// Writes `contents` to `path` through a temporary file and a rename
///
/// Readers see either the previous file or the complete new one.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let mut file = File::create(&tmp).map_err(io_error(&tmp))?;
    file.write_all(contents).map_err(io_error(&tmp))?;
    file.sync_all().map_err(io_error(&tmp))?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_error(path))
}

/// Stable identity of a persisted document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    id: u64,
    file_name: String,
}

impl StorageKey {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            file_name: document_file_name(id),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// A page ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: Url,
    pub title: String,
    pub body: String,
}

impl Document {
    /// File content: title line, blank line, body text
    ///
    /// Line breaks inside the title are folded to spaces so the first line
    /// is always the whole title.
    pub fn render(&self) -> String {
        let title = self.title.split_whitespace().collect::<Vec<_>>().join(" ");
        format!("{}\n\n{}", title, self.body)
    }
}

/// Lock file removed when the store is dropped
#[derive(Debug)]
struct RunLock {
    path: PathBuf,
}

impl RunLock {
    fn acquire(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Locked(dir.to_path_buf()));
            }
            Err(e) => return Err(io_error(&path)(e)),
        };

        // The lock is held from here on; a failed pid write only loses diagnostics
        let _ = writeln!(file, "{}", std::process::id());

        Ok(Self { path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

/// Durable store for one ingest run
#[derive(Debug)]
pub struct DocumentStore {
    dir: PathBuf,
    manifest_path: PathBuf,
    manifest_mode: ManifestMode,
    manifest: Manifest,
    next_id: u64,
    _lock: RunLock,
}

impl DocumentStore {
    /// Opens the store directory for a new run
    ///
    /// Creates the directory if needed and takes the run lock. A directory
    /// that still holds documents from an earlier run is rejected unless
    /// `fresh` is set, in which case those documents and the old manifest are
    /// removed first.
    pub fn open(config: &StoreConfig, fresh: bool) -> Result<Self, StoreError> {
        let dir = config.directory.clone();
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let lock = RunLock::acquire(&dir)?;
        let manifest_path = config.manifest_path();

        remove_temp_files(&dir)?;
        let existing = list_document_files(&dir)?;
        if !existing.is_empty() || manifest_path.exists() {
            if !fresh {
                return Err(StoreError::NotEmpty {
                    dir,
                    documents: existing.len(),
                });
            }

            tracing::info!(
                "Removing {} documents from previous run in {}",
                existing.len(),
                dir.display()
            );
            for name in &existing {
                let path = dir.join(name);
                fs::remove_file(&path).map_err(io_error(&path))?;
            }
            if manifest_path.exists() {
                fs::remove_file(&manifest_path).map_err(io_error(&manifest_path))?;
            }
        }

        Ok(Self {
            dir,
            manifest_path,
            manifest_mode: config.manifest_mode,
            manifest: Manifest::new(),
            next_id: 1,
            _lock: lock,
        })
    }

    /// Writes a document and returns its key
    ///
    /// The id is consumed only once the file is in place.
    pub fn persist(&mut self, document: &Document) -> Result<StorageKey, StoreError> {
        let key = StorageKey::new(self.next_id);
        let path = self.dir.join(key.file_name());

        atomic_write(&path, document.render().as_bytes())?;
        self.next_id += 1;

        tracing::debug!("Persisted {} from {}", key.file_name(), document.source);
        Ok(key)
    }

    /// Records the source URL of a persisted document
    ///
    /// In incremental mode the manifest file is rewritten immediately; the
    /// in-memory entry is kept even if that write fails.
    pub fn record_manifest(&mut self, key: &StorageKey, source: &Url) -> Result<(), StoreError> {
        self.manifest.record(key, source.as_str());

        if self.manifest_mode == ManifestMode::Incremental {
            self.manifest.write(&self.manifest_path)?;
        }
        Ok(())
    }

    /// Writes the manifest file for the run
    pub fn finish(&self) -> Result<PathBuf, StoreError> {
        self.manifest.write(&self.manifest_path)?;
        tracing::info!(
            "Wrote manifest with {} entries to {}",
            self.manifest.len(),
            self.manifest_path.display()
        );
        Ok(self.manifest_path.clone())
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Number of documents persisted in this run
    pub fn document_count(&self) -> u64 {
        self.next_id - 1
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }
}

/// Names of `doc_<n>.txt` files in `dir`
pub(crate) fn list_document_files(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let entry = entry.map_err(io_error(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if document_id(&name).is_some() {
            names.push(name);
        }
    }
    names.sort_by_key(|name| document_id(name));
    Ok(names)
}

/// Removes temporary files left behind by an interrupted write
fn remove_temp_files(dir: &Path) -> Result<(), StoreError> {
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let entry = entry.map_err(io_error(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && name.ends_with(".tmp") {
            let path = entry.path();
            tracing::debug!("Removing stale temporary file {}", path.display());
            fs::remove_file(&path).map_err(io_error(&path))?;
        }
    }
    Ok(())
}
