//! Consistency check between a store directory and its manifest

use crate::store::{document_id, list_document_files, Manifest, StoreError};
use std::collections::{BTreeSet, HashSet};
use std::ops::RangeInclusive;
use std::path::Path;

/// Result of comparing the document files on disk with the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub documents: usize,
    pub manifest_entries: usize,

    /// Listed in the manifest but absent from the directory
    pub missing_files: Vec<String>,

    /// Present in the directory but not listed in the manifest
    pub unlisted_files: Vec<String>,

    /// Runs of ids between 1 and the highest id with no document file
    pub id_gaps: Vec<RangeInclusive<u64>>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_files.is_empty() && self.unlisted_files.is_empty() && self.id_gaps.is_empty()
    }
}

/// Compares `dir` against the manifest stored in it
pub fn verify_store(dir: &Path, manifest_file: &str) -> Result<VerifyReport, StoreError> {
    let manifest = Manifest::load(&dir.join(manifest_file))?;
    let files = list_document_files(dir)?;

    let on_disk: HashSet<&str> = files.iter().map(String::as_str).collect();
    let listed: HashSet<&str> = manifest
        .entries()
        .iter()
        .map(|entry| entry.file_name.as_str())
        .collect();

    let missing_files = manifest
        .entries()
        .iter()
        .filter(|entry| !on_disk.contains(entry.file_name.as_str()))
        .map(|entry| entry.file_name.clone())
        .collect();

    let unlisted_files = files
        .iter()
        .filter(|name| !listed.contains(name.as_str()))
        .cloned()
        .collect();

    let ids: BTreeSet<u64> = files.iter().filter_map(|name| document_id(name)).collect();
    let id_gaps = missing_id_ranges(&ids);

    Ok(VerifyReport {
        documents: files.len(),
        manifest_entries: manifest.len(),
        missing_files,
        unlisted_files,
        id_gaps,
    })
}

/// Gaps in the id sequence `1..=max`, one range per run of absent ids
///
/// Work is proportional to the number of ids present, not to their values.
fn missing_id_ranges(ids: &BTreeSet<u64>) -> Vec<RangeInclusive<u64>> {
    let mut gaps = Vec::new();
    let mut expected = 1u64;
    for &id in ids {
        if id > expected {
            gaps.push(expected..=id - 1);
        }
        expected = id.saturating_add(1);
    }
    gaps
}
