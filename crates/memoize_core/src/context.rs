//! The active build context: the file set one pipeline run operates on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::file_info::FileInfo;

/// A path-keyed collection of file records plus the directories and
/// encoding table a build run operates against.
///
/// Within one context, `path` is unique: adding a record with an
/// existing path replaces it. Records iterate in path order so runs are
/// deterministic.
#[derive(Debug, Clone)]
pub struct BuildContext {
    base_dir: PathBuf,
    output_dir: PathBuf,
    file_encodings: BTreeMap<String, String>,
    skips: Vec<String>,
    files: BTreeMap<String, FileInfo>,
}

impl BuildContext {
    /// Creates an empty context rooted at `base_dir`, writing final
    /// outputs under `output_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            output_dir: output_dir.into(),
            file_encodings: BTreeMap::new(),
            skips: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    /// Sets the path-pattern to encoding table consulted during traversal.
    pub fn with_encodings(mut self, encodings: BTreeMap<String, String>) -> Self {
        self.file_encodings = encodings;
        self
    }

    /// Sets top-level entry names that traversal must not descend into,
    /// e.g. the cache directory when it lives under the base directory.
    pub fn with_skips(mut self, skips: Vec<String>) -> Self {
        self.skips = skips;
        self
    }

    /// The directory all record paths are relative to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The directory final build outputs are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The path-pattern to encoding table.
    pub fn file_encodings(&self) -> &BTreeMap<String, String> {
        &self.file_encodings
    }

    /// Top-level entry names excluded from traversal.
    pub fn skips(&self) -> &[String] {
        &self.skips
    }

    /// Inserts a record, replacing any existing record with the same path.
    pub fn add_file(&mut self, file: FileInfo) {
        self.files.insert(file.path().to_string(), file);
    }

    /// Removes and returns the record at `path`; no-op if absent.
    pub fn remove_file(&mut self, path: &str) -> Option<FileInfo> {
        self.files.remove(path)
    }

    /// Looks up a record by path.
    pub fn get_file(&self, path: &str) -> Option<&FileInfo> {
        self.files.get(path)
    }

    /// Looks up a record by path for mutation.
    pub fn get_file_mut(&mut self, path: &str) -> Option<&mut FileInfo> {
        self.files.get_mut(path)
    }

    /// All records, in path order.
    pub fn files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.values()
    }

    /// A snapshot of all record paths, in path order.
    ///
    /// Used by the pipeline driver to iterate per-file while stages
    /// add and remove records underneath it.
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// The number of records currently held.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the context holds no records.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
