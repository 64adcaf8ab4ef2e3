//! Per-file records flowing through the build pipeline.

use std::path::{Path, PathBuf};

use memoize_common::Digest;

use crate::error::MemoizeError;

/// Normalizes a relative path to forward-slash separators.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// One file in a build or cache context.
///
/// `path` is the slash-normalized path relative to the owning context's
/// base directory and is the unique key within that context; `full_path`
/// is derived from the base directory. The content digest is computed on
/// first use and cached on the record for the rest of the run.
#[derive(Debug, Clone)]
pub struct FileInfo {
    path: String,
    full_path: PathBuf,
    extension: String,
    content: Vec<u8>,
    encoding: Option<String>,
    output_paths: Vec<String>,
    digest: Option<Digest>,
}

impl FileInfo {
    /// Creates a record from in-memory content, rooted at `base_dir`.
    pub fn new(base_dir: &Path, path: &str, content: Vec<u8>) -> Self {
        let path = normalize_path(path);
        let full_path = base_dir.join(&path);
        let extension = Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Self {
            path,
            full_path,
            extension,
            content,
            encoding: None,
            output_paths: Vec::new(),
            digest: None,
        }
    }

    /// Reads a record's content from `<base_dir>/<path>` on disk.
    pub fn from_disk(base_dir: &Path, path: &str) -> Result<Self, MemoizeError> {
        let full_path = base_dir.join(normalize_path(path));
        let content = std::fs::read(&full_path).map_err(|e| MemoizeError::io(&full_path, e))?;
        Ok(Self::new(base_dir, path, content))
    }

    /// The slash-normalized path relative to the owning context.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The absolute path, derived from the owning context's base directory.
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// The file extension without the leading dot, or `""` if none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The file's byte content.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Replaces the content, invalidating any cached digest.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
        self.digest = None;
    }

    /// The resolved character encoding, if one matched the encoding table.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Sets the resolved character encoding.
    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = Some(encoding.into());
    }

    /// Destination-relative paths assigned by downstream stages.
    pub fn output_paths(&self) -> &[String] {
        &self.output_paths
    }

    /// Assigns an additional destination-relative output path.
    pub fn add_output_path(&mut self, path: &str) {
        self.output_paths.push(normalize_path(path));
    }

    /// Destination-relative paths this record is written to or deleted
    /// from: the explicitly assigned output paths, or the record's own
    /// `path` when none was assigned (cached outputs mirror
    /// source-relative paths).
    pub fn output_targets(&self) -> Vec<&str> {
        if self.output_paths.is_empty() {
            vec![self.path.as_str()]
        } else {
            self.output_paths.iter().map(String::as_str).collect()
        }
    }

    /// The content digest, computed on first use and cached.
    pub fn digest(&mut self) -> Digest {
        if let Some(digest) = self.digest {
            return digest;
        }
        let digest = Digest::from_bytes(&self.content);
        self.digest = Some(digest);
        digest
    }

    /// The digest already attached to this record, without computing one.
    ///
    /// For cache-side records this is the digest remembered by the
    /// manifest; a record with no manifest entry has no known digest, so
    /// any freshness comparison against it fails closed to stale.
    pub fn known_digest(&self) -> Option<Digest> {
        self.digest
    }

    /// Attaches a digest remembered from the manifest.
    pub(crate) fn set_digest(&mut self, digest: Digest) {
        self.digest = Some(digest);
    }

    /// Returns a copy of this record rooted at a different base
    /// directory, keeping path, content, extension, and encoding.
    pub fn rebase(&self, base_dir: &Path) -> FileInfo {
        let mut copy = self.clone();
        copy.full_path = base_dir.join(&self.path);
        copy
    }
}
