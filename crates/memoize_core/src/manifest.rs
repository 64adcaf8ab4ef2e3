//! The durable path-to-digest manifest persisted at the end of each run.

use std::collections::BTreeMap;
use std::path::Path;

use memoize_common::Digest;
use serde::{Deserialize, Serialize};

use crate::error::MemoizeError;

/// The persisted record of the last successfully completed run: a
/// mapping from source-relative path to the content digest observed for
/// it.
///
/// Serialized as a single pretty-printed JSON object with digest
/// strings as values. A path absent from the manifest is treated as
/// never cached, which forces the file back through the user stages.
/// Every flush rewrites the manifest in full; it is never merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, Digest>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manifest from a path-to-digest map.
    pub fn from_entries(entries: BTreeMap<String, Digest>) -> Self {
        Self { entries }
    }

    /// The remembered digest for `path`, if any.
    pub fn get(&self, path: &str) -> Option<Digest> {
        self.entries.get(path).copied()
    }

    /// Records the digest for `path`, replacing any previous entry.
    pub fn insert(&mut self, path: impl Into<String>, digest: Digest) {
        self.entries.insert(path.into(), digest);
    }

    /// The number of remembered paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest remembers no paths.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all `(path, digest)` entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Digest)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), *d))
    }

    /// Loads the manifest at `path`.
    ///
    /// A missing file yields an empty manifest (never-cached). Invalid
    /// JSON is fatal: it is surfaced to the operator rather than
    /// silently discarded, so a real problem is not masked by a full
    /// rebuild.
    pub fn load(path: &Path) -> Result<Self, MemoizeError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(MemoizeError::io(path, e)),
        };
        serde_json::from_str(&content).map_err(|e| MemoizeError::ManifestCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Writes the manifest to `path`, replacing any previous manifest.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self, path: &Path) -> Result<(), MemoizeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MemoizeError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| MemoizeError::Serialize {
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| MemoizeError::io(path, e))
    }
}
