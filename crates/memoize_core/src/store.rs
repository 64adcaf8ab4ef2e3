//! The cache store: in-memory index of previously produced outputs,
//! backed by a per-stage cache directory on disk.
//!
//! The store is reconstructed at run start by traversing the cache
//! directory and attaching remembered digests from the manifest
//! (replay), mutated by the interceptors during the run, and reconciled
//! with disk at run end (flush). Disk is never touched in between.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use memoize_common::Digest;

use crate::context::BuildContext;
use crate::error::MemoizeError;
use crate::file_info::FileInfo;
use crate::manifest::Manifest;
use crate::traverse::traverse;

/// Counts of disk mutations performed by a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Cached output files deleted for evicted records.
    pub deleted: usize,
    /// Cached output files written for captured records.
    pub written: usize,
}

/// The collection of cached file records for one named stage group.
///
/// Holds the path-keyed record index plus three run-scoped buffers:
/// records evicted this run (their on-disk outputs are deleted at
/// flush), paths captured this run (written at flush), and the digest
/// observed for every source file seen this run (the next manifest).
/// The buffers are mutated only through [`evict`](Self::evict),
/// [`capture`](Self::capture), and [`record_source`](Self::record_source).
#[derive(Debug)]
pub struct CacheStore {
    context: BuildContext,
    manifest_path: PathBuf,
    removed: Vec<FileInfo>,
    added: Vec<String>,
    sources: BTreeMap<String, Digest>,
}

impl CacheStore {
    /// Replays cache state from disk.
    ///
    /// Creates `cache_dir` if absent, traverses it to index every file
    /// physically present, and attaches each record's remembered digest
    /// from the manifest at `manifest_path`. A cache file with no
    /// manifest entry gets no digest, so any freshness comparison
    /// against it fails closed to stale. A corrupt manifest is fatal.
    pub fn open(
        cache_dir: &Path,
        manifest_path: &Path,
        encodings: &BTreeMap<String, String>,
    ) -> Result<Self, MemoizeError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| MemoizeError::io(cache_dir, e))?;

        let mut context =
            BuildContext::new(cache_dir, cache_dir).with_encodings(encodings.clone());
        traverse(&mut context)?;

        let manifest = Manifest::load(manifest_path)?;
        for path in context.paths() {
            if let Some(digest) = manifest.get(&path) {
                if let Some(file) = context.get_file_mut(&path) {
                    file.set_digest(digest);
                }
            }
        }

        tracing::debug!(
            files = context.len(),
            remembered = manifest.len(),
            "cache store replayed"
        );

        Ok(Self {
            context,
            manifest_path: manifest_path.to_path_buf(),
            removed: Vec::new(),
            added: Vec::new(),
            sources: BTreeMap::new(),
        })
    }

    /// The cache directory backing this store.
    pub fn cache_dir(&self) -> &Path {
        self.context.base_dir()
    }

    /// Looks up a cached record by path.
    pub fn get(&self, path: &str) -> Option<&FileInfo> {
        self.context.get_file(path)
    }

    /// Inserts a record, replacing any existing record with the same path.
    pub fn add(&mut self, file: FileInfo) {
        self.context.add_file(file);
    }

    /// Removes and returns the record at `path`; no-op if absent.
    pub fn remove(&mut self, path: &str) -> Option<FileInfo> {
        self.context.remove_file(path)
    }

    /// All currently held records, in path order.
    pub fn files(&self) -> impl Iterator<Item = &FileInfo> {
        self.context.files()
    }

    /// The number of records currently held.
    pub fn len(&self) -> usize {
        self.context.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }

    /// Records the digest observed for a source file this run.
    ///
    /// The accumulated map becomes the next manifest, so every source
    /// file seen this run is remembered even if reprocessing fails
    /// later for unrelated files.
    pub fn record_source(&mut self, path: &str, digest: Digest) {
        self.sources.insert(path.to_string(), digest);
    }

    /// Evicts a stale entry; its on-disk cached outputs are deleted at
    /// flush. No-op if the path is not cached.
    pub fn evict(&mut self, path: &str) {
        if let Some(record) = self.context.remove_file(path) {
            self.removed.push(record);
        }
    }

    /// Captures a newly produced record; its outputs are written under
    /// the cache directory at flush.
    pub fn capture(&mut self, file: FileInfo) {
        self.added.push(file.path().to_string());
        self.context.add_file(file);
    }

    /// Evicts every record whose path was not recorded as a source this
    /// run.
    ///
    /// A source file deleted between runs must not be restored into the
    /// build, and its cached outputs are deleted at flush. Returns the
    /// number of records evicted.
    pub fn evict_unseen(&mut self) -> usize {
        let unseen: Vec<String> = self
            .context
            .paths()
            .into_iter()
            .filter(|path| !self.sources.contains_key(path))
            .collect();
        for path in &unseen {
            tracing::debug!(path = %path, "cached entry no longer in source set, evicting");
            self.evict(path);
        }
        unseen.len()
    }

    /// Reconciles in-memory state with the cache directory and rewrites
    /// the manifest.
    ///
    /// Deletions for evicted records are applied first (a missing file
    /// is not an error), then captured records are written, and the
    /// manifest rewrite is strictly the last disk mutation: a failure
    /// anywhere earlier leaves the previous manifest intact, so the
    /// next run falls back to staleness instead of trusting a
    /// half-updated cache. The eviction and capture buffers are
    /// consumed; flushing again without intervening changes only
    /// rewrites an identical manifest.
    pub fn flush(&mut self) -> Result<FlushStats, MemoizeError> {
        let cache_dir = self.context.base_dir().to_path_buf();
        let mut stats = FlushStats::default();

        for record in self.removed.drain(..) {
            for target in record.output_targets() {
                let path = cache_dir.join(target);
                match std::fs::remove_file(&path) {
                    Ok(()) => stats.deleted += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(MemoizeError::io(path, e)),
                }
            }
        }

        for path in std::mem::take(&mut self.added) {
            let Some(record) = self.context.get_file(&path) else {
                continue;
            };
            for target in record.output_targets() {
                let out = cache_dir.join(target);
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| MemoizeError::io(parent, e))?;
                }
                std::fs::write(&out, record.content()).map_err(|e| MemoizeError::io(&out, e))?;
                stats.written += 1;
            }
        }

        Manifest::from_entries(self.sources.clone()).save(&self.manifest_path)?;

        tracing::debug!(
            deleted = stats.deleted,
            written = stats.written,
            sources = self.sources.len(),
            "cache store flushed"
        );
        Ok(stats)
    }
}
