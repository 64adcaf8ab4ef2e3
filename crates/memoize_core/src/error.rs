//! Error types for the memoization engine.

use std::path::PathBuf;

/// Errors that can occur while replaying, running, or flushing the cache.
///
/// Every failure aborts the run before the manifest is rewritten, so the
/// previous manifest stays valid and the next run degrades to treating
/// more files than necessary as stale.
#[derive(Debug, thiserror::Error)]
pub enum MemoizeError {
    /// An I/O error occurred while reading or writing files.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The on-disk manifest is not a valid path-to-digest JSON object.
    #[error("corrupt manifest at {path}: {reason}")]
    ManifestCorrupt {
        /// The manifest file path.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A pipeline stage returned an error, aborting the run.
    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        /// Name of the stage that failed.
        stage: String,
        /// The underlying failure.
        #[source]
        source: Box<MemoizeError>,
    },

    /// A serialization error occurred while writing the manifest.
    #[error("serialization error: {reason}")]
    Serialize {
        /// Description of the serialization failure.
        reason: String,
    },

    /// An arbitrary failure raised inside a user-supplied stage.
    #[error("{0}")]
    Other(String),
}

impl MemoizeError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an arbitrary stage failure from a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
