//! Build-time memoization cache.
//!
//! Wraps an arbitrary sequence of file-processing stages so that files
//! whose content has not changed since the previous run skip
//! reprocessing, while their previously produced outputs are
//! transparently re-injected into the current build.
//!
//! The entry point is [`Memoize`], which brackets the user-supplied
//! stages between a before-interceptor (fresh/stale classification) and
//! an after-interceptor (output capture and cache restore), then
//! persists cache state to disk so the next process run can reuse it.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod file_info;
pub mod manifest;
pub mod pipeline;
pub mod stage;
pub mod store;
pub mod traverse;

pub use context::BuildContext;
pub use error::MemoizeError;
pub use file_info::FileInfo;
pub use manifest::Manifest;
pub use pipeline::{Memoize, RunSummary, DEFAULT_CACHE_PATH};
pub use stage::{Disposition, Stage};
pub use store::{CacheStore, FlushStats};
pub use traverse::traverse;
