//! Shared foundational types for the memoize build cache.
//!
//! This crate provides the content digest type used throughout the
//! pipeline to decide whether a file has changed since the last run.

#![warn(missing_docs)]

pub mod digest;

pub use digest::{Digest, ParseDigestError};
