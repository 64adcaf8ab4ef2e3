//! Configuration loading for the memoize build cache.
//!
//! Projects are configured through a `memoize.toml` file at the project
//! root, declaring the memoized stage group, the source and output
//! directories, and the path-pattern to encoding table.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::{MemoizeConfig, PathsConfig, StageMeta};
