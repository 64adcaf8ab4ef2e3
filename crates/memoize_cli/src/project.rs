//! Project root resolution shared by CLI commands.

use std::path::{Path, PathBuf};

use crate::Cli;

/// Walks up from `start` looking for the nearest directory containing
/// `memoize.toml`.
///
/// Returns the directory containing `memoize.toml`, or an error if none
/// is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join("memoize.toml").exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find memoize.toml in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file to its parent dir,
/// dir as itself). Otherwise walks up from the current directory
/// looking for `memoize.toml`.
pub fn resolve_project_root(cli: &Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = cli.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}
