//! The `memoize clean` subcommand.

use memoize_core::Memoize;

use crate::project::resolve_project_root;
use crate::Cli;

/// Deletes all memoization data (cached outputs and manifests for every
/// stage group) under the project's configured cache path.
pub fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let root = resolve_project_root(cli)?;
    let config = memoize_config::load_config(&root)?;

    let base_dir = root.join(&config.paths.source);
    let memoize =
        Memoize::new(&config.stage.name, Vec::new()).with_cache_path(&config.stage.cache_path);
    let memoize_dir = memoize.memoize_dir(&base_dir);

    match std::fs::remove_dir_all(&memoize_dir) {
        Ok(()) => {
            if !cli.quiet {
                eprintln!("   Removed {}", memoize_dir.display());
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if !cli.quiet {
                eprintln!("   Nothing to clean");
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
