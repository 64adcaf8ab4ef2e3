//! The `memoize build` subcommand.

use memoize_config::MemoizeConfig;
use memoize_core::{traverse, BuildContext, Memoize};

use crate::project::resolve_project_root;
use crate::Cli;

/// Runs the memoized pipeline over the configured source directory and
/// writes the final file set to the configured output directory.
pub fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let root = resolve_project_root(cli)?;
    let config = memoize_config::load_config(&root)?;

    let base_dir = root.join(&config.paths.source);
    let output_dir = root.join(&config.paths.output);

    let mut ctx = BuildContext::new(&base_dir, &output_dir)
        .with_encodings(config.encodings.clone())
        .with_skips(skip_entries(&config));
    traverse(&mut ctx)?;
    tracing::info!(files = ctx.len(), "loaded source files");

    let mut memoize =
        Memoize::new(&config.stage.name, Vec::new()).with_cache_path(&config.stage.cache_path);
    let summary = memoize.run(&mut ctx)?;

    let emitted = emit_outputs(&ctx)?;

    if !cli.quiet {
        eprintln!(
            "  Memoized '{}': {} fresh, {} reprocessed, {} restored",
            config.stage.name, summary.fresh, summary.stale, summary.restored
        );
        eprintln!("     Wrote {} files to {}", emitted, output_dir.display());
    }
    Ok(())
}

/// Top-level source entries traversal must not descend into: the cache
/// directory lives under the context's base directory and must never be
/// fed back into the pipeline as source.
fn skip_entries(config: &MemoizeConfig) -> Vec<String> {
    let cache_path = config.stage.cache_path.replace('\\', "/");
    match cache_path.split('/').next() {
        Some(first) if !first.is_empty() => vec![first.to_string()],
        _ => Vec::new(),
    }
}

/// Writes every record in the final context to the output directory,
/// at its assigned output paths or its own path when none was assigned.
/// Returns the number of files written.
fn emit_outputs(ctx: &BuildContext) -> Result<usize, Box<dyn std::error::Error>> {
    let mut emitted = 0;
    for file in ctx.files() {
        for target in file.output_targets() {
            let out = ctx.output_dir().join(target);
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, file.content())?;
            emitted += 1;
        }
    }
    Ok(emitted)
}
