//! memoize CLI — drives a memoized file pipeline from `memoize.toml`.
//!
//! Provides `memoize build` to run the pipeline over the configured
//! source directory (reusing cached outputs for unchanged files) and
//! `memoize clean` to delete all memoization data for the project.

#![warn(missing_docs)]

mod build;
mod clean;
mod project;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// memoize — a content-digest cache for file-processing pipelines.
#[derive(Parser, Debug)]
#[command(name = "memoize", version, about = "Memoized file pipeline runner")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `memoize.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the memoized pipeline over the configured source directory.
    Build,
    /// Delete all memoization data for the project.
    Clean,
}

/// Initializes the tracing subscriber.
///
/// Log level is controlled by `--verbose` (debug), `--quiet` (errors
/// only), or the `RUST_LOG` environment variable; the default is info.
fn init_tracing(quiet: bool, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("memoize=debug")
    } else if quiet {
        EnvFilter::new("memoize=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("memoize=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let result = match cli.command {
        Command::Build => build::run(&cli),
        Command::Clean => clean::run(&cli),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
