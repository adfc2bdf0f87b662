mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Show {
            file,
            root,
            split_subtitles,
            json,
        } => {
            commands::show::run(&file, root.as_deref(), split_subtitles, json, cli.quiet)?;
        }
        Commands::Tags { file, json } => {
            commands::tags::run(&file, json, cli.quiet)?;
        }
        Commands::Path {
            path,
            split_subtitles,
            json,
        } => {
            commands::path::run(&path, split_subtitles, json)?;
        }
        Commands::Scan {
            dir,
            workers,
            split_subtitles,
            json,
        } => {
            commands::scan::run(&dir, workers, split_subtitles, json, cli.quiet)?;
        }
    }

    Ok(())
}

/// Log to stderr; RUST_LOG takes precedence over the verbosity flags
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
