use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "audiobookscan")]
#[command(about = "Extract and reconcile audiobook metadata from tags and folder names")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the reconciled record for one audio file
    Show {
        /// Path to the audio file
        file: PathBuf,

        /// Library root the folder names are read from (default: the file's parent)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Split "Title - Subtitle" folder names
        #[arg(long)]
        split_subtitles: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the embedded tags of an audio file
    Tags {
        /// Path to the audio file
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a library path without reading any file
    Path {
        /// Path as it appears in the library, e.g. "lib/Author/Title.m4b"
        path: String,

        /// Split "Title - Subtitle" folder names
        #[arg(long)]
        split_subtitles: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan a library directory and reconcile every audio file
    Scan {
        /// Library root directory
        dir: PathBuf,

        /// Number of files decoded at once
        #[arg(long)]
        workers: Option<usize>,

        /// Split "Title - Subtitle" folder names
        #[arg(long)]
        split_subtitles: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
