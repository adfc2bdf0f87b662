use anyhow::{Context, Result};
use audiobookscan::config::Config;
use audiobookscan::scanner::{scan_library, ScanOutcome};
use colored::Colorize;
use std::path::Path;

pub fn run(
    dir: &Path,
    workers: Option<usize>,
    split_subtitles: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {:?}", dir);
    }

    let config = Config::load()?;
    let parser = config.directory_parser(split_subtitles);
    let workers = config.workers(workers);

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let outcome = rt.block_on(scan_library(
        dir.to_path_buf(),
        parser,
        &config.scan.extensions,
        workers,
    ))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_pretty(&outcome, quiet);
    }

    Ok(())
}

fn print_pretty(outcome: &ScanOutcome, quiet: bool) {
    for scanned in &outcome.books {
        let book = &scanned.book;
        let authors = if book.authors.is_empty() {
            "unknown author".dimmed().to_string()
        } else {
            book.authors.join(", ")
        };
        println!("{} {}", book.title.bold(), format!("by {}", authors).dimmed());
        if !quiet {
            println!("  {}", scanned.path.display());
            if !scanned.issues.is_empty() {
                println!(
                    "  {} {} record(s) skipped",
                    "Warning".yellow(),
                    scanned.issues.len()
                );
            }
        }
    }

    for failure in &outcome.failures {
        println!("{} {}", "Failed".red(), failure.path.display());
        if !quiet {
            println!("  {}", failure.error);
        }
    }

    println!();
    println!(
        "{} {} book(s), {} failure(s)",
        "Done!".green().bold(),
        outcome.books.len(),
        outcome.failures.len()
    );
}
