use super::{format_duration, format_series, print_field};
use anyhow::{Context, Result};
use audiobookscan::config::Config;
use audiobookscan::reconcile::BookRecord;
use audiobookscan::scanner::{process_file, ScannedBook};
use colored::Colorize;
use std::path::Path;

pub fn run(
    path: &Path,
    root: Option<&Path>,
    split_subtitles: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let config = Config::load()?;
    let parser = config.directory_parser(split_subtitles);

    let root = match root {
        Some(root) => root,
        None => path
            .parent()
            .with_context(|| format!("Cannot determine parent directory of {:?}", path))?,
    };

    let scanned = process_file(root, path, &parser)?;

    if json {
        print_json(&scanned.book)?;
    } else {
        print_pretty(&scanned, quiet);
    }

    Ok(())
}

fn print_json(book: &BookRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(book)?;
    println!("{}", json);
    Ok(())
}

fn print_pretty(scanned: &ScannedBook, quiet: bool) {
    let book = &scanned.book;

    if !quiet {
        println!("{}", scanned.path.display().to_string().bold());
        println!("{}", "─".repeat(40));
    }

    print_field("Title", &book.title);
    print_field("Subtitle", &book.subtitle);
    print_field("Author", &book.authors.join(", "));
    print_field("Narrator", &book.narrators.join(", "));
    print_field("Series", &format_series(&book.series, book.series_sequence));
    if book.year > 0 {
        print_field("Year", &book.year.to_string());
    }
    print_field("Genre", &book.genres.join(", "));
    print_field("Publisher", &book.publisher);
    print_field("Language", &book.language);
    if book.duration > 0.0 {
        print_field("Duration", &format_duration(book.duration));
    }
    print_field("ISBN", &book.isbn);
    print_field("ASIN", &book.asin);
    if let Some(cover) = &book.cover {
        print_field(
            "Cover",
            &format!("{} ({} bytes)", cover.mime_type, cover.data.len()),
        );
    }
    print_field("Format", &book.format.to_string());

    if !book.chapters.is_empty() {
        println!();
        println!("{}", "Chapters:".cyan());
        for chapter in &book.chapters {
            println!(
                "  {} {}",
                format_duration(chapter.start).dimmed(),
                chapter.title
            );
        }
    }

    if !book.description.is_empty() {
        println!();
        println!("{}", "Description:".cyan());
        for line in textwrap_simple(&book.description, 80) {
            println!("  {}", line);
        }
    }

    if !quiet && !scanned.issues.is_empty() {
        println!();
        println!("{}", "Skipped records:".yellow());
        for issue in &scanned.issues {
            println!("  {}", issue);
        }
    }
}

/// Simple text wrapping without external dependency
fn textwrap_simple(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }
    lines
}
