use super::{format_duration, print_field};
use anyhow::{Context, Result};
use audiobookscan::tags::{self, Metadata, TagFormat};
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Serializable snapshot of the unified tag view
#[derive(Debug, Serialize)]
struct TagView {
    format: TagFormat,
    title: String,
    artist: String,
    album: String,
    album_artist: String,
    composer: String,
    genre: String,
    year: i32,
    track: (u32, u32),
    disc: (u32, u32),
    duration_seconds: f64,
    comment: String,
    lyrics: String,
    subtitle: String,
    publisher: String,
    series: String,
    series_sequence: String,
    language: String,
    isbn: String,
    asin: String,
    narrators: Vec<String>,
    chapters: Vec<ChapterView>,
    picture: Option<String>,
    issues: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChapterView {
    title: String,
    start: f64,
    end: f64,
}

impl TagView {
    fn from_metadata(meta: &dyn Metadata) -> Self {
        Self {
            format: meta.format(),
            title: meta.title().to_string(),
            artist: meta.artist().to_string(),
            album: meta.album().to_string(),
            album_artist: meta.album_artist().to_string(),
            composer: meta.composer().to_string(),
            genre: meta.genre().to_string(),
            year: meta.year(),
            track: meta.track(),
            disc: meta.disc(),
            duration_seconds: meta.duration().as_secs_f64(),
            comment: meta.comment().to_string(),
            lyrics: meta.lyrics().to_string(),
            subtitle: meta.subtitle().to_string(),
            publisher: meta.publisher().to_string(),
            series: meta.series().to_string(),
            series_sequence: meta.series_sequence().to_string(),
            language: meta.language().to_string(),
            isbn: meta.isbn().to_string(),
            asin: meta.asin().to_string(),
            narrators: meta.narrators(),
            chapters: meta
                .chapters()
                .iter()
                .map(|c| ChapterView {
                    title: c.title.clone(),
                    start: c.start.as_secs_f64(),
                    end: c.end.as_secs_f64(),
                })
                .collect(),
            picture: meta
                .picture()
                .map(|p| format!("{} ({} bytes)", p.mime_type, p.data.len())),
            issues: meta.issues().iter().map(ToString::to_string).collect(),
        }
    }
}

pub fn run(path: &Path, json: bool, quiet: bool) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let tag = tags::decode(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read tags from {:?}", path))?;
    let view = TagView::from_metadata(&*tag);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_pretty(&view, path, quiet);
    }

    Ok(())
}

fn print_pretty(view: &TagView, path: &Path, quiet: bool) {
    if !quiet {
        println!(
            "{} {}",
            path.display().to_string().bold(),
            format!("({})", view.format).dimmed()
        );
        println!("{}", "─".repeat(40));
    }

    print_field("Title", &view.title);
    print_field("Artist", &view.artist);
    print_field("Album", &view.album);
    print_field("Album artist", &view.album_artist);
    print_field("Composer", &view.composer);
    print_field("Narrators", &view.narrators.join(", "));
    print_field("Genre", &view.genre);
    if view.year > 0 {
        print_field("Year", &view.year.to_string());
    }
    for (label, (x, n)) in [("Track", view.track), ("Disc", view.disc)] {
        match (x, n) {
            (0, _) => {}
            (x, 0) => print_field(label, &x.to_string()),
            (x, n) => print_field(label, &format!("{}/{}", x, n)),
        }
    }
    if view.duration_seconds > 0.0 {
        print_field("Duration", &format_duration(view.duration_seconds));
    }
    print_field("Subtitle", &view.subtitle);
    print_field("Publisher", &view.publisher);
    print_field("Series", &view.series);
    print_field("Sequence", &view.series_sequence);
    print_field("Language", &view.language);
    print_field("ISBN", &view.isbn);
    print_field("ASIN", &view.asin);
    print_field("Comment", &view.comment);
    if let Some(picture) = &view.picture {
        print_field("Picture", picture);
    }
    if !view.chapters.is_empty() {
        print_field("Chapters", &view.chapters.len().to_string());
    }

    if !quiet && !view.issues.is_empty() {
        println!();
        println!("{}", "Skipped records:".yellow());
        for issue in &view.issues {
            println!("  {}", issue);
        }
    }
}
