//! Merge directory-derived and tag-derived metadata into one record
//!
//! Folder names are what a librarian typed on purpose, so they win for the
//! fields they can express. Embedded tags fill everything else, and an
//! explicit series tag wins over series guessed from folder names.

mod names;

use crate::directory::DirectoryRecord;
use crate::tags::{Metadata, Picture, TagFormat};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use names::{clean_string, find_jpeg_data, split_authors, split_narrators};

/// A chapter in the output record, in seconds from the start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start: f64,
    pub end: f64,
}

/// The reconciled description of one audiobook file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub path: String,
    pub format: TagFormat,
    pub title: String,
    pub subtitle: String,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
    pub series: String,
    /// Present only when a source positively identified a series position
    pub series_sequence: Option<f64>,
    pub year: i32,
    pub published_date: Option<NaiveDate>,
    pub description: String,
    pub language: String,
    pub publisher: String,
    pub isbn: String,
    pub asin: String,
    pub genres: Vec<String>,
    pub chapters: Vec<Chapter>,
    pub cover: Option<Picture>,
    /// Running time in seconds
    pub duration: f64,
    /// File size in bytes
    pub size: u64,
}

/// Merge a directory record and decoded tags.
///
/// `file_duration` is used when the tags carry no running time. Never fails;
/// every field falls back to its zero value.
pub fn reconcile(
    dir: &DirectoryRecord,
    meta: &dyn Metadata,
    file_size: u64,
    file_duration: Option<Duration>,
) -> BookRecord {
    let (series, series_sequence) = series_info(dir, meta);
    let year = if dir.publish_year > 0 {
        dir.publish_year
    } else {
        meta.year()
    };
    let duration = match meta.duration() {
        d if !d.is_zero() => d,
        _ => file_duration.unwrap_or_default(),
    };

    BookRecord {
        path: dir.path.clone(),
        format: meta.format(),
        title: prefer(&dir.title, meta.title()),
        subtitle: prefer(&dir.subtitle, meta.subtitle()),
        authors: authors(dir, meta),
        narrators: narrators(dir, meta),
        series,
        series_sequence,
        year,
        published_date: (year > 0)
            .then(|| NaiveDate::from_ymd_opt(year, 1, 1))
            .flatten(),
        description: clean_string(meta.comment()),
        language: clean_string(meta.language()),
        publisher: clean_string(meta.publisher()),
        isbn: clean_string(meta.isbn()),
        asin: clean_string(meta.asin()),
        genres: genres(meta.genre()),
        chapters: meta
            .chapters()
            .iter()
            .map(|c| Chapter {
                title: clean_string(&c.title),
                start: c.start.as_secs_f64(),
                end: c.end.as_secs_f64(),
            })
            .collect(),
        cover: meta.picture().map(cover),
        duration: duration.as_secs_f64(),
        size: file_size,
    }
}

/// Directory value when present, tag value otherwise
fn prefer(dir_value: &str, tag_value: &str) -> String {
    match clean_string(dir_value) {
        v if v.is_empty() => clean_string(tag_value),
        v => v,
    }
}

fn authors(dir: &DirectoryRecord, meta: &dyn Metadata) -> Vec<String> {
    let from_dir: Vec<String> = dir
        .authors
        .iter()
        .map(|a| clean_string(&a.full_name()))
        .filter(|a| !a.is_empty())
        .collect();
    if !from_dir.is_empty() {
        return from_dir;
    }

    match split_authors(meta.artist()) {
        authors if !authors.is_empty() => authors,
        _ => split_authors(meta.album_artist()),
    }
}

fn narrators(dir: &DirectoryRecord, meta: &dyn Metadata) -> Vec<String> {
    if !clean_string(&dir.narrator).is_empty() {
        return split_narrators(&dir.narrator);
    }
    split_narrators(&meta.narrators().join(";"))
}

/// Series from the tags when present, else from the directory heuristics
fn series_info(dir: &DirectoryRecord, meta: &dyn Metadata) -> (String, Option<f64>) {
    let tag_series = clean_string(meta.series());
    if !tag_series.is_empty() {
        // A missing or unreadable tag position falls back to the folder's index
        let sequence = match meta.series_sequence().trim().parse::<f64>() {
            Ok(sequence) => Some(sequence),
            Err(_) => dir.has_series_info.then_some(dir.series_index),
        };
        return (tag_series, sequence);
    }

    if dir.has_series_info {
        return (clean_string(&dir.series), Some(dir.series_index));
    }

    (String::new(), None)
}

fn genres(raw: &str) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for genre in raw.split(';').map(clean_string) {
        if !genre.is_empty() && !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    genres
}

fn cover(picture: &Picture) -> Picture {
    let mut cover = picture.clone();
    if cover.mime_type == "image/jpeg" {
        cover.data = find_jpeg_data(&picture.data).to_vec();
    }
    cover
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{parse_directory, AuthorName};
    use crate::error::RecordIssue;
    use crate::tags::RawChapter;

    /// Hand-built tag values for exercising the merge rules
    #[derive(Default)]
    struct FakeTags {
        title: String,
        artist: String,
        album_artist: String,
        genre: String,
        year: i32,
        duration: Duration,
        comment: String,
        series: String,
        series_sequence: String,
        narrators: Vec<String>,
        chapters: Vec<RawChapter>,
        picture: Option<Picture>,
    }

    impl Metadata for FakeTags {
        fn format(&self) -> TagFormat {
            TagFormat::Mp4
        }
        fn title(&self) -> &str {
            &self.title
        }
        fn artist(&self) -> &str {
            &self.artist
        }
        fn album(&self) -> &str {
            ""
        }
        fn album_artist(&self) -> &str {
            &self.album_artist
        }
        fn composer(&self) -> &str {
            ""
        }
        fn genre(&self) -> &str {
            &self.genre
        }
        fn year(&self) -> i32 {
            self.year
        }
        fn track(&self) -> (u32, u32) {
            (0, 0)
        }
        fn disc(&self) -> (u32, u32) {
            (0, 0)
        }
        fn duration(&self) -> Duration {
            self.duration
        }
        fn picture(&self) -> Option<&Picture> {
            self.picture.as_ref()
        }
        fn lyrics(&self) -> &str {
            ""
        }
        fn comment(&self) -> &str {
            &self.comment
        }
        fn subtitle(&self) -> &str {
            ""
        }
        fn publisher(&self) -> &str {
            ""
        }
        fn series(&self) -> &str {
            &self.series
        }
        fn series_sequence(&self) -> &str {
            &self.series_sequence
        }
        fn language(&self) -> &str {
            ""
        }
        fn isbn(&self) -> &str {
            ""
        }
        fn asin(&self) -> &str {
            ""
        }
        fn narrators(&self) -> Vec<String> {
            self.narrators.clone()
        }
        fn chapters(&self) -> &[RawChapter] {
            &self.chapters
        }
        fn issues(&self) -> &[RecordIssue] {
            &[]
        }
    }

    #[test]
    fn test_directory_title_wins() {
        let dir = DirectoryRecord {
            title: "The Final Empire".to_string(),
            ..Default::default()
        };
        let tags = FakeTags {
            title: "Mistborn 1 (Unabridged)".to_string(),
            ..Default::default()
        };
        assert_eq!(reconcile(&dir, &tags, 0, None).title, "The Final Empire");

        let empty = DirectoryRecord::default();
        assert_eq!(reconcile(&empty, &tags, 0, None).title, "Mistborn 1 (Unabridged)");
    }

    #[test]
    fn test_tag_series_wins_over_directory() {
        let dir = parse_directory("/lib/Brandon Sanderson/1 - The Final Empire.m4b", false);
        let tags = FakeTags {
            series: "Mistborn".to_string(),
            series_sequence: "1".to_string(),
            ..Default::default()
        };
        let book = reconcile(&dir, &tags, 0, None);
        assert_eq!(book.series, "Mistborn");
        assert_eq!(book.series_sequence, Some(1.0));
    }

    #[test]
    fn test_tag_series_without_position_keeps_folder_index() {
        let dir = parse_directory(
            "/lib/Sanderson, Brandon/Mistborn/Book 2 - The Well of Ascension.m4b",
            false,
        );
        let tags = FakeTags {
            series: "Mistborn".to_string(),
            ..Default::default()
        };
        assert_eq!(reconcile(&dir, &tags, 0, None).series_sequence, Some(2.0));

        let plain = parse_directory("/lib/Unknown/plainfile.mp3", false);
        let tags = FakeTags {
            series: "Mistborn".to_string(),
            series_sequence: "second".to_string(),
            ..Default::default()
        };
        let book = reconcile(&plain, &tags, 0, None);
        assert_eq!(book.series, "Mistborn");
        assert_eq!(book.series_sequence, None);
    }

    #[test]
    fn test_directory_series_used_without_tag_series() {
        let dir = parse_directory(
            "/lib/Sanderson, Brandon/Mistborn/Book 2 - The Well of Ascension.m4b",
            false,
        );
        let book = reconcile(&dir, &FakeTags::default(), 0, None);
        assert_eq!(book.series, "Mistborn");
        assert_eq!(book.series_sequence, Some(2.0));

        let plain = parse_directory("/lib/Unknown/plainfile.mp3", false);
        let book = reconcile(&plain, &FakeTags::default(), 0, None);
        assert_eq!(book.series, "");
        assert_eq!(book.series_sequence, None);
    }

    #[test]
    fn test_author_fallbacks() {
        let dir = DirectoryRecord {
            authors: vec![AuthorName {
                first_name: "Brandon".to_string(),
                last_name: "Sanderson".to_string(),
            }],
            ..Default::default()
        };
        let tags = FakeTags {
            artist: "Someone Else".to_string(),
            album_artist: "Album Person".to_string(),
            ..Default::default()
        };
        assert_eq!(reconcile(&dir, &tags, 0, None).authors, vec!["Brandon Sanderson"]);

        let empty = DirectoryRecord::default();
        assert_eq!(reconcile(&empty, &tags, 0, None).authors, vec!["Someone Else"]);

        let tags = FakeTags {
            album_artist: "Album Person & Co Writer".to_string(),
            ..Default::default()
        };
        assert_eq!(
            reconcile(&empty, &tags, 0, None).authors,
            vec!["Album Person", "Co Writer"]
        );
    }

    #[test]
    fn test_narrator_precedence() {
        let dir = DirectoryRecord {
            narrator: "Michael Kramer".to_string(),
            ..Default::default()
        };
        let tags = FakeTags {
            narrators: vec!["Kate Reading".to_string()],
            ..Default::default()
        };
        assert_eq!(reconcile(&dir, &tags, 0, None).narrators, vec!["Michael Kramer"]);
        assert_eq!(
            reconcile(&DirectoryRecord::default(), &tags, 0, None).narrators,
            vec!["Kate Reading"]
        );
    }

    #[test]
    fn test_year_and_published_date() {
        let tags = FakeTags {
            year: 2006,
            ..Default::default()
        };
        let book = reconcile(&DirectoryRecord::default(), &tags, 0, None);
        assert_eq!(book.year, 2006);
        assert_eq!(book.published_date, NaiveDate::from_ymd_opt(2006, 1, 1));

        let dir = DirectoryRecord {
            publish_year: 2005,
            ..Default::default()
        };
        assert_eq!(reconcile(&dir, &tags, 0, None).year, 2005);

        let book = reconcile(&DirectoryRecord::default(), &FakeTags::default(), 0, None);
        assert_eq!(book.published_date, None);
    }

    #[test]
    fn test_tag_only_fields() {
        let tags = FakeTags {
            genre: "Fantasy;Epic;Fantasy".to_string(),
            comment: "  A  description\n".to_string(),
            duration: Duration::from_secs(90),
            chapters: vec![RawChapter {
                title: " Chapter\t1 ".to_string(),
                start: Duration::ZERO,
                end: Duration::from_millis(1500),
            }],
            ..Default::default()
        };
        let book = reconcile(&DirectoryRecord::default(), &tags, 4096, Some(Duration::from_secs(5)));
        assert_eq!(book.genres, vec!["Fantasy", "Epic"]);
        assert_eq!(book.description, "A description");
        assert_eq!(book.duration, 90.0);
        assert_eq!(book.size, 4096);
        assert_eq!(
            book.chapters,
            vec![Chapter {
                title: "Chapter 1".to_string(),
                start: 0.0,
                end: 1.5,
            }]
        );
    }

    #[test]
    fn test_caller_duration_fallback() {
        let book = reconcile(
            &DirectoryRecord::default(),
            &FakeTags::default(),
            0,
            Some(Duration::from_secs(42)),
        );
        assert_eq!(book.duration, 42.0);
    }

    #[test]
    fn test_jpeg_cover_is_trimmed() {
        let tags = FakeTags {
            picture: Some(Picture::new(
                vec![0, 0, 0xff, 0xd8, 1, 0xff, 0xd9, 0],
                "image/jpeg",
                Picture::FRONT_COVER,
                String::new(),
            )),
            ..Default::default()
        };
        let book = reconcile(&DirectoryRecord::default(), &tags, 0, None);
        assert_eq!(book.cover.unwrap().data, vec![0xff, 0xd8, 1, 0xff, 0xd9]);
    }
}
