//! Book metadata recovered from folder names
//!
//! Libraries are usually laid out as `Author/Series/NN - Title/track.mp3` or
//! some subset of that. The parser walks a path from the file upwards and
//! applies a fixed set of heuristics to each segment. It never fails; an
//! unstructured path simply yields a mostly-empty record.

mod authors;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use std::sync::OnceLock;

pub use authors::parse_author_folder;

/// File extensions treated as audio: the MP4 and ID3v2 containers `decode` reads.
/// Also the default scan filter, so a scan never queues a file it cannot decode.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "m4b"];

/// Folder names that never carry book metadata
pub const DEFAULT_SKIP_FOLDERS: &[&str] = &["audiotrack", "crop_original"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorName {
    pub first_name: String,
    pub last_name: String,
}

impl AuthorName {
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, _) => self.last_name.clone(),
            (_, true) => self.first_name.clone(),
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// What the folder layout says about a book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub path: String,
    pub title: String,
    pub authors: Vec<AuthorName>,
    pub series: String,
    pub series_index: f64,
    /// Only when set are `series` and `series_index` meaningful
    pub has_series_info: bool,
    pub publish_year: i32,
    pub subtitle: String,
    pub narrator: String,
}

/// Result of parsing a single title folder (or file name)
#[derive(Debug, Clone, Default, PartialEq)]
struct TitleInfo {
    title: String,
    year: i32,
    series_index: f64,
    has_series_info: bool,
    subtitle: String,
    narrator: String,
}

/// Leading year: `2006 - `, `(2006) - `, or `Vol 1 - 2006 - ` (volume kept)
fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:\(?(\d{4})\)?\s*-\s*|((?:Vol(?:ume)?\.?\s*|Book\s*)?\d+(?:\.\d+)?)\s*-\s*(\d{4})\s*-\s*)",
        )
        .expect("year pattern is valid")
    })
}

/// Leading index: `1 - `, `1.5. `, `Book 3 - `, `Vol. 2 - `
fn leading_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:Vol(?:ume)?\.?\s*|Book\s*)?(\d+(?:\.\d+)?)\s*[-\.]\s*")
            .expect("leading index pattern is valid")
    })
}

/// Trailing index: `Title - Book 3`
fn trailing_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*-\s*(?:Vol(?:ume)?\.?\s*|Book\s*)(\d+(?:\.\d+)?)\s*$")
            .expect("trailing index pattern is valid")
    })
}

/// A folder that numbers its contents: `Book 2`, `Vol. 3`, `04`, `4 - Title`.
///
/// A bare leading number needs to stand alone or be followed by a separator,
/// so titles such as `2001 A Space Odyssey` are not read as an index.
fn numbering_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?:vol(?:ume)?\.?|book)\s*(\d+(?:\.\d+)?)\b|(\d+(?:\.\d+)?)\s*(?:$|[-\.]\s))",
        )
        .expect("numbering pattern is valid")
    })
}

/// A file stem that is only a track number: `01`, `007`
fn track_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("track number pattern is valid"))
}

/// Parses library paths into [`DirectoryRecord`]s
#[derive(Debug, Clone)]
pub struct DirectoryParser {
    split_subtitles: bool,
    skip_folders: Vec<String>,
}

impl Default for DirectoryParser {
    fn default() -> Self {
        Self::new(false, DEFAULT_SKIP_FOLDERS.iter().map(|s| s.to_string()).collect())
    }
}

/// Parse `path` with the default skip list
pub fn parse_directory(path: &str, split_subtitles: bool) -> DirectoryRecord {
    DirectoryParser::default()
        .with_split_subtitles(split_subtitles)
        .parse(path)
}

impl DirectoryParser {
    pub fn new(split_subtitles: bool, skip_folders: Vec<String>) -> Self {
        Self {
            split_subtitles,
            skip_folders,
        }
    }

    pub fn with_split_subtitles(mut self, split_subtitles: bool) -> Self {
        self.split_subtitles = split_subtitles;
        self
    }

    /// Parse a path whose first segment is the library root.
    ///
    /// The root is never interpreted; the folder directly beneath it is the
    /// author depth. The file name (without extension) is the first title
    /// candidate, unless it is a bare track number below a book folder.
    pub fn parse(&self, path: &str) -> DirectoryRecord {
        let mut record = DirectoryRecord {
            path: path.to_string(),
            ..Default::default()
        };

        let segments: Vec<String> = Path::new(path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect();

        let Some(file_name) = segments.last() else {
            return record;
        };
        let Some(stem) = audio_stem(file_name) else {
            return record;
        };

        let file_index = segments.len() - 1;
        let mut title_has_series = false;
        // Set while visiting the first folder above the title segment
        let mut after_title = false;
        let mut previous: Option<&str> = None;

        for index in (0..=file_index).rev() {
            // The library root only counts when it is the file itself
            if index == 0 && file_index > 0 {
                break;
            }

            let segment = if index == file_index {
                stem
            } else {
                segments[index].trim()
            };
            if index != file_index && self.is_skipped(segment) {
                continue;
            }
            // A numbered track inside a book folder names its position, not the book
            if index == file_index && file_index > 2 && track_number_re().is_match(segment) {
                continue;
            }

            if record.title.is_empty() {
                let info = self.parse_title_folder(segment);
                if !info.title.is_empty() {
                    title_has_series = info.has_series_info;
                    record.title = info.title;
                    record.publish_year = info.year;
                    record.series_index = info.series_index;
                    record.has_series_info = info.has_series_info;
                    record.subtitle = info.subtitle;
                    record.narrator = info.narrator;
                    after_title = true;
                    previous = Some(segment);
                    continue;
                }
            } else if index == 1 {
                if record.authors.is_empty() {
                    record.authors = parse_author_folder(segment);
                }
            } else if record.series.is_empty() {
                if title_has_series && after_title {
                    record.series = segment.to_string();
                } else if let Some(number) = previous.and_then(|prev| numbering_re().captures(prev)) {
                    record.series = segment.to_string();
                    if !record.has_series_info {
                        if let Some(position) = number.get(1).or_else(|| number.get(2)) {
                            record.series_index = position.as_str().parse().unwrap_or(0.0);
                            record.has_series_info = true;
                        }
                    }
                }
            }

            after_title = false;
            previous = Some(segment);
        }

        record
    }

    fn is_skipped(&self, segment: &str) -> bool {
        self.skip_folders
            .iter()
            .any(|skip| skip.eq_ignore_ascii_case(segment))
    }

    fn parse_title_folder(&self, name: &str) -> TitleInfo {
        let mut info = TitleInfo::default();
        let mut name = name.trim().to_string();

        // Narrator in the last {...} pair
        if let (Some(start), Some(end)) = (name.rfind('{'), name.rfind('}')) {
            if start < end {
                info.narrator = name[start + 1..end].trim().to_string();
                name = format!("{}{}", &name[..start], &name[end + 1..])
                    .trim()
                    .to_string();
            }
        }

        if let Some(caps) = year_re().captures(&name) {
            let whole = caps[0].len();
            if let Some(year) = caps.get(1) {
                info.year = year.as_str().parse().unwrap_or(0);
                name = name[whole..].to_string();
            } else if let (Some(marker), Some(year)) = (caps.get(2), caps.get(3)) {
                info.year = year.as_str().parse().unwrap_or(0);
                name = format!("{} - {}", marker.as_str(), &name[whole..]);
            }
        }

        if let Some(caps) = leading_index_re().captures(&name) {
            info.series_index = caps[1].parse().unwrap_or(0.0);
            info.has_series_info = true;
            name = name[caps[0].len()..].to_string();
        } else if let Some(caps) = trailing_index_re().captures(&name) {
            info.series_index = caps[1].parse().unwrap_or(0.0);
            info.has_series_info = true;
            let start = caps.get(0).map(|m| m.start()).unwrap_or(name.len());
            name.truncate(start);
        }

        if self.split_subtitles {
            if let Some((title, subtitle)) = name.split_once(" - ") {
                info.subtitle = subtitle.trim().to_string();
                name = title.to_string();
            }
        }

        info.title = name.trim().to_string();
        info
    }
}

/// File name without its extension, if the extension is a known audio type
fn audio_stem(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    AUDIO_EXTENSIONS
        .contains(&ext.as_str())
        .then(|| stem.trim())
}
