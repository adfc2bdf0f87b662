//! Embedded tag decoding
//!
//! Two decoders live here: [`mp4`] walks the atom tree of MP4/M4B containers
//! and [`id3v2`] walks the frame list of ID3v2.2/2.3/2.4 tags. Both resolve
//! what they find into a [`FieldMap`] at decode time and expose it through
//! the [`Metadata`] trait, so callers never branch on the format.

pub mod genres;
pub mod id3v2;
pub mod io;
pub mod mp4;

use crate::error::{RecordIssue, TagError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Deref;
use std::time::Duration;

pub use id3v2::Id3v2Tag;
pub use mp4::Mp4Tag;

/// Which tag format produced a [`Metadata`] value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFormat {
    Mp4,
    Id3v2_2,
    Id3v2_3,
    Id3v2_4,
}

impl fmt::Display for TagFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagFormat::Mp4 => "MP4",
            TagFormat::Id3v2_2 => "ID3v2.2",
            TagFormat::Id3v2_3 => "ID3v2.3",
            TagFormat::Id3v2_4 => "ID3v2.4",
        };
        f.write_str(name)
    }
}

/// Embedded cover art
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_extension: String,
    /// ID3 picture type (3 = front cover)
    pub picture_type: u8,
    pub description: String,
}

impl Picture {
    pub const FRONT_COVER: u8 = 3;

    /// Build a picture from a MIME type, deriving the file extension
    pub fn new(data: Vec<u8>, mime_type: &str, picture_type: u8, description: String) -> Self {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        let file_extension = match mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            _ => "bin",
        }
        .to_string();

        Self {
            data,
            mime_type,
            file_extension,
            picture_type,
            description,
        }
    }

    /// Guess the MIME type from the leading magic bytes
    pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        if data.starts_with(PNG) {
            Some("image/png")
        } else if data.starts_with(&[0xff, 0xd8]) {
            Some("image/jpeg")
        } else if data.starts_with(b"GIF8") {
            Some("image/gif")
        } else if data.starts_with(b"BM") {
            Some("image/bmp")
        } else {
            None
        }
    }
}

/// A chapter as found in the tags, before any cleaning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChapter {
    pub title: String,
    pub start: Duration,
    pub end: Duration,
}

/// Logical fields both decoders resolve into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Composer,
    Genre,
    Year,
    Track,
    Disc,
    Picture,
    Lyrics,
    Comment,
    Subtitle,
    Publisher,
    Series,
    SeriesSequence,
    Language,
    Isbn,
    Asin,
    Narrators,
    Length,
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    /// Position and total, as in track 3 of 12
    Pair(u32, u32),
    /// Comment-like frames carry a short description next to the text
    Comment { description: String, text: String },
    Picture(Picture),
}

/// Decoded values keyed by logical field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    values: BTreeMap<Field, Value>,
}

impl FieldMap {
    pub fn insert(&mut self, field: Field, value: Value) {
        self.values.insert(field, value);
    }

    /// Insert only if nothing is stored for `field` yet
    pub fn insert_if_absent(&mut self, field: Field, value: Value) {
        self.values.entry(field).or_insert(value);
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        self.values.get(&field)
    }

    /// Text of a field; comment values yield their text part
    pub fn text(&self, field: Field) -> &str {
        match self.values.get(&field) {
            Some(Value::Text(s)) => s,
            Some(Value::Comment { text, .. }) => text,
            _ => "",
        }
    }

    pub fn pair(&self, field: Field) -> (u32, u32) {
        match self.values.get(&field) {
            Some(Value::Pair(x, n)) => (*x, *n),
            Some(Value::Text(s)) => parse_x_of_n(s),
            _ => (0, 0),
        }
    }

    pub fn picture(&self, field: Field) -> Option<&Picture> {
        match self.values.get(&field) {
            Some(Value::Picture(p)) => Some(p),
            _ => None,
        }
    }
}

/// Unified view over decoded tags.
///
/// Absent fields come back as the zero value (empty string, `0`, `None`,
/// empty list); absence is normal and never an error.
pub trait Metadata {
    fn format(&self) -> TagFormat;
    fn title(&self) -> &str;
    fn artist(&self) -> &str;
    fn album(&self) -> &str;
    fn album_artist(&self) -> &str;
    fn composer(&self) -> &str;
    fn genre(&self) -> &str;
    fn year(&self) -> i32;
    fn track(&self) -> (u32, u32);
    fn disc(&self) -> (u32, u32);
    fn duration(&self) -> Duration;
    fn picture(&self) -> Option<&Picture>;
    fn lyrics(&self) -> &str;
    fn comment(&self) -> &str;
    fn subtitle(&self) -> &str;
    fn publisher(&self) -> &str;
    fn series(&self) -> &str;
    fn series_sequence(&self) -> &str;
    fn language(&self) -> &str;
    fn isbn(&self) -> &str;
    fn asin(&self) -> &str;
    fn narrators(&self) -> Vec<String>;
    fn chapters(&self) -> &[RawChapter];
    /// Records that were skipped while decoding
    fn issues(&self) -> &[RecordIssue];
}

/// Tags decoded from one stream, whichever format they were in
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Mp4(Mp4Tag),
    Id3v2(Id3v2Tag),
}

impl Deref for Tag {
    type Target = dyn Metadata;

    fn deref(&self) -> &Self::Target {
        match self {
            Tag::Mp4(tag) => tag,
            Tag::Id3v2(tag) => tag,
        }
    }
}

/// Top-level box types that identify an MP4 container
const MP4_TOP_LEVEL: &[&[u8; 4]] = &[b"ftyp", b"moov", b"mdat", b"free", b"skip", b"wide", b"pnot"];

/// Decode the tags in `reader`, detecting the format from the first bytes.
///
/// Only unreadable streams and unrecognized headers are errors; damaged
/// records inside a recognized tag are skipped and listed in
/// [`Metadata::issues`].
pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Tag, TagError> {
    let len = io::stream_len(reader)?;
    reader.seek(SeekFrom::Start(0))?;

    let mut head = [0u8; 8];
    let available = len.min(head.len() as u64) as usize;
    reader.read_exact(&mut head[..available])?;
    reader.seek(SeekFrom::Start(0))?;

    if available >= 3 && &head[..3] == b"ID3" {
        return Id3v2Tag::read(reader).map(Tag::Id3v2);
    }

    if available < 8 {
        return Err(TagError::Truncated(len));
    }

    if MP4_TOP_LEVEL.iter().any(|code| head[4..8] == code[..]) {
        return Mp4Tag::read(reader).map(Tag::Mp4);
    }

    Err(TagError::UnknownFormat)
}

/// Parse `"x"` or `"x/n"` into a position and total
pub fn parse_x_of_n(s: &str) -> (u32, u32) {
    let mut parts = s.splitn(2, '/');
    let x = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(0);
    let n = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(0);
    (x, n)
}

/// Year from a text value such as `"2006"` or `"2006-03-14"`
pub fn parse_year(s: &str) -> i32 {
    let s = s.trim();
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        digits[..4].parse().unwrap_or(0)
    } else {
        0
    }
}

/// Split a `;`-joined multi-value string into its trimmed, non-empty parts
pub fn split_values(s: &str) -> Vec<String> {
    s.split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}
