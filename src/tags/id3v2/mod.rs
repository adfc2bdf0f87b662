//! ID3v2 tag decoder (versions 2.2, 2.3 and 2.4)
//!
//! The tag body is read in one piece, bounded by the stream length, and
//! frames are walked in memory. Frames this decoder cannot interpret
//! (compressed, encrypted, malformed) are skipped and listed as issues.

mod encoding;
mod frames;

use crate::error::{IssueKind, RecordIssue, TagError};
use crate::tags::io::{self, be_uint, synchsafe};
use crate::tags::{
    genres, parse_year, split_values, Field, FieldMap, Metadata, Picture, RawChapter, TagFormat,
    Value,
};
use std::io::{Read, Seek};
use std::time::Duration;
use tracing::debug;

const HEADER_LEN: u64 = 10;

/// Tag header flags
const FLAG_UNSYNC: u8 = 0x80;
const FLAG_EXTENDED: u8 = 0x40;

/// Tags decoded from an ID3v2 header
#[derive(Debug, Clone, PartialEq)]
pub struct Id3v2Tag {
    version: TagFormat,
    fields: FieldMap,
    issues: Vec<RecordIssue>,
}

/// Frame header as laid out for one major version
struct FrameLayout {
    id_len: usize,
    size_len: usize,
    header_len: usize,
}

impl FrameLayout {
    fn for_major(major: u8) -> Self {
        match major {
            2 => FrameLayout {
                id_len: 3,
                size_len: 3,
                header_len: 6,
            },
            _ => FrameLayout {
                id_len: 4,
                size_len: 4,
                header_len: 10,
            },
        }
    }
}

impl Id3v2Tag {
    /// Decode a tag starting at the current position of `reader`
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, TagError> {
        let start = reader.stream_position()?;
        let total = io::stream_len(reader)?;
        if total.saturating_sub(start) < HEADER_LEN {
            return Err(TagError::Truncated(total.saturating_sub(start)));
        }

        let header = io::read_bytes(reader, HEADER_LEN)?;
        let major = header[3];
        let version = match major {
            2 => TagFormat::Id3v2_2,
            3 => TagFormat::Id3v2_3,
            4 => TagFormat::Id3v2_4,
            v => return Err(TagError::UnsupportedVersion(v)),
        };
        let flags = header[5];
        let declared = u64::from(synchsafe(&header[6..10]));

        let mut tag = Id3v2Tag {
            version,
            fields: FieldMap::default(),
            issues: Vec::new(),
        };

        let available = total - start - HEADER_LEN;
        if declared > available {
            tag.note("ID3", start, IssueKind::Overrun { declared, available });
        }
        let mut body = io::read_bytes(reader, declared.min(available))?;

        if major == 2 && flags & FLAG_EXTENDED != 0 {
            // In v2.2 this bit marks a compressed tag
            tag.note("ID3", start, IssueKind::Unsupported("compressed tag".into()));
            return Ok(tag);
        }

        if major < 4 && flags & FLAG_UNSYNC != 0 {
            body = reverse_unsync(&body);
        }

        let mut pos = 0usize;
        if major > 2 && flags & FLAG_EXTENDED != 0 {
            match extended_header_len(&body, major) {
                Some(len) if len <= body.len() => pos = len,
                _ => {
                    tag.note("ID3", start, IssueKind::Malformed("bad extended header".into()));
                    return Ok(tag);
                }
            }
        }

        tag.read_frames(&body, pos, major, flags, start + HEADER_LEN);
        Ok(tag)
    }

    fn note(&mut self, record: &str, offset: u64, kind: IssueKind) {
        let issue = RecordIssue::new(record, offset, kind);
        debug!(%issue, "skipping ID3v2 record");
        self.issues.push(issue);
    }

    fn read_frames(&mut self, body: &[u8], mut pos: usize, major: u8, tag_flags: u8, base: u64) {
        let layout = FrameLayout::for_major(major);

        while pos + layout.header_len <= body.len() {
            // Padding runs to the end of the tag
            if body[pos] == 0 {
                break;
            }

            let offset = base + pos as u64;
            let header = &body[pos..pos + layout.header_len];
            let id = String::from_utf8_lossy(&header[..layout.id_len]).into_owned();
            let size_bytes = &header[layout.id_len..layout.id_len + layout.size_len];
            let size = if major == 4 {
                synchsafe(size_bytes) as usize
            } else {
                be_uint(size_bytes) as usize
            };
            let format_flags = if major == 2 { 0 } else { header[9] };

            let data_start = pos + layout.header_len;
            let remaining = body.len() - data_start;
            if size > remaining {
                self.note(
                    &id,
                    offset,
                    IssueKind::Overrun {
                        declared: size as u64,
                        available: remaining as u64,
                    },
                );
                break;
            }
            pos = data_start + size;

            if !id.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
                self.note(&id, offset, IssueKind::Malformed("invalid frame identifier".into()));
                continue;
            }

            match frame_data(&body[data_start..pos], major, format_flags, tag_flags) {
                Ok(data) => self.read_frame(&id, &data, major, offset),
                Err(kind) => self.note(&id, offset, kind),
            }
        }
    }

    fn read_frame(&mut self, id: &str, data: &[u8], major: u8, offset: u64) {
        if frames::is_user_text(id) {
            match frames::user_text(data) {
                Ok((description, value)) => {
                    if let Some(field) = frames::user_text_field(&description) {
                        if !value.is_empty() {
                            // Dedicated frames take precedence over user text
                            self.fields.insert_if_absent(field, Value::Text(value));
                        }
                    }
                }
                Err(reason) => self.note(id, offset, IssueKind::Malformed(reason)),
            }
            return;
        }

        let Some(field) = frames::field_for(id, major) else {
            return;
        };

        let result = match field {
            Field::Picture => frames::picture(data, major == 2).map(|picture| {
                let replace = match self.fields.picture(Field::Picture) {
                    None => true,
                    Some(current) => {
                        current.picture_type != Picture::FRONT_COVER
                            && picture.picture_type == Picture::FRONT_COVER
                    }
                };
                if replace {
                    self.fields.insert(field, Value::Picture(picture));
                }
            }),
            Field::Comment | Field::Lyrics => frames::comment(data).map(|(description, text)| {
                // iTunes stores normalisation data in described comments
                if field == Field::Comment && description.starts_with("iTun") {
                    return;
                }
                if !description.is_empty() || !text.is_empty() {
                    self.fields
                        .insert_if_absent(field, Value::Comment { description, text });
                }
            }),
            Field::Genre => frames::text(data).map(|raw| {
                let genre = genres::resolve(&raw);
                if !genre.is_empty() {
                    self.fields.insert(field, Value::Text(genre));
                }
            }),
            _ => frames::text(data).map(|text| {
                if !text.is_empty() {
                    self.fields.insert(field, Value::Text(text));
                }
            }),
        };

        if let Err(reason) = result {
            self.note(id, offset, IssueKind::Malformed(reason));
        }
    }
}

/// Length of the extended header, counted from the start of the tag body
fn extended_header_len(body: &[u8], major: u8) -> Option<usize> {
    let size = body.get(..4)?;
    match major {
        // v2.3 size excludes its own four bytes
        3 => Some(be_uint(size) as usize + 4),
        _ => Some(synchsafe(size) as usize),
    }
}

/// Frame payload with per-frame encodings removed
fn frame_data(raw: &[u8], major: u8, flags: u8, tag_flags: u8) -> Result<Vec<u8>, IssueKind> {
    let mut data = raw;
    match major {
        3 => {
            if flags & 0x80 != 0 {
                return Err(IssueKind::Unsupported("compressed frame".into()));
            }
            if flags & 0x40 != 0 {
                return Err(IssueKind::Unsupported("encrypted frame".into()));
            }
            if flags & 0x20 != 0 {
                data = data.get(1..).unwrap_or_default();
            }
            Ok(data.to_vec())
        }
        4 => {
            if flags & 0x08 != 0 {
                return Err(IssueKind::Unsupported("compressed frame".into()));
            }
            if flags & 0x04 != 0 {
                return Err(IssueKind::Unsupported("encrypted frame".into()));
            }
            if flags & 0x40 != 0 {
                data = data.get(1..).unwrap_or_default();
            }
            if flags & 0x01 != 0 {
                data = data
                    .get(4..)
                    .ok_or_else(|| IssueKind::Malformed("missing data length".into()))?;
            }
            if flags & 0x02 != 0 || tag_flags & FLAG_UNSYNC != 0 {
                Ok(reverse_unsync(data))
            } else {
                Ok(data.to_vec())
            }
        }
        _ => Ok(data.to_vec()),
    }
}

/// Undo unsynchronisation: every `FF 00` pair becomes `FF`
fn reverse_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u8;
    for &byte in data {
        if !(prev == 0xff && byte == 0x00) {
            out.push(byte);
        }
        prev = byte;
    }
    out
}

impl Metadata for Id3v2Tag {
    fn format(&self) -> TagFormat {
        self.version
    }

    fn title(&self) -> &str {
        self.fields.text(Field::Title)
    }

    fn artist(&self) -> &str {
        self.fields.text(Field::Artist)
    }

    fn album(&self) -> &str {
        self.fields.text(Field::Album)
    }

    fn album_artist(&self) -> &str {
        self.fields.text(Field::AlbumArtist)
    }

    fn composer(&self) -> &str {
        self.fields.text(Field::Composer)
    }

    fn genre(&self) -> &str {
        self.fields.text(Field::Genre)
    }

    fn year(&self) -> i32 {
        parse_year(self.fields.text(Field::Year))
    }

    fn track(&self) -> (u32, u32) {
        self.fields.pair(Field::Track)
    }

    fn disc(&self) -> (u32, u32) {
        self.fields.pair(Field::Disc)
    }

    /// From the `TLEN` frame, in milliseconds
    fn duration(&self) -> Duration {
        self.fields
            .text(Field::Length)
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .unwrap_or_default()
    }

    fn picture(&self) -> Option<&Picture> {
        self.fields.picture(Field::Picture)
    }

    fn lyrics(&self) -> &str {
        self.fields.text(Field::Lyrics)
    }

    /// The comment's description when it has one, otherwise its text
    fn comment(&self) -> &str {
        match self.fields.get(Field::Comment) {
            Some(Value::Comment { description, .. }) if !description.is_empty() => description,
            _ => self.fields.text(Field::Comment),
        }
    }

    fn subtitle(&self) -> &str {
        self.fields.text(Field::Subtitle)
    }

    fn publisher(&self) -> &str {
        self.fields.text(Field::Publisher)
    }

    fn series(&self) -> &str {
        self.fields.text(Field::Series)
    }

    fn series_sequence(&self) -> &str {
        self.fields.text(Field::SeriesSequence)
    }

    fn language(&self) -> &str {
        self.fields.text(Field::Language)
    }

    fn isbn(&self) -> &str {
        self.fields.text(Field::Isbn)
    }

    fn asin(&self) -> &str {
        self.fields.text(Field::Asin)
    }

    fn narrators(&self) -> Vec<String> {
        split_values(self.fields.text(Field::Narrators))
    }

    /// ID3v2 chapter frames are not read
    fn chapters(&self) -> &[RawChapter] {
        &[]
    }

    fn issues(&self) -> &[RecordIssue] {
        &self.issues
    }
}
