//! MP4 / M4B atom tree decoder
//!
//! Atoms are `(u32 BE length, 4-byte type, payload)` records. Grouping atoms
//! are walked recursively; item atoms under `ilst` are decoded into fields;
//! everything else is skipped by seeking past it. A record whose length does
//! not fit inside its parent is noted as a [`RecordIssue`] and ends the walk
//! of that parent, keeping every field decoded so far.

mod atoms;
mod chapters;

use crate::error::{IssueKind, RecordIssue, TagError};
use crate::tags::io::{self, be_uint, fourcc_str};
use crate::tags::{
    genres, parse_x_of_n, parse_year, split_values, Field, FieldMap, Metadata, Picture,
    RawChapter, TagFormat, Value,
};
use atoms::Kind;
use chapters::PendingChapter;
use encoding_rs::UTF_16BE;
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;
use tracing::debug;

/// Nesting deeper than this is treated as corrupt
const MAX_DEPTH: usize = 16;

/// Data atom type classes
mod class {
    pub const IMPLICIT: u32 = 0;
    pub const UTF8: u32 = 1;
    pub const UTF16: u32 = 2;
    pub const JPEG: u32 = 13;
    pub const PNG: u32 = 14;
    pub const SIGNED_INT: u32 = 21;
    pub const UNSIGNED_INT: u32 = 22;
    pub const BMP: u32 = 27;
}

/// Tags decoded from an MP4 container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mp4Tag {
    fields: FieldMap,
    duration: Duration,
    chapters: Vec<RawChapter>,
    issues: Vec<RecordIssue>,
}

/// State carried through one walk of the atom tree
#[derive(Debug, Default)]
struct Walk {
    fields: FieldMap,
    duration: Duration,
    explicit: Option<Vec<PendingChapter>>,
    candidates: Vec<String>,
    issues: Vec<RecordIssue>,
}

impl Mp4Tag {
    /// Decode atoms from the current position to the end of the stream
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, TagError> {
        let end = io::stream_len(reader)?;
        let walk = walk_atoms(reader, Walk::default(), end, 0)?;
        Ok(walk.finish())
    }
}

impl Walk {
    fn note(&mut self, record: &[u8], offset: u64, kind: IssueKind) {
        let issue = RecordIssue::new(fourcc_str(record), offset, kind);
        debug!(%issue, "skipping MP4 record");
        self.issues.push(issue);
    }

    fn finish(mut self) -> Mp4Tag {
        let chapters = match self.explicit.take() {
            Some(pending) if !pending.is_empty() => {
                match chapters::finish_explicit(pending, self.duration) {
                    Ok(list) => list,
                    Err(reason) => {
                        self.note(atoms::CHPL, 0, IssueKind::Chapters(reason));
                        Vec::new()
                    }
                }
            }
            _ => chapters::spread_evenly(std::mem::take(&mut self.candidates), self.duration),
        };

        Mp4Tag {
            fields: self.fields,
            duration: self.duration,
            chapters,
            issues: self.issues,
        }
    }
}

/// Walk sibling atoms until `end`, returning the updated walk state
fn walk_atoms<R: Read + Seek>(
    reader: &mut R,
    mut walk: Walk,
    end: u64,
    depth: usize,
) -> Result<Walk, TagError> {
    loop {
        let offset = reader.stream_position()?;
        if offset >= end {
            break;
        }
        let remaining = end - offset;
        if remaining < 8 {
            walk.note(b"????", offset, IssueKind::Malformed(format!("{} trailing bytes", remaining)));
            break;
        }

        let size32 = io::read_be_u32(reader)?;
        let code = io::read_fourcc(reader)?;
        let (size, header_len) = match size32 {
            0 => (remaining, 8),
            1 if remaining >= 16 => (io::read_be_u64(reader)?, 16),
            1 => {
                walk.note(&code, offset, IssueKind::Malformed("truncated extended size".into()));
                break;
            }
            n => (u64::from(n), 8),
        };

        if size < header_len {
            walk.note(
                &code,
                offset,
                IssueKind::Malformed(format!("length {} is smaller than its header", size)),
            );
            break;
        }
        if size > remaining {
            walk.note(
                &code,
                offset,
                IssueKind::Overrun {
                    declared: size,
                    available: remaining,
                },
            );
            break;
        }

        let payload_end = offset + size;
        let payload_len = size - header_len;
        walk = read_atom(reader, walk, &code, offset, payload_len, payload_end, depth)?;
        reader.seek(SeekFrom::Start(payload_end))?;
    }

    reader.seek(SeekFrom::Start(end))?;
    Ok(walk)
}

fn read_atom<R: Read + Seek>(
    reader: &mut R,
    mut walk: Walk,
    code: &[u8; 4],
    offset: u64,
    payload_len: u64,
    payload_end: u64,
    depth: usize,
) -> Result<Walk, TagError> {
    if atoms::is_container(code) || code == atoms::META {
        if depth >= MAX_DEPTH {
            walk.note(code, offset, IssueKind::Malformed("nested too deeply".into()));
            return Ok(walk);
        }
        if code == atoms::META {
            // Full box: version and flags precede the children
            if payload_len < 4 {
                walk.note(code, offset, IssueKind::Malformed("missing version header".into()));
                return Ok(walk);
            }
            io::skip(reader, 4)?;
        }
        return walk_atoms(reader, walk, payload_end, depth + 1);
    }

    if code == atoms::MVHD {
        let payload = io::read_bytes(reader, payload_len)?;
        match movie_duration(&payload) {
            Ok(duration) => walk.duration = duration,
            Err(reason) => walk.note(code, offset, IssueKind::Malformed(reason)),
        }
        return Ok(walk);
    }

    if code == atoms::CHPL {
        let payload = io::read_bytes(reader, payload_len)?;
        match chapters::parse_chpl(&payload) {
            Ok(list) => walk.explicit = Some(list),
            Err(reason) => walk.note(code, offset, IssueKind::Chapters(reason)),
        }
        return Ok(walk);
    }

    if code == atoms::FREEFORM {
        let payload = io::read_bytes(reader, payload_len)?;
        match read_freeform(&payload) {
            Ok(Some((field, values))) => {
                // Already unpacked from its data atoms; store as plain text
                store_text(&mut walk, field, values.join(";"));
            }
            Ok(None) => {}
            Err(reason) => walk.note(code, offset, IssueKind::Malformed(reason)),
        }
        return Ok(walk);
    }

    if let Some((field, kind)) = atoms::item(code) {
        let payload = io::read_bytes(reader, payload_len)?;
        match read_item(&payload) {
            Ok(values) => {
                for (class, data) in values {
                    store_item(&mut walk, field, kind, class, data);
                }
            }
            Err(reason) => walk.note(code, offset, IssueKind::Malformed(reason)),
        }
    }

    Ok(walk)
}

/// Running time from an `mvhd` payload; version 1 uses 64-bit fields
fn movie_duration(payload: &[u8]) -> Result<Duration, String> {
    let version = *payload.first().ok_or("empty payload")?;
    let (timescale, raw) = match version {
        0 => {
            // version/flags (4), creation (4), modification (4), timescale (4), duration (4)
            let fields = payload.get(12..20).ok_or("version 0 header is truncated")?;
            (be_uint(&fields[..4]), be_uint(&fields[4..]))
        }
        1 => {
            // version/flags (4), creation (8), modification (8), timescale (4), duration (8)
            let fields = payload.get(20..32).ok_or("version 1 header is truncated")?;
            (be_uint(&fields[..4]), be_uint(&fields[4..]))
        }
        v => return Err(format!("unknown version {}", v)),
    };

    if timescale == 0 {
        return Err("time scale is zero".into());
    }
    let seconds = (raw as f64 / timescale as f64).trunc() as u64;
    Ok(Duration::from_secs(seconds))
}

/// Iterate the child atoms packed in `payload`
fn child_atoms(payload: &[u8]) -> Result<Vec<([u8; 4], &[u8])>, String> {
    let mut children = Vec::new();
    let mut pos = 0usize;
    while pos < payload.len() {
        let header = payload
            .get(pos..pos + 8)
            .ok_or_else(|| format!("{} stray bytes after child atoms", payload.len() - pos))?;
        let size = be_uint(&header[..4]) as usize;
        let code = [header[4], header[5], header[6], header[7]];
        if size < 8 || pos + size > payload.len() {
            return Err(format!(
                "child '{}' declares {} bytes with {} available",
                fourcc_str(&code),
                size,
                payload.len() - pos
            ));
        }
        children.push((code, &payload[pos + 8..pos + size]));
        pos += size;
    }
    Ok(children)
}

/// Split a `data` atom body into its type class and value.
///
/// The body starts with an 8-byte sub-header: version (1), class (3),
/// locale (4). Shorter bodies are treated as raw implicit data.
fn split_data(body: &[u8]) -> (u32, &[u8]) {
    if body.len() < 8 {
        return (class::IMPLICIT, body);
    }
    (be_uint(&body[1..4]) as u32, &body[8..])
}

/// Typed values held in an item atom's `data` children
fn read_item(payload: &[u8]) -> Result<Vec<(u32, &[u8])>, String> {
    // Items written without a data child hold their value directly
    if payload.len() < 8 || &payload[4..8] != atoms::DATA {
        return Ok(vec![(class::IMPLICIT, payload)]);
    }

    Ok(child_atoms(payload)?
        .into_iter()
        .filter(|(code, _)| code == atoms::DATA)
        .map(|(_, body)| split_data(body))
        .collect())
}

/// Unpack a free-form atom: `mean` (vendor), `name` (field), one or more `data`.
///
/// Returns `None` when the vendor is not trusted, a part is missing, or the
/// name is not a field this decoder knows.
fn read_freeform(payload: &[u8]) -> Result<Option<(Field, Vec<String>)>, String> {
    let mut mean = String::new();
    let mut name = String::new();
    let mut values = Vec::new();

    for (code, body) in child_atoms(payload)? {
        if body.len() < 4 {
            return Err(format!("'{}' child is too short", fourcc_str(&code)));
        }
        match &code {
            atoms::MEAN => mean = String::from_utf8_lossy(&body[4..]).into_owned(),
            atoms::NAME => name = String::from_utf8_lossy(&body[4..]).into_owned(),
            atoms::DATA => {
                let (class, value) = split_data(body);
                if let Some(text) = decode_text(class, value) {
                    values.push(text);
                }
            }
            _ => {}
        }
    }

    if !atoms::MEANS.contains(&mean.as_str()) || name.is_empty() || values.is_empty() {
        debug!(mean = %mean, name = %name, "ignoring free-form atom");
        return Ok(None);
    }

    Ok(atoms::freeform(&name).map(|field| (field, values)))
}

/// Text from a data value, if its class holds text or a number
fn decode_text(class: u32, value: &[u8]) -> Option<String> {
    let text = match class {
        class::IMPLICIT | class::UTF8 => String::from_utf8_lossy(value).into_owned(),
        class::UTF16 => UTF_16BE.decode_without_bom_handling(value).0.into_owned(),
        class::SIGNED_INT | class::UNSIGNED_INT if (1..=8).contains(&value.len()) => {
            be_uint(value).to_string()
        }
        _ => return None,
    };
    Some(text.trim_matches(char::from(0)).trim().to_string())
}

fn store_text(walk: &mut Walk, field: Field, text: String) {
    if text.is_empty() {
        return;
    }
    if field == Field::Title
        && chapters::looks_like_chapter(&text)
        && !walk.candidates.contains(&text)
    {
        walk.candidates.push(text.clone());
    }
    walk.fields.insert(field, Value::Text(text));
}

fn store_item(walk: &mut Walk, field: Field, kind: Kind, class: u32, data: &[u8]) {
    match kind {
        Kind::Text => {
            if let Some(text) = decode_text(class, data) {
                store_text(walk, field, text);
            }
        }
        Kind::Pair => {
            let pair = match class {
                class::IMPLICIT if data.len() >= 6 => {
                    (be_uint(&data[2..4]) as u32, be_uint(&data[4..6]) as u32)
                }
                class::IMPLICIT if data.len() >= 4 => (be_uint(&data[2..4]) as u32, 0),
                _ => match decode_text(class, data) {
                    Some(text) => parse_x_of_n(&text),
                    None => return,
                },
            };
            walk.fields.insert(field, Value::Pair(pair.0, pair.1));
        }
        Kind::GenreCode => {
            if (1..=2).contains(&data.len()) {
                let code = be_uint(data) as usize;
                if let Some(name) = code.checked_sub(1).and_then(genres::by_code) {
                    walk.fields.insert(field, Value::Text(name.to_string()));
                }
            }
        }
        Kind::Picture => {
            let mime = match class {
                class::JPEG => Some("image/jpeg"),
                class::PNG => Some("image/png"),
                class::BMP => Some("image/bmp"),
                _ => Picture::sniff_mime(data),
            };
            // Several covers may be present; the first one is kept
            if let Some(mime) = mime {
                let picture = Picture::new(data.to_vec(), mime, Picture::FRONT_COVER, String::new());
                walk.fields.insert_if_absent(field, Value::Picture(picture));
            }
        }
    }
}

impl Metadata for Mp4Tag {
    fn format(&self) -> TagFormat {
        TagFormat::Mp4
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

    fn duration(&self) -> Duration {
        self.duration
    }

    fn picture(&self) -> Option<&Picture> {
        self.fields.picture(Field::Picture)
    }

    fn lyrics(&self) -> &str {
        self.fields.text(Field::Lyrics)
    }

    fn comment(&self) -> &str {
        self.fields.text(Field::Comment)
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

    /// Narrators from the dedicated atom, falling back to the composer
    fn narrators(&self) -> Vec<String> {
        let narrators = split_values(self.fields.text(Field::Narrators));
        if !narrators.is_empty() {
            return narrators;
        }
        match self.composer() {
            "" => Vec::new(),
            composer => vec![composer.to_string()],
        }
    }

    fn chapters(&self) -> &[RawChapter] {
        &self.chapters
    }

    fn issues(&self) -> &[RecordIssue] {
        &self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn atom(code: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(code);
        out.extend_from_slice(payload);
        out
    }

    fn data(class: u32, value: &[u8]) -> Vec<u8> {
        let mut body = class.to_be_bytes().to_vec();
        body.extend_from_slice(&[0, 0, 0, 0]);
        body.extend_from_slice(value);
        atom(b"data", &body)
    }

    fn mvhd_v0(timescale: u32, duration: u32) -> Vec<u8> {
        let mut body = vec![0u8; 12];
        body.extend_from_slice(&timescale.to_be_bytes());
        body.extend_from_slice(&duration.to_be_bytes());
        body.extend_from_slice(&[0u8; 80]);
        atom(b"mvhd", &body)
    }

    fn read(bytes: Vec<u8>) -> Mp4Tag {
        Mp4Tag::read(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_movie_duration_versions() {
        let mut v0 = vec![0u8; 12];
        v0.extend_from_slice(&600u32.to_be_bytes());
        v0.extend_from_slice(&(600u32 * 95 + 599).to_be_bytes());
        assert_eq!(movie_duration(&v0).unwrap(), Duration::from_secs(95));

        let mut v1 = vec![1u8, 0, 0, 0];
        v1.extend_from_slice(&[0u8; 16]);
        v1.extend_from_slice(&600u32.to_be_bytes());
        v1.extend_from_slice(&(600u64 * 95 + 599).to_be_bytes());
        assert_eq!(movie_duration(&v1).unwrap(), Duration::from_secs(95));
    }

    #[test]
    fn test_movie_duration_rejects_bad_headers() {
        assert!(movie_duration(&[]).is_err());
        assert!(movie_duration(&[0u8; 10]).is_err());
        assert!(movie_duration(&[1u8; 24]).is_err());
        assert!(movie_duration(&[0u8; 20]).is_err()); // zero time scale
    }

    #[test]
    fn test_text_items_and_track_pair() {
        let trkn = [0, 0, 0, 3, 0, 12, 0, 0];
        let ilst = [
            atom(b"\xa9nam", &data(1, b"The Final Empire")),
            atom(b"\xa9ART", &data(1, b"Brandon Sanderson")),
            atom(b"trkn", &data(0, &trkn)),
        ]
        .concat();
        let tag = read(atom(b"moov", &atom(b"udta", &atom(b"ilst", &ilst))));

        assert_eq!(tag.title(), "The Final Empire");
        assert_eq!(tag.artist(), "Brandon Sanderson");
        assert_eq!(tag.track(), (3, 12));
        assert!(tag.issues().is_empty());
    }

    #[test]
    fn test_meta_full_box_header_is_skipped() {
        let ilst = atom(b"ilst", &atom(b"\xa9alb", &data(1, b"Mistborn")));
        let meta = atom(b"meta", &[vec![0u8; 4], ilst].concat());
        let tag = read(atom(b"moov", &atom(b"udta", &meta)));
        assert_eq!(tag.album(), "Mistborn");
    }

    #[test]
    fn test_freeform_trusted_vendor() {
        let freeform = [
            atom(b"mean", b"\0\0\0\0com.apple.iTunes"),
            atom(b"name", b"\0\0\0\0NARRATOR"),
            data(1, b"Michael Kramer"),
            data(1, b"Kate Reading"),
        ]
        .concat();
        let tag = read(atom(b"ilst", &atom(b"----", &freeform)));
        assert_eq!(tag.narrators(), vec!["Michael Kramer", "Kate Reading"]);
    }

    #[test]
    fn test_freeform_untrusted_vendor_is_dropped() {
        let freeform = [
            atom(b"mean", b"\0\0\0\0com.example.unknown"),
            atom(b"name", b"\0\0\0\0ISBN"),
            data(1, b"9780765311788"),
        ]
        .concat();
        let tag = read(atom(b"ilst", &atom(b"----", &freeform)));
        assert_eq!(tag.isbn(), "");
        assert!(tag.issues().is_empty());
    }

    #[test]
    fn test_cover_picture_class() {
        let jpeg = [0xff, 0xd8, 0xff, 0xe0, 1, 2, 3];
        let tag = read(atom(b"ilst", &atom(b"covr", &data(13, &jpeg))));
        let picture = tag.picture().unwrap();
        assert_eq!(picture.mime_type, "image/jpeg");
        assert_eq!(picture.file_extension, "jpg");
        assert_eq!(picture.data, jpeg.to_vec());
    }

    #[test]
    fn test_genre_code_atom() {
        let tag = read(atom(b"ilst", &atom(b"gnre", &data(0, &[0, 184]))));
        assert_eq!(tag.genre(), "Audiobook");
    }

    #[test]
    fn test_composer_is_narrator_fallback() {
        let tag = read(atom(b"ilst", &atom(b"\xa9wrt", &data(1, b"Michael Kramer"))));
        assert_eq!(tag.narrators(), vec!["Michael Kramer"]);
    }

    #[test]
    fn test_overrun_keeps_earlier_fields() {
        let mut bytes = atom(b"\xa9nam", &data(1, b"Kept"));
        bytes.extend_from_slice(&1000u32.to_be_bytes());
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&[0u8; 4]);
        let tag = read(atom(b"ilst", &bytes));

        assert_eq!(tag.title(), "Kept");
        assert_eq!(tag.issues().len(), 1);
        assert!(matches!(tag.issues()[0].kind, IssueKind::Overrun { declared: 1000, .. }));
    }

    #[test]
    fn test_heuristic_chapters_from_titles() {
        let ilst = [
            atom(b"\xa9nam", &data(1, b"Prologue")),
            atom(b"\xa9nam", &data(1, b"Chapter 1")),
            atom(b"\xa9nam", &data(1, b"Chapter 1")),
            atom(b"\xa9nam", &data(1, b"Chapter 2")),
        ]
        .concat();
        let bytes = atom(b"moov", &[mvhd_v0(1000, 90_000), atom(b"ilst", &ilst)].concat());
        let tag = read(bytes);

        let chapters = tag.chapters();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Prologue");
        assert_eq!(chapters[0].start, Duration::ZERO);
        assert_eq!(chapters[1].start, Duration::from_secs(30));
        assert_eq!(chapters[2].end, Duration::from_secs(90));
    }

    #[test]
    fn test_explicit_chapters_win_over_titles() {
        let mut chpl = vec![0u8; 12];
        chpl.extend_from_slice(&2u32.to_be_bytes());
        chpl.push(5);
        chpl.extend_from_slice(b"Intro");
        chpl.extend_from_slice(&(78_125u32 * 5).to_be_bytes()); // 10 s
        chpl.push(4);
        chpl.extend_from_slice(b"Main");

        let bytes = atom(
            b"moov",
            &[
                atom(b"udta", &atom(b"chpl", &chpl)),
                atom(b"ilst", &atom(b"\xa9nam", &data(1, b"Chapter 9"))),
                mvhd_v0(1, 60),
            ]
            .concat(),
        );
        let tag = read(bytes);

        let chapters = tag.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Intro");
        assert_eq!(chapters[0].end, Duration::from_secs(10));
        assert_eq!(chapters[1].start, Duration::from_secs(10));
        assert_eq!(chapters[1].end, Duration::from_secs(60));
    }

    #[test]
    fn test_bad_chapter_list_degrades_to_empty() {
        let mut chpl = vec![0u8; 12];
        chpl.extend_from_slice(&50u32.to_be_bytes());
        chpl.extend_from_slice(&[3, b'a', b'b', b'c']);
        let bytes = atom(b"moov", &[mvhd_v0(1, 60), atom(b"udta", &atom(b"chpl", &chpl))].concat());
        let tag = read(bytes);

        assert!(tag.chapters().is_empty());
        assert_eq!(tag.duration(), Duration::from_secs(60));
        assert!(matches!(tag.issues()[0].kind, IssueKind::Chapters(_)));
    }

    #[test]
    fn test_unknown_atoms_are_skipped() {
        let bytes = [
            atom(b"ftyp", b"M4B \0\0\0\0"),
            atom(b"mdat", &[0xaa; 64]),
            atom(b"moov", &atom(b"ilst", &atom(b"\xa9day", &data(1, b"2006-07-17")))),
        ]
        .concat();
        let tag = read(bytes);
        assert_eq!(tag.year(), 2006);
        assert!(tag.issues().is_empty());
    }

    #[test]
    fn test_child_atoms_rejects_overrun() {
        let mut payload = atom(b"data", b"abcd");
        payload[3] = 200;
        assert!(child_atoms(&payload).is_err());
    }
}
