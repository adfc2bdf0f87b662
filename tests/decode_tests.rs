use audiobookscan::directory::DirectoryParser;
use audiobookscan::tags::TagFormat;
use audiobookscan::{decode, reconcile, IssueKind, TagError};
use std::io::Cursor;
use std::time::Duration;

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

fn mvhd_v1(timescale: u32, duration: u64) -> Vec<u8> {
    let mut body = vec![1u8, 0, 0, 0];
    body.extend_from_slice(&[0u8; 16]);
    body.extend_from_slice(&timescale.to_be_bytes());
    body.extend_from_slice(&duration.to_be_bytes());
    body.extend_from_slice(&[0u8; 80]);
    atom(b"mvhd", &body)
}

fn m4b(mvhd: Vec<u8>, ilst: &[u8]) -> Vec<u8> {
    let meta = atom(b"meta", &[vec![0u8; 4], atom(b"ilst", ilst)].concat());
    let moov = atom(b"moov", &[mvhd, atom(b"udta", &meta)].concat());
    [atom(b"ftyp", b"M4B \0\0\0\0"), moov].concat()
}

fn id3_frame(id: &str, body: &[u8]) -> Vec<u8> {
    let mut out = id.as_bytes().to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(body);
    out
}

fn id3_tag(major: u8, frames: &[u8]) -> Vec<u8> {
    let size = frames.len() as u32;
    let mut out = vec![b'I', b'D', b'3', major, 0, 0];
    out.extend_from_slice(&[
        ((size >> 21) & 0x7f) as u8,
        ((size >> 14) & 0x7f) as u8,
        ((size >> 7) & 0x7f) as u8,
        (size & 0x7f) as u8,
    ]);
    out.extend_from_slice(frames);
    out
}

#[test]
fn test_decoding_twice_gives_equal_results() {
    let ilst = [
        atom(b"\xa9nam", &data(1, b"The Well of Ascension")),
        atom(b"\xa9ART", &data(1, b"Brandon Sanderson")),
        atom(b"\xa9day", &data(1, b"2007")),
    ]
    .concat();
    let bytes = m4b(mvhd_v0(1000, 3_600_000), &ilst);

    let first = decode(&mut Cursor::new(bytes.clone())).unwrap();
    let second = decode(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.format(), TagFormat::Mp4);
    assert_eq!(first.title(), "The Well of Ascension");
    assert_eq!(first.year(), 2007);
}

#[test]
fn test_movie_header_versions_agree() {
    let ilst = atom(b"\xa9nam", &data(1, b"Book"));
    let v0 = decode(&mut Cursor::new(m4b(mvhd_v0(44_100, 44_100 * 7_200), &ilst))).unwrap();
    let v1 = decode(&mut Cursor::new(m4b(mvhd_v1(44_100, 44_100 * 7_200), &ilst))).unwrap();

    assert_eq!(v0.duration(), Duration::from_secs(7_200));
    assert_eq!(v0.duration(), v1.duration());
}

#[test]
fn test_heuristic_chapters_cover_running_time() {
    let ilst = [
        atom(b"\xa9nam", &data(1, b"Chapter 1")),
        atom(b"\xa9nam", &data(1, b"Chapter 2")),
        atom(b"\xa9nam", &data(1, b"Chapter 3")),
        atom(b"\xa9nam", &data(1, b"Epilogue")),
    ]
    .concat();
    let tag = decode(&mut Cursor::new(m4b(mvhd_v0(1, 400), &ilst))).unwrap();

    let chapters = tag.chapters();
    assert_eq!(chapters.len(), 4);
    assert_eq!(chapters[0].start, Duration::ZERO);
    for pair in chapters.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    assert_eq!(chapters[3].end, tag.duration());
}

#[test]
fn test_damaged_atom_is_noted_not_fatal() {
    let mut ilst = atom(b"\xa9nam", &data(1, b"Still Here"));
    ilst.extend_from_slice(&5000u32.to_be_bytes());
    ilst.extend_from_slice(b"\xa9ART");
    ilst.extend_from_slice(&[0u8; 8]);
    let tag = decode(&mut Cursor::new(m4b(mvhd_v0(1, 10), &ilst))).unwrap();

    assert_eq!(tag.title(), "Still Here");
    assert!(!tag.issues().is_empty());
    assert!(tag
        .issues()
        .iter()
        .any(|issue| matches!(issue.kind, IssueKind::Overrun { declared: 5000, .. })));
}

#[test]
fn test_freeform_audiobook_fields() {
    let freeform = |name: &str, value: &str| {
        let mut name_body = vec![0u8; 4];
        name_body.extend_from_slice(name.as_bytes());
        atom(
            b"----",
            &[
                atom(b"mean", b"\0\0\0\0com.apple.iTunes"),
                atom(b"name", &name_body),
                data(1, value.as_bytes()),
            ]
            .concat(),
        )
    };
    let ilst = [
        freeform("SERIES", "Mistborn"),
        freeform("SERIES-PART", "2"),
        freeform("ASIN", "B002UZMLXM"),
        freeform("SUBTITLE", "Mistborn, Book Two"),
    ]
    .concat();
    let tag = decode(&mut Cursor::new(m4b(mvhd_v0(1, 10), &ilst))).unwrap();

    assert_eq!(tag.series(), "Mistborn");
    assert_eq!(tag.series_sequence(), "2");
    assert_eq!(tag.asin(), "B002UZMLXM");
    assert_eq!(tag.subtitle(), "Mistborn, Book Two");
}

#[test]
fn test_id3_year_frames_per_version() {
    let mut v22 = b"TYE".to_vec();
    v22.extend_from_slice(&[0, 0, 5, 0]);
    v22.extend_from_slice(b"1999");
    let v23 = id3_frame("TYER", b"\x002003");
    let v24 = id3_frame("TDRC", b"\x032011-05-03");

    let cases = [
        (id3_tag(2, &v22), TagFormat::Id3v2_2, 1999),
        (id3_tag(3, &v23), TagFormat::Id3v2_3, 2003),
        (id3_tag(4, &v24), TagFormat::Id3v2_4, 2011),
    ];
    for (bytes, format, year) in cases {
        let tag = decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(tag.format(), format);
        assert_eq!(tag.year(), year);
        assert!(tag.chapters().is_empty());
    }
}

#[test]
fn test_unknown_and_truncated_streams_fail() {
    assert!(matches!(
        decode(&mut Cursor::new(b"RIFF\0\0\0\0WAVEfmt ".to_vec())),
        Err(TagError::UnknownFormat)
    ));
    assert!(matches!(
        decode(&mut Cursor::new(b"ab".to_vec())),
        Err(TagError::Truncated(2))
    ));
}

#[test]
fn test_directory_wins_over_tags_when_reconciling() {
    let frames = [
        id3_frame("TIT2", b"\x00Mistborn: The Final Empire"),
        id3_frame("TPE1", b"\x00B. Sanderson"),
        id3_frame("TALB", b"\x00The Final Empire"),
        id3_frame("TCON", b"\x00Fantasy"),
        id3_frame("TYER", b"\x002006"),
    ]
    .concat();
    let tag = decode(&mut Cursor::new(id3_tag(3, &frames))).unwrap();
    let dir = DirectoryParser::default()
        .parse("/lib/Sanderson, Brandon/Mistborn/Book 1 - The Final Empire {Michael Kramer}.mp3");

    let book = reconcile(&dir, &*tag, 1024, None);
    assert_eq!(book.title, "The Final Empire");
    assert_eq!(book.authors, vec!["Brandon Sanderson"]);
    assert_eq!(book.narrators, vec!["Michael Kramer"]);
    assert_eq!(book.series, "Mistborn");
    assert_eq!(book.series_sequence, Some(1.0));
    assert_eq!(book.genres, vec!["Fantasy"]);
    assert_eq!(book.year, 2006);
    assert_eq!(book.size, 1024);
}

#[test]
fn test_tag_series_without_sequence_keeps_folder_index() {
    let mut name_body = vec![0u8; 4];
    name_body.extend_from_slice(b"SERIES");
    let series = atom(
        b"----",
        &[
            atom(b"mean", b"\0\0\0\0com.apple.iTunes"),
            atom(b"name", &name_body),
            data(1, b"Mistborn"),
        ]
        .concat(),
    );
    let tag = decode(&mut Cursor::new(m4b(mvhd_v0(1, 10), &series))).unwrap();
    assert_eq!(tag.series_sequence(), "");

    let dir = DirectoryParser::default()
        .parse("/lib/Sanderson, Brandon/Mistborn/Book 2 - The Well of Ascension.m4b");
    let book = reconcile(&dir, &*tag, 0, None);
    assert_eq!(book.series, "Mistborn");
    assert_eq!(book.series_sequence, Some(2.0));

    let bare = DirectoryParser::default().parse("/lib/Unknown/plainfile.m4b");
    assert_eq!(reconcile(&bare, &*tag, 0, None).series_sequence, None);
}
