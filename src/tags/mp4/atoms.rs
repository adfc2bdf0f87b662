// Atom type codes and how they map onto logical fields

use crate::tags::Field;

/// How an item atom's value should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Text,
    /// `trkn`/`disk`: binary position + total
    Pair,
    Picture,
    /// `gnre`: ID3v1 genre code plus one
    GenreCode,
}

/// Container atoms whose payload is a sequence of child atoms
pub const CONTAINERS: &[&[u8; 4]] = &[b"moov", b"udta", b"ilst", b"trak", b"mdia"];

pub const META: &[u8; 4] = b"meta";
pub const MVHD: &[u8; 4] = b"mvhd";
pub const CHPL: &[u8; 4] = b"chpl";
pub const FREEFORM: &[u8; 4] = b"----";
pub const DATA: &[u8; 4] = b"data";
pub const MEAN: &[u8; 4] = b"mean";
pub const NAME: &[u8; 4] = b"name";

/// Item atoms read from `ilst`
const ITEMS: &[(&[u8; 4], Field, Kind)] = &[
    (b"\xa9nam", Field::Title, Kind::Text),
    (b"\xa9ART", Field::Artist, Kind::Text),
    (b"\xa9art", Field::Artist, Kind::Text),
    (b"aART", Field::AlbumArtist, Kind::Text),
    (b"\xa9alb", Field::Album, Kind::Text),
    (b"\xa9wrt", Field::Composer, Kind::Text),
    (b"\xa9day", Field::Year, Kind::Text),
    (b"\xa9gen", Field::Genre, Kind::Text),
    (b"gnre", Field::Genre, Kind::GenreCode),
    (b"trkn", Field::Track, Kind::Pair),
    (b"disk", Field::Disc, Kind::Pair),
    (b"covr", Field::Picture, Kind::Picture),
    (b"\xa9lyr", Field::Lyrics, Kind::Text),
    (b"\xa9cmt", Field::Comment, Kind::Text),
    (b"cprt", Field::Publisher, Kind::Text),
    (b"\xa9pub", Field::Publisher, Kind::Text),
    (b"\xa9mvn", Field::Series, Kind::Text),
    (b"\xa9mvi", Field::SeriesSequence, Kind::Text),
    (b"sbtl", Field::Subtitle, Kind::Text),
    (b"lang", Field::Language, Kind::Text),
    (b"isbn", Field::Isbn, Kind::Text),
    (b"asin", Field::Asin, Kind::Text),
    (b"nrts", Field::Narrators, Kind::Text),
    (b"seqn", Field::SeriesSequence, Kind::Text),
];

/// Vendors whose free-form (`----`) atoms are trusted
pub const MEANS: &[&str] = &[
    "com.apple.iTunes",
    "com.mixedinkey.mixedinkey",
    "com.serato.dj",
];

/// Field and value kind for an item atom, if it is one we read
pub fn item(code: &[u8; 4]) -> Option<(Field, Kind)> {
    ITEMS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, field, kind)| (*field, *kind))
}

/// Field for a free-form atom's `name`, matched case-insensitively
pub fn freeform(name: &str) -> Option<Field> {
    let field = match name.trim().to_ascii_uppercase().as_str() {
        "SUBTITLE" | "SBTL" => Field::Subtitle,
        "LANGUAGE" | "LANG" => Field::Language,
        "ISBN" => Field::Isbn,
        "ASIN" | "AUDIBLE_ASIN" => Field::Asin,
        "NARRATOR" | "NARRATORS" | "NRTS" => Field::Narrators,
        "SERIES" => Field::Series,
        "SERIES-PART" | "SERIES_PART" | "SERIESPART" | "SEQN" => Field::SeriesSequence,
        "PUBLISHER" => Field::Publisher,
        _ => return None,
    };
    Some(field)
}

pub fn is_container(code: &[u8; 4]) -> bool {
    CONTAINERS.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_lookup() {
        assert_eq!(item(b"\xa9nam"), Some((Field::Title, Kind::Text)));
        assert_eq!(item(b"trkn"), Some((Field::Track, Kind::Pair)));
        assert_eq!(item(b"covr"), Some((Field::Picture, Kind::Picture)));
        assert_eq!(item(b"zzzz"), None);
    }

    #[test]
    fn test_freeform_names() {
        assert_eq!(freeform("NARRATOR"), Some(Field::Narrators));
        assert_eq!(freeform("isbn"), Some(Field::Isbn));
        assert_eq!(freeform("Series-Part"), Some(Field::SeriesSequence));
        assert_eq!(freeform("iTunSMPB"), None);
    }

    #[test]
    fn test_containers() {
        assert!(is_container(b"moov"));
        assert!(is_container(b"ilst"));
        assert!(!is_container(b"meta"));
        assert!(!is_container(b"mdat"));
    }
}
