// ID3v2 frame identifiers and body decoders

use super::encoding::{self, TextEncoding};
use crate::tags::{Field, Picture};

/// Frame identifiers per version: (field, v2.2, v2.3, v2.4).
/// An empty identifier means the version has no frame for that field.
const FRAMES: &[(Field, &str, &str, &str)] = &[
    (Field::Title, "TT2", "TIT2", "TIT2"),
    (Field::Artist, "TP1", "TPE1", "TPE1"),
    (Field::Album, "TAL", "TALB", "TALB"),
    (Field::AlbumArtist, "TP2", "TPE2", "TPE2"),
    (Field::Composer, "TCM", "TCOM", "TCOM"),
    (Field::Year, "TYE", "TYER", "TDRC"),
    (Field::Track, "TRK", "TRCK", "TRCK"),
    (Field::Disc, "TPA", "TPOS", "TPOS"),
    (Field::Genre, "TCO", "TCON", "TCON"),
    (Field::Picture, "PIC", "APIC", "APIC"),
    (Field::Lyrics, "ULT", "USLT", "USLT"),
    (Field::Comment, "COM", "COMM", "COMM"),
    (Field::Subtitle, "TT3", "TIT3", "TIT3"),
    (Field::Publisher, "TPB", "TPUB", "TPUB"),
    (Field::Series, "", "MVNM", "MVNM"),
    (Field::SeriesSequence, "", "MVIN", "MVIN"),
    (Field::Language, "TLA", "TLAN", "TLAN"),
    (Field::Narrators, "TOA", "TOPE", "TOPE"),
    (Field::Length, "TLE", "TLEN", "TLEN"),
];

/// Field for a frame identifier under the given major version
pub fn field_for(id: &str, major: u8) -> Option<Field> {
    FRAMES
        .iter()
        .find(|(_, v22, v23, v24)| {
            let wanted = match major {
                2 => *v22,
                3 => *v23,
                _ => *v24,
            };
            !wanted.is_empty() && wanted == id
        })
        .map(|(field, ..)| *field)
}

pub fn is_user_text(id: &str) -> bool {
    id == "TXXX" || id == "TXX"
}

/// Field for a user-defined text frame, keyed by its description
pub fn user_text_field(description: &str) -> Option<Field> {
    let field = match description.trim().to_ascii_uppercase().as_str() {
        "SERIES" => Field::Series,
        "SERIES-PART" | "SERIES_PART" => Field::SeriesSequence,
        "ISBN" => Field::Isbn,
        "ASIN" | "AUDIBLE_ASIN" => Field::Asin,
        "NARRATOR" | "NARRATORS" => Field::Narrators,
        "SUBTITLE" => Field::Subtitle,
        _ => return None,
    };
    Some(field)
}

fn split_encoding(body: &[u8]) -> Result<(TextEncoding, &[u8]), String> {
    match body.split_first() {
        Some((&byte, rest)) => Ok((TextEncoding::from_byte(byte), rest)),
        None => Err("empty frame body".to_string()),
    }
}

/// Text frame: encoding byte then one or more terminated strings.
/// Multiple values are joined with `;`.
pub fn text(body: &[u8]) -> Result<String, String> {
    let (enc, data) = split_encoding(body)?;
    Ok(encoding::decode_all(data, enc).join(";"))
}

/// User text frame: encoding, description, value(s)
pub fn user_text(body: &[u8]) -> Result<(String, String), String> {
    let (enc, data) = split_encoding(body)?;
    let (description, rest) = encoding::split_terminated(data, enc);
    let value = encoding::decode_all(rest, enc).join(";");
    Ok((encoding::decode(description, enc), value))
}

/// Comment or lyrics frame: encoding, language (3), description, text
pub fn comment(body: &[u8]) -> Result<(String, String), String> {
    let (enc, data) = split_encoding(body)?;
    let data = data
        .get(3..)
        .ok_or_else(|| "missing language code".to_string())?;
    let (description, text) = encoding::split_terminated(data, enc);
    Ok((
        encoding::decode(description, enc).trim().to_string(),
        encoding::decode(text, enc).trim().to_string(),
    ))
}

/// Attached picture. `legacy` selects the v2.2 layout with a 3-character
/// image format in place of a MIME type.
pub fn picture(body: &[u8], legacy: bool) -> Result<Picture, String> {
    let (enc, data) = split_encoding(body)?;

    let (mime, data) = if legacy {
        let format = data
            .get(..3)
            .ok_or_else(|| "missing image format".to_string())?;
        let mime = match format.to_ascii_uppercase().as_slice() {
            b"JPG" => "image/jpeg".to_string(),
            b"PNG" => "image/png".to_string(),
            b"GIF" => "image/gif".to_string(),
            b"BMP" => "image/bmp".to_string(),
            _ => String::new(),
        };
        (mime, &data[3..])
    } else {
        // MIME type is always Latin-1
        let (mime, rest) = encoding::split_terminated(data, TextEncoding::Latin1);
        let mime = String::from_utf8_lossy(mime).trim().to_ascii_lowercase();
        let mime = if !mime.is_empty() && !mime.contains('/') {
            format!("image/{}", mime)
        } else {
            mime
        };
        (mime, rest)
    };

    let (&picture_type, data) = data
        .split_first()
        .ok_or_else(|| "missing picture type".to_string())?;
    let (description, image) = encoding::split_terminated(data, enc);
    if image.is_empty() {
        return Err("no image data".to_string());
    }

    let mime = match mime.as_str() {
        "" => Picture::sniff_mime(image).unwrap_or("application/octet-stream").to_string(),
        _ => mime,
    };

    Ok(Picture::new(
        image.to_vec(),
        &mime,
        picture_type,
        encoding::decode(description, enc).trim().to_string(),
    ))
}
