// Text encodings used inside ID3v2 frames

use encoding_rs::{UTF_16BE, UTF_16LE, WINDOWS_1252};

/// Encoding selected by a frame's leading byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Latin1,
    /// UTF-16 with a byte order mark
    Utf16,
    Utf16Be,
    Utf8,
}

impl TextEncoding {
    /// Unknown bytes fall back to Latin-1
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => TextEncoding::Utf16,
            2 => TextEncoding::Utf16Be,
            3 => TextEncoding::Utf8,
            _ => TextEncoding::Latin1,
        }
    }

    fn terminator_len(self) -> usize {
        match self {
            TextEncoding::Utf16 | TextEncoding::Utf16Be => 2,
            TextEncoding::Latin1 | TextEncoding::Utf8 => 1,
        }
    }
}

/// Decode `data` to a string, dropping trailing terminators
pub fn decode(data: &[u8], encoding: TextEncoding) -> String {
    let text = match encoding {
        TextEncoding::Latin1 => WINDOWS_1252.decode_without_bom_handling(data).0.into_owned(),
        TextEncoding::Utf16 => match data {
            [0xff, 0xfe, rest @ ..] => UTF_16LE.decode_without_bom_handling(rest).0.into_owned(),
            [0xfe, 0xff, rest @ ..] => UTF_16BE.decode_without_bom_handling(rest).0.into_owned(),
            // Missing BOM: little-endian is what most writers produce
            _ => UTF_16LE.decode_without_bom_handling(data).0.into_owned(),
        },
        TextEncoding::Utf16Be => UTF_16BE.decode_without_bom_handling(data).0.into_owned(),
        TextEncoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
    };
    text.trim_end_matches('\0').to_string()
}

/// Split `data` at the first terminator for `encoding`.
///
/// Returns the bytes before the terminator and the bytes after it. Without a
/// terminator the whole input is the first part and the rest is empty.
pub fn split_terminated(data: &[u8], encoding: TextEncoding) -> (&[u8], &[u8]) {
    let width = encoding.terminator_len();
    let mut pos = 0;
    while pos + width <= data.len() {
        if data[pos..pos + width].iter().all(|&b| b == 0) {
            return (&data[..pos], &data[pos + width..]);
        }
        pos += width;
    }
    (data, &[])
}

/// Decode every terminator-separated string in `data`
pub fn decode_all(data: &[u8], encoding: TextEncoding) -> Vec<String> {
    let mut values = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let (head, tail) = split_terminated(rest, encoding);
        // UTF-16 strings after the first may carry their own BOM
        let value = decode(head, encoding);
        if !value.trim().is_empty() {
            values.push(value.trim().to_string());
        }
        rest = tail;
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode(b"Caf\xe9\0", TextEncoding::Latin1), "Café");
    }

    #[test]
    fn test_decode_utf16_bom() {
        let le = [0xff, 0xfe, b'H', 0, b'i', 0, 0, 0];
        assert_eq!(decode(&le, TextEncoding::Utf16), "Hi");
        let be = [0xfe, 0xff, 0, b'H', 0, b'i'];
        assert_eq!(decode(&be, TextEncoding::Utf16), "Hi");
        assert_eq!(decode(&[0, b'O', 0, b'k'], TextEncoding::Utf16Be), "Ok");
    }

    #[test]
    fn test_split_terminated_respects_width() {
        // The 0x00 inside 'H' (0x48 0x00) must not end a UTF-16 string
        let data = [b'H', 0, b'i', 0, 0, 0, b'X', 0];
        let (head, tail) = split_terminated(&data, TextEncoding::Utf16Be);
        assert_eq!(head, &[b'H', 0, b'i', 0]);
        assert_eq!(tail, &[b'X', 0]);

        let (head, tail) = split_terminated(b"desc\0text", TextEncoding::Latin1);
        assert_eq!(head, b"desc");
        assert_eq!(tail, b"text");

        let (head, tail) = split_terminated(b"plain", TextEncoding::Utf8);
        assert_eq!(head, b"plain");
        assert!(tail.is_empty());
    }

    #[test]
    fn test_decode_all_multi_value() {
        assert_eq!(
            decode_all(b"Fantasy\0Epic\0", TextEncoding::Utf8),
            vec!["Fantasy".to_string(), "Epic".to_string()]
        );
        assert!(decode_all(b"\0\0", TextEncoding::Latin1).is_empty());
    }

    #[test]
    fn test_unknown_encoding_byte() {
        assert_eq!(TextEncoding::from_byte(9), TextEncoding::Latin1);
        assert_eq!(TextEncoding::from_byte(1), TextEncoding::Utf16);
    }
}
