// Byte-stream helpers shared by the tag decoders

use std::io::{self, Read, Seek, SeekFrom};

/// Read big-endian 32-bit integer
pub fn read_be_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_be_bytes(buffer))
}

/// Read big-endian 64-bit integer
pub fn read_be_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buffer = [0u8; 8];
    reader.read_exact(&mut buffer)?;
    Ok(u64::from_be_bytes(buffer))
}

/// Read a 4-byte type code
pub fn read_fourcc<R: Read>(reader: &mut R) -> io::Result<[u8; 4]> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Read exactly `len` bytes.
///
/// Callers are expected to have checked `len` against the remaining stream
/// length first, so a corrupt length field never turns into a huge allocation.
pub fn read_bytes<R: Read>(reader: &mut R, len: u64) -> io::Result<Vec<u8>> {
    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "length does not fit in memory"))?;
    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Move forward `len` bytes from the current position
pub fn skip<R: Seek>(reader: &mut R, len: u64) -> io::Result<u64> {
    let offset = i64::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "seek distance out of range"))?;
    reader.seek(SeekFrom::Current(offset))
}

/// Total length of the stream; the read position is left unchanged
pub fn stream_len<R: Seek>(reader: &mut R) -> io::Result<u64> {
    let pos = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    if pos != len {
        reader.seek(SeekFrom::Start(pos))?;
    }
    Ok(len)
}

/// Decode a synchsafe integer (7 bits per byte)
pub fn synchsafe(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 7) | u32::from(b & 0x7f))
}

/// Decode an unsigned big-endian integer of up to 8 bytes
pub fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Render a type code for display; bytes are treated as Latin-1 so `©nam` survives
pub fn fourcc_str(code: &[u8]) -> String {
    code.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_integers() {
        let mut cursor = Cursor::new(vec![
            0x00, 0x00, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 0x2a, b'm', b'o', b'o', b'v', 0xff,
        ]);
        assert_eq!(read_be_u32(&mut cursor).unwrap(), 0x100);
        assert_eq!(read_be_u64(&mut cursor).unwrap(), 0x2a);
        assert_eq!(&read_fourcc(&mut cursor).unwrap(), b"moov");
        assert!(read_be_u32(&mut cursor).is_err());
    }

    #[test]
    fn test_stream_len_preserves_position() {
        let mut cursor = Cursor::new(vec![0u8; 10]);
        skip(&mut cursor, 3).unwrap();
        assert_eq!(stream_len(&mut cursor).unwrap(), 10);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_synchsafe() {
        assert_eq!(synchsafe(&[0x00, 0x00, 0x02, 0x01]), 257);
        assert_eq!(synchsafe(&[0x7f, 0x7f, 0x7f, 0x7f]), 0x0fff_ffff);
    }

    #[test]
    fn test_be_uint() {
        assert_eq!(be_uint(&[0x01]), 1);
        assert_eq!(be_uint(&[0x01, 0x00]), 256);
        assert_eq!(be_uint(&[]), 0);
    }

    #[test]
    fn test_fourcc_str_latin1() {
        assert_eq!(fourcc_str(b"\xa9nam"), "©nam");
        assert_eq!(fourcc_str(b"moov"), "moov");
    }
}
