use crate::stream::ByteStream;
use serde::Serializer;
use std::fmt::Write;
use std::io::{self, Read};

/// Read `len` bytes at `offset`, or fewer if the stream ends first.
pub fn read_slice(stream: &mut dyn ByteStream, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    stream.seek_to(offset)?;
    let mut v = Vec::new();
    (&mut *stream).take(len).read_to_end(&mut v)?;
    Ok(v)
}

/// Drain a bounded payload reader.
pub fn read_all(r: &mut dyn Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Text up to the first NUL, lossily decoded.
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// ISO-639-2/T language packed as three 5-bit letters.
pub fn lang_from_u16(code: u16) -> String {
    if code == 0 {
        return "und".to_string();
    }
    [(code >> 10) & 0x1F, (code >> 5) & 0x1F, code & 0x1F]
        .iter()
        .map(|&c| (c as u8 + 0x60) as char)
        .collect()
}

pub fn serialize_hex<T: AsRef<[u8]>, S: Serializer>(bytes: &T, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

pub fn hex_dump(bytes: &[u8], start_offset: u64) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let offs = start_offset + (i as u64) * 16;
        let mut hexs = String::with_capacity(48);
        for b in chunk {
            let _ = write!(hexs, "{b:02x} ");
        }
        let ascii: String = chunk
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect();
        out.push_str(&format!("{:08x}  {:<48}  |{}|\n", offs, hexs, ascii));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn language_unpacking() {
        // "eng" = 0x15C7
        assert_eq!(lang_from_u16(0x15C7), "eng");
        assert_eq!(lang_from_u16(0), "und");
    }

    #[test]
    fn c_string_stops_at_nul() {
        assert_eq!(c_string(b"VideoHandler\0junk"), "VideoHandler");
        assert_eq!(c_string(b"no terminator"), "no terminator");
    }

    #[test]
    fn read_slice_is_bounded_by_stream_end() {
        let mut cur = Cursor::new(b"0123456789".to_vec());
        assert_eq!(read_slice(&mut cur, 8, 16).unwrap(), b"89");
    }

    #[test]
    fn hex_dump_line_layout() {
        let dump = hex_dump(b"ftyp", 0x10);
        assert!(dump.starts_with("00000010  66 74 79 70 "));
        assert!(dump.trim_end().ends_with("|ftyp|"));
    }

    #[test]
    fn hex_dump_wraps_every_sixteen_bytes() {
        let bytes: Vec<u8> = (0u8..18).collect();
        let dump = hex_dump(&bytes, 0);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  00 01 02 03"));
        assert!(lines[0].contains(" 0e 0f "));
        assert!(lines[1].starts_with("00000010  10 11 "));
        assert!(lines[1].ends_with("|..|"));
    }
}
