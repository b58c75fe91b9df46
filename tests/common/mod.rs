#![allow(dead_code)]

use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Plain atom: 32-bit size, type, payload.
pub fn atom(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

/// Atom using the 64-bit size form.
pub fn large_atom(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&1u32.to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(&(16 + payload.len() as u64).to_be_bytes());
    v.extend_from_slice(payload);
    v
}

/// Atom declared with size 0 ("to end of stream").
pub fn open_ended_atom(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&0u32.to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

pub fn full_atom(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut p = vec![version];
    p.extend_from_slice(&flags.to_be_bytes()[1..]);
    p.extend_from_slice(payload);
    atom(typ, &p)
}

pub fn container(typ: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    atom(typ, &children.concat())
}

pub fn ftyp() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(b"isom");
    p.extend_from_slice(&512u32.to_be_bytes());
    p.extend_from_slice(b"isom");
    p.extend_from_slice(b"mp41");
    atom(b"ftyp", &p)
}

pub fn hdlr(handler_type: &[u8; 4], name: &str) -> Vec<u8> {
    let mut p = vec![0; 4];
    p.extend_from_slice(handler_type);
    p.extend_from_slice(&[0; 12]);
    p.extend_from_slice(name.as_bytes());
    p.push(0);
    full_atom(b"hdlr", 0, 0, &p)
}

/// `mp4a` sample entry with the given child atoms.
pub fn mp4a(children: &[Vec<u8>]) -> Vec<u8> {
    let mut p = vec![0; 6];
    p.extend_from_slice(&1u16.to_be_bytes());
    p.extend_from_slice(&[0; 8]);
    p.extend_from_slice(&2u16.to_be_bytes());
    p.extend_from_slice(&16u16.to_be_bytes());
    p.extend_from_slice(&[0; 4]);
    p.extend_from_slice(&(44100u32 << 16).to_be_bytes());
    p.extend_from_slice(&children.concat());
    atom(b"mp4a", &p)
}

/// Cursor whose total length cannot be queried.
pub struct UnsizedStream(pub Cursor<Vec<u8>>);

impl Read for UnsizedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for UnsizedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::End(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "unsized")),
            other => self.0.seek(other),
        }
    }
}

/// Cursor that refuses to seek past the end of its data.
pub struct StrictStream(pub Cursor<Vec<u8>>);

impl Read for StrictStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for StrictStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.0.get_ref().len() as u64;
        if let SeekFrom::Start(n) = pos {
            if n > len {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek past end"));
            }
        }
        self.0.seek(pos)
    }
}
