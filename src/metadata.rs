//! iTunes-style and 3GPP metadata atoms.
//!
//! None of these codes are in the built-in table: they only make sense under
//! a particular parent, so they are claimed by [`MetadataHandler`] based on
//! the parent context.

use crate::boxes::{Atom, AtomBody, AtomHeader, ContainerAtom, FourCC, FullHeader};
use crate::factory::{AtomFactory, TypeHandler};
use crate::known_boxes::{DATA, FREEFORM, ILST, MEAN, NAME, UDTA};
use crate::leaves::LeafAtom;
use crate::parser::{read_full_header, Result, FULL_HEADER_SIZE};
use crate::stream::ByteStream;
use crate::util::{lang_from_u16, read_all, serialize_hex};
use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Read;

/// Item keys whose `data` children are parsed.
const ITEM_KEYS: &[&[u8; 4]] = &[
    b"\xA9nam", b"\xA9ART", b"\xA9alb", b"\xA9day", b"\xA9too", b"\xA9cmt", b"\xA9gen",
    b"\xA9wrt", b"\xA9grp", b"\xA9lyr", b"\xA9des", b"\xA9st3", b"aART", b"trkn", b"disk",
    b"gnre", b"cpil", b"tmpo", b"covr", b"desc", b"ldes", b"tvsh", b"tven", b"tvsn", b"tves",
    b"tvnn", b"purd", b"pgap", b"stik", b"rtng", b"apID", b"cprt", b"soal", b"soar", b"sonm",
    b"soaa", b"soco", b"sosn", b"----",
];

/// 3GPP asset information atoms found in `udta`.
const ASSET_KEYS: &[&[u8; 4]] = &[b"titl", b"dscp", b"cprt", b"perf", b"auth", b"gnre"];

fn is_item_key(typ: FourCC) -> bool {
    ITEM_KEYS.iter().any(|k| **k == typ.0)
}

/// Well-known type indicators of a `data` atom.
pub mod data_type {
    pub const BINARY: u32 = 0;
    pub const UTF8: u32 = 1;
    pub const UTF16: u32 = 2;
    pub const JPEG: u32 = 13;
    pub const PNG: u32 = 14;
    pub const SIGNED_INT: u32 = 21;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataValue {
    Text(String),
    Integer(i64),
    Binary(#[serde(serialize_with = "serialize_hex")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataAtom {
    pub data_type: u32,
    pub locale: u32,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalizedString {
    pub full: FullHeader,
    pub language: String,
    pub value: String,
}

fn decode_value(data_type: u32, raw: Vec<u8>) -> DataValue {
    match data_type {
        data_type::UTF8 => DataValue::Text(String::from_utf8_lossy(&raw).into_owned()),
        data_type::UTF16 => {
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            DataValue::Text(String::from_utf16_lossy(&units))
        }
        data_type::SIGNED_INT if matches!(raw.len(), 1 | 2 | 4 | 8) => {
            let mut v = raw[0] as i8 as i64;
            for &b in &raw[1..] {
                v = (v << 8) | b as i64;
            }
            DataValue::Integer(v)
        }
        _ => DataValue::Binary(raw),
    }
}

fn read_data(r: &mut dyn Read) -> std::io::Result<DataAtom> {
    let data_type = r.read_u32::<BigEndian>()? & 0x00FF_FFFF;
    let locale = r.read_u32::<BigEndian>()?;
    let value = decode_value(data_type, read_all(r)?);
    Ok(DataAtom {
        data_type,
        locale,
        value,
    })
}

fn read_localized(r: &mut dyn Read) -> std::io::Result<LocalizedString> {
    let full = read_full_header(r)?;
    let language = lang_from_u16(r.read_u16::<BigEndian>()? & 0x7FFF);
    let raw = read_all(r)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(LocalizedString {
        full,
        language,
        value: String::from_utf8_lossy(&raw[..end]).into_owned(),
    })
}

/// Claims metadata atoms by parent context; registered on the default factory.
#[derive(Debug, Default)]
pub struct MetadataHandler;

impl TypeHandler for MetadataHandler {
    fn try_create(
        &self,
        header: &AtomHeader,
        stream: &mut dyn ByteStream,
        context: Option<FourCC>,
        depth: usize,
        factory: &AtomFactory,
    ) -> Result<Option<Atom>> {
        let Some(parent) = context else {
            return Ok(None);
        };

        let body = if parent == ILST {
            // every item under ilst is a plain container keyed by its type
            AtomBody::Container(ContainerAtom::expand(header, false, stream, factory, depth)?)
        } else {
            let mut r = (&mut *stream).take(header.payload_size());
            if header.typ == DATA && is_item_key(parent) {
                if header.payload_size() < 8 {
                    return Ok(None);
                }
                AtomBody::Leaf(LeafAtom::Data(read_data(&mut r)?))
            } else if parent == FREEFORM && (header.typ == MEAN || header.typ == NAME) {
                if header.payload_size() < FULL_HEADER_SIZE {
                    return Ok(None);
                }
                let full = read_full_header(&mut r)?;
                let value = String::from_utf8_lossy(&read_all(&mut r)?).into_owned();
                AtomBody::Leaf(LeafAtom::MetaString { full, value })
            } else if parent == UDTA && ASSET_KEYS.iter().any(|k| **k == header.typ.0) {
                if header.payload_size() < FULL_HEADER_SIZE + 2 {
                    return Ok(None);
                }
                AtomBody::Leaf(LeafAtom::LocalizedString(read_localized(&mut r)?))
            } else {
                return Ok(None);
            }
        };
        Ok(Some(Atom::new(*header, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values_are_sign_extended() {
        assert_eq!(decode_value(data_type::SIGNED_INT, vec![0xFF]), DataValue::Integer(-1));
        assert_eq!(decode_value(data_type::SIGNED_INT, vec![0x00, 0x78]), DataValue::Integer(120));
        assert!(matches!(decode_value(data_type::SIGNED_INT, vec![1, 2, 3]), DataValue::Binary(_)));
    }

    #[test]
    fn utf16_text() {
        let raw = vec![0x00, b'h', 0x00, b'i'];
        assert_eq!(decode_value(data_type::UTF16, raw), DataValue::Text("hi".into()));
    }
}
