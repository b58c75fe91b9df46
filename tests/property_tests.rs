//! Stream-position and budget invariants over arbitrary payloads.

mod common;

use common::{atom, container, open_ended_atom};
use mp4atoms::{AtomError, AtomFactory, FourCC};
use proptest::prelude::*;
use std::io::Cursor;

/// Built-in, context-dependent, handler-claimed and unknown codes.
const TYPES: &[[u8; 4]] = &[
    *b"ftyp", *b"mvhd", *b"tkhd", *b"mdhd", *b"hdlr", *b"url ", *b"stts", *b"ctts", *b"stsc",
    *b"stsz", *b"stco", *b"stss", *b"esds", *b"vmhd", *b"smhd", *b"nmhd", *b"hmhd", *b"frma",
    *b"schm", *b"iKMS", *b"iSFM", *b"iSLT", *b"tims", *b"sdp ", *b"hint", *b"rtp ", *b"mp4a",
    *b"mp4v", *b"avc1", *b"mp4s", *b"stsd", *b"dref", *b"moov", *b"trak", *b"meta", *b"ilst",
    *b"udta", *b"hnti", *b"data", *b"xtra", *b"mdat",
];

fn any_type() -> impl Strategy<Value = [u8; 4]> {
    prop::sample::select(TYPES.to_vec())
}

fn any_context() -> impl Strategy<Value = Option<FourCC>> {
    prop::option::of(prop::sample::select(vec![*b"hnti", *b"ilst", *b"udta", *b"----", *b"\xA9nam"]))
        .prop_map(|c| c.map(FourCC))
}

proptest! {
    #[test]
    fn cursor_lands_at_atom_end(
        typ in any_type(),
        payload in prop::collection::vec(any::<u8>(), 0..256),
        prefix in 0usize..16,
        slack in 0u64..64,
        context in any_context(),
    ) {
        let mut data = vec![0u8; prefix];
        data.extend(atom(&typ, &payload));
        let size = 8 + payload.len() as u64;
        let mut cur = Cursor::new(data);
        cur.set_position(prefix as u64);

        let mut available = size + slack;
        let a = AtomFactory::with_defaults()
            .construct(&mut cur, &mut available, context)
            .unwrap();

        prop_assert_eq!(a.typ(), FourCC(typ));
        prop_assert_eq!(a.size(), size);
        prop_assert_eq!(cur.position(), prefix as u64 + size);
        prop_assert_eq!(available, slack);
    }

    #[test]
    fn short_budget_never_moves_the_cursor(
        bytes in prop::collection::vec(any::<u8>(), 0..32),
        budget in 0u64..8,
    ) {
        let mut cur = Cursor::new(bytes);
        let mut available = budget;
        let err = AtomFactory::new().construct(&mut cur, &mut available, None).unwrap_err();
        prop_assert!(matches!(err, AtomError::EndOfStream));
        prop_assert_eq!(cur.position(), 0);
    }

    #[test]
    fn failed_headers_leave_stream_and_budget_alone(
        size32 in 1u32..8,
        typ in any_type(),
        rest in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        let mut data = size32.to_be_bytes().to_vec();
        data.extend_from_slice(&typ);
        data.extend(rest);
        let mut cur = Cursor::new(data);
        let mut available = 64;
        if AtomFactory::new().construct(&mut cur, &mut available, None).is_err() {
            prop_assert_eq!(cur.position(), 0);
            prop_assert_eq!(available, 64);
        }
    }

    #[test]
    fn container_keeps_every_fitting_child(
        sizes in prop::collection::vec(0usize..40, 0..12),
    ) {
        let children: Vec<Vec<u8>> = sizes
            .iter()
            .map(|&n| atom(b"zzzz", &vec![0xEE; n]))
            .collect();
        let atoms = AtomFactory::new()
            .parse_all(&mut Cursor::new(container(b"moov", &children)))
            .unwrap();

        let kids = atoms[0].children();
        prop_assert_eq!(kids.len(), sizes.len());
        let mut offset = 8;
        for (kid, &n) in kids.iter().zip(&sizes) {
            prop_assert_eq!(kid.header.start, offset);
            prop_assert_eq!(kid.size(), 8 + n as u64);
            offset += 8 + n as u64;
        }
    }

    #[test]
    fn open_ended_size_is_equivalent_to_literal(
        sizes in prop::collection::vec(0usize..24, 0..6),
        typ in prop::sample::select(vec![*b"moov", *b"trak", *b"udta", *b"mdat"]),
    ) {
        let payload: Vec<u8> = sizes.iter().flat_map(|&n| atom(b"free", &vec![1; n])).collect();
        let factory = AtomFactory::with_defaults();
        let literal = factory.parse_all(&mut Cursor::new(atom(&typ, &payload))).unwrap();
        let open = factory.parse_all(&mut Cursor::new(open_ended_atom(&typ, &payload))).unwrap();
        prop_assert_eq!(literal, open);
    }
}
