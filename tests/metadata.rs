mod common;

use common::{atom, container, full_atom, hdlr};
use mp4atoms::boxes::select_by_path;
use mp4atoms::leaves::LeafAtom;
use mp4atoms::metadata::{data_type, DataValue};
use mp4atoms::AtomFactory;
use std::io::Cursor;

fn data(kind: u32, value: &[u8]) -> Vec<u8> {
    let mut p = kind.to_be_bytes().to_vec();
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(value);
    atom(b"data", &p)
}

fn itunes_movie() -> Vec<u8> {
    let title = container(b"\xA9nam", &[data(data_type::UTF8, b"Big Buck Bunny")]);
    let tempo = container(b"tmpo", &[data(data_type::SIGNED_INT, &[0x00, 0x78])]);
    let freeform = container(
        b"----",
        &[
            full_atom(b"mean", 0, 0, b"com.apple.iTunes"),
            full_atom(b"name", 0, 0, b"iTunSMPB"),
            data(data_type::UTF8, b" 00000000"),
        ],
    );
    let ilst = container(b"ilst", &[title, tempo, freeform]);
    let mut meta_payload = hdlr(b"mdir", "");
    meta_payload.extend(ilst);
    let meta = full_atom(b"meta", 0, 0, &meta_payload);
    container(b"moov", &[container(b"udta", &[meta])])
}

#[test]
fn itunes_items_are_decoded() {
    let atoms = AtomFactory::with_defaults()
        .parse_all(&mut Cursor::new(itunes_movie()))
        .unwrap();

    let title = select_by_path(&atoms, "moov.udta.meta.ilst.©nam.data");
    assert_eq!(title.len(), 1);
    match title[0].as_leaf() {
        Some(LeafAtom::Data(d)) => {
            assert_eq!(d.data_type, data_type::UTF8);
            assert_eq!(d.value, DataValue::Text("Big Buck Bunny".into()));
        }
        other => panic!("expected data atom, got {other:?}"),
    }

    let tempo = select_by_path(&atoms, "moov.udta.meta.ilst.tmpo.data");
    match tempo[0].as_leaf() {
        Some(LeafAtom::Data(d)) => assert_eq!(d.value, DataValue::Integer(120)),
        other => panic!("expected data atom, got {other:?}"),
    }

    let mean = select_by_path(&atoms, "moov.udta.meta.ilst.----.mean");
    match mean[0].as_leaf() {
        Some(LeafAtom::MetaString { value, .. }) => assert_eq!(value, "com.apple.iTunes"),
        other => panic!("expected mean string, got {other:?}"),
    }
}

#[test]
fn without_metadata_handler_items_stay_opaque() {
    let atoms = AtomFactory::new()
        .parse_all(&mut Cursor::new(itunes_movie()))
        .unwrap();
    let items = select_by_path(&atoms, "moov.udta.meta.ilst.©nam");
    assert_eq!(items.len(), 1);
    assert!(items[0].is_opaque());
}

#[test]
fn data_outside_an_item_is_not_claimed() {
    let atoms = AtomFactory::with_defaults()
        .parse_all(&mut Cursor::new(container(b"udta", &[data(data_type::UTF8, b"x")])))
        .unwrap();
    assert!(atoms[0].children()[0].is_opaque());
}

#[test]
fn gnre_depends_on_parent() {
    // 3GPP asset under udta: full header, language, string
    let mut asset = 0x15C7u16.to_be_bytes().to_vec();
    asset.extend_from_slice(b"Drama\0");
    let udta = container(b"udta", &[full_atom(b"gnre", 0, 0, &asset)]);

    // iTunes genre code under ilst
    let ilst = container(b"ilst", &[container(b"gnre", &[data(0, &[0, 8])])]);

    let factory = AtomFactory::with_defaults();
    let a = factory.parse_all(&mut Cursor::new(udta)).unwrap();
    match a[0].children()[0].as_leaf() {
        Some(LeafAtom::LocalizedString(s)) => {
            assert_eq!(s.language, "eng");
            assert_eq!(s.value, "Drama");
        }
        other => panic!("expected localized string, got {other:?}"),
    }

    let b = factory.parse_all(&mut Cursor::new(ilst)).unwrap();
    let item = &b[0].children()[0];
    assert!(item.as_container().is_some());
    match item.children()[0].as_leaf() {
        Some(LeafAtom::Data(d)) => assert_eq!(d.value, DataValue::Binary(vec![0, 8])),
        other => panic!("expected data atom, got {other:?}"),
    }
}
