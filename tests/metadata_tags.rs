mod common;

use common::*;
use mp4demux::{CoverKind, Demux};
use std::io::Cursor;

fn open(bytes: Vec<u8>) -> Demux<Cursor<Vec<u8>>> {
    Demux::from_reader(Cursor::new(bytes)).expect("open failed")
}

#[test]
fn merged_metadata_keeps_meta_udta_location_order() {
    let file = concat(&[
        ftyp(),
        moov(&[
            mvhd_v0(0, 0, 1000, 1000),
            meta_iso(&[
                keys(&["com.apple.quicktime.make"]),
                ilst(&[index_tag(1, data_utf8("Widget Corp"))]),
            ]),
            udta(&[
                meta_qt(&[ilst(&[tag(
                    [0xa9, b'm', b'a', b'k'],
                    data_utf8("Widget Corp (udta)"),
                )])]),
                xyz("+48.8584+002.2945/"),
            ]),
        ]),
    ]);
    let demux = open(file);

    let (keys, values) = demux.metadata_strings();
    assert_eq!(keys.len(), 3);
    assert_eq!(keys.len(), values.len());
    assert!(keys.iter().all(|k| !k.is_empty()));
    assert!(values.iter().all(|v| !v.is_empty()));

    assert_eq!(keys[0], "com.apple.quicktime.make");
    assert_eq!(values[0], "Widget Corp");
    assert_eq!(keys[1], "\u{a9}mak");
    assert_eq!(values[1], "Widget Corp (udta)");
    assert_eq!(keys[2], "\u{a9}xyz");
    assert_eq!(values[2], "+48.8584+002.2945/");
}

#[test]
fn out_of_range_key_index_is_ignored() {
    let file = concat(&[
        ftyp(),
        moov(&[
            mvhd_v0(0, 0, 1000, 1000),
            meta_iso(&[
                keys(&["com.apple.quicktime.make"]),
                ilst(&[
                    index_tag(1, data_utf8("Widget Corp")),
                    index_tag(5, data_utf8("dropped")),
                ]),
            ]),
        ]),
    ]);
    let demux = open(file);

    let (keys, values) = demux.metadata_strings();
    assert_eq!(keys, ["com.apple.quicktime.make"]);
    assert_eq!(values, ["Widget Corp"]);
}

#[test]
fn udta_tags_collect_known_atoms() {
    let file = concat(&[
        ftyp(),
        moov(&[
            mvhd_v0(0, 0, 1000, 1000),
            udta(&[meta_qt(&[ilst(&[
                tag([0xa9, b'n', b'a', b'm'], data_utf8("A Title")),
                tag([0xa9, b't', b'o', b'o'], data_utf8("an-encoder 1.0")),
                tag([0xa9, b'z', b'z', b'z'], data_utf8("not a known tag")),
            ])])]),
        ]),
    ]);
    let demux = open(file);

    let (keys, values) = demux.metadata_strings();
    assert_eq!(keys, ["\u{a9}nam", "\u{a9}too"]);
    assert_eq!(values, ["A Title", "an-encoder 1.0"]);
}

#[test]
fn cover_prefers_meta_namespace() {
    let jpeg = b"JPEGDATA";
    let png = b"PNGDATA!";
    let file = concat(&[
        ftyp(),
        moov(&[
            mvhd_v0(0, 0, 1000, 1000),
            meta_iso(&[
                keys(&["com.apple.quicktime.artwork"]),
                ilst(&[index_tag(1, data_image(14, png))]),
            ]),
            udta(&[meta_qt(&[ilst(&[tag(*b"covr", data_image(13, jpeg))])])]),
        ]),
    ]);
    let mut demux = open(file);

    let mut buf = [0u8; 16];
    let (size, kind) = demux
        .metadata_cover(Some(&mut buf))
        .unwrap()
        .expect("cover present");
    assert_eq!(size, 8);
    assert_eq!(kind, CoverKind::Png);
    assert_eq!(&buf[..8], png);
}

#[test]
fn udta_cover_is_used_when_meta_has_none() {
    let jpeg = b"JPEGDATA";
    let file = concat(&[
        ftyp(),
        moov(&[
            mvhd_v0(0, 0, 1000, 1000),
            udta(&[meta_qt(&[ilst(&[tag(*b"covr", data_image(13, jpeg))])])]),
        ]),
    ]);
    let mut demux = open(file);

    let mut buf = [0u8; 16];
    let (size, kind) = demux
        .metadata_cover(Some(&mut buf))
        .unwrap()
        .expect("cover present");
    assert_eq!(size, 8);
    assert_eq!(kind, CoverKind::Jpeg);
    assert_eq!(&buf[..8], jpeg);
}

#[test]
fn no_cover_yields_none() {
    let file = concat(&[ftyp(), moov(&[mvhd_v0(0, 0, 1000, 1000)])]);
    let mut demux = open(file);

    assert!(demux.metadata_cover(None).unwrap().is_none());
}

#[test]
fn small_cover_buffer_is_rejected() {
    let jpeg = b"JPEGDATA";
    let file = concat(&[
        ftyp(),
        moov(&[
            mvhd_v0(0, 0, 1000, 1000),
            udta(&[meta_qt(&[ilst(&[tag(*b"covr", data_image(13, jpeg))])])]),
        ]),
    ]);
    let mut demux = open(file);

    let mut buf = [0u8; 4];
    assert!(matches!(
        demux.metadata_cover(Some(&mut buf)),
        Err(mp4demux::Error::BufferTooSmall { needed: 8, provided: 4 })
    ));
}

#[test]
fn location_alone_is_reported() {
    let file = concat(&[
        ftyp(),
        moov(&[
            mvhd_v0(0, 0, 1000, 1000),
            udta(&[xyz("+35.6580+139.7016/")]),
        ]),
    ]);
    let demux = open(file);

    let (keys, values) = demux.metadata_strings();
    assert_eq!(keys, ["\u{a9}xyz"]);
    assert_eq!(values, ["+35.6580+139.7016/"]);
}
