//! Byte-level builders for synthetic MP4 files used across the
//! integration tests.

#![allow(dead_code)]

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.iter().flatten().copied().collect()
}

/// `size` + fourcc + payload.
pub fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + payload.len());
    v.extend_from_slice(&(payload.len() as u32 + 8).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

/// A FullBox: version + 24-bit flags precede the body.
pub fn full(typ: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut payload = vec![version, (flags >> 16) as u8, (flags >> 8) as u8, flags as u8];
    payload.extend_from_slice(body);
    boxed(typ, &payload)
}

pub fn ftyp() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(b"isom");
    p.extend_from_slice(&512u32.to_be_bytes());
    p.extend_from_slice(b"isom");
    p.extend_from_slice(b"avc1");
    boxed(b"ftyp", &p)
}

pub fn mvhd_v0(creation: u32, modification: u32, timescale: u32, duration: u32) -> Vec<u8> {
    let mut b = Vec::new();
    for v in [creation, modification, timescale, duration] {
        b.extend_from_slice(&v.to_be_bytes());
    }
    // rate, volume, reserved, matrix, pre_defined, next_track_ID
    b.extend_from_slice(&[0u8; 80]);
    full(b"mvhd", 0, 0, &b)
}

pub fn mvhd_v1(creation: u64, modification: u64, timescale: u32, duration: u64) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&creation.to_be_bytes());
    b.extend_from_slice(&modification.to_be_bytes());
    b.extend_from_slice(&timescale.to_be_bytes());
    b.extend_from_slice(&duration.to_be_bytes());
    b.extend_from_slice(&[0u8; 80]);
    full(b"mvhd", 1, 0, &b)
}

pub fn tkhd(track_id: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&[0u8; 8]); // creation_time & modification_time
    b.extend_from_slice(&track_id.to_be_bytes());
    b.extend_from_slice(&[0u8; 8]); // reserved & duration
    b.extend_from_slice(&[0u8; 60]); // reserved, layer, volume, matrix, width, height
    full(b"tkhd", 0, 0, &b)
}

pub fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    mdhd_times(0, 0, timescale, duration)
}

pub fn mdhd_times(creation: u32, modification: u32, timescale: u32, duration: u32) -> Vec<u8> {
    let mut b = Vec::new();
    for v in [creation, modification, timescale, duration] {
        b.extend_from_slice(&v.to_be_bytes());
    }
    b.extend_from_slice(&[0u8; 4]); // language & pre_defined
    full(b"mdhd", 0, 0, &b)
}

pub fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&[0u8; 4]); // pre_defined
    b.extend_from_slice(handler);
    b.extend_from_slice(&[0u8; 12]); // reserved
    b.push(0); // empty name
    full(b"hdlr", 0, 0, &b)
}

pub fn vmhd() -> Vec<u8> {
    full(b"vmhd", 0, 1, &[0u8; 8])
}

pub fn smhd() -> Vec<u8> {
    full(b"smhd", 0, 0, &[0u8; 4])
}

pub fn nmhd() -> Vec<u8> {
    full(b"nmhd", 0, 0, &[])
}

pub fn stts(entries: &[(u32, u32)]) -> Vec<u8> {
    let mut b = (entries.len() as u32).to_be_bytes().to_vec();
    for (count, delta) in entries {
        b.extend_from_slice(&count.to_be_bytes());
        b.extend_from_slice(&delta.to_be_bytes());
    }
    full(b"stts", 0, 0, &b)
}

pub fn stss(numbers: &[u32]) -> Vec<u8> {
    let mut b = (numbers.len() as u32).to_be_bytes().to_vec();
    for n in numbers {
        b.extend_from_slice(&n.to_be_bytes());
    }
    full(b"stss", 0, 0, &b)
}

/// `constant` 0 writes the per-sample `sizes`; otherwise `count` copies of
/// the constant are implied.
pub fn stsz(constant: u32, count: u32, sizes: &[u32]) -> Vec<u8> {
    let mut b = constant.to_be_bytes().to_vec();
    b.extend_from_slice(&count.to_be_bytes());
    for s in sizes {
        b.extend_from_slice(&s.to_be_bytes());
    }
    full(b"stsz", 0, 0, &b)
}

pub fn stsc(entries: &[(u32, u32, u32)]) -> Vec<u8> {
    let mut b = (entries.len() as u32).to_be_bytes().to_vec();
    for (first, spc, desc) in entries {
        b.extend_from_slice(&first.to_be_bytes());
        b.extend_from_slice(&spc.to_be_bytes());
        b.extend_from_slice(&desc.to_be_bytes());
    }
    full(b"stsc", 0, 0, &b)
}

pub fn stco(offsets: &[u32]) -> Vec<u8> {
    let mut b = (offsets.len() as u32).to_be_bytes().to_vec();
    for o in offsets {
        b.extend_from_slice(&o.to_be_bytes());
    }
    full(b"stco", 0, 0, &b)
}

pub fn co64(offsets: &[u64]) -> Vec<u8> {
    let mut b = (offsets.len() as u32).to_be_bytes().to_vec();
    for o in offsets {
        b.extend_from_slice(&o.to_be_bytes());
    }
    full(b"co64", 0, 0, &b)
}

pub fn tref(kind: &[u8; 4], track_id: u32) -> Vec<u8> {
    let mut sub = Vec::new();
    sub.extend_from_slice(&12u32.to_be_bytes());
    sub.extend_from_slice(kind);
    sub.extend_from_slice(&track_id.to_be_bytes());
    boxed(b"tref", &sub)
}

pub fn stsd_video_avc(width: u16, height: u16, sps: &[u8], pps: &[u8]) -> Vec<u8> {
    let mut avcc = vec![1, 66, 0, 30, 0xff, 0xe1];
    avcc.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    avcc.extend_from_slice(sps);
    avcc.push(1);
    avcc.extend_from_slice(&(pps.len() as u16).to_be_bytes());
    avcc.extend_from_slice(pps);
    let avcc_box = boxed(b"avcC", &avcc);

    let mut entry = Vec::new();
    entry.extend_from_slice(&[0u8; 8]); // reserved & data_reference_index
    entry.extend_from_slice(&[0u8; 16]); // pre_defined & reserved
    entry.extend_from_slice(&width.to_be_bytes());
    entry.extend_from_slice(&height.to_be_bytes());
    entry.extend_from_slice(&[0u8; 12]); // resolutions & reserved
    entry.extend_from_slice(&1u16.to_be_bytes()); // frame_count
    entry.extend_from_slice(&[0u8; 32]); // compressorname
    entry.extend_from_slice(&[0u8; 4]); // depth & pre_defined
    entry.extend_from_slice(&avcc_box);
    let entry_box = boxed(b"avc1", &entry);

    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&entry_box);
    full(b"stsd", 0, 0, &body)
}

pub fn stsd_audio(channels: u16, sample_size: u16, rate_16_16: u32) -> Vec<u8> {
    let mut entry = Vec::new();
    entry.extend_from_slice(&[0u8; 8]); // reserved & data_reference_index
    entry.extend_from_slice(&[0u8; 8]); // reserved
    entry.extend_from_slice(&channels.to_be_bytes());
    entry.extend_from_slice(&sample_size.to_be_bytes());
    entry.extend_from_slice(&[0u8; 4]); // reserved
    entry.extend_from_slice(&rate_16_16.to_be_bytes());
    let entry_box = boxed(b"mp4a", &entry);

    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&entry_box);
    full(b"stsd", 0, 0, &body)
}

pub fn stsd_metadata(content_encoding: &str, mime: &str) -> Vec<u8> {
    let mut entry = Vec::new();
    entry.extend_from_slice(&[0u8; 6]); // reserved
    entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    entry.extend_from_slice(content_encoding.as_bytes());
    entry.push(0);
    entry.extend_from_slice(mime.as_bytes());
    entry.push(0);
    let entry_box = boxed(b"mett", &entry);

    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&entry_box);
    full(b"stsd", 0, 0, &body)
}

pub fn stsd_text() -> Vec<u8> {
    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&boxed(b"text", &[0u8; 8]));
    full(b"stsd", 0, 0, &body)
}

pub fn container(typ: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    boxed(typ, &concat(children))
}

pub fn moov(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"moov", children)
}

pub fn trak(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"trak", children)
}

pub fn mdia(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"mdia", children)
}

pub fn minf(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"minf", children)
}

pub fn stbl(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"stbl", children)
}

pub fn udta(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"udta", children)
}

/// QuickTime `meta` under `udta`: version & flags precede the children.
pub fn meta_qt(children: &[Vec<u8>]) -> Vec<u8> {
    full(b"meta", 0, 0, &concat(children))
}

/// ISO `meta` under `moov`: children follow the header directly.
pub fn meta_iso(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"meta", children)
}

pub fn keys(entries: &[&str]) -> Vec<u8> {
    let mut body = (entries.len() as u32).to_be_bytes().to_vec();
    for key in entries {
        body.extend_from_slice(&(key.len() as u32 + 8).to_be_bytes());
        body.extend_from_slice(b"mdta");
        body.extend_from_slice(key.as_bytes());
    }
    full(b"keys", 0, 0, &body)
}

pub fn ilst(children: &[Vec<u8>]) -> Vec<u8> {
    container(b"ilst", children)
}

/// Tag wrapper whose single child is a `data` box.
pub fn tag(fourcc: [u8; 4], data_box: Vec<u8>) -> Vec<u8> {
    boxed(&fourcc, &data_box)
}

/// Tag wrapper keyed by a 1-based `keys` index.
pub fn index_tag(index: u32, data_box: Vec<u8>) -> Vec<u8> {
    boxed(&index.to_be_bytes(), &data_box)
}

pub fn data_utf8(value: &str) -> Vec<u8> {
    let mut p = vec![0, 0, 0, 1]; // version & class
    p.extend_from_slice(&[0u8; 4]); // reserved
    p.extend_from_slice(value.as_bytes());
    boxed(b"data", &p)
}

pub fn data_image(class: u8, bytes: &[u8]) -> Vec<u8> {
    let mut p = vec![0, 0, 0, class];
    p.extend_from_slice(&[0u8; 4]);
    p.extend_from_slice(bytes);
    boxed(b"data", &p)
}

pub fn xyz(value: &str) -> Vec<u8> {
    let mut p = (value.len() as u16).to_be_bytes().to_vec();
    p.extend_from_slice(&0x15c7u16.to_be_bytes()); // language code
    p.extend_from_slice(value.as_bytes());
    boxed(&[0xa9, b'x', b'y', b'z'], &p)
}

pub fn mdat(payload: &[u8]) -> Vec<u8> {
    boxed(b"mdat", payload)
}
