use std::fmt;

use serde::Serialize;

/// Four-character box/atom type code.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn from_u32(v: u32) -> Self {
        FourCC(v.to_be_bytes())
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str_lossy())
    }
}

/// One parsed box header.
#[derive(Debug, Clone)]
pub struct BoxHeader {
    /// Total size including header, or 0 = extends to end of file.
    pub size: u64,
    /// 4CC, or b"uuid" for extended types.
    pub typ: FourCC,
    pub uuid: Option<[u8; 16]>,
    /// 8, 16, 24 or 32 bytes depending on largesize/uuid.
    pub header_size: u64,
    /// File offset of the header start.
    pub start: u64,
}

/// `ftyp` contents, recorded for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct FileType {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

pub const UUID: FourCC = FourCC(*b"uuid");
pub const FTYP: FourCC = FourCC(*b"ftyp");
pub const MOOV: FourCC = FourCC(*b"moov");
pub const UDTA: FourCC = FourCC(*b"udta");
pub const MVHD: FourCC = FourCC(*b"mvhd");
pub const TRAK: FourCC = FourCC(*b"trak");
pub const TKHD: FourCC = FourCC(*b"tkhd");
pub const TREF: FourCC = FourCC(*b"tref");
pub const MDIA: FourCC = FourCC(*b"mdia");
pub const MDHD: FourCC = FourCC(*b"mdhd");
pub const HDLR: FourCC = FourCC(*b"hdlr");
pub const MINF: FourCC = FourCC(*b"minf");
pub const VMHD: FourCC = FourCC(*b"vmhd");
pub const SMHD: FourCC = FourCC(*b"smhd");
pub const HMHD: FourCC = FourCC(*b"hmhd");
pub const NMHD: FourCC = FourCC(*b"nmhd");
pub const DINF: FourCC = FourCC(*b"dinf");
pub const STBL: FourCC = FourCC(*b"stbl");
pub const STSD: FourCC = FourCC(*b"stsd");
pub const AVCC: FourCC = FourCC(*b"avcC");
pub const STTS: FourCC = FourCC(*b"stts");
pub const STSS: FourCC = FourCC(*b"stss");
pub const STSZ: FourCC = FourCC(*b"stsz");
pub const STSC: FourCC = FourCC(*b"stsc");
pub const STCO: FourCC = FourCC(*b"stco");
pub const CO64: FourCC = FourCC(*b"co64");
pub const META: FourCC = FourCC(*b"meta");
pub const KEYS: FourCC = FourCC(*b"keys");
pub const ILST: FourCC = FourCC(*b"ilst");
pub const DATA: FourCC = FourCC(*b"data");
/// QuickTime location atom, `\u{a9}xyz`.
pub const LOCATION: FourCC = FourCC([0xa9, b'x', b'y', b'z']);

pub const HANDLER_VIDEO: FourCC = FourCC(*b"vide");
pub const HANDLER_AUDIO: FourCC = FourCC(*b"soun");
pub const HANDLER_HINT: FourCC = FourCC(*b"hint");
pub const HANDLER_METADATA: FourCC = FourCC(*b"meta");
pub const HANDLER_TEXT: FourCC = FourCC(*b"text");

pub const REFERENCE_DESCRIPTION: FourCC = FourCC(*b"cdsc");
pub const REFERENCE_CHAPTERS: FourCC = FourCC(*b"chap");

pub const SAMPLE_ENTRY_AAC: FourCC = FourCC(*b"mp4a");
