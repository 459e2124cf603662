//! Container-level metadata: QuickTime `udta` tags, ISO `meta`/`keys`
//! indexed tags, the `©xyz` location atom and cover art.

use serde::Serialize;

use crate::boxes::FourCC;

/// Payload class values carried by `ilst` `data` boxes.
pub(crate) const CLASS_UTF8: u32 = 1;
pub(crate) const CLASS_JPEG: u32 = 13;
pub(crate) const CLASS_PNG: u32 = 14;
pub(crate) const CLASS_BMP: u32 = 27;

/// Meta key whose `data` payload is the cover image.
pub(crate) const ARTWORK_KEY: &str = "com.apple.quicktime.artwork";

/// Known QuickTime tag atoms, low 24 bits (the high byte is `0xa9`).
const TAG_ARTIST: u32 = 0x0041_5254; // .ART
const TAG_TITLE: u32 = 0x006e_616d; // .nam
const TAG_DATE: u32 = 0x0064_6179; // .day
const TAG_COMMENT: u32 = 0x0063_6d74; // .cmt
const TAG_COPYRIGHT: u32 = 0x0063_7079; // .cpy
const TAG_MAKER: u32 = 0x006d_616b; // .mak
const TAG_MODEL: u32 = 0x006d_6f64; // .mod
const TAG_VERSION: u32 = 0x0073_7772; // .swr
const TAG_ENCODER: u32 = 0x0074_6f6f; // .too
pub(crate) const TAG_COVER: u32 = 0x636f_7672; // covr

/// Cover art payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverKind {
    Jpeg,
    Png,
    Bmp,
}

/// Location of a cover blob inside the file. The bytes are only read when
/// the consumer asks for them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoverRef {
    pub offset: u64,
    pub size: u32,
    pub kind: CoverKind,
}

/// Raw metadata gathered during parsing, before reconciliation.
#[derive(Debug, Default)]
pub(crate) struct MetadataBuffers {
    /// Parallel key/value pairs from `udta/meta/ilst` tag atoms.
    pub udta_keys: Vec<String>,
    pub udta_values: Vec<String>,
    /// `meta/keys` entries (1-based on disk) and their `ilst` values.
    pub meta_keys: Vec<String>,
    pub meta_values: Vec<String>,
    /// `©xyz` location, key and UTF-8 value.
    pub location: Option<(String, String)>,
    pub udta_cover: Option<CoverRef>,
    pub meta_cover: Option<CoverRef>,
}

/// Reconciled, string-keyed view handed to the consumer.
#[derive(Debug, Default)]
pub(crate) struct FinalMetadata {
    pub keys: Vec<String>,
    pub values: Vec<String>,
    pub cover: Option<CoverRef>,
}

/// Render a fourcc as a metadata key, widening each byte as a character so
/// the `0xa9` copyright marker survives.
pub(crate) fn fourcc_key(cc: FourCC) -> String {
    cc.0.iter().map(|&b| b as char).collect()
}

pub(crate) fn is_udta_tag(cc: FourCC) -> bool {
    matches!(
        cc.as_u32() & 0x00ff_ffff,
        TAG_ARTIST
            | TAG_TITLE
            | TAG_DATE
            | TAG_COMMENT
            | TAG_COPYRIGHT
            | TAG_MAKER
            | TAG_MODEL
            | TAG_VERSION
            | TAG_ENCODER
    )
}

/// Merge the two tag namespaces and the location atom: non-empty meta
/// entries first, then non-empty udta entries, then the location. The
/// cover prefers the meta namespace.
pub(crate) fn build_final(buf: &MetadataBuffers) -> FinalMetadata {
    let mut out = FinalMetadata::default();

    for (k, v) in buf.meta_keys.iter().zip(&buf.meta_values) {
        if !k.is_empty() && !v.is_empty() {
            out.keys.push(k.clone());
            out.values.push(v.clone());
        }
    }
    for (k, v) in buf.udta_keys.iter().zip(&buf.udta_values) {
        if !k.is_empty() && !v.is_empty() {
            out.keys.push(k.clone());
            out.values.push(v.clone());
        }
    }
    if let Some((k, v)) = &buf.location {
        if !k.is_empty() && !v.is_empty() {
            out.keys.push(k.clone());
            out.values.push(v.clone());
        }
    }

    out.cover = match buf.meta_cover {
        Some(c) if c.size > 0 => Some(c),
        _ => buf.udta_cover.filter(|c| c.size > 0),
    };

    out
}
