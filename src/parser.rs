//! Box-level parsing: budgeted payload reads, the box framer and the
//! recursive walker that dispatches each recognized type.

use byteorder::{BigEndian, ReadBytesExt};
use log::debug;
use std::io::{Read, Seek, SeekFrom};

use crate::boxes::{self, BoxHeader, FileType, FourCC};
use crate::error::{Error, Result};
use crate::metadata::{
    self, ARTWORK_KEY, CLASS_BMP, CLASS_JPEG, CLASS_PNG, CLASS_UTF8, CoverKind, CoverRef,
    MetadataBuffers, TAG_COVER,
};
use crate::track::{
    AudioCodec, SampleToChunkEntry, TimeToSampleEntry, Track, TrackKind, VideoCodec,
};

/// Budgeted big-endian reads over one box payload.
///
/// Every read counts against the payload budget of the enclosing box;
/// reading past it is a [`Error::MalformedSize`]. [`BoxCursor::finish`]
/// seeks past whatever the parser did not consume.
pub(crate) struct BoxCursor<'a, R> {
    r: &'a mut R,
    typ: FourCC,
    budget: u64,
    read: u64,
}

impl<'a, R: Read + Seek> BoxCursor<'a, R> {
    pub(crate) fn new(r: &'a mut R, typ: FourCC, budget: u64) -> Self {
        BoxCursor { r, typ, budget, read: 0 }
    }

    /// Minimum-size precondition on the whole payload.
    fn require(&self, total: u64) -> Result<()> {
        if self.budget < total {
            return Err(Error::MalformedSize { typ: self.typ, need: total, got: self.budget });
        }
        Ok(())
    }

    fn ensure(&self, n: u64) -> Result<()> {
        if self.read + n > self.budget {
            return Err(Error::MalformedSize {
                typ: self.typ,
                need: self.read + n,
                got: self.budget,
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.r.read_u8()?;
        self.read += 1;
        Ok(v)
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        let v = self.r.read_u16::<BigEndian>()?;
        self.read += 2;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let v = self.r.read_u32::<BigEndian>()?;
        self.read += 4;
        Ok(v)
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        let v = self.r.read_u64::<BigEndian>()?;
        self.read += 8;
        Ok(v)
    }

    fn read_fourcc(&mut self) -> Result<FourCC> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(FourCC(b))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure(buf.len() as u64)?;
        self.r.read_exact(buf)?;
        self.read += buf.len() as u64;
        Ok(())
    }

    /// One-byte version plus 24-bit flags.
    fn version_flags(&mut self) -> Result<(u8, u32)> {
        let v = self.read_u32()?;
        Ok((((v >> 24) & 0xff) as u8, v & 0x00ff_ffff))
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        self.ensure(n)?;
        if n > 0 {
            self.r.seek(SeekFrom::Current(n as i64))?;
            self.read += n;
        }
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.budget - self.read
    }

    fn stream_position(&mut self) -> Result<u64> {
        Ok(self.r.stream_position()?)
    }

    /// Seek past the unconsumed tail of the payload.
    fn finish(self) -> Result<()> {
        let rest = self.budget - self.read;
        if rest > 0 {
            self.r.seek(SeekFrom::Current(rest as i64))?;
        }
        Ok(())
    }
}

/// Read one box header: `size`, fourcc, optional 64-bit largesize and
/// optional 16-byte extended type.
pub fn read_box_header<R: Read + Seek>(r: &mut R) -> Result<BoxHeader> {
    let start = r.stream_position()?;
    let size32 = r.read_u32::<BigEndian>()?;
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ)?;
    let mut size = size32 as u64;

    if size32 == 1 {
        size = r.read_u64::<BigEndian>()?;
    }

    let mut uuid = None;
    if &typ == b"uuid" {
        let mut u = [0u8; 16];
        r.read_exact(&mut u)?;
        uuid = Some(u);
    }

    let header_size = match (size32 == 1, &typ == b"uuid") {
        (true, true) => 8 + 8 + 16,
        (true, false) => 8 + 8,
        (false, true) => 8 + 16,
        (false, false) => 8,
    } as u64;

    if size != 0 && size < header_size {
        return Err(Error::MalformedSize { typ: FourCC(typ), need: header_size, got: size });
    }

    Ok(BoxHeader { size, typ: FourCC(typ), uuid, header_size, start })
}

/// Movie-level state accumulated while walking the tree.
pub(crate) struct ParserState {
    pub file_size: u64,
    pub timescale: u32,
    pub duration: u64,
    pub creation_time: u64,
    pub modification_time: u64,
    pub tracks: Vec<Track>,
    pub file_type: Option<FileType>,
    pub meta: MetadataBuffers,
}

impl ParserState {
    pub(crate) fn new(file_size: u64) -> Self {
        ParserState {
            file_size,
            timescale: 0,
            duration: 0,
            creation_time: 0,
            modification_time: 0,
            tracks: Vec::new(),
            file_type: None,
            meta: MetadataBuffers::default(),
        }
    }
}

/// Context carried down the recursion instead of a materialized box tree:
/// the enclosing box, its parent, and the track being populated.
#[derive(Clone, Copy)]
pub(crate) struct Ctx {
    parent: FourCC,
    grandparent: FourCC,
    track: Option<usize>,
}

impl Ctx {
    pub(crate) fn root() -> Self {
        Ctx { parent: FourCC([0; 4]), grandparent: FourCC([0; 4]), track: None }
    }

    fn child(self, typ: FourCC) -> Self {
        Ctx { parent: typ, grandparent: self.parent, track: self.track }
    }
}

fn require_track(ctx: Ctx, typ: FourCC) -> Result<usize> {
    ctx.track
        .ok_or_else(|| Error::Protocol(format!("'{typ}' box outside a track")))
}

fn skip_forward<R: Read + Seek>(r: &mut R, n: u64) -> Result<()> {
    if n > 0 {
        r.seek(SeekFrom::Current(n as i64))?;
    }
    Ok(())
}

/// Walk one parent payload, dispatching every child box.
///
/// Returns the number of bytes consumed. Unknown types are skipped, a
/// child overrunning the parent budget is fatal.
pub(crate) fn parse_children<R: Read + Seek>(
    st: &mut ParserState,
    r: &mut R,
    budget: u64,
    ctx: Ctx,
) -> Result<u64> {
    let mut consumed = 0u64;

    while consumed + 8 <= budget {
        let h = read_box_header(r)?;

        if ctx.parent == boxes::ILST && h.size == 0 {
            return Err(Error::NotSupported("zero-sized box in an item list"));
        }

        let total = if h.size == 0 { st.file_size.saturating_sub(h.start) } else { h.size };
        let last_box = h.size == 0;

        if consumed + h.header_size > budget || total < h.header_size {
            return Err(Error::MalformedSize {
                typ: h.typ,
                need: consumed + h.header_size,
                got: budget,
            });
        }
        if consumed + total > budget {
            return Err(Error::MalformedSize { typ: h.typ, need: consumed + total, got: budget });
        }

        let payload = total - h.header_size;
        debug!("offset {:#x} box '{}' size {}", h.start, h.typ, total);

        match h.typ {
            boxes::MOOV | boxes::UDTA | boxes::MDIA | boxes::MINF | boxes::DINF | boxes::STBL
            | boxes::ILST => {
                let used = parse_children(st, r, payload, ctx.child(h.typ))?;
                skip_forward(r, payload - used)?;
            }
            boxes::TRAK => {
                st.tracks.push(Track::new());
                let mut child = ctx.child(h.typ);
                child.track = Some(st.tracks.len() - 1);
                let used = parse_children(st, r, payload, child)?;
                skip_forward(r, payload - used)?;
            }
            boxes::META if ctx.parent == boxes::UDTA => {
                // QuickTime form: version & flags precede the children.
                if payload < 4 {
                    return Err(Error::MalformedSize { typ: h.typ, need: 4, got: payload });
                }
                let mut vf = [0u8; 4];
                r.read_exact(&mut vf)?;
                let used = parse_children(st, r, payload - 4, ctx.child(h.typ))? + 4;
                skip_forward(r, payload - used)?;
            }
            boxes::META if ctx.parent == boxes::MOOV => {
                let used = parse_children(st, r, payload, ctx.child(h.typ))?;
                skip_forward(r, payload - used)?;
            }
            boxes::FTYP => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_ftyp(st, &mut cur)?;
                cur.finish()?;
            }
            boxes::MVHD => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_mvhd(st, &mut cur)?;
                cur.finish()?;
            }
            boxes::TKHD => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_tkhd(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::TREF => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_tref(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::MDHD => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_mdhd(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::HDLR => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_hdlr(st, &mut cur, ctx)?;
                cur.finish()?;
            }
            boxes::VMHD => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_vmhd(&mut cur)?;
                cur.finish()?;
            }
            boxes::SMHD => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_smhd(&mut cur)?;
                cur.finish()?;
            }
            boxes::HMHD => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_hmhd(&mut cur)?;
                cur.finish()?;
            }
            boxes::NMHD => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_nmhd(&mut cur)?;
                cur.finish()?;
            }
            boxes::STSD => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_stsd(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::STTS => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_stts(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::STSS => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_stss(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::STSZ => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_stsz(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::STSC => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_stsc(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::STCO => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_stco(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::CO64 => {
                let idx = require_track(ctx, h.typ)?;
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_co64(&mut st.tracks[idx], &mut cur)?;
                cur.finish()?;
            }
            boxes::KEYS if ctx.parent == boxes::META => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_keys(st, &mut cur)?;
                cur.finish()?;
            }
            boxes::DATA if ctx.grandparent == boxes::ILST => {
                // The tag key is the enclosing ilst child's fourcc.
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_data(st, &mut cur, ctx.parent)?;
                cur.finish()?;
            }
            boxes::LOCATION if ctx.parent == boxes::UDTA => {
                let mut cur = BoxCursor::new(r, h.typ, payload);
                parse_xyz(st, &mut cur)?;
                cur.finish()?;
            }
            boxes::KEYS | boxes::DATA => {
                skip_forward(r, payload)?;
            }
            _ if ctx.parent == boxes::ILST => {
                // Tag wrapper whose single child is a `data` box.
                let used = parse_children(st, r, payload, ctx.child(h.typ))?;
                skip_forward(r, payload - used)?;
            }
            _ => {
                skip_forward(r, payload)?;
            }
        }

        consumed += total;
        if last_box {
            break;
        }
    }

    Ok(consumed)
}

// ---------- leaf parsers ----------

fn parse_ftyp<R: Read + Seek>(st: &mut ParserState, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(8)?;

    let major_brand = cur.read_fourcc()?;
    let minor_version = cur.read_u32()?;
    let mut compatible_brands = Vec::new();
    while cur.remaining() >= 4 {
        compatible_brands.push(cur.read_fourcc()?);
    }
    debug!(
        "# ftyp: major_brand={} minor_version={} compatible={:?}",
        major_brand, minor_version, compatible_brands
    );

    st.file_type = Some(FileType { major_brand, minor_version, compatible_brands });
    Ok(())
}

fn parse_mvhd<R: Read + Seek>(st: &mut ParserState, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(25 * 4)?;

    let (version, _flags) = cur.version_flags()?;
    if version == 1 {
        cur.require(28 * 4)?;
        st.creation_time = cur.read_u64()?;
        st.modification_time = cur.read_u64()?;
        st.timescale = cur.read_u32()?;
        st.duration = cur.read_u64()?;
    } else {
        st.creation_time = cur.read_u32()? as u64;
        st.modification_time = cur.read_u32()? as u64;
        st.timescale = cur.read_u32()?;
        st.duration = cur.read_u32()? as u64;
    }
    debug!("# mvhd: timescale={} duration={}", st.timescale, st.duration);

    // rate, volume, matrix, pre_defined and next_track_ID are skipped.
    Ok(())
}

fn parse_tkhd<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(21 * 4)?;

    let (version, _flags) = cur.version_flags()?;
    if version == 1 {
        cur.require(24 * 4)?;
        cur.skip(16)?; // creation_time & modification_time
        track.id = cur.read_u32()?;
        cur.skip(4)?; // reserved
        cur.skip(8)?; // duration
    } else {
        cur.skip(8)?;
        track.id = cur.read_u32()?;
        cur.skip(4)?;
        cur.skip(4)?;
    }
    debug!("# tkhd: track_ID={}", track.id);

    // layer, volume, matrix, width and height are skipped.
    Ok(())
}

/// A `tref` is a container of typed sub-boxes whose payloads are track id
/// lists; the first entry supplies the reference kind and target.
fn parse_tref<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(3 * 4)?;

    while cur.remaining() >= 8 {
        let sub_size = cur.read_u32()? as u64;
        let sub_typ = cur.read_fourcc()?;
        if sub_size < 8 {
            return Err(Error::MalformedSize { typ: sub_typ, need: 8, got: sub_size });
        }
        let mut sub_payload = sub_size - 8;

        if track.reference_kind == 0 && sub_payload >= 4 {
            track.reference_kind = sub_typ.as_u32();
            track.reference_track_id = cur.read_u32()?;
            sub_payload -= 4;
            debug!(
                "# tref: reference_type={} track_id={}",
                sub_typ, track.reference_track_id
            );
        }
        cur.skip(sub_payload)?;
    }
    Ok(())
}

fn parse_mdhd<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(6 * 4)?;

    let (version, _flags) = cur.version_flags()?;
    if version == 1 {
        cur.require(9 * 4)?;
        track.creation_time = cur.read_u64()?;
        track.modification_time = cur.read_u64()?;
        track.timescale = cur.read_u32()?;
        track.duration = cur.read_u64()?;
    } else {
        track.creation_time = cur.read_u32()? as u64;
        track.modification_time = cur.read_u32()? as u64;
        track.timescale = cur.read_u32()?;
        track.duration = cur.read_u32()? as u64;
    }
    debug!("# mdhd: timescale={} duration={}", track.timescale, track.duration);

    // language & pre_defined are skipped.
    Ok(())
}

fn parse_hdlr<R: Read + Seek>(st: &mut ParserState, cur: &mut BoxCursor<R>, ctx: Ctx) -> Result<()> {
    cur.require(6 * 4)?;

    let (_version, _flags) = cur.version_flags()?;
    cur.skip(4)?; // pre_defined
    let handler_type = cur.read_fourcc()?;

    // Only the hdlr directly under mdia classifies the track.
    if ctx.parent == boxes::MDIA {
        if let Some(idx) = ctx.track {
            st.tracks[idx].kind = match handler_type {
                boxes::HANDLER_VIDEO => TrackKind::Video,
                boxes::HANDLER_AUDIO => TrackKind::Audio,
                boxes::HANDLER_HINT => TrackKind::Hint,
                boxes::HANDLER_METADATA => TrackKind::Metadata,
                boxes::HANDLER_TEXT => TrackKind::Text,
                _ => TrackKind::Unknown,
            };
        }
    }

    cur.skip(3 * 4)?; // reserved

    let name = read_bounded_cstring(cur)?;
    debug!("# hdlr: handler_type={} name=\"{}\"", handler_type, name);
    Ok(())
}

fn parse_vmhd<R: Read + Seek>(cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(3 * 4)?;
    let (_version, _flags) = cur.version_flags()?;
    let graphicsmode = cur.read_u16()?;
    let opcolor = [cur.read_u16()?, cur.read_u16()?, cur.read_u16()?];
    debug!("# vmhd: graphicsmode={} opcolor={:?}", graphicsmode, opcolor);
    Ok(())
}

fn parse_smhd<R: Read + Seek>(cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(2 * 4)?;
    let (_version, _flags) = cur.version_flags()?;
    let balance = (cur.read_u32()? >> 16) as i16;
    debug!("# smhd: balance={:.2}", balance as f32 / 256.0);
    Ok(())
}

fn parse_hmhd<R: Read + Seek>(cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(5 * 4)?;
    let (_version, _flags) = cur.version_flags()?;
    let max_pdu_size = cur.read_u16()?;
    let avg_pdu_size = cur.read_u16()?;
    let max_bitrate = cur.read_u32()?;
    let avg_bitrate = cur.read_u32()?;
    debug!(
        "# hmhd: maxPDUsize={} avgPDUsize={} maxbitrate={} avgbitrate={}",
        max_pdu_size, avg_pdu_size, max_bitrate, avg_bitrate
    );
    Ok(())
}

fn parse_nmhd<R: Read + Seek>(cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(4)?;
    let (version, flags) = cur.version_flags()?;
    debug!("# nmhd: version={} flags={}", version, flags);
    Ok(())
}

/// Bounded NUL-terminated string: stops at the terminator, a 99-byte cap
/// or the end of the payload, whichever comes first.
fn read_bounded_cstring<R: Read + Seek>(cur: &mut BoxCursor<R>) -> Result<String> {
    let mut bytes = Vec::new();
    while cur.remaining() > 0 && bytes.len() < 99 {
        let b = cur.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_stsd<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(8)?;

    let (_version, _flags) = cur.version_flags()?;
    let entry_count = cur.read_u32()?;
    debug!("# stsd: entry_count={}", entry_count);

    for _ in 0..entry_count {
        match track.kind {
            TrackKind::Video => {
                cur.require(102)?;
                let _entry_size = cur.read_u32()?;
                let entry_type = cur.read_fourcc()?;
                cur.skip(8)?; // reserved & data_reference_index
                cur.skip(16)?; // pre_defined & reserved
                track.video_width = cur.read_u16()? as u32;
                track.video_height = cur.read_u16()? as u32;
                cur.skip(12)?; // resolutions & reserved
                let _frame_count = cur.read_u16()?;
                cur.skip(32)?; // compressorname
                cur.skip(4)?; // depth & pre_defined
                let _codec_size = cur.read_u32()?;
                let codec = cur.read_fourcc()?;
                debug!(
                    "# stsd: entry={} codec={} {}x{}",
                    entry_type, codec, track.video_width, track.video_height
                );
                if codec == boxes::AVCC {
                    track.video_codec = VideoCodec::Avc;
                    parse_avcc(track, cur)?;
                }
            }
            TrackKind::Audio => {
                cur.require(44)?;
                let _entry_size = cur.read_u32()?;
                let entry_type = cur.read_fourcc()?;
                cur.skip(8)?; // reserved & data_reference_index
                cur.skip(8)?; // reserved
                track.audio_channel_count = cur.read_u16()? as u32;
                track.audio_sample_size = cur.read_u16()? as u32;
                cur.skip(4)?; // reserved
                track.audio_sample_rate = cur.read_u32()?;
                if entry_type == boxes::SAMPLE_ENTRY_AAC {
                    track.audio_codec = AudioCodec::Aac;
                }
                debug!(
                    "# stsd: entry={} channels={} samplerate={:.2}",
                    entry_type,
                    track.audio_channel_count,
                    track.audio_sample_rate as f32 / 65536.0
                );
            }
            TrackKind::Metadata => {
                cur.require(24)?;
                let _entry_size = cur.read_u32()?;
                let _entry_type = cur.read_fourcc()?;
                cur.skip(6)?; // reserved
                let _data_reference_index = cur.read_u16()?;
                let content_encoding = read_bounded_cstring(cur)?;
                let mime_format = read_bounded_cstring(cur)?;
                debug!(
                    "# stsd: content_encoding=\"{}\" mime_format=\"{}\"",
                    content_encoding, mime_format
                );
                if !content_encoding.is_empty() {
                    track.metadata_content_encoding = Some(content_encoding);
                }
                if !mime_format.is_empty() {
                    track.metadata_mime_format = Some(mime_format);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// AVC decoder configuration record. Keeps the first SPS and first PPS
/// verbatim, skips the rest.
fn parse_avcc<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    let _configuration_version = cur.read_u8()?;
    let _profile = cur.read_u8()?;
    let _profile_compat = cur.read_u8()?;
    let _level = cur.read_u8()?;
    let length_size = (cur.read_u8()? & 0x3) + 1;
    let sps_count = cur.read_u8()? & 0x1f;
    debug!("# avcC: length_size={} sps_count={}", length_size, sps_count);

    for _ in 0..sps_count {
        let sps_length = cur.read_u16()? as usize;
        if track.video_sps.is_empty() && sps_length > 0 {
            let mut sps = vec![0u8; sps_length];
            cur.read_exact(&mut sps)?;
            track.video_sps = sps;
        } else {
            cur.skip(sps_length as u64)?;
        }
    }

    let pps_count = cur.read_u8()?;
    debug!("# avcC: pps_count={}", pps_count);
    for _ in 0..pps_count {
        let pps_length = cur.read_u16()? as usize;
        if track.video_pps.is_empty() && pps_length > 0 {
            let mut pps = vec![0u8; pps_length];
            cur.read_exact(&mut pps)?;
            track.video_pps = pps;
        } else {
            cur.skip(pps_length as u64)?;
        }
    }
    Ok(())
}

fn parse_stts<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    if track.time_to_sample.is_some() {
        return Err(Error::DuplicateTable(boxes::STTS));
    }
    cur.require(8)?;

    let (_version, _flags) = cur.version_flags()?;
    let entry_count = cur.read_u32()?;
    cur.require(8 + entry_count as u64 * 8)?;

    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(TimeToSampleEntry {
            sample_count: cur.read_u32()?,
            sample_delta: cur.read_u32()?,
        });
    }
    debug!("# stts: entry_count={}", entry_count);
    track.time_to_sample = Some(entries);
    Ok(())
}

fn parse_stss<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    if track.sync_sample.is_some() {
        return Err(Error::DuplicateTable(boxes::STSS));
    }
    cur.require(8)?;

    let (_version, _flags) = cur.version_flags()?;
    let entry_count = cur.read_u32()?;
    cur.require(8 + entry_count as u64 * 4)?;

    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(cur.read_u32()?);
    }
    debug!("# stss: entry_count={}", entry_count);
    track.sync_sample = Some(entries);
    Ok(())
}

fn parse_stsz<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    if track.sample_size_present {
        return Err(Error::DuplicateTable(boxes::STSZ));
    }
    cur.require(12)?;

    let (_version, _flags) = cur.version_flags()?;
    let constant_size = cur.read_u32()?;
    let sample_count = cur.read_u32()?;
    debug!("# stsz: sample_size={} sample_count={}", constant_size, sample_count);

    track.sample_count = sample_count;
    if constant_size == 0 {
        cur.require(12 + sample_count as u64 * 4)?;
        let mut sizes = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            sizes.push(cur.read_u32()?);
        }
        track.sample_size = sizes;
    } else {
        track.sample_size = vec![constant_size; sample_count as usize];
    }
    track.sample_size_present = true;
    Ok(())
}

fn parse_stsc<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    if track.sample_to_chunk.is_some() {
        return Err(Error::DuplicateTable(boxes::STSC));
    }
    cur.require(8)?;

    let (_version, _flags) = cur.version_flags()?;
    let entry_count = cur.read_u32()?;
    cur.require(8 + entry_count as u64 * 12)?;

    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(SampleToChunkEntry {
            first_chunk: cur.read_u32()?,
            samples_per_chunk: cur.read_u32()?,
            sample_description_index: cur.read_u32()?,
        });
    }
    debug!("# stsc: entry_count={}", entry_count);
    track.sample_to_chunk = Some(entries);
    Ok(())
}

fn parse_stco<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    if track.chunk_offset.is_some() {
        return Err(Error::DuplicateTable(boxes::STCO));
    }
    cur.require(8)?;

    let (_version, _flags) = cur.version_flags()?;
    let entry_count = cur.read_u32()?;
    cur.require(8 + entry_count as u64 * 4)?;

    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(cur.read_u32()? as u64);
    }
    debug!("# stco: entry_count={}", entry_count);
    track.chunk_offset = Some(offsets);
    Ok(())
}

fn parse_co64<R: Read + Seek>(track: &mut Track, cur: &mut BoxCursor<R>) -> Result<()> {
    if track.chunk_offset.is_some() {
        return Err(Error::DuplicateTable(boxes::CO64));
    }
    cur.require(8)?;

    let (_version, _flags) = cur.version_flags()?;
    let entry_count = cur.read_u32()?;
    cur.require(8 + entry_count as u64 * 8)?;

    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(cur.read_u64()?);
    }
    debug!("# co64: entry_count={}", entry_count);
    track.chunk_offset = Some(offsets);
    Ok(())
}

/// `keys` box under an ISO `meta`: sizes the parallel key/value arrays,
/// values are filled later by the `ilst` children.
fn parse_keys<R: Read + Seek>(st: &mut ParserState, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(8)?;

    let (_version, _flags) = cur.version_flags()?;
    let entry_count = cur.read_u32()?;
    cur.require(4 + entry_count as u64 * 8)?;
    debug!("# keys: entry_count={}", entry_count);

    let mut keys = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let key_size = cur.read_u32()?;
        if key_size < 8 {
            return Err(Error::MalformedSize { typ: boxes::KEYS, need: 8, got: key_size as u64 });
        }
        let _key_namespace = cur.read_fourcc()?;
        let mut value = vec![0u8; (key_size - 8) as usize];
        cur.read_exact(&mut value)?;
        keys.push(String::from_utf8_lossy(&value).into_owned());
    }

    st.meta.meta_values = vec![String::new(); keys.len()];
    st.meta.meta_keys = keys;
    Ok(())
}

/// `data` box inside an `ilst` child; `tag` is the grandparent fourcc
/// (a QuickTime tag atom, or a 1-based index into the `keys` list).
fn parse_data<R: Read + Seek>(
    st: &mut ParserState,
    cur: &mut BoxCursor<R>,
    tag: FourCC,
) -> Result<()> {
    cur.require(9)?;

    let class = cur.read_u32()? & 0xff;
    cur.skip(4)?; // reserved
    let value_len = cur.remaining();

    match class {
        CLASS_UTF8 => {
            if metadata::is_udta_tag(tag) {
                let mut value = vec![0u8; value_len as usize];
                cur.read_exact(&mut value)?;
                let value = String::from_utf8_lossy(&value).into_owned();
                debug!("# data: value[{}]={}", metadata::fourcc_key(tag), value);
                st.meta.udta_keys.push(metadata::fourcc_key(tag));
                st.meta.udta_values.push(value);
            } else {
                let index = tag.as_u32();
                if index >= 1 && (index as usize) <= st.meta.meta_keys.len() {
                    let mut value = vec![0u8; value_len as usize];
                    cur.read_exact(&mut value)?;
                    let value = String::from_utf8_lossy(&value).into_owned();
                    debug!("# data: value[{}]={}", st.meta.meta_keys[index as usize - 1], value);
                    st.meta.meta_values[index as usize - 1] = value;
                }
                // Indices past the key list are ignored.
            }
        }
        CLASS_JPEG | CLASS_PNG | CLASS_BMP => {
            let kind = match class {
                CLASS_PNG => CoverKind::Png,
                CLASS_BMP => CoverKind::Bmp,
                _ => CoverKind::Jpeg,
            };
            let offset = cur.stream_position()?;
            if tag.as_u32() == TAG_COVER {
                debug!("# data: udta cover offset={:#x} size={}", offset, value_len);
                st.meta.udta_cover = Some(CoverRef { offset, size: value_len as u32, kind });
            } else {
                let index = tag.as_u32();
                if index >= 1
                    && (index as usize) <= st.meta.meta_keys.len()
                    && st.meta.meta_keys[index as usize - 1] == ARTWORK_KEY
                {
                    debug!("# data: meta cover offset={:#x} size={}", offset, value_len);
                    st.meta.meta_cover = Some(CoverRef { offset, size: value_len as u32, kind });
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// QuickTime `©xyz` location atom under `udta`.
fn parse_xyz<R: Read + Seek>(st: &mut ParserState, cur: &mut BoxCursor<R>) -> Result<()> {
    cur.require(4)?;

    let location_size = cur.read_u16()? as u64;
    let _language_code = cur.read_u16()?;
    cur.require(4 + location_size)?;

    let mut value = vec![0u8; location_size as usize];
    cur.read_exact(&mut value)?;
    let value = String::from_utf8_lossy(&value).into_owned();
    debug!("# xyz: location={}", value);

    st.meta.location = Some((metadata::fourcc_key(boxes::LOCATION), value));
    Ok(())
}
