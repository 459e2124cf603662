//! Per-track state: headers, compressed sample tables and the flat
//! per-sample index derived from them.

use serde::Serialize;

use crate::boxes::{REFERENCE_CHAPTERS, REFERENCE_DESCRIPTION};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Hint,
    Metadata,
    Text,
    Chapters,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Avc,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Unknown,
}

/// One `stts` run: `sample_count` samples, `sample_delta` ticks apart.
#[derive(Debug, Clone, Copy)]
pub struct TimeToSampleEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// One `stsc` run starting at the 1-based `first_chunk`.
#[derive(Debug, Clone, Copy)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// State of one elementary stream.
///
/// The compressed tables are filled by the box parsers; the flat
/// `sample_offset` / `sample_decoding_time` vectors are produced by
/// [`build_sample_index`] once the tree is complete.
#[derive(Debug)]
pub struct Track {
    pub id: u32,
    pub kind: TrackKind,
    /// Ticks per second for this track.
    pub timescale: u32,
    /// Duration in track ticks.
    pub duration: u64,
    /// Seconds since the Macintosh epoch.
    pub creation_time: u64,
    pub modification_time: u64,

    pub sample_count: u32,
    /// Per-sample byte size, materialized even for the constant case.
    pub sample_size: Vec<u32>,
    /// Per-sample absolute file offset.
    pub sample_offset: Vec<u64>,
    /// Per-sample decoding timestamp in track ticks.
    pub sample_decoding_time: Vec<u64>,

    pub(crate) time_to_sample: Option<Vec<TimeToSampleEntry>>,
    pub(crate) sample_to_chunk: Option<Vec<SampleToChunkEntry>>,
    pub(crate) chunk_offset: Option<Vec<u64>>,
    /// 1-based sync sample numbers; absent means every sample is sync.
    pub(crate) sync_sample: Option<Vec<u32>>,
    pub(crate) sample_size_present: bool,

    /// First `tref` entry, fourcc and target track id (0 = none).
    pub(crate) reference_kind: u32,
    pub(crate) reference_track_id: u32,
    /// Links resolved after parsing, as indices into the movie's tracks.
    pub(crate) ref_track: Option<usize>,
    pub(crate) metadata_track: Option<usize>,
    pub(crate) chapters_track: Option<usize>,

    pub video_codec: VideoCodec,
    pub video_width: u32,
    pub video_height: u32,
    pub(crate) video_sps: Vec<u8>,
    pub(crate) video_pps: Vec<u8>,

    pub audio_codec: AudioCodec,
    pub audio_channel_count: u32,
    pub audio_sample_size: u32,
    /// 16.16 fixed point, as stored on disk.
    pub audio_sample_rate: u32,

    pub metadata_content_encoding: Option<String>,
    pub metadata_mime_format: Option<String>,

    pub(crate) current_sample: u32,
}

impl Track {
    pub(crate) fn new() -> Self {
        Track {
            id: 0,
            kind: TrackKind::Unknown,
            timescale: 0,
            duration: 0,
            creation_time: 0,
            modification_time: 0,
            sample_count: 0,
            sample_size: Vec::new(),
            sample_offset: Vec::new(),
            sample_decoding_time: Vec::new(),
            time_to_sample: None,
            sample_to_chunk: None,
            chunk_offset: None,
            sync_sample: None,
            sample_size_present: false,
            reference_kind: 0,
            reference_track_id: 0,
            ref_track: None,
            metadata_track: None,
            chapters_track: None,
            video_codec: VideoCodec::Unknown,
            video_width: 0,
            video_height: 0,
            video_sps: Vec::new(),
            video_pps: Vec::new(),
            audio_codec: AudioCodec::Unknown,
            audio_channel_count: 0,
            audio_sample_size: 0,
            audio_sample_rate: 0,
            metadata_content_encoding: None,
            metadata_mime_format: None,
            current_sample: 0,
        }
    }

    /// 0-based position of the navigation cursor.
    pub fn current_sample(&self) -> u32 {
        self.current_sample
    }

    /// 1-based sync sample numbers; `None` means every sample is sync.
    pub fn sync_samples(&self) -> Option<&[u32]> {
        self.sync_sample.as_deref()
    }

    /// Whether `sample_idx` (0-based) is a sync sample, and the 0-based
    /// index of the nearest earlier sync sample when it is not.
    pub fn is_sync_sample(&self, sample_idx: u32) -> (bool, Option<u32>) {
        let Some(entries) = self.sync_sample.as_deref() else {
            return (true, None);
        };

        let mut prev = None;
        for &number in entries {
            let idx = number.saturating_sub(1);
            if idx == sample_idx {
                return (true, None);
            }
            if idx > sample_idx {
                return (false, prev);
            }
            prev = Some(idx);
        }
        (false, prev)
    }
}

/// Cross-join `stsc` × `stco`/`co64` × `stsz` into per-sample offsets and
/// accumulate `stts` deltas into per-sample decoding times.
pub(crate) fn build_sample_index(track: &mut Track) -> Result<()> {
    let stsc = track.sample_to_chunk.as_deref().unwrap_or(&[]);
    let chunk_offset = track.chunk_offset.as_deref().unwrap_or(&[]);
    let chunk_count = chunk_offset.len() as u32;

    // Pass 1: validate the chunk runs and check the implied sample count
    // against stsz.
    let mut last_first_chunk = 1u32;
    let mut last_samples_per_chunk = 0u32;
    let mut laid_out = 0u64;
    for entry in stsc {
        if entry.first_chunk < last_first_chunk || entry.first_chunk as u64 > chunk_count as u64 + 1
        {
            return Err(Error::Protocol(format!(
                "sample-to-chunk first_chunk {} out of range ({} chunks)",
                entry.first_chunk, chunk_count
            )));
        }
        let run = (entry.first_chunk - last_first_chunk) as u64;
        laid_out += run * last_samples_per_chunk as u64;
        last_first_chunk = entry.first_chunk;
        last_samples_per_chunk = entry.samples_per_chunk;
    }
    let run = (chunk_count as u64 + 1).saturating_sub(last_first_chunk as u64);
    laid_out += run * last_samples_per_chunk as u64;

    if laid_out != track.sample_count as u64 {
        return Err(Error::Protocol(format!(
            "sample count mismatch: {} from chunks vs. {} from sizes",
            laid_out, track.sample_count
        )));
    }

    // Pass 2: lay the offsets out, walking each chunk run.
    let mut offsets = Vec::with_capacity(track.sample_count as usize);
    let mut chunk_idx = 0usize;
    let mut n = 0usize;
    let mut lay_run = |run: u64, samples_per_chunk: u32| {
        for _ in 0..run {
            let mut offset_in_chunk = 0u64;
            for _ in 0..samples_per_chunk {
                offsets.push(chunk_offset[chunk_idx] + offset_in_chunk);
                offset_in_chunk += track.sample_size[n] as u64;
                n += 1;
            }
            chunk_idx += 1;
        }
    };
    last_first_chunk = 1;
    last_samples_per_chunk = 0;
    for entry in stsc {
        lay_run(
            (entry.first_chunk - last_first_chunk) as u64,
            last_samples_per_chunk,
        );
        last_first_chunk = entry.first_chunk;
        last_samples_per_chunk = entry.samples_per_chunk;
    }
    lay_run(
        (chunk_count as u64 + 1).saturating_sub(last_first_chunk as u64),
        last_samples_per_chunk,
    );
    track.sample_offset = offsets;

    // Decoding times from the stts runs.
    let stts = track.time_to_sample.as_deref().unwrap_or(&[]);
    let timed: u64 = stts.iter().map(|e| e.sample_count as u64).sum();
    if timed != track.sample_count as u64 {
        return Err(Error::Protocol(format!(
            "sample count mismatch: {} from time deltas vs. {} from sizes",
            timed, track.sample_count
        )));
    }

    let mut times = Vec::with_capacity(track.sample_count as usize);
    let mut ts = 0u64;
    for entry in stts {
        for _ in 0..entry.sample_count {
            times.push(ts);
            ts += entry.sample_delta as u64;
        }
    }
    track.sample_decoding_time = times;

    Ok(())
}

/// Resolve `tref` references into cross-indices and apply the lone
/// video + lone metadata fallback link.
pub(crate) fn link_tracks(tracks: &mut [Track]) {
    let mut video_count = 0;
    let mut audio_count = 0;
    let mut hint_count = 0;
    let mut metadata_count = 0;
    let mut video_idx = None;
    let mut metadata_idx = None;

    for i in 0..tracks.len() {
        match tracks[i].kind {
            TrackKind::Video => {
                video_count += 1;
                video_idx = Some(i);
            }
            TrackKind::Audio => audio_count += 1,
            TrackKind::Hint => hint_count += 1,
            TrackKind::Metadata => {
                metadata_count += 1;
                metadata_idx = Some(i);
            }
            _ => {}
        }

        if tracks[i].reference_kind == 0 || tracks[i].reference_track_id == 0 {
            continue;
        }
        let referenced_id = tracks[i].reference_track_id;
        let Some(target) = tracks.iter().position(|t| t.id == referenced_id) else {
            continue;
        };

        if tracks[i].reference_kind == REFERENCE_DESCRIPTION.as_u32()
            && tracks[i].kind == TrackKind::Metadata
        {
            tracks[target].metadata_track = Some(i);
            tracks[i].ref_track = Some(target);
        } else if tracks[i].reference_kind == REFERENCE_CHAPTERS.as_u32()
            && tracks[target].kind == TrackKind::Text
        {
            tracks[i].chapters_track = Some(target);
            tracks[target].ref_track = Some(i);
            tracks[target].kind = TrackKind::Chapters;
        }
    }

    // Lone video + lone metadata with no reference between them: link anyway.
    if video_count == 1 && metadata_count == 1 && audio_count == 0 && hint_count == 0 {
        let (vi, mi) = (video_idx.unwrap(), metadata_idx.unwrap());
        if tracks[vi].metadata_track.is_none() {
            tracks[vi].metadata_track = Some(mi);
            tracks[mi].ref_track = Some(vi);
        }
    }
}
