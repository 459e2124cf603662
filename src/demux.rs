//! The demuxer itself: opens a file, walks the box tree, builds the
//! per-track sample index and answers navigation queries.

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::boxes::FileType;
use crate::error::{Error, Result};
use crate::metadata::{self, CoverKind, FinalMetadata};
use crate::parser::{Ctx, ParserState, parse_children};
use crate::track::{
    AudioCodec, Track, TrackKind, VideoCodec, build_sample_index, link_tracks,
};
use crate::util::{mac_to_unix, ticks_to_us, us_to_ticks};

/// Chapter lists are capped at this many entries.
pub const CHAPTERS_MAX: usize = 100;

/// One chapter marker from the chapter text track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub time_us: u64,
    pub name: String,
}

/// Movie-level summary.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MediaInfo {
    pub duration_us: u64,
    /// Unix seconds.
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VideoInfo {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AudioInfo {
    pub codec: AudioCodec,
    pub channel_count: u32,
    pub sample_size: u32,
    pub sample_rate: f32,
}

/// Per-track descriptor returned by [`Demux::track_info`].
#[derive(Debug, Clone, Serialize)]
pub struct TrackInfo {
    pub id: u32,
    pub kind: TrackKind,
    pub duration_us: u64,
    /// Unix seconds.
    pub creation_time: u64,
    pub modification_time: u64,
    pub sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInfo>,
    pub has_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_mime_format: Option<String>,
}

/// Result of one [`Demux::next_sample`] call. All-zero past end of track.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SampleInfo {
    pub sample_size: u32,
    pub metadata_size: u32,
    pub sample_dts_us: u64,
    pub next_sample_dts_us: u64,
}

/// An open MP4/MOV file with its parsed movie model.
///
/// All parsing happens in [`Demux::open`] / [`Demux::from_reader`]; after
/// that only the per-track navigation cursors change. The file handle is
/// owned for the lifetime of the demuxer and released on drop.
pub struct Demux<R> {
    r: R,
    file_size: u64,
    timescale: u32,
    duration: u64,
    creation_time: u64,
    modification_time: u64,
    tracks: Vec<Track>,
    file_type: Option<FileType>,
    chapters: Vec<Chapter>,
    metadata: FinalMetadata,
}

impl Demux<BufReader<File>> {
    /// Open and fully parse the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("empty path"));
        }
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> Demux<R> {
    /// Parse a movie from any seekable byte source.
    pub fn from_reader(mut r: R) -> Result<Self> {
        let file_size = r.seek(SeekFrom::End(0))?;
        r.seek(SeekFrom::Start(0))?;

        let mut st = ParserState::new(file_size);
        parse_children(&mut st, &mut r, file_size, Ctx::root())?;

        for track in &mut st.tracks {
            build_sample_index(track)?;
        }
        link_tracks(&mut st.tracks);

        let chapters = read_chapters(&mut r, &st.tracks)?;
        let metadata = metadata::build_final(&st.meta);

        Ok(Demux {
            r,
            file_size,
            timescale: st.timescale,
            duration: st.duration,
            creation_time: st.creation_time,
            modification_time: st.modification_time,
            tracks: st.tracks,
            file_type: st.file_type,
            chapters,
            metadata,
        })
    }

    pub fn media_info(&self) -> MediaInfo {
        MediaInfo {
            duration_us: ticks_to_us(self.duration, self.timescale),
            creation_time: mac_to_unix(self.creation_time),
            modification_time: mac_to_unix(self.modification_time),
            track_count: self.tracks.len() as u32,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// `ftyp` contents, when the file carried one.
    pub fn file_type(&self) -> Option<&FileType> {
        self.file_type.as_ref()
    }

    pub fn track_info(&self, track_idx: usize) -> Result<TrackInfo> {
        let track = self
            .tracks
            .get(track_idx)
            .ok_or(Error::InvalidArgument("track index out of range"))?;

        let video = (track.kind == TrackKind::Video).then(|| VideoInfo {
            codec: track.video_codec,
            width: track.video_width,
            height: track.video_height,
        });
        let audio = (track.kind == TrackKind::Audio).then(|| AudioInfo {
            codec: track.audio_codec,
            channel_count: track.audio_channel_count,
            sample_size: track.audio_sample_size,
            sample_rate: track.audio_sample_rate as f32 / 65536.0,
        });

        // A media track reports its linked metadata track's strings, a
        // metadata track its own.
        let (metadata_content_encoding, metadata_mime_format) =
            if let Some(mi) = track.metadata_track {
                let m = &self.tracks[mi];
                (m.metadata_content_encoding.clone(), m.metadata_mime_format.clone())
            } else if track.kind == TrackKind::Metadata {
                (track.metadata_content_encoding.clone(), track.metadata_mime_format.clone())
            } else {
                (None, None)
            };

        Ok(TrackInfo {
            id: track.id,
            kind: track.kind,
            duration_us: ticks_to_us(track.duration, track.timescale),
            creation_time: mac_to_unix(track.creation_time),
            modification_time: mac_to_unix(track.modification_time),
            sample_count: track.sample_count,
            video,
            audio,
            has_metadata: track.metadata_track.is_some(),
            metadata_content_encoding,
            metadata_mime_format,
        })
    }

    /// Borrowed SPS and PPS blobs for an AVC track; empty when absent.
    pub fn avc_decoder_config(&self, track_id: u32) -> Result<(&[u8], &[u8])> {
        let track = self
            .tracks
            .iter()
            .find(|t| t.id == track_id)
            .ok_or(Error::NotFound)?;
        Ok((&track.video_sps, &track.video_pps))
    }

    /// Move every track's cursor to the sample covering `time_us`.
    ///
    /// With `require_sync`, falls back to the nearest earlier sync sample.
    /// Chapter tracks and metadata tracks follow their reference track.
    pub fn seek(&mut self, time_us: u64, require_sync: bool) -> Result<()> {
        for i in 0..self.tracks.len() {
            let track = &self.tracks[i];
            if track.kind == TrackKind::Chapters {
                continue;
            }
            if track.kind == TrackKind::Metadata && track.ref_track.is_some() {
                continue;
            }
            if track.sample_count == 0 {
                return Err(Error::NotFound);
            }

            let ts = us_to_ticks(time_us, track.timescale);
            let count = track.sample_count as u64;

            // Proportional estimate, then settle on the exact sample.
            let mut start = if track.duration == 0 {
                0
            } else {
                (count * ts).div_ceil(track.duration)
            };
            if start >= count {
                start = count - 1;
            }
            while start < count && track.sample_decoding_time[start as usize] < ts {
                start += 1;
            }
            if start >= count {
                start = count - 1;
            }

            let mut found = None;
            for idx in (0..=start as usize).rev() {
                if track.sample_decoding_time[idx] > ts {
                    continue;
                }
                let (is_sync, prev_sync) = track.is_sync_sample(idx as u32);
                if is_sync || !require_sync {
                    found = Some(idx as u32);
                    break;
                }
                if let Some(prev) = prev_sync {
                    found = Some(prev);
                    break;
                }
            }

            let Some(sample) = found else {
                return Err(Error::NotFound);
            };

            let found_dts = self.tracks[i].sample_decoding_time[sample as usize];
            self.tracks[i].current_sample = sample;
            debug!(
                "seek to {} -> sample #{} time {}",
                time_us,
                sample,
                ticks_to_us(found_dts, self.tracks[i].timescale)
            );

            if let Some(mi) = self.tracks[i].metadata_track {
                let in_sync = (sample as usize) < self.tracks[mi].sample_decoding_time.len()
                    && self.tracks[mi].sample_decoding_time[sample as usize] == found_dts;
                if in_sync {
                    self.tracks[mi].current_sample = sample;
                } else {
                    warn!("failed to sync metadata with ref track");
                }
            }
        }

        Ok(())
    }

    /// Return the current sample of `track_id` and advance the cursor.
    ///
    /// Payload bytes are copied into the buffers when provided and large
    /// enough; a provided-but-small buffer is [`Error::BufferTooSmall`].
    /// Past the end of the track, a zero-valued [`SampleInfo`] is returned
    /// and nothing is read.
    pub fn next_sample(
        &mut self,
        track_id: u32,
        sample_buf: Option<&mut [u8]>,
        metadata_buf: Option<&mut [u8]>,
    ) -> Result<SampleInfo> {
        let ti = self
            .tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or(Error::NotFound)?;

        let cur = self.tracks[ti].current_sample as usize;
        if cur >= self.tracks[ti].sample_count as usize {
            return Ok(SampleInfo::default());
        }

        let sample_size = self.tracks[ti].sample_size[cur];
        if let Some(buf) = sample_buf {
            if buf.len() < sample_size as usize {
                return Err(Error::BufferTooSmall {
                    needed: sample_size as usize,
                    provided: buf.len(),
                });
            }
            self.r.seek(SeekFrom::Start(self.tracks[ti].sample_offset[cur]))?;
            self.r.read_exact(&mut buf[..sample_size as usize])?;
        }

        let mut metadata_size = 0u32;
        if let Some(mi) = self.tracks[ti].metadata_track {
            // The metadata track is indexed by the reference track's cursor.
            if cur < self.tracks[mi].sample_size.len() {
                metadata_size = self.tracks[mi].sample_size[cur];
                if let Some(buf) = metadata_buf {
                    if buf.len() < metadata_size as usize {
                        return Err(Error::BufferTooSmall {
                            needed: metadata_size as usize,
                            provided: buf.len(),
                        });
                    }
                    self.r.seek(SeekFrom::Start(self.tracks[mi].sample_offset[cur]))?;
                    self.r.read_exact(&mut buf[..metadata_size as usize])?;
                }
            }
        }

        let track = &self.tracks[ti];
        let sample_dts_us = ticks_to_us(track.sample_decoding_time[cur], track.timescale);
        let next_sample_dts_us = if cur + 1 < track.sample_count as usize {
            ticks_to_us(track.sample_decoding_time[cur + 1], track.timescale)
        } else {
            0
        };

        self.tracks[ti].current_sample += 1;

        Ok(SampleInfo { sample_size, metadata_size, sample_dts_us, next_sample_dts_us })
    }

    /// Chapter markers, in file order, capped at [`CHAPTERS_MAX`].
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// The merged metadata view: parallel key and value slices.
    pub fn metadata_strings(&self) -> (&[String], &[String]) {
        (&self.metadata.keys, &self.metadata.values)
    }

    /// Size and format of the selected cover art, copying the bytes when a
    /// large-enough buffer is provided. `None` when the file has no cover.
    pub fn metadata_cover(&mut self, buf: Option<&mut [u8]>) -> Result<Option<(u32, CoverKind)>> {
        let Some(cover) = self.metadata.cover else {
            return Ok(None);
        };

        if let Some(buf) = buf {
            if buf.len() < cover.size as usize {
                return Err(Error::BufferTooSmall {
                    needed: cover.size as usize,
                    provided: buf.len(),
                });
            }
            self.r.seek(SeekFrom::Start(cover.offset))?;
            self.r.read_exact(&mut buf[..cover.size as usize])?;
        }
        Ok(Some((cover.size, cover.kind)))
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

/// Decode every sample of the chapters track as `[len_u16][utf-8 name]`.
fn read_chapters<R: Read + Seek>(r: &mut R, tracks: &[Track]) -> Result<Vec<Chapter>> {
    let Some(chap) = tracks.iter().find(|t| t.kind == TrackKind::Chapters) else {
        return Ok(Vec::new());
    };

    let mut chapters = Vec::new();
    for i in 0..chap.sample_count as usize {
        if chapters.len() >= CHAPTERS_MAX {
            break;
        }
        r.seek(SeekFrom::Start(chap.sample_offset[i]))?;
        let name_len = r.read_u16::<BigEndian>()? as u32;
        if name_len + 2 <= chap.sample_size[i] {
            let mut name = vec![0u8; name_len as usize];
            r.read_exact(&mut name)?;
            let name = String::from_utf8_lossy(&name).into_owned();
            let time_us = ticks_to_us(chap.sample_decoding_time[i], chap.timescale);
            debug!("chapter #{} time={} '{}'", chapters.len() + 1, time_us, name);
            chapters.push(Chapter { time_us, name });
        }
    }
    Ok(chapters)
}
