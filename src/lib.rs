//! ISO base media file format (MP4/MOV) demuxer.
//!
//! [`Demux::open`] parses the box tree, reconstructs each track's flat
//! sample index from the compressed `stsc`/`stco`/`stsz`/`stts` tables,
//! links reference tracks, extracts chapters, and merges the QuickTime
//! and ISO metadata namespaces. Navigation is sample-oriented:
//! [`Demux::seek`] and [`Demux::next_sample`] drive per-track cursors
//! over the index.
//!
//! ```no_run
//! use mp4demux::Demux;
//!
//! fn main() -> mp4demux::Result<()> {
//!     let mut demux = Demux::open("movie.mp4")?;
//!     let info = demux.media_info();
//!     println!("{} tracks, {} us", info.track_count, info.duration_us);
//!
//!     let track_id = demux.tracks()[0].id;
//!     let mut buf = vec![0u8; 1 << 20];
//!     loop {
//!         let sample = demux.next_sample(track_id, Some(&mut buf), None)?;
//!         if sample.sample_size == 0 {
//!             break;
//!         }
//!         println!("sample of {} bytes at {} us", sample.sample_size, sample.sample_dts_us);
//!     }
//!     Ok(())
//! }
//! ```

pub mod boxes;
pub mod demux;
pub mod error;
pub mod metadata;
pub mod parser;
pub mod track;
pub mod util;

pub use boxes::{BoxHeader, FileType, FourCC};
pub use demux::{
    CHAPTERS_MAX, Chapter, Demux, MediaInfo, SampleInfo, TrackInfo,
};
pub use error::{Error, Result};
pub use metadata::CoverKind;
pub use parser::read_box_header;
pub use track::{AudioCodec, Track, TrackKind, VideoCodec};
