use clap::Parser;
use mp4demux::{Chapter, Demux, MediaInfo, TrackInfo};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(version, about = "Print MP4 media, track, chapter and tag information")]
struct Args {
    /// MP4/MOV file path
    path: String,

    /// Output as JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    major_brand: Option<String>,
    media: MediaInfo,
    tracks: Vec<TrackInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chapters: Vec<Chapter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    metadata_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    metadata_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<CoverSummary>,
}

#[derive(Debug, Serialize)]
struct CoverSummary {
    size: u32,
    kind: mp4demux::CoverKind,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut demux = Demux::open(&args.path)?;

    let mut tracks = Vec::new();
    for idx in 0..demux.track_count() {
        tracks.push(demux.track_info(idx)?);
    }

    let (keys, values) = demux.metadata_strings();
    let (keys, values) = (keys.to_vec(), values.to_vec());
    let chapters = demux.chapters().to_vec();
    let cover = demux
        .metadata_cover(None)?
        .map(|(size, kind)| CoverSummary { size, kind });

    let report = Report {
        file: args.path.clone(),
        major_brand: demux.file_type().map(|ft| ft.major_brand.to_string()),
        media: demux.media_info(),
        tracks,
        chapters,
        metadata_keys: keys,
        metadata_values: values,
        cover,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human(&report);
    }

    Ok(())
}

fn print_human(report: &Report) {
    println!("File: {}", report.file);
    if let Some(brand) = &report.major_brand {
        println!("Major brand: {}", brand);
    }
    println!(
        "Duration: {:.3} s, {} track(s)",
        report.media.duration_us as f64 / 1e6,
        report.media.track_count
    );

    for track in &report.tracks {
        let mut line = format!(
            "  Track {}: {:?}, {:.3} s, {} samples",
            track.id,
            track.kind,
            track.duration_us as f64 / 1e6,
            track.sample_count
        );
        if let Some(video) = &track.video {
            line.push_str(&format!(", {:?} {}x{}", video.codec, video.width, video.height));
        }
        if let Some(audio) = &track.audio {
            line.push_str(&format!(
                ", {:?} {} ch @ {:.0} Hz",
                audio.codec, audio.channel_count, audio.sample_rate
            ));
        }
        if let Some(mime) = &track.metadata_mime_format {
            line.push_str(&format!(", metadata {}", mime));
        }
        println!("{}", line);
    }

    if !report.chapters.is_empty() {
        println!("Chapters:");
        for chapter in &report.chapters {
            println!("  {:10.3} s  {}", chapter.time_us as f64 / 1e6, chapter.name);
        }
    }

    if !report.metadata_keys.is_empty() {
        println!("Metadata:");
        for (k, v) in report.metadata_keys.iter().zip(&report.metadata_values) {
            println!("  {} = {}", k, v);
        }
    }

    if let Some(cover) = &report.cover {
        println!("Cover: {} bytes ({:?})", cover.size, cover.kind);
    }
}
