use clap::Parser;
use mp4demux::{Demux, SampleInfo};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "mp4samples", about = "Print per-sample timing and size information")]
struct Args {
    /// Input MP4 file
    input: String,

    /// Only this track id (default: all tracks)
    #[arg(long)]
    track_id: Option<u32>,

    /// Seek to this time (microseconds) before iterating
    #[arg(long)]
    seek_us: Option<u64>,

    /// Require sync samples when seeking
    #[arg(long)]
    sync: bool,

    /// Limit the number of samples printed per track
    #[arg(long)]
    limit: Option<usize>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct TrackSamples {
    track_id: u32,
    kind: mp4demux::TrackKind,
    samples: Vec<SampleInfo>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut demux = Demux::open(&args.input)?;

    if let Some(seek_us) = args.seek_us {
        demux.seek(seek_us, args.sync)?;
    }

    let selected: Vec<(u32, mp4demux::TrackKind)> = demux
        .tracks()
        .iter()
        .filter(|t| args.track_id.is_none_or(|id| id == t.id))
        .map(|t| (t.id, t.kind))
        .collect();

    let mut output = Vec::new();
    for (track_id, kind) in selected {
        let mut samples = Vec::new();
        loop {
            if args.limit.is_some_and(|n| samples.len() >= n) {
                break;
            }
            let sample = demux.next_sample(track_id, None, None)?;
            if sample.sample_size == 0 {
                break;
            }
            samples.push(sample);
        }
        output.push(TrackSamples { track_id, kind, samples });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for track in &output {
            println!("Track {} ({:?}): {} samples", track.track_id, track.kind, track.samples.len());
            for (i, s) in track.samples.iter().enumerate() {
                println!(
                    "  #{:<6} {:>10} bytes  dts {:>12} us  next {:>12} us",
                    i, s.sample_size, s.sample_dts_us, s.next_sample_dts_us
                );
            }
        }
    }

    Ok(())
}
