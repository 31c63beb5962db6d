//! Process a directory of track files and keep a resumable checkpoint.
//!
//! Run with: cargo run --example batch_run -- <input-dir> [config.json]
//!
//! Re-running over a directory that gained new files only adds the new
//! tiles; everything else is picked up from the checkpoint.

use std::path::{Path, PathBuf};

use tile_clusters::{JsonTrackParser, ProcessorConfig, RunSummary, TrackParser, TrackProcessor};

fn run<P: TrackParser>(config: ProcessorConfig, parser: P, input: &Path) -> tile_clusters::Result<RunSummary> {
    TrackProcessor::resume(config, parser).run(input)
}

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("usage: batch_run <input-dir> [config.json]");
        std::process::exit(2);
    };

    let config = match args.next() {
        Some(path) => match ProcessorConfig::from_json_file(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        },
        None => ProcessorConfig::default(),
    };

    println!("Batch Run Example\n");
    println!("Input:      {}", input.display());
    println!("Checkpoint: {}", config.checkpoint_path.display());
    println!("Deltas:     {}", config.delta_dir.display());
    println!("Zoom:       {}\n", config.zoom);

    let result = match config.input_extension.as_deref() {
        #[cfg(feature = "gpx")]
        Some(ext) if ext.eq_ignore_ascii_case("gpx") => {
            run(config, tile_clusters::GpxTrackParser, &input)
        }
        _ => run(config, JsonTrackParser, &input),
    };

    match result {
        Ok(summary) => {
            println!("Files seen:       {}", summary.files_seen);
            println!("Tracks absorbed:  {}", summary.tracks_absorbed);
            println!("Tracks skipped:   {}", summary.tracks_skipped);
            println!("Deltas written:   {}", summary.deltas_written);
            println!("Payloads written: {}", summary.payloads_written);
            println!("Total tiles:      {}", summary.total_tiles);
            println!("Max cluster:      {}", summary.max_cluster_size);
        }
        Err(e) => {
            eprintln!("Run aborted: {}", e);
            std::process::exit(1);
        }
    }
}
