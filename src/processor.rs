//! # Batch Track Processing
//!
//! Feeds a directory of track files through the incremental cluster engine
//! and keeps the on-disk state current:
//!
//! 1. Resume from the last checkpoint (or start empty)
//! 2. Enumerate input files lazily, in name order
//! 3. Parse each track, map its points to tiles and classify on the warm path
//! 4. Write a delta record for every track that contributed new tiles
//! 5. Write a geometry payload whenever the max cluster grows
//! 6. Write the checkpoint at the end of the run (or on [`TrackProcessor::flush`])
//!
//! Tracks are classified strictly in arrival order. With the `parallel`
//! feature, files are parsed in batches on the rayon pool, but their tiles are
//! still absorbed one track at a time in walk order.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{output_file_name, read_checkpoint, write_checkpoint, DeltaRecord, DeltaStore};
use crate::clusters::{classify, ClusterClassification};
use crate::error::{Result, TileError};
use crate::payload::{ClusterPayload, SquareSource};
use crate::tile_set::TileSet;
use crate::tracks::{Track, TrackParser};
use crate::walker::FileWalker;
use crate::Bounds;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Zoom level of the tile grid.
    /// Default: 14
    pub zoom: u8,

    /// Only files with this extension are read; `None` reads every file.
    /// Default: "gpx"
    pub input_extension: Option<String>,

    /// Where the accumulated tile set is persisted.
    /// Default: "data/checkpoint.json"
    pub checkpoint_path: PathBuf,

    /// Directory for per-track delta records.
    /// Default: "data/deltas"
    pub delta_dir: PathBuf,

    /// Directory for geometry payloads; `None` disables them.
    /// Default: "data/payloads"
    pub payload_dir: Option<PathBuf>,

    /// Tiles searched for the inscribed square.
    /// Default: all tiles
    pub square_source: SquareSource,

    /// Padding of the bounding box, in tiles.
    /// Default: 0
    pub bounding_box_margin: u32,

    /// Only write a payload when the max cluster has grown; otherwise one is
    /// written for every absorbed track.
    /// Default: true
    pub write_payload_on_growth_only: bool,

    /// Files parsed per parallel batch (`parallel` feature only).
    /// Default: 32
    pub parse_batch_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            zoom: 14,
            input_extension: Some("gpx".to_string()),
            checkpoint_path: PathBuf::from("data/checkpoint.json"),
            delta_dir: PathBuf::from("data/deltas"),
            payload_dir: Some(PathBuf::from("data/payloads")),
            square_source: SquareSource::AllTiles,
            bounding_box_margin: 0,
            write_payload_on_growth_only: true,
            parse_batch_size: 32,
        }
    }
}

impl ProcessorConfig {
    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| TileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| TileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

// =============================================================================
// Results
// =============================================================================

/// What absorbing one track produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOutcome {
    pub new_tiles: usize,
    pub max_cluster_size: usize,
    /// Delta file written, if the track added tiles
    pub delta: Option<PathBuf>,
    /// Payload file written, if any
    pub payload: Option<PathBuf>,
}

/// Totals of one [`TrackProcessor::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_seen: usize,
    pub tracks_absorbed: usize,
    pub tracks_skipped: usize,
    pub deltas_written: usize,
    pub payloads_written: usize,
    pub total_tiles: usize,
    pub max_cluster_size: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &TrackOutcome) {
        self.tracks_absorbed += 1;
        self.deltas_written += usize::from(outcome.delta.is_some());
        self.payloads_written += usize::from(outcome.payload.is_some());
    }
}

// =============================================================================
// Processor
// =============================================================================

/// Resumable batch processor over track files.
pub struct TrackProcessor<P> {
    config: ProcessorConfig,
    parser: P,
    deltas: DeltaStore,
    classification: ClusterClassification,
    /// Max cluster size when the last payload was written
    reported_max: usize,
}

impl<P: TrackParser> TrackProcessor<P> {
    /// A processor starting from no tiles, ignoring any checkpoint.
    pub fn new(config: ProcessorConfig, parser: P) -> Self {
        let classification = ClusterClassification::empty(config.zoom);
        Self::with_classification(config, parser, classification)
    }

    /// A processor continuing from the checkpoint named in `config`.
    ///
    /// A missing or malformed checkpoint, or one at another zoom level, means
    /// a cold start.
    pub fn resume(config: ProcessorConfig, parser: P) -> Self {
        let classification = match read_checkpoint(&config.checkpoint_path) {
            Some(tiles) if tiles.zoom() == config.zoom => classify(&tiles, None),
            Some(tiles) => {
                warn!(
                    "[TrackProcessor] Checkpoint is at z{}, configured z{}; starting empty",
                    tiles.zoom(),
                    config.zoom
                );
                ClusterClassification::empty(config.zoom)
            }
            None => ClusterClassification::empty(config.zoom),
        };
        Self::with_classification(config, parser, classification)
    }

    fn with_classification(config: ProcessorConfig, parser: P, classification: ClusterClassification) -> Self {
        Self {
            deltas: DeltaStore::new(&config.delta_dir),
            reported_max: classification.max_cluster_size(),
            config,
            parser,
            classification,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Current classification of every tile seen so far.
    pub fn classification(&self) -> &ClusterClassification {
        &self.classification
    }

    pub fn tiles(&self) -> &TileSet {
        self.classification.all_tiles()
    }

    /// Geometry payload for the current classification.
    pub fn payload(&self) -> ClusterPayload {
        ClusterPayload::from_classification(
            &self.classification,
            self.config.square_source,
            self.config.bounding_box_margin,
        )
    }

    /// Add one track's tiles and write its delta and payload.
    ///
    /// `source` identifies the track (its path relative to the input root)
    /// and names the output files.
    pub fn absorb_track(&mut self, source: &str, track: &Track) -> Result<TrackOutcome> {
        let zoom = self.config.zoom;
        let mut tiles = TileSet::new(zoom);
        tiles.add_coords(&track.points);

        let previous = std::mem::replace(&mut self.classification, ClusterClassification::empty(zoom));
        self.classification = classify(&tiles, Some(previous));

        let new_tiles = self.classification.new_tiles();
        let delta = if new_tiles.is_empty() {
            None
        } else {
            let record = DeltaRecord::new(source, &track.points, new_tiles);
            Some(self.deltas.append(&record)?)
        };

        let max_cluster_size = self.classification.max_cluster_size();
        let grew = max_cluster_size > self.reported_max;
        let payload = match &self.config.payload_dir {
            Some(dir) if grew || !self.config.write_payload_on_growth_only => {
                let path = dir.join(output_file_name(source));
                self.payload().write(&path)?;
                info!("[TrackProcessor] --o--> {} (max cluster {})", path.display(), max_cluster_size);
                Some(path)
            }
            _ => None,
        };
        if grew {
            self.reported_max = max_cluster_size;
        }

        Ok(TrackOutcome {
            new_tiles: self.classification.new_tiles().len(),
            max_cluster_size,
            delta,
            payload,
        })
    }

    /// Parse and absorb a single file below `root`.
    ///
    /// Returns `Ok(None)` when the file was skipped as unreadable or
    /// malformed.
    pub fn process_file(&mut self, root: &Path, path: &Path) -> Result<Option<TrackOutcome>> {
        let parsed = self.parser.parse(path);
        self.absorb_parsed(&source_identity(root, path), parsed)
    }

    fn absorb_parsed(&mut self, source: &str, parsed: Result<Track>) -> Result<Option<TrackOutcome>> {
        info!("[TrackProcessor] --i--> {}", source);
        match parsed {
            Ok(track) => {
                let outcome = self.absorb_track(source, &track)?;
                if let Some(extent) = Bounds::from_points(&track.points) {
                    debug!(
                        "[TrackProcessor] {}: {} points in [{:.4}, {:.4}]..[{:.4}, {:.4}], {} new tiles",
                        source,
                        track.points.len(),
                        extent.min_lat,
                        extent.min_lng,
                        extent.max_lat,
                        extent.max_lng,
                        outcome.new_tiles
                    );
                }
                Ok(Some(outcome))
            }
            Err(e) if e.is_recoverable() => {
                warn!("[TrackProcessor] Skipping {}: {}", source, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Process every input file below `input_root`, then write the checkpoint.
    ///
    /// Unreadable or malformed tracks are skipped and counted; only storage
    /// failures end the run early.
    pub fn run(&mut self, input_root: &Path) -> Result<RunSummary> {
        let start = Instant::now();
        info!(
            "[TrackProcessor] Processing {} from {} tiles at z{}",
            input_root.display(),
            self.tiles().len(),
            self.config.zoom
        );

        let mut files = FileWalker::new(input_root);
        if let Some(extension) = &self.config.input_extension {
            files = files.with_extension(extension.clone());
        }

        let mut summary = RunSummary::default();
        self.drive(files, input_root, &mut summary)?;
        self.flush()?;

        summary.total_tiles = self.tiles().len();
        summary.max_cluster_size = self.classification.max_cluster_size();
        info!(
            "[TrackProcessor] Done in {:?}: {} files, {} absorbed, {} skipped, {} tiles, max cluster {}",
            start.elapsed(),
            summary.files_seen,
            summary.tracks_absorbed,
            summary.tracks_skipped,
            summary.total_tiles,
            summary.max_cluster_size
        );
        Ok(summary)
    }

    fn consume(&mut self, root: &Path, path: &Path, parsed: Result<Track>, summary: &mut RunSummary) -> Result<()> {
        summary.files_seen += 1;
        match self.absorb_parsed(&source_identity(root, path), parsed)? {
            Some(outcome) => summary.record(&outcome),
            None => summary.tracks_skipped += 1,
        }
        Ok(())
    }

    #[cfg(not(feature = "parallel"))]
    fn drive(&mut self, files: FileWalker, root: &Path, summary: &mut RunSummary) -> Result<()> {
        for path in files {
            let parsed = self.parser.parse(&path);
            self.consume(root, &path, parsed, summary)?;
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn drive(&mut self, mut files: FileWalker, root: &Path, summary: &mut RunSummary) -> Result<()> {
        use rayon::prelude::*;

        let batch_size = self.config.parse_batch_size.max(1);
        loop {
            let batch: Vec<PathBuf> = files.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                return Ok(());
            }
            let parser = &self.parser;
            let parsed: Vec<Result<Track>> = batch.par_iter().map(|path| parser.parse(path)).collect();
            for (path, result) in batch.iter().zip(parsed) {
                self.consume(root, path, result, summary)?;
            }
        }
    }

    /// Persist the accumulated tiles to the checkpoint.
    pub fn flush(&self) -> Result<()> {
        write_checkpoint(&self.config.checkpoint_path, self.tiles())
    }
}

/// Path of `path` relative to `root`, with `/` separators.
///
/// Falls back to the file name when `path` is not below `root` (or is `root`
/// itself).
fn source_identity(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative,
        _ => Path::new(path.file_name().unwrap_or(path.as_os_str())),
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
