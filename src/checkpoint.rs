//! Persistence of the accumulated tile set.
//!
//! Two kinds of files are written:
//!
//! | File | Content | When |
//! |------|---------|------|
//! | checkpoint | `{ "zoom": 14, "tiles": [{"x":..,"y":..}, ...] }` | end of a run, on flush |
//! | delta | `{ "name", "time", "track", "tiles" }` | every track that added tiles |
//!
//! A checkpoint is replaced atomically (write to a sibling temp file, then
//! rename), so a crash never leaves a truncated checkpoint behind. Replaying
//! every delta written after a checkpoint onto that checkpoint reproduces the
//! accumulated tile set. A delta file is only replaced by a record carrying the
//! same source and tiles: when two different contributions map to the same
//! file name, the later record gets a numbered sibling.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TileError};
use crate::tile::TileNo;
use crate::tile_set::TileSet;
use crate::walker::FileWalker;
use crate::GpsPoint;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    zoom: u8,
    tiles: Vec<TileNo>,
}

/// Load a checkpoint.
///
/// A missing or unreadable checkpoint is not an error: the caller simply
/// starts from nothing. Both cases are logged.
pub fn read_checkpoint(path: &Path) -> Option<TileSet> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            info!("[Checkpoint] No checkpoint at {} ({}), starting empty", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice::<CheckpointFile>(&bytes) {
        Ok(file) => {
            let tiles = TileSet::from_tiles(file.zoom, file.tiles);
            info!(
                "[Checkpoint] Loaded {} tiles at z{} from {}",
                tiles.len(),
                tiles.zoom(),
                path.display()
            );
            Some(tiles)
        }
        Err(e) => {
            warn!("[Checkpoint] Ignoring malformed checkpoint {}: {}", path.display(), e);
            None
        }
    }
}

/// Atomically replace the checkpoint at `path` with `tiles`.
pub fn write_checkpoint(path: &Path, tiles: &TileSet) -> Result<()> {
    let file = CheckpointFile {
        zoom: tiles.zoom(),
        tiles: tiles.as_slice().to_vec(),
    };
    let json = serde_json::to_vec(&file).map_err(|source| TileError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    ensure_parent(path)?;
    let temp = path.with_extension("tmp");
    fs::write(&temp, json).map_err(|source| TileError::Storage {
        path: temp.clone(),
        source,
    })?;
    fs::rename(&temp, path).map_err(|source| TileError::Storage {
        path: path.to_path_buf(),
        source,
    })?;

    info!("[Checkpoint] Wrote {} tiles to {}", tiles.len(), path.display());
    Ok(())
}

/// Create the parent directory of `path` if needed.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|source| TileError::Storage {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Relative output path for a source: the source's own relative path with
/// `.json` appended, unless it already ends in `.json`.
///
/// The source extension is kept as is, so `ride.GPX` and `ride.gpx` map to
/// different files.
///
/// Only plain path components are kept, so a source identity can never point
/// outside the output directory.
pub fn output_file_name(source: &str) -> PathBuf {
    let mut relative: PathBuf = Path::new(source)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    if relative.as_os_str().is_empty() {
        relative.push("unnamed");
    }
    if relative.extension().map_or(true, |ext| ext != "json") {
        let mut name = relative.as_os_str().to_os_string();
        name.push(".json");
        relative = PathBuf::from(name);
    }
    relative
}

/// Whether `path` holds a delta from the same source with the same tiles.
fn same_contribution(path: &Path, record: &DeltaRecord) -> bool {
    fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<DeltaRecord>(&bytes).ok())
        .is_some_and(|existing| existing.name == record.name && existing.tiles == record.tiles)
}

/// `base` itself, or `stem-N.json` beside it for the `n`th collision.
fn numbered(base: &Path, n: u32) -> PathBuf {
    if n == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{}-{}.json", stem, n))
}

/// The tiles one track contributed, with the track that contributed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    /// Source identity (path relative to the input root)
    pub name: String,
    /// When the record was created
    pub time: DateTime<Utc>,
    /// Track points as `[lat, lon]`
    pub track: Vec<[f64; 2]>,
    /// Tiles first seen in this track
    pub tiles: Vec<TileNo>,
}

impl DeltaRecord {
    pub fn new(name: impl Into<String>, track: &[GpsPoint], new_tiles: &TileSet) -> Self {
        Self {
            name: name.into(),
            time: Utc::now(),
            track: track.iter().map(|p| [p.latitude, p.longitude]).collect(),
            tiles: new_tiles.as_slice().to_vec(),
        }
    }
}

/// Directory of delta records.
#[derive(Debug, Clone)]
pub struct DeltaStore {
    dir: PathBuf,
}

impl DeltaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one record to a file named after the record's source
    /// identity.
    ///
    /// Re-processing a source with the same outcome rewrites its earlier
    /// file. Any other record already holding the name (the same relative
    /// path from another input root, or a name differing only in case on a
    /// case-insensitive file system) is kept, and the new record goes to the
    /// first free `name-N.json`.
    pub fn append(&self, record: &DeltaRecord) -> Result<PathBuf> {
        let base = self.dir.join(output_file_name(&record.name));
        ensure_parent(&base)?;
        let json = serde_json::to_vec(record).map_err(|source| TileError::Json {
            path: base.clone(),
            source,
        })?;

        let mut n = 0;
        let (path, mut file) = loop {
            let candidate = numbered(&base, n);
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => break (candidate, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if same_contribution(&candidate, record) {
                        match fs::File::create(&candidate) {
                            Ok(file) => break (candidate, file),
                            Err(source) => return Err(TileError::Storage { path: candidate, source }),
                        }
                    }
                    n += 1;
                }
                Err(source) => return Err(TileError::Storage { path: candidate, source }),
            }
        };
        if n > 0 {
            warn!("[DeltaStore] {} exists, writing {}", base.display(), path.display());
        }
        file.write_all(&json).map_err(|source| TileError::Storage {
            path: path.clone(),
            source,
        })?;
        debug!("[DeltaStore] --o--> {} ({} tiles)", path.display(), record.tiles.len());
        Ok(path)
    }

    /// All readable records, oldest first (ties broken by name).
    ///
    /// Unreadable or malformed files are skipped with a warning.
    pub fn load_all(&self) -> Vec<DeltaRecord> {
        let mut records: Vec<DeltaRecord> = FileWalker::new(&self.dir)
            .with_extension("json")
            .filter_map(|path| {
                let parsed = fs::read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|bytes| {
                        serde_json::from_slice::<DeltaRecord>(&bytes).map_err(|e| e.to_string())
                    });
                match parsed {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("[DeltaStore] Skipping {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();
        records.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)));
        records
    }

    /// Apply every stored delta to `base`.
    pub fn replay(&self, mut base: TileSet) -> TileSet {
        let records = self.load_all();
        let mut added = 0;
        for record in &records {
            added += base.add_tiles(record.tiles.iter().copied());
        }
        info!(
            "[DeltaStore] Replayed {} deltas, {} new tiles, {} total",
            records.len(),
            added,
            base.len()
        );
        base
    }
}
