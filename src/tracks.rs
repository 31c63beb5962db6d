//! Reading GPS tracks from disk.
//!
//! Track parsing sits behind the [`TrackParser`] trait so the batch processor
//! does not care about the file format. Two formats are built in:
//!
//! - GPX files holding exactly one track (feature `gpx`, on by default)
//! - JSON arrays of `[lat, lon]` pairs

use std::fs;
use std::path::Path;

use crate::error::{Result, TileError};
use crate::GpsPoint;

/// A named sequence of GPS points.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub points: Vec<GpsPoint>,
}

/// Turns a file into a [`Track`].
///
/// Errors are per file; the processor logs them and moves on.
pub trait TrackParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Track>;
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| TileError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn require_points(path: &Path, track: Track) -> Result<Track> {
    if track.points.is_empty() {
        return Err(TileError::MalformedTrack {
            path: path.to_path_buf(),
            reason: "track has no points".to_string(),
        });
    }
    Ok(track)
}

/// Parser for GPX files containing exactly one track.
#[cfg(feature = "gpx")]
#[derive(Debug, Clone, Copy, Default)]
pub struct GpxTrackParser;

#[cfg(feature = "gpx")]
impl TrackParser for GpxTrackParser {
    fn parse(&self, path: &Path) -> Result<Track> {
        let bytes = read(path)?;
        let gpx = gpx::read(bytes.as_slice()).map_err(|source| TileError::Gpx {
            path: path.to_path_buf(),
            source,
        })?;

        let [track] = gpx.tracks.as_slice() else {
            return Err(TileError::MalformedTrack {
                path: path.to_path_buf(),
                reason: format!("expected exactly one track, found {}", gpx.tracks.len()),
            });
        };

        let points = track
            .segments
            .iter()
            .flat_map(|segment| segment.points.iter())
            .map(|waypoint| {
                let point = waypoint.point();
                GpsPoint::new(point.y(), point.x())
            })
            .collect();

        let name = track
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| file_stem(path));

        require_points(path, Track { name, points })
    }
}

/// Parser for JSON files of the form `[[lat, lon], ...]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTrackParser;

impl TrackParser for JsonTrackParser {
    fn parse(&self, path: &Path) -> Result<Track> {
        let bytes = read(path)?;
        let pairs: Vec<[f64; 2]> = serde_json::from_slice(&bytes).map_err(|source| TileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let points = pairs
            .into_iter()
            .map(|[lat, lon]| GpsPoint::new(lat, lon))
            .collect();
        require_points(
            path,
            Track {
                name: file_stem(path),
                points,
            },
        )
    }
}
