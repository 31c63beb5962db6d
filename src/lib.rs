//! # Tile Clusters
//!
//! Incremental slippy-map tile clustering for GPS tracks.
//!
//! This library provides:
//! - Mapping of GPS coordinates onto a fixed-zoom tile grid
//! - Incremental clustering of visited tiles (edge-connected components)
//! - Cluster geometry: centroid, bounding box, maximal inscribed square and
//!   boundary contours
//! - Resumable on-disk state: checkpoints plus per-track delta records
//! - A pull-based streaming session for serving derived records
//!
//! ## Features
//!
//! - **`gpx`** (default) - Read GPX track files
//! - **`parallel`** - Parse track files in parallel with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use tile_clusters::{classify, GpsPoint, TileSet};
//!
//! let track = vec![
//!     GpsPoint::new(51.4760, -0.0080),
//!     GpsPoint::new(51.4760, -0.0300),
//!     GpsPoint::new(51.4900, -0.0080),
//! ];
//!
//! let mut tiles = TileSet::new(14);
//! tiles.add_coords(&track);
//!
//! let classification = classify(&tiles, None);
//! println!(
//!     "{} tiles, {} clusters, largest has {}",
//!     classification.all_tiles().len(),
//!     classification.cluster_count(),
//!     classification.max_cluster_size()
//! );
//! ```
//!
//! Subsequent tracks are classified incrementally by handing the previous
//! classification back in:
//!
//! ```rust
//! use tile_clusters::{classify, ClusterClassification, GpsPoint, TileSet};
//!
//! let mut state = ClusterClassification::empty(14);
//! for track in [[GpsPoint::new(51.476, -0.008)], [GpsPoint::new(51.476, -0.030)]] {
//!     let mut tiles = TileSet::new(14);
//!     tiles.add_coords(&track);
//!     state = classify(&tiles, Some(state));
//!     println!("{} new tiles", state.new_tiles().len());
//! }
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Result, SessionError, TileError};

// Web-Mercator helpers
pub mod geo_utils;

pub mod tile;
pub use tile::{map_to_tile, Tile, TileNo, TileRect};

pub mod tile_set;
pub use tile_set::TileSet;

// Incremental clustering (arena union-find)
pub mod clusters;
pub use clusters::{classify, ClusterClassification};

// Derived geometry
pub mod geometry;
pub use geometry::{
    bounding_box, center_square, centroid, maximal_inscribed_square, maximal_squares,
    maximal_squares_by_cluster, TileSquare,
};

pub mod boundary;
pub use boundary::{boundaries, Contour, ContourKind, Corner};

pub mod payload;
pub use payload::{ClusterPayload, LatLngBounds, SquareSource};

// Persistence
pub mod checkpoint;
pub use checkpoint::{read_checkpoint, write_checkpoint, DeltaRecord, DeltaStore};

pub mod walker;
pub use walker::FileWalker;

pub mod tracks;
#[cfg(feature = "gpx")]
pub use tracks::GpxTrackParser;
pub use tracks::{JsonTrackParser, Track, TrackParser};

pub mod processor;
pub use processor::{ProcessorConfig, RunSummary, TrackOutcome, TrackProcessor};

pub mod session;
pub use session::{
    DataDirSession, InitParams, Next, SessionConfig, SessionState, StreamingSession,
    TransportResponse, UnitFailure,
};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use tile_clusters::GpsPoint;
/// let point = GpsPoint::new(51.4769, -0.0005); // Greenwich
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Extent of a track, or `None` for an empty one.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        geo_utils::compute_bounds(points)
    }
}
