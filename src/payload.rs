//! Map-ready snapshot of a classification.
//!
//! Rectangles are `[[south, west], [north, east]]` and positions `[lat, lon]`,
//! the layout map widgets take directly. Field names are kept short because a
//! payload lists every tile:
//!
//! | Field | Content |
//! |-------|---------|
//! | `all` | every tile |
//! | `det` | detached tiles |
//! | `min` | minor-cluster tiles |
//! | `max` | max-cluster tiles |
//! | `cen` | centroid of the max cluster |
//! | `bnd` | boundary loops of the max cluster |
//! | `sqr` | maximal inscribed square nearest the tiles' center |
//! | `box` | bounding box of the max cluster |

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::boundary::boundaries;
use crate::checkpoint::ensure_parent;
use crate::clusters::ClusterClassification;
use crate::error::{Result, TileError};
use crate::geometry::{
    bounding_box, centroid, maximal_squares, maximal_squares_by_cluster, nearest_to_center,
};
use crate::tile_set::TileSet;
use crate::{Bounds, GpsPoint};

/// `[[south, west], [north, east]]`
pub type LatLngBounds = [[f64; 2]; 2];

/// Which tiles the inscribed square is searched in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquareSource {
    /// Every tile, whether clustered or not
    #[default]
    AllTiles,
    /// Only the max cluster
    MaxCluster,
}

impl Bounds {
    pub fn to_lat_lng_bounds(&self) -> LatLngBounds {
        [[self.min_lat, self.min_lng], [self.max_lat, self.max_lng]]
    }
}

fn lat_lng(p: GpsPoint) -> [f64; 2] {
    [p.latitude, p.longitude]
}

fn tile_bounds(tiles: &TileSet) -> Vec<LatLngBounds> {
    tiles
        .to_tiles()
        .iter()
        .map(|t| t.bounds().to_lat_lng_bounds())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterPayload {
    pub all: Vec<LatLngBounds>,
    pub det: Vec<LatLngBounds>,
    pub min: Vec<LatLngBounds>,
    pub max: Vec<LatLngBounds>,
    pub cen: Option<[f64; 2]>,
    pub bnd: Vec<Vec<[f64; 2]>>,
    pub sqr: Option<LatLngBounds>,
    #[serde(rename = "box")]
    pub bbox: Option<LatLngBounds>,
}

impl ClusterPayload {
    /// Derive a payload from a classification.
    ///
    /// `margin` pads the bounding box by whole tiles.
    pub fn from_classification(
        classification: &ClusterClassification,
        square_source: SquareSource,
        margin: u32,
    ) -> Self {
        let zoom = classification.zoom();
        let max = classification
            .max_cluster()
            .unwrap_or_else(|| TileSet::new(zoom));

        let square = match square_source {
            SquareSource::AllTiles => nearest_to_center(
                maximal_squares_by_cluster(classification),
                classification.all_tiles(),
            ),
            SquareSource::MaxCluster => nearest_to_center(maximal_squares(&max), &max),
        };

        Self {
            all: tile_bounds(classification.all_tiles()),
            det: tile_bounds(&classification.detached_tiles()),
            min: tile_bounds(&classification.minor_clusters()),
            max: tile_bounds(&max),
            cen: centroid(&max).map(lat_lng),
            bnd: boundaries(&max)
                .iter()
                .map(|contour| contour.positions(zoom).into_iter().map(lat_lng).collect())
                .collect(),
            sqr: square.map(|s| s.bounds(zoom).to_lat_lng_bounds()),
            bbox: bounding_box(&max, margin).map(|r| r.bounds(zoom).to_lat_lng_bounds()),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let json = serde_json::to_vec(self).map_err(|source| TileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| TileError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("[Payload] --o--> {} ({} tiles)", path.display(), self.all.len());
        Ok(())
    }
}
