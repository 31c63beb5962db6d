//! Tile coordinates on a fixed-zoom slippy-map grid.

use serde::{Deserialize, Serialize};

use crate::geo_utils::{lat_to_tile_y, lng_to_tile_x, tile_corner};
use crate::{Bounds, GpsPoint};

/// Integer tile index within one zoom level.
///
/// This is the identity of a tile inside a [`TileSet`](crate::TileSet) and the
/// `{x, y}` shape used by checkpoint and delta files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileNo {
    pub x: i32,
    pub y: i32,
}

impl TileNo {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four edge-sharing neighbours: north, west, east, south.
    #[inline]
    pub fn neighbors(&self) -> [TileNo; 4] {
        [
            TileNo::new(self.x, self.y - 1),
            TileNo::new(self.x - 1, self.y),
            TileNo::new(self.x + 1, self.y),
            TileNo::new(self.x, self.y + 1),
        ]
    }

    /// Attach a zoom level.
    pub fn at_zoom(self, zoom: u8) -> Tile {
        Tile { x: self.x, y: self.y, zoom }
    }
}

/// A tile on the slippy-map grid at a specific zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub zoom: u8,
}

impl Tile {
    pub fn new(x: i32, y: i32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// The zoom-less index of this tile.
    pub fn no(&self) -> TileNo {
        TileNo::new(self.x, self.y)
    }

    /// Geographic rectangle covered by this tile.
    pub fn bounds(&self) -> Bounds {
        TileRect::single(self.no()).bounds(self.zoom)
    }

    /// Geographic position of the tile's center.
    pub fn center(&self) -> GpsPoint {
        tile_corner(f64::from(self.x) + 0.5, f64::from(self.y) + 0.5, self.zoom)
    }
}

/// Map a GPS coordinate onto the tile that contains it.
///
/// Deterministic and side-effect free. Coordinates outside the Mercator range
/// produce out-of-range (saturated) indices instead of failing; validating the
/// input is the caller's job.
///
/// # Example
/// ```
/// use tile_clusters::map_to_tile;
///
/// let tile = map_to_tile(51.476, -0.008, 14);
/// assert_eq!((tile.x, tile.y), (8191, 5450));
/// ```
pub fn map_to_tile(lat: f64, lng: f64, zoom: u8) -> Tile {
    let x = lng_to_tile_x(lng, zoom).floor() as i32;
    let y = lat_to_tile_y(lat, zoom).floor() as i32;
    Tile { x, y, zoom }
}

/// Inclusive axis-aligned rectangle of tile indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl TileRect {
    pub fn single(tile: TileNo) -> Self {
        Self {
            min_x: tile.x,
            min_y: tile.y,
            max_x: tile.x,
            max_y: tile.y,
        }
    }

    /// Grow the rectangle to cover `tile`.
    pub fn include(&mut self, tile: TileNo) {
        self.min_x = self.min_x.min(tile.x);
        self.min_y = self.min_y.min(tile.y);
        self.max_x = self.max_x.max(tile.x);
        self.max_y = self.max_y.max(tile.y);
    }

    /// Expand by `margin` tiles on every side.
    pub fn expand(&self, margin: u32) -> Self {
        let m = i32::try_from(margin).unwrap_or(i32::MAX);
        Self {
            min_x: self.min_x.saturating_sub(m),
            min_y: self.min_y.saturating_sub(m),
            max_x: self.max_x.saturating_add(m),
            max_y: self.max_y.saturating_add(m),
        }
    }

    /// Number of tile columns.
    pub fn width(&self) -> usize {
        (i64::from(self.max_x) - i64::from(self.min_x) + 1) as usize
    }

    /// Number of tile rows.
    pub fn height(&self) -> usize {
        (i64::from(self.max_y) - i64::from(self.min_y) + 1) as usize
    }

    pub fn contains(&self, tile: TileNo) -> bool {
        tile.x >= self.min_x && tile.x <= self.max_x && tile.y >= self.min_y && tile.y <= self.max_y
    }

    /// Geographic rectangle covered by all tiles of this rectangle.
    pub fn bounds(&self, zoom: u8) -> Bounds {
        let north_west = tile_corner(f64::from(self.min_x), f64::from(self.min_y), zoom);
        let south_east = tile_corner(
            f64::from(self.max_x) + 1.0,
            f64::from(self.max_y) + 1.0,
            zoom,
        );
        Bounds {
            min_lat: south_east.latitude,
            max_lat: north_west.latitude,
            min_lng: north_west.longitude,
            max_lng: south_east.longitude,
        }
    }
}
