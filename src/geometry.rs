//! Geometry derived from a tile collection: centroid, bounding box and the
//! maximal inscribed square. Boundary contours live in [`crate::boundary`].

use geo::{Centroid, MultiPoint, Point};
use serde::{Deserialize, Serialize};

use crate::clusters::ClusterClassification;
use crate::tile::{TileNo, TileRect};
use crate::tile_set::TileSet;
use crate::{Bounds, GpsPoint};

/// Axis-aligned square of tiles anchored at its north-west tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSquare {
    pub x: i32,
    pub y: i32,
    /// Side length in tiles
    pub size: u32,
}

impl TileSquare {
    pub fn anchor(&self) -> TileNo {
        TileNo::new(self.x, self.y)
    }

    pub fn rect(&self) -> TileRect {
        let extent = self.size as i32 - 1;
        TileRect {
            min_x: self.x,
            min_y: self.y,
            max_x: self.x + extent,
            max_y: self.y + extent,
        }
    }

    pub fn bounds(&self, zoom: u8) -> Bounds {
        self.rect().bounds(zoom)
    }

    /// Tiles covered by the square, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = TileNo> {
        let rect = self.rect();
        (rect.min_y..=rect.max_y)
            .flat_map(move |y| (rect.min_x..=rect.max_x).map(move |x| TileNo::new(x, y)))
    }
}

/// Arithmetic mean of the tile centers, in geographic coordinates.
///
/// Returns `None` for an empty collection.
pub fn centroid(cluster: &TileSet) -> Option<GpsPoint> {
    let centers: MultiPoint<f64> = cluster
        .to_tiles()
        .iter()
        .map(|tile| {
            let c = tile.center();
            Point::new(c.longitude, c.latitude)
        })
        .collect();
    centers.centroid().map(|p| GpsPoint::new(p.y(), p.x()))
}

/// Smallest tile rectangle covering the collection, padded by `margin` tiles
/// on every side. Returns `None` for an empty collection.
pub fn bounding_box(cluster: &TileSet, margin: u32) -> Option<TileRect> {
    let mut tiles = cluster.iter();
    let mut rect = TileRect::single(tiles.next()?);
    for tile in tiles {
        rect.include(tile);
    }
    Some(rect.expand(margin))
}

/// Largest axis-aligned square whose tiles all belong to `cluster`.
///
/// Among several squares of maximal size the first one in row-major order
/// (by bottom-right corner) wins. Returns `None` for an empty collection.
///
/// # Example
/// ```
/// use tile_clusters::{maximal_inscribed_square, TileNo, TileSet};
///
/// let l_shape = TileSet::from_tiles(14, [
///     TileNo::new(0, 0), TileNo::new(0, 1), TileNo::new(0, 2), TileNo::new(1, 0),
/// ]);
/// assert_eq!(maximal_inscribed_square(&l_shape).unwrap().size, 1);
/// ```
pub fn maximal_inscribed_square(cluster: &TileSet) -> Option<TileSquare> {
    maximal_squares(cluster).into_iter().next()
}

/// Every square of maximal size, in row-major order.
///
/// Builds a dense grid over the bounding box of `cluster`, so time is
/// proportional to the box area rather than the tile count. Tiles scattered
/// across a continent make that box very large; search a classification with
/// [`maximal_squares_by_cluster`] instead.
pub fn maximal_squares(cluster: &TileSet) -> Vec<TileSquare> {
    let Some(rect) = bounding_box(cluster, 0) else {
        return Vec::new();
    };

    // dp[j + 1] holds the side of the largest all-filled square whose
    // bottom-right tile is column j of the current row; dp[0] is padding.
    let width = rect.width();
    let mut above = vec![0u32; width + 1];
    let mut row = vec![0u32; width + 1];
    let mut best = 0u32;
    let mut squares = Vec::new();

    for y in rect.min_y..=rect.max_y {
        for (j, x) in (rect.min_x..=rect.max_x).enumerate() {
            let side = if cluster.contains(&TileNo::new(x, y)) {
                above[j].min(row[j]).min(above[j + 1]) + 1
            } else {
                0
            };
            row[j + 1] = side;

            if side > 0 && side >= best {
                if side > best {
                    best = side;
                    squares.clear();
                }
                let offset = side as i32 - 1;
                squares.push(TileSquare { x: x - offset, y: y - offset, size: side });
            }
        }
        std::mem::swap(&mut above, &mut row);
    }

    squares
}

/// Every square of maximal size over all tiles of a classification, in
/// row-major order.
///
/// A square is edge-connected, so it lies inside a single cluster. Each
/// cluster is scanned within its own bounding box and detached tiles are
/// skipped once a cluster has yielded a square larger than one tile.
pub fn maximal_squares_by_cluster(classification: &ClusterClassification) -> Vec<TileSquare> {
    let mut side = 0;
    let mut squares = Vec::new();

    for cluster in classification.clusters() {
        if (cluster.len() as u64) < u64::from(side) * u64::from(side) {
            continue;
        }
        let found = maximal_squares(&cluster);
        match found.first().map(|s| s.size) {
            Some(size) if size > side => {
                side = size;
                squares = found;
            }
            Some(size) if size == side => squares.extend(found),
            _ => {}
        }
    }

    // Same order as a single scan: by bottom-right tile, row-major
    squares.sort_by_key(|s| {
        let offset = s.size as i32 - 1;
        (s.y + offset, s.x + offset)
    });
    squares
}

/// The maximal square closest to the cluster's center of mass.
///
/// Distances are measured in tile units between square centers and the mean
/// tile center; ties keep row-major order.
pub fn center_square(cluster: &TileSet) -> Option<TileSquare> {
    nearest_to_center(maximal_squares(cluster), cluster)
}

/// Picks the square whose center is nearest the mean tile center of `tiles`.
pub(crate) fn nearest_to_center(squares: Vec<TileSquare>, tiles: &TileSet) -> Option<TileSquare> {
    if tiles.is_empty() {
        return None;
    }
    let n = tiles.len() as f64;
    let (sum_x, sum_y) = tiles.iter().fold((0.0, 0.0), |(sx, sy), t| {
        (sx + f64::from(t.x) + 0.5, sy + f64::from(t.y) + 0.5)
    });
    let (cx, cy) = (sum_x / n, sum_y / n);

    let distance = |s: &TileSquare| {
        let half = f64::from(s.size) / 2.0;
        let dx = f64::from(s.x) + half - cx;
        let dy = f64::from(s.y) + half - cy;
        dx * dx + dy * dy
    };

    let mut best: Option<(TileSquare, f64)> = None;
    for square in squares {
        let d = distance(&square);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((square, d));
        }
    }
    best.map(|(square, _)| square)
}
