//! # Boundary Contours
//!
//! Traces the outline of a tile collection as closed polylines.
//!
//! ## Algorithm
//! 1. Emit every tile side that does not border another tile of the
//!    collection as a directed edge, oriented so the tile lies on the right
//!    of travel (x grows east, y grows south)
//! 2. Stitch edges into loops by shared corners. Where two loops touch at a
//!    corner (diagonal tiles), take the sharpest right turn so each loop stays
//!    on its own side of the pinch
//! 3. Merge collinear runs so only true corners remain
//!
//! Outer outlines run clockwise on the map and holes run counter-clockwise, so
//! the sign of a loop's area tells them apart. Every boundary edge belongs to
//! exactly one loop, which makes the even-odd rule over all loops reproduce
//! the collection exactly.

use std::collections::HashMap;

use geo::{Area, LineString, Polygon};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::tile_corner;
use crate::tile::TileNo;
use crate::tile_set::TileSet;
use crate::GpsPoint;

/// A tile-grid corner; `(x, y)` is the north-west corner of tile `(x, y)`.
pub type Corner = (i32, i32);

/// Whether a contour outlines the outside of a cluster or a hole in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContourKind {
    Outer,
    Hole,
}

/// A closed boundary loop in tile-corner coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Corners of the loop; the first corner is repeated at the end.
    pub vertices: Vec<Corner>,
    pub kind: ContourKind,
}

impl Contour {
    pub fn is_closed(&self) -> bool {
        self.vertices.len() >= 4 && self.vertices.first() == self.vertices.last()
    }

    /// The loop in tile units (x east, y south).
    pub fn to_line_string(&self) -> LineString<f64> {
        self.vertices
            .iter()
            .map(|&(x, y)| (f64::from(x), f64::from(y)))
            .collect::<Vec<_>>()
            .into()
    }

    /// The loop in geographic coordinates.
    pub fn positions(&self, zoom: u8) -> Vec<GpsPoint> {
        self.vertices
            .iter()
            .map(|&(x, y)| tile_corner(f64::from(x), f64::from(y), zoom))
            .collect()
    }
}

/// Trace the boundary loops of `cluster`.
///
/// A simply connected cluster yields one loop; each hole adds one more. Loops
/// are ordered by their north-west-most corner, so the outer outline of a
/// single cluster comes first.
pub fn boundaries(cluster: &TileSet) -> Vec<Contour> {
    let edges = boundary_edges(cluster);

    let mut outgoing: HashMap<Corner, Vec<Corner>> = HashMap::new();
    for &(from, to) in &edges {
        outgoing.entry(from).or_default().push(to);
    }

    let mut contours = Vec::new();
    for &(start, first) in &edges {
        if !take_edge(&mut outgoing, start, first) {
            continue;
        }

        let mut vertices = vec![start, first];
        let mut previous = start;
        let mut current = first;
        let closed = loop {
            let mut options = outgoing.get(&current).cloned().unwrap_or_default();
            if current == start {
                options.push(first);
            }
            let Some(next) = sharpest_right(direction(previous, current), current, &options) else {
                break false;
            };
            if current == start && next == first {
                break true;
            }
            take_edge(&mut outgoing, current, next);
            vertices.push(next);
            previous = current;
            current = next;
        };

        if closed {
            contours.push(simplify(vertices));
        } else {
            debug!("[Boundary] Dropping open edge chain starting at {:?}", start);
        }
    }
    contours
}

/// Directed boundary edges, ordered by start corner (row-major) for stable
/// loop order.
fn boundary_edges(cluster: &TileSet) -> Vec<(Corner, Corner)> {
    let mut edges = Vec::new();
    for TileNo { x, y } in cluster.iter() {
        if !cluster.contains(&TileNo::new(x, y - 1)) {
            edges.push(((x, y), (x + 1, y)));
        }
        if !cluster.contains(&TileNo::new(x + 1, y)) {
            edges.push(((x + 1, y), (x + 1, y + 1)));
        }
        if !cluster.contains(&TileNo::new(x, y + 1)) {
            edges.push(((x + 1, y + 1), (x, y + 1)));
        }
        if !cluster.contains(&TileNo::new(x - 1, y)) {
            edges.push(((x, y + 1), (x, y)));
        }
    }
    edges.sort_by_key(|&((fx, fy), (tx, ty))| (fy, fx, ty, tx));
    edges
}

fn take_edge(outgoing: &mut HashMap<Corner, Vec<Corner>>, from: Corner, to: Corner) -> bool {
    let Some(targets) = outgoing.get_mut(&from) else {
        return false;
    };
    match targets.iter().position(|&t| t == to) {
        Some(i) => {
            targets.swap_remove(i);
            true
        }
        None => false,
    }
}

fn direction(from: Corner, to: Corner) -> (i32, i32) {
    ((to.0 - from.0).signum(), (to.1 - from.1).signum())
}

/// Pick the continuation turning furthest right relative to `heading`.
fn sharpest_right(heading: (i32, i32), at: Corner, options: &[Corner]) -> Option<Corner> {
    let (dx, dy) = heading;
    let rank = |d: (i32, i32)| {
        if d == (-dy, dx) {
            0 // right
        } else if d == heading {
            1 // straight
        } else if d == (dy, -dx) {
            2 // left
        } else {
            3
        }
    };
    options.iter().copied().min_by_key(|&to| rank(direction(at, to)))
}

/// Drop corners that continue in a straight line and classify the loop.
fn simplify(mut vertices: Vec<Corner>) -> Contour {
    vertices.pop();
    let n = vertices.len();
    let mut corners: Vec<Corner> = (0..n)
        .filter(|&i| {
            let before = vertices[(i + n - 1) % n];
            let here = vertices[i];
            let after = vertices[(i + 1) % n];
            direction(before, here) != direction(here, after)
        })
        .map(|i| vertices[i])
        .collect();
    if let Some(&first) = corners.first() {
        corners.push(first);
    }

    let mut contour = Contour { vertices: corners, kind: ContourKind::Outer };
    // Outer loops are clockwise on screen (y down), i.e. positive shoelace area
    if Polygon::new(contour.to_line_string(), vec![]).signed_area() < 0.0 {
        contour.kind = ContourKind::Hole;
    }
    contour
}
