//! # Geographic Utilities
//!
//! Web-Mercator projection helpers shared by the tile mapper and the geometry
//! derivation code.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`lng_to_tile_x`] | Longitude to fractional tile column |
//! | [`lat_to_tile_y`] | Latitude to fractional tile row |
//! | [`tile_x_to_lng`] | Fractional tile column back to longitude |
//! | [`tile_y_to_lat`] | Fractional tile row back to latitude |
//! | [`tile_corner`] | Tile-grid corner to a GPS point |
//! | [`compute_bounds`] | Bounding box of a GPS track |
//!
//! ## Example
//!
//! ```rust
//! use tile_clusters::geo_utils;
//!
//! // Greenwich at zoom 14
//! let x = geo_utils::lng_to_tile_x(-0.008, 14);
//! let y = geo_utils::lat_to_tile_y(51.476, 14);
//! assert_eq!(x.floor() as i32, 8191);
//! assert_eq!(y.floor() as i32, 5450);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Slippy-Map Tiling
//!
//! At zoom `z` the world is divided into `2^z × 2^z` square tiles. Tile columns
//! grow eastwards from the antimeridian, tile rows grow southwards from
//! latitude ≈ 85.0511°N. Row numbers follow the Mercator projection:
//!
//! ```text
//! y = (1 - asinh(tan(lat)) / π) / 2 · 2^z
//! ```
//!
//! Reference: [Slippy map tilenames (OSM wiki)](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames)
//!
//! ### Out-of-range input
//!
//! None of these functions validate their input. Latitudes beyond the
//! Mercator limit produce rows outside `0..2^z` (or infinities at the poles),
//! which the integer conversion in [`crate::map_to_tile`] saturates.

use std::f64::consts::PI;

use crate::{Bounds, GpsPoint};

// =============================================================================
// Projection
// =============================================================================

/// Number of tiles along one axis at `zoom`.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Convert a longitude to a fractional tile column at `zoom`.
#[inline]
pub fn lng_to_tile_x(lng: f64, zoom: u8) -> f64 {
    (lng + 180.0) / 360.0 * tiles_per_axis(zoom)
}

/// Convert a latitude to a fractional tile row at `zoom`.
///
/// The integer part is the tile row; the fraction is the position inside the
/// tile, measured from its northern edge.
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let lat_rad = lat.to_radians();
    (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * tiles_per_axis(zoom)
}

/// Convert a fractional tile column back to a longitude.
#[inline]
pub fn tile_x_to_lng(x: f64, zoom: u8) -> f64 {
    x / tiles_per_axis(zoom) * 360.0 - 180.0
}

/// Convert a fractional tile row back to a latitude.
#[inline]
pub fn tile_y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = PI * (1.0 - 2.0 * y / tiles_per_axis(zoom));
    n.sinh().atan().to_degrees()
}

/// Geographic position of a tile-grid corner.
///
/// Corner `(x, y)` is the north-west corner of tile `(x, y)`.
pub fn tile_corner(x: f64, y: f64, zoom: u8) -> GpsPoint {
    GpsPoint::new(tile_y_to_lat(y, zoom), tile_x_to_lng(x, zoom))
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a GPS track.
///
/// Returns `None` for an empty track.
///
/// # Example
///
/// ```rust
/// use tile_clusters::{GpsPoint, geo_utils};
///
/// let track = vec![
///     GpsPoint::new(51.5000, -0.1300),
///     GpsPoint::new(51.5100, -0.1200),
///     GpsPoint::new(51.5050, -0.1250),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&track).unwrap();
/// assert_eq!(bounds.min_lat, 51.5000);
/// assert_eq!(bounds.max_lng, -0.1200);
/// ```
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    if points.is_empty() {
        return None;
    }

    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Some(Bounds { min_lat, max_lat, min_lng, max_lng })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_origin_tile() {
        assert!(approx_eq(lng_to_tile_x(-180.0, 0), 0.0, 1e-12));
        assert!(approx_eq(lat_to_tile_y(0.0, 0), 0.5, 1e-12));
        assert!(approx_eq(lng_to_tile_x(0.0, 1), 1.0, 1e-12));
    }

    #[test]
    fn test_roundtrip_projection() {
        let (lat, lng) = (51.476, -0.008);
        for zoom in [0u8, 8, 14, 17] {
            let x = lng_to_tile_x(lng, zoom);
            let y = lat_to_tile_y(lat, zoom);
            assert!(approx_eq(tile_x_to_lng(x, zoom), lng, 1e-9));
            assert!(approx_eq(tile_y_to_lat(y, zoom), lat, 1e-9));
        }
    }

    #[test]
    fn test_mercator_limit() {
        // Top edge of the grid sits at ~85.0511 degrees north
        let lat = tile_y_to_lat(0.0, 14);
        assert!(approx_eq(lat, 85.051_128_78, 1e-6));
    }

    #[test]
    fn test_rows_grow_southwards() {
        let north = lat_to_tile_y(52.0, 14);
        let south = lat_to_tile_y(51.0, 14);
        assert!(south > north);
    }

    #[test]
    fn test_pole_is_not_a_crash() {
        let y = lat_to_tile_y(90.0, 14);
        assert!(y.is_infinite() || y < 0.0);
    }

    #[test]
    fn test_compute_bounds() {
        let track = vec![
            GpsPoint::new(51.50, -0.13),
            GpsPoint::new(51.51, -0.12),
            GpsPoint::new(51.505, -0.125),
        ];
        let bounds = compute_bounds(&track).unwrap();
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);
    }

    #[test]
    fn test_compute_bounds_empty() {
        assert!(compute_bounds(&[]).is_none());
    }
}
