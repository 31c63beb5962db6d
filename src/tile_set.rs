//! Deduplicated, insertion-ordered set of tiles at one zoom level.

use std::collections::HashMap;

use log::debug;

use crate::tile::{map_to_tile, Tile, TileNo};
use crate::GpsPoint;

/// A set of tiles sharing one zoom level.
///
/// Tiles are stored in an arena in first-insertion order; every tile gets a
/// stable integer handle (its index) that never changes while the set grows.
/// Iteration follows insertion order, which keeps cluster discovery order and
/// checkpoint files reproducible.
///
/// `Clone` produces a fully independent copy: mutating the clone never affects
/// the original.
#[derive(Debug, Clone)]
pub struct TileSet {
    zoom: u8,
    tiles: Vec<TileNo>,
    index: HashMap<TileNo, usize>,
}

impl TileSet {
    pub fn new(zoom: u8) -> Self {
        Self {
            zoom,
            tiles: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a set from tile indices.
    pub fn from_tiles<I>(zoom: u8, tiles: I) -> Self
    where
        I: IntoIterator<Item = TileNo>,
    {
        let mut set = Self::new(zoom);
        set.add_tiles(tiles);
        set
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Add one tile. Returns `false` when it was already present.
    pub fn add_tile(&mut self, tile: TileNo) -> bool {
        if self.index.contains_key(&tile) {
            return false;
        }
        self.index.insert(tile, self.tiles.len());
        self.tiles.push(tile);
        true
    }

    /// Add many tiles, returning how many were new.
    pub fn add_tiles<I>(&mut self, tiles: I) -> usize
    where
        I: IntoIterator<Item = TileNo>,
    {
        tiles.into_iter().filter(|t| self.add_tile(*t)).count()
    }

    /// Map GPS points onto this set's zoom level and add the resulting tiles.
    ///
    /// Points with non-finite or out-of-range coordinates are skipped.
    /// Returns how many tiles were new.
    pub fn add_coords<'a, I>(&mut self, coords: I) -> usize
    where
        I: IntoIterator<Item = &'a GpsPoint>,
    {
        let zoom = self.zoom;
        let mut skipped = 0usize;
        let added = coords
            .into_iter()
            .filter(|p| {
                let ok = p.is_valid();
                if !ok {
                    skipped += 1;
                }
                ok
            })
            .map(|p| map_to_tile(p.latitude, p.longitude, zoom).no())
            .filter(|t| self.add_tile(*t))
            .count();
        if skipped > 0 {
            debug!("[TileSet] Skipped {} invalid coordinates", skipped);
        }
        added
    }

    pub fn contains(&self, tile: &TileNo) -> bool {
        self.index.contains_key(tile)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles present in `self` but absent from `other`.
    pub fn diff(&self, other: &TileSet) -> TileSet {
        TileSet::from_tiles(
            self.zoom,
            self.tiles.iter().copied().filter(|t| !other.contains(t)),
        )
    }

    /// Add every tile of `other`, returning how many were new.
    pub fn union_with(&mut self, other: &TileSet) -> usize {
        self.add_tiles(other.iter())
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.index.clear();
    }

    /// Tiles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = TileNo> + '_ {
        self.tiles.iter().copied()
    }

    /// Tiles in insertion order with their zoom attached.
    pub fn to_tiles(&self) -> Vec<Tile> {
        self.tiles.iter().map(|t| t.at_zoom(self.zoom)).collect()
    }

    pub fn as_slice(&self) -> &[TileNo] {
        &self.tiles
    }

    /// Arena handle of a tile.
    pub fn index_of(&self, tile: &TileNo) -> Option<usize> {
        self.index.get(tile).copied()
    }

    /// Tile behind an arena handle.
    pub fn get(&self, index: usize) -> Option<TileNo> {
        self.tiles.get(index).copied()
    }
}

/// Set equality: same zoom and same tiles, regardless of insertion order.
impl PartialEq for TileSet {
    fn eq(&self, other: &Self) -> bool {
        self.zoom == other.zoom
            && self.len() == other.len()
            && self.tiles.iter().all(|t| other.contains(t))
    }
}

impl Eq for TileSet {}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tiles: &[(i32, i32)]) -> TileSet {
        TileSet::from_tiles(14, tiles.iter().map(|&(x, y)| TileNo::new(x, y)))
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut tiles = TileSet::new(14);
        assert!(tiles.add_tile(TileNo::new(1, 2)));
        assert!(!tiles.add_tile(TileNo::new(1, 2)));
        assert_eq!(tiles.len(), 1);
    }

    #[test]
    fn test_insertion_order_is_stable() {
        let tiles = set(&[(5, 5), (0, 0), (5, 5), (1, 0)]);
        let order: Vec<_> = tiles.iter().collect();
        assert_eq!(order, vec![TileNo::new(5, 5), TileNo::new(0, 0), TileNo::new(1, 0)]);
        assert_eq!(tiles.index_of(&TileNo::new(1, 0)), Some(2));
        assert_eq!(tiles.get(0), Some(TileNo::new(5, 5)));
    }

    #[test]
    fn test_add_coords_maps_and_dedupes() {
        let mut tiles = TileSet::new(14);
        let points = vec![
            GpsPoint::new(51.4760, -0.0080),
            GpsPoint::new(51.4761, -0.0081), // same tile
            GpsPoint::new(f64::NAN, 0.0),    // skipped
        ];
        assert_eq!(tiles.add_coords(&points), 1);
        assert!(tiles.contains(&TileNo::new(8191, 5450)));
    }

    #[test]
    fn test_diff() {
        let a = set(&[(0, 0), (1, 0), (2, 0)]);
        let b = set(&[(1, 0)]);
        let d = a.diff(&b);
        assert_eq!(d, set(&[(0, 0), (2, 0)]));
        assert!(b.diff(&a).is_empty());
    }

    #[test]
    fn test_clone_is_decoupled() {
        let original = set(&[(0, 0)]);
        let mut copy = original.clone();
        copy.add_tile(TileNo::new(1, 1));
        assert_eq!(original.len(), 1);
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn test_equality_ignores_order() {
        assert_eq!(set(&[(0, 0), (1, 1)]), set(&[(1, 1), (0, 0)]));
        assert_ne!(set(&[(0, 0)]), TileSet::from_tiles(15, [TileNo::new(0, 0)]));
    }

    #[test]
    fn test_clear() {
        let mut tiles = set(&[(0, 0), (1, 1)]);
        tiles.clear();
        assert!(tiles.is_empty());
        assert!(!tiles.contains(&TileNo::new(0, 0)));
        assert!(tiles.add_tile(TileNo::new(0, 0)));
    }
}
