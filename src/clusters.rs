//! # Incremental Tile Clustering
//!
//! Groups the tiles of a [`TileSet`] into clusters of edge-connected tiles
//! (4-adjacency) and keeps that grouping up to date as new tiles arrive.
//!
//! ## Algorithm
//! 1. Every tile gets an arena handle from the accumulated tile set
//! 2. A disjoint-set forest over those handles tracks cluster membership
//!    (union by size, path halving)
//! 3. Adding a tile creates a singleton and unions it with each present
//!    neighbour, which also bridges clusters that the tile connects
//! 4. The largest cluster is tracked on every union, so the reporting cost of
//!    a warm update stays proportional to the number of new tiles
//!
//! The cold path is the same procedure started from an empty forest.
//!
//! ## Discovery order
//! A cluster is "discovered" at the smallest arena handle among its tiles.
//! Equal-sized clusters are ranked by discovery order, so identical input
//! always yields the same max cluster.

use log::{debug, warn};

use crate::tile::TileNo;
use crate::tile_set::TileSet;

// =============================================================================
// Disjoint-Set Forest
// =============================================================================

/// Union-find over arena handles.
#[derive(Debug, Clone, Default)]
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
    /// Smallest member handle, valid for roots only
    first: Vec<usize>,
}

impl DisjointSet {
    /// Append a singleton; its handle equals the previous length.
    fn push(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.size.push(1);
        self.first.push(id);
        id
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Root lookup without compression, for read-only projections.
    fn root(&self, mut i: usize) -> usize {
        while self.parent[i] != i {
            i = self.parent[i];
        }
        i
    }

    /// Merge the sets holding `a` and `b`. Returns the surviving root and
    /// whether two distinct sets were joined.
    fn union(&mut self, a: usize, b: usize) -> (usize, bool) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return (ra, false);
        }
        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.first[big] = self.first[big].min(self.first[small]);
        (big, true)
    }

    fn size_of_root(&self, root: usize) -> usize {
        self.size[root]
    }

    /// `a` ranks above `b`: larger, or equally large and discovered earlier.
    fn outranks(&self, a: usize, b: usize) -> bool {
        let (sa, sb) = (self.size[a], self.size[b]);
        sa > sb || (sa == sb && self.first[a] < self.first[b])
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Result of a clustering pass over a tile set.
///
/// The accumulated tiles and the union-find state are owned by the
/// classification so it can be handed back to [`classify`] for an incremental
/// update. The reporting sets (`max_cluster`, `minor_clusters`,
/// `detached_tiles`, `clusters`) are projections computed on demand; together
/// `max_cluster`, `minor_clusters` and `detached_tiles` partition `all_tiles`.
#[derive(Debug, Clone)]
pub struct ClusterClassification {
    all_tiles: TileSet,
    new_tiles: TileSet,
    forest: DisjointSet,
    max_root: Option<usize>,
    cluster_count: usize,
}

impl ClusterClassification {
    /// An empty classification at `zoom`.
    pub fn empty(zoom: u8) -> Self {
        Self {
            all_tiles: TileSet::new(zoom),
            new_tiles: TileSet::new(zoom),
            forest: DisjointSet::default(),
            max_root: None,
            cluster_count: 0,
        }
    }

    pub fn zoom(&self) -> u8 {
        self.all_tiles.zoom()
    }

    /// Every tile classified so far.
    pub fn all_tiles(&self) -> &TileSet {
        &self.all_tiles
    }

    /// Tiles added by the call that produced this classification.
    ///
    /// Always empty after a cold pass.
    pub fn new_tiles(&self) -> &TileSet {
        &self.new_tiles
    }

    /// Give up the accumulated tiles.
    pub fn into_all_tiles(self) -> TileSet {
        self.all_tiles
    }

    /// Number of clusters, singletons included.
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Size of the max cluster (0 when empty). O(1).
    pub fn max_cluster_size(&self) -> usize {
        self.max_root
            .map(|r| self.forest.size_of_root(self.forest.root(r)))
            .unwrap_or(0)
    }

    /// The cluster with the most tiles; ties go to the first discovered.
    ///
    /// `None` only when no tiles have been classified.
    pub fn max_cluster(&self) -> Option<TileSet> {
        let max = self.max_root.map(|r| self.forest.root(r))?;
        Some(self.collect(|root, _| root == max))
    }

    /// All tiles of clusters with two or more tiles, except the max cluster.
    pub fn minor_clusters(&self) -> TileSet {
        let max = self.max_root.map(|r| self.forest.root(r));
        self.collect(|root, size| Some(root) != max && size >= 2)
    }

    /// Tiles without any classified neighbour (clusters of size 1), except
    /// when that single tile is the max cluster.
    pub fn detached_tiles(&self) -> TileSet {
        let max = self.max_root.map(|r| self.forest.root(r));
        self.collect(|root, size| Some(root) != max && size == 1)
    }

    /// Every cluster, in discovery order.
    pub fn clusters(&self) -> Vec<TileSet> {
        let zoom = self.zoom();
        let n = self.all_tiles.len();
        let mut ordinal: Vec<Option<usize>> = vec![None; n];
        let mut clusters: Vec<TileSet> = Vec::with_capacity(self.cluster_count);

        for (i, tile) in self.all_tiles.iter().enumerate() {
            let root = self.forest.root(i);
            let slot = match ordinal[root] {
                Some(slot) => slot,
                None => {
                    clusters.push(TileSet::new(zoom));
                    ordinal[root] = Some(clusters.len() - 1);
                    clusters.len() - 1
                }
            };
            clusters[slot].add_tile(tile);
        }
        clusters
    }

    /// The cluster containing `tile`, if the tile is classified.
    pub fn cluster_of(&self, tile: &TileNo) -> Option<TileSet> {
        let root = self.forest.root(self.all_tiles.index_of(tile)?);
        Some(self.collect(|r, _| r == root))
    }

    /// Whether two classified tiles belong to the same cluster.
    pub fn same_cluster(&self, a: &TileNo, b: &TileNo) -> bool {
        match (self.all_tiles.index_of(a), self.all_tiles.index_of(b)) {
            (Some(ia), Some(ib)) => self.forest.root(ia) == self.forest.root(ib),
            _ => false,
        }
    }

    fn collect<F>(&self, keep: F) -> TileSet
    where
        F: Fn(usize, usize) -> bool,
    {
        let tiles = self.all_tiles.iter().enumerate().filter_map(|(i, tile)| {
            let root = self.forest.root(i);
            keep(root, self.forest.size_of_root(root)).then_some(tile)
        });
        TileSet::from_tiles(self.zoom(), tiles)
    }

    /// Add one tile and merge it with its classified neighbours.
    ///
    /// Returns `false` for a tile that was already classified.
    fn absorb(&mut self, tile: TileNo) -> bool {
        if !self.all_tiles.add_tile(tile) {
            return false;
        }
        let id = self.forest.push();
        self.cluster_count += 1;

        let mut root = id;
        for neighbor in tile.neighbors() {
            if let Some(nid) = self.all_tiles.index_of(&neighbor) {
                let (merged, joined) = self.forest.union(root, nid);
                if joined {
                    self.cluster_count -= 1;
                }
                root = merged;
            }
        }
        self.promote(root);
        true
    }

    /// Re-rank the max cluster after the cluster at `candidate` changed.
    fn promote(&mut self, candidate: usize) {
        let best = match self.max_root {
            None => candidate,
            Some(current) => {
                let current = self.forest.find(current);
                if current == candidate || self.forest.outranks(candidate, current) {
                    candidate
                } else {
                    current
                }
            }
        };
        self.max_root = Some(best);
    }
}

/// Classify `tiles` into clusters.
///
/// Without `previous` this is a cold pass over all of `tiles`. With
/// `previous`, its tiles are taken as already classified and only tiles of
/// `tiles` it does not contain are absorbed; `tiles` may be the full
/// accumulated set or just the latest additions. The cost of a warm call is
/// proportional to `tiles.len()`, not to the accumulated total.
///
/// A `previous` classification at a different zoom level is discarded.
///
/// # Example
/// ```
/// use tile_clusters::{classify, TileNo, TileSet};
///
/// let tiles = TileSet::from_tiles(14, [
///     TileNo::new(0, 0), TileNo::new(0, 1), TileNo::new(1, 0),
///     TileNo::new(1, 1), TileNo::new(5, 5),
/// ]);
/// let clusters = classify(&tiles, None);
/// assert_eq!(clusters.max_cluster_size(), 4);
/// assert!(clusters.detached_tiles().contains(&TileNo::new(5, 5)));
/// ```
pub fn classify(tiles: &TileSet, previous: Option<ClusterClassification>) -> ClusterClassification {
    let (mut classification, warm) = match previous {
        Some(prev) if prev.zoom() == tiles.zoom() => (prev, true),
        Some(prev) => {
            warn!(
                "[Clusters] Previous classification is at zoom {}, input at zoom {}; reclassifying from scratch",
                prev.zoom(),
                tiles.zoom()
            );
            (ClusterClassification::empty(tiles.zoom()), false)
        }
        None => (ClusterClassification::empty(tiles.zoom()), false),
    };

    let mut new_tiles = TileSet::new(tiles.zoom());
    for tile in tiles.iter() {
        if classification.absorb(tile) && warm {
            new_tiles.add_tile(tile);
        }
    }
    classification.new_tiles = new_tiles;

    debug!(
        "[Clusters] {} tiles, {} new, {} clusters, max cluster {}",
        classification.all_tiles.len(),
        classification.new_tiles.len(),
        classification.cluster_count,
        classification.max_cluster_size()
    );

    classification
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tiles: &[(i32, i32)]) -> TileSet {
        TileSet::from_tiles(14, tiles.iter().map(|&(x, y)| TileNo::new(x, y)))
    }

    /// Deterministic pseudo-random tiles inside a `size × size` window.
    fn random_tiles(seed: &mut u64, count: usize, size: i32) -> Vec<TileNo> {
        (0..count)
            .map(|_| {
                *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let x = ((*seed >> 33) % size as u64) as i32;
                *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let y = ((*seed >> 33) % size as u64) as i32;
                TileNo::new(x, y)
            })
            .collect()
    }

    /// Reference labelling by flood fill.
    fn flood_fill_components(tiles: &TileSet) -> Vec<TileSet> {
        let mut seen = TileSet::new(tiles.zoom());
        let mut components = Vec::new();
        for start in tiles.iter() {
            if seen.contains(&start) {
                continue;
            }
            let mut component = TileSet::new(tiles.zoom());
            let mut stack = vec![start];
            seen.add_tile(start);
            while let Some(t) = stack.pop() {
                component.add_tile(t);
                for n in t.neighbors() {
                    if tiles.contains(&n) && seen.add_tile(n) {
                        stack.push(n);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    #[test]
    fn test_empty_set() {
        let clusters = classify(&TileSet::new(14), None);
        assert!(clusters.max_cluster().is_none());
        assert_eq!(clusters.max_cluster_size(), 0);
        assert!(clusters.minor_clusters().is_empty());
        assert!(clusters.detached_tiles().is_empty());
        assert!(clusters.clusters().is_empty());
    }

    #[test]
    fn test_square_with_detached_tile() {
        let clusters = classify(&set(&[(0, 0), (0, 1), (1, 0), (1, 1), (5, 5)]), None);
        assert_eq!(clusters.max_cluster(), Some(set(&[(0, 0), (0, 1), (1, 0), (1, 1)])));
        assert_eq!(clusters.detached_tiles(), set(&[(5, 5)]));
        assert!(clusters.minor_clusters().is_empty());
        assert_eq!(clusters.cluster_count(), 2);
        assert!(clusters.new_tiles().is_empty());
    }

    #[test]
    fn test_equal_size_tie_goes_to_first_discovered() {
        let a = [(0, 0), (1, 0), (2, 0)];
        let b = [(10, 10), (10, 11), (10, 12)];
        let tiles = set(&[a[0], a[1], a[2], b[0], b[1], b[2]]);
        let clusters = classify(&tiles, None);
        assert_eq!(clusters.max_cluster(), Some(set(&a)));
        assert_eq!(clusters.minor_clusters(), set(&b));

        // Same tiles, B inserted first
        let tiles = set(&[b[0], b[1], b[2], a[0], a[1], a[2]]);
        assert_eq!(classify(&tiles, None).max_cluster(), Some(set(&b)));
    }

    #[test]
    fn test_diagonal_tiles_are_not_connected() {
        let clusters = classify(&set(&[(0, 0), (1, 1)]), None);
        assert_eq!(clusters.cluster_count(), 2);
        assert!(!clusters.same_cluster(&TileNo::new(0, 0), &TileNo::new(1, 1)));
    }

    #[test]
    fn test_singletons_only() {
        let clusters = classify(&set(&[(0, 0), (2, 2), (4, 4)]), None);
        assert_eq!(clusters.max_cluster(), Some(set(&[(0, 0)])));
        assert_eq!(clusters.detached_tiles(), set(&[(2, 2), (4, 4)]));
    }

    #[test]
    fn test_warm_path_bridges_clusters() {
        let first = classify(&set(&[(0, 0), (1, 0), (3, 0), (4, 0), (4, 1)]), None);
        assert_eq!(first.cluster_count(), 2);
        assert_eq!(first.max_cluster_size(), 3);

        let second = classify(&set(&[(2, 0)]), Some(first));
        assert_eq!(second.cluster_count(), 1);
        assert_eq!(second.max_cluster_size(), 6);
        assert_eq!(second.new_tiles(), &set(&[(2, 0)]));
        assert!(second.same_cluster(&TileNo::new(0, 0), &TileNo::new(4, 1)));
    }

    #[test]
    fn test_new_tiles_with_full_set_input() {
        let first = classify(&set(&[(0, 0), (1, 0)]), None);
        let second = classify(&set(&[(0, 0), (1, 0), (7, 7), (1, 0)]), Some(first));
        assert_eq!(second.new_tiles(), &set(&[(7, 7)]));
        assert_eq!(second.all_tiles().len(), 3);
    }

    #[test]
    fn test_idempotent_insertion() {
        let first = classify(&set(&[(0, 0), (1, 0)]), None);
        let again = classify(&set(&[(1, 0)]), Some(first.clone()));
        assert_eq!(again.all_tiles(), first.all_tiles());
        assert_eq!(again.max_cluster(), first.max_cluster());
        assert!(again.new_tiles().is_empty());
    }

    #[test]
    fn test_zoom_mismatch_falls_back_to_cold() {
        let first = classify(&set(&[(0, 0)]), None);
        let other = TileSet::from_tiles(15, [TileNo::new(3, 3)]);
        let second = classify(&other, Some(first));
        assert_eq!(second.zoom(), 15);
        assert_eq!(second.all_tiles().len(), 1);
        assert!(second.new_tiles().is_empty());
    }

    #[test]
    fn test_partition_covers_all_tiles() {
        let mut seed = 7;
        let tiles = TileSet::from_tiles(14, random_tiles(&mut seed, 300, 30));
        let clusters = classify(&tiles, None);

        let max = clusters.max_cluster().unwrap();
        let minor = clusters.minor_clusters();
        let detached = clusters.detached_tiles();
        assert_eq!(max.len() + minor.len() + detached.len(), tiles.len());
        assert!(max.diff(&minor).len() == max.len());
        assert!(detached.diff(&minor).len() == detached.len());
    }

    #[test]
    fn test_matches_flood_fill() {
        let mut seed = 42;
        let tiles = TileSet::from_tiles(14, random_tiles(&mut seed, 400, 35));
        let clusters = classify(&tiles, None);
        let expected = flood_fill_components(&tiles);

        let actual = clusters.clusters();
        assert_eq!(actual.len(), expected.len());
        assert_eq!(clusters.cluster_count(), expected.len());
        // Both enumerate components by their first tile in insertion order
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_eq!(a, e);
        }

        let largest = expected.iter().map(|c| c.len()).max().unwrap();
        assert_eq!(clusters.max_cluster_size(), largest);
    }

    #[test]
    fn test_bulk_and_incremental_agree() {
        let mut seed = 1234;
        let batches: Vec<Vec<TileNo>> = (0..12).map(|_| random_tiles(&mut seed, 40, 25)).collect();

        let mut assembled = TileSet::new(14);
        let mut incremental: Option<ClusterClassification> = None;
        for batch in &batches {
            assembled.add_tiles(batch.iter().copied());
            let delta = TileSet::from_tiles(14, batch.iter().copied());
            incremental = Some(classify(&delta, incremental));
        }
        let incremental = incremental.unwrap();
        let bulk = classify(&assembled, None);

        assert_eq!(incremental.all_tiles(), bulk.all_tiles());
        assert_eq!(incremental.max_cluster(), bulk.max_cluster());
        assert_eq!(incremental.minor_clusters(), bulk.minor_clusters());
        assert_eq!(incremental.detached_tiles(), bulk.detached_tiles());
        assert_eq!(incremental.cluster_count(), bulk.cluster_count());
    }

    #[test]
    fn test_max_cluster_grows_monotonically() {
        let mut seed = 99;
        let mut classification: Option<ClusterClassification> = None;
        let mut previous_max = 0;
        for tile in random_tiles(&mut seed, 500, 20) {
            let next = classify(&TileSet::from_tiles(14, [tile]), classification);
            assert!(next.max_cluster_size() >= previous_max);
            previous_max = next.max_cluster_size();
            classification = Some(next);
        }
    }

    #[test]
    fn test_cluster_of() {
        let clusters = classify(&set(&[(0, 0), (0, 1), (5, 5)]), None);
        assert_eq!(clusters.cluster_of(&TileNo::new(0, 1)), Some(set(&[(0, 0), (0, 1)])));
        assert!(clusters.cluster_of(&TileNo::new(9, 9)).is_none());
    }
}
