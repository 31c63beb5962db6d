//! Grow a random tile coverage and watch the clusters evolve.
//!
//! Run with: cargo run --example tile_coverage

use std::time::Instant;

use tile_clusters::{
    boundaries, center_square, classify, maximal_inscribed_square, ClusterClassification, TileNo,
    TileSet,
};

/// Small deterministic generator so runs are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: i32) -> i32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as i32
    }
}

fn main() {
    let zoom = 14;
    let (origin_x, origin_y) = (8180, 5440);
    let edge = 24;
    let mut rng = Lcg(42);

    println!("Tile Coverage Example\n");
    println!("Adding random tiles inside a {}x{} window at z{}\n", edge, edge, zoom);

    let mut state = ClusterClassification::empty(zoom);
    for round in 1..=8 {
        // Each round plays the part of one track
        let mut track = TileSet::new(zoom);
        for _ in 0..60 {
            track.add_tile(TileNo::new(origin_x + rng.next(edge), origin_y + rng.next(edge)));
        }

        let start = Instant::now();
        state = classify(&track, Some(state));
        let elapsed = start.elapsed();

        println!(
            "Round {}: +{:3} new tiles, {:3} total, {:3} clusters, max cluster {:3} ({:?})",
            round,
            state.new_tiles().len(),
            state.all_tiles().len(),
            state.cluster_count(),
            state.max_cluster_size(),
            elapsed
        );
    }

    let Some(max) = state.max_cluster() else {
        return;
    };

    println!("\nMax cluster:");
    println!("  Tiles:     {}", max.len());
    println!("  Minor:     {}", state.minor_clusters().len());
    println!("  Detached:  {}", state.detached_tiles().len());
    if let Some(square) = maximal_inscribed_square(&max) {
        println!("  Square:    {}x{} at ({}, {})", square.size, square.size, square.x, square.y);
    }
    if let Some(square) = center_square(&max) {
        println!("  Centered:  {}x{} at ({}, {})", square.size, square.size, square.x, square.y);
    }
    for contour in boundaries(&max) {
        println!("  {:?} contour with {} corners", contour.kind, contour.vertices.len() - 1);
    }

    // A cold pass over everything yields the same clusters
    let cold = classify(state.all_tiles(), None);
    assert_eq!(cold.max_cluster(), Some(max));
    println!("\nCold reclassification agrees with the incremental result");
}
