//! Example of processing many track layers at once.
//!
//! Run with: cargo run --example batch_layers --features parallel

use std::time::Instant;
use track_engine::{process_tracks, process_tracks_parallel, EngineConfig, Ping, TrackLayer};

/// A synthetic zig-zag track with a stop every `stop_every` pings.
fn synthetic_track(seed: usize, len: usize, stop_every: usize) -> Vec<Ping> {
    let base_lat = 40.40 + seed as f64 * 0.01;
    (0..len)
        .map(|i| {
            let lat = base_lat + i as f64 * 0.0006;
            let zig = if i % 8 < 4 { i % 4 } else { 4 - i % 4 };
            let lon = -3.70 + zig as f64 * 0.0005;
            let ping = Ping::new(i as i64, i as i64 * 45_000, lat, lon).with_speed(10.0 + (i % 7) as f64 * 6.0);
            if i % stop_every == 0 {
                ping.with_stop_duration(8.0)
            } else {
                ping
            }
        })
        .collect()
}

fn main() {
    println!("Batch Layer Processing Example\n");

    let layers: Vec<TrackLayer> = (0..24)
        .map(|i| TrackLayer {
            name: format!("plate-{:04}", i),
            points: synthetic_track(i, 5_000, 97),
        })
        .collect();
    let total: usize = layers.iter().map(|l| l.points.len()).sum();
    println!("Processing {} layers ({} pings total)\n", layers.len(), total);

    let config = EngineConfig::default();

    let start = Instant::now();
    let sequential = process_tracks(&layers, &config);
    println!("Sequential: {:?}", start.elapsed());

    let start = Instant::now();
    let parallel = process_tracks_parallel(&layers, &config);
    println!("Parallel:   {:?}", start.elapsed());

    assert_eq!(sequential, parallel);

    println!("\nPer layer:");
    for layer in parallel.iter().take(5) {
        println!(
            "   {}: {} kept, {} clusters, {} heat cells",
            layer.name,
            layer.track.simplified.len(),
            layer.track.clusters.len(),
            layer.track.heatmap.len()
        );
    }
    println!("   ...");
}
