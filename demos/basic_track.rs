//! Basic example of processing one GPS track.
//!
//! Run with: cargo run --example basic_track

use track_engine::{
    detect_stops, export::export_kml, max_weight, process_track, EngineConfig, Ping,
    StopDetectionConfig,
};

fn main() {
    // A vehicle crossing central Madrid with a long stop near Sol
    let raw = vec![
        Ping::new(1, 0, 40.4168, -3.7038).with_speed(0.0),
        Ping::new(2, 25 * 60_000, 40.4169, -3.7037).with_speed(18.0),
        Ping::new(3, 26 * 60_000, 40.4180, -3.7010).with_speed(35.0),
        Ping::new(4, 27 * 60_000, 40.4192, -3.6983).with_speed(38.0),
        Ping::new(5, 28 * 60_000, 40.4204, -3.6955).with_speed(36.0),
        Ping::new(6, 29 * 60_000, 40.4230, -3.6950).with_speed(22.0),
        Ping::new(7, 30 * 60_000, f64::NAN, f64::NAN).with_speed(20.0), // lost fix
        Ping::new(8, 31 * 60_000, 40.4260, -3.6948).with_speed(15.0),
    ];

    // Derive stop annotations from the raw fixes
    let stops = detect_stops(&raw, &StopDetectionConfig::default());
    println!("Track Processing Example\n");
    println!("Detected {} stop(s):", stops.len());
    for stop in &stops {
        println!(
            "   ping {} stopped for {:.0} min",
            stop.id,
            stop.stop_duration_minutes.unwrap_or(0.0)
        );
    }

    let track = track_engine::annotate_stops(&raw, &StopDetectionConfig::default());
    let config = EngineConfig::default();
    let processed = process_track(&track, &config);

    println!("\nSimplified {} pings to {}", track.len(), processed.simplified.len());
    for p in &processed.simplified {
        println!("   #{} ({:.4}, {:.4})", p.id, p.latitude, p.longitude);
    }

    println!("\n{} cluster(s):", processed.clusters.len());
    for c in &processed.clusters {
        println!("   center #{} with {} member(s)", c.center.id, c.member_count);
    }

    println!(
        "\n{} heat cell(s), max weight {:.3}",
        processed.heatmap.len(),
        max_weight(&processed.heatmap)
    );

    println!("\nKML:\n{}", export_kml(&processed.simplified, "Demo vehicle"));
}
