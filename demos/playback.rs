//! Example of replaying a trajectory in real time.
//!
//! Run with: cargo run --example playback

use std::thread;

use track_engine::playback::FRAME_INTERVAL;
use track_engine::{Ping, PlaybackConfig, PlaybackController, PlaybackStatus, TickOutcome};

fn main() {
    let trajectory: Vec<Ping> = (0..6)
        .map(|i| Ping::new(i, i * 60_000, 40.4168 + i as f64 * 0.001, -3.7038 + i as f64 * 0.0005))
        .collect();

    let config = PlaybackConfig::default();
    let mut player = PlaybackController::with_system_clock(trajectory, &config);
    if let Err(e) = player.set_speed_multiplier(8.0) {
        eprintln!("{}", e);
        return;
    }

    println!("Playback Example (8x)\n");
    player.play();

    while player.status() == PlaybackStatus::Playing {
        thread::sleep(FRAME_INTERVAL);
        match player.tick() {
            TickOutcome::Advanced(i) | TickOutcome::Finished(i) => {
                println!("   cursor -> {} ({:.0}%)", i, player.progress() * 100.0);
            }
            TickOutcome::Waiting | TickOutcome::Idle => {}
        }
    }

    if let Some(pos) = player.interpolated_position() {
        println!("\nFinished at ({:.4}, {:.4})", pos.latitude, pos.longitude);
    }
}
