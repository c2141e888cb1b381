//! Background dispatch of the heavy computations.
//!
//! Simplification and heatmap building are pure CPU work; on large tracks they
//! would stall an async host's reactor. These wrappers move them onto tokio's
//! blocking pool and hand the result back as a future. Inputs are owned so the
//! caller keeps nothing borrowed across the await.

use log::warn;
use tokio::task::{self, JoinError};

use crate::error::{Result, TrackError};
use crate::heatmap::{build_heatmap, HeatCell, HeatmapConfig};
use crate::simplify::{simplify_track, SimplifyConfig};
use crate::{process_track, EngineConfig, Ping, ProcessedTrack};

fn worker_error(err: JoinError) -> TrackError {
    warn!("[TrackEngine] background task failed: {}", err);
    TrackError::Worker(err.to_string())
}

/// [`simplify_track`] on the blocking pool.
pub async fn simplify_in_background(points: Vec<Ping>, config: SimplifyConfig) -> Result<Vec<Ping>> {
    task::spawn_blocking(move || simplify_track(&points, &config))
        .await
        .map_err(worker_error)
}

/// [`build_heatmap`] on the blocking pool.
pub async fn heatmap_in_background(points: Vec<Ping>, config: HeatmapConfig) -> Result<Vec<HeatCell>> {
    task::spawn_blocking(move || build_heatmap(&points, &config))
        .await
        .map_err(worker_error)
}

/// [`process_track`] on the blocking pool.
pub async fn process_in_background(points: Vec<Ping>, config: EngineConfig) -> Result<ProcessedTrack> {
    task::spawn_blocking(move || process_track(&points, &config))
        .await
        .map_err(worker_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Vec<Ping> {
        (0..50)
            .map(|i| Ping::new(i, i * 60_000, 40.0 + i as f64 * 0.001, -3.7).with_speed(30.0))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_simplify_matches_inline() {
        let config = SimplifyConfig::default();
        let inline = simplify_track(&track(), &config);
        let offloaded = simplify_in_background(track(), config).await.unwrap();
        assert_eq!(offloaded, inline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_heatmap_matches_inline() {
        let config = HeatmapConfig::default();
        let inline = build_heatmap(&track(), &config);
        let offloaded = heatmap_in_background(track(), config).await.unwrap();
        assert_eq!(offloaded, inline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_process_in_background() {
        let processed = process_in_background(track(), EngineConfig::default()).await.unwrap();
        assert!(!processed.simplified.is_empty());
        assert_eq!(processed.clusters.len(), processed.simplified.len());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_worker_maps_to_error() {
        let result = task::spawn_blocking(|| -> Vec<Ping> { panic!("boom") })
            .await
            .map_err(worker_error);
        assert!(matches!(result, Err(TrackError::Worker(_))));
    }
}
