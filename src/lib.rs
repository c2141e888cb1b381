//! # Track Engine
//!
//! GPS track processing for case analysis maps: turns a raw, chronologically
//! ordered position history into what a map layer draws.
//!
//! This library provides:
//! - Track simplification that keeps turns, stops and speed changes
//! - Proximity clustering of co-located pings into counted markers
//! - Dwell-weighted heatmaps where lingering outweighs passing through
//! - A clock-driven playback controller with smooth marker interpolation
//! - Stop detection, filtering, JSON ingest and KML/GPX export
//!
//! ## Features
//!
//! - **`parallel`** - Process many layers at once with rayon
//! - **`async`** - Offload heavy work onto tokio's blocking pool
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_engine::{Ping, EngineConfig, process_track};
//!
//! let track = vec![
//!     Ping::new(1, 0, 40.4168, -3.7038).with_speed(0.0).with_stop_duration(25.0),
//!     Ping::new(2, 25 * 60_000, 40.4168, -3.7038).with_speed(35.0),
//!     Ping::new(3, 27 * 60_000, 40.4230, -3.6950).with_speed(40.0),
//! ];
//!
//! let processed = process_track(&track, &EngineConfig::default());
//! assert_eq!(processed.simplified.len(), 3);
//! assert_eq!(processed.clusters.len(), 2);
//! assert_eq!(processed.heatmap.len(), 2);
//! ```

use std::borrow::Cow;

use log::debug;
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Result, TrackError};

pub mod geo_utils;

// Core algorithms
pub mod simplify;
pub use simplify::{simplify_indices, simplify_track, SimplifyConfig};

pub mod cluster;
pub use cluster::{cluster_center, cluster_points, Cluster, ClusterConfig, DEFAULT_CLUSTER_DISTANCE_KM};

pub mod heatmap;
pub use heatmap::{build_heatmap, heat_key, max_weight, query_heat_cell, HeatCell, HeatmapConfig};

pub mod playback;
pub use playback::{
    Clock, ManualClock, PlaybackConfig, PlaybackController, PlaybackState, PlaybackStatus,
    SystemClock, TickOutcome, PLAYBACK_SPEEDS,
};

// Track preparation and interchange
pub mod stops;
pub use stops::{annotate_stops, detect_stops, StopDetectionConfig};

pub mod filter;
pub use filter::{filter_track, TrackFilter};

pub mod ingest;
pub mod export;

pub mod config;
pub use config::EngineConfig;

#[cfg(feature = "async")]
pub mod offload;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TrackEngineRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// One timestamped position fix.
///
/// Coordinates may be `NaN` when the source record had none; such pings stay
/// in the track (they still carry time and speed) but every geometric step
/// skips them. Check [`Ping::has_valid_coordinates`] before using the position.
///
/// # Example
/// ```
/// use track_engine::Ping;
///
/// let ping = Ping::new(7, 1_709_287_200_000, 40.4168, -3.7038)
///     .with_speed(48.0)
///     .with_stop_duration(12.0);
/// assert!(ping.has_valid_coordinates());
/// assert!(ping.is_stop());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Ping {
    /// Record identifier, unique within a track
    pub id: i64,
    /// Unix milliseconds (UTC)
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// km/h, when the source reported it
    pub speed: Option<f64>,
    /// Length of a stop that began at this ping (minutes)
    pub stop_duration_minutes: Option<f64>,
}

impl Ping {
    /// Create a ping without speed or stop annotation.
    pub fn new(id: i64, timestamp: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            timestamp,
            latitude,
            longitude,
            speed: None,
            stop_duration_minutes: None,
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed = Some(speed_kmh);
        self
    }

    pub fn with_stop_duration(mut self, minutes: f64) -> Self {
        self.stop_duration_minutes = Some(minutes);
        self
    }

    /// Both coordinates finite and inside WGS84 ranges.
    #[inline]
    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Speed in km/h, `0.0` when unknown.
    #[inline]
    pub fn speed_or_zero(&self) -> f64 {
        self.speed.filter(|s| s.is_finite()).unwrap_or(0.0)
    }

    /// True when the ping carries a positive stop duration.
    #[inline]
    pub fn is_stop(&self) -> bool {
        self.stop_duration_minutes.is_some_and(|d| d > 0.0)
    }

    /// Position, if the coordinates are valid.
    pub fn position(&self) -> Option<GeoPosition> {
        self.has_valid_coordinates()
            .then(|| GeoPosition::new(self.latitude, self.longitude))
    }
}

/// A rendered map position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Inclusive containment test.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lng
            && longitude <= self.max_lng
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPosition {
        GeoPosition::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Everything a map layer needs for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ProcessedTrack {
    /// Kept pings, in input order
    pub simplified: Vec<Ping>,
    /// Markers over the simplified track
    pub clusters: Vec<Cluster>,
    /// Heat cells over the simplified track, empty when disabled
    pub heatmap: Vec<HeatCell>,
}

/// A named track, e.g. one vehicle plate in a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackLayer {
    pub name: String,
    pub points: Vec<Ping>,
}

/// Result for one [`TrackLayer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ProcessedLayer {
    pub name: String,
    pub track: ProcessedTrack,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Simplify a track, then cluster and heat-map what was kept.
///
/// With `detect_stops` set, stop durations are first derived from the raw
/// fixes so the simplifier keeps them and the heatmap weights them.
pub fn process_track(points: &[Ping], config: &EngineConfig) -> ProcessedTrack {
    let points: Cow<'_, [Ping]> = if config.detect_stops {
        Cow::Owned(annotate_stops(points, &config.stops))
    } else {
        Cow::Borrowed(points)
    };

    let simplified = simplify_track(&points, &config.simplify);
    let clusters = cluster_points(&simplified, config.cluster.max_distance_km);
    let heatmap = build_heatmap(&simplified, &config.heatmap);

    debug!(
        "[TrackEngine] processed {} pings -> {} kept, {} clusters, {} heat cells",
        points.len(),
        simplified.len(),
        clusters.len(),
        heatmap.len()
    );

    ProcessedTrack {
        simplified,
        clusters,
        heatmap,
    }
}

/// [`process_track`] over several layers, in order.
pub fn process_tracks(layers: &[TrackLayer], config: &EngineConfig) -> Vec<ProcessedLayer> {
    layers
        .iter()
        .map(|layer| ProcessedLayer {
            name: layer.name.clone(),
            track: process_track(&layer.points, config),
        })
        .collect()
}

/// Process layers using parallel processing.
///
/// This is the same as `process_tracks` but spreads the layers over rayon's
/// thread pool. Output order matches input order.
#[cfg(feature = "parallel")]
pub fn process_tracks_parallel(layers: &[TrackLayer], config: &EngineConfig) -> Vec<ProcessedLayer> {
    use rayon::prelude::*;

    let start = std::time::Instant::now();
    let results: Vec<ProcessedLayer> = layers
        .par_iter()
        .map(|layer| ProcessedLayer {
            name: layer.name.clone(),
            track: process_track(&layer.points, config),
        })
        .collect();

    log::info!("[TrackEngine] processed {} layers in parallel in {:?}", results.len(), start.elapsed());
    results
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{info, warn};
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Simplify a track with the given configuration.
    #[uniffi::export]
    pub fn ffi_simplify_track(points: Vec<Ping>, config: SimplifyConfig) -> Vec<Ping> {
        init_logging();
        simplify_track(&points, &config)
    }

    /// Cluster co-located pings.
    #[uniffi::export]
    pub fn ffi_cluster_points(points: Vec<Ping>, max_distance_km: f64) -> Vec<Cluster> {
        init_logging();
        cluster_points(&points, max_distance_km)
    }

    /// Build dwell-weighted heat cells.
    #[uniffi::export]
    pub fn ffi_build_heatmap(points: Vec<Ping>, config: HeatmapConfig) -> Vec<HeatCell> {
        init_logging();
        build_heatmap(&points, &config)
    }

    #[uniffi::export]
    pub fn ffi_detect_stops(points: Vec<Ping>, config: StopDetectionConfig) -> Vec<Ping> {
        init_logging();
        detect_stops(&points, &config)
    }

    #[uniffi::export]
    pub fn ffi_filter_track(points: Vec<Ping>, filter: TrackFilter) -> Vec<Ping> {
        filter_track(&points, &filter)
    }

    /// Full pipeline for one track.
    #[uniffi::export]
    pub fn ffi_process_track(points: Vec<Ping>, config: EngineConfig) -> ProcessedTrack {
        init_logging();
        info!("[TrackEngineRust] process_track called with {} pings", points.len());

        let start = std::time::Instant::now();
        let result = process_track(&points, &config);
        info!(
            "[TrackEngineRust] {} pings -> {} kept in {:?}",
            points.len(),
            result.simplified.len(),
            start.elapsed()
        );
        result
    }

    /// Full pipeline for many layers (parallel).
    #[uniffi::export]
    pub fn ffi_process_layers(layers: Vec<TrackLayer>, config: EngineConfig) -> Vec<ProcessedLayer> {
        init_logging();
        info!("[TrackEngineRust] process_layers called with {} layers", layers.len());

        let start = std::time::Instant::now();
        let result = process_tracks_parallel(&layers, &config);
        info!("[TrackEngineRust] processed {} layers in {:?}", result.len(), start.elapsed());
        result
    }

    /// Decode position records; `None` if the JSON is unusable.
    #[uniffi::export]
    pub fn ffi_parse_pings_json(json: String) -> Option<Vec<Ping>> {
        init_logging();
        match crate::ingest::parse_pings_json(&json) {
            Ok(pings) => Some(pings),
            Err(e) => {
                warn!("[TrackEngineRust] ingest failed: {}", e);
                None
            }
        }
    }

    #[uniffi::export]
    pub fn ffi_export_kml(points: Vec<Ping>, name: String) -> String {
        crate::export::export_kml(&points, &name)
    }

    #[uniffi::export]
    pub fn ffi_export_gpx(points: Vec<Ping>, name: String) -> String {
        crate::export::export_gpx(&points, &name)
    }

    /// Get default configuration.
    #[uniffi::export]
    pub fn default_engine_config() -> EngineConfig {
        init_logging();
        EngineConfig::default()
    }

    /// Speed choices for the playback control.
    #[uniffi::export]
    pub fn playback_speeds() -> Vec<f64> {
        PLAYBACK_SPEEDS.to_vec()
    }

    /// Frame snapshot for the host renderer
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct PlaybackFrame {
        pub is_playing: bool,
        pub cursor_index: u32,
        pub speed_multiplier: f64,
        pub progress: f64,
        pub position: Option<GeoPosition>,
    }

    /// Wall-clock playback handle for hosts that drive ticks from their own
    /// frame loop.
    #[derive(uniffi::Object)]
    pub struct TrackPlayback {
        inner: Mutex<PlaybackController<SystemClock>>,
    }

    impl TrackPlayback {
        fn controller(&self) -> MutexGuard<'_, PlaybackController<SystemClock>> {
            self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    #[uniffi::export]
    impl TrackPlayback {
        #[uniffi::constructor]
        pub fn new(trajectory: Vec<Ping>, config: PlaybackConfig) -> Arc<Self> {
            init_logging();
            Arc::new(Self {
                inner: Mutex::new(PlaybackController::with_system_clock(trajectory, &config)),
            })
        }

        pub fn play(&self) {
            self.controller().play();
        }

        pub fn pause(&self) {
            self.controller().pause();
        }

        pub fn stop(&self) {
            self.controller().stop();
        }

        pub fn seek(&self, index: i64) {
            self.controller().seek(index);
        }

        /// Returns false and keeps the old rate when `multiplier` is unusable.
        pub fn set_speed_multiplier(&self, multiplier: f64) -> bool {
            match self.controller().set_speed_multiplier(multiplier) {
                Ok(()) => true,
                Err(e) => {
                    warn!("[TrackEngineRust] {}", e);
                    false
                }
            }
        }

        pub fn set_trajectory(&self, trajectory: Vec<Ping>) {
            self.controller().set_trajectory(trajectory);
        }

        /// Advance and return the frame to draw.
        pub fn tick(&self) -> PlaybackFrame {
            let mut controller = self.controller();
            controller.tick();
            let state = controller.state();
            PlaybackFrame {
                is_playing: state.is_playing,
                cursor_index: state.cursor_index as u32,
                speed_multiplier: state.speed_multiplier,
                progress: controller.progress(),
                position: state.interpolated_position,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
