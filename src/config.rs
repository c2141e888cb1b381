//! Engine-wide configuration.
//!
//! Each component owns its config struct with sensible defaults;
//! [`EngineConfig`] bundles them so a host can load every knob from a single
//! JSON document. Missing sections and fields fall back to their defaults.
//!
//! ```rust
//! use track_engine::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{
//!     "heatmap": { "intensity_multiplier": 2.5 },
//!     "playback": { "speed_multiplier": 4 }
//! }"#).unwrap();
//!
//! assert_eq!(config.heatmap.intensity_multiplier, 2.5);
//! assert_eq!(config.simplify.min_distance_km, 0.05);
//! ```

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterConfig;
use crate::error::{Result, TrackError};
use crate::heatmap::{HeatmapConfig, INTENSITY_MULTIPLIER_RANGE};
use crate::playback::{Clock, PlaybackConfig, PlaybackController};
use crate::simplify::SimplifyConfig;
use crate::stops::StopDetectionConfig;
use crate::Ping;

/// All component configurations in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct EngineConfig {
    pub simplify: SimplifyConfig,
    pub cluster: ClusterConfig,
    pub heatmap: HeatmapConfig,
    pub playback: PlaybackConfig,
    pub stops: StopDetectionConfig,
    /// Derive stop durations from raw fixes with `stops` before the rest of
    /// [`process_track`](crate::process_track) runs (default false)
    pub detect_stops: bool,
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrackError::config(field, format!("must be finite and >= 0, got {}", value)))
    }
}

fn positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackError::config(field, format!("must be finite and > 0, got {}", value)))
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON from any byte source (e.g. an open file).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Playback controller over `trajectory` using the `playback` section.
    pub fn playback_controller<C: Clock>(&self, trajectory: Vec<Ping>, clock: C) -> PlaybackController<C> {
        PlaybackController::new(trajectory, &self.playback, clock)
    }

    /// Check every value against its accepted range.
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<()> {
        let s = &self.simplify;
        non_negative("simplify.min_distance_km", s.min_distance_km)?;
        non_negative("simplify.straight_min_distance_km", s.straight_min_distance_km)?;
        non_negative("simplify.speed_change_threshold_kmh", s.speed_change_threshold_kmh)?;
        non_negative("simplify.moving_speed_kmh", s.moving_speed_kmh)?;
        if !(0.0..=180.0).contains(&s.max_turn_angle_deg) {
            return Err(TrackError::config(
                "simplify.max_turn_angle_deg",
                format!("must be within [0, 180], got {}", s.max_turn_angle_deg),
            ));
        }

        non_negative("cluster.max_distance_km", self.cluster.max_distance_km)?;

        let h = &self.heatmap;
        let (min, max) = INTENSITY_MULTIPLIER_RANGE;
        if !(min..=max).contains(&h.intensity_multiplier) {
            return Err(TrackError::config(
                "heatmap.intensity_multiplier",
                format!("must be within [{}, {}], got {}", min, max, h.intensity_multiplier),
            ));
        }
        non_negative("heatmap.base_weight", h.base_weight)?;
        non_negative("heatmap.dwell_factor", h.dwell_factor)?;
        non_negative("heatmap.min_dwell_gap_minutes", h.min_dwell_gap_minutes)?;
        non_negative("heatmap.same_spot_km", h.same_spot_km)?;

        let p = &self.playback;
        if !p.speed_multiplier.is_finite() || p.speed_multiplier <= 0.0 {
            return Err(TrackError::InvalidSpeedMultiplier(p.speed_multiplier));
        }
        positive("playback.step_interval_ms", p.step_interval_ms)?;
        positive("playback.interpolation_ms", p.interpolation_ms)?;

        let st = &self.stops;
        non_negative("stops.min_duration_minutes", st.min_duration_minutes)?;
        non_negative("stops.max_speed_kmh", st.max_speed_kmh)?;
        non_negative("stops.max_distance_km", st.max_distance_km)?;

        Ok(())
    }
}
