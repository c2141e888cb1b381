//! Dwell heatmap generation.
//!
//! Turns a track into weighted cells where the weight reflects how long the
//! subject stayed at each spot, not just how often it was sampled there:
//! - every ping contributes a small base weight
//! - consecutive pings at the same spot more than a minute apart mark a stop
//!   zone, and every ping in that zone gains `ln(minutes + 1) * 0.7`
//! - a ping with an explicit stop duration gains `ln(duration + 1) * 0.7` on
//!   top, independently of the inferred zone
//!
//! Cells are keyed on coordinates rounded to 5 decimal places (about 1.1 m),
//! which absorbs sensor jitter without merging distinct parking spots.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_distance_km;
use crate::Ping;

/// Grid resolution: 10^5 cells per degree (5 decimal places)
const GRID_SCALE: f64 = 100_000.0;

/// Default scale applied to every cell weight
pub const DEFAULT_INTENSITY_MULTIPLIER: f64 = 1.65;

/// Accepted range for the intensity multiplier in configuration files
pub const INTENSITY_MULTIPLIER_RANGE: (f64, f64) = (1.25, 5.0);

/// Configuration for heatmap generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct HeatmapConfig {
    /// When false, [`build_heatmap`] returns no cells
    pub enabled: bool,
    /// Scales every weight without changing proportions (default 1.65)
    pub intensity_multiplier: f64,
    /// Weight of a single transient ping (default 0.02)
    pub base_weight: f64,
    /// Factor on `ln(minutes + 1)` for dwell contributions (default 0.7)
    pub dwell_factor: f64,
    /// Gap between consecutive pings that counts as dwelling (minutes, default 1)
    pub min_dwell_gap_minutes: f64,
    /// Pings closer than this are at the same spot (km, default 0.0001)
    pub same_spot_km: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity_multiplier: DEFAULT_INTENSITY_MULTIPLIER,
            base_weight: 0.02,
            dwell_factor: 0.7,
            min_dwell_gap_minutes: 1.0,
            same_spot_km: 0.0001,
        }
    }
}

/// A single weighted heatmap cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HeatCell {
    /// Rounded cell latitude
    pub latitude: f64,
    /// Rounded cell longitude
    pub longitude: f64,
    /// Non-negative intensity
    pub weight: f64,
}

impl HeatCell {
    /// `[lat, lon, weight]`, the shape heat-layer renderers expect.
    pub fn as_triple(&self) -> [f64; 3] {
        [self.latitude, self.longitude, self.weight]
    }
}

/// Grid coordinate: latitude and longitude scaled by 10^5 and rounded
pub type CellKey = (i64, i64);

/// Grid key for a coordinate. Callers pass valid coordinates only.
#[inline]
pub fn heat_key(latitude: f64, longitude: f64) -> CellKey {
    (
        (latitude * GRID_SCALE).round() as i64,
        (longitude * GRID_SCALE).round() as i64,
    )
}

/// Accumulates dwell minutes and weights during construction
#[derive(Debug, Default)]
struct HeatmapGrid {
    stop_zones: HashMap<CellKey, f64>,
    weights: HashMap<CellKey, f64>,
}

impl HeatmapGrid {
    /// First pass: minutes spent at each spot, inferred from timestamp gaps
    fn add_dwell(&mut self, points: &[Ping], config: &HeatmapConfig) {
        let mut unordered = 0usize;

        for pair in points.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if !a.has_valid_coordinates() || !b.has_valid_coordinates() {
                continue;
            }

            let elapsed_minutes = (b.timestamp - a.timestamp) as f64 / 60_000.0;
            if elapsed_minutes < 0.0 {
                unordered += 1;
                continue;
            }
            if elapsed_minutes <= config.min_dwell_gap_minutes {
                continue;
            }

            let key = heat_key(a.latitude, a.longitude);
            let same_spot = key == heat_key(b.latitude, b.longitude)
                || haversine_distance_km(a.latitude, a.longitude, b.latitude, b.longitude)
                    < config.same_spot_km;
            if same_spot {
                *self.stop_zones.entry(key).or_insert(0.0) += elapsed_minutes;
            }
        }

        if unordered > 0 {
            warn!(
                "[TrackEngine] heatmap input has {} backwards timestamp steps; ignored for dwell",
                unordered
            );
        }
    }

    /// Second pass: per-ping weight from base, inferred and explicit dwell
    fn add_point(&mut self, ping: &Ping, config: &HeatmapConfig) {
        let key = heat_key(ping.latitude, ping.longitude);

        let mut weight = config.base_weight;
        if let Some(&minutes) = self.stop_zones.get(&key) {
            weight += (minutes + 1.0).ln() * config.dwell_factor;
        }
        if let Some(duration) = ping.stop_duration_minutes.filter(|d| *d > 0.0) {
            weight += (duration + 1.0).ln() * config.dwell_factor;
        }

        *self.weights.entry(key).or_insert(0.0) += weight;
    }

    fn build(self, multiplier: f64) -> Vec<HeatCell> {
        let mut cells: Vec<(CellKey, f64)> = self.weights.into_iter().collect();
        cells.sort_unstable_by_key(|(key, _)| *key);

        cells
            .into_iter()
            .map(|((lat, lng), weight)| HeatCell {
                latitude: lat as f64 / GRID_SCALE,
                longitude: lng as f64 / GRID_SCALE,
                weight: (weight * multiplier).max(0.0),
            })
            .collect()
    }
}

/// Build a dwell heatmap from an ordered track.
///
/// Returns no cells when the heatmap is disabled or no ping has valid
/// coordinates. Cells are sorted by grid key. A non-positive or non-finite
/// intensity multiplier falls back to the default.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, HeatmapConfig, build_heatmap};
///
/// let track = vec![
///     Ping::new(1, 0, 40.41680, -3.70380),
///     Ping::new(2, 20 * 60_000, 40.41680, -3.70380), // still there 20 minutes later
///     Ping::new(3, 21 * 60_000, 40.42000, -3.70000),
/// ];
///
/// let cells = build_heatmap(&track, &HeatmapConfig::default());
/// assert_eq!(cells.len(), 2);
/// let parked = cells.iter().find(|c| c.latitude == 40.4168).unwrap();
/// let passing = cells.iter().find(|c| c.latitude == 40.42).unwrap();
/// assert!(parked.weight > passing.weight);
/// ```
pub fn build_heatmap(points: &[Ping], config: &HeatmapConfig) -> Vec<HeatCell> {
    if !config.enabled || points.is_empty() {
        return vec![];
    }

    let multiplier = if config.intensity_multiplier.is_finite() && config.intensity_multiplier > 0.0 {
        config.intensity_multiplier
    } else {
        warn!(
            "[TrackEngine] intensity multiplier {} is not usable, falling back to {}",
            config.intensity_multiplier, DEFAULT_INTENSITY_MULTIPLIER
        );
        DEFAULT_INTENSITY_MULTIPLIER
    };

    let mut grid = HeatmapGrid::default();
    grid.add_dwell(points, config);
    for ping in points.iter().filter(|p| p.has_valid_coordinates()) {
        grid.add_point(ping, config);
    }

    let stop_zones = grid.stop_zones.len();
    let cells = grid.build(multiplier);
    debug!(
        "[TrackEngine] heatmap: {} pings -> {} cells ({} stop zones)",
        points.len(),
        cells.len(),
        stop_zones
    );
    cells
}

/// Heaviest weight in a heatmap, `0.0` if empty. Renderers use it as the
/// colour-scale maximum.
pub fn max_weight(cells: &[HeatCell]) -> f64 {
    cells.iter().map(|c| c.weight).fold(0.0, f64::max)
}

/// Find the cell containing a coordinate.
pub fn query_heat_cell(cells: &[HeatCell], latitude: f64, longitude: f64) -> Option<&HeatCell> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    let key = heat_key(latitude, longitude);
    cells.iter().find(|c| heat_key(c.latitude, c.longitude) == key)
}
