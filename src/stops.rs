//! Stop detection.
//!
//! Derives `stop_duration_minutes` annotations from raw fixes: a pair of
//! consecutive pings marks a stop when the device was slow at the first fix,
//! barely moved, and the next fix arrived long enough afterwards.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::ping_distance_km;
use crate::Ping;

/// Configuration for stop detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct StopDetectionConfig {
    /// Minimum gap between fixes to count as a stop (minutes, default 5)
    pub min_duration_minutes: f64,
    /// Maximum speed at the first fix (km/h, default 12)
    pub max_speed_kmh: f64,
    /// Maximum displacement between the two fixes (km, default 0.22)
    pub max_distance_km: f64,
}

impl Default for StopDetectionConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 5.0,
            max_speed_kmh: 12.0,
            max_distance_km: 0.22,
        }
    }
}

/// Minutes between two pings if the pair qualifies as a stop.
fn stop_minutes(a: &Ping, b: &Ping, config: &StopDetectionConfig) -> Option<f64> {
    let minutes = (b.timestamp - a.timestamp) as f64 / 60_000.0;
    if minutes <= 0.0 || minutes < config.min_duration_minutes {
        return None;
    }

    let speed = a.speed?;
    if !speed.is_finite() || speed > config.max_speed_kmh {
        return None;
    }

    let distance = ping_distance_km(a, b)?;
    (distance <= config.max_distance_km).then_some(minutes)
}

/// Pings where the device stopped, each carrying the stop length.
///
/// Every returned ping is a copy of the first ping of a qualifying pair with
/// `stop_duration_minutes` set to the gap to the next fix. Input order is kept.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, StopDetectionConfig, detect_stops};
///
/// let pings = vec![
///     Ping::new(1, 0, 40.4168, -3.7038).with_speed(2.0),
///     Ping::new(2, 15 * 60_000, 40.4169, -3.7038).with_speed(30.0),
///     Ping::new(3, 16 * 60_000, 40.4300, -3.7038),
/// ];
///
/// let stops = detect_stops(&pings, &StopDetectionConfig::default());
/// assert_eq!(stops.len(), 1);
/// assert_eq!(stops[0].id, 1);
/// assert_eq!(stops[0].stop_duration_minutes, Some(15.0));
/// ```
pub fn detect_stops(points: &[Ping], config: &StopDetectionConfig) -> Vec<Ping> {
    let stops: Vec<Ping> = points
        .windows(2)
        .filter_map(|pair| {
            let minutes = stop_minutes(&pair[0], &pair[1], config)?;
            Some(pair[0].clone().with_stop_duration(minutes))
        })
        .collect();

    debug!("[TrackEngine] detected {} stops in {} pings", stops.len(), points.len());
    stops
}

/// The whole track with detected stop durations attached.
///
/// Pings that do not start a qualifying pair keep whatever annotation they
/// already had.
pub fn annotate_stops(points: &[Ping], config: &StopDetectionConfig) -> Vec<Ping> {
    let mut annotated = points.to_vec();
    for i in 1..points.len() {
        if let Some(minutes) = stop_minutes(&points[i - 1], &points[i], config) {
            annotated[i - 1].stop_duration_minutes = Some(minutes);
        }
    }
    annotated
}
