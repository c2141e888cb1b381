//! Pre-processing filters.
//!
//! Narrows a track to a time window, a speed range and a geographic zone
//! before it is simplified or rendered. Every criterion is optional; an empty
//! filter keeps everything.

use serde::{Deserialize, Serialize};

use crate::{Bounds, Ping};

/// Criteria a ping must meet to be kept. `None` fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackFilter {
    /// Earliest timestamp kept (Unix ms, inclusive)
    pub start_ms: Option<i64>,
    /// Latest timestamp kept (Unix ms, inclusive)
    pub end_ms: Option<i64>,
    /// Minimum speed (km/h, inclusive)
    pub min_speed_kmh: Option<f64>,
    /// Maximum speed (km/h, inclusive)
    pub max_speed_kmh: Option<f64>,
    /// Zone the ping must fall inside
    pub zone: Option<Bounds>,
}

impl TrackFilter {
    /// True when no criterion is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether a single ping passes every set criterion.
    ///
    /// Pings without a speed fail any speed bound; pings without valid
    /// coordinates fail a zone bound.
    pub fn matches(&self, ping: &Ping) -> bool {
        if self.start_ms.is_some_and(|start| ping.timestamp < start) {
            return false;
        }
        if self.end_ms.is_some_and(|end| ping.timestamp > end) {
            return false;
        }

        if self.min_speed_kmh.is_some() || self.max_speed_kmh.is_some() {
            let Some(speed) = ping.speed.filter(|s| s.is_finite()) else {
                return false;
            };
            if self.min_speed_kmh.is_some_and(|min| speed < min) {
                return false;
            }
            if self.max_speed_kmh.is_some_and(|max| speed > max) {
                return false;
            }
        }

        match &self.zone {
            Some(zone) => ping.has_valid_coordinates() && zone.contains(ping.latitude, ping.longitude),
            None => true,
        }
    }
}

/// Keep the pings that pass `filter`, preserving input order.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, TrackFilter, filter_track};
///
/// let pings = vec![
///     Ping::new(1, 1_000, 40.0, -3.7).with_speed(10.0),
///     Ping::new(2, 2_000, 40.0, -3.7).with_speed(90.0),
///     Ping::new(3, 3_000, 40.0, -3.7).with_speed(15.0),
/// ];
///
/// let filter = TrackFilter { max_speed_kmh: Some(50.0), ..Default::default() };
/// let kept: Vec<i64> = filter_track(&pings, &filter).iter().map(|p| p.id).collect();
/// assert_eq!(kept, vec![1, 3]);
/// ```
pub fn filter_track(points: &[Ping], filter: &TrackFilter) -> Vec<Ping> {
    if filter.is_empty() {
        return points.to_vec();
    }
    points.iter().filter(|p| filter.matches(p)).cloned().collect()
}
