//! # Track Simplification
//!
//! Decimates a raw track for rendering while keeping every point that carries
//! information: stops, speed anomalies and sharp turns. Straight, in-motion
//! stretches are sampled sparsely; everything else is sampled at the finer
//! minimum spacing.
//!
//! This is a heuristic filter, not Douglas-Peucker: it never synthesizes
//! points and never drops a point it considers informative, whatever the
//! geometric error.
//!
//! ## Rules
//!
//! The first and last pings are always kept. An interior ping is kept if any of:
//! - it is a stop (`stop_duration_minutes > 0`) and `keep_stops` is set
//! - its speed differs from the last kept ping by more than
//!   `speed_change_threshold_kmh` and `keep_speed_changes` is set
//! - it is farther than the effective minimum distance from the last kept
//!   ping with valid coordinates
//! - the heading changes by more than `max_turn_angle_deg` at it
//!
//! The effective minimum distance is `straight_min_distance_km` while the ping
//! is part of straight travel (turn below `max_turn_angle_deg` and speed above
//! `moving_speed_kmh`) and `min_distance_km` otherwise.
//!
//! Input must already be ordered by timestamp; nothing is re-sorted here.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{ping_distance_km, turn_angle_degrees};
use crate::Ping;

/// Configuration for track simplification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct SimplifyConfig {
    /// Minimum spacing between kept pings off straight stretches (km, default 0.05)
    pub min_distance_km: f64,
    /// Heading change above which a ping is always kept (degrees, default 30)
    pub max_turn_angle_deg: f64,
    /// Keep every ping annotated with a stop duration (default true)
    pub keep_stops: bool,
    /// Keep pings whose speed jumps relative to the last kept one (default true)
    pub keep_speed_changes: bool,
    /// Speed jump that counts as significant (km/h, default 10)
    pub speed_change_threshold_kmh: f64,
    /// Minimum spacing on straight, in-motion stretches (km, default 0.1)
    ///
    /// The relaxed bar only drops pings that are closer than it to the last
    /// kept one. Straight samples 0.2 km apart all clear the default 0.1 km
    /// bar and are each kept; raise the bar above the sample spacing to reduce
    /// such a stretch to its endpoints.
    pub straight_min_distance_km: f64,
    /// Speed above which a ping counts as in motion (km/h, default 5)
    pub moving_speed_kmh: f64,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            min_distance_km: 0.05,
            max_turn_angle_deg: 30.0,
            keep_stops: true,
            keep_speed_changes: true,
            speed_change_threshold_kmh: 10.0,
            straight_min_distance_km: 0.1,
            moving_speed_kmh: 5.0,
        }
    }
}

/// Simplify a track, returning the kept pings in their original order.
///
/// Tracks of two pings or fewer are returned unchanged.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, SimplifyConfig, simplify_track};
///
/// let track = vec![
///     Ping::new(1, 0, 40.0000, -3.0).with_speed(30.0),
///     Ping::new(2, 10_000, 40.0001, -3.0).with_speed(30.0).with_stop_duration(12.0),
///     Ping::new(3, 20_000, 40.0002, -3.0).with_speed(30.0),
///     Ping::new(4, 30_000, 40.0003, -3.0).with_speed(30.0),
/// ];
///
/// let simplified = simplify_track(&track, &SimplifyConfig::default());
/// let ids: Vec<i64> = simplified.iter().map(|p| p.id).collect();
/// assert_eq!(ids, vec![1, 2, 4]); // the stop survives, the redundant sample does not
/// ```
pub fn simplify_track(points: &[Ping], config: &SimplifyConfig) -> Vec<Ping> {
    simplify_indices(points, config)
        .into_iter()
        .map(|i| points[i].clone())
        .collect()
}

/// Same as [`simplify_track`] but returns the indices of the kept pings.
///
/// Indices are strictly increasing, start at `0` and end at `len - 1`.
pub fn simplify_indices(points: &[Ping], config: &SimplifyConfig) -> Vec<usize> {
    let n = points.len();
    if n <= 2 {
        return (0..n).collect();
    }

    let mut kept = Vec::with_capacity(n);
    kept.push(0);

    let mut last_kept = 0usize;
    // Distance is measured from the last kept ping that has usable coordinates
    let mut anchor = points[0].has_valid_coordinates().then_some(0usize);

    for i in 1..n - 1 {
        let curr = &points[i];

        let is_stop = config.keep_stops && curr.is_stop();
        let speed_change = config.keep_speed_changes
            && (curr.speed_or_zero() - points[last_kept].speed_or_zero()).abs()
                > config.speed_change_threshold_kmh;

        let geometric = if curr.has_valid_coordinates() {
            let angle = turn_angle_degrees(&points[i - 1], curr, &points[i + 1]);
            let linear_movement =
                angle < config.max_turn_angle_deg && curr.speed_or_zero() > config.moving_speed_kmh;
            let min_distance = if linear_movement {
                config.straight_min_distance_km
            } else {
                config.min_distance_km
            };

            let far = match anchor {
                Some(a) => ping_distance_km(&points[a], curr).is_some_and(|d| d > min_distance),
                // Nothing drawable kept yet: the first valid ping starts the line
                None => true,
            };

            far || angle > config.max_turn_angle_deg
        } else {
            false
        };

        if is_stop || speed_change || geometric {
            kept.push(i);
            last_kept = i;
            if curr.has_valid_coordinates() {
                anchor = Some(i);
            }
        }
    }

    kept.push(n - 1);

    debug!("[TrackEngine] simplified {} pings to {}", n, kept.len());
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::EARTH_RADIUS_KM;

    const KM_PER_DEG_LAT: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

    /// Pings heading due north, `spacing_km` apart, at a constant speed.
    fn north_track(n: usize, spacing_km: f64, speed: f64) -> Vec<Ping> {
        (0..n)
            .map(|i| {
                let lat = 40.0 + i as f64 * spacing_km / KM_PER_DEG_LAT;
                Ping::new(i as i64, i as i64 * 10_000, lat, -3.7).with_speed(speed)
            })
            .collect()
    }

    fn ids(points: &[Ping]) -> Vec<i64> {
        points.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_short_tracks_unchanged() {
        let config = SimplifyConfig::default();
        assert!(simplify_track(&[], &config).is_empty());

        let one = north_track(1, 0.01, 0.0);
        assert_eq!(simplify_track(&one, &config), one);

        let two = north_track(2, 0.0, 0.0);
        assert_eq!(simplify_track(&two, &config), two);
    }

    #[test]
    fn test_endpoints_always_kept() {
        let track = north_track(20, 0.001, 40.0);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert_eq!(simplified.first(), track.first());
        assert_eq!(simplified.last(), track.last());
        assert!(simplified.len() <= track.len());
    }

    #[test]
    fn test_straight_travel_under_relaxed_bar_keeps_endpoints_only() {
        // 5 pings spanning 0.08 km at 50 km/h: beyond the 0.05 km bar but
        // under the 0.1 km straight-line bar
        let track = north_track(5, 0.02, 50.0);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert_eq!(ids(&simplified), vec![0, 4]);
    }

    #[test]
    fn test_stationary_track_uses_fine_bar() {
        // Same geometry with no speed: the 0.05 km bar applies
        let track = north_track(5, 0.02, 0.0);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert_eq!(ids(&simplified), vec![0, 3, 4]);
    }

    #[test]
    fn test_straight_travel_beyond_relaxed_bar_keeps_each_sample() {
        // Samples 0.2 km apart exceed even the relaxed bar
        let track = north_track(5, 0.2, 50.0);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert_eq!(ids(&simplified), vec![0, 1, 2, 3, 4]);

        let coarse = SimplifyConfig {
            straight_min_distance_km: 1.0,
            ..SimplifyConfig::default()
        };
        assert_eq!(ids(&simplify_track(&track, &coarse)), vec![0, 4]);
    }

    #[test]
    fn test_stops_preserved() {
        let mut track = north_track(10, 0.001, 30.0);
        track[4].stop_duration_minutes = Some(7.5);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert!(ids(&simplified).contains(&4));

        let ignore_stops = SimplifyConfig {
            keep_stops: false,
            ..SimplifyConfig::default()
        };
        assert!(!ids(&simplify_track(&track, &ignore_stops)).contains(&4));
    }

    #[test]
    fn test_zero_stop_duration_is_not_a_stop() {
        let mut track = north_track(5, 0.001, 30.0);
        track[2].stop_duration_minutes = Some(0.0);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert_eq!(ids(&simplified), vec![0, 4]);
    }

    #[test]
    fn test_colocated_stop_track_keeps_all() {
        let track = vec![
            Ping::new(1, 0, 40.0, -3.7),
            Ping::new(2, 30_000, 40.0, -3.7).with_stop_duration(5.0),
            Ping::new(3, 60_000, 40.0, -3.7),
        ];
        assert_eq!(simplify_track(&track, &SimplifyConfig::default()), track);
    }

    #[test]
    fn test_speed_change_kept() {
        let mut track = north_track(6, 0.001, 30.0);
        track[3].speed = Some(55.0);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert!(ids(&simplified).contains(&3));

        let no_speed = SimplifyConfig {
            keep_speed_changes: false,
            ..SimplifyConfig::default()
        };
        assert!(!ids(&simplify_track(&track, &no_speed)).contains(&3));
    }

    #[test]
    fn test_missing_speed_counts_as_zero() {
        let mut track = north_track(5, 0.001, 30.0);
        track[2].speed = None;
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        // 30 km/h -> none is a 30 km/h drop
        assert!(ids(&simplified).contains(&2));
    }

    #[test]
    fn test_sharp_turn_kept() {
        let step = 0.005 / KM_PER_DEG_LAT;
        let track = vec![
            Ping::new(0, 0, 40.0, -3.7).with_speed(20.0),
            Ping::new(1, 1, 40.0 + step, -3.7).with_speed(20.0),
            Ping::new(2, 2, 40.0 + 2.0 * step, -3.7).with_speed(20.0),
            // turn east
            Ping::new(3, 3, 40.0 + 2.0 * step, -3.7 + step).with_speed(20.0),
            Ping::new(4, 4, 40.0 + 2.0 * step, -3.7 + 2.0 * step).with_speed(20.0),
        ];
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert_eq!(ids(&simplified), vec![0, 2, 4]);
    }

    #[test]
    fn test_invalid_points_do_not_abort() {
        let mut track = north_track(8, 0.03, 0.0);
        track[3].latitude = f64::NAN;
        track[5].longitude = f64::INFINITY;
        let simplified = simplify_track(&track, &SimplifyConfig::default());

        let kept = ids(&simplified);
        assert_eq!(kept.first(), Some(&0));
        assert_eq!(kept.last(), Some(&7));
        assert!(!kept.contains(&3));
        assert!(!kept.contains(&5));
    }

    #[test]
    fn test_invalid_endpoints_still_kept() {
        let mut track = north_track(4, 0.03, 0.0);
        track[0].latitude = f64::NAN;
        track[3].longitude = f64::NAN;
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        let kept = ids(&simplified);
        assert_eq!(kept.first(), Some(&0));
        assert_eq!(kept.last(), Some(&3));
        // With no drawable anchor, the first valid ping starts the line
        assert!(kept.contains(&1));
    }

    #[test]
    fn test_invalid_stop_still_kept() {
        let mut track = north_track(5, 0.001, 0.0);
        track[2].latitude = f64::NAN;
        track[2].stop_duration_minutes = Some(3.0);
        let simplified = simplify_track(&track, &SimplifyConfig::default());
        assert!(ids(&simplified).contains(&2));
    }

    #[test]
    fn test_output_never_longer_than_input() {
        let configs = [
            SimplifyConfig::default(),
            SimplifyConfig {
                min_distance_km: 0.0,
                straight_min_distance_km: 0.0,
                max_turn_angle_deg: 0.0,
                ..SimplifyConfig::default()
            },
            SimplifyConfig {
                keep_stops: false,
                keep_speed_changes: false,
                ..SimplifyConfig::default()
            },
        ];
        let mut track = north_track(30, 0.04, 25.0);
        for (i, p) in track.iter_mut().enumerate() {
            if i % 4 == 0 {
                p.stop_duration_minutes = Some(2.0);
            }
            if i % 7 == 0 {
                p.speed = Some(80.0);
            }
        }
        for config in &configs {
            let kept = simplify_indices(&track, config);
            assert!(kept.len() <= track.len());
            assert!(kept.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
