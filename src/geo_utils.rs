//! # Geographic Utilities
//!
//! Distance and angle primitives shared by the simplifier, the clusterer and
//! the heatmap builder.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance_km`] | Great-circle distance between two coordinates |
//! | [`ping_distance_km`] | Distance between two pings, `None` if either is unusable |
//! | [`turn_angle_degrees`] | Change of heading at the middle of three pings |
//! | [`polyline_length_km`] | Length of a track over its valid pings |
//! | [`compute_bounds`] | Bounding box of the valid pings of a track |
//! | [`compute_center`] | Arithmetic mean position of the valid pings |
//! | [`km_to_degrees`] | Kilometres to a conservative degree span at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use track_engine::{Ping, geo_utils};
//!
//! let a = Ping::new(1, 0, 40.4168, -3.7038); // Madrid, Puerta del Sol
//! let b = Ping::new(2, 60_000, 40.4180, -3.7038);
//!
//! let km = geo_utils::ping_distance_km(&a, &b).unwrap();
//! assert!((km - 0.133).abs() < 0.001);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances use the haversine formula on a sphere of radius 6371 km.
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Turn angles
//!
//! Headings are planar: `atan2` of the latitude/longitude deltas. This ignores
//! meridian convergence, which is irrelevant at street scale where turns are
//! measured between samples tens of metres apart.

use geo::{BoundingRect, MultiPoint, Point};
use crate::{Bounds, GeoPosition, Ping};

/// Mean Earth radius used by every distance in the crate.
///
/// `geo::Haversine` uses 6371.0088 km, so the formula is written out below
/// rather than delegated.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Relative slack added to degree spans so rounding never shrinks them.
const SPAN_SLACK: f64 = 1e-9;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance in kilometres between two coordinates.
///
/// Symmetric, exactly `0.0` for identical inputs, and finite for any finite
/// input. Non-finite inputs produce `NaN`; use [`ping_distance_km`] when the
/// inputs come from pings that may be malformed.
///
/// # Example
///
/// ```rust
/// use track_engine::geo_utils::haversine_distance_km;
///
/// // Madrid to Barcelona is roughly 505 km
/// let d = haversine_distance_km(40.4168, -3.7038, 41.3874, 2.1686);
/// assert!((d - 505.0).abs() < 5.0);
/// ```
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Distance between two pings in kilometres.
///
/// Returns `None` when either ping lacks valid coordinates, so callers can
/// leave it out of their decision instead of comparing against `NaN`.
#[inline]
pub fn ping_distance_km(a: &Ping, b: &Ping) -> Option<f64> {
    if !a.has_valid_coordinates() || !b.has_valid_coordinates() {
        return None;
    }
    Some(haversine_distance_km(a.latitude, a.longitude, b.latitude, b.longitude))
}

/// Total length of a track in kilometres.
///
/// Invalid pings are stepped over: the valid pings on either side of them are
/// joined directly. Fewer than two valid pings give `0.0`.
pub fn polyline_length_km(points: &[Ping]) -> f64 {
    let mut valid = points.iter().filter(|p| p.has_valid_coordinates());
    let Some(mut prev) = valid.next() else {
        return 0.0;
    };

    let mut total = 0.0;
    for curr in valid {
        total += haversine_distance_km(prev.latitude, prev.longitude, curr.latitude, curr.longitude);
        prev = curr;
    }
    total
}

// =============================================================================
// Angle Functions
// =============================================================================

/// Absolute change of heading, in degrees within `[0, 180]`, between the
/// segments `p1 -> p2` and `p2 -> p3`.
///
/// Headings are planar (`atan2` of coordinate deltas). Returns `0.0`, meaning
/// "no turn", when any ping lacks valid coordinates or when either segment has
/// zero length, so a heading cannot be defined.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, geo_utils::turn_angle_degrees};
///
/// let a = Ping::new(1, 0, 40.0000, -3.0000);
/// let b = Ping::new(2, 0, 40.0010, -3.0000); // heading north
/// let c = Ping::new(3, 0, 40.0010, -2.9990); // then east
/// assert!((turn_angle_degrees(&a, &b, &c) - 90.0).abs() < 1e-9);
/// ```
pub fn turn_angle_degrees(p1: &Ping, p2: &Ping, p3: &Ping) -> f64 {
    if !(p1.has_valid_coordinates() && p2.has_valid_coordinates() && p3.has_valid_coordinates()) {
        return 0.0;
    }

    let (dy1, dx1) = (p2.latitude - p1.latitude, p2.longitude - p1.longitude);
    let (dy2, dx2) = (p3.latitude - p2.latitude, p3.longitude - p2.longitude);
    if (dy1 == 0.0 && dx1 == 0.0) || (dy2 == 0.0 && dx2 == 0.0) {
        return 0.0;
    }

    let heading1 = dy1.atan2(dx1).to_degrees();
    let heading2 = dy2.atan2(dx2).to_degrees();

    let diff = (heading2 - heading1).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

// =============================================================================
// Bounding Box / Center Functions
// =============================================================================

/// Bounding box of the valid pings of a track, `None` if there are none.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, geo_utils};
///
/// let track = vec![
///     Ping::new(1, 0, 40.41, -3.71),
///     Ping::new(2, 0, 40.43, -3.69),
///     Ping::new(3, 0, f64::NAN, -3.70),
/// ];
/// let bounds = geo_utils::compute_bounds(&track).unwrap();
/// assert_eq!(bounds.min_lat, 40.41);
/// assert_eq!(bounds.max_lng, -3.69);
/// ```
pub fn compute_bounds(points: &[Ping]) -> Option<Bounds> {
    let multi: MultiPoint<f64> = points
        .iter()
        .filter(|p| p.has_valid_coordinates())
        .map(|p| Point::new(p.longitude, p.latitude))
        .collect();

    let rect = multi.bounding_rect()?;
    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

/// Arithmetic mean position of the valid pings, `None` if there are none.
///
/// Fine for the small areas the clusterer works with; tracks straddling the
/// antimeridian average to the wrong side of the globe.
pub fn compute_center(points: &[Ping]) -> Option<GeoPosition> {
    let mut count = 0usize;
    let mut sum_lat = 0.0;
    let mut sum_lng = 0.0;

    for p in points.iter().filter(|p| p.has_valid_coordinates()) {
        sum_lat += p.latitude;
        sum_lng += p.longitude;
        count += 1;
    }

    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some(GeoPosition::new(sum_lat / n, sum_lng / n))
}

/// Convert a distance in kilometres to `(lat_degrees, lng_degrees)` spans at
/// the given latitude.
///
/// A box of these half-widths around a point at `latitude` contains every
/// point within `km` along the great circle. The longitude reach of a
/// spherical cap is `asin(sin(r/R) / cos(lat))`; when the cap touches or
/// crosses a pole (or the ratio reaches 1) every longitude is in reach and the
/// span is 360.
#[inline]
pub fn km_to_degrees(km: f64, latitude: f64) -> (f64, f64) {
    let angular = km.max(0.0) / EARTH_RADIUS_KM;
    if angular >= std::f64::consts::FRAC_PI_2 {
        return (angular.to_degrees().min(180.0), 360.0);
    }

    let lat_deg = angular.to_degrees() * (1.0 + SPAN_SLACK);
    if latitude.abs() + lat_deg >= 90.0 {
        return (lat_deg, 360.0);
    }

    let ratio = angular.sin() / latitude.to_radians().cos();
    let lng_deg = if ratio >= 1.0 {
        360.0
    } else {
        ratio.asin().to_degrees() * (1.0 + SPAN_SLACK)
    };
    (lat_deg, lng_deg)
}

// =============================================================================
// Unit Tests
// =============================================================================
