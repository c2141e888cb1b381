//! # Proximity Clustering
//!
//! Collapses co-located pings into a single centroid marker carrying a member
//! count. With the default radius of 0.0001 km this deduplicates repeated fixes
//! at the same spot; it is not a density clusterer.
//!
//! ## Algorithm
//!
//! Greedy and single pass, in input order:
//! 1. The first unassigned ping seeds a new cluster
//! 2. Every still-unassigned ping within `max_distance_km` of the **seed**
//!    joins it
//! 3. Repeat until every ping is assigned
//!
//! Membership is tested against the seed, not the running centroid. A chain
//! of pings each within range of its neighbour therefore splits wherever it
//! leaves the seed's radius, and a cluster may be elongated up to twice the
//! radius. This is the expected behaviour.
//!
//! Candidates come from an R-tree over the valid pings, so the cost stays
//! close to linear for deduplication-sized radii. Pings without valid
//! coordinates each form their own single-member cluster, so the clusters
//! always partition the input.

use log::debug;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{compute_center, haversine_distance_km, km_to_degrees};
use crate::Ping;

/// Default clustering radius: about 10 cm, enough to merge repeated fixes.
pub const DEFAULT_CLUSTER_DISTANCE_KM: f64 = 0.0001;

/// Configuration for proximity clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum distance from the seed ping to join its cluster (km)
    pub max_distance_km: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_distance_km: DEFAULT_CLUSTER_DISTANCE_KM,
        }
    }
}

/// A group of co-located pings represented by their centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Cluster {
    /// Centroid position with the id, timestamp and scalars of the first member
    pub center: Ping,
    /// Number of pings in the cluster
    pub member_count: u32,
    /// Positions of the members in the clustered input, ascending
    pub member_indices: Vec<u32>,
}

/// A valid ping's position in the R-tree, stored as `[lng, lat]`
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// Group pings by proximity to a seed ping.
///
/// Every input ping ends up in exactly one cluster and clusters come out in
/// the order of their seeds. A negative or `NaN` radius is treated as zero,
/// which still merges exact duplicates.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, cluster_points};
///
/// let pings = vec![
///     Ping::new(1, 0, 40.4168, -3.7038),
///     Ping::new(2, 60_000, 40.4168, -3.7038), // same spot, later
///     Ping::new(3, 120_000, 40.4200, -3.7000),
/// ];
///
/// let clusters = cluster_points(&pings, 0.0001);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters[0].member_count, 2);
/// assert_eq!(clusters[0].center.id, 1);
/// ```
pub fn cluster_points(points: &[Ping], max_distance_km: f64) -> Vec<Cluster> {
    if points.is_empty() {
        return vec![];
    }

    let radius = if max_distance_km.is_nan() || max_distance_km < 0.0 {
        0.0
    } else {
        max_distance_km
    };

    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.has_valid_coordinates())
        .map(|(idx, p)| IndexedPoint {
            idx,
            lng: p.longitude,
            lat: p.latitude,
        })
        .collect();
    let tree = RTree::bulk_load(indexed);

    let mut assigned = vec![false; points.len()];
    let mut clusters = Vec::new();

    for seed_idx in 0..points.len() {
        if assigned[seed_idx] {
            continue;
        }
        assigned[seed_idx] = true;

        let seed = &points[seed_idx];
        let mut members = vec![seed_idx];

        if seed.has_valid_coordinates() {
            let mut candidates: Vec<usize> = search_envelopes(seed, radius)
                .iter()
                .flat_map(|env| tree.locate_in_envelope_intersecting(env))
                .map(|ip| ip.idx)
                .filter(|&j| !assigned[j])
                .filter(|&j| {
                    let p = &points[j];
                    haversine_distance_km(seed.latitude, seed.longitude, p.latitude, p.longitude)
                        <= radius
                })
                .collect();
            // Envelopes may overlap near the antimeridian
            candidates.sort_unstable();
            candidates.dedup();

            for j in candidates {
                assigned[j] = true;
                members.push(j);
            }
        }

        let member_pings: Vec<Ping> = members.iter().map(|&i| points[i].clone()).collect();
        if let Some(center) = cluster_center(&member_pings) {
            clusters.push(Cluster {
                center,
                member_count: members.len() as u32,
                member_indices: members.into_iter().map(|i| i as u32).collect(),
            });
        }
    }

    debug!(
        "[TrackEngine] clustered {} pings into {} clusters (radius {} km)",
        points.len(),
        clusters.len(),
        radius
    );
    clusters
}

/// Centroid ping of a cluster.
///
/// Position is the arithmetic mean of the members' coordinates; id, timestamp,
/// speed and stop duration are copied from the first member. Returns `None` for
/// an empty slice. A lone ping without valid coordinates is returned as is.
pub fn cluster_center(members: &[Ping]) -> Option<Ping> {
    let mut center = members.first()?.clone();
    if let Some(mean) = compute_center(members) {
        center.latitude = mean.latitude;
        center.longitude = mean.longitude;
    }
    Some(center)
}

/// Query boxes covering the haversine circle around `seed`, split in two when
/// the box crosses the antimeridian. A circle reaching over a pole gets the
/// full longitude band.
fn search_envelopes(seed: &Ping, radius_km: f64) -> Vec<AABB<[f64; 2]>> {
    let (lat_deg, lng_deg) = km_to_degrees(radius_km, seed.latitude);
    let min_lat = (seed.latitude - lat_deg).max(-90.0);
    let max_lat = (seed.latitude + lat_deg).min(90.0);

    if lng_deg >= 180.0 {
        return vec![AABB::from_corners([-180.0, min_lat], [180.0, max_lat])];
    }

    let min_lng = seed.longitude - lng_deg;
    let max_lng = seed.longitude + lng_deg;
    let mut envelopes = vec![AABB::from_corners(
        [min_lng.max(-180.0), min_lat],
        [max_lng.min(180.0), max_lat],
    )];
    if min_lng < -180.0 {
        envelopes.push(AABB::from_corners([min_lng + 360.0, min_lat], [180.0, max_lat]));
    }
    if max_lng > 180.0 {
        envelopes.push(AABB::from_corners([-180.0, min_lat], [max_lng - 360.0, max_lat]));
    }
    envelopes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(id: i64, lat: f64, lng: f64) -> Ping {
        Ping::new(id, id * 1000, lat, lng)
    }

    fn total_members(clusters: &[Cluster]) -> u32 {
        clusters.iter().map(|c| c.member_count).sum()
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_points(&[], 0.0001).is_empty());
    }

    #[test]
    fn test_single_point_cluster() {
        let p = ping(7, 40.4168, -3.7038).with_speed(12.0);
        let clusters = cluster_points(&[p.clone()], DEFAULT_CLUSTER_DISTANCE_KM);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_count, 1);
        assert_eq!(clusters[0].center, p);
    }

    #[test]
    fn test_two_pairs_of_duplicates() {
        let pings = vec![
            ping(1, 40.0000000, -3.7),
            ping(2, 40.0010000, -3.7),
            ping(3, 40.0000005, -3.7),
            ping(4, 40.0010005, -3.7),
        ];
        let clusters = cluster_points(&pings, DEFAULT_CLUSTER_DISTANCE_KM);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.member_count == 2));
        assert_eq!(clusters[0].member_indices, vec![0, 2]);
        assert_eq!(clusters[1].member_indices, vec![1, 3]);
        // Centroid is the mean, scalars come from the first member
        assert!((clusters[0].center.latitude - 40.00000025).abs() < 1e-12);
        assert_eq!(clusters[0].center.id, 1);
        assert_eq!(clusters[1].center.id, 2);
    }

    #[test]
    fn test_chain_splits_at_seed_radius() {
        // Each ping is 0.08 m from the previous one; the third is 0.16 m from
        // the seed, outside the 0.1 m radius
        let step = 0.00008 / 111.19492664455873;
        let pings: Vec<Ping> = (0..4).map(|i| ping(i, 40.0 + i as f64 * step, -3.7)).collect();
        let clusters = cluster_points(&pings, DEFAULT_CLUSTER_DISTANCE_KM);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_indices, vec![0, 1]);
        assert_eq!(clusters[1].member_indices, vec![2, 3]);
    }

    #[test]
    fn test_partition_with_invalid_points() {
        let pings = vec![
            ping(1, 40.0, -3.7),
            ping(2, f64::NAN, -3.7),
            ping(3, 40.0, -3.7),
            ping(4, 40.0, f64::NAN),
            ping(5, 41.0, -3.7),
        ];
        for radius in [0.0, 0.0001, 1.0, 500.0, -1.0, f64::NAN] {
            let clusters = cluster_points(&pings, radius);
            assert_eq!(total_members(&clusters), pings.len() as u32, "radius {}", radius);

            let mut seen: Vec<u32> = clusters.iter().flat_map(|c| c.member_indices.clone()).collect();
            seen.sort_unstable();
            assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_invalid_points_are_singletons() {
        let pings = vec![ping(1, f64::NAN, -3.7), ping(2, f64::NAN, -3.7)];
        let clusters = cluster_points(&pings, 10.0);
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].center.latitude.is_nan());
    }

    #[test]
    fn test_zero_radius_merges_exact_duplicates() {
        let pings = vec![ping(1, 40.0, -3.7), ping(2, 40.0, -3.7), ping(3, 40.0000001, -3.7)];
        let clusters = cluster_points(&pings, 0.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_count, 2);
    }

    #[test]
    fn test_large_radius_single_cluster() {
        let pings = vec![ping(1, 40.0, -3.7), ping(2, 41.0, -3.0), ping(3, 39.5, -4.0)];
        let clusters = cluster_points(&pings, 500.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_count, 3);
    }

    #[test]
    fn test_cluster_across_antimeridian() {
        let pings = vec![ping(1, 10.0, 179.99999), ping(2, 10.0, -179.99999)];
        // ~2.2 m apart across the dateline
        let clusters = cluster_points(&pings, 0.005);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_count, 2);
    }

    #[test]
    fn test_wide_radius_at_high_latitude() {
        // ~988 km apart along the great circle, 53 degrees of longitude at 80N
        let pings = vec![ping(1, 80.0, 0.0), ping(2, 80.0, 53.0)];
        let clusters = cluster_points(&pings, 1000.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_indices, vec![0, 1]);
    }

    #[test]
    fn test_cluster_across_north_pole() {
        // ~0.67 km apart over the pole, on opposite meridians
        let pings = vec![ping(1, 89.995, 0.0), ping(2, 89.999, 180.0)];
        let clusters = cluster_points(&pings, 1.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_count, 2);
    }

    #[test]
    fn test_cluster_center_empty() {
        assert!(cluster_center(&[]).is_none());
    }
}
