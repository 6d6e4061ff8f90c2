//! # Geographic Utilities
//!
//! Core geographic computation utilities for track composition.
//!
//! This module provides the fundamental geographic operations used by the
//! store, the selection state machine and the composition algorithms. All
//! functions are pure and deterministic.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`are_connected`] | Whether two points are within the gap threshold |
//! | [`snap_to_nearest`] | Closest visible uploaded-track point to a coordinate |
//! | [`compute_bounds`] | Bounding box across all uploaded tracks |
//! | [`path_length_km`] | Total length of a point sequence in kilometers |
//!
//! ## Example
//!
//! ```rust
//! use track_composer::GeoPoint;
//! use track_composer::geo_utils;
//!
//! let track = vec![
//!     GeoPoint::new(51.5074, -0.1278),  // London
//!     GeoPoint::new(51.5080, -0.1290),
//!     GeoPoint::new(51.5090, -0.1300),
//! ];
//!
//! let length = geo_utils::path_length_km(&track);
//! println!("Track length: {:.2}km", length);
//!
//! let dist = geo_utils::haversine_distance(&track[0], &track[2]);
//! println!("Start to end: {:.0}m", dist);
//! ```
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees),
//! which is the standard used by GPS receivers and mapping services.

use crate::{Bounds, GeoPoint, SnapResult, UploadedTrack};
use geo::{Distance, Haversine, Point};

/// Two points closer than this (in meters) count as connected; adjacent
/// working-track segments whose facing endpoints are connected have no gap.
pub const CONNECTED_THRESHOLD_METERS: f64 = 20.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the
/// Haversine formula.
///
/// Returns the distance in meters along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use track_composer::GeoPoint;
/// use track_composer::geo_utils::haversine_distance;
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.lng, p1.lat);
    let point2 = Point::new(p2.lng, p2.lat);
    Haversine::distance(point1, point2)
}

/// Whether two points are close enough to count as connected.
///
/// True iff the haversine distance is strictly below
/// [`CONNECTED_THRESHOLD_METERS`]. Gap detection across the working track is
/// defined in terms of this predicate.
#[inline]
pub fn are_connected(a: &GeoPoint, b: &GeoPoint) -> bool {
    haversine_distance(a, b) < CONNECTED_THRESHOLD_METERS
}

/// Total length of a point sequence in kilometers.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point sequences return 0.0.
pub fn path_length_km(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let meters: f64 = points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum();
    meters / 1000.0
}

// =============================================================================
// Snapping
// =============================================================================

/// Find the closest point across all **visible** uploaded tracks to a raw
/// coordinate.
///
/// Scans every point of every visible track; ties resolve to the first
/// point encountered in track-then-index order. Returns `None` if no visible
/// track has any point.
///
/// # Example
///
/// ```rust
/// use track_composer::{GeoPoint, TrackStore};
/// use track_composer::geo_utils::snap_to_nearest;
///
/// let mut store = TrackStore::new();
/// store.add_uploaded_track("t", vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)]);
///
/// let query = GeoPoint::new(0.0, 0.9);
/// let snapped = snap_to_nearest(&query, store.uploaded_tracks()).unwrap();
/// assert_eq!(snapped.idx, 1);
/// ```
pub fn snap_to_nearest(latlng: &GeoPoint, tracks: &[UploadedTrack]) -> Option<SnapResult> {
    let mut best: Option<SnapResult> = None;
    let mut best_dist = f64::INFINITY;

    for track in tracks {
        if !track.visible {
            continue;
        }
        for (i, p) in track.points.iter().enumerate() {
            let d = haversine_distance(latlng, p);
            if d < best_dist {
                best_dist = d;
                best = Some(SnapResult {
                    track_id: track.id,
                    idx: i,
                    lat: p.lat,
                    lng: p.lng,
                });
            }
        }
    }
    best
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box across all points of all uploaded tracks.
///
/// Visibility is ignored here; hidden tracks still contribute to the box.
/// Returns `None` if there are no points at all.
///
/// # Example
///
/// ```rust
/// use track_composer::{GeoPoint, TrackStore};
/// use track_composer::geo_utils::compute_bounds;
///
/// let mut store = TrackStore::new();
/// store.add_uploaded_track("t", vec![
///     GeoPoint::new(51.5000, -0.1300),
///     GeoPoint::new(51.5100, -0.1200),
/// ]);
///
/// let bounds = compute_bounds(store.uploaded_tracks()).unwrap();
/// assert_eq!(bounds.min_lat, 51.5000);
/// assert_eq!(bounds.max_lng, -0.1200);
/// ```
pub fn compute_bounds(tracks: &[UploadedTrack]) -> Option<Bounds> {
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lng = f64::INFINITY;
    let mut max_lng = f64::NEG_INFINITY;

    for track in tracks {
        for p in &track.points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }
    }

    if !min_lat.is_finite() {
        return None;
    }

    Some(Bounds { min_lat, max_lat, min_lng, max_lng })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackId;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn track(id: u64, visible: bool, points: Vec<GeoPoint>) -> UploadedTrack {
        UploadedTrack {
            id: TrackId(id),
            name: format!("track {id}"),
            color: "#E63946".to_string(),
            points,
            visible,
        }
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0)); // Within 5km
    }

    #[test]
    fn test_are_connected_threshold() {
        let a = GeoPoint::new(0.0, 0.0);
        // ~11m east at the equator
        let near = GeoPoint::new(0.0, 0.0001);
        // ~55m east at the equator
        let far = GeoPoint::new(0.0, 0.0005);

        assert!(are_connected(&a, &a));
        assert!(are_connected(&a, &near));
        assert!(!are_connected(&a, &far));
    }

    #[test]
    fn test_path_length_empty_and_single() {
        assert_eq!(path_length_km(&[]), 0.0);
        assert_eq!(path_length_km(&[GeoPoint::new(51.5074, -0.1278)]), 0.0);
    }

    #[test]
    fn test_path_length_two_points() {
        let points = vec![
            GeoPoint::new(51.5074, -0.1278),
            GeoPoint::new(51.5080, -0.1280),
        ];
        let length = path_length_km(&points);
        assert!(length > 0.0);
        assert!(length < 0.1); // Should be about 68m
    }

    #[test]
    fn test_snap_to_nearest_picks_closest() {
        let tracks = vec![track(1, true, vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
        ])];
        let snapped = snap_to_nearest(&GeoPoint::new(0.0, 0.9), &tracks).unwrap();
        assert_eq!(snapped.idx, 1);
        assert_eq!(snapped.track_id, TrackId(1));
        assert_eq!(snapped.lng, 1.0);
    }

    #[test]
    fn test_snap_to_nearest_skips_invisible() {
        let tracks = vec![
            track(1, false, vec![GeoPoint::new(0.0, 0.9)]),
            track(2, true, vec![GeoPoint::new(0.0, 0.0)]),
        ];
        let snapped = snap_to_nearest(&GeoPoint::new(0.0, 0.9), &tracks).unwrap();
        assert_eq!(snapped.track_id, TrackId(2));
    }

    #[test]
    fn test_snap_to_nearest_empty() {
        assert!(snap_to_nearest(&GeoPoint::new(0.0, 0.0), &[]).is_none());

        let all_hidden = vec![track(1, false, vec![GeoPoint::new(0.0, 0.0)])];
        assert!(snap_to_nearest(&GeoPoint::new(0.0, 0.0), &all_hidden).is_none());
    }

    #[test]
    fn test_snap_tie_resolves_to_first() {
        // Two tracks with a point at the exact same location
        let tracks = vec![
            track(1, true, vec![GeoPoint::new(0.0, 0.5)]),
            track(2, true, vec![GeoPoint::new(0.0, 0.5)]),
        ];
        let snapped = snap_to_nearest(&GeoPoint::new(0.0, 0.5), &tracks).unwrap();
        assert_eq!(snapped.track_id, TrackId(1));
    }

    #[test]
    fn test_compute_bounds() {
        let tracks = vec![
            track(1, true, vec![GeoPoint::new(51.50, -0.13), GeoPoint::new(51.51, -0.12)]),
            track(2, false, vec![GeoPoint::new(51.49, -0.14)]),
        ];
        // Hidden tracks still count
        let bounds = compute_bounds(&tracks).unwrap();
        assert_eq!(bounds.min_lat, 51.49);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.14);
        assert_eq!(bounds.max_lng, -0.12);
    }

    #[test]
    fn test_compute_bounds_empty() {
        assert!(compute_bounds(&[]).is_none());
        let no_points = vec![track(1, true, vec![])];
        assert!(compute_bounds(&no_points).is_none());
    }
}
