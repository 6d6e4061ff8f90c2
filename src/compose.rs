//! Segment composition algorithms.
//!
//! Everything that derives point sequences for working-track segments lives
//! here: slice extraction from uploaded tracks, endpoint-drag re-slicing,
//! waypoint insertion on routed paths, and gap detection across the working
//! track. All functions are pure; the [`TrackStore`](crate::TrackStore)
//! commits their results.

use crate::geo_utils::{are_connected, haversine_distance, snap_to_nearest};
use crate::{GeoPoint, GpxSliceSegment, Segment, SnapResult, TrackId, UploadedTrack};

/// Source boundaries of a GPX slice: which tracks and which point indices
/// the slice is cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
    pub start_track_id: TrackId,
    pub start_idx: usize,
    pub end_track_id: TrackId,
    pub end_idx: usize,
}

impl SliceSpec {
    /// Build a spec from two snapped anchors.
    pub fn from_anchors(start: &SnapResult, end: &SnapResult) -> Self {
        Self {
            start_track_id: start.track_id,
            start_idx: start.idx,
            end_track_id: end.track_id,
            end_idx: end.idx,
        }
    }
}

// =============================================================================
// Slice Extraction
// =============================================================================

/// Materialize the point sequence described by a [`SliceSpec`] from current
/// track data.
///
/// - Same track: indices are ordered ascending and the inclusive
///   sub-sequence is taken, so `start=3, end=1` equals `start=1, end=3`.
/// - Different tracks: the tail of the start track from `start_idx` is
///   concatenated with the head of the end track up to and including
///   `end_idx`. A missing end track contributes an empty continuation.
///
/// Returns `None` if the start track cannot be found or the resulting
/// sequence has fewer than 2 points. Degenerate slices are never committed.
pub fn extract_slice(tracks: &[UploadedTrack], spec: &SliceSpec) -> Option<Vec<GeoPoint>> {
    let start_track = tracks.iter().find(|t| t.id == spec.start_track_id)?;

    let points: Vec<GeoPoint> = if spec.start_track_id == spec.end_track_id {
        let (from, to) = if spec.start_idx <= spec.end_idx {
            (spec.start_idx, spec.end_idx)
        } else {
            (spec.end_idx, spec.start_idx)
        };
        if to >= start_track.points.len() {
            return None;
        }
        start_track.points[from..=to].to_vec()
    } else {
        let end_track = tracks.iter().find(|t| t.id == spec.end_track_id);
        let head = start_track.points.get(spec.start_idx..).unwrap_or(&[]);
        let tail = end_track
            .map(|t| t.points.get(..=spec.end_idx.min(t.points.len().saturating_sub(1))).unwrap_or(&[]))
            .unwrap_or(&[]);
        head.iter().chain(tail.iter()).cloned().collect()
    };

    if points.len() < 2 {
        return None;
    }
    Some(points)
}

/// Resolve an endpoint drag on a GPX slice into a new [`SliceSpec`].
///
/// The dragged coordinate is snapped only against the uploaded track the
/// moved endpoint belongs to; the other endpoint's boundary is untouched.
/// Returns `None` if that track no longer exists or has no points.
pub fn resolve_endpoint_drag(
    segment: &GpxSliceSegment,
    drag_start: bool,
    lat: f64,
    lng: f64,
    tracks: &[UploadedTrack],
) -> Option<SliceSpec> {
    let target_id = if drag_start {
        segment.start_track_id
    } else {
        segment.end_track_id
    };

    let owner: Vec<UploadedTrack> = tracks
        .iter()
        .filter(|t| t.id == target_id)
        .cloned()
        .collect();
    let snapped = snap_to_nearest(&GeoPoint::new(lat, lng), &owner)?;

    Some(SliceSpec {
        start_track_id: segment.start_track_id,
        start_idx: if drag_start { snapped.idx } else { segment.start_idx },
        end_track_id: segment.end_track_id,
        end_idx: if drag_start { segment.end_idx } else { snapped.idx },
    })
}

// =============================================================================
// Routed Waypoint Editing
// =============================================================================

/// Find where a click on a rendered routed path should be inserted into its
/// waypoint list.
///
/// Picks the adjacent waypoint pair whose midpoint is closest (great-circle)
/// to the click and returns the index immediately after the first of that
/// pair. With fewer than 2 waypoints, returns 0.
pub fn find_insertion_index(click: &GeoPoint, waypoints: &[GeoPoint]) -> usize {
    if waypoints.len() <= 1 {
        return 0;
    }

    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for i in 0..waypoints.len() - 1 {
        let mid = GeoPoint::new(
            (waypoints[i].lat + waypoints[i + 1].lat) / 2.0,
            (waypoints[i].lng + waypoints[i + 1].lng) / 2.0,
        );
        let d = haversine_distance(click, &mid);
        if d < best_dist {
            best_dist = d;
            best_idx = i;
        }
    }
    best_idx + 1
}

/// Insert a clicked point into a waypoint list at its best insertion index.
///
/// The returned list is the input to the next re-route request for the
/// segment; the segment itself is only updated once that route resolves.
pub fn insert_waypoint(waypoints: &[GeoPoint], click: GeoPoint) -> Vec<GeoPoint> {
    let idx = find_insertion_index(&click, waypoints);
    let mut updated = Vec::with_capacity(waypoints.len() + 1);
    updated.extend_from_slice(&waypoints[..idx]);
    updated.push(click);
    updated.extend_from_slice(&waypoints[idx..]);
    updated
}

// =============================================================================
// Gap Detection
// =============================================================================

/// Indices of gaps in the working track: index `i` means "gap between
/// segment `i` and segment `i+1`".
///
/// A gap exists iff the last point of segment `i` and the first point of
/// segment `i+1` are not connected (see
/// [`CONNECTED_THRESHOLD_METERS`](crate::geo_utils::CONNECTED_THRESHOLD_METERS)).
/// Pairs where either side has no points are skipped.
pub fn gap_indices(segments: &[Segment]) -> Vec<usize> {
    let mut gaps = Vec::new();
    for i in 0..segments.len().saturating_sub(1) {
        let (a, b) = (segments[i].last_point(), segments[i + 1].first_point());
        let (Some(a), Some(b)) = (a, b) else { continue };
        if !are_connected(a, b) {
            gaps.push(i);
        }
    }
    gaps
}

/// Waypoints for routing the gap after segment `i`: the last point of
/// segment `i` and the first point of segment `i+1`.
///
/// The resulting routed segment is meant to be inserted at index `i` via
/// [`TrackStore::insert_segment_at`](crate::TrackStore::insert_segment_at).
pub fn gap_route_waypoints(segments: &[Segment], i: usize) -> Option<(GeoPoint, GeoPoint)> {
    let from = segments.get(i)?.last_point()?.clone();
    let to = segments.get(i + 1)?.first_point()?.clone();
    Some((from, to))
}

// =============================================================================
// Unit Tests
// =============================================================================
