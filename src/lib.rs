//! # Track Composer
//!
//! Build a composite GPS track ("working track") out of slices of uploaded
//! tracks and routed links between them, then export the result as a single
//! GPX path.
//!
//! This library provides:
//! - An in-memory store owning uploaded tracks and the working track
//! - A selection state machine turning map picks into segment boundaries
//! - Slicing/stitching algorithms and gap detection across the working track
//! - A routing gateway contract (with an optional OpenRouteService client)
//!
//! ## Features
//!
//! - **`http`** - Enable the OpenRouteService HTTP client for routed segments
//!
//! ## Quick Start
//!
//! ```rust
//! use track_composer::{GeoPoint, TrackStore};
//!
//! let mut store = TrackStore::new();
//!
//! let points: Vec<GeoPoint> = (0..10)
//!     .map(|i| GeoPoint::new(51.5074 + i as f64 * 0.001, -0.1278))
//!     .collect();
//! let track_id = store.add_uploaded_track("Morning ride", points);
//!
//! // Pick a slice of the uploaded track as the first working-track segment
//! store.start_segment_picking();
//! store.handle_map_click(51.5094, -0.1278); // snaps to index 2
//! store.handle_map_click(51.5144, -0.1278); // snaps to index 7, commits
//!
//! assert_eq!(store.working_track().segments.len(), 1);
//! assert!(store.is_download_ready());
//! # let _ = track_id;
//! ```

use serde::{Deserialize, Serialize};

pub mod compose;
pub mod geo_utils;
pub mod gpx;
pub mod routing;
pub mod selection;
pub mod store;

pub use compose::{extract_slice, find_insertion_index, SliceSpec};
pub use gpx::{export_gpx, parse_gpx, GpxError, ParsedTrack};
pub use routing::{RoutingError, RoutingGateway, RoutingProfile};
pub use selection::{FreeRouteRequest, PickOutcome, SegmentPlacement, SelectionMode, SelectionState};
pub use store::{RouteTicket, StoreError, TrackStore};

#[cfg(feature = "http")]
pub use routing::OrsClient;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude, plus optional elevation and
/// timestamp carried through from the source file.
///
/// Points are immutable once created; edits to tracks and segments replace
/// whole point sequences rather than mutating individual points.
///
/// # Example
/// ```
/// use track_composer::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    /// Elevation in meters, if the source file carried one.
    pub ele: Option<f64>,
    /// Raw timestamp string from the source file, if present.
    pub time: Option<String>,
}

impl GeoPoint {
    /// Create a new point with no elevation or timestamp.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, ele: None, time: None }
    }

    /// Create a new point with an elevation.
    pub fn with_ele(lat: f64, lng: f64, ele: f64) -> Self {
        Self { lat, lng, ele: Some(ele), time: None }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }
}

/// Opaque identifier for an uploaded track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// Opaque identifier for a working-track segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "segment-{}", self.0)
    }
}

/// Bounding box over a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// An uploaded GPS track, created on successful parse of a track file.
///
/// `points` is never mutated after creation; renaming, recoloring and
/// visibility toggling only touch metadata. Owned exclusively by the
/// [`TrackStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedTrack {
    pub id: TrackId,
    pub name: String,
    /// Display color assigned from the store palette.
    pub color: String,
    pub points: Vec<GeoPoint>,
    pub visible: bool,
}

/// A contiguous (or track-to-track-joined) slice of one or two uploaded
/// tracks.
///
/// `points` is a materialized cache of the slice; the track ids and indices
/// are retained so that endpoint drags can re-slice from the live source
/// track rather than from stale cached points. The references are weak: if a
/// source track is removed the cached points stay valid but re-slicing fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpxSliceSegment {
    pub id: SegmentId,
    pub source_track_id: TrackId,
    pub start_track_id: TrackId,
    pub start_idx: usize,
    pub end_track_id: TrackId,
    pub end_idx: usize,
    pub points: Vec<GeoPoint>,
}

/// A segment whose geometry comes from the routing gateway.
///
/// `waypoints` are the user-controlled control points (always >= 2 once
/// committed); `points` is the last routing response, cached until the next
/// re-route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedSegment {
    pub id: SegmentId,
    pub waypoints: Vec<GeoPoint>,
    pub points: Vec<GeoPoint>,
    /// True when this segment was converted from a GPX slice and still shows
    /// slice geometry until the next routing response lands.
    pub converted: bool,
}

/// A working-track segment.
///
/// Modeled as an explicit sum type so consumers match exhaustively; a routed
/// segment can never carry slice indices and vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Segment {
    GpxSlice(GpxSliceSegment),
    Routed(RoutedSegment),
}

impl Segment {
    pub fn id(&self) -> SegmentId {
        match self {
            Segment::GpxSlice(s) => s.id,
            Segment::Routed(s) => s.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: SegmentId) {
        match self {
            Segment::GpxSlice(s) => s.id = id,
            Segment::Routed(s) => s.id = id,
        }
    }

    /// The materialized point sequence of this segment, in display order.
    pub fn points(&self) -> &[GeoPoint] {
        match self {
            Segment::GpxSlice(s) => &s.points,
            Segment::Routed(s) => &s.points,
        }
    }

    pub fn first_point(&self) -> Option<&GeoPoint> {
        self.points().first()
    }

    pub fn last_point(&self) -> Option<&GeoPoint> {
        self.points().last()
    }
}

/// The composite track being assembled.
///
/// Segment order is display and export order; adjacency implies an intended
/// connection, not a guaranteed one (see gap detection on the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingTrack {
    pub name: String,
    pub segments: Vec<Segment>,
}

impl Default for WorkingTrack {
    fn default() -> Self {
        Self { name: "My Track".to_string(), segments: Vec::new() }
    }
}

/// Result of snapping a raw coordinate to the nearest uploaded-track point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapResult {
    pub track_id: TrackId,
    pub idx: usize,
    pub lat: f64,
    pub lng: f64,
}

// ============================================================================
// Tests
// ============================================================================
