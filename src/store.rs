//! The track store: single source of truth for uploaded tracks, the working
//! track, selection state and routing settings.
//!
//! Every mutation is synchronous and atomic; a failed mutation returns a
//! [`StoreError`] and leaves the store in its previous valid state. Routing
//! calls are the only suspending operations and go through the
//! [`begin_reroute`](TrackStore::begin_reroute) /
//! [`commit_reroute`](TrackStore::commit_reroute) ticket pair so that a slow
//! earlier response can never overwrite a newer edit.

use crate::compose::{self, SliceSpec};
use crate::geo_utils::path_length_km;
use crate::routing::RoutingProfile;
use crate::selection::SelectionState;
use crate::{
    GeoPoint, GpxSliceSegment, RoutedSegment, Segment, SegmentId, TrackId, UploadedTrack,
    WorkingTrack,
};
use log::debug;
use std::collections::HashMap;
use thiserror::Error;

/// Distinct colours for uploaded tracks, high-contrast on a light basemap.
/// Assigned cyclically; the cursor persists across additions and resets only
/// on [`TrackStore::clear_all`].
pub const TRACK_COLORS: [&str; 10] = [
    "#E63946", // vivid red
    "#2563EB", // electric blue
    "#16A34A", // strong green
    "#9333EA", // violet
    "#EA580C", // deep orange
    "#0891B2", // cyan
    "#CA8A04", // gold
    "#DB2777", // pink
    "#059669", // emerald
    "#7C3AED", // indigo
];

/// Failures of store mutations. The store is unchanged after any error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),
    #[error("Unknown segment: {0}")]
    UnknownSegment(SegmentId),
    #[error("Segment {0} is not a GPX slice")]
    NotAGpxSlice(SegmentId),
    #[error("Segment {0} is not a routed segment")]
    NotRouted(SegmentId),
    #[error("Segment geometry needs at least 2 points")]
    DegenerateSegment,
    #[error("Stale routing response for segment {0}")]
    StaleRouteResponse(SegmentId),
    #[error("No segment pair at index {0}")]
    NoSuchGap(usize),
}

/// Token handed out by [`TrackStore::begin_reroute`]; a routing response is
/// only applied if its ticket generation is still current for the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTicket {
    pub segment_id: SegmentId,
    generation: u64,
}

/// Per-session state container. See the module docs for the mutation model.
#[derive(Debug, Default)]
pub struct TrackStore {
    uploaded_tracks: Vec<UploadedTrack>,
    working_track: WorkingTrack,
    selection: SelectionState,
    routing_profile: RoutingProfile,
    color_cursor: usize,
    next_track_id: u64,
    next_segment_id: u64,
    route_generations: HashMap<SegmentId, u64>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn uploaded_tracks(&self) -> &[UploadedTrack] {
        &self.uploaded_tracks
    }

    pub fn uploaded_track(&self, id: TrackId) -> Option<&UploadedTrack> {
        self.uploaded_tracks.iter().find(|t| t.id == id)
    }

    pub fn working_track(&self) -> &WorkingTrack {
        &self.working_track
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.working_track.segments.iter().find(|s| s.id() == id)
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub(crate) fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    pub fn routing_profile(&self) -> RoutingProfile {
        self.routing_profile
    }

    pub fn set_routing_profile(&mut self, profile: RoutingProfile) {
        self.routing_profile = profile;
    }

    /// Total length of the working track in kilometers, summed per segment.
    pub fn total_length_km(&self) -> f64 {
        self.working_track
            .segments
            .iter()
            .map(|s| path_length_km(s.points()))
            .sum()
    }

    // ========================================================================
    // Uploaded Tracks
    // ========================================================================

    /// Add a parsed track, assigning a fresh id and the next palette color.
    pub fn add_uploaded_track(&mut self, name: &str, points: Vec<GeoPoint>) -> TrackId {
        self.next_track_id += 1;
        let id = TrackId(self.next_track_id);

        let color = TRACK_COLORS[self.color_cursor % TRACK_COLORS.len()];
        self.color_cursor += 1;

        debug!("[TrackStore] Added {} ({} points, {})", id, points.len(), color);
        self.uploaded_tracks.push(UploadedTrack {
            id,
            name: name.to_string(),
            color: color.to_string(),
            points,
            visible: true,
        });
        id
    }

    /// Remove an uploaded track.
    ///
    /// Segments referencing the track are not cascade-deleted; their cached
    /// points stay valid but endpoint re-slicing becomes impossible.
    pub fn remove_uploaded_track(&mut self, id: TrackId) -> Result<(), StoreError> {
        let before = self.uploaded_tracks.len();
        self.uploaded_tracks.retain(|t| t.id != id);
        if self.uploaded_tracks.len() == before {
            return Err(StoreError::UnknownTrack(id));
        }
        Ok(())
    }

    pub fn rename_track(&mut self, id: TrackId, name: &str) -> Result<(), StoreError> {
        let track = self.uploaded_track_mut(id)?;
        track.name = name.to_string();
        Ok(())
    }

    pub fn recolor_track(&mut self, id: TrackId, color: &str) -> Result<(), StoreError> {
        let track = self.uploaded_track_mut(id)?;
        track.color = color.to_string();
        Ok(())
    }

    pub fn set_track_visibility(&mut self, id: TrackId, visible: bool) -> Result<(), StoreError> {
        let track = self.uploaded_track_mut(id)?;
        track.visible = visible;
        Ok(())
    }

    fn uploaded_track_mut(&mut self, id: TrackId) -> Result<&mut UploadedTrack, StoreError> {
        self.uploaded_tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::UnknownTrack(id))
    }

    // ========================================================================
    // Working Track
    // ========================================================================

    pub fn set_working_track_name(&mut self, name: &str) {
        self.working_track.name = name.to_string();
    }

    /// Append a segment, assigning it a fresh id.
    pub fn add_segment(&mut self, segment: Segment) -> Result<SegmentId, StoreError> {
        let segment = self.admit_segment(segment)?;
        let id = segment.id();
        self.working_track.segments.push(segment);
        debug!("[TrackStore] Appended {}", id);
        Ok(id)
    }

    /// Prepend a segment, assigning it a fresh id.
    pub fn prepend_segment(&mut self, segment: Segment) -> Result<SegmentId, StoreError> {
        let segment = self.admit_segment(segment)?;
        let id = segment.id();
        self.working_track.segments.insert(0, segment);
        debug!("[TrackStore] Prepended {}", id);
        Ok(id)
    }

    /// Insert a segment immediately after the segment currently at `index`
    /// (used to fill a detected gap between segments `index` and `index+1`).
    pub fn insert_segment_at(&mut self, index: usize, segment: Segment) -> Result<SegmentId, StoreError> {
        let segment = self.admit_segment(segment)?;
        let id = segment.id();
        let at = (index + 1).min(self.working_track.segments.len());
        self.working_track.segments.insert(at, segment);
        debug!("[TrackStore] Inserted {} after index {}", id, index);
        Ok(id)
    }

    /// Remove a segment by id. Neighbors are not re-stitched.
    pub fn remove_segment(&mut self, id: SegmentId) -> Result<(), StoreError> {
        let before = self.working_track.segments.len();
        self.working_track.segments.retain(|s| s.id() != id);
        if self.working_track.segments.len() == before {
            return Err(StoreError::UnknownSegment(id));
        }
        self.route_generations.remove(&id);
        Ok(())
    }

    /// Replace a segment wholesale, preserving only its external id.
    pub fn replace_segment(&mut self, id: SegmentId, new_segment: Segment) -> Result<(), StoreError> {
        if new_segment.points().len() < 2 {
            return Err(StoreError::DegenerateSegment);
        }
        let mut new_segment = normalize_segment(new_segment);
        new_segment.set_id(id);

        let slot = self
            .working_track
            .segments
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or(StoreError::UnknownSegment(id))?;
        *slot = new_segment;
        self.bump_generation(id);
        Ok(())
    }

    /// Recompute a GPX slice's points from current track data.
    ///
    /// A result with fewer than 2 points leaves the store unchanged.
    pub fn update_segment_endpoints(&mut self, id: SegmentId, spec: SliceSpec) -> Result<(), StoreError> {
        if self.uploaded_track(spec.start_track_id).is_none() {
            return Err(StoreError::UnknownTrack(spec.start_track_id));
        }
        let points = compose::extract_slice(&self.uploaded_tracks, &spec)
            .ok_or(StoreError::DegenerateSegment)?;

        match self.segment_mut(id)? {
            Segment::GpxSlice(s) => {
                s.start_track_id = spec.start_track_id;
                s.start_idx = spec.start_idx;
                s.end_track_id = spec.end_track_id;
                s.end_idx = spec.end_idx;
                s.points = points;
                Ok(())
            }
            Segment::Routed(_) => Err(StoreError::NotAGpxSlice(id)),
        }
    }

    /// Handle an endpoint-handle drag on a GPX slice.
    ///
    /// Snapping only considers the uploaded track that the dragged endpoint
    /// belongs to; if that track was removed the drag fails gracefully and
    /// the segment keeps its cached points.
    pub fn drag_segment_endpoint(
        &mut self,
        id: SegmentId,
        drag_start: bool,
        lat: f64,
        lng: f64,
    ) -> Result<(), StoreError> {
        let spec = match self.segment(id).ok_or(StoreError::UnknownSegment(id))? {
            Segment::GpxSlice(s) => {
                compose::resolve_endpoint_drag(s, drag_start, lat, lng, &self.uploaded_tracks)
                    .ok_or(StoreError::UnknownTrack(if drag_start {
                        s.start_track_id
                    } else {
                        s.end_track_id
                    }))?
            }
            Segment::Routed(_) => return Err(StoreError::NotAGpxSlice(id)),
        };
        self.update_segment_endpoints(id, spec)
    }

    /// Replace a routed segment's waypoints and points atomically.
    ///
    /// Invalidates any in-flight re-route for the segment.
    pub fn update_routed_segment_waypoints(
        &mut self,
        id: SegmentId,
        waypoints: Vec<GeoPoint>,
        points: Vec<GeoPoint>,
    ) -> Result<(), StoreError> {
        if waypoints.len() < 2 || points.len() < 2 {
            return Err(StoreError::DegenerateSegment);
        }
        match self.segment_mut(id)? {
            Segment::Routed(s) => {
                s.waypoints = waypoints;
                s.points = points;
            }
            Segment::GpxSlice(_) => return Err(StoreError::NotRouted(id)),
        }
        self.bump_generation(id);
        Ok(())
    }

    /// Convert a GPX slice into a routed segment anchored at the click.
    ///
    /// The new waypoints are `[first, click, last]`; the old slice geometry
    /// stays in place as stale display until a routing response lands. On
    /// routing failure the segment keeps this last-known-good geometry and
    /// stays routed.
    pub fn convert_segment_to_routed(
        &mut self,
        id: SegmentId,
        click_lat: f64,
        click_lng: f64,
    ) -> Result<(), StoreError> {
        let (first, last, points) = match self.segment(id).ok_or(StoreError::UnknownSegment(id))? {
            Segment::GpxSlice(s) => {
                let first = s.points.first().cloned().ok_or(StoreError::DegenerateSegment)?;
                let last = s.points.last().cloned().ok_or(StoreError::DegenerateSegment)?;
                (first, last, s.points.clone())
            }
            Segment::Routed(_) => return Err(StoreError::NotAGpxSlice(id)),
        };

        let routed = Segment::Routed(RoutedSegment {
            id,
            waypoints: vec![first, GeoPoint::new(click_lat, click_lng), last],
            points,
            converted: true,
        });
        *self.segment_mut(id)? = routed;
        self.bump_generation(id);
        Ok(())
    }

    // ========================================================================
    // Re-routing Tickets
    // ========================================================================

    /// Start a re-route for a routed segment. The returned ticket supersedes
    /// every earlier ticket for the same segment (last request wins).
    pub fn begin_reroute(&mut self, id: SegmentId) -> Result<RouteTicket, StoreError> {
        match self.segment(id).ok_or(StoreError::UnknownSegment(id))? {
            Segment::Routed(_) => {}
            Segment::GpxSlice(_) => return Err(StoreError::NotRouted(id)),
        }
        let generation = self.bump_generation(id);
        Ok(RouteTicket { segment_id: id, generation })
    }

    /// Apply a routing response for an earlier [`begin_reroute`].
    ///
    /// Discarded with [`StoreError::StaleRouteResponse`] if the segment has
    /// been edited or re-routed again since the ticket was issued.
    ///
    /// [`begin_reroute`]: TrackStore::begin_reroute
    pub fn commit_reroute(
        &mut self,
        ticket: RouteTicket,
        waypoints: Vec<GeoPoint>,
        points: Vec<GeoPoint>,
    ) -> Result<(), StoreError> {
        let current = self.route_generations.get(&ticket.segment_id).copied().unwrap_or(0);
        if current != ticket.generation {
            debug!(
                "[TrackStore] Discarding stale route for {} (gen {} != {})",
                ticket.segment_id, ticket.generation, current
            );
            return Err(StoreError::StaleRouteResponse(ticket.segment_id));
        }
        // update_routed_segment_waypoints bumps the generation, retiring
        // this ticket once applied.
        self.update_routed_segment_waypoints(ticket.segment_id, waypoints, points)
    }

    fn bump_generation(&mut self, id: SegmentId) -> u64 {
        let entry = self.route_generations.entry(id).or_insert(0);
        *entry += 1;
        *entry
    }

    // ========================================================================
    // Derived State
    // ========================================================================

    /// Gap indices across the working track, recomputed on every call.
    /// Index `i` means "gap after segment `i`".
    pub fn gap_indices(&self) -> Vec<usize> {
        compose::gap_indices(&self.working_track.segments)
    }

    /// Waypoints for routing the gap after segment `index`.
    pub fn gap_route_waypoints(&self, index: usize) -> Option<(GeoPoint, GeoPoint)> {
        compose::gap_route_waypoints(&self.working_track.segments, index)
    }

    /// Insert routed geometry filling the gap after segment `index`.
    pub fn fill_gap(&mut self, index: usize, points: Vec<GeoPoint>) -> Result<SegmentId, StoreError> {
        let (from, to) = self
            .gap_route_waypoints(index)
            .ok_or(StoreError::NoSuchGap(index))?;
        self.insert_segment_at(
            index,
            Segment::Routed(RoutedSegment {
                id: SegmentId(0),
                waypoints: vec![from, to],
                points,
                converted: false,
            }),
        )
    }

    /// True iff the working track has at least one segment and no gaps.
    pub fn is_download_ready(&self) -> bool {
        !self.working_track.segments.is_empty() && self.gap_indices().is_empty()
    }

    // ========================================================================
    // Session Reset
    // ========================================================================

    /// Full session reset: uploaded tracks, working track, selection state
    /// and the palette cursor all return to initial values.
    pub fn clear_all(&mut self) {
        debug!("[TrackStore] Clearing session");
        *self = Self::default();
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn segment_mut(&mut self, id: SegmentId) -> Result<&mut Segment, StoreError> {
        self.working_track
            .segments
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or(StoreError::UnknownSegment(id))
    }

    /// Validate and normalize an incoming segment and assign a fresh id.
    fn admit_segment(&mut self, segment: Segment) -> Result<Segment, StoreError> {
        if segment.points().len() < 2 {
            return Err(StoreError::DegenerateSegment);
        }
        let mut segment = normalize_segment(segment);
        self.next_segment_id += 1;
        segment.set_id(SegmentId(self.next_segment_id));
        Ok(segment)
    }
}

/// Ensure routed segments always carry usable waypoints: a routed segment
/// arriving with fewer than 2 waypoints gets `[first, last]` of its points.
fn normalize_segment(segment: Segment) -> Segment {
    match segment {
        Segment::Routed(mut s) if s.waypoints.len() < 2 && s.points.len() >= 2 => {
            s.waypoints = vec![s.points[0].clone(), s.points[s.points.len() - 1].clone()];
            Segment::Routed(s)
        }
        other => other,
    }
}

// ============================================================================
// Tests
// ============================================================================
