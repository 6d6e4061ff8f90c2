//! Selection state machine: turns a sequence of map picks into segment
//! boundaries.
//!
//! Two-point picks walk `Idle -> PickingStart -> PickingEnd -> Idle` and
//! commit a GPX slice. The free start/end modes are single-shot: one pick
//! resolves to a routing request (handed back to the caller) and the machine
//! returns to `Idle`. Escape or an explicit cancel drops any in-progress
//! selection.

use crate::compose::{self, SliceSpec};
use crate::geo_utils::snap_to_nearest;
use crate::routing::RoutingProfile;
use crate::store::{StoreError, TrackStore};
use crate::{GeoPoint, GpxSliceSegment, RoutedSegment, Segment, SegmentId, SnapResult};
use log::debug;
use serde::{Deserialize, Serialize};

/// Which pick the machine is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    #[default]
    Idle,
    PickingStart,
    PickingEnd,
    PickingFreeStart,
    PickingFreeEnd,
}

/// Transient selection state; reset on cancellation, completion or escape.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionState {
    pub mode: SelectionMode,
    pub anchor: Option<SnapResult>,
}

impl SelectionState {
    pub fn is_active(&self) -> bool {
        self.mode != SelectionMode::Idle
    }
}

/// Where a free-pick routed segment goes in the working track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPlacement {
    Prepend,
    Append,
}

/// A routing request produced by a free start/end pick. The caller routes
/// `from -> to` and commits the result with
/// [`TrackStore::complete_free_route`].
#[derive(Debug, Clone, PartialEq)]
pub struct FreeRouteRequest {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub placement: SegmentPlacement,
    pub profile: RoutingProfile,
}

/// What a map click resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    /// The click did not resolve to anything; the machine state is
    /// unchanged (or was a single-shot mode with nothing to do).
    Ignored,
    /// The start anchor was stored; the machine now waits for the end pick.
    AnchorSet(SnapResult),
    /// A GPX slice was committed to the working track.
    Committed(SegmentId),
    /// The selection ended without committing (missing track or degenerate
    /// slice); the working track is unchanged.
    Abandoned,
    /// A free pick resolved into a routing request for the caller.
    RouteRequest(FreeRouteRequest),
}

impl TrackStore {
    // ========================================================================
    // Mode Transitions
    // ========================================================================

    /// Enter the two-point GPX pick flow, clearing any prior anchor.
    pub fn start_segment_picking(&mut self) {
        *self.selection_mut() = SelectionState {
            mode: SelectionMode::PickingStart,
            anchor: None,
        };
    }

    /// Enter the single-shot free-start pick: the next click routes to the
    /// beginning of the working track.
    pub fn start_free_start_picking(&mut self) {
        *self.selection_mut() = SelectionState {
            mode: SelectionMode::PickingFreeStart,
            anchor: None,
        };
    }

    /// Enter the single-shot free-end pick: the next click routes from the
    /// end of the working track.
    pub fn start_free_end_picking(&mut self) {
        *self.selection_mut() = SelectionState {
            mode: SelectionMode::PickingFreeEnd,
            anchor: None,
        };
    }

    /// Drop any in-progress selection and return to idle.
    pub fn cancel_selection(&mut self) {
        *self.selection_mut() = SelectionState::default();
    }

    /// Escape cancels an active selection. Returns whether anything was
    /// cancelled.
    pub fn handle_escape(&mut self) -> bool {
        if self.selection().is_active() {
            self.cancel_selection();
            return true;
        }
        false
    }

    /// The segment-picking shortcut key: starts picking when idle, cancels
    /// when any selection is active. Key presses originating from text
    /// inputs must be flagged so they do not trigger the shortcut.
    pub fn handle_shortcut_key(&mut self, from_text_input: bool) -> bool {
        if from_text_input {
            return false;
        }
        if self.selection().is_active() {
            self.cancel_selection();
        } else {
            self.start_segment_picking();
        }
        true
    }

    // ========================================================================
    // Pick Resolution
    // ========================================================================

    /// Resolve a map click against the current selection mode.
    pub fn handle_map_click(&mut self, lat: f64, lng: f64) -> PickOutcome {
        match self.selection().mode {
            SelectionMode::Idle => PickOutcome::Ignored,
            SelectionMode::PickingStart => self.pick_start(lat, lng),
            SelectionMode::PickingEnd => self.pick_end(lat, lng),
            SelectionMode::PickingFreeStart => self.pick_free(lat, lng, SegmentPlacement::Prepend),
            SelectionMode::PickingFreeEnd => self.pick_free(lat, lng, SegmentPlacement::Append),
        }
    }

    fn pick_start(&mut self, lat: f64, lng: f64) -> PickOutcome {
        let Some(snapped) = snap_to_nearest(&GeoPoint::new(lat, lng), self.uploaded_tracks())
        else {
            // No visible track point to snap to; stay in picking_start
            return PickOutcome::Ignored;
        };
        *self.selection_mut() = SelectionState {
            mode: SelectionMode::PickingEnd,
            anchor: Some(snapped),
        };
        PickOutcome::AnchorSet(snapped)
    }

    fn pick_end(&mut self, lat: f64, lng: f64) -> PickOutcome {
        let Some(end) = snap_to_nearest(&GeoPoint::new(lat, lng), self.uploaded_tracks()) else {
            return PickOutcome::Ignored;
        };
        let Some(start) = self.selection().anchor else {
            // Anchor lost (e.g. its track removed mid-selection)
            self.cancel_selection();
            return PickOutcome::Abandoned;
        };
        self.cancel_selection();

        let spec = SliceSpec::from_anchors(&start, &end);
        let Some(points) = compose::extract_slice(self.uploaded_tracks(), &spec) else {
            debug!("[Selection] Abandoning pick: slice unavailable or under 2 points");
            return PickOutcome::Abandoned;
        };

        match self.add_segment(Segment::GpxSlice(GpxSliceSegment {
            id: SegmentId(0), // replaced on admission
            source_track_id: spec.start_track_id,
            start_track_id: spec.start_track_id,
            start_idx: spec.start_idx,
            end_track_id: spec.end_track_id,
            end_idx: spec.end_idx,
            points,
        })) {
            Ok(id) => PickOutcome::Committed(id),
            Err(_) => PickOutcome::Abandoned,
        }
    }

    fn pick_free(&mut self, lat: f64, lng: f64, placement: SegmentPlacement) -> PickOutcome {
        // Single-shot: the mode ends with this pick either way
        self.cancel_selection();

        let click = GeoPoint::new(lat, lng);
        let segments = &self.working_track().segments;
        let (from, to) = match placement {
            SegmentPlacement::Prepend => {
                let Some(first) = segments.first().and_then(|s| s.first_point()) else {
                    return PickOutcome::Ignored;
                };
                (click, first.clone())
            }
            SegmentPlacement::Append => {
                let Some(last) = segments.last().and_then(|s| s.last_point()) else {
                    return PickOutcome::Ignored;
                };
                (last.clone(), click)
            }
        };

        PickOutcome::RouteRequest(FreeRouteRequest {
            from,
            to,
            placement,
            profile: self.routing_profile(),
        })
    }

    /// Commit the routed geometry for an earlier [`FreeRouteRequest`].
    pub fn complete_free_route(
        &mut self,
        request: &FreeRouteRequest,
        points: Vec<GeoPoint>,
    ) -> Result<SegmentId, StoreError> {
        let segment = Segment::Routed(RoutedSegment {
            id: SegmentId(0),
            waypoints: vec![request.from.clone(), request.to.clone()],
            points,
            converted: false,
        });
        match request.placement {
            SegmentPlacement::Prepend => self.prepend_segment(segment),
            SegmentPlacement::Append => self.add_segment(segment),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
