//! End-to-end working-track scenarios: upload, pick, route, export, reset.

use track_composer::{
    export_gpx, parse_gpx, GeoPoint, PickOutcome, RoutingError, RoutingGateway, RoutingProfile,
    Segment, SegmentPlacement, StoreError, TrackStore,
};

/// Routing gateway double that returns the waypoints as the path.
struct StraightLineGateway;

impl RoutingGateway for StraightLineGateway {
    fn route(
        &self,
        waypoints: &[GeoPoint],
        _profile: RoutingProfile,
    ) -> Result<Vec<GeoPoint>, RoutingError> {
        if waypoints.len() < 2 {
            return Err(RoutingError::TooFewWaypoints);
        }
        Ok(waypoints.to_vec())
    }
}

/// Routing gateway double that always fails.
struct DownGateway;

impl RoutingGateway for DownGateway {
    fn route(
        &self,
        _waypoints: &[GeoPoint],
        _profile: RoutingProfile,
    ) -> Result<Vec<GeoPoint>, RoutingError> {
        Err(RoutingError::Gateway("service unavailable".to_string()))
    }
}

fn sample_gpx(n: usize) -> String {
    let mut trkpts = String::new();
    for i in 0..n {
        trkpts.push_str(&format!(
            "<trkpt lat=\"0.0000000\" lon=\"{:.7}\"><ele>100.0</ele></trkpt>\n",
            i as f64 * 0.001
        ));
    }
    format!(
        "<gpx><trk><name>Uploaded</name><trkseg>\n{trkpts}</trkseg></trk></gpx>"
    )
}

#[test]
fn upload_pick_and_export() {
    let mut store = TrackStore::new();

    let parsed = parse_gpx(&sample_gpx(10)).unwrap();
    assert_eq!(parsed.name, "Uploaded");
    assert_eq!(parsed.points.len(), 10);
    store.add_uploaded_track(&parsed.name, parsed.points);

    // Pick start at index 2 and end at index 7 on the same track
    store.start_segment_picking();
    store.handle_map_click(0.0, 0.002);
    let outcome = store.handle_map_click(0.0, 0.007);
    let PickOutcome::Committed(id) = outcome else {
        panic!("expected a committed slice, got {outcome:?}");
    };

    match store.segment(id).unwrap() {
        Segment::GpxSlice(s) => {
            assert_eq!(s.start_idx, 2);
            assert_eq!(s.end_idx, 7);
            assert_eq!(s.points.len(), 6);
        }
        _ => panic!("expected a gpx slice"),
    }

    assert!(store.is_download_ready());
    let gpx = export_gpx(&store.working_track().name, &store.working_track().segments);
    assert_eq!(gpx.matches("<trkpt").count(), 6);
    assert!(gpx.contains("<name>My Track</name>"));
    assert!(gpx.contains("lon=\"0.0020000\""));

    // Full session reset
    store.clear_all();
    assert!(store.uploaded_tracks().is_empty());
    assert!(store.working_track().segments.is_empty());
    assert!(!store.is_download_ready());
}

#[test]
fn free_end_pick_routes_and_appends() {
    let gateway = StraightLineGateway;
    let mut store = TrackStore::new();
    let parsed = parse_gpx(&sample_gpx(10)).unwrap();
    store.add_uploaded_track(&parsed.name, parsed.points);

    store.start_segment_picking();
    store.handle_map_click(0.0, 0.000);
    store.handle_map_click(0.0, 0.005);

    store.start_free_end_picking();
    let PickOutcome::RouteRequest(request) = store.handle_map_click(0.0, 0.02) else {
        panic!("expected a route request");
    };
    assert_eq!(request.placement, SegmentPlacement::Append);

    let points = gateway
        .route(&[request.from.clone(), request.to.clone()], request.profile)
        .unwrap();
    store.complete_free_route(&request, points).unwrap();

    assert_eq!(store.working_track().segments.len(), 2);
    // The routed link starts exactly where the slice ends, so no gap
    assert!(store.is_download_ready());
}

#[test]
fn gap_is_detected_and_filled_by_routing() {
    let gateway = StraightLineGateway;
    let mut store = TrackStore::new();
    let parsed = parse_gpx(&sample_gpx(10)).unwrap();
    store.add_uploaded_track(&parsed.name, parsed.points);

    // Two disjoint slices of the same track: [0..2] and [7..9], ~500m apart
    store.start_segment_picking();
    store.handle_map_click(0.0, 0.000);
    store.handle_map_click(0.0, 0.002);
    store.start_segment_picking();
    store.handle_map_click(0.0, 0.007);
    store.handle_map_click(0.0, 0.009);

    assert_eq!(store.gap_indices(), vec![0]);
    assert!(!store.is_download_ready());

    let (from, to) = store.gap_route_waypoints(0).unwrap();
    let points = gateway.route(&[from, to], store.routing_profile()).unwrap();
    store.fill_gap(0, points).unwrap();

    assert!(store.gap_indices().is_empty());
    assert!(store.is_download_ready());
    assert_eq!(store.working_track().segments.len(), 3);
}

#[test]
fn routing_failure_preserves_segment_state() {
    let gateway = DownGateway;
    let mut store = TrackStore::new();
    let parsed = parse_gpx(&sample_gpx(10)).unwrap();
    store.add_uploaded_track(&parsed.name, parsed.points);

    store.start_segment_picking();
    store.handle_map_click(0.0, 0.002);
    let PickOutcome::Committed(id) = store.handle_map_click(0.0, 0.007) else {
        panic!("expected a committed slice");
    };

    // Convert to routed; the old slice geometry stays until a route lands
    store.convert_segment_to_routed(id, 0.01, 0.0045).unwrap();
    let ticket = store.begin_reroute(id).unwrap();

    let waypoints: Vec<GeoPoint> = match store.segment(id).unwrap() {
        Segment::Routed(s) => s.waypoints.clone(),
        _ => panic!("expected a routed segment"),
    };
    let err = gateway.route(&waypoints, store.routing_profile()).unwrap_err();
    assert!(matches!(err, RoutingError::Gateway(_)));

    // No commit happened: last-known-good geometry survives, segment stays
    // routed, and the ticket can still be used by a retry
    match store.segment(id).unwrap() {
        Segment::Routed(s) => {
            assert!(s.converted);
            assert_eq!(s.points.len(), 6);
            assert_eq!(s.waypoints.len(), 3);
        }
        _ => panic!("expected a routed segment"),
    }

    // Retry against a healthy gateway succeeds with the same ticket
    let healthy = StraightLineGateway;
    let points = healthy.route(&waypoints, store.routing_profile()).unwrap();
    store.commit_reroute(ticket, waypoints, points).unwrap();
    match store.segment(id).unwrap() {
        Segment::Routed(s) => assert_eq!(s.points.len(), 3),
        _ => panic!("expected a routed segment"),
    }
}

#[test]
fn superseded_reroute_response_is_discarded() {
    let mut store = TrackStore::new();
    let parsed = parse_gpx(&sample_gpx(10)).unwrap();
    store.add_uploaded_track(&parsed.name, parsed.points);

    store.start_segment_picking();
    store.handle_map_click(0.0, 0.000);
    let PickOutcome::Committed(id) = store.handle_map_click(0.0, 0.009) else {
        panic!("expected a committed slice");
    };
    store.convert_segment_to_routed(id, 0.02, 0.005).unwrap();

    // Two drags in quick succession: both in flight, the first resolves last
    let first = store.begin_reroute(id).unwrap();
    let second = store.begin_reroute(id).unwrap();

    let newer = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.03, 0.005), GeoPoint::new(0.0, 0.009)];
    store
        .commit_reroute(second, newer.clone(), newer.clone())
        .unwrap();

    let older = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.01, 0.005), GeoPoint::new(0.0, 0.009)];
    assert_eq!(
        store.commit_reroute(first, older.clone(), older),
        Err(StoreError::StaleRouteResponse(id))
    );

    match store.segment(id).unwrap() {
        Segment::Routed(s) => assert_eq!(s.waypoints, newer),
        _ => panic!("expected a routed segment"),
    }
}

#[test]
fn per_file_parse_failures_do_not_abort_other_files() {
    let mut store = TrackStore::new();
    let files = [sample_gpx(5), "<gpx><trk></gpx>".to_string(), sample_gpx(3)];

    let mut failures = 0;
    for file in &files {
        match parse_gpx(file) {
            Ok(parsed) => {
                store.add_uploaded_track(&parsed.name, parsed.points);
            }
            Err(_) => failures += 1,
        }
    }

    assert_eq!(failures, 1);
    assert_eq!(store.uploaded_tracks().len(), 2);
}
