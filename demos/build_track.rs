//! Assemble a working track from a GPX upload, fill the gap with a routed
//! link, and print the exported GPX.
//!
//! Run with: cargo run --example build_track

use track_composer::{
    export_gpx, parse_gpx, GeoPoint, PickOutcome, RoutingError, RoutingGateway, RoutingProfile,
    TrackStore,
};

/// Stand-in gateway that routes every request as a straight line. Swap in
/// `OrsClient` (feature `http`) for real road-network routing.
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

const UPLOAD: &str = r#"<gpx version="1.1"><trk><name>Thames loop</name><trkseg>
  <trkpt lat="51.5074000" lon="-0.1278000"><ele>11.0</ele></trkpt>
  <trkpt lat="51.5084000" lon="-0.1268000"><ele>12.0</ele></trkpt>
  <trkpt lat="51.5094000" lon="-0.1258000"><ele>12.5</ele></trkpt>
  <trkpt lat="51.5104000" lon="-0.1248000"><ele>13.0</ele></trkpt>
  <trkpt lat="51.5114000" lon="-0.1238000"><ele>14.0</ele></trkpt>
  <trkpt lat="51.5124000" lon="-0.1228000"><ele>15.0</ele></trkpt>
  <trkpt lat="51.5134000" lon="-0.1218000"><ele>15.5</ele></trkpt>
  <trkpt lat="51.5144000" lon="-0.1208000"><ele>16.0</ele></trkpt>
</trkseg></trk></gpx>"#;

fn main() {
    let gateway = StraightLineGateway;
    let mut store = TrackStore::new();

    let parsed = parse_gpx(UPLOAD).expect("demo GPX parses");
    println!("Uploaded '{}' with {} points", parsed.name, parsed.points.len());
    store.add_uploaded_track(&parsed.name, parsed.points);

    // Two disjoint slices of the upload
    store.start_segment_picking();
    store.handle_map_click(51.5074, -0.1278);
    store.handle_map_click(51.5094, -0.1258);

    store.start_segment_picking();
    store.handle_map_click(51.5124, -0.1228);
    match store.handle_map_click(51.5144, -0.1208) {
        PickOutcome::Committed(id) => println!("Committed second slice as {id}"),
        other => println!("Second pick did not commit: {other:?}"),
    }

    // The two slices do not touch, so the track is not exportable yet
    let gaps = store.gap_indices();
    println!("Gaps after segment indices: {gaps:?}");

    for index in gaps.into_iter().rev() {
        let (from, to) = store.gap_route_waypoints(index).expect("gap exists");
        let points = gateway
            .route(&[from, to], store.routing_profile())
            .expect("straight-line routing cannot fail");
        store.fill_gap(index, points).expect("gap still present");
    }

    println!(
        "Working track: {} segments, {:.2} km, ready = {}",
        store.working_track().segments.len(),
        store.total_length_km(),
        store.is_download_ready()
    );

    store.set_working_track_name("Thames loop (edited)");
    let gpx = export_gpx(&store.working_track().name, &store.working_track().segments);
    println!("\n{gpx}");
}
