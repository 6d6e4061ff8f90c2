//! GPX ingestion and export.
//!
//! Ingestion parses a GPX XML string into a track name and point list,
//! dropping any point with non-numeric coordinates; a parse failure is
//! reported per file and never aborts other files. Export concatenates the
//! working track's segments into a single-track GPX 1.1 document with
//! 7-decimal coordinates and 1-decimal elevation; segment boundaries are
//! not marked (gaps become direct jumps).

use crate::{GeoPoint, Segment};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as _;
use thiserror::Error;

/// GPX parse failures.
#[derive(Debug, Error)]
pub enum GpxError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Result of parsing an uploaded GPX file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrack {
    pub name: String,
    pub points: Vec<GeoPoint>,
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a GPX XML string into a track name and point list.
///
/// The name comes from the first `<name>` inside `<trk>`, falling back to
/// the first `<name>` anywhere, then to `"Unnamed Track"`. Track points
/// with unparseable coordinates are dropped; `<ele>` and `<time>` children
/// are carried through when present.
///
/// # Example
///
/// ```rust
/// use track_composer::parse_gpx;
///
/// let xml = r#"<gpx><trk><name>Ride</name><trkseg>
///   <trkpt lat="51.5074" lon="-0.1278"><ele>12.0</ele></trkpt>
///   <trkpt lat="51.5080" lon="-0.1290"/>
/// </trkseg></trk></gpx>"#;
///
/// let track = parse_gpx(xml).unwrap();
/// assert_eq!(track.name, "Ride");
/// assert_eq!(track.points.len(), 2);
/// assert_eq!(track.points[0].ele, Some(12.0));
/// ```
pub fn parse_gpx(xml: &str) -> Result<ParsedTrack, GpxError> {
    let mut reader = Reader::from_str(xml);
    let mut points: Vec<GeoPoint> = Vec::new();
    let mut trk_name: Option<String> = None;
    let mut doc_name: Option<String> = None;
    let mut in_trk = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"trk" => in_trk = true,
                b"trkpt" => {
                    if let Some(point) = parse_trkpt(&e, &mut reader)? {
                        points.push(point);
                    }
                }
                b"name" => {
                    let text = reader.read_text(e.name())?.trim().to_string();
                    if in_trk {
                        trk_name.get_or_insert(text);
                    } else {
                        doc_name.get_or_insert(text);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some((lat, lng)) = parse_lat_lng(&e) {
                        points.push(GeoPoint::new(lat, lng));
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"trk" {
                    in_trk = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let name = trk_name
        .or(doc_name)
        .unwrap_or_else(|| "Unnamed Track".to_string());
    Ok(ParsedTrack { name, points })
}

/// Extract lat/lon attributes. `None` drops the point (non-numeric or
/// missing coordinates).
fn parse_lat_lng(e: &BytesStart<'_>) -> Option<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lng: Option<f64> = None;

    for attr in e.attributes().flatten() {
        let value = std::str::from_utf8(&attr.value).ok()?;
        match attr.key.local_name().as_ref() {
            b"lat" => lat = value.parse::<f64>().ok(),
            b"lon" => lng = value.parse::<f64>().ok(),
            _ => {}
        }
    }
    match (lat, lng) {
        (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
        _ => None,
    }
}

/// Parse a `<trkpt>` with children, consuming the reader up to its end tag.
fn parse_trkpt(
    start: &BytesStart<'_>,
    reader: &mut Reader<&[u8]>,
) -> Result<Option<GeoPoint>, GpxError> {
    let coords = parse_lat_lng(start);
    let mut ele: Option<f64> = None;
    let mut time: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ele" => {
                    ele = reader.read_text(e.name())?.trim().parse::<f64>().ok();
                }
                b"time" => {
                    time = Some(reader.read_text(e.name())?.trim().to_string());
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"trkpt" => break,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(coords.map(|(lat, lng)| GeoPoint { lat, lng, ele, time }))
}

// =============================================================================
// Export
// =============================================================================

/// Serialize the working track's segments into a single-track GPX string.
///
/// Every segment's points are concatenated in working-track order into one
/// `<trkseg>`; coordinates get 7 decimals, elevation 1 decimal when present.
pub fn export_gpx(track_name: &str, segments: &[Segment]) -> String {
    let mut trkpts = String::new();
    let mut first = true;
    for segment in segments {
        for p in segment.points() {
            if !first {
                trkpts.push('\n');
            }
            first = false;
            let _ = write!(trkpts, "      <trkpt lat=\"{:.7}\" lon=\"{:.7}\">", p.lat, p.lng);
            if let Some(ele) = p.ele {
                let _ = write!(trkpts, "\n        <ele>{ele:.1}</ele>");
            }
            trkpts.push_str("\n      </trkpt>");
        }
    }

    let name = escape_xml(track_name);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Track Editor"
  xmlns="http://www.topografix.com/GPX/1/1"
  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">
  <metadata>
    <name>{name}</name>
  </metadata>
  <trk>
    <name>{name}</name>
    <trkseg>
{trkpts}
    </trkseg>
  </trk>
</gpx>"#
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoutedSegment, SegmentId};

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <metadata><name>File name</name></metadata>
  <trk>
    <name>Trail run</name>
    <trkseg>
      <trkpt lat="51.5074" lon="-0.1278">
        <ele>11.5</ele>
        <time>2024-05-01T08:00:00Z</time>
      </trkpt>
      <trkpt lat="51.5080" lon="-0.1290"/>
      <trkpt lat="oops" lon="-0.1300"/>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_parse_prefers_trk_name() {
        let track = parse_gpx(SAMPLE).unwrap();
        assert_eq!(track.name, "Trail run");
    }

    #[test]
    fn test_parse_points_and_children() {
        let track = parse_gpx(SAMPLE).unwrap();
        // The non-numeric point is dropped
        assert_eq!(track.points.len(), 2);
        assert_eq!(track.points[0].lat, 51.5074);
        assert_eq!(track.points[0].ele, Some(11.5));
        assert_eq!(track.points[0].time.as_deref(), Some("2024-05-01T08:00:00Z"));
        assert_eq!(track.points[1].ele, None);
    }

    #[test]
    fn test_parse_falls_back_to_document_name() {
        let xml = r#"<gpx><name>Doc name</name><trk><trkseg>
            <trkpt lat="0.0" lon="0.0"/><trkpt lat="0.0" lon="0.1"/>
        </trkseg></trk></gpx>"#;
        assert_eq!(parse_gpx(xml).unwrap().name, "Doc name");

        let unnamed = r#"<gpx><trk><trkseg><trkpt lat="0.0" lon="0.0"/></trkseg></trk></gpx>"#;
        assert_eq!(parse_gpx(unnamed).unwrap().name, "Unnamed Track");
    }

    #[test]
    fn test_parse_malformed_xml_errors() {
        assert!(parse_gpx("<gpx><trk></gpx>").is_err());
    }

    #[test]
    fn test_export_format() {
        let segments = vec![Segment::Routed(RoutedSegment {
            id: SegmentId(1),
            waypoints: vec![GeoPoint::new(51.5074, -0.1278), GeoPoint::new(51.508, -0.129)],
            points: vec![
                GeoPoint::with_ele(51.5074, -0.1278, 11.52),
                GeoPoint::new(51.508, -0.129),
            ],
            converted: false,
        })];

        let gpx = export_gpx("My Track", &segments);
        assert!(gpx.contains("<trkpt lat=\"51.5074000\" lon=\"-0.1278000\">"));
        assert!(gpx.contains("<ele>11.5</ele>"));
        assert!(gpx.contains("<trkpt lat=\"51.5080000\" lon=\"-0.1290000\">"));
        assert!(gpx.contains("<name>My Track</name>"));
        // The exported document parses back cleanly
        let back = parse_gpx(&gpx).unwrap();
        assert_eq!(back.name, "My Track");
        assert_eq!(back.points.len(), 2);
    }

    #[test]
    fn test_export_escapes_name() {
        let gpx = export_gpx("Fast & <Loose>", &[]);
        assert!(gpx.contains("<name>Fast &amp; &lt;Loose&gt;</name>"));
    }

    #[test]
    fn test_export_concatenates_segments_in_order() {
        let seg = |lngs: [f64; 2]| {
            Segment::Routed(RoutedSegment {
                id: SegmentId(0),
                waypoints: vec![GeoPoint::new(0.0, lngs[0]), GeoPoint::new(0.0, lngs[1])],
                points: vec![GeoPoint::new(0.0, lngs[0]), GeoPoint::new(0.0, lngs[1])],
                converted: false,
            })
        };
        let gpx = export_gpx("t", &[seg([0.0, 0.1]), seg([0.5, 0.6])]);
        let parsed = parse_gpx(&gpx).unwrap();
        let lngs: Vec<f64> = parsed.points.iter().map(|p| p.lng).collect();
        assert_eq!(lngs, vec![0.0, 0.1, 0.5, 0.6]);
    }
}
