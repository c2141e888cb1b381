//! Track exports.
//!
//! Renders a processed track as a KML route line (for Google Earth style
//! viewers) or as GPX waypoints (for GPS tooling). Pings without valid
//! coordinates are left out of both. Documents are produced as a stream of
//! `quick_xml` events, which takes care of escaping names and attributes.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat};
use log::warn;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;
use crate::Ping;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// RFC 3339 UTC timestamp, `None` outside chrono's range.
fn format_timestamp(ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn start<W: Write>(writer: &mut Writer<W>, element: BytesStart<'_>) -> io::Result<()> {
    writer.write_event(Event::Start(element))
}

fn end<W: Write>(writer: &mut Writer<W>, tag: &str) -> io::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

/// `<tag>text</tag>` on one line.
fn text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    start(writer, BytesStart::new(tag))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    end(writer, tag)
}

fn declaration<W: Write>(writer: &mut Writer<W>) -> io::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
}

/// Render through `write` into a string.
///
/// Writing into a `Vec` cannot fail, so an error here is only logged.
fn render(write: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
    let mut buf = Vec::new();
    if let Err(e) = write(&mut buf) {
        warn!("[TrackEngine] export failed: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// KML 2.2 document with the track as a single `LineString` placemark.
///
/// # Example
///
/// ```rust
/// use track_engine::{Ping, export::export_kml};
///
/// let pings = vec![
///     Ping::new(1, 0, 40.4168, -3.7038),
///     Ping::new(2, 60_000, 40.4180, -3.7000),
/// ];
/// let kml = export_kml(&pings, "Case 12 & co");
/// assert!(kml.contains("<name>Case 12 &amp; co</name>"));
/// assert!(kml.contains("-3.7038,40.4168,0 -3.7,40.418,0"));
/// ```
pub fn export_kml(points: &[Ping], name: &str) -> String {
    render(|buf| write_kml(buf, points, name))
}

/// GPX 1.1 document with one waypoint per ping.
///
/// Waypoints carry the ping id as `<name>`, the timestamp as `<time>` and,
/// when known, the speed (km/h) under `<extensions>`.
pub fn export_gpx(points: &[Ping], name: &str) -> String {
    render(|buf| write_gpx(buf, points, name))
}

/// Stream [`export_kml`] output to `out`.
pub fn write_kml<W: Write>(out: &mut W, points: &[Ping], name: &str) -> Result<()> {
    let coordinates = points
        .iter()
        .filter(|p| p.has_valid_coordinates())
        .map(|p| format!("{},{},0", p.longitude, p.latitude))
        .collect::<Vec<_>>()
        .join(" ");

    let mut writer = Writer::new_with_indent(&mut *out, b' ', 2);
    declaration(&mut writer)?;
    start(&mut writer, BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]))?;
    start(&mut writer, BytesStart::new("Document"))?;
    text_element(&mut writer, "name", name)?;
    start(&mut writer, BytesStart::new("Placemark"))?;
    text_element(&mut writer, "name", name)?;
    start(&mut writer, BytesStart::new("LineString"))?;
    text_element(&mut writer, "tessellate", "1")?;
    text_element(&mut writer, "coordinates", &coordinates)?;
    end(&mut writer, "LineString")?;
    end(&mut writer, "Placemark")?;
    end(&mut writer, "Document")?;
    end(&mut writer, "kml")?;

    out.write_all(b"\n")?;
    Ok(())
}

/// Stream [`export_gpx`] output to `out`.
pub fn write_gpx<W: Write>(out: &mut W, points: &[Ping], name: &str) -> Result<()> {
    let mut writer = Writer::new_with_indent(&mut *out, b' ', 2);
    declaration(&mut writer)?;
    start(
        &mut writer,
        BytesStart::new("gpx").with_attributes([
            ("version", "1.1"),
            ("creator", "track-engine"),
            ("xmlns", GPX_NAMESPACE),
        ]),
    )?;
    start(&mut writer, BytesStart::new("metadata"))?;
    text_element(&mut writer, "name", name)?;
    end(&mut writer, "metadata")?;

    for p in points.iter().filter(|p| p.has_valid_coordinates()) {
        let lat = p.latitude.to_string();
        let lon = p.longitude.to_string();
        start(
            &mut writer,
            BytesStart::new("wpt").with_attributes([("lat", lat.as_str()), ("lon", lon.as_str())]),
        )?;
        if let Some(time) = format_timestamp(p.timestamp) {
            text_element(&mut writer, "time", &time)?;
        }
        text_element(&mut writer, "name", &p.id.to_string())?;
        if let Some(speed) = p.speed.filter(|s| s.is_finite()) {
            start(&mut writer, BytesStart::new("extensions"))?;
            text_element(&mut writer, "speed", &speed.to_string())?;
            end(&mut writer, "extensions")?;
        }
        end(&mut writer, "wpt")?;
    }

    end(&mut writer, "gpx")?;

    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackError;
    use quick_xml::Reader;

    fn track() -> Vec<Ping> {
        vec![
            Ping::new(1, 1_704_067_200_000, 40.5, -3.5).with_speed(12.5),
            Ping::new(2, 1_704_067_260_000, f64::NAN, -3.6),
            Ping::new(3, 1_704_067_320_000, 40.75, -3.25),
        ]
    }

    /// Every text node of a document, unescaped. Fails on malformed XML.
    fn text_nodes(xml: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        let mut texts = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Eof => break,
                Event::Text(t) => {
                    let text = t.unescape().unwrap().trim().to_string();
                    if !text.is_empty() {
                        texts.push(text);
                    }
                }
                _ => {}
            }
        }
        texts
    }

    #[test]
    fn test_kml_skips_invalid() {
        let kml = export_kml(&track(), "Plate 1234ABC");
        assert!(kml.contains("<coordinates>-3.5,40.5,0 -3.25,40.75,0</coordinates>"));
        assert!(kml.contains("<name>Plate 1234ABC</name>"));
        assert!(kml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(kml.trim_end().ends_with("</kml>"));
    }

    #[test]
    fn test_kml_empty_track() {
        let kml = export_kml(&[], "empty");
        assert!(kml.contains("<coordinates></coordinates>"));
    }

    #[test]
    fn test_markup_in_name_stays_text() {
        let name = r#"</name><evil a="1"/> & 'co'"#;
        let kml = export_kml(&track(), name);
        assert!(!kml.contains("<evil"));
        assert_eq!(text_nodes(&kml)[..2], [name.to_string(), name.to_string()]);

        let gpx = export_gpx(&track(), name);
        assert!(!gpx.contains("<evil"));
        assert_eq!(text_nodes(&gpx)[0], name);
    }

    #[test]
    fn test_gpx_waypoints() {
        let gpx = export_gpx(&track(), "case");
        assert_eq!(gpx.matches("<wpt ").count(), 2);
        assert!(gpx.contains("<wpt lat=\"40.5\" lon=\"-3.5\">"));
        assert!(gpx.contains("<time>2024-01-01T00:00:00Z</time>"));
        assert!(gpx.contains("<time>2024-01-01T00:02:00Z</time>"));
        assert!(gpx.contains("<speed>12.5</speed>"));
        // Only the first waypoint has a speed
        assert_eq!(gpx.matches("<extensions>").count(), 1);
    }

    #[test]
    fn test_gpx_reads_back_with_gpx_crate() {
        let mut buf = Vec::new();
        write_gpx(&mut buf, &track(), "Case 12 & co").unwrap();

        let doc = gpx::read(buf.as_slice()).unwrap();
        assert_eq!(doc.version, gpx::GpxVersion::Gpx11);
        assert_eq!(doc.metadata.and_then(|m| m.name).as_deref(), Some("Case 12 & co"));
        assert_eq!(doc.waypoints.len(), 2);
        assert_eq!(doc.waypoints[0].point().y(), 40.5);
        assert_eq!(doc.waypoints[0].point().x(), -3.5);
        assert_eq!(doc.waypoints[0].name.as_deref(), Some("1"));
        assert_eq!(doc.waypoints[1].name.as_deref(), Some("3"));
        assert!(doc.waypoints[1].time.is_some());
    }

    #[test]
    fn test_write_to_buffer() {
        let mut buf = Vec::new();
        write_gpx(&mut buf, &track(), "case").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), export_gpx(&track(), "case"));

        let mut buf = Vec::new();
        write_kml(&mut buf, &track(), "case").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), export_kml(&track(), "case"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_error_propagates() {
        let result = write_kml(&mut BrokenPipe, &track(), "case");
        assert!(matches!(result, Err(TrackError::Io(_))));
        let result = write_gpx(&mut BrokenPipe, &track(), "case");
        assert!(matches!(result, Err(TrackError::Io(_))));
    }
}
