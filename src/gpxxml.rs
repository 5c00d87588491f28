use crate::error::{PassesError, Result};
use crate::{BoundingBox, TrackPoint, Waypoint, track_bounds};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::Builder;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const CREATOR: &str = "westra-passes";

/// Collects the track points (`trkpt`) of a GPX document in document order.
///
/// Waypoints and route points do not belong to the track and are skipped.
pub fn extract_track_points(input: &[u8]) -> Result<Vec<TrackPoint>> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut track_points = Vec::new();
    let mut seen_root = false;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Err(e) => {
                return Err(PassesError::parse(
                    "GPX",
                    format!("error at position {}: {e}", reader.buffer_position()),
                ));
            }
            Ok(Event::Eof) => break,
            Ok(event) => event,
        };

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = e.local_name();
                if !seen_root {
                    if name.as_ref() != b"gpx" {
                        return Err(PassesError::parse(
                            "GPX",
                            format!(
                                "root element is <{}>, expected <gpx>",
                                String::from_utf8_lossy(name.as_ref())
                            ),
                        ));
                    }
                    seen_root = true;
                } else if name.as_ref() == b"trkpt" {
                    track_points.push(parse_point(e)?);
                }
            }
            _ => {}
        }

        buf.clear();
    }

    if !seen_root {
        return Err(PassesError::parse("GPX", "document has no <gpx> element"));
    }

    Ok(track_points)
}

fn parse_point(e: &BytesStart<'_>) -> Result<TrackPoint> {
    let element = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|err| PassesError::parse("GPX", err))?;
        let target = match attr.key.local_name().as_ref() {
            b"lat" => &mut lat,
            b"lon" => &mut lon,
            _ => continue,
        };
        let value = std::str::from_utf8(&attr.value).unwrap_or_default().trim();
        *target = Some(value.parse().map_err(|_| {
            PassesError::parse("GPX", format!("invalid coordinate '{value}' on <{element}>"))
        })?);
    }

    match (lat, lon) {
        (Some(lat), Some(lon))
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
        {
            Ok(TrackPoint { lat, lon })
        }
        (Some(lat), Some(lon)) => Err(PassesError::parse(
            "GPX",
            format!("coordinates {lat},{lon} out of range on <{element}>"),
        )),
        _ => Err(PassesError::parse(
            "GPX",
            format!("<{element}> without lat/lon attributes"),
        )),
    }
}

/// Reads a GPX file and returns the extent of its track points.
pub fn read_track_bounds(path: &Path) -> Result<BoundingBox> {
    let input = std::fs::read(path).map_err(|e| PassesError::file("read", path, e))?;

    let points =
        extract_track_points(&input).map_err(|e| e.located(format!("in {}", path.display())))?;

    track_bounds(&points).ok_or_else(|| PassesError::EmptyTrack {
        path: path.to_path_buf(),
    })
}

/// Serializes waypoints as a GPX 1.1 document.
pub fn write_waypoints<W: Write>(
    waypoints: &[Waypoint],
    created: OffsetDateTime,
    output: W,
) -> io::Result<()> {
    let mut writer = Writer::new_with_indent(output, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut gpx = BytesStart::new("gpx");
    gpx.push_attribute(("version", "1.1"));
    gpx.push_attribute(("creator", CREATOR));
    gpx.push_attribute(("xmlns", GPX_NAMESPACE));
    writer.write_event(Event::Start(gpx))?;

    let stamp = created.format(&Rfc3339).map_err(io::Error::other)?;
    writer.write_event(Event::Start(BytesStart::new("metadata")))?;
    write_text_element(&mut writer, "time", &stamp)?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    for waypoint in waypoints {
        let mut wpt = BytesStart::new("wpt");
        wpt.push_attribute(("lat", waypoint.lat.to_string().as_str()));
        wpt.push_attribute(("lon", waypoint.lon.to_string().as_str()));
        writer.write_event(Event::Start(wpt))?;
        write_text_element(&mut writer, "ele", &waypoint.ele.to_string())?;
        write_text_element(&mut writer, "name", &waypoint.name)?;
        writer.write_event(Event::End(BytesEnd::new("wpt")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("gpx")))?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

/// Writes the waypoints to `path`, replacing any existing file.
///
/// The document goes to a temporary file next to `path` first and is renamed
/// into place once complete, so a failed write leaves nothing behind. A new
/// file gets the usual umask-derived mode; a replaced file keeps its own.
pub fn save_waypoints(path: &Path, waypoints: &[Waypoint]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = Builder::new();
    builder.prefix(".westra-passes").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| PassesError::file("create", path, e))?;

    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| PassesError::file("write", path, e))?;
    }

    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write_waypoints(waypoints, OffsetDateTime::now_utc(), &mut out)
            .and_then(|_| out.flush())
            .map_err(|e| PassesError::file("write", path, e))?;
    }

    tmp.persist(path)
        .map_err(|e| PassesError::file("write", path, e.error))?;
    Ok(())
}
