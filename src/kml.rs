use crate::Waypoint;
use crate::error::{PassesError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesRef, BytesStart, Event};
use regex::Regex;
use std::sync::LazyLock;

/// Header text of the elevation row in the catalog's description tables.
pub const DEFAULT_HEIGHT_LABEL: &str = "Высота";

static HEADER_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<th\b[^>]*>").unwrap());
static DATA_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<td\b[^>]*>").unwrap());
// HTML lets cells and rows end implicitly at the next cell, row or table tag
static CELL_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</t[hd]\s*>|<t[hd]\b|</?tr\b|</?table\b").unwrap());
static ROW_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?tr\b|</?table\b").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub folders: Vec<Folder>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Folder {
    pub name: String,
    pub placemarks: Vec<Placemark>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    pub name: String,
    /// HTML markup describing the pass.
    pub description: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub height_label: String,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        TranslateOptions {
            height_label: DEFAULT_HEIGHT_LABEL.to_string(),
        }
    }
}

#[derive(Default)]
struct PlacemarkBuilder {
    name: Option<String>,
    description: String,
    look_at_lat: Option<f64>,
    look_at_lon: Option<f64>,
    point: Option<(f64, f64)>,
}

impl PlacemarkBuilder {
    fn build(self, folder: &str) -> Result<Placemark> {
        let name = self.name.ok_or_else(|| {
            PassesError::parse("catalog", format!("placemark without name in folder '{folder}'"))
        })?;

        let (lat, lon) = match (self.look_at_lat, self.look_at_lon, self.point) {
            (Some(lat), Some(lon), _) => (lat, lon),
            (_, _, Some(point)) => point,
            _ => {
                return Err(PassesError::parse(
                    "catalog",
                    format!("placemark '{name}' has no LookAt or Point coordinates"),
                ));
            }
        };

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(PassesError::parse(
                "catalog",
                format!("placemark '{name}' has coordinates {lat},{lon} out of range"),
            ));
        }

        Ok(Placemark {
            name,
            description: self.description,
            lat,
            lon,
        })
    }
}

/// Tracks the open elements of a catalog document and builds its folder tree.
#[derive(Default)]
struct CatalogBuilder {
    path: Vec<String>,
    text: String,
    seen_document: bool,
    folders: Vec<Folder>,
    placemark: Option<PlacemarkBuilder>,
}

impl CatalogBuilder {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        if self.path.is_empty() && name != "kml" {
            return Err(PassesError::parse(
                "catalog",
                format!("root element is <{name}>, expected <kml>"),
            ));
        }

        self.path.push(name);
        self.text.clear();

        match relative(&self.path).as_slice() {
            ["Document"] => self.seen_document = true,
            ["Document", "Folder"] => self.folders.push(Folder::default()),
            ["Document", "Folder", "Placemark"] => {
                self.placemark = Some(PlacemarkBuilder::default());
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let text = std::mem::take(&mut self.text);

        match relative(&self.path).as_slice() {
            ["Document", "Folder", "name"] => {
                if let Some(folder) = self.folders.last_mut() {
                    folder.name = text.trim().to_string();
                }
            }
            ["Document", "Folder", "Placemark"] => {
                if let (Some(builder), Some(folder)) =
                    (self.placemark.take(), self.folders.last_mut())
                {
                    let placemark = builder.build(&folder.name)?;
                    folder.placemarks.push(placemark);
                }
            }
            ["Document", "Folder", "Placemark", field @ ..] => {
                if let Some(pm) = self.placemark.as_mut() {
                    match field {
                        ["name"] => pm.name = Some(text.trim().to_string()),
                        ["description"] => pm.description = text,
                        ["LookAt", "latitude"] => pm.look_at_lat = Some(parse_degrees(&text)?),
                        ["LookAt", "longitude"] => pm.look_at_lon = Some(parse_degrees(&text)?),
                        ["Point", "coordinates"] => pm.point = Some(parse_coordinates(&text)?),
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        self.path.pop();
        Ok(())
    }

    fn push_reference(&mut self, e: &BytesRef<'_>) -> Result<()> {
        if let Ok(Some(ch)) = e.resolve_char_ref() {
            self.text.push(ch);
            return Ok(());
        }
        let ch = match std::str::from_utf8(e.as_ref()).unwrap_or_default() {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            other => {
                return Err(PassesError::parse(
                    "catalog",
                    format!("undefined entity '&{other};'"),
                ));
            }
        };
        self.text.push(ch);
        Ok(())
    }

    fn finish(self) -> Result<Catalog> {
        if !self.seen_document {
            return Err(PassesError::parse("catalog", "document has no <Document> element"));
        }
        Ok(Catalog {
            folders: self.folders,
        })
    }
}

/// Element names below the `kml` root.
fn relative(path: &[String]) -> Vec<&str> {
    path.iter().skip(1).map(String::as_str).collect()
}

fn parse_degrees(text: &str) -> Result<f64> {
    let text = text.trim();
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PassesError::parse("catalog", format!("invalid coordinate '{text}'")))
}

/// Parses a KML `lon,lat[,alt]` tuple into `(lat, lon)`.
fn parse_coordinates(text: &str) -> Result<(f64, f64)> {
    let mut parts = text.trim().split(',');
    match (parts.next(), parts.next()) {
        (Some(lon), Some(lat)) => Ok((parse_degrees(lat)?, parse_degrees(lon)?)),
        _ => Err(PassesError::parse(
            "catalog",
            format!("invalid coordinates '{}'", text.trim()),
        )),
    }
}

/// Parses the catalog response into its Document → Folder → Placemark tree.
pub fn parse_catalog(xml: &str) -> Result<Catalog> {
    let mut reader = Reader::from_str(xml);
    let mut builder = CatalogBuilder::default();

    loop {
        match reader.read_event() {
            Err(e) => {
                return Err(PassesError::parse(
                    "catalog",
                    format!("error at position {}: {e}", reader.buffer_position()),
                ));
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => builder.open(&e)?,
            Ok(Event::Empty(e)) => {
                builder.open(&e)?;
                builder.close()?;
            }
            Ok(Event::End(_)) => builder.close()?,
            Ok(Event::Text(e)) => {
                builder
                    .text
                    .push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                builder
                    .text
                    .push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::GeneralRef(e)) => builder.push_reference(&e)?,
            _ => {}
        }
    }

    builder.finish()
}

/// Markup of the cell whose content starts at `html`.
fn cell_content(html: &str) -> &str {
    match CELL_END.find(html) {
        Some(end) => &html[..end.start()],
        None => html,
    }
}

fn cell_text(html: &str) -> String {
    TAG.replace_all(html, "")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

/// Finds the table row whose header contains `label` and returns the text of
/// its first data cell together with the elevation it holds.
///
/// Decimal values are truncated toward zero.
pub fn extract_elevation(description: &str, label: &str) -> std::result::Result<(String, f64), String> {
    for header in HEADER_OPEN.find_iter(description) {
        let content = cell_content(&description[header.end()..]);
        if !cell_text(content).contains(label) {
            continue;
        }

        let rest = &description[header.end() + content.len()..];
        let row = match ROW_BOUNDARY.find(rest) {
            Some(boundary) => &rest[..boundary.start()],
            None => rest,
        };

        let Some(data) = DATA_OPEN.find(row) else {
            return Err(format!("row '{label}' has no data cell"));
        };

        let raw = cell_text(cell_content(&row[data.end()..]));
        let value = match raw.parse::<i64>() {
            Ok(v) => v as f64,
            Err(_) => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => v.trunc(),
                _ => return Err(format!("'{raw}' is not a number")),
            },
        };
        return Ok((raw, value));
    }

    Err(format!("no '{label}' row in description"))
}

/// Builds one waypoint per placemark, folders and placemarks in document order.
///
/// Placemarks whose elevation cannot be read are logged and skipped.
pub fn translate(catalog: Option<&Catalog>, opts: &TranslateOptions) -> Vec<Waypoint> {
    let Some(catalog) = catalog else {
        return Vec::new();
    };

    let mut waypoints = Vec::new();
    for folder in &catalog.folders {
        for placemark in &folder.placemarks {
            match placemark_waypoint(placemark, folder, opts) {
                Ok(waypoint) => {
                    log::debug!(
                        "pass '{}' at {},{} ({} m)",
                        waypoint.name,
                        waypoint.lat,
                        waypoint.lon,
                        waypoint.ele
                    );
                    waypoints.push(waypoint);
                }
                Err(e) => log::warn!("skipping: {e}"),
            }
        }
    }
    waypoints
}

fn placemark_waypoint(
    placemark: &Placemark,
    folder: &Folder,
    opts: &TranslateOptions,
) -> Result<Waypoint> {
    let (raw, ele) = extract_elevation(&placemark.description, &opts.height_label).map_err(
        |reason| PassesError::ElevationParse {
            placemark: placemark.name.clone(),
            reason,
        },
    )?;

    Ok(Waypoint {
        name: format!("{} {} {}", placemark.name, folder.name, raw),
        lat: placemark.lat,
        lon: placemark.lon,
        ele,
    })
}
