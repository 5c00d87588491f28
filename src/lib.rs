pub mod catalog;
pub mod error;
pub mod gpxxml;
pub mod kml;

pub use error::{NetworkError, PassesError, Result};

use geo::{Destination, Haversine, Point};

/// Mean earth radius in meters, the sphere `geo::Haversine` measures on.
pub const EARTH_RADIUS: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub ele: f64,
}

/// Geographic extent in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let bbox = BoundingBox {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok = |v: f64| v.is_finite() && (-90.0..=90.0).contains(&v);
        let lon_ok = |v: f64| v.is_finite() && (-180.0..=180.0).contains(&v);

        if !(lat_ok(self.min_lat) && lat_ok(self.max_lat)) {
            return Err(PassesError::InvalidArgument(format!(
                "latitude out of range in {self}"
            )));
        }
        if !(lon_ok(self.min_lon) && lon_ok(self.max_lon)) {
            return Err(PassesError::InvalidArgument(format!(
                "longitude out of range in {self}"
            )));
        }
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(PassesError::InvalidArgument(format!(
                "inverted bounding box {self}"
            )));
        }
        Ok(())
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.min_lat
            && self.max_lat >= other.max_lat
            && self.min_lon <= other.min_lon
            && self.max_lon >= other.max_lon
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[lat {}..{}, lon {}..{}]",
            self.min_lat, self.max_lat, self.min_lon, self.max_lon
        )
    }
}

/// Smallest box covering all points, or `None` for an empty slice.
pub fn track_bounds(points: &[TrackPoint]) -> Option<BoundingBox> {
    let first = points.first()?;
    let init = BoundingBox {
        min_lat: first.lat,
        max_lat: first.lat,
        min_lon: first.lon,
        max_lon: first.lon,
    };

    Some(points[1..].iter().fold(init, |b, p| BoundingBox {
        min_lat: b.min_lat.min(p.lat),
        max_lat: b.max_lat.max(p.lat),
        min_lon: b.min_lon.min(p.lon),
        max_lon: b.max_lon.max(p.lon),
    }))
}

/// Solves the direct geodesic problem on the haversine sphere: the point
/// reached from `(lat, lon)` after travelling `distance_m` along the initial
/// `bearing_deg`.
///
/// Returned longitude is normalized to -180..180.
pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let target = Haversine.destination(Point::new(lon, lat), bearing_deg, distance_m);
    let lon2 = (target.x() + 540.0).rem_euclid(360.0) - 180.0;
    (target.y(), lon2)
}

/// Moves every side of `bbox` outward by `offset_km`.
///
/// The minimum corner goes south then west, the maximum corner north then east,
/// each step starting from where the previous one ended. Latitudes stop at the
/// poles and longitudes at the antimeridian.
pub fn expand_bounds(bbox: &BoundingBox, offset_km: f64) -> Result<BoundingBox> {
    if !offset_km.is_finite() || offset_km < 0.0 {
        return Err(PassesError::InvalidArgument(format!(
            "offset must be a non-negative number of kilometers, got {offset_km}"
        )));
    }
    bbox.validate()?;

    if offset_km == 0.0 {
        return Ok(*bbox);
    }

    let distance_m = offset_km * 1000.0;
    let pole_reach = (distance_m / EARTH_RADIUS).to_degrees();

    let (min_lat, min_lon) = if bbox.min_lat - pole_reach <= -90.0 {
        (-90.0, -180.0)
    } else {
        let (lat, lon) = destination(bbox.min_lat, bbox.min_lon, 180.0, distance_m);
        let (lat, west) = destination(lat, lon, 270.0, distance_m);
        (lat, if west > lon { -180.0 } else { west })
    };

    let (max_lat, max_lon) = if bbox.max_lat + pole_reach >= 90.0 {
        (90.0, 180.0)
    } else {
        let (lat, lon) = destination(bbox.max_lat, bbox.max_lon, 0.0, distance_m);
        let (lat, east) = destination(lat, lon, 90.0, distance_m);
        (lat, if east < lon { 180.0 } else { east })
    };

    // a box reaching a pole spans every longitude
    let polar = min_lat == -90.0 || max_lat == 90.0;
    let expanded = BoundingBox {
        min_lat: min_lat.min(bbox.min_lat),
        max_lat: max_lat.max(bbox.max_lat),
        min_lon: if polar { -180.0 } else { min_lon },
        max_lon: if polar { 180.0 } else { max_lon },
    };
    expanded.validate()?;
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Distance;

    fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
    }

    fn moscow_box() -> BoundingBox {
        BoundingBox::new(55.70, 55.75, 37.50, 37.60).unwrap()
    }

    #[test]
    fn test_bounding_box_rejects_inverted_extent() {
        assert!(BoundingBox::new(10.0, 5.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 1.0, 20.0, -20.0).is_err());
        assert!(BoundingBox::new(-91.0, 0.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 1.0, 0.0, f64::NAN).is_err());
        assert!(BoundingBox::new(1.0, 1.0, 2.0, 2.0).is_ok());
    }

    #[test]
    fn test_track_bounds() {
        let points = vec![
            TrackPoint { lat: 55.72, lon: 37.55 },
            TrackPoint { lat: 55.70, lon: 37.60 },
            TrackPoint { lat: 55.75, lon: 37.50 },
        ];
        let bbox = track_bounds(&points).unwrap();
        assert_eq!(bbox, moscow_box());

        assert!(track_bounds(&[]).is_none());
    }

    #[test]
    fn test_destination_one_degree_of_meridian() {
        // One degree of latitude is about 111.2 km on the mean-radius sphere
        let meters = EARTH_RADIUS * 1f64.to_radians();
        let (lat, lon) = destination(45.0, 7.0, 0.0, meters);
        assert!((lat - 46.0).abs() < 1e-9, "got {}", lat);
        assert!((lon - 7.0).abs() < 1e-9, "got {}", lon);
        assert!((meters - 111_195.0).abs() < 1.0);
    }

    #[test]
    fn test_destination_follows_bearing() {
        let (lat, lon) = destination(45.0, 7.0, 0.0, 10_000.0);
        assert!(lat > 45.0);
        assert!((lon - 7.0).abs() < 1e-9);

        let (lat, lon) = destination(45.0, 7.0, 90.0, 10_000.0);
        assert!(lon > 7.0);
        assert!((lat - 45.0).abs() < 0.01);

        let (lat, _) = destination(45.0, 7.0, 180.0, 10_000.0);
        assert!(lat < 45.0);

        let (_, lon) = destination(45.0, 7.0, 270.0, 10_000.0);
        assert!(lon < 7.0);
    }

    #[test]
    fn test_destination_distance_matches_haversine() {
        let (lat, lon) = destination(43.3, 42.4, 270.0, 5_000.0);
        let distance = haversine_distance(43.3, 42.4, lat, lon);
        assert!(
            (distance - 5_000.0).abs() < 0.01,
            "Expected 5000 m, got {}",
            distance
        );
    }

    #[test]
    fn test_destination_wraps_longitude() {
        let (_, lon) = destination(0.0, 179.99, 90.0, 10_000.0);
        assert!(lon < -179.0, "Expected wrap past antimeridian, got {}", lon);
    }

    #[test]
    fn test_expand_bounds_zero_offset_is_identity() {
        let bbox = moscow_box();
        let expanded = expand_bounds(&bbox, 0.0).unwrap();
        assert!((expanded.min_lat - bbox.min_lat).abs() < 1e-6);
        assert!((expanded.max_lat - bbox.max_lat).abs() < 1e-6);
        assert!((expanded.min_lon - bbox.min_lon).abs() < 1e-6);
        assert!((expanded.max_lon - bbox.max_lon).abs() < 1e-6);
    }

    #[test]
    fn test_expand_bounds_strictly_contains_original() {
        for bbox in [
            moscow_box(),
            BoundingBox::new(-34.1, -33.8, 18.3, 18.6).unwrap(),
            BoundingBox::new(0.0, 0.0, 0.0, 0.0).unwrap(),
            BoundingBox::new(68.0, 69.5, -150.0, -148.0).unwrap(),
        ] {
            let expanded = expand_bounds(&bbox, 5.0).unwrap();
            assert!(expanded.contains(&bbox));
            assert!(expanded.min_lat < bbox.min_lat);
            assert!(expanded.max_lat > bbox.max_lat);
            assert!(expanded.min_lon < bbox.min_lon);
            assert!(expanded.max_lon > bbox.max_lon);
        }
    }

    #[test]
    fn test_expand_bounds_offset_distance() {
        let bbox = moscow_box();
        let expanded = expand_bounds(&bbox, 5.0).unwrap();

        let north = haversine_distance(bbox.max_lat, bbox.max_lon, expanded.max_lat, bbox.max_lon);
        assert!((north - 5_000.0).abs() < 5.0, "got {}", north);

        // Longitude degrees shrink with latitude, so the westward shift in
        // degrees is larger than the northward one
        let lat_shift = expanded.max_lat - bbox.max_lat;
        let lon_shift = bbox.min_lon - expanded.min_lon;
        assert!(lon_shift > lat_shift * 1.5);
    }

    #[test]
    fn test_expand_bounds_is_wider_near_poles() {
        let equator = BoundingBox::new(0.0, 0.1, 10.0, 10.1).unwrap();
        let arctic = BoundingBox::new(70.0, 70.1, 10.0, 10.1).unwrap();

        let e = expand_bounds(&equator, 10.0).unwrap();
        let a = expand_bounds(&arctic, 10.0).unwrap();

        assert!(a.max_lon - arctic.max_lon > (e.max_lon - equator.max_lon) * 2.5);
    }

    #[test]
    fn test_expand_bounds_clamps_at_pole_and_antimeridian() {
        let bbox = BoundingBox::new(89.99, 89.995, 179.99, 179.995).unwrap();
        let expanded = expand_bounds(&bbox, 50.0).unwrap();
        assert_eq!(expanded.max_lat, 90.0);
        assert_eq!(expanded.max_lon, 180.0);
        assert!(expanded.contains(&bbox));
    }

    #[test]
    fn test_expand_bounds_moves_south_then_west_and_north_then_east() {
        let bbox = moscow_box();
        let d = 5_000.0;
        let expanded = expand_bounds(&bbox, 5.0).unwrap();

        let (lat, lon) = destination(bbox.min_lat, bbox.min_lon, 180.0, d);
        let (min_lat, min_lon) = destination(lat, lon, 270.0, d);
        assert_eq!((expanded.min_lat, expanded.min_lon), (min_lat, min_lon));

        let (lat, lon) = destination(bbox.max_lat, bbox.max_lon, 0.0, d);
        let (max_lat, max_lon) = destination(lat, lon, 90.0, d);
        assert_eq!((expanded.max_lat, expanded.max_lon), (max_lat, max_lon));

        // Going west first lands on a different longitude
        let (lat, lon) = destination(bbox.min_lat, bbox.min_lon, 270.0, d);
        let (_, swapped_lon) = destination(lat, lon, 180.0, d);
        assert!((swapped_lon - expanded.min_lon).abs() > 1e-5);
    }

    #[test]
    fn test_expand_bounds_rejects_negative_offset() {
        let err = expand_bounds(&moscow_box(), -1.0).unwrap_err();
        assert!(matches!(err, PassesError::InvalidArgument(_)));

        assert!(expand_bounds(&moscow_box(), f64::INFINITY).is_err());
    }
}
