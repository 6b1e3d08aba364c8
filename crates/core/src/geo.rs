use serde::Serialize;

use crate::error::{Error, Result};

/// Length of one degree of latitude, in meters.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Mean Earth radius used for great-circle distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Axis-aligned latitude/longitude rectangle used as a spatial pre-filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Equirectangular box covering `radius_m` around a center point.
    /// Cheap and slightly generous away from the equator; callers needing an
    /// exact radius filter the hits with [`distance_m`].
    pub fn around(lat: f64, lng: f64, radius_m: f64) -> Self {
        let lat_delta = radius_m / METERS_PER_DEGREE;
        let lng_delta = radius_m / (METERS_PER_DEGREE * lat.to_radians().cos());
        Self::new(lat - lat_delta, lat + lat_delta, lng - lng_delta, lng + lng_delta)
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

/// Haversine distance between two points in meters, rounded to 4 decimal places.
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_M * c * 10_000.0).round() / 10_000.0
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(f64, f64)> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if !valid {
        return Err(Error::InvalidCoordinates {
            latitude,
            longitude,
        });
    }
    Ok((latitude, longitude))
}

/// Parse and validate coordinates from form or query-string input.
pub fn parse_coordinates(latitude: &str, longitude: &str) -> Result<(f64, f64)> {
    let lat = parse_number(latitude)?;
    let lng = parse_number(longitude)?;
    validate_coordinates(lat, lng)
}

/// Headings are compass bearings in `[0, 360)`. `None` means "leave unset".
pub fn validate_heading(heading: Option<f64>) -> Result<Option<f64>> {
    match heading {
        None => Ok(None),
        Some(h) if h.is_finite() && (0.0..360.0).contains(&h) => Ok(Some(h)),
        Some(h) => Err(Error::InvalidHeading(h)),
    }
}

pub fn parse_heading(heading: Option<&str>) -> Result<Option<f64>> {
    match heading.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => validate_heading(Some(parse_number(s)?)),
    }
}

fn parse_number(s: &str) -> Result<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| Error::InvalidNumber(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_point_is_zero() {
        assert_eq!(distance_m(51.5, -0.1, 51.5, -0.1), 0.0);
    }

    #[test]
    fn test_distance_london_to_paris() {
        let d = distance_m(51.5074, -0.1278, 48.8566, 2.3522);
        assert!(338_000.0 < d && d < 346_000.0, "got {d}");
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = distance_m(0.0, 0.0, 1.0, 0.0);
        assert!(110_000.0 < d && d < 112_000.0, "got {d}");
    }

    #[test]
    fn test_distance_symmetric_and_rounded() {
        let d1 = distance_m(51.5, -0.1, 48.9, 2.4);
        let d2 = distance_m(48.9, 2.4, 51.5, -0.1);
        assert!((d1 - d2).abs() < 0.001);
        assert_eq!((d1 * 10_000.0).round() / 10_000.0, d1);
    }

    #[test]
    fn test_bounding_box_contains_center() {
        let bbox = BoundingBox::around(51.5, -0.1, 1000.0);
        assert!(bbox.min_lat < 51.5 && 51.5 < bbox.max_lat);
        assert!(bbox.min_lng < -0.1 && -0.1 < bbox.max_lng);
        assert!(bbox.contains(51.5, -0.1));
        assert!(!bbox.contains(52.5, -0.1));
    }

    #[test]
    fn test_bounding_box_grows_with_radius() {
        let small = BoundingBox::around(51.5, -0.1, 500.0);
        let large = BoundingBox::around(51.5, -0.1, 5000.0);
        assert!(large.max_lat - large.min_lat > small.max_lat - small.min_lat);
    }

    #[test]
    fn test_bounding_box_symmetric_at_equator() {
        let bbox = BoundingBox::around(0.0, 0.0, 1000.0);
        assert!((bbox.max_lat + bbox.min_lat).abs() < 1e-12);
        assert!((bbox.max_lng + bbox.min_lng).abs() < 1e-12);
        assert!((bbox.max_lat - 1000.0 / METERS_PER_DEGREE).abs() < 1e-12);
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(matches!(
            validate_coordinates(91.0, 0.0),
            Err(Error::InvalidCoordinates { .. })
        ));
        assert!(validate_coordinates(-91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates("51.5", "-0.1").unwrap(), (51.5, -0.1));
        assert!(matches!(
            parse_coordinates("not-a-number", "0"),
            Err(Error::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_validate_heading() {
        assert_eq!(validate_heading(Some(180.0)).unwrap(), Some(180.0));
        assert_eq!(validate_heading(Some(0.0)).unwrap(), Some(0.0));
        assert_eq!(validate_heading(Some(359.9)).unwrap(), Some(359.9));
        assert_eq!(validate_heading(None).unwrap(), None);
        assert!(matches!(validate_heading(Some(360.0)), Err(Error::InvalidHeading(_))));
        assert!(validate_heading(Some(-1.0)).is_err());
    }

    #[test]
    fn test_parse_heading() {
        assert_eq!(parse_heading(Some("90")).unwrap(), Some(90.0));
        assert_eq!(parse_heading(Some("")).unwrap(), None);
        assert_eq!(parse_heading(None).unwrap(), None);
        assert!(parse_heading(Some("north")).is_err());
    }
}
