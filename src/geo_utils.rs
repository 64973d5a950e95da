//! Geographic utilities (distance, centroid, metre/degree conversions).

use crate::GpsPoint;

/// Earth radius in meters (mean radius).
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters per degree of latitude (approximately constant).
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle distance between two points in meters (Haversine).
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Arithmetic centroid of a set of points.
///
/// Returns (0, 0) for an empty slice. Adequate for venue-scale extents
/// where coordinates are locally planar.
pub fn compute_center(points: &[GpsPoint]) -> GpsPoint {
    if points.is_empty() {
        return GpsPoint::new(0.0, 0.0);
    }

    let (lat_sum, lng_sum) = points.iter().fold((0.0, 0.0), |(lat, lng), p| {
        (lat + p.latitude, lng + p.longitude)
    });

    GpsPoint::new(lat_sum / points.len() as f64, lng_sum / points.len() as f64)
}

/// Convert a distance in meters to degrees of longitude at the given latitude.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let meters_per_degree = METERS_PER_DEGREE_LAT * latitude.to_radians().cos();
    if meters_per_degree <= 0.0 {
        // At the poles, longitude degrees degenerate
        return f64::MAX;
    }
    meters / meters_per_degree
}

/// Convert a distance in meters to degrees of latitude.
pub fn meters_to_degrees_lat(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE_LAT
}

/// Offset a point by metre displacements (east, north).
///
/// Valid for the small (~1-100 m) offsets used by virtual gate placement.
pub fn offset_by_meters(point: &GpsPoint, east_meters: f64, north_meters: f64) -> GpsPoint {
    GpsPoint::new(
        point.latitude + meters_to_degrees_lat(north_meters),
        point.longitude + meters_to_degrees(east_meters, point.latitude),
    )
}
