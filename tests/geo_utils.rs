//! Tests for geo_utils module

use gatematch::GpsPoint;
use gatematch::geo_utils::*;

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_haversine_distance_same_point() {
    let p = GpsPoint::new(47.3769, 8.5417);
    assert_eq!(haversine_distance(&p, &p), 0.0);
}

#[test]
fn test_haversine_distance_known_value() {
    // London to Paris is approximately 344 km
    let london = GpsPoint::new(51.5074, -0.1278);
    let paris = GpsPoint::new(48.8566, 2.3522);
    let dist = haversine_distance(&london, &paris);
    assert!(approx_eq(dist, 343_560.0, 5000.0)); // Within 5km
}

#[test]
fn test_haversine_distance_short_range() {
    // ~0.001 degrees of latitude is ~111 m
    let a = GpsPoint::new(47.3769, 8.5417);
    let b = GpsPoint::new(47.3779, 8.5417);
    let dist = haversine_distance(&a, &b);
    assert!(approx_eq(dist, 111.3, 1.0));
}

#[test]
fn test_compute_center() {
    let points = vec![GpsPoint::new(47.370, 8.540), GpsPoint::new(47.372, 8.542)];
    let center = compute_center(&points);
    assert!(approx_eq(center.latitude, 47.371, 0.0001));
    assert!(approx_eq(center.longitude, 8.541, 0.0001));
}

#[test]
fn test_compute_center_empty() {
    let empty: Vec<GpsPoint> = vec![];
    let center = compute_center(&empty);
    assert_eq!(center.latitude, 0.0);
    assert_eq!(center.longitude, 0.0);
}

#[test]
fn test_meters_to_degrees() {
    // At equator, 111km = 1 degree
    let deg = meters_to_degrees(111_320.0, 0.0);
    assert!(approx_eq(deg, 1.0, 0.01));

    // At higher latitude, same distance = more degrees
    let deg_45 = meters_to_degrees(111_320.0, 45.0);
    assert!(deg_45 > 1.0);
}

#[test]
fn test_offset_by_meters_round_trip() {
    let origin = GpsPoint::new(47.3769, 8.5417);

    let east = offset_by_meters(&origin, 10.0, 0.0);
    assert!(approx_eq(haversine_distance(&origin, &east), 10.0, 0.1));

    let north = offset_by_meters(&origin, 0.0, 25.0);
    assert!(approx_eq(haversine_distance(&origin, &north), 25.0, 0.1));
}

#[test]
fn test_offset_directions_are_distinct() {
    let origin = GpsPoint::new(47.3769, 8.5417);
    let east = offset_by_meters(&origin, 1.0, 0.0);
    let north = offset_by_meters(&origin, 0.0, 1.0);

    assert!(east.longitude > origin.longitude);
    assert_eq!(east.latitude, origin.latitude);
    assert!(north.latitude > origin.latitude);
    assert_eq!(north.longitude, origin.longitude);
}
