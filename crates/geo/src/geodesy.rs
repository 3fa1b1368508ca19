//! # Great-Circle Geodesy
//!
//! Spherical bearing and haversine distance on a sphere of radius
//! [`EARTH_RADIUS_M`]. Flat `atan2(Δlon, Δlat)` bearings drift with distance
//! and latitude and break across the antimeridian, so they are not offered.
//!
//! ## Table of Contents
//! 1. bearing_to — Initial great-circle bearing
//! 2. distance_meters — Haversine distance
//! 3. normalize_angle — Wrap into (-180, 180]

use crate::coords::GeoPoint;

/// Earth radius in meters (WGS84 mean)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ============================================================================
// 1. bearing_to — Initial great-circle bearing
// ============================================================================

/// Initial bearing from `from` to `to` in degrees, clockwise from north, in [0, 360).
///
/// Identical points yield 0.
pub fn bearing_to(from: GeoPoint, to: GeoPoint) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    if !x.is_finite() || !y.is_finite() {
        return 0.0;
    }

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

// ============================================================================
// 2. distance_meters — Haversine distance
// ============================================================================

/// Great-circle distance in meters.
///
/// Deltas are taken as absolute values so `distance_meters(a, b)` and
/// `distance_meters(b, a)` are bit-identical.
pub fn distance_meters(from: GeoPoint, to: GeoPoint) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_phi = (to.latitude - from.latitude).abs().to_radians();
    let d_lambda = (to.longitude - from.longitude).abs().to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();
    let d = EARTH_RADIUS_M * c;
    if d.is_finite() {
        d
    } else {
        0.0
    }
}

// ============================================================================
// 3. normalize_angle — Wrap into (-180, 180]
// ============================================================================

/// Wrap an angle in degrees into (-180, 180].
///
/// Values already in range are returned untouched, which keeps the function
/// idempotent under floating-point rounding. Non-finite input maps to 0.
pub fn normalize_angle(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    if degrees > -180.0 && degrees <= 180.0 {
        return degrees;
    }
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Wrap a compass heading into [0, 360). Non-finite input maps to 0.
pub fn normalize_heading(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
