// The MIT License (MIT)
//
// Copyright (c) 2024 Ricardo Cernic
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

//! Observer-to-apex geometry: bearing, distance, and line-of-sight elevation
//! to the top of the fixed landmark. All functions are pure.

use libm::atan2;

use crate::error::{Error, Result};
use crate::utils::constrain_360;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Photographer eye height above local ground, meters.
pub const EYE_HEIGHT_M: f64 = 1.7;

// Net effect of atmospheric refraction against Earth-curvature drop over the
// sight line: the drop d^2/2R is reduced by this fraction.
const REFRACTION_NET_FACTOR: f64 = 0.13;

/// The top of the fixed landmark.
#[derive(Debug, Clone, Copy)]
pub struct Apex {
    pub latitude: f64,
    pub longitude: f64,
    /// Height of the structure above its own base ground, meters.
    pub structure_height_m: f64,
}

/// A ground observation point.
#[derive(Debug, Clone, Copy)]
pub struct GroundPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground elevation above sea level, meters.
    pub elevation_m: f64,
}

/// Bearing from the observer to the apex, degrees [0, 360).
///
/// Compass bearing on the coordinate grid: atan2 of the eastward delta over
/// the northward delta, both in radians. Cached site bearings and the map
/// overlays all use this same grid.
pub fn azimuth_to_apex(observer: &GroundPoint, apex: &Apex) -> f64 {
    let north = (apex.latitude - observer.latitude).to_radians();
    let east = (apex.longitude - observer.longitude).to_radians();
    constrain_360(atan2(east, north).to_degrees())
}

/// Haversine ground distance from the observer to the apex base, meters.
pub fn distance_to_apex(observer: &GroundPoint, apex: &Apex) -> f64 {
    let phi1 = observer.latitude.to_radians();
    let phi2 = apex.latitude.to_radians();
    let delta_phi = (apex.latitude - observer.latitude).to_radians();
    let delta_lambda = (apex.longitude - observer.longitude).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Apparent elevation angle from the observer's eye to the apex, degrees.
///
/// The vertical separation is corrected for the curvature drop over the
/// sight line, net of standard refraction. Fails when the inputs do not
/// produce a finite angle.
pub fn elevation_to_apex(observer: &GroundPoint, apex: &Apex) -> Result<f64> {
    let distance = distance_to_apex(observer, apex);
    let vertical = apex.structure_height_m - (observer.elevation_m + EYE_HEIGHT_M);
    let curvature_drop =
        distance * distance / (2.0 * EARTH_RADIUS_M) * (1.0 - REFRACTION_NET_FACTOR);
    let effective = vertical - curvature_drop;

    let elevation = atan2(effective, distance).to_degrees();
    if !elevation.is_finite() {
        return Err(Error::InvalidGeometry(format!(
            "non-finite elevation from ({}, {}, {} m)",
            observer.latitude, observer.longitude, observer.elevation_m
        )));
    }
    Ok(elevation)
}

/// Smallest angle between two azimuths, degrees [0, 180].
pub fn azimuth_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Great-circle destination from a start point along a bearing, degrees.
pub fn destination_point(latitude: f64, longitude: f64, bearing: f64, distance_m: f64) -> (f64, f64) {
    let phi1 = latitude.to_radians();
    let lambda1 = longitude.to_radians();
    let theta = bearing.to_radians();
    let delta = distance_m / EARTH_RADIUS_M;

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + atan2(
            theta.sin() * delta.sin() * phi1.cos(),
            delta.cos() - phi1.sin() * phi2.sin(),
        );

    let lon = (lambda2.to_degrees() + 540.0) % 360.0 - 180.0;
    (phi2.to_degrees(), lon)
}

/// Ground distance at which the apex appears at `target_altitude` degrees
/// for an observer at `observer_elevation_m`. None when no forward distance
/// produces that altitude.
///
/// Inverts elevation_to_apex: with h = effective height and
/// k = (1 - net refraction)/2R, solves k d^2 + d tan(a) - h = 0.
pub fn distance_for_apex_altitude(
    apex: &Apex,
    target_altitude: f64,
    observer_elevation_m: f64,
) -> Option<f64> {
    let h = apex.structure_height_m - (observer_elevation_m + EYE_HEIGHT_M);
    if h <= 0.0 {
        return None;
    }
    let k = (1.0 - REFRACTION_NET_FACTOR) / (2.0 * EARTH_RADIUS_M);
    let tan_a = target_altitude.to_radians().tan();

    let discriminant = tan_a * tan_a + 4.0 * k * h;
    if discriminant < 0.0 {
        return None;
    }
    let d = (-tan_a + discriminant.sqrt()) / (2.0 * k);
    (d.is_finite() && d > 0.0).then_some(d)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn skytree() -> Apex {
        Apex {
            latitude: 35.710_063,
            longitude: 139.810_700,
            structure_height_m: 634.0,
        }
    }

    #[test]
    fn test_bearing_and_distance_from_sagami_coast() {
        let observer = GroundPoint {
            latitude: 35.0,
            longitude: 139.0,
            elevation_m: 0.0,
        };
        let apex = skytree();
        // ~108 km out on the Sagami coast, tower to the northeast
        assert_approx_eq!(distance_to_apex(&observer, &apex), 107_890.0, 1_000.0);
        assert_approx_eq!(azimuth_to_apex(&observer, &apex), 48.8, 0.3);
    }

    #[test]
    fn test_azimuth_difference_algebra() {
        assert_approx_eq!(azimuth_difference(123.4, 123.4), 0.0, 1e-12);
        assert_approx_eq!(azimuth_difference(10.0, 350.0), 20.0, 1e-9);
        assert_approx_eq!(azimuth_difference(350.0, 10.0), 20.0, 1e-9);
        for (a, b) in [(0.0, 180.0), (90.0, 271.0), (359.9, 0.1)] {
            let d = azimuth_difference(a, b);
            assert!((0.0..=180.0).contains(&d));
            assert_approx_eq!(d, azimuth_difference(b, a), 1e-12);
        }
    }

    #[test]
    fn test_elevation_at_apex_base_is_near_vertical() {
        let apex = skytree();
        let observer = GroundPoint {
            latitude: apex.latitude,
            longitude: apex.longitude,
            elevation_m: 0.0,
        };
        let elevation = elevation_to_apex(&observer, &apex).unwrap();
        assert_approx_eq!(elevation, 90.0, 1e-6);
    }

    #[test]
    fn test_elevation_negative_when_observer_above_apex() {
        let apex = skytree();
        let observer = GroundPoint {
            latitude: 35.4,
            longitude: 138.7,
            elevation_m: 1_500.0,
        };
        let elevation = elevation_to_apex(&observer, &apex).unwrap();
        assert!(elevation < 0.0);
    }

    #[test]
    fn test_distance_for_apex_altitude_round_trips() {
        let apex = skytree();
        let d = distance_for_apex_altitude(&apex, 1.5, 20.0).unwrap();
        // walk due south so the look-back bearing is exactly north
        let (lat, lon) = destination_point(apex.latitude, apex.longitude, 180.0, d);
        let observer = GroundPoint {
            latitude: lat,
            longitude: lon,
            elevation_m: 20.0,
        };
        let elevation = elevation_to_apex(&observer, &apex).unwrap();
        assert_approx_eq!(elevation, 1.5, 1e-2);
        assert_approx_eq!(azimuth_difference(azimuth_to_apex(&observer, &apex), 0.0), 0.0, 0.1);
    }

    #[test]
    fn test_no_distance_when_observer_higher_than_structure() {
        let apex = skytree();
        assert!(distance_for_apex_altitude(&apex, 1.0, 1_000.0).is_none());
    }
}
