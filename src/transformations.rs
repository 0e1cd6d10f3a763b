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

use libm::atan2;

use crate::julian::gst_degrees;
use crate::utils::{constrain_360, cosd, tand};

/// Earth equatorial radius in km, for lunar parallax.
const EARTH_RADIUS_KM: f64 = 6_378.14;

// in degrees
pub fn hour_angle(lon: f64, ra: f64, jd: f64) -> f64 {
    constrain_360(gst_degrees(jd) + lon - ra)
}

/// Convert geocentric equatorial coordinates to the local horizontal frame.
///
/// Returns `(altitude, azimuth)` in degrees, azimuth reckoned from north.
/// The altitude is geometric; refraction and parallax are applied separately.
pub fn equatorial_to_horizontal(lat: f64, lon: f64, ra: f64, dec: f64, jd: f64) -> (f64, f64) {
    let hour = hour_angle(lon, ra, jd).to_radians();
    let phi = lat.to_radians();
    let delta = dec.to_radians();

    let altitude = (phi.sin() * delta.sin() + phi.cos() * delta.cos() * hour.cos()).asin();

    // Meeus 13.5 reckons azimuth from the south meridian, westward; rotate
    // half a turn for the compass convention
    let from_south = atan2(hour.sin(), hour.cos() * phi.sin() - delta.tan() * phi.cos());
    let azimuth = constrain_360(from_south.to_degrees() + 180.0);

    (altitude.to_degrees(), azimuth)
}

/// Bennett refraction for a geometric altitude, in degrees of lift.
///
/// Standard atmosphere. Below -2 degrees the formula is extrapolated garbage,
/// so the correction is pinned to its value at -2.
pub fn bennett_refraction(alt: f64) -> f64 {
    let h = alt.max(-2.0);
    let r_arcmin = 1.02 / tand(h + 10.3 / (h + 5.11));
    r_arcmin.max(0.0) / 60.0
}

/// Altitude drop from lunar topocentric parallax, in degrees.
///
/// The geocentric altitude overstates what a surface observer sees by roughly
/// the horizontal parallax times cos(alt); for the Moon that is up to ~1
/// degree, which matters at alignment tolerances.
pub fn lunar_parallax_drop(alt: f64, distance_km: f64) -> f64 {
    let horizontal_parallax = (EARTH_RADIUS_KM / distance_km).asin().to_degrees();
    horizontal_parallax * cosd(alt)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_eq_to_horizontal() {
        // Meeus example 13.b: Venus from Washington, 1987-04-10 19:21:00 UT
        let jd = 2_446_896.306_25;
        let (alt, az) = equatorial_to_horizontal(
            38.921_388_889,
            -77.065_555_556,
            347.319_337_5,
            -6.719_891_667,
            jd,
        );
        assert_approx_eq!(alt, 15.124_9, 5e-3);
        assert_approx_eq!(az, 248.033_7, 5e-2);
    }

    #[test]
    fn test_hour_angle() {
        let jd = 2_446_896.306_25;
        assert_approx_eq!(hour_angle(-77.065_555_556, 347.319_337_5, jd), 64.352_133, 5e-3);
    }

    #[test]
    fn test_refraction_magnitudes() {
        // ~0.48 degrees at the horizon, a tiny lift near the zenith
        assert_approx_eq!(bennett_refraction(0.0), 0.478, 2e-2);
        assert!(bennett_refraction(45.0) < 0.02);
        assert!(bennett_refraction(-2.0) >= bennett_refraction(0.0));
    }

    #[test]
    fn test_lunar_parallax_drop() {
        // near perigee at the horizon the drop approaches one degree
        let drop = lunar_parallax_drop(0.0, 360_000.0);
        assert_approx_eq!(drop, 1.015, 2e-2);
        assert!(lunar_parallax_drop(60.0, 360_000.0) < drop);
    }
}
