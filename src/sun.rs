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

//https://en.wikipedia.org/wiki/Position_of_the_Sun
//https://astrogreg.com/

use std::f64::consts::PI;

use libm::atan2;

use crate::julian::JD_J2000;
use crate::utils::constrain_360;

/// Geocentric solar position, good to a few hundredths of a degree.
#[derive(Debug, Clone, Copy)]
pub struct SolarCoordinates {
    /// Right ascension in degrees, [0, 360).
    pub right_ascension: f64,
    /// Declination in degrees.
    pub declination: f64,
    /// Earth-Sun distance in astronomical units.
    pub distance_au: f64,
    /// Apparent ecliptic longitude in degrees, [0, 360).
    pub ecliptic_longitude: f64,
}

pub fn solar_coordinates(jd: f64) -> SolarCoordinates {
    let n = jd - JD_J2000;

    // mean longitude and mean anomaly
    let l = constrain_360(280.460 + 0.985_647_4 * n);
    let g = constrain_360(357.528 + 0.985_600_3 * n).to_radians();

    // ecliptic longitude with the two largest equation-of-center terms
    let lambda = constrain_360(l + 1.915 * g.sin() + 0.020 * (2.0 * g).sin());
    let lambda_rad = lambda.to_radians();

    let distance_au = 1.000_14 - 0.016_71 * g.cos() - 0.000_14 * (2.0 * g).cos();

    let eps = (23.439 - 0.000_000_4 * n).to_radians();
    let mut ra = atan2(eps.cos() * lambda_rad.sin(), lambda_rad.cos());
    if ra < 0.0 {
        ra += 2.0 * PI;
    }
    let dec = (eps.sin() * lambda_rad.sin()).asin();

    SolarCoordinates {
        right_ascension: ra.to_degrees(),
        declination: dec.to_degrees(),
        distance_au,
        ecliptic_longitude: lambda,
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::solar_coordinates;

    #[test]
    fn test_solar_coordinates_1992_10_13() {
        // Meeus example 25.a, JDE 2448908.5
        let sun = solar_coordinates(2_448_908.5);
        assert_approx_eq!(sun.ecliptic_longitude, 199.906, 2e-2);
        assert_approx_eq!(sun.right_ascension, 198.378, 2e-2);
        assert_approx_eq!(sun.declination, -7.785, 1e-2);
        assert_approx_eq!(sun.distance_au, 0.99766, 5e-4);
    }

    #[test]
    fn test_declination_bounds_over_a_year() {
        // |declination| never exceeds the obliquity of the ecliptic
        for day in 0..365 {
            let sun = solar_coordinates(2_460_676.5 + day as f64);
            assert!(sun.declination.abs() < 23.5);
            assert!(sun.distance_au > 0.98 && sun.distance_au < 1.02);
        }
    }
}
