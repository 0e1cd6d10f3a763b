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

//! Truncated ELP-2000/82 lunar position (Meeus chapter 47 series).

use libm::atan2;

use crate::earth::nutation;
use crate::utils::{constrain_360, cosd, sind, tand};

// Periodic terms for longitude and distance. One row per term: multipliers of
// (D, M, M', F), then the sine coefficient for longitude (1e-6 degree) and
// the cosine coefficient for distance (1e-3 km).
const LUNAR_LON_DIST_TERMS: [(f64, f64, f64, f64, f64, f64); 60] = [
    (0.0, 0.0, 1.0, 0.0, 6_288_774.0, -20_905_355.0),
    (2.0, 0.0, -1.0, 0.0, 1_274_027.0, -3_699_111.0),
    (2.0, 0.0, 0.0, 0.0, 658_314.0, -2_955_968.0),
    (0.0, 0.0, 2.0, 0.0, 213_618.0, -569_925.0),
    (0.0, 1.0, 0.0, 0.0, -185_116.0, 48_888.0),
    (0.0, 0.0, 0.0, 2.0, -114_332.0, -3_149.0),
    (2.0, 0.0, -2.0, 0.0, 58_793.0, 246_158.0),
    (2.0, -1.0, -1.0, 0.0, 57_066.0, -152_138.0),
    (2.0, 0.0, 1.0, 0.0, 53_322.0, -170_733.0),
    (2.0, -1.0, 0.0, 0.0, 45_758.0, -204_586.0),
    (0.0, 1.0, -1.0, 0.0, -40_923.0, -129_620.0),
    (1.0, 0.0, 0.0, 0.0, -34_720.0, 108_743.0),
    (0.0, 1.0, 1.0, 0.0, -30_383.0, 104_755.0),
    (2.0, 0.0, 0.0, -2.0, 15_327.0, 10_321.0),
    (0.0, 0.0, 1.0, 2.0, -12_528.0, 0.0),
    (0.0, 0.0, 1.0, -2.0, 10_980.0, 79_661.0),
    (4.0, 0.0, -1.0, 0.0, 10_675.0, -34_782.0),
    (0.0, 0.0, 3.0, 0.0, 10_034.0, -23_210.0),
    (4.0, 0.0, -2.0, 0.0, 8_548.0, -21_636.0),
    (2.0, 1.0, -1.0, 0.0, -7_888.0, 24_208.0),
    (2.0, 1.0, 0.0, 0.0, -6_766.0, 30_824.0),
    (1.0, 0.0, -1.0, 0.0, -5_163.0, -8_379.0),
    (1.0, 1.0, 0.0, 0.0, 4_987.0, -16_675.0),
    (2.0, -1.0, 1.0, 0.0, 4_036.0, -12_831.0),
    (2.0, 0.0, 2.0, 0.0, 3_994.0, -10_445.0),
    (4.0, 0.0, 0.0, 0.0, 3_861.0, -11_650.0),
    (2.0, 0.0, -3.0, 0.0, 3_665.0, 14_403.0),
    (0.0, 1.0, -2.0, 0.0, -2_689.0, -7_003.0),
    (2.0, 0.0, -1.0, 2.0, -2_602.0, 0.0),
    (2.0, -1.0, -2.0, 0.0, 2_390.0, 10_056.0),
    (1.0, 0.0, 1.0, 0.0, -2_348.0, 6_322.0),
    (2.0, -2.0, 0.0, 0.0, 2_236.0, -9_884.0),
    (0.0, 1.0, 2.0, 0.0, -2_120.0, 5_751.0),
    (0.0, 2.0, 0.0, 0.0, -2_069.0, 0.0),
    (2.0, -2.0, -1.0, 0.0, 2_048.0, -4_950.0),
    (2.0, 0.0, 1.0, -2.0, -1_773.0, 4_130.0),
    (2.0, 0.0, 0.0, 2.0, -1_595.0, 0.0),
    (4.0, -1.0, -1.0, 0.0, 1_215.0, -3_958.0),
    (0.0, 0.0, 2.0, 2.0, -1_110.0, 0.0),
    (3.0, 0.0, -1.0, 0.0, -892.0, 3_258.0),
    (2.0, 1.0, 1.0, 0.0, -810.0, 2_616.0),
    (4.0, -1.0, -2.0, 0.0, 759.0, -1_897.0),
    (0.0, 2.0, -1.0, 0.0, -713.0, -2_117.0),
    (2.0, 2.0, -1.0, 0.0, -700.0, 2_354.0),
    (2.0, 1.0, -2.0, 0.0, 691.0, 0.0),
    (2.0, -1.0, 0.0, -2.0, 596.0, 0.0),
    (4.0, 0.0, 1.0, 0.0, 549.0, -1_423.0),
    (0.0, 0.0, 4.0, 0.0, 537.0, -1_117.0),
    (4.0, -1.0, 0.0, 0.0, 520.0, -1_571.0),
    (1.0, 0.0, -2.0, 0.0, -487.0, -1_739.0),
    (2.0, 1.0, 0.0, -2.0, -399.0, 0.0),
    (0.0, 0.0, 2.0, -2.0, -381.0, -4_421.0),
    (1.0, 1.0, 1.0, 0.0, 351.0, 0.0),
    (3.0, 0.0, -2.0, 0.0, -340.0, 0.0),
    (4.0, 0.0, -3.0, 0.0, 330.0, 0.0),
    (2.0, -1.0, 2.0, 0.0, 327.0, 0.0),
    (0.0, 2.0, 1.0, 0.0, -323.0, 1_165.0),
    (1.0, 1.0, -1.0, 0.0, 299.0, 0.0),
    (2.0, 0.0, 3.0, 0.0, 294.0, 0.0),
    (2.0, 0.0, -1.0, -2.0, 0.0, 8_752.0),
];

// Periodic terms for latitude: multipliers of (D, M, M', F) and the sine
// coefficient in 1e-6 degree.
const LUNAR_LAT_TERMS: [(f64, f64, f64, f64, f64); 60] = [
    (0.0, 0.0, 0.0, 1.0, 5_128_122.0),
    (0.0, 0.0, 1.0, 1.0, 280_602.0),
    (0.0, 0.0, 1.0, -1.0, 277_693.0),
    (2.0, 0.0, 0.0, -1.0, 173_237.0),
    (2.0, 0.0, -1.0, 1.0, 55_413.0),
    (2.0, 0.0, -1.0, -1.0, 46_271.0),
    (2.0, 0.0, 0.0, 1.0, 32_573.0),
    (0.0, 0.0, 2.0, 1.0, 17_198.0),
    (2.0, 0.0, 1.0, -1.0, 9_266.0),
    (0.0, 0.0, 2.0, -1.0, 8_822.0),
    (2.0, -1.0, 0.0, -1.0, 8_216.0),
    (2.0, 0.0, -2.0, -1.0, 4_324.0),
    (2.0, 0.0, 1.0, 1.0, 4_200.0),
    (2.0, 1.0, 0.0, -1.0, -3_359.0),
    (2.0, -1.0, -1.0, 1.0, 2_463.0),
    (2.0, -1.0, 0.0, 1.0, 2_211.0),
    (2.0, -1.0, -1.0, -1.0, 2_065.0),
    (0.0, 1.0, -1.0, -1.0, -1_870.0),
    (4.0, 0.0, -1.0, -1.0, 1_828.0),
    (0.0, 1.0, 0.0, 1.0, -1_794.0),
    (0.0, 0.0, 0.0, 3.0, -1_749.0),
    (0.0, 1.0, -1.0, 1.0, -1_565.0),
    (1.0, 0.0, 0.0, 1.0, -1_491.0),
    (0.0, 1.0, 1.0, 1.0, -1_475.0),
    (0.0, 1.0, 1.0, -1.0, -1_410.0),
    (0.0, 1.0, 0.0, -1.0, -1_344.0),
    (1.0, 0.0, 0.0, -1.0, -1_335.0),
    (0.0, 0.0, 3.0, 1.0, 1_107.0),
    (4.0, 0.0, 0.0, -1.0, 1_021.0),
    (4.0, 0.0, -1.0, 1.0, 833.0),
    (0.0, 0.0, 1.0, -3.0, 777.0),
    (4.0, 0.0, -2.0, 1.0, 671.0),
    (2.0, 0.0, 0.0, -3.0, 607.0),
    (2.0, 0.0, 2.0, -1.0, 596.0),
    (2.0, -1.0, 1.0, -1.0, 491.0),
    (2.0, 0.0, -2.0, 1.0, -451.0),
    (0.0, 0.0, 3.0, -1.0, 439.0),
    (2.0, 0.0, 2.0, 1.0, 422.0),
    (2.0, 0.0, -3.0, -1.0, 421.0),
    (2.0, 1.0, -1.0, 1.0, -366.0),
    (2.0, 1.0, 0.0, 1.0, -351.0),
    (4.0, 0.0, 0.0, 1.0, 331.0),
    (2.0, -1.0, 1.0, 1.0, 315.0),
    (2.0, -2.0, 0.0, -1.0, 302.0),
    (0.0, 0.0, 1.0, 3.0, -283.0),
    (2.0, 1.0, 1.0, -1.0, -229.0),
    (1.0, 1.0, 0.0, -1.0, 223.0),
    (1.0, 1.0, 0.0, 1.0, 223.0),
    (0.0, 1.0, -2.0, -1.0, -220.0),
    (2.0, 1.0, -1.0, -1.0, -220.0),
    (1.0, 0.0, 1.0, 1.0, -185.0),
    (2.0, -1.0, -2.0, -1.0, 181.0),
    (0.0, 1.0, 2.0, 1.0, -177.0),
    (4.0, 0.0, -2.0, -1.0, 176.0),
    (4.0, -1.0, -1.0, -1.0, 166.0),
    (1.0, 0.0, 1.0, -1.0, -164.0),
    (4.0, 0.0, 1.0, -1.0, 132.0),
    (1.0, 0.0, -1.0, -1.0, -119.0),
    (4.0, -1.0, 0.0, -1.0, 115.0),
    (2.0, -2.0, 0.0, 1.0, 107.0),
];

/// Geocentric lunar position referred to the mean equinox of date.
#[derive(Debug, Clone, Copy)]
pub struct LunarCoordinates {
    /// Apparent right ascension in degrees, [0, 360).
    pub right_ascension: f64,
    /// Apparent declination in degrees.
    pub declination: f64,
    /// Earth-Moon center distance in kilometers.
    pub distance_km: f64,
    /// Apparent ecliptic longitude in degrees, [0, 360).
    pub ecliptic_longitude: f64,
    /// Ecliptic latitude in degrees.
    pub ecliptic_latitude: f64,
}

/// Lunar position at Julian century `t` since J2000.0.
pub fn lunar_coordinates(t: f64) -> LunarCoordinates {
    // mean longitude of the Moon
    let lprime = constrain_360(
        218.316_447_7 + 481_267.881_234_21 * t - 0.001_578_6 * t * t + t * t * t / 538_841.0
            - t * t * t * t / 65_194_000.0,
    );

    // mean elongation of the Moon
    let d = constrain_360(
        297.850_192_1 + 445_267.111_403_4 * t - 0.001_881_9 * t * t + t * t * t / 545_868.0
            - t * t * t * t / 113_065_000.0,
    )
    .to_radians();

    // mean anomaly of the Sun
    let m = constrain_360(
        357.529_11 + 35_999.050_290_9 * t - 0.000_153_6 * t * t + t * t * t / 24_490_000.0,
    )
    .to_radians();

    // mean anomaly of the Moon
    let mprime = constrain_360(
        134.963_396_4 + 477_198.867_505_5 * t + 0.008_741_4 * t * t + t * t * t / 69_699.0
            - t * t * t * t / 14_712_000.0,
    )
    .to_radians();

    // argument of latitude of the Moon
    let f = constrain_360(
        93.272_095_0 + 483_202.017_523_3 * t - 0.003_653_9 * t * t - t * t * t / 3_526_000.0
            + t * t * t * t / 863_310_000.0,
    )
    .to_radians();

    // further arguments: a1 due to Venus, a2 due to Jupiter
    let a1 = constrain_360(119.75 + 131.849 * t).to_radians();
    let a2 = constrain_360(53.09 + 479_264.290 * t).to_radians();
    let a3 = constrain_360(313.45 + 481_266.484 * t).to_radians();

    // "correction" for eccentricity of Earth's orbit
    let e = 1.0 - 0.002_516 * t - 0.000_007_4 * t * t;
    let e2 = e * e;

    let eccentricity_factor = |m_mult: f64| -> f64 {
        if m_mult.abs() == 1.0 {
            e
        } else if m_mult.abs() == 2.0 {
            e2
        } else {
            1.0
        }
    };

    let mut sigma_l = 0.0;
    let mut sigma_r = 0.0;
    for &(td, tm, tmp, tf, lon_coeff, dist_coeff) in LUNAR_LON_DIST_TERMS.iter() {
        let arg = td * d + tm * m + tmp * mprime + tf * f;
        let ecc = eccentricity_factor(tm);
        sigma_l += ecc * lon_coeff * arg.sin();
        sigma_r += ecc * dist_coeff * arg.cos();
    }

    let mut sigma_b = 0.0;
    for &(td, tm, tmp, tf, lat_coeff) in LUNAR_LAT_TERMS.iter() {
        let arg = td * d + tm * m + tmp * mprime + tf * f;
        sigma_b += eccentricity_factor(tm) * lat_coeff * arg.sin();
    }

    let lprime_rad = lprime.to_radians();
    sigma_l += 3_958.0 * a1.sin() + 1_962.0 * (lprime_rad - f).sin() + 318.0 * a2.sin();
    sigma_b += -2_235.0 * lprime_rad.sin()
        + 382.0 * a3.sin()
        + 175.0 * (a1 - f).sin()
        + 175.0 * (a1 + f).sin()
        + 127.0 * (lprime_rad - mprime).sin()
        - 115.0 * (lprime_rad + mprime).sin();

    let true_lon = lprime + sigma_l / 1e6;
    let true_lat = sigma_b / 1e6;
    let distance_km = 385_000.56 + sigma_r / 1e3;

    // apparent longitude and true obliquity
    let (delta_psi, delta_eps, eps0) = nutation(t);
    let apparent_lon = constrain_360(true_lon + delta_psi);
    let eps = (eps0 + delta_eps).to_radians();

    let right_ascension = constrain_360(
        atan2(
            eps.cos() * sind(apparent_lon) - eps.sin() * tand(true_lat),
            cosd(apparent_lon),
        )
        .to_degrees(),
    );
    let declination = (sind(true_lat) * eps.cos() + eps.sin() * sind(apparent_lon) * cosd(true_lat))
        .asin()
        .to_degrees();

    LunarCoordinates {
        right_ascension,
        declination,
        distance_km,
        ecliptic_longitude: apparent_lon,
        ecliptic_latitude: true_lat,
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::lunar_coordinates;

    #[test]
    fn test_lunar_coordinates_1992_04_12() {
        // Meeus example 47.a, JDE 2448724.5, T = -0.077221081451
        let moon = lunar_coordinates(-0.077_221_081_451);
        assert_approx_eq!(moon.ecliptic_longitude, 133.167_265, 3e-3);
        assert_approx_eq!(moon.ecliptic_latitude, -3.229_126, 3e-3);
        assert_approx_eq!(moon.distance_km, 368_409.7, 2.0);
        assert_approx_eq!(moon.right_ascension, 134.688_470, 5e-3);
        assert_approx_eq!(moon.declination, 13.768_368, 5e-3);
    }

    #[test]
    fn test_distance_stays_in_orbit_range() {
        for step in 0..30 {
            let t = 0.25 + step as f64 * 0.001;
            let moon = lunar_coordinates(t);
            assert!(moon.distance_km > 356_000.0 && moon.distance_km < 407_000.0);
            assert!(moon.ecliptic_latitude.abs() < 5.5);
        }
    }
}
