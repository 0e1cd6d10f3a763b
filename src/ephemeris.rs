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

//! Ephemeris capability port and its Meeus-backed implementation.
//!
//! The solver only sees the [`Ephemeris`] trait; deployments may swap in a
//! higher-precision provider, and tests use [`FixedEphemeris`].

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::error::Result;
use crate::julian::{datetime_from_jd, j2000_century, julian_day};
use crate::moon::lunar_coordinates;
use crate::sun::solar_coordinates;
use crate::transformations::{bennett_refraction, equatorial_to_horizontal, lunar_parallax_drop};
use crate::utils::{constrain_360, cross_horizon, two_point_interpolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Sun,
    Moon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiseSetDirection {
    Rising,
    Setting,
}

/// Topocentric solar position. Altitude is apparent (refraction applied).
#[derive(Debug, Clone, Copy)]
pub struct SunPosition {
    pub azimuth: f64,
    pub altitude: f64,
    pub distance_au: f64,
}

/// Topocentric lunar position. Altitude is apparent (parallax and refraction
/// applied). Phase is the Sun-Moon elongation in degrees [0, 360).
#[derive(Debug, Clone, Copy)]
pub struct MoonPosition {
    pub azimuth: f64,
    pub altitude: f64,
    pub distance_km: f64,
    pub phase: f64,
    pub illumination: f64,
}

/// Fraction of the lunar disc illuminated for a given elongation.
pub fn illumination_for_phase(phase: f64) -> f64 {
    if phase <= 180.0 {
        phase / 180.0
    } else {
        (360.0 - phase) / 180.0
    }
}

pub trait Ephemeris: Send + Sync {
    fn sun_position(&self, at: DateTime<Utc>, latitude: f64, longitude: f64)
        -> Result<SunPosition>;

    fn moon_position(
        &self,
        at: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<MoonPosition>;

    /// First rise or set of `body` on or after the local calendar day that
    /// contains `near`, scanning at most `search_days` days.
    fn rise_set(
        &self,
        body: Body,
        near: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        direction: RiseSetDirection,
        search_days: u32,
    ) -> Result<Option<DateTime<Utc>>>;
}

/// Production provider built on the crate's Meeus-style Sun/Moon series.
pub struct MeeusEphemeris {
    timezone: FixedOffset,
}

impl MeeusEphemeris {
    pub fn new(timezone: FixedOffset) -> Self {
        MeeusEphemeris { timezone }
    }

    fn local_day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight exists");
        match self.timezone.from_local_datetime(&midnight).single() {
            Some(local) => local.with_timezone(&Utc),
            // fixed offsets are never ambiguous; keep a sane fallback anyway
            None => DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc),
        }
    }

    fn apparent_altitude_grid(
        &self,
        body: Body,
        start: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        points: usize,
    ) -> Vec<(f64, f64)> {
        let jd_start = julian_day(start);
        let jd_end = jd_start + 1.0;
        let inc = (jd_end - jd_start) / points as f64;
        let mut grid = Vec::with_capacity(points + 1);
        for i in 0..=points {
            let jd = jd_start + inc * i as f64;
            let alt = match body {
                Body::Sun => {
                    let sun = solar_coordinates(jd);
                    let (alt, _) = equatorial_to_horizontal(
                        latitude,
                        longitude,
                        sun.right_ascension,
                        sun.declination,
                        jd,
                    );
                    alt + bennett_refraction(alt)
                }
                Body::Moon => {
                    let moon = lunar_coordinates(j2000_century(jd));
                    let (alt, _) = equatorial_to_horizontal(
                        latitude,
                        longitude,
                        moon.right_ascension,
                        moon.declination,
                        jd,
                    );
                    let topocentric = alt - lunar_parallax_drop(alt, moon.distance_km);
                    topocentric + bennett_refraction(topocentric)
                }
            };
            grid.push((jd, alt));
        }
        grid
    }
}

impl Ephemeris for MeeusEphemeris {
    fn sun_position(
        &self,
        at: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<SunPosition> {
        let jd = julian_day(at);
        let sun = solar_coordinates(jd);
        let (alt, az) =
            equatorial_to_horizontal(latitude, longitude, sun.right_ascension, sun.declination, jd);
        Ok(SunPosition {
            azimuth: az,
            altitude: alt + bennett_refraction(alt),
            distance_au: sun.distance_au,
        })
    }

    fn moon_position(
        &self,
        at: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<MoonPosition> {
        let jd = julian_day(at);
        let moon = lunar_coordinates(j2000_century(jd));
        let sun = solar_coordinates(jd);
        let (alt, az) = equatorial_to_horizontal(
            latitude,
            longitude,
            moon.right_ascension,
            moon.declination,
            jd,
        );
        let topocentric = alt - lunar_parallax_drop(alt, moon.distance_km);
        let phase = constrain_360(moon.ecliptic_longitude - sun.ecliptic_longitude);
        Ok(MoonPosition {
            azimuth: az,
            altitude: topocentric + bennett_refraction(topocentric),
            distance_km: moon.distance_km,
            phase,
            illumination: illumination_for_phase(phase),
        })
    }

    fn rise_set(
        &self,
        body: Body,
        near: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        direction: RiseSetDirection,
        search_days: u32,
    ) -> Result<Option<DateTime<Utc>>> {
        // 5-minute sampling, then linear interpolation at the crossing;
        // callers only use this to seed multi-hour search windows
        const GRID_POINTS: usize = 288;

        let first_day = near.with_timezone(&self.timezone).date_naive();
        for offset in 0..search_days.max(1) {
            let Some(date) = first_day.checked_add_signed(Duration::days(offset as i64)) else {
                break;
            };
            let start = self.local_day_start(date);
            let grid = self.apparent_altitude_grid(body, start, latitude, longitude, GRID_POINTS);
            let rising = direction == RiseSetDirection::Rising;
            let crossings = cross_horizon(&grid, 0.0, rising);
            if let Some(&(jd0, alt0, jd1, alt1)) = crossings.first() {
                let jd = two_point_interpolation(jd0, jd1, alt0, alt1, 0.0);
                return Ok(Some(datetime_from_jd(jd)));
            }
        }
        Ok(None)
    }
}

/// Deterministic ephemeris for tests: both bodies move on linear
/// azimuth/altitude tracks from a fixed epoch.
pub struct FixedEphemeris {
    pub epoch: DateTime<Utc>,
    pub sun: LinearTrack,
    pub moon: LinearTrack,
    pub moon_distance_km: f64,
    pub moon_phase: f64,
    pub moon_illumination: f64,
    pub moon_rise: Option<DateTime<Utc>>,
    pub moon_set: Option<DateTime<Utc>>,
}

/// Straight-line body track, rates per minute since the epoch.
#[derive(Debug, Clone, Copy)]
pub struct LinearTrack {
    pub azimuth_start: f64,
    pub azimuth_rate: f64,
    pub altitude_start: f64,
    pub altitude_rate: f64,
}

impl LinearTrack {
    fn at(&self, minutes: f64) -> (f64, f64) {
        (
            constrain_360(self.azimuth_start + self.azimuth_rate * minutes),
            self.altitude_start + self.altitude_rate * minutes,
        )
    }
}

impl FixedEphemeris {
    fn minutes_since_epoch(&self, at: DateTime<Utc>) -> f64 {
        (at - self.epoch).num_seconds() as f64 / 60.0
    }
}

impl Ephemeris for FixedEphemeris {
    fn sun_position(&self, at: DateTime<Utc>, _lat: f64, _lon: f64) -> Result<SunPosition> {
        let (azimuth, altitude) = self.sun.at(self.minutes_since_epoch(at));
        Ok(SunPosition {
            azimuth,
            altitude,
            distance_au: 1.0,
        })
    }

    fn moon_position(&self, at: DateTime<Utc>, _lat: f64, _lon: f64) -> Result<MoonPosition> {
        let (azimuth, altitude) = self.moon.at(self.minutes_since_epoch(at));
        Ok(MoonPosition {
            azimuth,
            altitude,
            distance_km: self.moon_distance_km,
            phase: self.moon_phase,
            illumination: self.moon_illumination,
        })
    }

    fn rise_set(
        &self,
        body: Body,
        _near: DateTime<Utc>,
        _lat: f64,
        _lon: f64,
        direction: RiseSetDirection,
        _search_days: u32,
    ) -> Result<Option<DateTime<Utc>>> {
        if body == Body::Sun {
            return Ok(None);
        }
        Ok(match direction {
            RiseSetDirection::Rising => self.moon_rise,
            RiseSetDirection::Setting => self.moon_set,
        })
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3_600).unwrap()
    }

    fn tokyo() -> (f64, f64) {
        (35.681, 139.767)
    }

    #[test]
    fn test_noon_sun_near_solstice() {
        let eph = MeeusEphemeris::new(jst());
        let (lat, lon) = tokyo();
        // 12:00 JST on the June solstice: high sun, roughly due south
        let at = Utc.with_ymd_and_hms(2025, 6, 21, 3, 0, 0).unwrap();
        let sun = eph.sun_position(at, lat, lon).unwrap();
        assert!(sun.altitude > 74.0 && sun.altitude < 80.0, "alt {}", sun.altitude);
        assert!(sun.azimuth > 150.0 && sun.azimuth < 230.0, "az {}", sun.azimuth);
    }

    #[test]
    fn test_midnight_sun_below_horizon() {
        let eph = MeeusEphemeris::new(jst());
        let (lat, lon) = tokyo();
        let at = Utc.with_ymd_and_hms(2025, 6, 21, 15, 0, 0).unwrap();
        let sun = eph.sun_position(at, lat, lon).unwrap();
        assert!(sun.altitude < -20.0);
    }

    #[test]
    fn test_moon_position_is_sane() {
        let eph = MeeusEphemeris::new(jst());
        let (lat, lon) = tokyo();
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let moon = eph.moon_position(at, lat, lon).unwrap();
        assert!(moon.distance_km > 356_000.0 && moon.distance_km < 407_000.0);
        assert!((0.0..=1.0).contains(&moon.illumination));
        assert!((0.0..360.0).contains(&moon.phase));
        // 2025-03-14 is a full moon; elongation near 180
        assert!(moon.illumination > 0.97, "illumination {}", moon.illumination);
    }

    #[test]
    fn test_sunrise_lands_in_the_morning() {
        let eph = MeeusEphemeris::new(jst());
        let (lat, lon) = tokyo();
        let near = Utc.with_ymd_and_hms(2025, 7, 6, 18, 0, 0).unwrap();
        let rise = eph
            .rise_set(Body::Sun, near, lat, lon, RiseSetDirection::Rising, 1)
            .unwrap()
            .expect("the sun rises over Tokyo");
        let local = rise.with_timezone(&jst());
        let hour = chrono::Timelike::hour(&local);
        assert!((3..=6).contains(&hour), "sunrise hour {hour}");
    }

    #[test]
    fn test_illumination_formula_shape() {
        assert_eq!(illumination_for_phase(0.0), 0.0);
        assert_eq!(illumination_for_phase(180.0), 1.0);
        assert_eq!(illumination_for_phase(360.0 - 36.0), 0.2);
    }
}
