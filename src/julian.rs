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

//! Julian Date bookkeeping on top of chrono timestamps.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// JD of the Unix epoch, 1970-01-01T00:00:00Z.
pub const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// JD of the J2000.0 epoch, 2000-01-01T12:00:00 TT (treated as UTC here).
pub const JD_J2000: f64 = 2_451_545.0;

pub fn julian_day(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 / 86_400.0 + at.timestamp_subsec_millis() as f64 / 86_400_000.0
        + JD_UNIX_EPOCH
}

pub fn datetime_from_jd(jd: f64) -> DateTime<Utc> {
    let millis = ((jd - JD_UNIX_EPOCH) * 86_400_000.0).round() as i64;
    Utc.timestamp_millis_opt(0).unwrap() + Duration::milliseconds(millis)
}

/// Julian centuries since J2000.0.
pub fn j2000_century(jd: f64) -> f64 {
    (jd - JD_J2000) / 36_525.0
}

/// Greenwich mean sidereal time in degrees.
pub fn gst_degrees(jd: f64) -> f64 {
    let t = j2000_century(jd);
    let gst = 280.460_618_37 + 360.985_647_366_29 * (jd - JD_J2000) + 0.000_387_933 * t * t
        - (t * t * t) / 38_710_000.0;
    ((gst % 360.0) + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_julian_day_at_epochs() {
        let unix = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_approx_eq!(julian_day(unix), JD_UNIX_EPOCH, 1e-9);

        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert_approx_eq!(julian_day(j2000), JD_J2000, 1e-9);
    }

    #[test]
    fn test_jd_round_trip() {
        let at = Utc.with_ymd_and_hms(2025, 7, 4, 19, 21, 0).unwrap();
        let back = datetime_from_jd(julian_day(at));
        assert_eq!(at, back);
    }

    #[test]
    fn test_gst_at_j2000() {
        assert_approx_eq!(gst_degrees(JD_J2000), 280.460_618_37, 1e-9);
    }

    #[test]
    fn test_sidereal_advance() {
        // one civil day advances sidereal time by ~0.9856 degrees
        let d0 = gst_degrees(JD_J2000);
        let d1 = gst_degrees(JD_J2000 + 1.0);
        let advance = ((d1 - d0) % 360.0 + 360.0) % 360.0;
        assert_approx_eq!(advance, 0.985_647, 1e-4);
    }
}
