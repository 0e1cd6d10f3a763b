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

pub fn sind(v: f64) -> f64 {
    v.to_radians().sin()
}

pub fn cosd(v: f64) -> f64 {
    v.to_radians().cos()
}

pub fn tand(v: f64) -> f64 {
    v.to_radians().tan()
}

pub fn constrain_360(angle: f64) -> f64 {
    ((angle % 360.0) + 360.0) % 360.0
}

// Linear interpolation between two altitudes straddling a reference horizon.
// Only meaningful when alt_before and alt_after lie on opposite sides of the
// horizon; never-rise / never-set cases must be filtered out by the caller.
pub fn two_point_interpolation(
    jd_before: f64,
    jd_after: f64,
    alt_before: f64,
    alt_after: f64,
    horizon: f64,
) -> f64 {
    let slope = (alt_after - alt_before) / (jd_after - jd_before);
    jd_after - (alt_after - horizon) / slope
}

// Scan a (jd, altitude) grid for horizon crossings in the requested
// direction. Returns (jd_before, alt_before, jd_after, alt_after) per
// crossing, ready for two_point_interpolation.
pub fn cross_horizon(grid: &[(f64, f64)], horizon: f64, is_rising: bool) -> Vec<(f64, f64, f64, f64)> {
    let mut cross_points = Vec::new();
    for pair in grid.windows(2) {
        let (jd0, alt0) = pair[0];
        let (jd1, alt1) = pair[1];
        let crossed = if is_rising {
            alt0 < horizon && alt1 >= horizon
        } else {
            alt0 > horizon && alt1 <= horizon
        };
        if crossed {
            cross_points.push((jd0, alt0, jd1, alt1));
        }
    }
    cross_points
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_constrain_360() {
        assert_approx_eq!(constrain_360(370.0), 10.0, 1e-12);
        assert_approx_eq!(constrain_360(-10.0), 350.0, 1e-12);
        assert_approx_eq!(constrain_360(720.0), 0.0, 1e-12);
    }

    #[test]
    fn test_two_point_interpolation() {
        // altitude climbs from -1 to +1 over one hour; crosses zero halfway
        let t = two_point_interpolation(0.0, 1.0 / 24.0, -1.0, 1.0, 0.0);
        assert_approx_eq!(t, 0.5 / 24.0, 1e-9);
    }

    #[test]
    fn test_cross_horizon_directions() {
        let grid = [(0.0, -2.0), (1.0, 1.0), (2.0, 3.0), (3.0, -1.0)];
        let rises = cross_horizon(&grid, 0.0, true);
        let sets = cross_horizon(&grid, 0.0, false);
        assert_eq!(rises.len(), 1);
        assert_eq!(sets.len(), 1);
        assert_approx_eq!(rises[0].0, 0.0, 1e-12);
        assert_approx_eq!(sets[0].2, 3.0, 1e-12);
    }
}
