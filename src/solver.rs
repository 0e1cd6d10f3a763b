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

//! Alignment search: sweeps Sun and Moon tracks against a site's apex
//! bearing and picks the best candidate per altitude band.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::application::settings::SettingsStore;
use crate::ephemeris::{Body, Ephemeris, RiseSetDirection};
use crate::error::{Error, Result};
use crate::geometry::azimuth_difference;
use crate::models::{Accuracy, Event, EventType, Site};

/// Body altitude below which an instant is not worth considering.
const VISIBILITY_FLOOR: f64 = -6.0;

/// Admissible altitude ceiling per body, degrees.
const SUN_MAX_ALTITUDE: f64 = 35.0;
const MOON_MAX_ALTITUDE: f64 = 65.0;

/// Hard ceiling for a single site-and-day sweep.
const SWEEP_TIME_CEILING: StdDuration = StdDuration::from_secs(600);

/// Half-width of the window around the moon's rise or set, hours.
const PEARL_WINDOW_HOURS: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scene {
    All,
    Diamond,
    Pearl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Auto,
    Fast,
    Balanced,
    Precise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionMode {
    High,
    Medium,
    Low,
}

/// Resolved sweep parameters: step plus matching tolerances.
#[derive(Debug, Clone, Copy)]
pub struct SolverParams {
    pub step_seconds: i64,
    pub azimuth_tolerance: f64,
    pub elevation_tolerance: f64,
}

impl SolverParams {
    pub fn from_mode(mode: PrecisionMode) -> SolverParams {
        match mode {
            PrecisionMode::High => SolverParams {
                step_seconds: 30,
                azimuth_tolerance: 1.0,
                elevation_tolerance: 0.5,
            },
            PrecisionMode::Medium => SolverParams {
                step_seconds: 60,
                azimuth_tolerance: 2.0,
                elevation_tolerance: 1.0,
            },
            PrecisionMode::Low => SolverParams {
                step_seconds: 120,
                azimuth_tolerance: 3.0,
                elevation_tolerance: 2.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RiseSetClass {
    Rising,
    Setting,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    at: DateTime<Utc>,
    azimuth: f64,
    altitude: f64,
    azimuth_diff: f64,
    elevation_diff: f64,
    moon_phase: Option<f64>,
    moon_illumination: Option<f64>,
}

impl Candidate {
    fn total_score(&self) -> f64 {
        // vertical misses matter more: the apex is a fixed height
        self.azimuth_diff + 2.0 * self.elevation_diff
    }
}

pub struct AlignmentSolver {
    ephemeris: Arc<dyn Ephemeris>,
    timezone: FixedOffset,
    settings: Arc<SettingsStore>,
}

impl AlignmentSolver {
    pub fn new(
        ephemeris: Arc<dyn Ephemeris>,
        timezone: FixedOffset,
        settings: Arc<SettingsStore>,
    ) -> Self {
        AlignmentSolver {
            ephemeris,
            timezone,
            settings,
        }
    }

    /// Sweep parameters from the settings store (cache generation path).
    pub fn params_from_settings(&self) -> SolverParams {
        SolverParams {
            step_seconds: self.settings.number("search_interval", 60.0) as i64,
            azimuth_tolerance: self.settings.number("azimuth_tolerance", 2.0),
            elevation_tolerance: self.settings.number("elevation_tolerance", 1.0),
        }
    }

    /// Sweep parameters for an ad-hoc map search. `auto` picks the step from
    /// the requested range length.
    pub fn params_for_search(&self, mode: SearchMode, range_days: i64) -> SolverParams {
        match mode {
            SearchMode::Fast => SolverParams::from_mode(PrecisionMode::Low),
            SearchMode::Balanced => SolverParams::from_mode(PrecisionMode::Medium),
            SearchMode::Precise => SolverParams::from_mode(PrecisionMode::High),
            SearchMode::Auto => {
                let mut params = if range_days > 730 {
                    SolverParams::from_mode(PrecisionMode::Low)
                } else {
                    SolverParams::from_mode(PrecisionMode::Medium)
                };
                params.step_seconds = if range_days <= 180 {
                    30
                } else if range_days <= 730 {
                    120
                } else {
                    300
                };
                params
            }
        }
    }

    /// All alignment events for one site on one calendar day.
    ///
    /// Failures are local: an instant the ephemeris cannot answer is skipped;
    /// a site whose stored geometry is not finite fails the whole call.
    pub fn find_events_for_date(
        &self,
        site: &Site,
        date: NaiveDate,
        params: &SolverParams,
        scene: Scene,
    ) -> Result<Vec<Event>> {
        if !site.azimuth_to_apex.is_finite() || !site.elevation_to_apex.is_finite() {
            return Err(Error::InvalidGeometry(format!(
                "site {} has non-finite apex geometry",
                site.id
            )));
        }

        let started = Instant::now();
        let mut events = Vec::new();
        if scene != Scene::Pearl {
            events.extend(self.solve_diamond(site, date, params, started)?);
        }
        if scene != Scene::Diamond {
            events.extend(self.solve_pearl(site, date, params, started)?);
        }
        events.sort_by_key(|e| e.event_time);
        Ok(events)
    }

    fn local_day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight exists");
        match self.timezone.from_local_datetime(&midnight).single() {
            Some(local) => local.with_timezone(&Utc),
            None => DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc),
        }
    }

    fn solve_diamond(
        &self,
        site: &Site,
        date: NaiveDate,
        params: &SolverParams,
        started: Instant,
    ) -> Result<Vec<Event>> {
        // high-rise alignments can happen at any sun altitude, so the whole
        // local day is swept
        let start = self.local_day_start(date);
        let end = start + Duration::days(1);
        let candidates = self.sweep(Body::Sun, site, start, end, params, started);

        // the sun's class follows from which side the apex sits on
        let class = if site.azimuth_to_apex < 180.0 {
            RiseSetClass::Rising
        } else {
            RiseSetClass::Setting
        };
        let event_type = match class {
            RiseSetClass::Rising => EventType::DiamondSunrise,
            RiseSetClass::Setting => EventType::DiamondSunset,
        };

        Ok(self.select_events(site, date, candidates, SUN_MAX_ALTITUDE, params, |_| {
            (class, event_type)
        }))
    }

    fn solve_pearl(
        &self,
        site: &Site,
        date: NaiveDate,
        params: &SolverParams,
        started: Instant,
    ) -> Result<Vec<Event>> {
        let day_start = self.local_day_start(date);
        let half_day = Duration::hours(12);
        let window = Duration::hours(PEARL_WINDOW_HOURS);

        let rise_window = match self.ephemeris.rise_set(
            Body::Moon,
            day_start,
            site.latitude,
            site.longitude,
            RiseSetDirection::Rising,
            1,
        ) {
            Ok(Some(rise)) => (rise - window, rise + window),
            _ => (day_start, day_start + half_day),
        };
        let set_window = match self.ephemeris.rise_set(
            Body::Moon,
            day_start,
            site.latitude,
            site.longitude,
            RiseSetDirection::Setting,
            1,
        ) {
            Ok(Some(set)) => (set - window, set + window),
            _ => (day_start + half_day, day_start + half_day * 2),
        };

        let min_illumination = self.settings.number("pearl_min_illumination", 0.1);
        let mut candidates = self.sweep(Body::Moon, site, rise_window.0, rise_window.1, params, started);
        candidates.extend(self.sweep(Body::Moon, site, set_window.0, set_window.1, params, started));
        candidates.retain(|c| c.moon_illumination.unwrap_or(0.0) >= min_illumination);

        Ok(self.select_events(site, date, candidates, MOON_MAX_ALTITUDE, params, |c| {
            let class = self.classify_moon_candidate(site, c);
            let event_type = match class {
                RiseSetClass::Rising => EventType::PearlRising,
                RiseSetClass::Setting => EventType::PearlSetting,
            };
            (class, event_type)
        }))
    }

    // Altitude delta across +/-10 minutes is primary; the apex bearing is the
    // fallback when a probe fails.
    fn classify_moon_candidate(&self, site: &Site, candidate: &Candidate) -> RiseSetClass {
        let probe = Duration::minutes(10);
        let before = self
            .ephemeris
            .moon_position(candidate.at - probe, site.latitude, site.longitude);
        let after = self
            .ephemeris
            .moon_position(candidate.at + probe, site.latitude, site.longitude);
        match (before, after) {
            (Ok(b), Ok(a)) => {
                if a.altitude >= b.altitude {
                    RiseSetClass::Rising
                } else {
                    RiseSetClass::Setting
                }
            }
            _ => {
                if site.azimuth_to_apex < 180.0 {
                    RiseSetClass::Rising
                } else {
                    RiseSetClass::Setting
                }
            }
        }
    }

    fn sweep(
        &self,
        body: Body,
        site: &Site,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        params: &SolverParams,
        started: Instant,
    ) -> Vec<Candidate> {
        let max_altitude = match body {
            Body::Sun => SUN_MAX_ALTITUDE,
            Body::Moon => MOON_MAX_ALTITUDE,
        };
        let step = Duration::seconds(params.step_seconds.max(1));

        let mut candidates = Vec::new();
        let mut skipped = 0u32;
        let mut at = start;
        while at < end {
            if started.elapsed() > SWEEP_TIME_CEILING {
                log::warn!(
                    "sweep ceiling exceeded for site {} near {}, aborting the rest of the window",
                    site.id,
                    at
                );
                break;
            }

            let position = match body {
                Body::Sun => self
                    .ephemeris
                    .sun_position(at, site.latitude, site.longitude)
                    .map(|p| (p.azimuth, p.altitude, None)),
                Body::Moon => self
                    .ephemeris
                    .moon_position(at, site.latitude, site.longitude)
                    .map(|p| (p.azimuth, p.altitude, Some((p.phase, p.illumination)))),
            };
            let (azimuth, altitude, moon) = match position {
                Ok(p) => p,
                Err(_) => {
                    skipped += 1;
                    at += step;
                    continue;
                }
            };

            if altitude > VISIBILITY_FLOOR {
                let azimuth_diff = azimuth_difference(azimuth, site.azimuth_to_apex);
                let elevation_diff = if altitude < 0.0 {
                    -altitude
                } else if altitude > max_altitude {
                    altitude - max_altitude
                } else {
                    0.0
                };
                if azimuth_diff <= params.azimuth_tolerance
                    && elevation_diff <= params.elevation_tolerance
                {
                    candidates.push(Candidate {
                        at,
                        azimuth,
                        altitude,
                        azimuth_diff,
                        elevation_diff,
                        moon_phase: moon.map(|m| m.0),
                        moon_illumination: moon.map(|m| m.1),
                    });
                }
            }
            at += step;
        }

        if skipped > 0 {
            log::debug!("site {}: {} instants without an ephemeris answer", site.id, skipped);
        }
        candidates
    }

    fn select_events<F>(
        &self,
        site: &Site,
        date: NaiveDate,
        candidates: Vec<Candidate>,
        max_altitude: f64,
        params: &SolverParams,
        classify: F,
    ) -> Vec<Event>
    where
        F: Fn(&Candidate) -> (RiseSetClass, EventType),
    {
        let mut best: HashMap<(i32, RiseSetClass), (Candidate, EventType)> = HashMap::new();
        for candidate in candidates {
            let band = ((candidate.altitude / 5.0).floor() * 5.0).min(max_altitude) as i32;
            let (class, event_type) = classify(&candidate);
            match best.entry((band, class)) {
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert((candidate, event_type));
                }
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    if candidate.total_score() < entry.get().0.total_score() {
                        entry.insert((candidate, event_type));
                    }
                }
            }
        }

        let mut events: Vec<Event> = best
            .into_values()
            .map(|(c, event_type)| self.emit(site, date, c, event_type, params))
            .collect();
        events.sort_by_key(|e| e.event_time);
        events
    }

    fn emit(
        &self,
        site: &Site,
        date: NaiveDate,
        candidate: Candidate,
        event_type: EventType,
        params: &SolverParams,
    ) -> Event {
        let azimuth_accuracy = self.accuracy_for(candidate.azimuth_diff, "accuracy");
        let elevation_accuracy = self.accuracy_for(candidate.elevation_diff, "elevation_accuracy");

        Event {
            id: 0,
            site_id: site.id,
            event_date: candidate.at.with_timezone(&self.timezone).date_naive(),
            event_time: candidate.at,
            event_type,
            celestial_azimuth: candidate.azimuth,
            altitude: candidate.altitude,
            apex_elevation: site.elevation_to_apex,
            quality_score: quality_score(
                candidate.azimuth_diff,
                params.azimuth_tolerance,
                candidate.altitude,
            ),
            accuracy: azimuth_accuracy.max(elevation_accuracy),
            moon_phase: candidate.moon_phase,
            moon_illumination: candidate.moon_illumination,
            calculation_year: date.year(),
        }
    }

    fn accuracy_for(&self, diff: f64, prefix: &str) -> Accuracy {
        let perfect = self.settings.number(&format!("{prefix}_perfect_threshold"), 0.1);
        let excellent = self.settings.number(&format!("{prefix}_excellent_threshold"), 0.25);
        let good = self.settings.number(&format!("{prefix}_good_threshold"), 0.4);
        if diff <= perfect {
            Accuracy::Perfect
        } else if diff <= excellent {
            Accuracy::Excellent
        } else if diff <= good {
            Accuracy::Good
        } else {
            Accuracy::Fair
        }
    }
}

/// 0-100 score: 50 points for azimuth centering, up to 30 for clearing the
/// horizon, up to 20 for absolute altitude.
fn quality_score(azimuth_diff: f64, azimuth_tolerance: f64, altitude: f64) -> u8 {
    let centering = (50.0 - 50.0 * azimuth_diff / azimuth_tolerance).max(0.0);
    let horizon_clearance = ((altitude + 2.0).max(0.0) * 15.0).min(30.0);
    let height_bonus = (altitude.max(0.0) * 2.0).min(20.0);
    (centering + horizon_clearance + height_bonus).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::ephemeris::{FixedEphemeris, LinearTrack};
    use crate::models::SiteStatus;
    use crate::repo::memory::MemorySettingRepository;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3_600).unwrap()
    }

    fn settings() -> Arc<SettingsStore> {
        Arc::new(SettingsStore::new(
            Arc::new(MemorySettingRepository::default()),
            StdDuration::from_secs(60),
        ))
    }

    fn site(bearing: f64) -> Site {
        Site {
            id: 7,
            name: "test ridge".into(),
            prefecture: "Kanagawa".into(),
            latitude: 35.3,
            longitude: 139.4,
            elevation: 40.0,
            azimuth_to_apex: bearing,
            elevation_to_apex: 0.6,
            distance_to_apex: 52_000.0,
            access_notes: None,
            parking_notes: None,
            notes: None,
            status: SiteStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn flat_track(azimuth: f64, altitude: f64) -> LinearTrack {
        LinearTrack {
            azimuth_start: azimuth,
            azimuth_rate: 0.0,
            altitude_start: altitude,
            altitude_rate: 0.0,
        }
    }

    /// Epoch aligned with the JST start of 2025-01-15.
    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 14, 15, 0, 0).unwrap()
    }

    fn fixed(sun: LinearTrack, moon: LinearTrack, illumination: f64) -> Arc<FixedEphemeris> {
        Arc::new(FixedEphemeris {
            epoch: epoch(),
            sun,
            moon,
            moon_distance_km: 384_400.0,
            moon_phase: 120.0,
            moon_illumination: illumination,
            moon_rise: Some(epoch() + Duration::hours(6)),
            moon_set: Some(epoch() + Duration::hours(18)),
        })
    }

    fn solver(eph: Arc<FixedEphemeris>) -> AlignmentSolver {
        AlignmentSolver::new(eph, jst(), settings())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_diamond_event_at_azimuth_crossing() {
        // the sun crosses the apex bearing (100) 20 minutes in, at altitude 10
        let sun = LinearTrack {
            azimuth_start: 95.0,
            azimuth_rate: 0.25,
            altitude_start: 10.0,
            altitude_rate: 0.0,
        };
        let s = solver(fixed(sun, flat_track(300.0, -30.0), 0.5));
        let params = SolverParams::from_mode(PrecisionMode::Medium);
        let events = s
            .find_events_for_date(&site(100.0), date(), &params, Scene::Diamond)
            .unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type, EventType::DiamondSunrise);
        assert_eq!(event.event_time, epoch() + Duration::minutes(20));
        assert_eq!(event.accuracy, Accuracy::Perfect);
        assert_eq!(event.quality_score, 100);
        assert!(event.moon_phase.is_none());
        assert_eq!(event.calculation_year, 2025);
    }

    #[test]
    fn test_bearing_west_labels_sunset() {
        let sun = LinearTrack {
            azimuth_start: 245.0,
            azimuth_rate: 0.25,
            altitude_start: 3.0,
            altitude_rate: 0.0,
        };
        let s = solver(fixed(sun, flat_track(10.0, -30.0), 0.5));
        let params = SolverParams::from_mode(PrecisionMode::Medium);
        let events = s
            .find_events_for_date(&site(250.0), date(), &params, Scene::Diamond)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::DiamondSunset);
    }

    #[test]
    fn test_sun_above_band_is_rejected() {
        // aligned in azimuth the whole day but 5 degrees above the 35 cap
        let s = solver(fixed(flat_track(100.0, 40.0), flat_track(10.0, -30.0), 0.5));
        let params = SolverParams::from_mode(PrecisionMode::Medium);
        let events = s
            .find_events_for_date(&site(100.0), date(), &params, Scene::Diamond)
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_slightly_negative_altitude_within_tolerance() {
        let s = solver(fixed(flat_track(100.0, -0.4), flat_track(10.0, -30.0), 0.5));
        let params = SolverParams::from_mode(PrecisionMode::Medium);
        let events = s
            .find_events_for_date(&site(100.0), date(), &params, Scene::Diamond)
            .unwrap();
        assert_eq!(events.len(), 1);
        // quality loses the height bonus below the horizon
        assert!(events[0].quality_score < 100);
    }

    #[test]
    fn test_coarser_step_never_finds_more_events() {
        // the sun climbs through several altitude bands while staying near
        // the apex bearing, so each band contributes a group
        let sun = LinearTrack {
            azimuth_start: 100.0,
            azimuth_rate: 0.001,
            altitude_start: 0.5,
            altitude_rate: 0.04,
        };
        let s = solver(fixed(sun, flat_track(10.0, -30.0), 0.5));

        let fine = SolverParams {
            step_seconds: 60,
            azimuth_tolerance: 2.0,
            elevation_tolerance: 1.0,
        };
        let coarse = SolverParams {
            step_seconds: 300,
            ..fine
        };
        let fine_events = s
            .find_events_for_date(&site(100.0), date(), &fine, Scene::Diamond)
            .unwrap();
        let coarse_events = s
            .find_events_for_date(&site(100.0), date(), &coarse, Scene::Diamond)
            .unwrap();
        assert!(!fine_events.is_empty());
        assert!(coarse_events.len() <= fine_events.len());
    }

    #[test]
    fn test_pearl_rising_classified_by_altitude_delta() {
        // moon climbing through the bearing: must label pearl-rising even
        // though the bearing (250) would suggest a setting-side site
        let moon = LinearTrack {
            azimuth_start: 245.0,
            azimuth_rate: 0.01,
            altitude_start: -40.0,
            altitude_rate: 0.12,
        };
        let s = solver(fixed(flat_track(10.0, -30.0), moon, 0.8));
        let params = SolverParams::from_mode(PrecisionMode::Medium);
        let events = s
            .find_events_for_date(&site(250.0), date(), &params, Scene::Pearl)
            .unwrap();
        assert!(!events.is_empty());
        for event in &events {
            assert_eq!(event.event_type, EventType::PearlRising);
            assert_eq!(event.moon_illumination, Some(0.8));
            assert_eq!(event.moon_phase, Some(120.0));
        }
    }

    #[test]
    fn test_dim_moon_is_vetoed() {
        let moon = LinearTrack {
            azimuth_start: 245.0,
            azimuth_rate: 0.01,
            altitude_start: -40.0,
            altitude_rate: 0.12,
        };
        let s = solver(fixed(flat_track(10.0, -30.0), moon, 0.05));
        let params = SolverParams::from_mode(PrecisionMode::Medium);
        let events = s
            .find_events_for_date(&site(250.0), date(), &params, Scene::Pearl)
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_non_finite_geometry_fails_the_day() {
        let s = solver(fixed(flat_track(100.0, 10.0), flat_track(10.0, -30.0), 0.5));
        let params = SolverParams::from_mode(PrecisionMode::Medium);
        let mut bad = site(100.0);
        bad.elevation_to_apex = f64::NAN;
        let result = s.find_events_for_date(&bad, date(), &params, Scene::All);
        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_auto_search_steps() {
        let s = solver(fixed(flat_track(0.0, 0.0), flat_track(0.0, 0.0), 0.5));
        assert_eq!(s.params_for_search(SearchMode::Auto, 30).step_seconds, 30);
        assert_eq!(s.params_for_search(SearchMode::Auto, 365).step_seconds, 120);
        assert_eq!(s.params_for_search(SearchMode::Auto, 1000).step_seconds, 300);
        assert_eq!(s.params_for_search(SearchMode::Precise, 30).azimuth_tolerance, 1.0);
    }

    #[test]
    fn test_quality_score_bounds() {
        assert_eq!(quality_score(0.0, 2.0, 10.0), 100);
        assert_eq!(quality_score(2.0, 2.0, -2.0), 0);
        for (diff, alt) in [(0.3, 1.0), (1.9, 0.2), (0.0, -1.5)] {
            let q = quality_score(diff, 2.0, alt);
            assert!(q <= 100);
        }
    }
}
