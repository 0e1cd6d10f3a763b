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

//! Public read API over the event cache: monthly grid, per-day lookup with
//! an on-demand fallback, upcoming list, per-site year, and counts. Also the
//! ad-hoc map search that drives the same solver from an arbitrary point.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::ephemeris::{Body, Ephemeris};
use crate::error::{Error, Result};
use crate::geometry::{
    azimuth_to_apex, destination_point, distance_for_apex_altitude, distance_to_apex,
    elevation_to_apex, Apex, GroundPoint,
};
use crate::models::{Event, EventType, Site, SiteStatus};
use crate::repo::{EventRepository, SiteRepository};
use crate::season::{diamond_month_rank, Season};
use crate::solver::{AlignmentSolver, Scene, SearchMode};
use crate::utils::constrain_360;

/// Sampling step for the inverse-geometry fallback, minutes.
const FALLBACK_SAMPLE_MINUTES: i64 = 20;

/// Candidate observer points beyond this are discarded, meters.
const FALLBACK_MAX_DISTANCE_M: f64 = 400_000.0;

/// Coordinate rounding used to merge nearby synthetic sites (3 decimals,
/// roughly 110 m).
const MERGE_GRID: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DominantType {
    Diamond,
    Pearl,
    Mixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub dominant: Option<DominantType>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCalendar {
    pub year: i32,
    pub month: u32,
    pub season: Season,
    pub diamond_rank: u8,
    pub events: Vec<CalendarCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarStats {
    pub year: i32,
    pub total_events: usize,
    pub diamond_events: usize,
    pub pearl_events: usize,
    pub active_locations: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSearchOutcome {
    pub events: Vec<Event>,
    pub step_seconds: i64,
    pub azimuth_tolerance: f64,
    pub elevation_tolerance: f64,
    pub days_scanned: i64,
    pub elapsed_ms: u128,
}

pub struct CalendarService {
    events: Arc<dyn EventRepository>,
    sites: Arc<dyn SiteRepository>,
    solver: Arc<AlignmentSolver>,
    ephemeris: Arc<dyn Ephemeris>,
    apex: Apex,
    timezone: FixedOffset,
    skip_direct_calculation: bool,
}

impl CalendarService {
    pub fn new(
        events: Arc<dyn EventRepository>,
        sites: Arc<dyn SiteRepository>,
        solver: Arc<AlignmentSolver>,
        ephemeris: Arc<dyn Ephemeris>,
        apex: Apex,
        timezone: FixedOffset,
        skip_direct_calculation: bool,
    ) -> Self {
        CalendarService {
            events,
            sites,
            solver,
            ephemeris,
            apex,
            timezone,
            skip_direct_calculation,
        }
    }

    /// 42-cell display grid: the Sunday on or before the 1st through six
    /// full weeks.
    pub fn monthly_calendar(&self, year: i32, month: u32) -> Result<MonthlyCalendar> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::Validation(format!("bad month {year}-{month}")))?;
        let start = first - Duration::days(first.weekday().num_days_from_sunday() as i64);
        let end = start + Duration::days(41);

        let mut by_date: HashMap<NaiveDate, Vec<Event>> = HashMap::new();
        for event in self.events.by_date_range(start, end)? {
            by_date.entry(event.event_date).or_default().push(event);
        }

        let mut cells = Vec::with_capacity(42);
        for offset in 0..42 {
            let date = start + Duration::days(offset);
            let mut events = by_date.remove(&date).unwrap_or_default();
            events.sort_by_key(|e| e.event_time);
            cells.push(CalendarCell {
                date,
                dominant: dominant_type(&events),
                events,
            });
        }

        Ok(MonthlyCalendar {
            year,
            month,
            season: Season::for_month(month),
            diamond_rank: diamond_month_rank(month),
            events: cells,
        })
    }

    /// Cached events for a day; on a cache miss, falls back to an on-demand
    /// solve over synthetic observer points derived from the day's Sun and
    /// Moon tracks (unless direct calculation is disabled).
    pub fn day_events(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let cached = self.events.by_date(date)?;
        if !cached.is_empty() || self.skip_direct_calculation {
            return Ok(cached);
        }
        log::info!("no cached events for {date}, running dynamic day search");
        self.dynamic_day_search(date)
    }

    pub fn upcoming_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.events.upcoming(Utc::now(), limit)
    }

    pub fn site_yearly_events(&self, site_id: i64, year: i32) -> Result<Vec<Event>> {
        self.events.for_site_year(site_id, year)
    }

    pub fn stats(&self, year: i32) -> Result<CalendarStats> {
        let events = self.events.for_year(year)?;
        let diamond = events.iter().filter(|e| e.event_type.is_diamond()).count();
        let sites: HashSet<i64> = events.iter().map(|e| e.site_id).collect();
        Ok(CalendarStats {
            year,
            total_events: events.len(),
            diamond_events: diamond,
            pearl_events: events.len() - diamond,
            active_locations: sites.len(),
        })
    }

    /// Ad-hoc search from a map point over a date range.
    pub fn map_search(
        &self,
        latitude: f64,
        longitude: f64,
        elevation: f64,
        scene: Scene,
        mode: SearchMode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MapSearchOutcome> {
        if end < start {
            return Err(Error::Validation("end date before start date".into()));
        }
        let started = Instant::now();
        let days = (end - start).num_days() + 1;
        let params = self.solver.params_for_search(mode, days);
        let site = self.synthetic_site(latitude, longitude, elevation)?;

        let mut events = Vec::new();
        let mut date = start;
        while date <= end {
            match self.solver.find_events_for_date(&site, date, &params, scene) {
                Ok(found) => events.extend(found),
                Err(err) => {
                    log::error!("map search {date}: {err}");
                }
            }
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
        events.sort_by_key(|e| e.event_time);

        Ok(MapSearchOutcome {
            events,
            step_seconds: params.step_seconds,
            azimuth_tolerance: params.azimuth_tolerance,
            elevation_tolerance: params.elevation_tolerance,
            days_scanned: days,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    fn synthetic_site(&self, latitude: f64, longitude: f64, elevation: f64) -> Result<Site> {
        let observer = GroundPoint {
            latitude,
            longitude,
            elevation_m: elevation,
        };
        let now = Utc::now();
        Ok(Site {
            id: 0,
            name: "map point".to_string(),
            prefecture: String::new(),
            latitude,
            longitude,
            elevation,
            azimuth_to_apex: azimuth_to_apex(&observer, &self.apex),
            elevation_to_apex: elevation_to_apex(&observer, &self.apex)?,
            distance_to_apex: distance_to_apex(&observer, &self.apex),
            access_notes: None,
            parking_notes: None,
            notes: None,
            status: SiteStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Invert the geometry: for each sampled body position, find the ground
    /// point from which the body would sit exactly on the apex, then solve
    /// those points like ordinary sites and keep the best result per
    /// (location, type).
    fn dynamic_day_search(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let params = self.solver.params_from_settings();
        let day_start = self.local_day_start(date);

        let mut seen_points: HashSet<(i64, i64)> = HashSet::new();
        let mut merged: HashMap<(i64, i64, EventType), Event> = HashMap::new();

        let samples = 24 * 60 / FALLBACK_SAMPLE_MINUTES;
        for body in [Body::Sun, Body::Moon] {
            let scene = match body {
                Body::Sun => Scene::Diamond,
                Body::Moon => Scene::Pearl,
            };
            for step in 0..samples {
                let at = day_start + Duration::minutes(step * FALLBACK_SAMPLE_MINUTES);
                let Some((azimuth, altitude)) = self.body_direction(body, at) else {
                    continue;
                };
                // too low bounds the distance out past usefulness, too high
                // means the body is far above any apex sight line
                if !(0.3..=65.0).contains(&altitude) {
                    continue;
                }
                let Some(distance) = distance_for_apex_altitude(&self.apex, altitude, 0.0) else {
                    continue;
                };
                if distance > FALLBACK_MAX_DISTANCE_M {
                    continue;
                }
                let back_bearing = constrain_360(azimuth + 180.0);
                let (lat, lon) =
                    destination_point(self.apex.latitude, self.apex.longitude, back_bearing, distance);
                let key = ((lat * MERGE_GRID).round() as i64, (lon * MERGE_GRID).round() as i64);
                if !seen_points.insert((key.0, key.1)) {
                    continue;
                }

                let Ok(site) = self.synthetic_site(lat, lon, 0.0) else {
                    continue;
                };
                match self.solver.find_events_for_date(&site, date, &params, scene) {
                    Ok(found) => {
                        for event in found {
                            let merge_key = (key.0, key.1, event.event_type);
                            match merged.get(&merge_key) {
                                Some(existing) if existing.quality_score >= event.quality_score => {}
                                _ => {
                                    merged.insert(merge_key, event);
                                }
                            }
                        }
                    }
                    Err(err) => log::debug!("dynamic search point {lat:.3},{lon:.3}: {err}"),
                }
            }
        }

        let mut events: Vec<Event> = merged.into_values().collect();
        events.sort_by_key(|e| e.event_time);
        log::info!("dynamic day search for {date}: {} events from {} points", events.len(), seen_points.len());
        Ok(events)
    }

    fn body_direction(&self, body: Body, at: DateTime<Utc>) -> Option<(f64, f64)> {
        match body {
            Body::Sun => self
                .ephemeris
                .sun_position(at, self.apex.latitude, self.apex.longitude)
                .ok()
                .map(|p| (p.azimuth, p.altitude)),
            Body::Moon => self
                .ephemeris
                .moon_position(at, self.apex.latitude, self.apex.longitude)
                .ok()
                .map(|p| (p.azimuth, p.altitude)),
        }
    }

    fn local_day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight exists");
        match self.timezone.from_local_datetime(&midnight).single() {
            Some(local) => local.with_timezone(&Utc),
            None => DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc),
        }
    }
}

fn dominant_type(events: &[Event]) -> Option<DominantType> {
    if events.is_empty() {
        return None;
    }
    let diamonds = events.iter().filter(|e| e.event_type.is_diamond()).count();
    Some(if diamonds == events.len() {
        DominantType::Diamond
    } else if diamonds == 0 {
        DominantType::Pearl
    } else {
        DominantType::Mixed
    })
}
