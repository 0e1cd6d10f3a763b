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

//! The HTTP contract as transport-agnostic handlers: typed requests in,
//! typed serializable responses out. Framing, sessions and rate limiting
//! belong to an external adapter; admin routes expect the adapter to have
//! authenticated the caller already.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::application::calendar::{CalendarStats, MapSearchOutcome, MonthlyCalendar};
use crate::application::registry::ServiceRegistry;
use crate::application::sites::ImportSummary;
use crate::error::{Error, Result};
use crate::models::{Event, Setting, SettingValue, Site, SitePayload};
use crate::queue::service::QueueStats;
use crate::queue::Priority;
use crate::solver::{Scene, SearchMode};

pub const MIN_YEAR: i32 = 2020;
pub const MAX_YEAR: i32 = 2030;
pub const MAX_UPCOMING_LIMIT: usize = 200;

fn validate_year(year: i32) -> Result<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "year {year} out of range [{MIN_YEAR}, {MAX_YEAR}]"
        )))
    }
}

fn validate_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(Error::Validation(format!("month {month} out of range [1, 12]")))
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("bad date {value}, expected YYYY-MM-DD")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
}

pub fn health() -> HealthResponse {
    HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationsResponse {
    pub success: bool,
    pub locations: Vec<Site>,
    pub count: usize,
}

pub fn list_locations(registry: &ServiceRegistry) -> Result<LocationsResponse> {
    let locations = registry.sites.list()?;
    Ok(LocationsResponse {
        success: true,
        count: locations.len(),
        locations,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub success: bool,
    pub location: Site,
}

pub fn get_location(registry: &ServiceRegistry, id: i64) -> Result<LocationResponse> {
    Ok(LocationResponse {
        success: true,
        location: registry.sites.get(id)?,
    })
}

pub fn create_location(registry: &ServiceRegistry, payload: SitePayload) -> Result<LocationResponse> {
    Ok(LocationResponse {
        success: true,
        location: registry.sites.create(payload)?,
    })
}

pub fn update_location(
    registry: &ServiceRegistry,
    id: i64,
    payload: SitePayload,
) -> Result<LocationResponse> {
    Ok(LocationResponse {
        success: true,
        location: registry.sites.update(id, payload)?,
    })
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub fn delete_location(registry: &ServiceRegistry, id: i64) -> Result<SuccessResponse> {
    registry.sites.delete(id)?;
    Ok(SuccessResponse { success: true })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: ImportSummary,
}

pub fn import_locations(
    registry: &ServiceRegistry,
    payloads: Vec<SitePayload>,
) -> Result<ImportResponse> {
    let summary = registry.sites.import(payloads)?;
    Ok(ImportResponse {
        success: summary.error_count == 0,
        summary,
    })
}

pub fn export_locations(registry: &ServiceRegistry) -> Result<Vec<SitePayload>> {
    registry.sites.export()
}

pub fn monthly_calendar(
    registry: &ServiceRegistry,
    year: i32,
    month: u32,
) -> Result<MonthlyCalendar> {
    validate_year(year)?;
    validate_month(month)?;
    registry.calendar.monthly_calendar(year, month)
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

pub fn day_events(registry: &ServiceRegistry, date: &str) -> Result<EventsResponse> {
    let date = parse_date(date)?;
    validate_year(date.year())?;
    Ok(EventsResponse {
        events: registry.calendar.day_events(date)?,
    })
}

pub fn upcoming_events(registry: &ServiceRegistry, limit: Option<usize>) -> Result<EventsResponse> {
    let limit = limit.unwrap_or(MAX_UPCOMING_LIMIT);
    if limit == 0 || limit > MAX_UPCOMING_LIMIT {
        return Err(Error::Validation(format!(
            "limit {limit} out of range [1, {MAX_UPCOMING_LIMIT}]"
        )));
    }
    Ok(EventsResponse {
        events: registry.calendar.upcoming_events(limit)?,
    })
}

pub fn site_yearly_events(
    registry: &ServiceRegistry,
    site_id: i64,
    year: i32,
) -> Result<EventsResponse> {
    validate_year(year)?;
    Ok(EventsResponse {
        events: registry.calendar.site_yearly_events(site_id, year)?,
    })
}

pub fn calendar_stats(registry: &ServiceRegistry, year: i32) -> Result<CalendarStats> {
    validate_year(year)?;
    registry.calendar.stats(year)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSearchRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
    pub scene: Scene,
    pub search_mode: SearchMode,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSearchParams {
    pub scene: Scene,
    pub search_mode: SearchMode,
    pub step_seconds: i64,
    pub azimuth_tolerance: f64,
    pub elevation_tolerance: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSearchMetadata {
    pub days_scanned: i64,
    pub elapsed_ms: u128,
    pub event_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSearchResponse {
    pub success: bool,
    pub events: Vec<Event>,
    pub search_params: MapSearchParams,
    pub metadata: MapSearchMetadata,
}

pub fn map_search(
    registry: &ServiceRegistry,
    request: MapSearchRequest,
) -> Result<MapSearchResponse> {
    if !(-90.0..=90.0).contains(&request.latitude) {
        return Err(Error::Validation(format!("latitude {} out of range", request.latitude)));
    }
    if !(-180.0..=180.0).contains(&request.longitude) {
        return Err(Error::Validation(format!(
            "longitude {} out of range",
            request.longitude
        )));
    }
    let start = parse_date(&request.start_date)?;
    let end = parse_date(&request.end_date)?;

    let MapSearchOutcome {
        events,
        step_seconds,
        azimuth_tolerance,
        elevation_tolerance,
        days_scanned,
        elapsed_ms,
    } = registry.calendar.map_search(
        request.latitude,
        request.longitude,
        request.elevation.unwrap_or(0.0),
        request.scene,
        request.search_mode,
        start,
        end,
    )?;

    Ok(MapSearchResponse {
        success: true,
        metadata: MapSearchMetadata {
            days_scanned,
            elapsed_ms,
            event_count: events.len(),
        },
        search_params: MapSearchParams {
            scene: request.scene,
            search_mode: request.search_mode,
            step_seconds,
            azimuth_tolerance,
            elevation_tolerance,
        },
        events,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatsResponse {
    pub success: bool,
    pub data: QueueStats,
}

pub fn queue_stats(registry: &ServiceRegistry) -> Result<QueueStatsResponse> {
    Ok(QueueStatsResponse {
        success: true,
        data: registry.queue.stats(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyRequest {
    pub concurrency: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyData {
    pub old_concurrency: usize,
    pub new_concurrency: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyResponse {
    pub success: bool,
    pub data: ConcurrencyData,
}

pub fn update_queue_concurrency(
    registry: &ServiceRegistry,
    request: ConcurrencyRequest,
) -> Result<ConcurrencyResponse> {
    let (old_concurrency, new_concurrency) = registry.queue.update_concurrency(request.concurrency)?;
    Ok(ConcurrencyResponse {
        success: true,
        data: ConcurrencyData {
            old_concurrency,
            new_concurrency,
        },
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearFailedResponse {
    pub success: bool,
    pub cleaned_count: usize,
}

pub fn clear_failed_jobs(registry: &ServiceRegistry) -> Result<ClearFailedResponse> {
    Ok(ClearFailedResponse {
        success: true,
        cleaned_count: registry.queue.clean_failed_jobs()?,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateRequest {
    pub location_id: i64,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default = "default_priority")]
    pub priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Normal
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateResponse {
    pub success: bool,
    pub job_id: String,
}

pub fn recalculate_location(
    registry: &ServiceRegistry,
    request: RecalculateRequest,
) -> Result<RecalculateResponse> {
    validate_year(request.start_year)?;
    validate_year(request.end_year)?;
    // the site must exist before work is queued for it
    registry.sites.get(request.location_id)?;
    let job_id = registry.queue.schedule_location_calculation(
        request.location_id,
        request.start_year,
        request.end_year,
        request.priority,
    )?;
    Ok(RecalculateResponse {
        success: true,
        job_id,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: Vec<Setting>,
}

pub fn list_settings(registry: &ServiceRegistry) -> Result<SettingsResponse> {
    Ok(SettingsResponse {
        success: true,
        settings: registry.settings.list()?,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingResponse {
    pub success: bool,
    pub setting: Setting,
}

pub fn get_setting(registry: &ServiceRegistry, key: &str) -> Result<SettingResponse> {
    let setting = registry
        .settings
        .get(key)?
        .ok_or(Error::NotFound("setting", 0))?;
    Ok(SettingResponse {
        success: true,
        setting,
    })
}

#[derive(Debug, Deserialize)]
pub struct SettingUpdateRequest {
    #[serde(flatten)]
    pub value: SettingValue,
}

pub fn put_setting(
    registry: &ServiceRegistry,
    key: &str,
    request: SettingUpdateRequest,
) -> Result<SettingResponse> {
    if let Some(existing) = registry.settings.get(key)? {
        if !existing.editable {
            return Err(Error::Validation(format!("setting {key} is not editable")));
        }
    }
    Ok(SettingResponse {
        success: true,
        setting: registry.settings.upsert(key, request.value)?,
    })
}

pub fn clear_settings_cache(registry: &ServiceRegistry) -> Result<SuccessResponse> {
    registry.settings.clear_cache();
    Ok(SuccessResponse { success: true })
}
