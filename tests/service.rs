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

//! Cross-component scenarios driven through the composition root and the
//! API handlers.

use assert_approx_eq::assert_approx_eq;
use chrono::{Datelike, Weekday};

use towerlight::application::api;
use towerlight::application::registry::ServiceRegistry;
use towerlight::config::AppConfig;
use towerlight::error::Error;
use towerlight::models::SitePayload;
use towerlight::queue::Priority;

fn payload(name: &str, latitude: f64, longitude: f64) -> SitePayload {
    SitePayload {
        id: None,
        name: name.to_string(),
        prefecture: "Kanagawa".to_string(),
        latitude,
        longitude,
        elevation: 10.0,
        azimuth_to_apex: None,
        elevation_to_apex: None,
        distance_to_apex: None,
        access_notes: None,
        parking_notes: None,
        notes: None,
        status: Default::default(),
    }
}

#[test]
fn bearing_and_distance_from_the_sagami_coast() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    let site = registry.sites.create(payload("coast", 35.0, 139.0)).unwrap();
    assert_approx_eq!(site.distance_to_apex, 107_890.0, 1_000.0);
    assert_approx_eq!(site.azimuth_to_apex, 48.8, 0.3);
    assert!(site.elevation_to_apex.is_finite());
}

#[test]
fn upsert_with_user_override_keeps_the_override() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    let mut body = payload("pier", 35.6, 139.7);
    body.azimuth_to_apex = Some(45.0);
    let created = api::create_location(&registry, body).unwrap().location;
    assert_eq!(created.azimuth_to_apex, 45.0);
    assert!(created.elevation_to_apex.is_finite());
    assert!(created.elevation_to_apex != 0.0);
}

#[test]
fn monthly_calendar_is_a_six_week_grid() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    let calendar = api::monthly_calendar(&registry, 2025, 7).unwrap();
    assert_eq!(calendar.events.len(), 42);

    let first = calendar.events.first().unwrap().date;
    let last = calendar.events.last().unwrap().date;
    assert_eq!(first.weekday(), Weekday::Sun);
    assert!(first <= chrono::NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    assert_eq!(last.weekday(), Weekday::Sat);
    assert!(last >= chrono::NaiveDate::from_ymd_opt(2025, 7, 31).unwrap());
}

#[test]
fn year_2019_is_rejected_2020_accepted() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    assert!(matches!(
        api::calendar_stats(&registry, 2019),
        Err(Error::Validation(_))
    ));
    assert!(api::calendar_stats(&registry, 2020).is_ok());
}

#[test]
fn monthly_scheduling_is_deduplicated() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    let a = registry
        .queue
        .schedule_monthly_calculation(2025, 7, vec![1, 2], Priority::Low)
        .unwrap();
    let b = registry
        .queue
        .schedule_monthly_calculation(2025, 7, vec![1, 2], Priority::Low)
        .unwrap();
    assert!(a.contains("monthly-2025-7"));
    assert_eq!(a, b);
    let stats = registry.queue.stats();
    assert_eq!(stats.broker.waiting + stats.broker.delayed, 1);
}

#[test]
fn concurrency_change_persists_the_setting() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    let response =
        api::update_queue_concurrency(&registry, api::ConcurrencyRequest { concurrency: 3 })
            .unwrap();
    assert_eq!(response.data.new_concurrency, 3);
    assert_eq!(registry.settings.number("worker_concurrency", 2.0), 3.0);

    let rejected = api::update_queue_concurrency(&registry, api::ConcurrencyRequest { concurrency: 11 });
    assert!(matches!(rejected, Err(Error::Validation(_))));
}

#[test]
fn degraded_mode_serves_reads_and_rejects_queue_writes() {
    let mut config = AppConfig::default();
    config.broker.disabled = true;
    config.skip_direct_calculation = true;
    let registry = ServiceRegistry::build(config).unwrap();
    registry.start().unwrap();

    // reads still answer from the (empty) cache
    let calendar = api::monthly_calendar(&registry, 2025, 7).unwrap();
    assert_eq!(calendar.events.len(), 42);
    assert!(api::day_events(&registry, "2025-07-15").unwrap().events.is_empty());

    // the write path names the queue as the problem
    let site = registry.sites.create(payload("pier", 35.6, 139.7)).unwrap();
    let result = api::recalculate_location(
        &registry,
        api::RecalculateRequest {
            location_id: site.id,
            start_year: 2025,
            end_year: 2025,
            priority: Priority::Normal,
        },
    );
    assert!(matches!(result, Err(Error::QueueDisabled)));
    assert!(!api::queue_stats(&registry).unwrap().data.enabled);
    registry.shutdown();
}

#[test]
fn export_wipe_import_round_trips_sites() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    registry.sites.create(payload("coast", 35.0, 139.0)).unwrap();
    let mut pinned = payload("pier", 35.6, 139.7);
    pinned.azimuth_to_apex = Some(45.0);
    registry.sites.create(pinned).unwrap();

    let exported = api::export_locations(&registry).unwrap();
    for site in registry.sites.list().unwrap() {
        registry.sites.delete(site.id).unwrap();
    }
    assert!(registry.sites.list().unwrap().is_empty());

    let stripped: Vec<SitePayload> = exported
        .into_iter()
        .map(|mut p| {
            p.id = None;
            p
        })
        .collect();
    let response = api::import_locations(&registry, stripped).unwrap();
    assert!(response.success);
    assert_eq!(response.summary.created_count, 2);

    let restored = registry.sites.list().unwrap();
    assert_eq!(restored.len(), 2);
    let pier = restored.iter().find(|s| s.name == "pier").unwrap();
    assert_eq!(pier.azimuth_to_apex, 45.0);
    let coast = restored.iter().find(|s| s.name == "coast").unwrap();
    assert_approx_eq!(coast.azimuth_to_apex, 48.8, 0.3);
}

#[test]
fn day_cache_regeneration_is_idempotent() {
    let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
    let site = registry.sites.create(payload("pier", 35.45, 139.3)).unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();

    let first = registry
        .event_service
        .generate_location_day_cache(site.id, date)
        .unwrap();
    let snapshot: Vec<_> = registry
        .event_repo
        .by_date(date)
        .unwrap()
        .iter()
        .map(|e| (e.event_time, e.event_type, e.quality_score, e.accuracy))
        .collect();

    let second = registry
        .event_service
        .generate_location_day_cache(site.id, date)
        .unwrap();
    assert_eq!(first, second);
    let again: Vec<_> = registry
        .event_repo
        .by_date(date)
        .unwrap()
        .iter()
        .map(|e| (e.event_time, e.event_type, e.quality_score, e.accuracy))
        .collect();
    assert_eq!(snapshot, again);
}
