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

//! In-process reference implementations of the persistence ports. Each call
//! takes the store lock once, which gives the replace-scope path its
//! transactional behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::models::{Event, Setting, Site};
use crate::repo::{EventRepository, EventScope, SettingRepository, SiteRepository};

#[derive(Default)]
pub struct MemorySiteRepository {
    sites: RwLock<HashMap<i64, Site>>,
    next_id: AtomicI64,
}

impl SiteRepository for MemorySiteRepository {
    fn insert(&self, mut site: Site) -> Result<Site> {
        let mut sites = self.sites.write().map_err(poisoned)?;
        if site.id == 0 {
            site.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        } else if sites.contains_key(&site.id) {
            return Err(Error::Persistence(format!("site {} already exists", site.id)));
        } else {
            // keep the sequence ahead of explicitly chosen ids
            self.next_id.fetch_max(site.id, Ordering::SeqCst);
        }
        sites.insert(site.id, site.clone());
        Ok(site)
    }

    fn update(&self, site: Site) -> Result<Site> {
        let mut sites = self.sites.write().map_err(poisoned)?;
        if !sites.contains_key(&site.id) {
            return Err(Error::NotFound("site", site.id));
        }
        sites.insert(site.id, site.clone());
        Ok(site)
    }

    fn delete(&self, id: i64) -> Result<()> {
        let mut sites = self.sites.write().map_err(poisoned)?;
        sites
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::NotFound("site", id))
    }

    fn get(&self, id: i64) -> Result<Option<Site>> {
        let sites = self.sites.read().map_err(poisoned)?;
        Ok(sites.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<Site>> {
        let sites = self.sites.read().map_err(poisoned)?;
        let mut all: Vec<Site> = sites.values().cloned().collect();
        all.sort_by_key(|s| s.id);
        Ok(all)
    }
}

#[derive(Default)]
pub struct MemoryEventRepository {
    events: RwLock<Vec<Event>>,
    next_id: AtomicI64,
}

impl MemoryEventRepository {
    fn assign_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl EventRepository for MemoryEventRepository {
    fn replace_scope(&self, site_id: i64, scope: EventScope, events: Vec<Event>) -> Result<usize> {
        let mut store = self.events.write().map_err(poisoned)?;
        store.retain(|e| e.site_id != site_id || !scope.contains(e));
        let inserted = events.len();
        for mut event in events {
            event.id = self.assign_id();
            event.site_id = site_id;
            store.push(event);
        }
        Ok(inserted)
    }

    fn delete_for_site(&self, site_id: i64) -> Result<usize> {
        let mut store = self.events.write().map_err(poisoned)?;
        let before = store.len();
        store.retain(|e| e.site_id != site_id);
        Ok(before - store.len())
    }

    fn delete_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut store = self.events.write().map_err(poisoned)?;
        let before = store.len();
        store.retain(|e| e.event_date >= cutoff);
        Ok(before - store.len())
    }

    fn by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>> {
        let store = self.events.read().map_err(poisoned)?;
        let mut found: Vec<Event> = store
            .iter()
            .filter(|e| e.event_date >= start && e.event_date <= end)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.event_time);
        Ok(found)
    }

    fn by_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
        self.by_date_range(date, date)
    }

    fn upcoming(&self, after: DateTime<Utc>, limit: usize) -> Result<Vec<Event>> {
        let store = self.events.read().map_err(poisoned)?;
        let mut found: Vec<Event> = store.iter().filter(|e| e.event_time > after).cloned().collect();
        found.sort_by_key(|e| e.event_time);
        found.truncate(limit);
        Ok(found)
    }

    fn for_site_year(&self, site_id: i64, year: i32) -> Result<Vec<Event>> {
        let store = self.events.read().map_err(poisoned)?;
        let mut found: Vec<Event> = store
            .iter()
            .filter(|e| e.site_id == site_id && e.calculation_year == year)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.event_time);
        Ok(found)
    }

    fn for_year(&self, year: i32) -> Result<Vec<Event>> {
        let store = self.events.read().map_err(poisoned)?;
        let mut found: Vec<Event> = store
            .iter()
            .filter(|e| e.calculation_year == year)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.event_time);
        Ok(found)
    }
}

#[derive(Default)]
pub struct MemorySettingRepository {
    settings: RwLock<HashMap<String, Setting>>,
}

impl SettingRepository for MemorySettingRepository {
    fn get(&self, key: &str) -> Result<Option<Setting>> {
        let settings = self.settings.read().map_err(poisoned)?;
        Ok(settings.get(key).cloned())
    }

    fn upsert(&self, setting: Setting) -> Result<()> {
        let mut settings = self.settings.write().map_err(poisoned)?;
        settings.insert(setting.key.clone(), setting);
        Ok(())
    }

    fn insert_if_absent(&self, setting: Setting) -> Result<bool> {
        let mut settings = self.settings.write().map_err(poisoned)?;
        if settings.contains_key(&setting.key) {
            return Ok(false);
        }
        settings.insert(setting.key.clone(), setting);
        Ok(true)
    }

    fn list(&self) -> Result<Vec<Setting>> {
        let settings = self.settings.read().map_err(poisoned)?;
        let mut all: Vec<Setting> = settings.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Persistence("store lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{Accuracy, EventType, SiteStatus};

    fn event(site_id: i64, year: i32, month: u32, day: u32) -> Event {
        let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        Event {
            id: 0,
            site_id,
            event_date: date,
            event_time: Utc
                .with_ymd_and_hms(year, month, day, 7, 30, 0)
                .unwrap(),
            event_type: EventType::DiamondSunrise,
            celestial_azimuth: 100.0,
            altitude: 5.0,
            apex_elevation: 0.8,
            quality_score: 70,
            accuracy: Accuracy::Good,
            moon_phase: None,
            moon_illumination: None,
            calculation_year: year,
        }
    }

    #[test]
    fn test_replace_scope_is_idempotent() {
        let repo = MemoryEventRepository::default();
        let batch = vec![event(1, 2025, 7, 1), event(1, 2025, 7, 2)];
        repo.replace_scope(1, EventScope::Year(2025), batch.clone()).unwrap();
        repo.replace_scope(1, EventScope::Year(2025), batch).unwrap();
        assert_eq!(repo.for_site_year(1, 2025).unwrap().len(), 2);
    }

    #[test]
    fn test_replace_scope_leaves_other_sites_alone() {
        let repo = MemoryEventRepository::default();
        repo.replace_scope(1, EventScope::Year(2025), vec![event(1, 2025, 7, 1)]).unwrap();
        repo.replace_scope(2, EventScope::Year(2025), vec![event(2, 2025, 7, 1)]).unwrap();
        repo.replace_scope(1, EventScope::Year(2025), vec![]).unwrap();
        assert!(repo.for_site_year(1, 2025).unwrap().is_empty());
        assert_eq!(repo.for_site_year(2, 2025).unwrap().len(), 1);
    }

    #[test]
    fn test_month_scope_only_touches_the_month() {
        let repo = MemoryEventRepository::default();
        repo.replace_scope(
            1,
            EventScope::Year(2025),
            vec![event(1, 2025, 6, 30), event(1, 2025, 7, 1)],
        )
        .unwrap();
        repo.replace_scope(1, EventScope::Month(2025, 7), vec![event(1, 2025, 7, 15)]).unwrap();
        let all = repo.for_site_year(1, 2025).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|e| e.event_date.to_string() == "2025-06-30"));
        assert!(all.iter().any(|e| e.event_date.to_string() == "2025-07-15"));
    }

    #[test]
    fn test_upcoming_orders_and_limits() {
        let repo = MemoryEventRepository::default();
        repo.replace_scope(
            1,
            EventScope::Year(2030),
            vec![event(1, 2030, 3, 3), event(1, 2030, 1, 1), event(1, 2030, 2, 2)],
        )
        .unwrap();
        let after = Utc.with_ymd_and_hms(2029, 12, 31, 0, 0, 0).unwrap();
        let upcoming = repo.upcoming(after, 2).unwrap();
        assert_eq!(upcoming.len(), 2);
        assert!(upcoming[0].event_time < upcoming[1].event_time);
    }

    #[test]
    fn test_site_insert_assigns_ids() {
        let repo = MemorySiteRepository::default();
        let site = Site {
            id: 0,
            name: "a".into(),
            prefecture: "".into(),
            latitude: 35.0,
            longitude: 139.0,
            elevation: 0.0,
            azimuth_to_apex: 45.0,
            elevation_to_apex: 0.3,
            distance_to_apex: 1000.0,
            access_notes: None,
            parking_notes: None,
            notes: None,
            status: SiteStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let first = repo.insert(site.clone()).unwrap();
        let second = repo.insert(site).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(repo.insert(first.clone()).is_err());
        assert_eq!(repo.list().unwrap().len(), 2);
    }
}
