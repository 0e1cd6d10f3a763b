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

//! Site lifecycle: CRUD with derived apex geometry, JSON import/export, and
//! the recalculation jobs that keep the event cache honest.

use std::sync::Arc;

use chrono::{Datelike, FixedOffset, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geometry::{azimuth_to_apex, distance_to_apex, elevation_to_apex, Apex, GroundPoint};
use crate::models::{Site, SitePayload};
use crate::queue::service::QueueService;
use crate::queue::Priority;
use crate::repo::{EventRepository, SiteRepository};

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created_count: usize,
    pub updated_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

pub struct SiteService {
    sites: Arc<dyn SiteRepository>,
    events: Arc<dyn EventRepository>,
    queue: Arc<QueueService>,
    apex: Apex,
    timezone: FixedOffset,
}

impl SiteService {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        events: Arc<dyn EventRepository>,
        queue: Arc<QueueService>,
        apex: Apex,
        timezone: FixedOffset,
    ) -> Self {
        SiteService {
            sites,
            events,
            queue,
            apex,
            timezone,
        }
    }

    fn validate(payload: &SitePayload) -> Result<()> {
        if payload.name.trim().is_empty() {
            return Err(Error::Validation("site name is required".into()));
        }
        if !(-90.0..=90.0).contains(&payload.latitude) {
            return Err(Error::Validation(format!("latitude {} out of range", payload.latitude)));
        }
        if !(-180.0..=180.0).contains(&payload.longitude) {
            return Err(Error::Validation(format!(
                "longitude {} out of range",
                payload.longitude
            )));
        }
        Ok(())
    }

    /// Derived apex fields: explicit payload values win, everything absent is
    /// recomputed from the coordinates.
    fn apply_geometry(&self, payload: &SitePayload, site: &mut Site) -> Result<()> {
        let observer = GroundPoint {
            latitude: payload.latitude,
            longitude: payload.longitude,
            elevation_m: payload.elevation,
        };
        site.azimuth_to_apex = match payload.azimuth_to_apex {
            Some(azimuth) => azimuth,
            None => azimuth_to_apex(&observer, &self.apex),
        };
        site.elevation_to_apex = match payload.elevation_to_apex {
            Some(elevation) => elevation,
            None => elevation_to_apex(&observer, &self.apex)?,
        };
        site.distance_to_apex = match payload.distance_to_apex {
            Some(distance) => distance,
            None => distance_to_apex(&observer, &self.apex),
        };
        Ok(())
    }

    fn queue_recalculation(&self, site_id: i64, priority: Priority) {
        let year = Utc::now().with_timezone(&self.timezone).year();
        match self
            .queue
            .schedule_location_calculation(site_id, year, year + 1, priority)
        {
            Ok(job_id) => log::info!("site {site_id}: queued recalculation {job_id}"),
            Err(Error::QueueDisabled) => {
                log::warn!("site {site_id}: queue disabled, cache left stale")
            }
            Err(err) => log::error!("site {site_id}: queueing recalculation failed: {err}"),
        }
    }

    pub fn create(&self, payload: SitePayload) -> Result<Site> {
        Self::validate(&payload)?;
        let now = Utc::now();
        let mut site = Site {
            id: payload.id.unwrap_or(0).max(0),
            name: payload.name.clone(),
            prefecture: payload.prefecture.clone(),
            latitude: payload.latitude,
            longitude: payload.longitude,
            elevation: payload.elevation,
            azimuth_to_apex: 0.0,
            elevation_to_apex: 0.0,
            distance_to_apex: 0.0,
            access_notes: payload.access_notes.clone(),
            parking_notes: payload.parking_notes.clone(),
            notes: payload.notes.clone(),
            status: payload.status,
            created_at: now,
            updated_at: now,
        };
        self.apply_geometry(&payload, &mut site)?;
        let site = self.sites.insert(site)?;
        self.queue_recalculation(site.id, Priority::Normal);
        Ok(site)
    }

    pub fn update(&self, id: i64, payload: SitePayload) -> Result<Site> {
        Self::validate(&payload)?;
        let mut site = self.sites.get(id)?.ok_or(Error::NotFound("site", id))?;

        let coordinates_changed = site.latitude != payload.latitude
            || site.longitude != payload.longitude
            || site.elevation != payload.elevation;

        site.name = payload.name.clone();
        site.prefecture = payload.prefecture.clone();
        site.latitude = payload.latitude;
        site.longitude = payload.longitude;
        site.elevation = payload.elevation;
        site.access_notes = payload.access_notes.clone();
        site.parking_notes = payload.parking_notes.clone();
        site.notes = payload.notes.clone();
        site.status = payload.status;
        site.updated_at = Utc::now();
        self.apply_geometry(&payload, &mut site)?;

        let site = self.sites.update(site)?;
        if coordinates_changed {
            self.queue_recalculation(site.id, Priority::High);
        }
        Ok(site)
    }

    /// Upsert by id: present and found updates, present and missing fails,
    /// absent creates.
    pub fn upsert(&self, payload: SitePayload) -> Result<(Site, bool)> {
        match payload.id {
            Some(id) if id > 0 => match self.sites.get(id)? {
                Some(_) => Ok((self.update(id, payload)?, false)),
                None => Err(Error::NotFound("site", id)),
            },
            _ => {
                let mut payload = payload;
                payload.id = None;
                Ok((self.create(payload)?, true))
            }
        }
    }

    /// Deletion cascades to the site's cached events.
    pub fn delete(&self, id: i64) -> Result<()> {
        self.sites.delete(id)?;
        let removed = self.events.delete_for_site(id)?;
        log::info!("site {id} deleted along with {removed} cached events");
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Site> {
        self.sites.get(id)?.ok_or(Error::NotFound("site", id))
    }

    pub fn list(&self) -> Result<Vec<Site>> {
        self.sites.list()
    }

    pub fn export(&self) -> Result<Vec<SitePayload>> {
        Ok(self.sites.list()?.iter().map(SitePayload::from).collect())
    }

    /// Import with upsert semantics; failures are reported per entry and do
    /// not stop the batch.
    pub fn import(&self, payloads: Vec<SitePayload>) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for (index, payload) in payloads.into_iter().enumerate() {
            let label = payload.name.clone();
            match self.upsert(payload) {
                Ok((_, true)) => summary.created_count += 1,
                Ok((_, false)) => summary.updated_count += 1,
                Err(err) => {
                    summary.error_count += 1;
                    summary.errors.push(format!("entry {index} ({label}): {err}"));
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::application::settings::SettingsStore;
    use crate::config::TowerConfig;
    use crate::queue::broker::MemoryBroker;
    use crate::repo::memory::{MemoryEventRepository, MemorySettingRepository, MemorySiteRepository};

    fn service() -> (SiteService, Arc<MemoryEventRepository>) {
        let tower = TowerConfig::default();
        let settings = Arc::new(SettingsStore::new(
            Arc::new(MemorySettingRepository::default()),
            StdDuration::from_secs(60),
        ));
        let queue = Arc::new(QueueService::new(
            Some(Arc::new(MemoryBroker::default())),
            settings,
        ));
        let events = Arc::new(MemoryEventRepository::default());
        (
            SiteService::new(
                Arc::new(MemorySiteRepository::default()),
                events.clone(),
                queue,
                tower.apex(),
                tower.timezone(),
            ),
            events,
        )
    }

    fn payload(name: &str) -> SitePayload {
        SitePayload {
            id: None,
            name: name.into(),
            prefecture: "Kanagawa".into(),
            latitude: 35.6,
            longitude: 139.7,
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
    fn test_create_derives_geometry() {
        let (service, _) = service();
        let site = service.create(payload("pier")).unwrap();
        assert!(site.id > 0);
        assert!((0.0..360.0).contains(&site.azimuth_to_apex));
        assert!(site.distance_to_apex > 1_000.0);
        assert!(site.elevation_to_apex.is_finite());
        assert!(site.elevation_to_apex != 0.0);
    }

    #[test]
    fn test_user_override_wins_and_null_reverts() {
        let (service, _) = service();
        let mut body = payload("pier");
        body.azimuth_to_apex = Some(45.0);
        let site = service.create(body).unwrap();
        assert_eq!(site.azimuth_to_apex, 45.0);
        assert!(site.elevation_to_apex.is_finite() && site.elevation_to_apex != 0.0);

        // an update without the override reverts to the computed bearing
        let reverted = service.update(site.id, payload("pier")).unwrap();
        assert_ne!(reverted.azimuth_to_apex, 45.0);
    }

    #[test]
    fn test_upsert_semantics() {
        let (service, _) = service();
        let (site, created) = service.upsert(payload("pier")).unwrap();
        assert!(created);

        let mut update = payload("pier renamed");
        update.id = Some(site.id);
        let (updated, created) = service.upsert(update).unwrap();
        assert!(!created);
        assert_eq!(updated.name, "pier renamed");

        let mut missing = payload("ghost");
        missing.id = Some(9_999);
        assert!(matches!(service.upsert(missing), Err(Error::NotFound("site", 9_999))));
    }

    #[test]
    fn test_validation_rejects_bad_coordinates() {
        let (service, _) = service();
        let mut bad = payload("x");
        bad.latitude = 95.0;
        assert!(service.create(bad).is_err());
        let mut unnamed = payload("");
        unnamed.latitude = 35.0;
        assert!(service.create(unnamed).is_err());
    }

    #[test]
    fn test_export_wipe_import_round_trip() {
        let (service, _) = service();
        let a = service.create(payload("pier")).unwrap();
        let mut with_override = payload("hill");
        with_override.azimuth_to_apex = Some(50.0);
        let b = service.create(with_override).unwrap();

        let exported = service.export().unwrap();
        assert_eq!(exported.len(), 2);

        service.delete(a.id).unwrap();
        service.delete(b.id).unwrap();
        assert!(service.list().unwrap().is_empty());

        // ids no longer resolve, so strip them the way a fresh deployment would
        let reimported: Vec<SitePayload> = exported
            .into_iter()
            .map(|mut p| {
                p.id = None;
                p
            })
            .collect();
        let summary = service.import(reimported).unwrap();
        assert_eq!(summary.created_count, 2);
        assert_eq!(summary.error_count, 0);

        let sites = service.list().unwrap();
        assert_eq!(sites.len(), 2);
        let hill = sites.iter().find(|s| s.name == "hill").unwrap();
        assert_eq!(hill.azimuth_to_apex, 50.0);
    }

    #[test]
    fn test_import_reports_per_entry_errors() {
        let (service, _) = service();
        let mut bad = payload("broken");
        bad.latitude = 200.0;
        let summary = service.import(vec![payload("ok"), bad]).unwrap();
        assert_eq!(summary.created_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("broken"));
    }

    #[test]
    fn test_delete_cascades_events(){
        let (service, events) = service();
        let site = service.create(payload("pier")).unwrap();
        events
            .replace_scope(
                site.id,
                crate::repo::EventScope::Year(2025),
                vec![],
            )
            .unwrap();
        service.delete(site.id).unwrap();
        assert!(matches!(service.get(site.id), Err(Error::NotFound("site", _))));
    }
}
