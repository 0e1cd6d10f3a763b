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

//! Event cache materialization: per-site, per-scope regeneration by
//! delete-then-insert, and the job handler the worker pool dispatches to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Datelike, Duration, NaiveDate, Utc};

use crate::application::settings::SettingsStore;
use crate::error::{Error, Result};
use crate::models::Event;
use crate::queue::{Job, JobHandler, JobPayload};
use crate::repo::{EventRepository, EventScope, SiteRepository};
use crate::solver::{AlignmentSolver, Scene};

/// Sites solved concurrently inside one year-generation pass.
const SITE_BATCH: usize = 5;

/// Progress log granularity, events.
const EVENT_PROGRESS_BATCH: usize = 100;

static CORRELATION_SEQ: AtomicU64 = AtomicU64::new(0);

fn correlation_id(prefix: &str) -> String {
    let n = CORRELATION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{n}")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GenerationSummary {
    pub sites_processed: usize,
    pub sites_failed: usize,
    pub events_created: usize,
}

pub struct EventCacheService {
    sites: Arc<dyn SiteRepository>,
    events: Arc<dyn EventRepository>,
    solver: Arc<AlignmentSolver>,
    settings: Arc<SettingsStore>,
}

impl EventCacheService {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        events: Arc<dyn EventRepository>,
        solver: Arc<AlignmentSolver>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        EventCacheService {
            sites,
            events,
            solver,
            settings,
        }
    }

    /// Regenerate the full-year cache of one site. Idempotent: the year
    /// scope is deleted and re-inserted in a single repository transaction.
    pub fn generate_location_cache(&self, site_id: i64, year: i32) -> Result<usize> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::Validation(format!("bad year {year}")))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| Error::Validation(format!("bad year {year}")))?;
        self.generate_range(site_id, EventScope::Year(year), start, end)
    }

    /// Same pattern restricted to one month.
    pub fn generate_location_month_cache(
        &self,
        site_id: i64,
        year: i32,
        month: u32,
    ) -> Result<usize> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::Validation(format!("bad month {year}-{month}")))?;
        let end = last_day_of_month(year, month)
            .ok_or_else(|| Error::Validation(format!("bad month {year}-{month}")))?;
        self.generate_range(site_id, EventScope::Month(year, month), start, end)
    }

    /// Same pattern for a single day.
    pub fn generate_location_day_cache(&self, site_id: i64, date: NaiveDate) -> Result<usize> {
        self.generate_range(site_id, EventScope::Day(date), date, date)
    }

    fn generate_range(
        &self,
        site_id: i64,
        scope: EventScope,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize> {
        let site = self
            .sites
            .get(site_id)?
            .ok_or(Error::NotFound("site", site_id))?;
        let params = self.solver.params_from_settings();
        let correlation = correlation_id("cache");

        let mut collected: Vec<Event> = Vec::new();
        let mut failed_days = 0u32;
        let mut date = start;
        while date <= end {
            match self.solver.find_events_for_date(&site, date, &params, Scene::All) {
                Ok(events) => {
                    for event in events {
                        if scope.contains(&event) {
                            collected.push(event);
                            if collected.len() % EVENT_PROGRESS_BATCH == 0 {
                                log::info!(
                                    "[{correlation}] site {site_id}: {} events so far",
                                    collected.len()
                                );
                            }
                        }
                    }
                }
                // site-constant geometry failures poison every day: fail fast
                Err(err @ Error::InvalidGeometry(_)) => {
                    log::error!("[{correlation}] site {site_id} {date}: {err}");
                    return Err(err);
                }
                Err(err) => {
                    failed_days += 1;
                    log::error!("[{correlation}] site {site_id} {date}: {err}");
                }
            }
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }

        let inserted = self.events.replace_scope(site_id, scope, collected)?;
        if failed_days > 0 {
            log::warn!("[{correlation}] site {site_id}: {failed_days} days failed, {inserted} events cached");
        } else {
            log::info!("[{correlation}] site {site_id}: {inserted} events cached");
        }
        Ok(inserted)
    }

    /// Year generation across every site, in parallel sub-batches. Failures
    /// stay local to their site.
    pub fn generate_all_sites(&self, year: i32) -> Result<GenerationSummary> {
        let sites = self.sites.list()?;
        let total = sites.len();
        let mut summary = GenerationSummary::default();

        for batch in sites.chunks(SITE_BATCH) {
            let results: Vec<(i64, Result<usize>)> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|site| {
                        let site_id = site.id;
                        scope.spawn(move || (site_id, self.generate_location_cache(site_id, year)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(_) => (0, Err(Error::Persistence("generation thread panicked".into()))),
                    })
                    .collect()
            });

            for (site_id, result) in results {
                summary.sites_processed += 1;
                match result {
                    Ok(count) => summary.events_created += count,
                    Err(err) => {
                        summary.sites_failed += 1;
                        log::error!("year {year} site {site_id}: {err}");
                    }
                }
            }
            log::info!(
                "year {year}: {}/{} sites processed, {} events",
                summary.sites_processed,
                total,
                summary.events_created
            );
        }
        Ok(summary)
    }

    fn processing_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.settings.number("processing_delay_ms", 500.0).max(0.0) as u64)
    }
}

impl JobHandler for EventCacheService {
    fn handle(&self, job: &Job) -> Result<()> {
        match &job.payload {
            JobPayload::SiteCalculation {
                site_id,
                start_year,
                end_year,
            } => {
                for year in *start_year..=*end_year {
                    self.generate_location_cache(*site_id, year)?;
                    if year < *end_year {
                        thread::sleep(self.processing_delay());
                    }
                }
                Ok(())
            }
            JobPayload::MonthlyCalculation {
                year,
                month,
                site_ids,
            } => {
                let mut failures = 0;
                for site_id in site_ids {
                    if let Err(err) = self.generate_location_month_cache(*site_id, *year, *month) {
                        failures += 1;
                        log::error!("monthly {year}-{month} site {site_id}: {err}");
                    }
                }
                if failures == site_ids.len() && failures > 0 {
                    return Err(Error::Persistence(format!(
                        "monthly {year}-{month}: all {failures} sites failed"
                    )));
                }
                Ok(())
            }
            JobPayload::DataCleanup { older_than_years } => {
                let today = Utc::now().date_naive();
                let cutoff = today
                    .with_year(today.year() - *older_than_years as i32)
                    .unwrap_or(today - Duration::days(365 * *older_than_years as i64));
                let removed = self.events.delete_before(cutoff)?;
                log::info!("cleanup: removed {removed} events dated before {cutoff}");
                Ok(())
            }
        }
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next_month.pred_opt().or(Some(first))
}
