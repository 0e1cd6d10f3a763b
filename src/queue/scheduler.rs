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

//! Recurring maintenance triggers, evaluated in the tower timezone:
//! yearly next-year generation, daily failed-job cleanup, monthly old-event
//! cleanup. Off unless the environment toggle enables it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};

use crate::queue::service::QueueService;
use crate::queue::Priority;
use crate::repo::SiteRepository;

/// Event history kept by the monthly cleanup, years.
const EVENT_RETENTION_YEARS: u32 = 3;

/// A fixed-timezone cron entry: optional month/day constraints plus a time
/// of day. Unset fields match every value.
#[derive(Debug, Clone, Copy)]
pub struct CronSpec {
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: u32,
    pub minute: u32,
}

impl CronSpec {
    pub fn next_after(&self, after: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let timezone = after.timezone();
        let mut date = after.date_naive();
        // bounded scan: a yearly entry is at most ~366 days out
        for _ in 0..=400 {
            let month_ok = self.month.map(|m| date.month() == m).unwrap_or(true);
            let day_ok = self.day.map(|d| date.day() == d).unwrap_or(true);
            if month_ok && day_ok {
                if let Some(naive) = date.and_hms_opt(self.hour, self.minute, 0) {
                    if let Some(at) = timezone.from_local_datetime(&naive).single() {
                        if at > after {
                            return Some(at);
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    YearlyGeneration,
    DailyCleanup,
    MonthlyCleanup,
}

const ENTRIES: [(Trigger, CronSpec); 3] = [
    // Dec 1, 02:00: queue next year's cache for every site
    (
        Trigger::YearlyGeneration,
        CronSpec { month: Some(12), day: Some(1), hour: 2, minute: 0 },
    ),
    // every day, 03:00: sweep week-old failed jobs
    (
        Trigger::DailyCleanup,
        CronSpec { month: None, day: None, hour: 3, minute: 0 },
    ),
    // 1st of the month, 05:00: drop events past retention
    (
        Trigger::MonthlyCleanup,
        CronSpec { month: None, day: Some(1), hour: 5, minute: 0 },
    ),
];

pub struct Scheduler {
    queue: Arc<QueueService>,
    sites: Arc<dyn SiteRepository>,
    timezone: FixedOffset,
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        queue: Arc<QueueService>,
        sites: Arc<dyn SiteRepository>,
        timezone: FixedOffset,
    ) -> Arc<Scheduler> {
        Arc::new(Scheduler {
            queue,
            sites,
            timezone,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        })
    }

    pub fn start(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let handle = thread::spawn(move || scheduler.run());
        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
        log::info!("background scheduler started");
    }

    fn run(&self) {
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Utc::now().with_timezone(&self.timezone);
            let Some((trigger, at)) = ENTRIES
                .iter()
                .filter_map(|(trigger, spec)| spec.next_after(now).map(|at| (*trigger, at)))
                .min_by_key(|(_, at)| *at)
            else {
                log::error!("no schedulable entry, scheduler exiting");
                return;
            };

            log::debug!("next trigger {trigger:?} at {at}");
            while Utc::now().with_timezone(&self.timezone) < at {
                if self.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                thread::sleep(StdDuration::from_secs(1));
            }
            self.fire(trigger);
        }
    }

    fn fire(&self, trigger: Trigger) {
        match trigger {
            Trigger::YearlyGeneration => self.run_yearly_generation(),
            Trigger::DailyCleanup => self.run_daily_cleanup(),
            Trigger::MonthlyCleanup => self.run_monthly_cleanup(),
        }
    }

    /// Queue next year's cache generation for every site, at low priority.
    pub fn run_yearly_generation(&self) {
        let next_year = Utc::now().with_timezone(&self.timezone).year() + 1;
        let sites = match self.sites.list() {
            Ok(sites) => sites,
            Err(err) => {
                log::error!("yearly generation: listing sites failed: {err}");
                return;
            }
        };
        let mut queued = 0;
        for site in &sites {
            match self
                .queue
                .schedule_location_calculation(site.id, next_year, next_year, Priority::Low)
            {
                Ok(_) => queued += 1,
                Err(err) => log::error!("yearly generation site {}: {err}", site.id),
            }
        }
        log::info!("yearly generation: queued {queued}/{} site jobs for {next_year}", sites.len());
    }

    pub fn run_daily_cleanup(&self) {
        match self.queue.clean_failed_jobs() {
            Ok(count) => log::info!("daily cleanup: removed {count} failed jobs"),
            Err(err) => log::error!("daily cleanup: {err}"),
        }
    }

    pub fn run_monthly_cleanup(&self) {
        match self.queue.schedule_data_cleanup(EVENT_RETENTION_YEARS) {
            Ok(id) => log::info!("monthly cleanup queued as {id}"),
            Err(err) => log::error!("monthly cleanup: {err}"),
        }
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let handle = {
            let Ok(mut slot) = self.handle.lock() else { return };
            slot.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        log::info!("background scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::application::settings::SettingsStore;
    use crate::queue::broker::MemoryBroker;
    use crate::repo::memory::{MemorySettingRepository, MemorySiteRepository};

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3_600).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        jst().with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_spec_rolls_to_tomorrow() {
        let spec = CronSpec { month: None, day: None, hour: 3, minute: 0 };
        assert_eq!(spec.next_after(at(2025, 7, 1, 4, 0)), Some(at(2025, 7, 2, 3, 0)));
        assert_eq!(spec.next_after(at(2025, 7, 1, 2, 0)), Some(at(2025, 7, 1, 3, 0)));
    }

    #[test]
    fn test_monthly_spec() {
        let spec = CronSpec { month: None, day: Some(1), hour: 5, minute: 0 };
        assert_eq!(spec.next_after(at(2025, 7, 1, 6, 0)), Some(at(2025, 8, 1, 5, 0)));
    }

    #[test]
    fn test_yearly_spec() {
        let spec = CronSpec { month: Some(12), day: Some(1), hour: 2, minute: 0 };
        assert_eq!(spec.next_after(at(2025, 12, 1, 3, 0)), Some(at(2026, 12, 1, 2, 0)));
        assert_eq!(spec.next_after(at(2025, 7, 4, 12, 0)), Some(at(2025, 12, 1, 2, 0)));
    }

    #[test]
    fn test_yearly_generation_queues_per_site() {
        let settings = Arc::new(SettingsStore::new(
            Arc::new(MemorySettingRepository::default()),
            StdDuration::from_secs(60),
        ));
        let queue = Arc::new(QueueService::new(
            Some(Arc::new(MemoryBroker::default())),
            settings,
        ));
        let sites = Arc::new(MemorySiteRepository::default());
        for name in ["a", "b", "c"] {
            sites
                .insert(crate::models::Site {
                    id: 0,
                    name: name.into(),
                    prefecture: "".into(),
                    latitude: 35.0,
                    longitude: 139.0,
                    elevation: 0.0,
                    azimuth_to_apex: 45.0,
                    elevation_to_apex: 0.3,
                    distance_to_apex: 1_000.0,
                    access_notes: None,
                    parking_notes: None,
                    notes: None,
                    status: crate::models::SiteStatus::Active,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .unwrap();
        }

        let scheduler = Scheduler::new(queue.clone(), sites, jst());
        scheduler.run_yearly_generation();
        let stats = queue.stats();
        assert_eq!(stats.broker.waiting + stats.broker.delayed, 3);
    }
}
