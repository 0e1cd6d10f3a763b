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

//! Scheduling facade over the broker: job ids, dedup keys, priority policy,
//! stats, and the live concurrency control.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use serde::Serialize;

use crate::application::settings::SettingsStore;
use crate::error::{Error, Result};
use crate::queue::broker::{Broker, BrokerStats, EnqueueRequest, DEFAULT_MAX_ATTEMPTS};
use crate::queue::worker::WorkerPool;
use crate::queue::{JobHandler, JobPayload, Priority};

/// Terminal failures older than this are swept by the daily maintenance.
const FAILED_JOB_RETENTION: StdDuration = StdDuration::from_secs(7 * 24 * 3_600);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub enabled: bool,
    #[serde(flatten)]
    pub broker: BrokerStats,
}

pub struct QueueService {
    broker: Option<Arc<dyn Broker>>,
    settings: Arc<SettingsStore>,
    worker: Mutex<Option<Arc<WorkerPool>>>,
}

impl QueueService {
    /// `None` for the broker puts the whole subsystem in degraded mode:
    /// every write path answers `QueueDisabled`, reads keep working.
    pub fn new(broker: Option<Arc<dyn Broker>>, settings: Arc<SettingsStore>) -> Self {
        QueueService {
            broker,
            settings,
            worker: Mutex::new(None),
        }
    }

    pub fn enabled(&self) -> bool {
        self.broker.is_some()
    }

    pub fn ping(&self) -> bool {
        self.broker.as_ref().map(|b| b.ping()).unwrap_or(false)
    }

    fn broker(&self) -> Result<&Arc<dyn Broker>> {
        self.broker.as_ref().ok_or(Error::QueueDisabled)
    }

    /// Attach the job handler and start the worker pool. A no-op when the
    /// queue is disabled or a worker is already running in this process.
    pub fn start_worker(&self, handler: Arc<dyn JobHandler>, concurrency: usize) -> Result<bool> {
        let Some(broker) = self.broker.as_ref() else {
            log::warn!("queue disabled, no worker started");
            return Ok(false);
        };
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| Error::Persistence("worker lock poisoned".into()))?;
        if worker.is_some() {
            return Ok(false);
        }
        broker.set_max_active(self.settings.number("max_active_jobs", 10.0).max(1.0) as usize);
        let pool = WorkerPool::start(
            Arc::clone(broker),
            handler,
            Arc::clone(&self.settings),
            concurrency.clamp(1, 10),
        );
        *worker = Some(pool);
        Ok(true)
    }

    fn effective_priority(&self, requested: Priority) -> Priority {
        if requested == Priority::Normal && self.settings.flag("enable_low_priority_mode", false) {
            Priority::Low
        } else {
            requested
        }
    }

    fn base_delay(&self, priority: Priority) -> StdDuration {
        if priority == Priority::High {
            StdDuration::ZERO
        } else {
            StdDuration::from_millis(self.settings.number("job_delay_ms", 1_000.0).max(0.0) as u64)
        }
    }

    /// Queue a full recalculation of one site over a year range. Repeated
    /// calls queue repeated jobs on purpose.
    pub fn schedule_location_calculation(
        &self,
        site_id: i64,
        start_year: i32,
        end_year: i32,
        priority: Priority,
    ) -> Result<String> {
        if start_year > end_year {
            return Err(Error::Validation(format!(
                "start year {start_year} is after end year {end_year}"
            )));
        }
        let priority = self.effective_priority(priority);
        self.broker()?.enqueue(EnqueueRequest {
            payload: JobPayload::SiteCalculation {
                site_id,
                start_year,
                end_year,
            },
            priority,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: self.base_delay(priority),
            dedup_id: None,
            id_hint: Some(format!("site-{site_id}-{start_year}-{end_year}")),
        })
    }

    /// Queue one month's recalculation across sites. Deduplicated: at most
    /// one `monthly-YYYY-M` job is ever queued or running.
    pub fn schedule_monthly_calculation(
        &self,
        year: i32,
        month: u32,
        site_ids: Vec<i64>,
        priority: Priority,
    ) -> Result<String> {
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!("month {month} out of range")));
        }
        let priority = self.effective_priority(priority);
        self.broker()?.enqueue(EnqueueRequest {
            payload: JobPayload::MonthlyCalculation {
                year,
                month,
                site_ids,
            },
            priority,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: self.base_delay(priority),
            dedup_id: Some(format!("monthly-{year}-{month}")),
            id_hint: None,
        })
    }

    pub fn schedule_data_cleanup(&self, older_than_years: u32) -> Result<String> {
        let priority = self.effective_priority(Priority::Low);
        self.broker()?.enqueue(EnqueueRequest {
            payload: JobPayload::DataCleanup { older_than_years },
            priority,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: self.base_delay(priority),
            dedup_id: None,
            id_hint: Some("cleanup".to_string()),
        })
    }

    pub fn clean_failed_jobs(&self) -> Result<usize> {
        Ok(self.broker()?.clean_failed(FAILED_JOB_RETENTION))
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enabled: self.enabled(),
            broker: self
                .broker
                .as_ref()
                .map(|b| b.stats())
                .unwrap_or_default(),
        }
    }

    /// Persist and apply a new worker concurrency. Returns (old, new).
    /// Without a running worker only the setting changes; the next worker
    /// start picks it up.
    pub fn update_concurrency(&self, concurrency: usize) -> Result<(usize, usize)> {
        if !(1..=10).contains(&concurrency) {
            return Err(Error::Validation(format!(
                "concurrency {concurrency} out of range [1, 10]"
            )));
        }
        let old = self.settings.number("worker_concurrency", 2.0) as usize;
        self.settings.upsert(
            "worker_concurrency",
            crate::models::SettingValue::Number(concurrency as f64),
        )?;

        let worker = self
            .worker
            .lock()
            .map_err(|_| Error::Persistence("worker lock poisoned".into()))?;
        match worker.as_ref() {
            Some(pool) => {
                let old_running = pool.concurrency();
                pool.resize(concurrency);
                Ok((old_running, concurrency))
            }
            None => {
                log::info!("no worker in this process, concurrency persisted for the next start");
                Ok((old, concurrency))
            }
        }
    }

    /// Drain the worker pool; in-flight jobs run to completion.
    pub fn shutdown(&self) {
        let pool = {
            let Ok(mut worker) = self.worker.lock() else { return };
            worker.take()
        };
        if let Some(pool) = pool {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::broker::MemoryBroker;
    use crate::repo::memory::MemorySettingRepository;

    fn service(broker: bool) -> QueueService {
        let settings = Arc::new(SettingsStore::new(
            Arc::new(MemorySettingRepository::default()),
            StdDuration::from_secs(60),
        ));
        let broker: Option<Arc<dyn Broker>> = if broker {
            Some(Arc::new(MemoryBroker::default()))
        } else {
            None
        };
        QueueService::new(broker, settings)
    }

    #[test]
    fn test_monthly_dedup_end_to_end() {
        let service = service(true);
        let sites = vec![1, 2, 3];
        let a = service
            .schedule_monthly_calculation(2025, 7, sites.clone(), Priority::Low)
            .unwrap();
        let b = service
            .schedule_monthly_calculation(2025, 7, sites, Priority::Low)
            .unwrap();
        assert_eq!(a, "monthly-2025-7");
        assert_eq!(a, b);
        let stats = service.stats();
        assert_eq!(stats.broker.waiting + stats.broker.delayed, 1);
    }

    #[test]
    fn test_site_jobs_are_not_deduplicated() {
        let service = service(true);
        let a = service
            .schedule_location_calculation(3, 2025, 2026, Priority::Normal)
            .unwrap();
        let b = service
            .schedule_location_calculation(3, 2025, 2026, Priority::Normal)
            .unwrap();
        assert_ne!(a, b);
        assert!(a.contains("site-3-2025-2026"));
        let stats = service.stats();
        assert_eq!(stats.broker.waiting + stats.broker.delayed, 2);
    }

    #[test]
    fn test_disabled_queue_rejects_writes_and_reports() {
        let service = service(false);
        let result = service.schedule_location_calculation(1, 2025, 2025, Priority::High);
        assert!(matches!(result, Err(Error::QueueDisabled)));
        let stats = service.stats();
        assert!(!stats.enabled);
        assert_eq!(stats.broker.waiting, 0);
    }

    #[test]
    fn test_update_concurrency_bounds_and_persistence() {
        let service = service(true);
        assert!(service.update_concurrency(0).is_err());
        assert!(service.update_concurrency(11).is_err());
        let (_, new) = service.update_concurrency(3).unwrap();
        assert_eq!(new, 3);
        assert_eq!(service.settings.number("worker_concurrency", 2.0), 3.0);
    }

    #[test]
    fn test_low_priority_mode_downgrades_normal() {
        let service = service(true);
        service
            .settings
            .upsert("enable_low_priority_mode", crate::models::SettingValue::Flag(true))
            .unwrap();
        assert_eq!(service.effective_priority(Priority::Normal), Priority::Low);
        assert_eq!(service.effective_priority(Priority::High), Priority::High);
    }

    #[test]
    fn test_invalid_year_range() {
        let service = service(true);
        assert!(service
            .schedule_location_calculation(1, 2026, 2025, Priority::Low)
            .is_err());
    }
}
