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

//! Composition root: builds the dependency graph in its fixed order and owns
//! startup and shutdown. The queue is constructed without its handler; the
//! event service is registered with it just before workers start.

use std::sync::{Arc, Mutex};

use crate::application::cache::EventCacheService;
use crate::application::calendar::CalendarService;
use crate::application::settings::{SettingsStore, DEFAULT_CACHE_TTL};
use crate::application::sites::SiteService;
use crate::config::AppConfig;
use crate::ephemeris::{Ephemeris, MeeusEphemeris};
use crate::error::Result;
use crate::queue::broker::{Broker, MemoryBroker};
use crate::queue::scheduler::Scheduler;
use crate::queue::service::QueueService;
use crate::repo::memory::{MemoryEventRepository, MemorySettingRepository, MemorySiteRepository};
use crate::repo::{EventRepository, SettingRepository, SiteRepository};
use crate::solver::AlignmentSolver;

pub struct ServiceRegistry {
    pub config: AppConfig,
    pub site_repo: Arc<dyn SiteRepository>,
    pub event_repo: Arc<dyn EventRepository>,
    pub setting_repo: Arc<dyn SettingRepository>,
    pub settings: Arc<SettingsStore>,
    pub ephemeris: Arc<dyn Ephemeris>,
    pub solver: Arc<AlignmentSolver>,
    pub event_service: Arc<EventCacheService>,
    pub queue: Arc<QueueService>,
    pub sites: Arc<SiteService>,
    pub calendar: Arc<CalendarService>,
    scheduler: Mutex<Option<Arc<Scheduler>>>,
}

impl ServiceRegistry {
    pub fn build(config: AppConfig) -> Result<Arc<ServiceRegistry>> {
        // 1. repositories
        let site_repo: Arc<dyn SiteRepository> = Arc::new(MemorySiteRepository::default());
        let event_repo: Arc<dyn EventRepository> = Arc::new(MemoryEventRepository::default());
        let setting_repo: Arc<dyn SettingRepository> = Arc::new(MemorySettingRepository::default());

        // 2. settings store, seeded
        let settings = Arc::new(SettingsStore::new(Arc::clone(&setting_repo), DEFAULT_CACHE_TTL));
        settings.bootstrap()?;

        // 3. ephemeris port (coordinate math and the season helper are pure)
        let timezone = config.tower.timezone();
        let ephemeris: Arc<dyn Ephemeris> = Arc::new(MeeusEphemeris::new(timezone));

        // 4. alignment solver
        let solver = Arc::new(AlignmentSolver::new(
            Arc::clone(&ephemeris),
            timezone,
            Arc::clone(&settings),
        ));

        // 5. event cache (doubles as the job handler)
        let event_service = Arc::new(EventCacheService::new(
            Arc::clone(&site_repo),
            Arc::clone(&event_repo),
            Arc::clone(&solver),
            Arc::clone(&settings),
        ));

        // 6. queue core, handler-less at this point
        let broker: Option<Arc<dyn Broker>> = if config.broker.disabled {
            log::warn!("queue broker disabled, running in degraded mode");
            None
        } else {
            Some(Arc::new(MemoryBroker::default()))
        };
        let queue = Arc::new(QueueService::new(broker, Arc::clone(&settings)));

        // 8. site and calendar services
        let sites = Arc::new(SiteService::new(
            Arc::clone(&site_repo),
            Arc::clone(&event_repo),
            Arc::clone(&queue),
            config.tower.apex(),
            timezone,
        ));
        let calendar = Arc::new(CalendarService::new(
            Arc::clone(&event_repo),
            Arc::clone(&site_repo),
            Arc::clone(&solver),
            Arc::clone(&ephemeris),
            config.tower.apex(),
            timezone,
            config.skip_direct_calculation,
        ));

        // 9. scheduler, constructed but not started
        let scheduler = Scheduler::new(Arc::clone(&queue), Arc::clone(&site_repo), timezone);

        Ok(Arc::new(ServiceRegistry {
            config,
            site_repo,
            event_repo,
            setting_repo,
            settings,
            ephemeris,
            solver,
            event_service,
            queue,
            sites,
            calendar,
            scheduler: Mutex::new(Some(scheduler)),
        }))
    }

    /// Startup: broker ping (non-fatal), worker pool, optional scheduler.
    pub fn start(&self) -> Result<()> {
        if self.queue.enabled() {
            if self.queue.ping() {
                log::info!(
                    "queue broker reachable ({}:{})",
                    self.config.broker.redis_host,
                    self.config.broker.redis_port
                );
            } else {
                log::warn!("queue broker ping failed, jobs may not run");
            }
            if self.config.broker.worker_disabled {
                log::info!("worker disabled in this process");
            } else {
                // step 7 of the wiring order: register the handler with the
                // queue right before workers start
                let concurrency = self
                    .config
                    .broker
                    .worker_concurrency
                    .unwrap_or(self.settings.number("worker_concurrency", 2.0) as usize);
                self.queue
                    .start_worker(self.event_service.clone(), concurrency)?;
            }
        }

        if self.config.broker.scheduler_enabled {
            if let Ok(slot) = self.scheduler.lock() {
                if let Some(scheduler) = slot.as_ref() {
                    scheduler.start();
                }
            }
        } else {
            log::info!("background scheduler disabled");
        }
        Ok(())
    }

    /// Shutdown order: scheduler, then the worker pool (waits for in-flight
    /// jobs), then the broker and repositories go down with their drops.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.scheduler.lock() {
            if let Some(scheduler) = slot.take() {
                scheduler.stop();
            }
        }
        self.queue.shutdown();
        log::info!("registry shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_wires_the_graph() {
        let registry = ServiceRegistry::build(AppConfig::default()).unwrap();
        assert!(registry.queue.enabled());
        // settings were seeded during build
        assert!(registry.settings.list().unwrap().len() >= 17);
    }

    #[test]
    fn test_degraded_mode_without_broker() {
        let mut config = AppConfig::default();
        config.broker.disabled = true;
        let registry = ServiceRegistry::build(config).unwrap();
        assert!(!registry.queue.enabled());
        registry.start().unwrap();
        registry.shutdown();
    }

    #[test]
    fn test_start_and_shutdown_with_worker() {
        let mut config = AppConfig::default();
        config.broker.worker_concurrency = Some(1);
        let registry = ServiceRegistry::build(config).unwrap();
        registry.start().unwrap();
        registry.shutdown();
    }
}
