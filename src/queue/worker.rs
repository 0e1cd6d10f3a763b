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

//! Worker pool: N threads pulling jobs off the broker, with live resize.
//! Resizing retires the old threads after their in-flight job and spawns a
//! fresh set; nothing is cancelled mid-job.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use crate::application::settings::SettingsStore;
use crate::queue::broker::Broker;
use crate::queue::JobHandler;

const DEQUEUE_SLICE: StdDuration = StdDuration::from_millis(200);
const HEARTBEAT_INTERVAL: StdDuration = StdDuration::from_secs(15);
const HEARTBEAT_POLL: StdDuration = StdDuration::from_millis(100);

pub struct WorkerPool {
    broker: Arc<dyn Broker>,
    handler: Arc<dyn JobHandler>,
    settings: Arc<SettingsStore>,
    shutdown: Arc<AtomicBool>,
    /// Bumped on resize; threads of an older generation retire.
    generation: Arc<AtomicU64>,
    concurrency: AtomicUsize,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn start(
        broker: Arc<dyn Broker>,
        handler: Arc<dyn JobHandler>,
        settings: Arc<SettingsStore>,
        concurrency: usize,
    ) -> Arc<WorkerPool> {
        let pool = Arc::new(WorkerPool {
            broker,
            handler,
            settings,
            shutdown: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            concurrency: AtomicUsize::new(concurrency),
            threads: Mutex::new(Vec::new()),
        });
        pool.spawn_workers(concurrency, 0);
        log::info!("worker pool started with {concurrency} slots");
        pool
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.load(Ordering::SeqCst)
    }

    /// Live resize: threads of the old generation finish their current job
    /// and exit while a full new set attaches to the same broker.
    pub fn resize(self: &Arc<Self>, concurrency: usize) {
        let old = self.concurrency.swap(concurrency, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.spawn_workers(concurrency, generation);
        log::info!("worker pool resized from {old} to {concurrency} slots");
    }

    fn spawn_workers(self: &Arc<Self>, count: usize, generation: u64) {
        let mut threads = match self.threads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for index in 0..count {
            let pool = Arc::clone(self);
            threads.push(thread::spawn(move || pool.worker_loop(index, generation)));
        }
    }

    fn worker_loop(&self, index: usize, generation: u64) {
        log::debug!("worker {generation}.{index} up");
        while !self.shutdown.load(Ordering::SeqCst)
            && self.generation.load(Ordering::SeqCst) == generation
        {
            let Some(job) = self.broker.dequeue(DEQUEUE_SLICE) else {
                continue;
            };
            log::info!("worker {generation}.{index}: running {} ({:?})", job.id, job.kind);

            let done = Arc::new(AtomicBool::new(false));
            let beat = heartbeat_guard(Arc::clone(&self.broker), job.id.clone(), Arc::clone(&done));
            let result = self.handler.handle(&job);
            done.store(true, Ordering::SeqCst);
            let _ = beat.join();

            let retry_base = StdDuration::from_millis(
                self.settings.number("job_delay_ms", 1_000.0).max(0.0) as u64,
            );
            let outcome = match result {
                Ok(()) => self.broker.complete(&job.id),
                Err(err) => self.broker.fail(&job.id, &err.to_string(), retry_base),
            };
            if let Err(err) = outcome {
                log::error!("worker {generation}.{index}: settling {} failed: {err}", job.id);
            }
        }
        log::debug!("worker {generation}.{index} retiring");
    }

    /// Stop pulling new jobs and wait for in-flight ones.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let handles = {
            let mut threads = match self.threads.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *threads)
        };
        for handle in handles {
            let _ = handle.join();
        }
        log::info!("worker pool drained");
    }
}

fn heartbeat_guard(
    broker: Arc<dyn Broker>,
    job_id: String,
    done: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut since_beat = StdDuration::ZERO;
        while !done.load(Ordering::SeqCst) {
            thread::sleep(HEARTBEAT_POLL);
            since_beat += HEARTBEAT_POLL;
            if since_beat >= HEARTBEAT_INTERVAL {
                since_beat = StdDuration::ZERO;
                if broker.heartbeat(&job_id).is_err() {
                    break;
                }
            }
        }
    })
}
