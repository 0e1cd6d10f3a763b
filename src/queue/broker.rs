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

//! Broker port for the durable priority queue, plus the in-process
//! reference implementation used when no external broker is deployed.
//!
//! Required semantics: FIFO within a priority class, delayed visibility,
//! exponential retry, stall requeue, dedup-id uniqueness among non-terminal
//! jobs, and at-least-once delivery.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::queue::{Job, JobKind, JobPayload, JobState, Priority};

/// An active job silent for longer than this is considered stalled.
pub const STALL_TIMEOUT: StdDuration = StdDuration::from_secs(60);

/// How often a stalled job is re-queued before failing terminally.
const MAX_STALLED_COUNT: u32 = 1;

/// Failures kept for the stats endpoint.
const RECENT_FAILURES: usize = 10;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub payload: JobPayload,
    pub priority: Priority,
    pub max_attempts: u32,
    /// Minimum wait before the job becomes visible.
    pub delay: StdDuration,
    /// Uniqueness key among non-terminal jobs; doubles as the job id.
    pub dedup_id: Option<String>,
    /// Readable id prefix when no dedup id is given.
    pub id_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub job_id: String,
    pub kind: JobKind,
    pub payload: JobPayload,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStats {
    pub waiting: usize,
    pub active: usize,
    pub delayed: usize,
    pub completed: usize,
    pub failed: usize,
    pub recent_failures: Vec<FailureRecord>,
}

pub trait Broker: Send + Sync {
    /// Queue a job. Returns the job id; when a non-terminal job with the
    /// same dedup id exists, returns that job's id without queueing.
    fn enqueue(&self, request: EnqueueRequest) -> Result<String>;

    /// Block up to `timeout` for a runnable job. Respects the active-job
    /// ceiling and priority-then-FIFO ordering.
    fn dequeue(&self, timeout: StdDuration) -> Option<Job>;

    fn heartbeat(&self, job_id: &str) -> Result<()>;

    fn complete(&self, job_id: &str) -> Result<()>;

    /// Record a handler failure: retried with exponential backoff off
    /// `retry_base` until attempts run out, then terminal.
    fn fail(&self, job_id: &str, reason: &str, retry_base: StdDuration) -> Result<()>;

    /// System-wide ceiling on concurrently active jobs.
    fn set_max_active(&self, limit: usize);

    fn stats(&self) -> BrokerStats;

    /// Drop terminally failed jobs older than `older_than`; returns count.
    fn clean_failed(&self, older_than: StdDuration) -> usize;

    /// Liveness probe; non-fatal at startup.
    fn ping(&self) -> bool;
}

struct StoredJob {
    job: Job,
    seq: u64,
    heartbeat_at: Instant,
    stalled_count: u32,
}

struct BrokerState {
    waiting: Vec<StoredJob>,
    delayed: Vec<StoredJob>,
    active: HashMap<String, StoredJob>,
    failed: Vec<(FailureRecord, Instant)>,
    completed: usize,
    seq: u64,
    max_active: usize,
}

impl BrokerState {
    fn dedup_hit(&self, dedup_id: &str) -> Option<String> {
        let matches = |stored: &StoredJob| stored.job.dedup_id.as_deref() == Some(dedup_id);
        self.waiting
            .iter()
            .chain(self.delayed.iter())
            .chain(self.active.values())
            .find(|s| matches(s))
            .map(|s| s.job.id.clone())
    }

    /// Promote due delayed jobs and reap stalled active jobs.
    fn sweep(&mut self, stall_timeout: StdDuration) {
        let now = Utc::now();
        let mut still_delayed = Vec::new();
        for mut stored in self.delayed.drain(..) {
            if stored.job.scheduled_at <= now {
                stored.job.state = JobState::Waiting;
                self.waiting.push(stored);
            } else {
                still_delayed.push(stored);
            }
        }
        self.delayed = still_delayed;

        let stalled_ids: Vec<String> = self
            .active
            .iter()
            .filter(|(_, s)| s.heartbeat_at.elapsed() > stall_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in stalled_ids {
            let Some(mut stored) = self.active.remove(&id) else { continue };
            stored.stalled_count += 1;
            if stored.stalled_count > MAX_STALLED_COUNT {
                log::error!("job {id} stalled twice, failing terminally");
                stored.job.state = JobState::Failed;
                stored.job.last_error = Some("stalled".to_string());
                self.record_failure(stored.job, "stalled");
            } else {
                log::warn!("job {id} stalled, re-queueing");
                stored.job.state = JobState::Waiting;
                self.waiting.push(stored);
            }
        }
    }

    fn record_failure(&mut self, job: Job, reason: &str) {
        self.failed.push((
            FailureRecord {
                job_id: job.id.clone(),
                kind: job.kind,
                payload: job.payload.clone(),
                reason: reason.to_string(),
                failed_at: Utc::now(),
            },
            Instant::now(),
        ));
    }

    /// Highest priority first, FIFO inside a class.
    fn pop_best_waiting(&mut self) -> Option<StoredJob> {
        let best = self
            .waiting
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (std::cmp::Reverse(s.job.priority.weight()), s.seq))
            .map(|(i, _)| i)?;
        Some(self.waiting.remove(best))
    }
}

pub struct MemoryBroker {
    state: Mutex<BrokerState>,
    available: Condvar,
    stall_timeout: StdDuration,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        MemoryBroker::with_stall_timeout(STALL_TIMEOUT)
    }
}

impl MemoryBroker {
    pub fn with_stall_timeout(stall_timeout: StdDuration) -> Self {
        MemoryBroker {
            state: Mutex::new(BrokerState {
                waiting: Vec::new(),
                delayed: Vec::new(),
                active: HashMap::new(),
                failed: Vec::new(),
                completed: 0,
                seq: 0,
                max_active: 10,
            }),
            available: Condvar::new(),
            stall_timeout,
        }
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, BrokerState>> {
        self.state
            .lock()
            .map_err(|_| Error::Persistence("broker lock poisoned".to_string()))
    }
}

impl Broker for MemoryBroker {
    fn enqueue(&self, request: EnqueueRequest) -> Result<String> {
        let mut state = self.locked()?;
        state.sweep(self.stall_timeout);

        if let Some(dedup_id) = &request.dedup_id {
            if let Some(existing) = state.dedup_hit(dedup_id) {
                log::debug!("enqueue deduplicated onto {existing}");
                return Ok(existing);
            }
        }

        state.seq += 1;
        let seq = state.seq;
        let id = match (&request.dedup_id, &request.id_hint) {
            (Some(dedup), _) => dedup.clone(),
            (None, Some(hint)) => format!("{hint}-{seq}"),
            (None, None) => format!("job-{seq}"),
        };

        let now = Utc::now();
        let delayed = !request.delay.is_zero();
        let job = Job {
            id: id.clone(),
            kind: request.payload.kind(),
            payload: request.payload,
            priority: request.priority,
            attempts: 0,
            max_attempts: request.max_attempts.max(1),
            state: if delayed { JobState::Delayed } else { JobState::Waiting },
            scheduled_at: now
                + chrono::Duration::milliseconds(request.delay.as_millis() as i64),
            last_error: None,
            dedup_id: request.dedup_id,
        };
        let stored = StoredJob {
            job,
            seq,
            heartbeat_at: Instant::now(),
            stalled_count: 0,
        };
        if delayed {
            state.delayed.push(stored);
        } else {
            state.waiting.push(stored);
        }
        drop(state);
        self.available.notify_all();
        Ok(id)
    }

    fn dequeue(&self, timeout: StdDuration) -> Option<Job> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().ok()?;
        loop {
            state.sweep(self.stall_timeout);
            if state.active.len() < state.max_active {
                if let Some(mut stored) = state.pop_best_waiting() {
                    stored.job.state = JobState::Active;
                    stored.job.attempts += 1;
                    stored.heartbeat_at = Instant::now();
                    let job = stored.job.clone();
                    state.active.insert(job.id.clone(), stored);
                    return Some(job);
                }
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            // cap the wait so delayed promotions are picked up promptly
            let slice = remaining.min(StdDuration::from_millis(200));
            let (guard, _) = self.available.wait_timeout(state, slice).ok()?;
            state = guard;
        }
    }

    fn heartbeat(&self, job_id: &str) -> Result<()> {
        let mut state = self.locked()?;
        if let Some(stored) = state.active.get_mut(job_id) {
            stored.heartbeat_at = Instant::now();
            Ok(())
        } else {
            Err(Error::NotFound("job", 0))
        }
    }

    fn complete(&self, job_id: &str) -> Result<()> {
        let mut state = self.locked()?;
        if state.active.remove(job_id).is_none() {
            return Err(Error::Persistence(format!("job {job_id} is not active")));
        }
        state.completed += 1;
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    fn fail(&self, job_id: &str, reason: &str, retry_base: StdDuration) -> Result<()> {
        let mut state = self.locked()?;
        let Some(mut stored) = state.active.remove(job_id) else {
            return Err(Error::Persistence(format!("job {job_id} is not active")));
        };
        stored.job.last_error = Some(reason.to_string());
        if stored.job.attempts < stored.job.max_attempts {
            let backoff = retry_base.as_millis() as i64
                * 2_i64.pow(stored.job.attempts.saturating_sub(1));
            stored.job.state = JobState::Delayed;
            stored.job.scheduled_at = Utc::now() + chrono::Duration::milliseconds(backoff.max(1));
            log::warn!(
                "job {job_id} failed (attempt {}/{}), retrying in {}ms: {reason}",
                stored.job.attempts,
                stored.job.max_attempts,
                backoff
            );
            state.delayed.push(stored);
        } else {
            log::error!("job {job_id} failed terminally: {reason}");
            stored.job.state = JobState::Failed;
            state.record_failure(stored.job, reason);
        }
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    fn set_max_active(&self, limit: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.max_active = limit.max(1);
        }
        self.available.notify_all();
    }

    fn stats(&self) -> BrokerStats {
        let Ok(mut state) = self.state.lock() else {
            return BrokerStats::default();
        };
        state.sweep(self.stall_timeout);
        let mut recent: Vec<FailureRecord> =
            state.failed.iter().map(|(record, _)| record.clone()).collect();
        recent.reverse();
        recent.truncate(RECENT_FAILURES);
        BrokerStats {
            waiting: state.waiting.len(),
            active: state.active.len(),
            delayed: state.delayed.len(),
            completed: state.completed,
            failed: state.failed.len(),
            recent_failures: recent,
        }
    }

    fn clean_failed(&self, older_than: StdDuration) -> usize {
        let Ok(mut state) = self.state.lock() else { return 0 };
        let before = state.failed.len();
        state.failed.retain(|(_, at)| at.elapsed() < older_than);
        before - state.failed.len()
    }

    fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn request(priority: Priority, dedup: Option<&str>) -> EnqueueRequest {
        EnqueueRequest {
            payload: JobPayload::DataCleanup { older_than_years: 3 },
            priority,
            max_attempts: 3,
            delay: StdDuration::ZERO,
            dedup_id: dedup.map(str::to_string),
            id_hint: None,
        }
    }

    #[test]
    fn test_priority_then_fifo() {
        let broker = MemoryBroker::default();
        let low = broker.enqueue(request(Priority::Low, None)).unwrap();
        let normal_a = broker.enqueue(request(Priority::Normal, None)).unwrap();
        let normal_b = broker.enqueue(request(Priority::Normal, None)).unwrap();
        let high = broker.enqueue(request(Priority::High, None)).unwrap();

        let order: Vec<String> = (0..4)
            .map(|_| {
                let job = broker.dequeue(StdDuration::from_millis(50)).unwrap();
                broker.complete(&job.id).unwrap();
                job.id
            })
            .collect();
        assert_eq!(order, vec![high, normal_a, normal_b, low]);
    }

    #[test]
    fn test_dedup_holds_one_job() {
        let broker = MemoryBroker::default();
        let first = broker
            .enqueue(request(Priority::Low, Some("monthly-2025-7")))
            .unwrap();
        let second = broker
            .enqueue(request(Priority::Low, Some("monthly-2025-7")))
            .unwrap();
        assert_eq!(first, "monthly-2025-7");
        assert_eq!(first, second);
        assert_eq!(broker.stats().waiting, 1);
    }

    #[test]
    fn test_concurrent_dedup_still_single() {
        let broker = std::sync::Arc::new(MemoryBroker::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let b = broker.clone();
                thread::spawn(move || b.enqueue(request(Priority::Low, Some("monthly-2025-7"))))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "monthly-2025-7");
        }
        assert_eq!(broker.stats().waiting, 1);
    }

    #[test]
    fn test_delayed_visibility() {
        let broker = MemoryBroker::default();
        broker
            .enqueue(EnqueueRequest {
                delay: StdDuration::from_millis(80),
                ..request(Priority::Normal, None)
            })
            .unwrap();
        assert_eq!(broker.stats().delayed, 1);
        assert!(broker.dequeue(StdDuration::from_millis(10)).is_none());
        let job = broker.dequeue(StdDuration::from_millis(500)).expect("promoted");
        assert_eq!(job.state, JobState::Active);
    }

    #[test]
    fn test_retry_backoff_then_terminal_failure() {
        let broker = MemoryBroker::default();
        broker.enqueue(request(Priority::Normal, None)).unwrap();

        for attempt in 1..=3 {
            let job = broker.dequeue(StdDuration::from_millis(400)).expect("job runnable");
            assert_eq!(job.attempts, attempt);
            broker.fail(&job.id, "boom", StdDuration::from_millis(1)).unwrap();
        }
        let stats = broker.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.recent_failures.len(), 1);
        assert_eq!(stats.recent_failures[0].reason, "boom");
        assert!(broker.dequeue(StdDuration::from_millis(20)).is_none());
    }

    #[test]
    fn test_stall_requeues_then_fails() {
        let broker = MemoryBroker::with_stall_timeout(StdDuration::from_millis(40));
        broker.enqueue(request(Priority::Normal, None)).unwrap();

        // first stall: silently re-queued
        let job = broker.dequeue(StdDuration::from_millis(50)).unwrap();
        thread::sleep(StdDuration::from_millis(60));
        let again = broker.dequeue(StdDuration::from_millis(100)).expect("requeued");
        assert_eq!(again.id, job.id);

        // second stall: terminal
        thread::sleep(StdDuration::from_millis(60));
        assert!(broker.dequeue(StdDuration::from_millis(100)).is_none());
        let stats = broker.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.recent_failures[0].reason, "stalled");
    }

    #[test]
    fn test_max_active_ceiling() {
        let broker = MemoryBroker::default();
        broker.set_max_active(1);
        broker.enqueue(request(Priority::Normal, None)).unwrap();
        broker.enqueue(request(Priority::Normal, None)).unwrap();

        let first = broker.dequeue(StdDuration::from_millis(50)).unwrap();
        assert!(broker.dequeue(StdDuration::from_millis(50)).is_none());
        broker.complete(&first.id).unwrap();
        assert!(broker.dequeue(StdDuration::from_millis(200)).is_some());
    }

    #[test]
    fn test_heartbeat_keeps_job_active() {
        let broker = MemoryBroker::with_stall_timeout(StdDuration::from_millis(60));
        broker.enqueue(request(Priority::Normal, None)).unwrap();
        let job = broker.dequeue(StdDuration::from_millis(50)).unwrap();
        for _ in 0..4 {
            thread::sleep(StdDuration::from_millis(30));
            broker.heartbeat(&job.id).unwrap();
        }
        assert_eq!(broker.stats().active, 1);
        broker.complete(&job.id).unwrap();
        assert_eq!(broker.stats().completed, 1);
    }

    #[test]
    fn test_clean_failed() {
        let broker = MemoryBroker::default();
        broker.enqueue(EnqueueRequest { max_attempts: 1, ..request(Priority::Normal, None) }).unwrap();
        let job = broker.dequeue(StdDuration::from_millis(50)).unwrap();
        broker.fail(&job.id, "boom", StdDuration::from_millis(1)).unwrap();
        assert_eq!(broker.stats().failed, 1);
        assert_eq!(broker.clean_failed(StdDuration::ZERO), 1);
        assert_eq!(broker.stats().failed, 0);
    }
}
