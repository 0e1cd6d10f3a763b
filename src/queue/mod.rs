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

//! Durable background work: job model, broker port, worker pool, scheduling
//! service, and the cron-style recurring trigger loop.

pub mod broker;
pub mod scheduler;
pub mod service;
pub mod worker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    SiteCalculation,
    MonthlyCalculation,
    DataCleanup,
}

/// Numeric execution priority; higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 5,
            Priority::High => 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobPayload {
    SiteCalculation {
        site_id: i64,
        start_year: i32,
        end_year: i32,
    },
    MonthlyCalculation {
        year: i32,
        month: u32,
        site_ids: Vec<i64>,
    },
    DataCleanup {
        older_than_years: u32,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::SiteCalculation { .. } => JobKind::SiteCalculation,
            JobPayload::MonthlyCalculation { .. } => JobKind::MonthlyCalculation,
            JobPayload::DataCleanup { .. } => JobKind::DataCleanup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub payload: JobPayload,
    pub priority: Priority,
    pub attempts: u32,
    pub max_attempts: u32,
    pub state: JobState,
    pub scheduled_at: DateTime<Utc>,
    pub last_error: Option<String>,
    /// Uniqueness key among non-terminal jobs, e.g. `monthly-2025-7`.
    pub dedup_id: Option<String>,
}

/// Consumer side of the queue. Handlers must be idempotent: delivery is
/// at-least-once.
pub trait JobHandler: Send + Sync {
    fn handle(&self, job: &Job) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_weights() {
        assert!(Priority::High.weight() > Priority::Normal.weight());
        assert!(Priority::Normal.weight() > Priority::Low.weight());
        assert!(Priority::High > Priority::Low);
    }

    #[test]
    fn test_payload_serde_tags() {
        let payload = JobPayload::MonthlyCalculation {
            year: 2025,
            month: 7,
            site_ids: vec![1, 2],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "monthly-calculation");
        assert_eq!(payload.kind(), JobKind::MonthlyCalculation);
    }
}
