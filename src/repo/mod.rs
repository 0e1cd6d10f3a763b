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

//! Persistence capability ports. The service layer only sees these traits;
//! the in-process reference implementations live in [`memory`].

pub mod memory;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{Event, Setting, Site};

/// Deletion/regeneration scope for cached events of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Year(i32),
    Month(i32, u32),
    Day(NaiveDate),
}

impl EventScope {
    pub fn contains(&self, event: &Event) -> bool {
        match *self {
            EventScope::Year(year) => event.calculation_year == year,
            EventScope::Month(year, month) => {
                event.calculation_year == year && event.event_date.month() == month
            }
            EventScope::Day(date) => event.event_date == date,
        }
    }
}

pub trait SiteRepository: Send + Sync {
    /// Insert a site; an id of 0 means "assign one".
    fn insert(&self, site: Site) -> Result<Site>;
    fn update(&self, site: Site) -> Result<Site>;
    fn delete(&self, id: i64) -> Result<()>;
    fn get(&self, id: i64) -> Result<Option<Site>>;
    fn list(&self) -> Result<Vec<Site>>;
}

pub trait EventRepository: Send + Sync {
    /// Atomically replace every event of `site_id` inside `scope` with the
    /// given set. Readers see the old set or the new set, never a mix.
    /// Returns the number of events inserted.
    fn replace_scope(&self, site_id: i64, scope: EventScope, events: Vec<Event>) -> Result<usize>;

    /// Cascade used by site deletion.
    fn delete_for_site(&self, site_id: i64) -> Result<usize>;

    /// Maintenance: drop events dated before `cutoff`.
    fn delete_before(&self, cutoff: NaiveDate) -> Result<usize>;

    /// Events with `event_date` inside the inclusive range, time-ordered.
    fn by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>>;

    fn by_date(&self, date: NaiveDate) -> Result<Vec<Event>>;

    /// Events strictly after `after`, ascending, at most `limit`.
    fn upcoming(&self, after: DateTime<Utc>, limit: usize) -> Result<Vec<Event>>;

    fn for_site_year(&self, site_id: i64, year: i32) -> Result<Vec<Event>>;

    fn for_year(&self, year: i32) -> Result<Vec<Event>>;
}

pub trait SettingRepository: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Setting>>;
    fn upsert(&self, setting: Setting) -> Result<()>;
    /// Bootstrap helper; returns true when the row was created.
    fn insert_if_absent(&self, setting: Setting) -> Result<bool>;
    fn list(&self) -> Result<Vec<Setting>>;
}
