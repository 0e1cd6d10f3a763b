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

//! Typed, runtime-mutable tuning values with a short-TTL read cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::Result;
use crate::models::{Setting, SettingValue};
use crate::repo::SettingRepository;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CachedEntry {
    value: Option<SettingValue>,
    fetched_at: Instant,
}

pub struct SettingsStore {
    repo: Arc<dyn SettingRepository>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedEntry>>,
}

impl SettingsStore {
    pub fn new(repo: Arc<dyn SettingRepository>, ttl: Duration) -> Self {
        SettingsStore {
            repo,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Seed every tuning key the core recognizes. Idempotent: existing rows
    /// are left untouched.
    pub fn bootstrap(&self) -> Result<()> {
        let seeds: &[(&str, &str, SettingValue, &str)] = &[
            ("azimuth_tolerance", "solver", SettingValue::Number(2.0), "Base azimuth tolerance in degrees"),
            ("elevation_tolerance", "solver", SettingValue::Number(1.0), "Base elevation tolerance in degrees"),
            ("search_interval", "solver", SettingValue::Number(60.0), "Default sweep step in seconds"),
            ("pearl_min_illumination", "solver", SettingValue::Number(0.1), "Drop pearl candidates dimmer than this"),
            ("accuracy_perfect_threshold", "accuracy", SettingValue::Number(0.1), "Azimuth residual for a perfect label"),
            ("accuracy_excellent_threshold", "accuracy", SettingValue::Number(0.25), "Azimuth residual for an excellent label"),
            ("accuracy_good_threshold", "accuracy", SettingValue::Number(0.4), "Azimuth residual for a good label"),
            ("accuracy_fair_threshold", "accuracy", SettingValue::Number(0.6), "Azimuth residual for a fair label"),
            ("elevation_accuracy_perfect_threshold", "accuracy", SettingValue::Number(0.1), "Elevation residual for a perfect label"),
            ("elevation_accuracy_excellent_threshold", "accuracy", SettingValue::Number(0.25), "Elevation residual for an excellent label"),
            ("elevation_accuracy_good_threshold", "accuracy", SettingValue::Number(0.4), "Elevation residual for a good label"),
            ("elevation_accuracy_fair_threshold", "accuracy", SettingValue::Number(0.6), "Elevation residual for a fair label"),
            ("worker_concurrency", "queue", SettingValue::Number(2.0), "Concurrent job slots per worker"),
            ("max_active_jobs", "queue", SettingValue::Number(10.0), "System-wide active job ceiling"),
            ("job_delay_ms", "queue", SettingValue::Number(1_000.0), "Base delay before non-high-priority jobs run"),
            ("processing_delay_ms", "queue", SettingValue::Number(500.0), "Pacing delay between years inside a site job"),
            ("enable_low_priority_mode", "queue", SettingValue::Flag(false), "Default newly scheduled jobs to low priority"),
        ];
        for (key, category, value, description) in seeds {
            self.repo.insert_if_absent(Setting {
                key: (*key).to_string(),
                category: (*category).to_string(),
                value: value.clone(),
                description: Some((*description).to_string()),
                editable: true,
                updated_at: Utc::now(),
            })?;
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<SettingValue> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(entry) = cache.get(key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return entry.value.clone();
                }
            }
            let value = self
                .repo
                .get(key)
                .ok()
                .flatten()
                .map(|setting| setting.value);
            cache.insert(
                key.to_string(),
                CachedEntry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                },
            );
            return value;
        }
        self.repo.get(key).ok().flatten().map(|s| s.value)
    }

    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.lookup(key).and_then(|v| v.as_number()).unwrap_or(default)
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.lookup(key).and_then(|v| v.as_flag()).unwrap_or(default)
    }

    pub fn text(&self, key: &str, default: &str) -> String {
        self.lookup(key)
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    /// Write-through upsert; the cached entry is invalidated, not refreshed.
    pub fn upsert(&self, key: &str, value: SettingValue) -> Result<Setting> {
        let existing = self.repo.get(key)?;
        let setting = match existing {
            Some(mut setting) => {
                setting.value = value;
                setting.updated_at = Utc::now();
                setting
            }
            None => Setting {
                key: key.to_string(),
                category: "custom".to_string(),
                value,
                description: None,
                editable: true,
                updated_at: Utc::now(),
            },
        };
        self.repo.upsert(setting.clone())?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(key);
        }
        Ok(setting)
    }

    pub fn get(&self, key: &str) -> Result<Option<Setting>> {
        self.repo.get(key)
    }

    pub fn list(&self) -> Result<Vec<Setting>> {
        self.repo.list()
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Bulk refresh: repopulate the cache from every stored row.
    pub fn refresh(&self) -> Result<()> {
        let all = self.repo.list()?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
            for setting in all {
                cache.insert(
                    setting.key.clone(),
                    CachedEntry {
                        value: Some(setting.value),
                        fetched_at: Instant::now(),
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::MemorySettingRepository;

    fn store(ttl: Duration) -> SettingsStore {
        SettingsStore::new(Arc::new(MemorySettingRepository::default()), ttl)
    }

    #[test]
    fn test_defaults_when_unset() {
        let store = store(DEFAULT_CACHE_TTL);
        assert_eq!(store.number("azimuth_tolerance", 2.0), 2.0);
        assert!(!store.flag("enable_low_priority_mode", false));
        assert_eq!(store.text("missing", "fallback"), "fallback");
    }

    #[test]
    fn test_upsert_invalidates_cache() {
        let store = store(DEFAULT_CACHE_TTL);
        assert_eq!(store.number("search_interval", 60.0), 60.0);
        store.upsert("search_interval", SettingValue::Number(120.0)).unwrap();
        assert_eq!(store.number("search_interval", 60.0), 120.0);
    }

    #[test]
    fn test_stale_read_within_ttl() {
        let store = store(Duration::from_secs(3_600));
        assert_eq!(store.number("job_delay_ms", 1_000.0), 1_000.0);
        // a direct repository write bypasses invalidation: the cached miss
        // keeps answering until the TTL lapses
        store
            .repo
            .upsert(Setting {
                key: "job_delay_ms".to_string(),
                category: "queue".to_string(),
                value: SettingValue::Number(5.0),
                description: None,
                editable: true,
                updated_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(store.number("job_delay_ms", 1_000.0), 1_000.0);
        store.clear_cache();
        assert_eq!(store.number("job_delay_ms", 1_000.0), 5.0);
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let store = store(DEFAULT_CACHE_TTL);
        store.bootstrap().unwrap();
        store.upsert("worker_concurrency", SettingValue::Number(7.0)).unwrap();
        store.bootstrap().unwrap();
        assert_eq!(store.number("worker_concurrency", 2.0), 7.0);
        assert!(store.list().unwrap().len() >= 17);
    }

    #[test]
    fn test_wrong_type_falls_back_to_default() {
        let store = store(DEFAULT_CACHE_TTL);
        store.upsert("search_interval", SettingValue::Text("fast".into())).unwrap();
        assert_eq!(store.number("search_interval", 60.0), 60.0);
    }
}
