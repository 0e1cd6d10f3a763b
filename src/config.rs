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

//! Service configuration: optional YAML file with environment overrides.

use std::env;
use std::fs::File;
use std::io::Read;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geometry::Apex;

pub fn default_tower_latitude() -> f64 {
    35.710_063
}

pub fn default_tower_longitude() -> f64 {
    139.810_700
}

pub fn default_structure_height() -> f64 {
    634.0
}

pub fn default_timezone_offset() -> f64 {
    9.0
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_port() -> u16 {
    3000
}

/// The fixed landmark and the deployment timezone.
#[derive(Debug, Clone, Deserialize)]
pub struct TowerConfig {
    #[serde(default = "default_tower_latitude")]
    pub latitude: f64,
    #[serde(default = "default_tower_longitude")]
    pub longitude: f64,
    #[serde(default = "default_structure_height")]
    pub structure_height_m: f64,
    #[serde(default = "default_timezone_offset")]
    pub timezone_offset_hours: f64,
}

impl Default for TowerConfig {
    fn default() -> Self {
        TowerConfig {
            latitude: default_tower_latitude(),
            longitude: default_tower_longitude(),
            structure_height_m: default_structure_height(),
            timezone_offset_hours: default_timezone_offset(),
        }
    }
}

impl TowerConfig {
    pub fn apex(&self) -> Apex {
        Apex {
            latitude: self.latitude,
            longitude: self.longitude,
            structure_height_m: self.structure_height_m,
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        let seconds = (self.timezone_offset_hours * 3_600.0) as i32;
        FixedOffset::east_opt(seconds)
            .unwrap_or_else(|| FixedOffset::east_opt(9 * 3_600).expect("static offset"))
    }
}

/// Queue broker wiring. The reference broker is in-process; host and port
/// describe the external broker a deployment would point at and feed the
/// startup ping log.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_redis_host")]
    pub redis_host: String,
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,
    /// Disables the queue subsystem entirely (degraded mode).
    #[serde(default)]
    pub disabled: bool,
    /// Keeps the queue up for enqueues but starts no worker in this process.
    #[serde(default)]
    pub worker_disabled: bool,
    /// Pins the worker width; when unset, the persisted setting decides.
    #[serde(default)]
    pub worker_concurrency: Option<usize>,
    #[serde(default)]
    pub scheduler_enabled: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            disabled: false,
            worker_disabled: false,
            worker_concurrency: None,
            scheduler_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tower: TowerConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default = "default_port")]
    pub port: u16,
    /// When set, day queries never fall back to on-demand solving.
    #[serde(default)]
    pub skip_direct_calculation: bool,
}

impl AppConfig {
    /// Load the YAML file, falling back to defaults when it is absent, then
    /// apply environment overrides.
    pub fn load(file_path: &str) -> Result<AppConfig> {
        let mut config = match File::open(file_path) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents)
                    .map_err(|e| Error::Config(format!("reading {file_path}: {e}")))?;
                serde_yaml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("parsing {file_path}: {e}")))?
            }
            Err(_) => {
                log::info!("configuration file {file_path} not found, using defaults");
                AppConfig::default()
            }
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = env::var("REDIS_HOST") {
            self.broker.redis_host = host;
        }
        if let Some(port) = env_number("REDIS_PORT") {
            self.broker.redis_port = port as u16;
        }
        if let Some(flag) = env_flag("DISABLE_REDIS") {
            self.broker.disabled = flag;
        }
        if let Some(flag) = env_flag("DISABLE_WORKER") {
            self.broker.worker_disabled = flag;
        }
        if let Some(flag) = env_flag("ENABLE_BACKGROUND_SCHEDULER") {
            self.broker.scheduler_enabled = flag;
        }
        if let Some(n) = env_number("WORKER_CONCURRENCY") {
            self.broker.worker_concurrency = Some((n as usize).clamp(1, 10));
        }
        if let Some(flag) = env_flag("SKIP_DIRECT_CALCULATION") {
            self.skip_direct_calculation = flag;
        }
        if let Some(port) = env_number("PORT") {
            self.port = port as u16;
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_number(name: &str) -> Option<i64> {
    env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_the_skytree() {
        let config = AppConfig::default();
        assert_eq!(config.tower.structure_height_m, 634.0);
        assert_eq!(config.tower.timezone().local_minus_utc(), 9 * 3_600);
        assert!(!config.broker.disabled);
    }

    #[test]
    fn test_yaml_overrides() {
        let config: AppConfig = serde_yaml::from_str(
            "tower:\n  latitude: 34.0\n  structure_height_m: 300.0\nbroker:\n  worker_concurrency: 4\n",
        )
        .unwrap();
        assert_eq!(config.tower.latitude, 34.0);
        assert_eq!(config.tower.structure_height_m, 300.0);
        assert_eq!(config.broker.worker_concurrency, Some(4));
        // untouched fields keep their defaults
        assert_eq!(config.tower.longitude, default_tower_longitude());
    }
}
