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

//! Domain types shared across the service layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    #[default]
    Active,
    Restricted,
}

/// A ground photography site. Apex-relative fields are derived from the
/// coordinates unless an operator pinned them explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub prefecture: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Ground elevation above sea level, meters.
    pub elevation: f64,
    /// Bearing from the site to the apex, degrees [0, 360).
    pub azimuth_to_apex: f64,
    /// Line-of-sight elevation angle to the apex, degrees.
    pub elevation_to_apex: f64,
    /// Ground distance to the apex base, meters.
    pub distance_to_apex: f64,
    pub access_notes: Option<String>,
    pub parking_notes: Option<String>,
    pub notes: Option<String>,
    pub status: SiteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire payload for creating, updating, importing and exporting sites.
/// Absent apex fields are recomputed from the coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub prefecture: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azimuth_to_apex: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_to_apex: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_to_apex: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parking_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: SiteStatus,
}

impl From<&Site> for SitePayload {
    fn from(site: &Site) -> Self {
        SitePayload {
            id: Some(site.id),
            name: site.name.clone(),
            prefecture: site.prefecture.clone(),
            latitude: site.latitude,
            longitude: site.longitude,
            elevation: site.elevation,
            azimuth_to_apex: Some(site.azimuth_to_apex),
            elevation_to_apex: Some(site.elevation_to_apex),
            distance_to_apex: Some(site.distance_to_apex),
            access_notes: site.access_notes.clone(),
            parking_notes: site.parking_notes.clone(),
            notes: site.notes.clone(),
            status: site.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    DiamondSunrise,
    DiamondSunset,
    PearlRising,
    PearlSetting,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DiamondSunrise => "diamond-sunrise",
            EventType::DiamondSunset => "diamond-sunset",
            EventType::PearlRising => "pearl-rising",
            EventType::PearlSetting => "pearl-setting",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "diamond-sunrise" => Ok(EventType::DiamondSunrise),
            "diamond-sunset" => Ok(EventType::DiamondSunset),
            "pearl-rising" => Ok(EventType::PearlRising),
            "pearl-setting" => Ok(EventType::PearlSetting),
            other => Err(Error::Validation(format!("unknown event type: {other}"))),
        }
    }

    pub fn is_diamond(&self) -> bool {
        matches!(self, EventType::DiamondSunrise | EventType::DiamondSunset)
    }

    pub fn is_pearl(&self) -> bool {
        !self.is_diamond()
    }
}

/// Coarse accuracy label, a step function over the alignment residuals.
/// Ordering is best-first so `max` picks the worse of two labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Perfect,
    Excellent,
    Good,
    Fair,
}

/// A computed alignment occurrence. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub site_id: i64,
    /// Calendar day in the observer's fixed timezone.
    pub event_date: NaiveDate,
    /// Precise instant, UTC.
    pub event_time: DateTime<Utc>,
    pub event_type: EventType,
    /// Body azimuth at the selected instant, degrees.
    pub celestial_azimuth: f64,
    /// Body apparent altitude at the selected instant, degrees.
    pub altitude: f64,
    /// Line-of-sight elevation to the apex (geometry, not the body).
    pub apex_elevation: f64,
    pub quality_score: u8,
    pub accuracy: Accuracy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moon_phase: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moon_illumination: Option<f64>,
    pub calculation_year: i32,
}

impl Event {
    /// Lower edge of the 5-degree altitude band the event falls in.
    pub fn elevation_band(&self) -> i32 {
        ((self.altitude / 5.0).floor() * 5.0) as i32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "settingType", content = "value")]
pub enum SettingValue {
    #[serde(rename = "number")]
    Number(f64),
    #[serde(rename = "string")]
    Text(String),
    #[serde(rename = "boolean")]
    Flag(bool),
}

impl SettingValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SettingValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SettingValue::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

/// A tuning value, keyed and typed. Exactly one typed value is populated by
/// construction of the enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub category: String,
    #[serde(flatten)]
    pub value: SettingValue,
    pub description: Option<String>,
    pub editable: bool,
    pub updated_at: DateTime<Utc>,
}
