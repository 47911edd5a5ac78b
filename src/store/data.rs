/*
 *  store/data.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Persisted configuration data model
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One scene entry inside a preset: the type tag resolved against the plugin
/// registry plus the opaque property arguments owned by that scene type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SceneConfig {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,

    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// One image-provider entry inside a preset.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,

    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// A named, weighted show: the scenes eligible for selection plus the image
/// providers they may consume.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PresetConfig {
    #[serde(default)]
    pub scenes: Vec<SceneConfig>,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// A time-of-day window that forces a preset while scheduling is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Schedule {
    #[serde(default)]
    pub name: String,

    pub preset_id: String,

    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,

    /// 0 = Sunday .. 6 = Saturday
    #[serde(default)]
    pub days_of_week: Vec<u8>,

    #[serde(default)]
    pub enabled: bool,
}

impl Schedule {
    /// Window length in minutes; shorter windows take priority when several
    /// schedules are active at once.
    pub fn duration_minutes(&self) -> i64 {
        let start = (self.start_hour * 60 + self.start_minute) as i64;
        let end = (self.end_hour * 60 + self.end_minute) as i64;
        if end >= start {
            end - start
        } else {
            // wraps past midnight
            24 * 60 - start + end
        }
    }

    /// Whether the window covers the given local time. Overnight windows
    /// match on the weekday they start.
    pub fn is_active_at(&self, hour: u32, minute: u32, day_of_week: u8) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.days_of_week.is_empty() && !self.days_of_week.contains(&day_of_week) {
            return false;
        }

        let t = (hour * 60 + minute) as i64;
        let start = (self.start_hour * 60 + self.start_minute) as i64;
        let end = (self.end_hour * 60 + self.end_minute) as i64;

        if end >= start {
            start <= t && t < end
        } else {
            t >= start || t < end
        }
    }
}

/// Root of the persisted JSON document.
///
/// Unknown top-level keys land in `extra` and are written back untouched, so
/// documents produced by newer builds survive a round-trip through this one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Root {
    #[serde(default)]
    pub presets: BTreeMap<String, PresetConfig>,

    #[serde(default)]
    pub curr: String,

    #[serde(default, rename = "pluginConfigs")]
    pub plugin_configs: BTreeMap<String, String>,

    #[serde(default)]
    pub schedules: BTreeMap<String, Schedule>,

    #[serde(default)]
    pub scheduling_enabled: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
