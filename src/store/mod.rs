/*
 *  store/mod.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Shared configuration store: presets, schedules, plugin blobs, dirty flag
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

pub mod data;

use chrono::{Datelike, Local, Timelike};
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use thiserror::Error;

pub use data::{PresetConfig, ProviderConfig, Root, Schedule, SceneConfig};

/// Error type for store load/save.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The shared configuration store.
///
/// Control-plane threads read and mutate the data section under the RwLock;
/// the render thread polls only the dirty flag between frames. The flag
/// deliberately lives outside the data lock so that hot-path polling never
/// contends with a handler walking the full preset map.
pub struct ConfigStore {
    data: RwLock<Root>,
    dirty: AtomicBool,
    path: PathBuf,
}

impl ConfigStore {
    /// Load the store from `path`, or start from an empty document if the
    /// file does not exist yet (it is created on the first save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let root = if path.exists() {
            let text = fs::read_to_string(&path)?;
            serde_json::from_str(&text)?
        } else {
            debug!("No config at '{}', starting empty", path.display());
            Root::default()
        };

        Ok(Self {
            data: RwLock::new(root),
            dirty: AtomicBool::new(false),
            path,
        })
    }

    /// In-memory store for tests and embedded use.
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(Root::default()),
            dirty: AtomicBool::new(false),
            path: PathBuf::new(),
        }
    }

    pub fn save(&self) -> bool {
        if self.path.as_os_str().is_empty() {
            return true;
        }

        debug!("Acquiring lock to save config...");
        let data = self.data.read().unwrap();

        info!("Saving config at '{}'...", self.path.display());
        let out = match serde_json::to_string_pretty(&*data) {
            Ok(s) => s,
            Err(e) => {
                error!("Could not serialize config: {}", e);
                return false;
            }
        };

        if let Err(e) = fs::write(&self.path, out) {
            error!("Could not write to file '{}': {}", self.path.display(), e);
            return false;
        }

        info!("Done saving config.");
        true
    }

    // --- dirty flag -------------------------------------------------------

    /// Signal the render loop that the active configuration may have
    /// changed. Observed within one preemption-check interval.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    // --- presets ----------------------------------------------------------

    pub fn current_preset_id(&self) -> String {
        self.data.read().unwrap().curr.clone()
    }

    pub fn set_current_preset(&self, id: impl Into<String>) {
        self.data.write().unwrap().curr = id.into();
        self.mark_dirty();
    }

    /// Snapshot of the current preset, if it exists. Callers render from the
    /// clone; the lock is never held across plugin code.
    pub fn current_preset(&self) -> Option<PresetConfig> {
        let data = self.data.read().unwrap();
        data.presets.get(&data.curr).cloned()
    }

    pub fn presets(&self) -> BTreeMap<String, PresetConfig> {
        self.data.read().unwrap().presets.clone()
    }

    pub fn preset(&self, id: &str) -> Option<PresetConfig> {
        self.data.read().unwrap().presets.get(id).cloned()
    }

    pub fn set_preset(&self, id: impl Into<String>, preset: PresetConfig) {
        self.data.write().unwrap().presets.insert(id.into(), preset);
        self.mark_dirty();
    }

    pub fn delete_preset(&self, id: &str) -> bool {
        let removed = self.data.write().unwrap().presets.remove(id).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    // --- plugin config blobs ---------------------------------------------

    pub fn plugin_configs(&self) -> BTreeMap<String, String> {
        self.data.read().unwrap().plugin_configs.clone()
    }

    pub fn plugin_config(&self, plugin: &str) -> Option<String> {
        self.data.read().unwrap().plugin_configs.get(plugin).cloned()
    }

    pub fn set_plugin_config(&self, plugin: impl Into<String>, config: impl Into<String>) {
        self.data
            .write()
            .unwrap()
            .plugin_configs
            .insert(plugin.into(), config.into());
        self.mark_dirty();
    }

    // --- schedules --------------------------------------------------------

    pub fn schedules(&self) -> BTreeMap<String, Schedule> {
        self.data.read().unwrap().schedules.clone()
    }

    pub fn set_schedule(&self, id: impl Into<String>, schedule: Schedule) {
        self.data.write().unwrap().schedules.insert(id.into(), schedule);
        self.mark_dirty();
    }

    pub fn delete_schedule(&self, id: &str) -> bool {
        let removed = self.data.write().unwrap().schedules.remove(id).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub fn is_scheduling_enabled(&self) -> bool {
        self.data.read().unwrap().scheduling_enabled
    }

    pub fn set_scheduling_enabled(&self, enabled: bool) {
        self.data.write().unwrap().scheduling_enabled = enabled;
        self.mark_dirty();
    }

    /// The preset forced by the highest-priority active schedule, if any.
    /// Shorter windows outrank longer ones.
    pub fn active_scheduled_preset(&self) -> Option<String> {
        let now = Local::now();
        let day = now.weekday().num_days_from_sunday() as u8;
        self.active_scheduled_preset_at(now.hour(), now.minute(), day)
    }

    pub fn active_scheduled_preset_at(&self, hour: u32, minute: u32, day: u8) -> Option<String> {
        let data = self.data.read().unwrap();
        if !data.scheduling_enabled {
            return None;
        }

        data.schedules
            .values()
            .filter(|s| s.is_active_at(hour, minute, day))
            .min_by_key(|s| s.duration_minutes())
            .map(|s| s.preset_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scene(type_name: &str) -> SceneConfig {
        SceneConfig {
            type_name: type_name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dirty_flag_is_independent_of_data() {
        let store = ConfigStore::in_memory();
        assert!(!store.is_dirty());

        store.set_current_preset("day");
        assert!(store.is_dirty());
        assert!(store.take_dirty());
        assert!(!store.is_dirty());

        // reading data does not touch the flag
        let _ = store.current_preset_id();
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_current_preset_snapshot() {
        let store = ConfigStore::in_memory();
        assert!(store.current_preset().is_none());

        store.set_preset(
            "day",
            PresetConfig {
                scenes: vec![scene("rain")],
                providers: vec![],
            },
        );
        store.set_current_preset("day");

        let preset = store.current_preset().unwrap();
        assert_eq!(preset.scenes[0].type_name, "rain");
    }

    #[test]
    fn test_delete_preset_may_remove_current() {
        let store = ConfigStore::in_memory();
        store.set_preset("day", PresetConfig::default());
        store.set_current_preset("day");

        assert!(store.delete_preset("day"));
        assert!(!store.delete_preset("day"));
        // current id dangles; the scheduler degrades to its backoff path
        assert!(store.current_preset().is_none());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "luxel-store-test-{}.json",
            crate::uuid::generate_uuid_v4()
        ));

        {
            let store = ConfigStore::load(&path).unwrap();
            store.set_preset(
                "day",
                PresetConfig {
                    scenes: vec![SceneConfig {
                        type_name: "rain".into(),
                        uuid: "u-1".into(),
                        arguments: json!({ "weight": 2 }).as_object().unwrap().clone(),
                    }],
                    providers: vec![],
                },
            );
            store.set_current_preset("day");
            assert!(store.save());
        }

        let store = ConfigStore::load(&path).unwrap();
        assert_eq!(store.current_preset_id(), "day");
        let preset = store.current_preset().unwrap();
        assert_eq!(preset.scenes[0].arguments["weight"], json!(2));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_scheduled_preset_prefers_shortest_window() {
        let store = ConfigStore::in_memory();
        store.set_scheduling_enabled(true);
        store.set_schedule(
            "all-day",
            Schedule {
                preset_id: "ambient".into(),
                start_hour: 0,
                start_minute: 0,
                end_hour: 23,
                end_minute: 59,
                enabled: true,
                ..Default::default()
            },
        );
        store.set_schedule(
            "lunch",
            Schedule {
                preset_id: "lunch-show".into(),
                start_hour: 12,
                start_minute: 0,
                end_hour: 13,
                end_minute: 0,
                enabled: true,
                ..Default::default()
            },
        );

        assert_eq!(
            store.active_scheduled_preset_at(12, 30, 3),
            Some("lunch-show".to_string())
        );
        assert_eq!(
            store.active_scheduled_preset_at(9, 0, 3),
            Some("ambient".to_string())
        );

        store.set_scheduling_enabled(false);
        assert_eq!(store.active_scheduled_preset_at(12, 30, 3), None);
    }
}
