/*
 *  control.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Semantic control surface bound by the external HTTP/WebSocket transport
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

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::plugin::PluginManager;
use crate::runtime::{ControlEvent, RuntimeHandle};
use crate::scene::property::PropertyError;
use crate::store::{PresetConfig, Schedule};
use crate::uuid::generate_uuid_v4;

/// Errors reflected back through the transport as HTTP error responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("preset '{0}' not found")]
    PresetNotFound(String),

    #[error("schedule '{0}' not found")]
    ScheduleNotFound(String),

    #[error("scene '{type_name}': {source}")]
    InvalidScene {
        type_name: String,
        #[source]
        source: PropertyError,
    },

    #[error("image provider '{type_name}': {source}")]
    InvalidProvider {
        type_name: String,
        #[source]
        source: PropertyError,
    },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// The operations the REST/WebSocket transport exposes. The transport owns
/// routing and encoding; everything semantic lives here so it can be tested
/// without a socket.
pub struct ControlApi {
    handle: RuntimeHandle,
    plugins: Arc<PluginManager>,
}

impl ControlApi {
    pub fn new(handle: RuntimeHandle, plugins: Arc<PluginManager>) -> Self {
        Self { handle, plugins }
    }

    // --- current preset ---------------------------------------------------

    pub fn current_preset_id(&self) -> String {
        self.handle.store().current_preset_id()
    }

    pub fn set_current_preset(&self, id: &str) -> Result<(), ApiError> {
        if self.handle.store().preset(id).is_none() {
            return Err(ApiError::PresetNotFound(id.to_string()));
        }
        self.handle.store().set_current_preset(id);
        Ok(())
    }

    // --- preset CRUD ------------------------------------------------------

    pub fn list_presets(&self) -> BTreeMap<String, PresetConfig> {
        self.handle.store().presets()
    }

    pub fn get_preset(&self, id: &str) -> Result<PresetConfig, ApiError> {
        self.handle
            .store()
            .preset(id)
            .ok_or_else(|| ApiError::PresetNotFound(id.to_string()))
    }

    /// Create or replace a preset. Every scene and provider entry is
    /// validated by constructing it; a missing required property or
    /// malformed value is rejected here, synchronously, never silently
    /// defaulted. Scene entries without a uuid get one so identity is
    /// stable across rematerializations.
    pub fn upsert_preset(&self, id: &str, mut preset: PresetConfig) -> Result<(), ApiError> {
        for scene in &mut preset.scenes {
            self.plugins
                .materialize_scene(scene)
                .map_err(|source| ApiError::InvalidScene {
                    type_name: scene.type_name.clone(),
                    source,
                })?;
            if scene.uuid.is_empty() {
                scene.uuid = generate_uuid_v4();
            }
        }

        for provider in &mut preset.providers {
            self.plugins
                .materialize_provider(provider)
                .map_err(|source| ApiError::InvalidProvider {
                    type_name: provider.type_name.clone(),
                    source,
                })?;
            if provider.uuid.is_empty() {
                provider.uuid = generate_uuid_v4();
            }
        }

        self.handle.store().set_preset(id, preset);
        Ok(())
    }

    pub fn delete_preset(&self, id: &str) -> Result<(), ApiError> {
        if !self.handle.store().delete_preset(id) {
            return Err(ApiError::PresetNotFound(id.to_string()));
        }
        Ok(())
    }

    // --- catalogue --------------------------------------------------------

    /// Every registered scene type with its declared properties (name,
    /// type, default, bounds or enum variants), tagged with the owning
    /// plugin.
    pub fn scene_types(&self) -> Vec<Value> {
        self.plugins
            .scene_factories()
            .iter()
            .map(|registered| {
                let default = registered.factory.create_default();
                json!({
                    "name": registered.type_name,
                    "plugin": registered.plugin,
                    "properties": default.describe_properties(),
                })
            })
            .collect()
    }

    pub fn provider_types(&self) -> Vec<Value> {
        self.plugins
            .image_provider_factories()
            .iter()
            .map(|registered| {
                let default = registered.factory.create_default();
                json!({
                    "name": registered.type_name,
                    "plugin": registered.plugin,
                    "properties": default.describe_properties(),
                })
            })
            .collect()
    }

    // --- plugin config blobs ---------------------------------------------

    pub fn plugin_config(&self, plugin: &str) -> Option<String> {
        self.handle.store().plugin_config(plugin)
    }

    pub fn set_plugin_config(&self, plugin: &str, config: String) {
        self.handle.store().set_plugin_config(plugin, config);
    }

    // --- runtime switches -------------------------------------------------

    /// Force-skip the active scene at its next preemption check.
    pub fn skip_current_scene(&self) {
        self.handle.request_skip();
    }

    pub fn set_rendering_enabled(&self, enabled: bool) {
        self.handle.set_rendering_enabled(enabled);
    }

    pub fn is_rendering_enabled(&self) -> bool {
        self.handle.is_rendering_enabled()
    }

    // --- schedules --------------------------------------------------------

    pub fn schedules(&self) -> BTreeMap<String, Schedule> {
        self.handle.store().schedules()
    }

    pub fn upsert_schedule(&self, id: &str, schedule: Schedule) -> Result<(), ApiError> {
        if schedule.start_hour > 23 || schedule.end_hour > 23 {
            return Err(ApiError::InvalidSchedule("hour must be 0..=23".into()));
        }
        if schedule.start_minute > 59 || schedule.end_minute > 59 {
            return Err(ApiError::InvalidSchedule("minute must be 0..=59".into()));
        }
        if schedule.days_of_week.iter().any(|&d| d > 6) {
            return Err(ApiError::InvalidSchedule(
                "day of week must be 0..=6 (Sunday = 0)".into(),
            ));
        }
        if self.handle.store().preset(&schedule.preset_id).is_none() {
            return Err(ApiError::PresetNotFound(schedule.preset_id.clone()));
        }

        self.handle.store().set_schedule(id, schedule);
        Ok(())
    }

    pub fn delete_schedule(&self, id: &str) -> Result<(), ApiError> {
        if !self.handle.store().delete_schedule(id) {
            return Err(ApiError::ScheduleNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn set_scheduling_enabled(&self, enabled: bool) {
        self.handle.store().set_scheduling_enabled(enabled);
    }

    pub fn is_scheduling_enabled(&self) -> bool {
        self.handle.store().is_scheduling_enabled()
    }

    // --- notifications ----------------------------------------------------

    /// Stream of scheduler/runtime events for the WebSocket fan-out.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ControlEvent> {
        self.handle.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::source::StaticModuleSource;
    use crate::plugin::{Plugin, PluginManager};
    use crate::scene::property::{DynProperty, Property};
    use crate::scene::{Scene, SceneCore, SceneFactory, SceneFlow};
    use crate::store::{ConfigStore, SceneConfig};
    use serde_json::json;
    use std::any::Any;
    use std::path::Path;

    struct TickerScene {
        core: SceneCore,
        text: Property<String>,
    }

    impl Scene for TickerScene {
        fn name(&self) -> &str {
            "ticker"
        }

        fn core(&self) -> &SceneCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SceneCore {
            &mut self.core
        }

        fn scene_properties(&self) -> Vec<&dyn DynProperty> {
            vec![&self.text]
        }

        fn scene_properties_mut(&mut self) -> Vec<&mut dyn DynProperty> {
            vec![&mut self.text]
        }

        fn render(&mut self, _canvas: &mut crate::canvas::FrameCanvas) -> SceneFlow {
            SceneFlow::Continue
        }
    }

    struct TickerFactory;

    impl SceneFactory for TickerFactory {
        fn create_default(&self) -> Box<dyn Scene> {
            Box::new(TickerScene {
                core: SceneCore::new(1, 10_000),
                text: Property::required("text", String::new()),
            })
        }
    }

    struct TickerPlugin;

    impl Plugin for TickerPlugin {
        fn create_scenes(&self) -> Vec<Box<dyn SceneFactory>> {
            vec![Box::new(TickerFactory)]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn api() -> ControlApi {
        let mut source = StaticModuleSource::new().register("ticker_pack", Box::new(TickerPlugin));
        let plugins =
            Arc::new(PluginManager::discover_and_load(&mut source, Path::new("/plugins")).unwrap());
        let handle = RuntimeHandle::new(Arc::new(ConfigStore::in_memory()));
        ControlApi::new(handle, plugins)
    }

    fn ticker_preset(args: Value) -> PresetConfig {
        PresetConfig {
            scenes: vec![SceneConfig {
                type_name: "ticker".into(),
                uuid: String::new(),
                arguments: args.as_object().unwrap().clone(),
            }],
            providers: vec![],
        }
    }

    #[test]
    fn test_upsert_rejects_missing_required_property() {
        let api = api();
        let err = api
            .upsert_preset("day", ticker_preset(json!({ "weight": 1 })))
            .unwrap_err();
        match err {
            ApiError::InvalidScene { type_name, source } => {
                assert_eq!(type_name, "ticker");
                assert!(matches!(source, PropertyError::MissingRequired(n) if n == "text"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(api.list_presets().is_empty());
    }

    #[test]
    fn test_upsert_backfills_scene_uuids() {
        let api = api();
        api.upsert_preset("day", ticker_preset(json!({ "text": "hi" })))
            .unwrap();

        let stored = api.get_preset("day").unwrap();
        assert_eq!(stored.scenes[0].uuid.len(), 36);
    }

    #[test]
    fn test_set_current_requires_existing_preset() {
        let api = api();
        assert!(matches!(
            api.set_current_preset("nope"),
            Err(ApiError::PresetNotFound(_))
        ));

        api.upsert_preset("day", ticker_preset(json!({ "text": "hi" })))
            .unwrap();
        api.set_current_preset("day").unwrap();
        assert_eq!(api.current_preset_id(), "day");
    }

    #[test]
    fn test_scene_type_catalogue_includes_descriptors() {
        let api = api();
        let types = api.scene_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0]["name"], json!("ticker"));
        assert_eq!(types[0]["plugin"], json!("ticker_pack"));

        let names: Vec<&str> = types[0]["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["weight", "duration", "text"]);
        let text = &types[0]["properties"].as_array().unwrap()[2];
        assert_eq!(text["required"], json!(true));
    }

    #[test]
    fn test_mutations_mark_store_dirty() {
        let api = api();
        api.upsert_preset("day", ticker_preset(json!({ "text": "hi" })))
            .unwrap();
        assert!(api.handle.store().take_dirty());

        api.set_plugin_config("ticker_pack", "{}".into());
        assert!(api.handle.store().is_dirty());
    }

    #[test]
    fn test_schedule_validation() {
        let api = api();
        api.upsert_preset("day", ticker_preset(json!({ "text": "hi" })))
            .unwrap();

        let mut schedule = Schedule {
            preset_id: "day".into(),
            start_hour: 8,
            start_minute: 0,
            end_hour: 17,
            end_minute: 0,
            enabled: true,
            ..Default::default()
        };
        api.upsert_schedule("office", schedule.clone()).unwrap();

        schedule.end_hour = 24;
        assert!(matches!(
            api.upsert_schedule("bad", schedule.clone()),
            Err(ApiError::InvalidSchedule(_))
        ));

        schedule.end_hour = 17;
        schedule.preset_id = "missing".into();
        assert!(matches!(
            api.upsert_schedule("bad", schedule),
            Err(ApiError::PresetNotFound(_))
        ));
    }

    #[test]
    fn test_skip_reaches_runtime_flag() {
        let api = api();
        api.skip_current_scene();
        assert!(api.handle.take_skip());
    }
}
