/*
 *  scene/mod.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Scene contract: lifecycle, base properties, factories
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

pub mod fallback;
pub mod property;

use serde_json::{Map, Value};

use crate::canvas::FrameCanvas;
use crate::pacer::Pacer;
use crate::uuid::generate_uuid_v4;
use property::{DynProperty, Property, PropertyError};

/// Signal returned by [`Scene::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFlow {
    /// Keep calling render (until the duration window closes).
    Continue,
    /// The scene is naturally done; end its active window now.
    Done,
}

/// State every scene carries: identity, the weight/duration properties all
/// scenes share, the initialized flag and the frame pacer.
///
/// Concrete scenes embed one of these; the [`Scene`] trait reaches it
/// through `core()`/`core_mut()`.
#[derive(Debug)]
pub struct SceneCore {
    uuid: String,
    initialized: bool,
    width: u32,
    height: u32,
    target_fps: u32,
    pacer: Pacer,
    weight: Property<i64>,
    duration: Property<i64>,
}

impl SceneCore {
    pub fn new(default_weight: i64, default_duration_ms: i64) -> Self {
        Self {
            uuid: String::new(),
            initialized: false,
            width: 0,
            height: 0,
            target_fps: 60,
            pacer: Pacer::new(60),
            weight: Property::new("weight", default_weight),
            duration: Property::new("duration", default_duration_ms),
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.set_target_fps(fps);
        self
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn set_uuid(&mut self, uuid: impl Into<String>) {
        self.uuid = uuid.into();
    }

    /// Ensure the instance carries a uuid, generating one if none was
    /// supplied by configuration.
    pub fn ensure_uuid(&mut self) {
        if self.uuid.is_empty() {
            self.uuid = generate_uuid_v4();
        }
    }

    /// Relative selection probability; never negative.
    pub fn weight(&self) -> i64 {
        self.weight.value().max(0)
    }

    /// Milliseconds a selected scene stays active.
    pub fn duration_ms(&self) -> i64 {
        self.duration.value().max(0)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn set_target_fps(&mut self, fps: u32) {
        self.target_fps = fps.max(1);
        self.pacer.set_fps(self.target_fps);
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn pacer_mut(&mut self) -> &mut Pacer {
        &mut self.pacer
    }

    /// Render-target dimensions, valid once initialized.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn mark_initialized(&mut self, canvas: &FrameCanvas) {
        self.width = canvas.width();
        self.height = canvas.height();
        self.initialized = true;
    }

    fn load_base_properties(&mut self, args: &Map<String, Value>) -> Result<(), PropertyError> {
        self.weight.load_from_json(args)?;
        self.duration.load_from_json(args)?;
        Ok(())
    }

    fn dump_base_properties(&self, out: &mut Map<String, Value>) {
        self.weight.dump_to_json(out);
        self.duration.dump_to_json(out);
    }

    fn describe_base_properties(&self) -> Vec<Value> {
        vec![self.weight.describe(), self.duration.describe()]
    }
}

/// A pluggable unit that renders into the shared canvas for a bounded time
/// window.
///
/// Lifecycle: `initialize` runs exactly once before the first `render`;
/// `after_render_stop` runs once when an active window ends, before any
/// other scene touches the canvas. All three are called from the render
/// thread only, so implementations need no internal locking for their own
/// state.
///
/// `render` must not block for unbounded periods: long waits are expressed
/// through the core's target FPS so the scheduler's preemption checks stay
/// responsive (≤ 100 ms between checks).
pub trait Scene: Send {
    /// Scene type name, used as the `type` tag in preset JSON.
    fn name(&self) -> &str;

    fn core(&self) -> &SceneCore;

    fn core_mut(&mut self) -> &mut SceneCore;

    /// Scene-specific properties, in declaration order.
    fn scene_properties(&self) -> Vec<&dyn DynProperty> {
        Vec::new()
    }

    fn scene_properties_mut(&mut self) -> Vec<&mut dyn DynProperty> {
        Vec::new()
    }

    /// Setup hook, called once the render target is known.
    fn on_initialize(&mut self, _canvas: &FrameCanvas) {}

    /// Draw one frame. Returning [`SceneFlow::Done`] ends the active window
    /// early.
    fn render(&mut self, canvas: &mut FrameCanvas) -> SceneFlow;

    /// Teardown hook at the end of an active window; the canvas is still
    /// owned by this scene until this returns.
    fn after_render_stop(&mut self, _canvas: &mut FrameCanvas) {}

    /// Associate the scene with its render target. Guarded: calling it on an
    /// initialized scene is a no-op, though the scheduler avoids doing so.
    fn initialize(&mut self, canvas: &FrameCanvas) {
        if self.core().is_initialized() {
            return;
        }
        self.core_mut().mark_initialized(canvas);
        self.on_initialize(canvas);
    }

    /// Bind property values from configuration `arguments`. Missing
    /// non-required keys keep defaults; missing required keys fail.
    fn load_properties(&mut self, args: &Map<String, Value>) -> Result<(), PropertyError> {
        self.core_mut().load_base_properties(args)?;
        for p in self.scene_properties_mut() {
            p.load_from_json(args)?;
        }
        Ok(())
    }

    /// Serialize every declared property to its JSON value.
    fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        self.core().dump_base_properties(&mut out);
        for p in self.scene_properties() {
            p.dump_to_json(&mut out);
        }
        out
    }

    /// Property descriptors for the control plane's scene-type catalogue.
    fn describe_properties(&self) -> Vec<Value> {
        let mut out = self.core().describe_base_properties();
        out.extend(self.scene_properties().iter().map(|p| p.describe()));
        out
    }
}

/// Manufactures instances of one scene type. Owned by a plugin; outlives
/// every scene it produces.
pub trait SceneFactory: Send + Sync {
    /// Construct an instance with built-in defaults.
    fn create_default(&self) -> Box<dyn Scene>;

    /// Scene type name this factory produces.
    fn name(&self) -> String {
        self.create_default().name().to_string()
    }

    /// Construct from persisted/user-supplied configuration. Fails on
    /// missing required properties or malformed values.
    fn create_from_config(&self, args: &Map<String, Value>) -> Result<Box<dyn Scene>, PropertyError> {
        let mut scene = self.create_default();
        scene.load_properties(args)?;
        Ok(scene)
    }
}


#[cfg(test)]
mod tests {
    use super::testkit::ProbeScene;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_runs_hook_once() {
        let canvas = FrameCanvas::new(32, 16);
        let mut scene = ProbeScene::new();

        scene.initialize(&canvas);
        scene.initialize(&canvas);

        assert_eq!(scene.init_calls, 1);
        assert!(scene.core().is_initialized());
        assert_eq!(scene.core().dimensions(), (32, 16));
    }

    #[test]
    fn test_base_properties_round_trip() {
        let mut scene = ProbeScene::new();
        let args = json!({ "weight": 7, "duration": 2500, "speed": 2.5 });
        scene.load_properties(args.as_object().unwrap()).unwrap();

        assert_eq!(scene.core().weight(), 7);
        assert_eq!(scene.core().duration_ms(), 2500);

        let dumped = scene.to_json();
        assert_eq!(dumped["weight"], json!(7));
        assert_eq!(dumped["duration"], json!(2500));
        assert_eq!(dumped["speed"], json!(2.5));
    }

    #[test]
    fn test_negative_weight_clamps_to_zero() {
        let mut scene = ProbeScene::new();
        let args = json!({ "weight": -5 });
        scene.load_properties(args.as_object().unwrap()).unwrap();
        assert_eq!(scene.core().weight(), 0);
    }

    #[test]
    fn test_descriptors_include_base_and_scene_properties() {
        let scene = ProbeScene::new();
        let names: Vec<String> = scene
            .describe_properties()
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["weight", "duration", "speed"]);
    }

    #[test]
    fn test_ensure_uuid_generates_once() {
        let mut core = SceneCore::new(1, 1000);
        core.ensure_uuid();
        let first = core.uuid().to_string();
        assert_eq!(first.len(), 36);
        core.ensure_uuid();
        assert_eq!(core.uuid(), first);
    }
}
