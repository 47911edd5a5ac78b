/*
 *  scene/fallback.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Placeholder scene for unknown scene types
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

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use serde_json::{Map, Value};

use crate::canvas::FrameCanvas;
use crate::scene::property::PropertyError;
use crate::scene::{Scene, SceneCore, SceneFlow};

/// Stands in for a scene type no loaded plugin provides (typically a preset
/// saved with a plugin that is currently missing).
///
/// Keeps the original `arguments` verbatim so the preset round-trips
/// unmodified, and renders a dim cross so the gap is visible on the panel.
pub struct FallbackScene {
    core: SceneCore,
    type_name: String,
    arguments: Map<String, Value>,
}

impl FallbackScene {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            // visible but rarely picked against real scenes
            core: SceneCore::new(1, 5000).with_fps(2),
            type_name: type_name.into(),
            arguments: Map::new(),
        }
    }

    /// The unknown type this instance stands in for.
    pub fn missing_type(&self) -> &str {
        &self.type_name
    }
}

impl Scene for FallbackScene {
    fn name(&self) -> &str {
        &self.type_name
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    // Keep the foreign arguments byte-for-byte; only weight/duration are
    // interpreted so the scheduler can still place the scene.
    fn load_properties(&mut self, args: &Map<String, Value>) -> Result<(), PropertyError> {
        self.arguments = args.clone();
        let known: Map<String, Value> = args
            .iter()
            .filter(|(k, _)| k.as_str() == "weight" || k.as_str() == "duration")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.core.load_base_properties(&known)
    }

    fn to_json(&self) -> Map<String, Value> {
        self.arguments.clone()
    }

    fn render(&mut self, canvas: &mut FrameCanvas) -> SceneFlow {
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        canvas.clear_black();

        let red = Rgb888::new(90, 0, 0);
        for x in 0..w {
            let y = x * h / w.max(1);
            let _ = canvas.draw_iter([
                Pixel(Point::new(x, y), red),
                Pixel(Point::new(x, h - 1 - y), red),
            ]);
        }

        SceneFlow::Continue
    }
}
