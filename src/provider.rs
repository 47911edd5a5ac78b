/*
 *  provider.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Image provider contract - sources of frames for image-driven scenes
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

use serde_json::{Map, Value};

use crate::scene::property::{Color, DynProperty, PropertyError};

/// One decoded image, ready for a scene to blit. Download/decode/caching of
/// real image files happens outside this crate; providers here only hand
/// over pixels.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
    /// Where the frame came from, for diagnostics.
    pub source: String,
}

impl ImageFrame {
    pub fn solid(width: u32, height: u32, color: Color, source: impl Into<String>) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
            source: source.into(),
        }
    }
}

/// A configurable source of images attached to a preset.
///
/// Called only from the render thread. `next_image` returning `Ok(None)`
/// means "no frame available right now" - a normal, renderable state, never
/// something to block on.
pub trait ImageProvider: Send {
    /// Provider type name, used as the `type` tag in preset JSON.
    fn name(&self) -> &str;

    fn properties(&self) -> Vec<&dyn DynProperty> {
        Vec::new()
    }

    fn properties_mut(&mut self) -> Vec<&mut dyn DynProperty> {
        Vec::new()
    }

    fn next_image(&mut self) -> Result<Option<ImageFrame>, String>;

    /// Reset internal iteration state (start of a new active window).
    fn flush(&mut self);

    fn load_properties(&mut self, args: &Map<String, Value>) -> Result<(), PropertyError> {
        for p in self.properties_mut() {
            p.load_from_json(args)?;
        }
        Ok(())
    }

    fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for p in self.properties() {
            p.dump_to_json(&mut out);
        }
        out
    }

    fn describe_properties(&self) -> Vec<Value> {
        self.properties().iter().map(|p| p.describe()).collect()
    }
}

/// Manufactures instances of one provider type. Owned by a plugin.
pub trait ImageProviderFactory: Send + Sync {
    fn create_default(&self) -> Box<dyn ImageProvider>;

    fn name(&self) -> String {
        self.create_default().name().to_string()
    }

    fn create_from_config(
        &self,
        args: &Map<String, Value>,
    ) -> Result<Box<dyn ImageProvider>, PropertyError> {
        let mut provider = self.create_default();
        provider.load_properties(args)?;
        Ok(provider)
    }
}
