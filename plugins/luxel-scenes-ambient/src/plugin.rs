/*
 *  Luxel Ambient Scenes Plugin - registration
 *
 *  Implements the host's Plugin contract and exports the module entry
 *  points the loader resolves by name.
 */

use std::any::Any;

use log::debug;

use luxel::plugin::Plugin;
use luxel::provider::{ImageProvider, ImageProviderFactory};
use luxel::runtime::RuntimeHandle;
use luxel::{Scene, SceneFactory};

use crate::gradient::GradientProvider;
use crate::scenes::color_pulse::ColorPulseScene;
use crate::scenes::starfield::StarfieldScene;

struct ColorPulseFactory;

impl SceneFactory for ColorPulseFactory {
    fn create_default(&self) -> Box<dyn Scene> {
        Box::new(ColorPulseScene::new())
    }
}

struct StarfieldFactory;

impl SceneFactory for StarfieldFactory {
    fn create_default(&self) -> Box<dyn Scene> {
        Box::new(StarfieldScene::new())
    }
}

struct GradientFactory;

impl ImageProviderFactory for GradientFactory {
    fn create_default(&self) -> Box<dyn ImageProvider> {
        Box::new(GradientProvider::new())
    }
}

/// The ambient scene pack.
pub struct AmbientScenesPlugin;

impl Plugin for AmbientScenesPlugin {
    fn create_scenes(&self) -> Vec<Box<dyn SceneFactory>> {
        vec![Box::new(ColorPulseFactory), Box::new(StarfieldFactory)]
    }

    fn create_image_providers(&self) -> Vec<Box<dyn ImageProviderFactory>> {
        vec![Box::new(GradientFactory)]
    }

    fn post_init(&self, handle: &RuntimeHandle) -> Result<(), String> {
        if let Some(blob) = handle.store().plugin_config("luxel_scenes_ambient") {
            debug!("ambient pack config: {} bytes", blob.len());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Module constructor resolved by the plugin loader.
#[no_mangle]
pub fn create_luxel_scenes_ambient() -> *mut dyn Plugin {
    Box::into_raw(Box::new(AmbientScenesPlugin))
}

/// Module destructor; receives the pointer produced by the constructor.
///
/// # Safety
///
/// `plugin` must be the pointer returned by [`create_luxel_scenes_ambient`]
/// and must not be used afterwards.
#[no_mangle]
pub unsafe fn destroy_luxel_scenes_ambient(plugin: *mut dyn Plugin) {
    drop(Box::from_raw(plugin));
}
