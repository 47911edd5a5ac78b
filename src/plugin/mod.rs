/*
 *  plugin/mod.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Plugin runtime: module registry, lifecycle phases, factory queries
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

pub mod source;

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};
use thiserror::Error;

use crate::provider::{ImageProvider, ImageProviderFactory};
use crate::runtime::RuntimeHandle;
use crate::scene::fallback::FallbackScene;
use crate::scene::property::PropertyError;
use crate::scene::{Scene, SceneFactory};
use crate::store::{ProviderConfig, SceneConfig};
use source::{LoadedModule, ModuleSource};

/// A dynamically loaded unit that manufactures scenes and image providers
/// and participates in startup/shutdown.
///
/// Hooks take `&self`; plugins that own background state guard it
/// internally (the render thread and control plane never hand a plugin an
/// exclusive borrow).
pub trait Plugin: Send + Sync + 'static {
    fn create_scenes(&self) -> Vec<Box<dyn SceneFactory>>;

    fn create_image_providers(&self) -> Vec<Box<dyn ImageProviderFactory>> {
        Vec::new()
    }

    /// Runs before the control plane opens network ports. An error here
    /// aborts startup with the returned diagnostic.
    fn before_server_init(&self, _handle: &RuntimeHandle) -> Result<(), String> {
        Ok(())
    }

    /// Runs after the control plane is listening. Errors are logged only.
    fn post_init(&self, _handle: &RuntimeHandle) -> Result<(), String> {
        Ok(())
    }

    /// Drain/cleanup before process shutdown. Errors are logged only.
    fn pre_exit(&self, _handle: &RuntimeHandle) -> Result<(), String> {
        Ok(())
    }

    /// Capability hook for [`PluginManager::find_plugin`].
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    BeforeServerInit,
    PostInit,
    PreExit,
}

#[derive(Debug, Error)]
pub enum PluginRuntimeError {
    #[error("no plugin modules loaded ({attempted} attempted)")]
    NoModulesLoaded { attempted: usize },
    #[error("plugin '{plugin}' failed in {phase:?}: {message}")]
    LifecycleFailed {
        plugin: String,
        phase: LifecyclePhase,
        message: String,
    },
}

/// A scene factory tagged with the plugin that owns it, for diagnostics.
#[derive(Clone)]
pub struct RegisteredSceneFactory {
    pub plugin: String,
    pub factory: Arc<dyn SceneFactory>,
    pub type_name: String,
}

/// An image-provider factory tagged with its owning plugin.
#[derive(Clone)]
pub struct RegisteredProviderFactory {
    pub plugin: String,
    pub factory: Arc<dyn ImageProviderFactory>,
    pub type_name: String,
}

/// Registry of loaded plugin modules and the factories they contribute.
///
/// Loading happens once before the render thread starts; unloading once
/// after it stops. In between, the manager is shared immutably.
pub struct PluginManager {
    modules: Vec<LoadedModule>,
    scenes: Vec<RegisteredSceneFactory>,
    providers: Vec<RegisteredProviderFactory>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("modules", &self.modules.len())
            .field("scenes", &self.scenes.len())
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl PluginManager {
    /// Load every module `source` finds under `dir`. A module that fails to
    /// satisfy the contract is logged and skipped; the whole load only
    /// fails when candidates existed and none of them loaded.
    pub fn discover_and_load(
        source: &mut dyn ModuleSource,
        dir: &Path,
    ) -> Result<Self, PluginRuntimeError> {
        let reports = source.load_all(dir);
        let attempted = reports.len();

        let mut modules = Vec::new();
        for report in reports {
            match report.outcome {
                Ok(module) => modules.push(module),
                Err(e) => {
                    error!(
                        "Failed to load plugin '{}': {}",
                        report.location.display(),
                        e
                    );
                }
            }
        }

        if attempted > 0 && modules.is_empty() {
            return Err(PluginRuntimeError::NoModulesLoaded { attempted });
        }

        let mut scenes = Vec::new();
        let mut providers = Vec::new();
        for module in &modules {
            for factory in module.plugin().create_scenes() {
                let factory: Arc<dyn SceneFactory> = Arc::from(factory);
                let type_name = factory.name();
                if scenes
                    .iter()
                    .any(|s: &RegisteredSceneFactory| s.type_name == type_name)
                {
                    warn!(
                        "Scene type '{}' from plugin '{}' shadows an earlier registration",
                        type_name, module.name
                    );
                }
                scenes.push(RegisteredSceneFactory {
                    plugin: module.name.clone(),
                    factory,
                    type_name,
                });
            }

            for factory in module.plugin().create_image_providers() {
                let factory: Arc<dyn ImageProviderFactory> = Arc::from(factory);
                let type_name = factory.name();
                providers.push(RegisteredProviderFactory {
                    plugin: module.name.clone(),
                    factory,
                    type_name,
                });
            }
        }

        info!(
            "Loaded {} plugins, {} scene types, {} image provider types",
            modules.len(),
            scenes.len(),
            providers.len()
        );

        Ok(Self {
            modules,
            scenes,
            providers,
        })
    }

    /// Empty registry (no plugin directory configured).
    pub fn empty() -> Self {
        Self {
            modules: Vec::new(),
            scenes: Vec::new(),
            providers: Vec::new(),
        }
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Invoke one lifecycle hook on every plugin in load order. Only
    /// `BeforeServerInit` failures are fatal.
    pub fn run_lifecycle_phase(
        &self,
        phase: LifecyclePhase,
        handle: &RuntimeHandle,
    ) -> Result<(), PluginRuntimeError> {
        for module in &self.modules {
            let result = match phase {
                LifecyclePhase::BeforeServerInit => module.plugin().before_server_init(handle),
                LifecyclePhase::PostInit => module.plugin().post_init(handle),
                LifecyclePhase::PreExit => module.plugin().pre_exit(handle),
            };

            if let Err(message) = result {
                if phase == LifecyclePhase::BeforeServerInit {
                    return Err(PluginRuntimeError::LifecycleFailed {
                        plugin: module.name.clone(),
                        phase,
                        message,
                    });
                }
                error!("Plugin '{}' failed in {:?}: {}", module.name, phase, message);
            }
        }

        Ok(())
    }

    /// All scene factories across loaded plugins, in load order.
    pub fn scene_factories(&self) -> &[RegisteredSceneFactory] {
        &self.scenes
    }

    pub fn image_provider_factories(&self) -> &[RegisteredProviderFactory] {
        &self.providers
    }

    pub fn find_scene_factory(&self, type_name: &str) -> Option<&RegisteredSceneFactory> {
        self.scenes.iter().find(|s| s.type_name == type_name)
    }

    pub fn find_provider_factory(&self, type_name: &str) -> Option<&RegisteredProviderFactory> {
        self.providers.iter().find(|p| p.type_name == type_name)
    }

    /// Capability lookup: the first loaded plugin of concrete type `T`.
    /// Used when one plugin consumes data a sibling plugin produces; absence
    /// is a normal answer, never a panic.
    pub fn find_plugin<T: Plugin>(&self) -> Option<&T> {
        self.modules
            .iter()
            .find_map(|m| m.plugin().as_any().downcast_ref::<T>())
    }

    /// The plugin owning the given scene type, for diagnostics.
    pub fn owner_of_scene_type(&self, type_name: &str) -> Option<&str> {
        self.find_scene_factory(type_name).map(|s| s.plugin.as_str())
    }

    /// Build a live scene from its stored configuration. Unknown types get
    /// a [`FallbackScene`] so presets round-trip even with a plugin
    /// missing; malformed arguments are a construction error.
    pub fn materialize_scene(&self, cfg: &SceneConfig) -> Result<Box<dyn Scene>, PropertyError> {
        let mut scene = match self.find_scene_factory(&cfg.type_name) {
            Some(registered) => registered.factory.create_from_config(&cfg.arguments)?,
            None => {
                warn!(
                    "Unknown scene type '{}', substituting fallback",
                    cfg.type_name
                );
                let mut fallback = FallbackScene::new(cfg.type_name.clone());
                fallback.load_properties(&cfg.arguments)?;
                Box::new(fallback)
            }
        };

        if !cfg.uuid.is_empty() {
            scene.core_mut().set_uuid(cfg.uuid.clone());
        }
        scene.core_mut().ensure_uuid();

        Ok(scene)
    }

    /// Build a live image provider from its stored configuration.
    pub fn materialize_provider(
        &self,
        cfg: &ProviderConfig,
    ) -> Result<Box<dyn ImageProvider>, PropertyError> {
        let registered = self.find_provider_factory(&cfg.type_name).ok_or_else(|| {
            PropertyError::InvalidValue {
                name: "type".into(),
                reason: format!("unknown image provider type '{}'", cfg.type_name),
            }
        })?;

        registered.factory.create_from_config(&cfg.arguments)
    }

    /// Release every plugin through its module's destructor. Factories are
    /// dropped first; no scene instances may be alive at this point.
    pub fn destroy_plugins(&mut self) {
        info!("Destroying plugins...");
        self.scenes.clear();
        self.providers.clear();
        for module in &mut self.modules {
            module.destroy();
        }
    }
}
