/*
 *  plugin/source.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Module sources - where plugins come from (shared libraries or in-process)
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

use std::path::{Path, PathBuf};

#[cfg(feature = "plugin-system")]
use log::{debug, info};

use super::Plugin;

/// Constructor symbol signature every dynamic plugin exports as
/// `create_<module_name>`.
pub type PluginCtor = unsafe fn() -> *mut dyn Plugin;

/// Destructor symbol signature, exported as `destroy_<module_name>`. The
/// host hands the pointer back to the module that allocated it.
pub type PluginDtor = unsafe fn(*mut dyn Plugin);

enum ModuleInner {
    /// In-process plugin; the box frees itself.
    Static(Box<dyn Plugin>),

    /// Plugin living in a shared library. The library must stay loaded for
    /// as long as the pointer is alive, so it is dropped last.
    #[cfg(feature = "plugin-system")]
    Dynamic {
        ptr: *mut dyn Plugin,
        destroy: PluginDtor,
        _lib: libloading::Library,
    },
}

/// A successfully loaded plugin module, tagged with its identity.
pub struct LoadedModule {
    pub name: String,
    pub location: PathBuf,
    inner: ModuleInner,
    destroyed: bool,
}

// Plugin implementations are Send + Sync by trait bound; the raw pointer in
// the dynamic variant points at exactly such an object.
unsafe impl Send for LoadedModule {}
unsafe impl Sync for LoadedModule {}

impl LoadedModule {
    pub fn new_static(name: impl Into<String>, location: PathBuf, plugin: Box<dyn Plugin>) -> Self {
        Self {
            name: name.into(),
            location,
            inner: ModuleInner::Static(plugin),
            destroyed: false,
        }
    }

    pub fn plugin(&self) -> &dyn Plugin {
        debug_assert!(!self.destroyed, "plugin accessed after destroy");
        match &self.inner {
            ModuleInner::Static(p) => p.as_ref(),
            #[cfg(feature = "plugin-system")]
            ModuleInner::Dynamic { ptr, .. } => unsafe { &**ptr },
        }
    }

    /// Release the plugin through the constructor's counterpart. Dynamic
    /// plugins are freed by the module that allocated them.
    pub(crate) fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        match &mut self.inner {
            ModuleInner::Static(_) => {}
            #[cfg(feature = "plugin-system")]
            ModuleInner::Dynamic { ptr, destroy, .. } => {
                let dtor = *destroy;
                unsafe { dtor(*ptr) };
            }
        }
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Result of one load attempt, so callers can log failures with identity.
pub struct ModuleReport {
    pub location: PathBuf,
    pub outcome: Result<LoadedModule, String>,
}

/// Where plugin modules come from. One production implementation loads
/// shared libraries; the static implementation backs tests and embedded
/// registries without any on-disk artifacts.
pub trait ModuleSource {
    /// Enumerate and load every candidate under `dir`. Failures are
    /// reported per module, never propagated - a broken module must not
    /// take its neighbors down.
    fn load_all(&mut self, dir: &Path) -> Vec<ModuleReport>;
}

/// Loads plugins from shared libraries in a directory.
///
/// A file `libworm_field.so` yields module name `worm_field` and must export
/// `create_worm_field` and `destroy_worm_field`.
#[cfg(feature = "plugin-system")]
pub struct DylibModuleSource;

#[cfg(feature = "plugin-system")]
impl DylibModuleSource {
    /// Module name for a library path: strip the `lib` prefix and extension,
    /// dashes become underscores.
    pub fn module_name(path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = stem.strip_prefix("lib").unwrap_or(&stem);
        stem.replace('-', "_")
    }

    /// The two required entry points for a module name.
    pub fn symbol_names(module: &str) -> (String, String) {
        (format!("create_{}", module), format!("destroy_{}", module))
    }

    fn is_candidate(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("so") | Some("dylib") | Some("dll")
        )
    }

    fn load_one(path: &Path) -> Result<LoadedModule, String> {
        let name = Self::module_name(path);
        let (create_name, destroy_name) = Self::symbol_names(&name);

        let lib = unsafe { libloading::Library::new(path) }
            .map_err(|e| format!("failed to load library: {}", e))?;

        // Resolve the destructor first; a module we could create but never
        // free is rejected up front (matches load-time isolation semantics).
        let destroy = unsafe {
            lib.get::<PluginDtor>(destroy_name.as_bytes())
                .map_err(|e| format!("expected symbol '{}' not found: {}", destroy_name, e))
                .map(|s| *s)?
        };

        let create = unsafe {
            lib.get::<PluginCtor>(create_name.as_bytes())
                .map_err(|e| format!("expected symbol '{}' not found: {}", create_name, e))
                .map(|s| *s)?
        };

        let ptr = unsafe { create() };
        if ptr.is_null() {
            return Err(format!("'{}' returned a null plugin", create_name));
        }

        info!("Loaded plugin '{}' from {}", name, path.display());

        Ok(LoadedModule {
            name,
            location: path.to_path_buf(),
            inner: ModuleInner::Dynamic {
                ptr,
                destroy,
                _lib: lib,
            },
            destroyed: false,
        })
    }
}

#[cfg(feature = "plugin-system")]
impl ModuleSource for DylibModuleSource {
    fn load_all(&mut self, dir: &Path) -> Vec<ModuleReport> {
        let mut reports = Vec::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Plugin directory '{}' not readable: {}", dir.display(), e);
                return reports;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && Self::is_candidate(p))
            .collect();
        candidates.sort();

        for path in candidates {
            reports.push(ModuleReport {
                outcome: Self::load_one(&path),
                location: path,
            });
        }

        reports
    }
}

/// In-process module source: a registry populated directly in code. Used by
/// tests and by hosts that compile their plugins in.
#[derive(Default)]
pub struct StaticModuleSource {
    entries: Vec<(String, Result<Box<dyn Plugin>, String>)>,
}

impl StaticModuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, plugin: Box<dyn Plugin>) -> Self {
        self.entries.push((name.into(), Ok(plugin)));
        self
    }

    /// Register a module that fails to load, for isolation tests.
    pub fn register_broken(mut self, name: impl Into<String>, error: impl Into<String>) -> Self {
        self.entries.push((name.into(), Err(error.into())));
        self
    }
}

impl ModuleSource for StaticModuleSource {
    fn load_all(&mut self, dir: &Path) -> Vec<ModuleReport> {
        self.entries
            .drain(..)
            .map(|(name, outcome)| {
                let location = dir.join(&name);
                ModuleReport {
                    outcome: outcome
                        .map(|plugin| LoadedModule::new_static(name, location.clone(), plugin)),
                    location,
                }
            })
            .collect()
    }
}
