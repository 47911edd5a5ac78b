/*
 *  lib.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Library root: plugin runtime, scene contract, preset scheduler
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

//! # Luxel
//!
//! Luxel drives a physical pixel-matrix display by continuously selecting
//! and running scenes supplied by dynamically loaded plugin modules, while
//! a control plane concurrently edits which ones are active.
//!
//! The crate is organized around three pillars:
//!
//! - the plugin runtime ([`plugin`]): module discovery, lifecycle hooks,
//!   scene/image-provider factories;
//! - the scene contract and typed property system ([`scene`]);
//! - the preset scheduler / render loop ([`scheduler`]), reading the shared
//!   configuration store ([`store`]) that the control surface ([`control`])
//!   mutates.
//!
//! Dynamic plugins export `create_<module>` / `destroy_<module>` symbols;
//! in-process registries back tests and embedded hosts (see
//! [`plugin::source`]).

pub mod canvas;
pub mod config;
pub mod control;
pub mod pacer;
pub mod plugin;
pub mod provider;
pub mod runtime;
pub mod scene;
pub mod scheduler;
pub mod store;
pub mod uuid;

pub use canvas::{FrameCanvas, MatrixDriver, SimMatrix};
pub use control::{ApiError, ControlApi};
pub use plugin::{LifecyclePhase, Plugin, PluginManager};
pub use provider::{ImageFrame, ImageProvider, ImageProviderFactory};
pub use runtime::{ControlEvent, RuntimeHandle};
pub use scene::property::{Color, EnumTag, EnumValue, Property, PropertyError};
pub use scene::{Scene, SceneCore, SceneFactory, SceneFlow};
pub use scheduler::Scheduler;
pub use store::{ConfigStore, PresetConfig, SceneConfig};
