/*
 *  Luxel Ambient Scenes Plugin
 *
 *  A dynamic plugin for the Luxel matrix scene host that provides a small
 *  pack of ambient animations and a procedural image provider.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

//! # Luxel Ambient Scene Pack
//!
//! Scenes provided:
//!
//! - `color_pulse` — a pulsing two-color pattern with selectable fill
//!   pattern and density
//! - `starfield` — drifting, twinkling stars
//!
//! Image providers:
//!
//! - `gradient` — procedural vertical gradients, no files needed
//!
//! Built as a `cdylib`; the host resolves `create_luxel_scenes_ambient`
//! and `destroy_luxel_scenes_ambient` at load time. The `rlib` target also
//! lets hosts link the pack statically through `AmbientScenesPlugin`.

mod gradient;
mod plugin;
mod scenes;

pub use plugin::{create_luxel_scenes_ambient, destroy_luxel_scenes_ambient, AmbientScenesPlugin};
pub use scenes::color_pulse::ColorPulseScene;
pub use scenes::starfield::StarfieldScene;
