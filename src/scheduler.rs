/*
 *  scheduler.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Preset scheduler / render loop
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

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::canvas::{FrameCanvas, MatrixDriver};
use crate::plugin::PluginManager;
use crate::provider::ImageProvider;
use crate::runtime::{ControlEvent, RuntimeHandle};
use crate::scene::{Scene, SceneFlow};

/// Sleep between retries when the current preset cannot produce a scene
/// (empty list or zero total weight).
const STARVATION_BACKOFF: Duration = Duration::from_millis(300);

/// Starvation is logged at most this often to keep it out of the log spam
/// category.
const STARVATION_LOG_EVERY: Duration = Duration::from_secs(5);

/// Idle sleep while rendering is disabled.
const DISABLED_IDLE: Duration = Duration::from_millis(300);

/// Walk `weights` accumulating; the first index whose cumulative weight
/// reaches `r` wins. Deterministic for a given draw: ties break on the
/// first match in iteration order.
pub fn select_index(weights: &[i64], r: i64) -> Option<usize> {
    let mut acc: i64 = 0;
    for (i, w) in weights.iter().enumerate() {
        acc += (*w).max(0);
        if acc >= r {
            return Some(i);
        }
    }
    None
}

/// A materialized scene plus the identity used in diagnostics.
struct LiveScene {
    scene: Box<dyn Scene>,
    plugin: String,
}

/// The top-level driver: owns the render thread's loop, selects scenes by
/// weight, runs each for its duration window and reacts to the dirty, skip
/// and shutdown flags within one preemption interval.
///
/// This is the only code that calls into `Scene` methods, so plugin authors
/// never need thread-safe rendering state.
pub struct Scheduler {
    handle: RuntimeHandle,
    plugins: Arc<PluginManager>,
    rng: StdRng,
    last_starvation_log: Option<Instant>,
}

impl Scheduler {
    pub fn new(handle: RuntimeHandle, plugins: Arc<PluginManager>) -> Self {
        Self::with_rng(handle, plugins, StdRng::from_os_rng())
    }

    /// Deterministic constructor for tests.
    pub fn with_rng(handle: RuntimeHandle, plugins: Arc<PluginManager>, rng: StdRng) -> Self {
        Self {
            handle,
            plugins,
            rng,
            last_starvation_log: None,
        }
    }

    /// Run until shutdown is requested. Owns the canvas double buffer; the
    /// only blocking waits in here are the vsync swap and bounded naps.
    pub fn run(&mut self, matrix: &mut dyn MatrixDriver) {
        info!("Render loop started ({}x{})", matrix.width(), matrix.height());

        let mut canvas = matrix.create_canvas();
        let mut active_schedule_preset: Option<String> = None;

        while !self.handle.is_shutdown() {
            self.apply_schedules(&mut active_schedule_preset);

            if !self.handle.is_rendering_enabled() {
                matrix.clear();
                std::thread::sleep(DISABLED_IDLE);
                continue;
            }

            canvas = self.run_preset(matrix, canvas);
        }

        info!("Render loop stopped");
    }

    /// Swap the current preset when a schedule window opens or closes.
    fn apply_schedules(&mut self, active: &mut Option<String>) {
        if !self.handle.store().is_scheduling_enabled() {
            return;
        }

        match self.handle.store().active_scheduled_preset() {
            Some(preset) => {
                if active.as_deref() != Some(preset.as_str()) {
                    debug!("Switching to scheduled preset '{}'", preset);
                    self.handle.store().set_current_preset(preset.clone());
                    self.handle.set_rendering_enabled(true);
                    *active = Some(preset);
                }
            }
            None => {
                if active.take().is_some() {
                    debug!("No active schedule, blanking the panel");
                    self.handle.set_rendering_enabled(false);
                }
            }
        }
    }

    /// Materialize the current preset and run scheduling cycles against it
    /// until the configuration goes dirty, rendering is disabled or
    /// shutdown is requested.
    fn run_preset(&mut self, matrix: &mut dyn MatrixDriver, mut canvas: FrameCanvas) -> FrameCanvas {
        // we are about to read the freshest preset; clear stale dirtiness
        self.handle.store().take_dirty();

        let Some(preset) = self.handle.store().current_preset() else {
            self.log_starvation("no current preset");
            std::thread::sleep(STARVATION_BACKOFF);
            return canvas;
        };

        // Scene instances live for exactly one preset generation. A scene
        // whose stored config no longer constructs is skipped, not fatal.
        let mut scenes: Vec<LiveScene> = Vec::new();
        for cfg in &preset.scenes {
            let plugin = self
                .plugins
                .owner_of_scene_type(&cfg.type_name)
                .unwrap_or("<none>")
                .to_string();
            match self.plugins.materialize_scene(cfg) {
                Ok(scene) => scenes.push(LiveScene { scene, plugin }),
                Err(e) => error!("Skipping scene '{}': {}", cfg.type_name, e),
            }
        }

        let mut providers: Vec<Box<dyn ImageProvider>> = Vec::new();
        for cfg in &preset.providers {
            match self.plugins.materialize_provider(cfg) {
                Ok(mut provider) => {
                    provider.flush();
                    providers.push(provider);
                }
                Err(e) => error!("Skipping image provider '{}': {}", cfg.type_name, e),
            }
        }

        for live in &mut scenes {
            if !live.scene.core().is_initialized() {
                live.scene.initialize(&canvas);
            }
        }

        loop {
            if self.handle.is_shutdown()
                || !self.handle.is_rendering_enabled()
                || self.handle.store().is_dirty()
            {
                break;
            }

            let weights: Vec<i64> = scenes.iter().map(|l| l.scene.core().weight()).collect();
            let total: i64 = weights.iter().sum();

            if scenes.is_empty() || total == 0 {
                self.log_starvation("no scene eligible for selection (total weight 0)");
                std::thread::sleep(STARVATION_BACKOFF);
                continue;
            }

            let r = self.rng.random_range(0..=total);
            let Some(index) = select_index(&weights, r) else {
                // unreachable with r <= total; guard anyway
                error!("Could not find scene to display.");
                std::thread::sleep(STARVATION_BACKOFF);
                continue;
            };

            let live = &mut scenes[index];
            self.handle.notify(ControlEvent::ActiveSceneChanged {
                uuid: live.scene.core().uuid().to_string(),
                name: live.scene.name().to_string(),
            });

            canvas = self.run_scene_window(matrix, canvas, live);
        }

        canvas
    }

    /// One active window: render the selected scene until its duration
    /// elapses, it reports done, or a preemption flag trips. Ends with
    /// exactly one `after_render_stop`.
    fn run_scene_window(
        &mut self,
        matrix: &mut dyn MatrixDriver,
        mut canvas: FrameCanvas,
        live: &mut LiveScene,
    ) -> FrameCanvas {
        let duration = Duration::from_millis(live.scene.core().duration_ms() as u64);
        let end = Instant::now() + duration;

        // a skip left over from a previous window must not kill this one
        self.handle.take_skip();

        debug!(
            "Scene '{}' active for up to {}ms",
            live.scene.name(),
            duration.as_millis()
        );

        loop {
            if Instant::now() >= end
                || self.handle.is_shutdown()
                || !self.handle.is_rendering_enabled()
                || self.handle.store().is_dirty()
            {
                break;
            }
            if self.handle.take_skip() {
                debug!("Skip requested, ending active window");
                break;
            }

            if live.scene.core_mut().pacer_mut().frame_due() {
                let outcome = catch_unwind(AssertUnwindSafe(|| live.scene.render(&mut canvas)));
                match outcome {
                    Ok(SceneFlow::Continue) => {
                        canvas = matrix.swap_on_vsync(canvas);
                    }
                    Ok(SceneFlow::Done) => break,
                    Err(payload) => {
                        error!(
                            "Scene '{}' (plugin '{}') panicked in render: {}",
                            live.scene.name(),
                            live.plugin,
                            panic_message(&payload)
                        );
                        break;
                    }
                }
            } else {
                std::thread::sleep(live.scene.core().pacer().nap());
            }
        }

        // must run before any other scene touches the canvas
        let name = live.scene.name().to_string();
        if catch_unwind(AssertUnwindSafe(|| live.scene.after_render_stop(&mut canvas))).is_err() {
            error!(
                "Scene '{}' (plugin '{}') panicked in after_render_stop",
                name, live.plugin
            );
        }

        canvas
    }

    fn log_starvation(&mut self, reason: &str) {
        let due = self
            .last_starvation_log
            .map(|t| t.elapsed() >= STARVATION_LOG_EVERY)
            .unwrap_or(true);
        if due {
            warn!("Scheduler starved: {} (retrying)", reason);
            self.last_starvation_log = Some(Instant::now());
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
