/*
 *  runtime.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Runtime handle: shared store, interrupt flags, control events
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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::store::ConfigStore;

/// Events fanned out to control-plane subscribers (the WebSocket layer
/// forwards these to connected clients).
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// The scheduler finished a cycle and a new scene is active.
    ActiveSceneChanged { uuid: String, name: String },
    /// Rendering was switched on or off.
    RenderingEnabled(bool),
}

struct HandleInner {
    store: Arc<ConfigStore>,

    /// Process-wide shutdown request; every loop drains within one polling
    /// interval of this going true.
    shutdown: AtomicBool,

    /// One-shot: end the current scene's active window early.
    skip: AtomicBool,

    /// Whether the render loop draws at all (panel blanked when false).
    rendering_enabled: AtomicBool,

    events: broadcast::Sender<ControlEvent>,
}

/// Cloneable handle to everything the scheduler, plugins and control plane
/// share. Constructed once in `main` and passed down; nothing in the crate
/// reaches for module-level globals.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Arc<HandleInner>,
}

impl RuntimeHandle {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(HandleInner {
                store,
                shutdown: AtomicBool::new(false),
                skip: AtomicBool::new(false),
                rendering_enabled: AtomicBool::new(true),
                events,
            }),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.inner.store
    }

    pub fn store_arc(&self) -> Arc<ConfigStore> {
        Arc::clone(&self.inner.store)
    }

    // --- shutdown ---------------------------------------------------------

    pub fn request_shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    // --- scene skip -------------------------------------------------------

    /// End the active scene's window at the next preemption check.
    pub fn request_skip(&self) {
        self.inner.skip.store(true, Ordering::Release);
    }

    /// Consume a pending skip request, returning whether one was set.
    pub fn take_skip(&self) -> bool {
        self.inner.skip.swap(false, Ordering::AcqRel)
    }

    // --- rendering enable/disable ----------------------------------------

    pub fn set_rendering_enabled(&self, enabled: bool) {
        self.inner.rendering_enabled.store(enabled, Ordering::Release);
        self.notify(ControlEvent::RenderingEnabled(enabled));
    }

    pub fn is_rendering_enabled(&self) -> bool {
        self.inner.rendering_enabled.load(Ordering::Acquire)
    }

    // --- config dirtiness -------------------------------------------------

    /// Called by the control plane after any preset/weight mutation that
    /// should preempt the active scene.
    pub fn mark_config_dirty(&self) {
        self.inner.store.mark_dirty();
    }

    // --- events -----------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.inner.events.subscribe()
    }

    /// Best-effort broadcast; silently dropped with no subscribers.
    pub fn notify(&self, event: ControlEvent) {
        let _ = self.inner.events.send(event);
    }
}
