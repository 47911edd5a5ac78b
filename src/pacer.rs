/*
 *  pacer.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Frame pacing with preemption-bounded waits
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

use std::time::{Duration, Instant};

/// Hard ceiling on any single wait in the render loop, so preemption flags
/// (dirty, skip, shutdown) are observed at least this often.
pub const PREEMPTION_INTERVAL: Duration = Duration::from_millis(100);

/// Paces an activity to a target rate. Scenes declare a target FPS; the
/// scheduler renders a frame whenever the pacer says one is due and naps
/// for at most [`PREEMPTION_INTERVAL`] in between.
#[derive(Debug)]
pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        let frame = Duration::from_micros(1_000_000u64 / target_fps.max(1) as u64);
        Self {
            next_deadline: Instant::now(),
            frame,
        }
    }

    #[inline]
    pub fn set_fps(&mut self, fps: u32) {
        self.frame = Duration::from_micros(1_000_000u64 / fps.max(1) as u64);
    }

    /// Returns true if a frame is due now; if true, also schedules the next
    /// deadline.
    #[inline]
    pub fn frame_due(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }

    /// How long the caller may sleep before the next frame, never longer
    /// than [`PREEMPTION_INTERVAL`].
    #[inline]
    pub fn nap(&self) -> Duration {
        self.next_deadline
            .saturating_duration_since(Instant::now())
            .min(PREEMPTION_INTERVAL)
    }
}
