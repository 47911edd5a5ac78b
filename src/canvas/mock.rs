/*
 *  canvas/mock.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Mock matrix driver for testing without hardware
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

use std::sync::{Arc, Mutex};

use embedded_graphics::pixelcolor::Rgb888;

use super::{FrameCanvas, MatrixDriver};

/// Mock matrix driver for tests and CI.
///
/// Records every operation and keeps the last presented frame around for
/// inspection. Swaps return immediately; there is no vsync wait.
pub struct MockMatrix {
    width: u32,
    height: u32,
    front: FrameCanvas,
    state: Arc<Mutex<MockMatrixState>>,
}

/// Shared counters, inspectable from the test while the scheduler owns the
/// driver on another thread.
#[derive(Debug, Default)]
pub struct MockMatrixState {
    /// Number of frames presented via swap_on_vsync
    pub swap_count: usize,

    /// Number of times the panel was blanked
    pub clear_count: usize,

    /// Count of lit (non-black) pixels in the last presented frame
    pub last_lit_pixels: usize,
}

impl MockMatrix {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            front: FrameCanvas::new(width, height),
            state: Arc::new(Mutex::new(MockMatrixState::default())),
        }
    }

    /// Handle to the shared counters for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockMatrixState>> {
        Arc::clone(&self.state)
    }

    /// The most recently presented frame
    pub fn front(&self) -> &FrameCanvas {
        &self.front
    }
}

impl MatrixDriver for MockMatrix {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn swap_on_vsync(&mut self, canvas: FrameCanvas) -> FrameCanvas {
        let lit = canvas
            .as_slice()
            .iter()
            .filter(|&&p| p != Rgb888::new(0, 0, 0))
            .count();

        let mut state = self.state.lock().unwrap();
        state.swap_count += 1;
        state.last_lit_pixels = lit;
        drop(state);

        std::mem::replace(&mut self.front, canvas)
    }

    fn clear(&mut self) {
        self.front.clear_black();
        self.state.lock().unwrap().clear_count += 1;
    }
}
