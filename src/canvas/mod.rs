/*
 *  canvas/mod.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Frame canvas and the matrix-driver seam the render loop draws through
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

pub mod mock;

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::pacer::Pacer;
use crate::scene::property::Color;

/// A runtime-sized RGB framebuffer scenes draw into.
///
/// This is the offscreen half of the display's double buffer; presenting it
/// happens through [`MatrixDriver::swap_on_vsync`].
#[derive(Debug, Clone)]
pub struct FrameCanvas {
    buf: Vec<Rgb888>,
    w: usize,
    h: usize,
}

impl FrameCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self {
            buf: vec![Rgb888::new(0, 0, 0); w * h],
            w,
            h,
        }
    }

    pub fn width(&self) -> u32 {
        self.w as u32
    }

    pub fn height(&self) -> u32 {
        self.h as u32
    }

    /// Immutable raw access
    pub fn as_slice(&self) -> &[Rgb888] {
        &self.buf
    }

    /// Mutable raw access (useful for pushing regions to the panel)
    pub fn as_mut_slice(&mut self) -> &mut [Rgb888] {
        &mut self.buf
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if let Some(i) = self.idx(Point::new(x as i32, y as i32)) {
            self.buf[i] = color.into();
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        self.idx(Point::new(x as i32, y as i32)).map(|i| self.buf[i])
    }

    pub fn clear_black(&mut self) {
        self.buf.fill(Rgb888::new(0, 0, 0));
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }
}

impl OriginDimensions for FrameCanvas {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for FrameCanvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        // fast path for rectangular fills the primitives use
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let (x0, y0) = (
            area.top_left.x.max(0) as usize,
            area.top_left.y.max(0) as usize,
        );
        let w = width as usize;
        let h = height as usize;

        let mut it = colors.into_iter();
        for row in 0..h {
            let base = (y0 + row) * self.w + x0;
            for col in 0..w {
                if let Some(c) = it.next() {
                    let i = base + col;
                    if i < self.buf.len() {
                        self.buf[i] = c;
                    }
                } else {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

/// The display-driver seam. The scheduler owns one of these; the physical
/// implementation (panel protocol, GPIO timing) lives outside this crate.
pub trait MatrixDriver: Send {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn create_canvas(&self) -> FrameCanvas {
        FrameCanvas::new(self.width(), self.height())
    }

    /// Present `canvas` at the next vsync and hand back the buffer to draw
    /// the following frame into. The only sanctioned blocking wait on the
    /// render thread.
    fn swap_on_vsync(&mut self, canvas: FrameCanvas) -> FrameCanvas;

    /// Blank the panel (used while rendering is disabled).
    fn clear(&mut self);
}

/// Headless stand-in driver: swaps buffers at a fixed refresh rate without
/// talking to hardware. Used when no panel is attached and in demos.
pub struct SimMatrix {
    width: u32,
    height: u32,
    vsync: Pacer,
    front: FrameCanvas,
}

impl SimMatrix {
    pub fn new(width: u32, height: u32, refresh_fps: u32) -> Self {
        Self {
            width,
            height,
            vsync: Pacer::new(refresh_fps),
            front: FrameCanvas::new(width, height),
        }
    }

    /// The most recently presented frame.
    pub fn front(&self) -> &FrameCanvas {
        &self.front
    }
}

impl MatrixDriver for SimMatrix {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn swap_on_vsync(&mut self, canvas: FrameCanvas) -> FrameCanvas {
        std::thread::sleep(self.vsync.nap());
        self.vsync.frame_due();
        std::mem::replace(&mut self.front, canvas)
    }

    fn clear(&mut self) {
        self.front.clear_black();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    #[test]
    fn test_canvas_pixel_round_trip() {
        let mut canvas = FrameCanvas::new(64, 32);
        canvas.set_pixel(3, 4, Color::new(10, 20, 30));
        assert_eq!(canvas.pixel(3, 4), Some(Rgb888::new(10, 20, 30)));
        assert_eq!(canvas.pixel(64, 0), None);
    }

    #[test]
    fn test_canvas_draws_primitives() {
        let mut canvas = FrameCanvas::new(64, 32);
        Line::new(Point::new(0, 0), Point::new(10, 0))
            .into_styled(PrimitiveStyle::with_stroke(Rgb888::new(255, 0, 0), 1))
            .draw(&mut canvas)
            .unwrap();
        assert_eq!(canvas.pixel(5, 0), Some(Rgb888::new(255, 0, 0)));
    }

    #[test]
    fn test_sim_matrix_swap_returns_previous_front() {
        let mut matrix = SimMatrix::new(8, 8, 1000);
        let mut canvas = matrix.create_canvas();
        canvas.set_pixel(0, 0, Color::new(9, 9, 9));
        let back = matrix.swap_on_vsync(canvas);
        assert_eq!(matrix.front().pixel(0, 0), Some(Rgb888::new(9, 9, 9)));
        assert_eq!(back.pixel(0, 0), Some(Rgb888::new(0, 0, 0)));
    }
}
