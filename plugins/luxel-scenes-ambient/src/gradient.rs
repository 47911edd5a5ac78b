/*
 *  Luxel Ambient Scenes - gradient image provider
 *
 *  Procedural vertical gradients; a file-free stand-in for album art and
 *  photo providers.
 */

use luxel::scene::property::{Color, DynProperty, Property};
use luxel::{ImageFrame, ImageProvider};

pub struct GradientProvider {
    top: Property<Color>,
    bottom: Property<Color>,
    steps: Property<i64>,
    cursor: i64,
}

impl GradientProvider {
    pub fn new() -> Self {
        Self {
            top: Property::new("top_color", Color::new(0x00, 0x20, 0x80)),
            bottom: Property::new("bottom_color", Color::new(0x00, 0x00, 0x10)),
            steps: Property::bounded("steps", 8, 1, 64),
            cursor: 0,
        }
    }
}

impl Default for GradientProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProvider for GradientProvider {
    fn name(&self) -> &str {
        "gradient"
    }

    fn properties(&self) -> Vec<&dyn DynProperty> {
        vec![&self.top, &self.bottom, &self.steps]
    }

    fn properties_mut(&mut self) -> Vec<&mut dyn DynProperty> {
        vec![&mut self.top, &mut self.bottom, &mut self.steps]
    }

    fn next_image(&mut self) -> Result<Option<ImageFrame>, String> {
        let steps = self.steps.value();
        let t = self.cursor as f64 / steps.max(1) as f64;
        self.cursor = (self.cursor + 1) % steps.max(1);

        let a = self.top.value();
        let b = self.bottom.value();
        let mix = |x: u8, y: u8| (x as f64 * (1.0 - t) + y as f64 * t) as u8;
        let color = Color::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b));

        Ok(Some(ImageFrame::solid(
            64,
            64,
            color,
            format!("gradient:{}/{}", self.cursor, steps),
        )))
    }

    fn flush(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_cycles_through_steps() {
        let mut provider = GradientProvider::new();
        let first = provider.next_image().unwrap().unwrap();
        let second = provider.next_image().unwrap().unwrap();
        assert_ne!(first.pixels[0], second.pixels[0]);

        provider.flush();
        let again = provider.next_image().unwrap().unwrap();
        assert_eq!(first.pixels[0], again.pixels[0]);
    }
}
