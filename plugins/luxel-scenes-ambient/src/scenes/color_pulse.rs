/*
 *  Luxel Ambient Scenes - color pulse
 *
 *  Pulses between two colors across a selectable fill pattern.
 */

use std::time::Instant;

use luxel::scene::property::{Color, DynProperty, EnumTag, EnumValue, Property};
use luxel::{FrameCanvas, Scene, SceneCore, SceneFlow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPattern {
    Solid,
    Stripes,
    Checkerboard,
}

impl EnumTag for FillPattern {
    fn enum_name() -> &'static str {
        "FillPattern"
    }

    fn variants() -> &'static [&'static str] {
        &["solid", "stripes", "checkerboard"]
    }

    fn tag(&self) -> &'static str {
        match self {
            FillPattern::Solid => "solid",
            FillPattern::Stripes => "stripes",
            FillPattern::Checkerboard => "checkerboard",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "solid" => Some(FillPattern::Solid),
            "stripes" => Some(FillPattern::Stripes),
            "checkerboard" => Some(FillPattern::Checkerboard),
            _ => None,
        }
    }
}

pub struct ColorPulseScene {
    core: SceneCore,
    primary: Property<Color>,
    secondary: Property<Color>,
    speed: Property<f64>,
    density: Property<i64>,
    pattern: Property<EnumValue<FillPattern>>,
    started: Option<Instant>,
}

impl ColorPulseScene {
    pub fn new() -> Self {
        Self {
            core: SceneCore::new(4, 10_000).with_fps(30),
            primary: Property::new("primary_color", Color::new(0x00, 0xFF, 0x00)),
            secondary: Property::new("secondary_color", Color::new(0xFF, 0x00, 0x00)),
            speed: Property::bounded("speed", 1.0, 0.1, 8.0),
            density: Property::bounded("density", 1, 1, 8),
            pattern: Property::new("pattern", EnumValue(FillPattern::Solid)),
            started: None,
        }
    }

    fn blend(&self, t: f64) -> Color {
        let a = self.primary.value();
        let b = self.secondary.value();
        let mix = |x: u8, y: u8| (x as f64 * t + y as f64 * (1.0 - t)) as u8;
        Color::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }
}

impl Default for ColorPulseScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for ColorPulseScene {
    fn name(&self) -> &str {
        "color_pulse"
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn scene_properties(&self) -> Vec<&dyn DynProperty> {
        vec![
            &self.primary,
            &self.secondary,
            &self.speed,
            &self.density,
            &self.pattern,
        ]
    }

    fn scene_properties_mut(&mut self) -> Vec<&mut dyn DynProperty> {
        vec![
            &mut self.primary,
            &mut self.secondary,
            &mut self.speed,
            &mut self.density,
            &mut self.pattern,
        ]
    }

    fn on_initialize(&mut self, _canvas: &FrameCanvas) {
        self.started = Some(Instant::now());
    }

    fn render(&mut self, canvas: &mut FrameCanvas) -> SceneFlow {
        let elapsed = self
            .started
            .get_or_insert_with(Instant::now)
            .elapsed()
            .as_secs_f64();
        let phase = (elapsed * self.speed.value()).sin() * 0.5 + 0.5;
        let color = self.blend(phase);
        let off = self.blend(1.0 - phase);

        let density = self.density.value() as u32;
        let (w, h) = (canvas.width(), canvas.height());

        for y in 0..h {
            for x in 0..w {
                let lit = match self.pattern.get().get() {
                    FillPattern::Solid => true,
                    FillPattern::Stripes => (y / density.max(1)) % 2 == 0,
                    FillPattern::Checkerboard => {
                        ((x / density.max(1)) + (y / density.max(1))) % 2 == 0
                    }
                };
                canvas.set_pixel(x, y, if lit { color } else { off });
            }
        }

        SceneFlow::Continue
    }
}
