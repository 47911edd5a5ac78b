/*
 *  Luxel Ambient Scenes - starfield
 *
 *  Drifting, twinkling stars. Port of the classic ambient filler.
 */

use std::time::Instant;

use luxel::scene::property::{DynProperty, Property};
use luxel::{Color, FrameCanvas, Scene, SceneCore, SceneFlow};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

struct Star {
    x: f64,
    y: f64,
    depth: f64,
    phase: f64,
}

pub struct StarfieldScene {
    core: SceneCore,
    star_count: Property<i64>,
    drift: Property<f64>,
    twinkle: Property<bool>,
    stars: Vec<Star>,
    last_frame: Option<Instant>,
}

impl StarfieldScene {
    pub fn new() -> Self {
        Self {
            core: SceneCore::new(3, 15_000).with_fps(30),
            star_count: Property::bounded("star_count", 40, 1, 512),
            drift: Property::bounded("drift", 2.0, 0.0, 30.0),
            twinkle: Property::new("twinkle", true),
            stars: Vec::new(),
            last_frame: None,
        }
    }

    fn seed_stars(&mut self, width: u32, height: u32) {
        let mut rng = SmallRng::from_os_rng();
        self.stars = (0..self.star_count.value())
            .map(|_| Star {
                x: rng.random_range(0.0..width as f64),
                y: rng.random_range(0.0..height as f64),
                depth: rng.random_range(0.2..1.0),
                phase: rng.random_range(0.0..std::f64::consts::TAU),
            })
            .collect();
    }
}

impl Default for StarfieldScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for StarfieldScene {
    fn name(&self) -> &str {
        "starfield"
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn scene_properties(&self) -> Vec<&dyn DynProperty> {
        vec![&self.star_count, &self.drift, &self.twinkle]
    }

    fn scene_properties_mut(&mut self) -> Vec<&mut dyn DynProperty> {
        vec![&mut self.star_count, &mut self.drift, &mut self.twinkle]
    }

    fn on_initialize(&mut self, canvas: &FrameCanvas) {
        self.seed_stars(canvas.width(), canvas.height());
    }

    fn render(&mut self, canvas: &mut FrameCanvas) -> SceneFlow {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|t| (now - t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        let (w, h) = (canvas.width() as f64, canvas.height() as f64);
        let drift = self.drift.value();
        let twinkle = self.twinkle.value();

        canvas.clear_black();
        for star in &mut self.stars {
            star.x += drift * star.depth * dt;
            if star.x >= w {
                star.x -= w;
            }
            star.phase += dt * 3.0;

            let mut level = star.depth;
            if twinkle {
                level *= 0.6 + 0.4 * star.phase.sin().abs();
            }
            let v = (level * 255.0) as u8;
            canvas.set_pixel(star.x as u32, star.y as u32 % h as u32, Color::new(v, v, v));
        }

        SceneFlow::Continue
    }
}
