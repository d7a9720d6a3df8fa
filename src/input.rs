use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::FluidConfig;
use crate::splat::{InkPalette, Splat};

pub const TOUCH_START_IMPULSE: (f32, f32) = (0.0, -10.0);

// Screen y grows downwards, so vertical deltas are negated before they
// become an impulse.
pub struct PointerTracker<R: Rng = StdRng> {
    mouse_scale: f32,
    touch_scale: f32,
    last_mouse: Option<(f32, f32)>,
    touches: HashMap<u64, (f32, f32)>,
    palette: InkPalette<R>,
}

impl PointerTracker<StdRng> {
    pub fn new(config: &FluidConfig) -> Self {
        Self::with_palette(config, InkPalette::from_entropy())
    }
}

impl<R: Rng> PointerTracker<R> {
    pub fn with_palette(config: &FluidConfig, palette: InkPalette<R>) -> Self {
        Self {
            mouse_scale: config.mouse_force_scale,
            touch_scale: config.touch_force_scale,
            last_mouse: None,
            touches: HashMap::new(),
            palette,
        }
    }

    pub fn mouse_moved(&mut self, x: f32, y: f32, active: bool) -> Option<Splat> {
        let (last_x, last_y) = self.last_mouse.replace((x, y)).unwrap_or((x, y));
        if !active {
            return None;
        }
        Some(Splat {
            x,
            y,
            dx: (x - last_x) * self.mouse_scale,
            dy: -(y - last_y) * self.mouse_scale,
            color: self.palette.pick(),
        })
    }

    pub fn mouse_left(&mut self) {
        self.last_mouse = None;
    }

    pub fn touch_started(&mut self, id: u64, x: f32, y: f32, active: bool) -> Option<Splat> {
        self.touches.insert(id, (x, y));
        if !active {
            return None;
        }
        Some(Splat {
            x,
            y,
            dx: TOUCH_START_IMPULSE.0,
            dy: TOUCH_START_IMPULSE.1,
            color: self.palette.pick(),
        })
    }

    pub fn touch_moved(&mut self, id: u64, x: f32, y: f32, active: bool) -> Option<Splat> {
        let (last_x, last_y) = self.touches.insert(id, (x, y)).unwrap_or((x, y));
        if !active {
            return None;
        }
        Some(Splat {
            x,
            y,
            dx: (x - last_x) * self.touch_scale,
            dy: -(y - last_y) * self.touch_scale,
            color: self.palette.pick(),
        })
    }

    pub fn touch_ended(&mut self, id: u64) {
        self.touches.remove(&id);
    }

    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }
}
