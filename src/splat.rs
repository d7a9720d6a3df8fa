use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::{BackendError, GpuBackend, Program, Sampler, Uniform};
use crate::config::FluidConfig;
use crate::double_buffer::DoubleBuffered;
use crate::fields::{Field, FieldSet};
use crate::programs::Programs;

pub const INK_PALETTE: [[f32; 3]; 3] = [[0.1, 0.7, 0.4], [0.1, 0.6, 0.6], [0.3, 0.8, 0.2]];

pub const INITIAL_SPLASH_COLOR: [f32; 3] = [0.2, 0.7, 0.5];
pub const INITIAL_SPLASH_IMPULSE: (f32, f32) = (0.0, -20.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub color: [f32; 3],
}

impl Splat {
    pub fn initial_splash(surface: (u32, u32)) -> Self {
        Self {
            x: surface.0 as f32 / 2.0,
            y: surface.1 as f32 / 2.0,
            dx: INITIAL_SPLASH_IMPULSE.0,
            dy: INITIAL_SPLASH_IMPULSE.1,
            color: INITIAL_SPLASH_COLOR,
        }
    }
}

pub struct InkPalette<R: Rng = StdRng> {
    rng: R,
}

impl InkPalette<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> InkPalette<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn pick(&mut self) -> [f32; 3] {
        INK_PALETTE[self.rng.gen_range(0..INK_PALETTE.len())]
    }
}

fn splat_into<B: GpuBackend>(
    backend: &mut B,
    pair: &mut DoubleBuffered<Field>,
    color: [f32; 3],
) -> Result<(), BackendError> {
    backend.set_uniform(Uniform::TexelSize(pair.read().texel_size().to_array()));
    backend.bind_texture(Sampler::Target, pair.read().target());
    backend.set_uniform(Uniform::Color(color));
    backend.draw_fullscreen_quad(Some(pair.write().target()))?;
    pair.swap();
    Ok(())
}

pub fn apply_splat<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
    config: &FluidConfig,
    surface: (u32, u32),
    splat: &Splat,
) -> Result<(), BackendError> {
    let (width, height) = surface;
    if width == 0 || height == 0 {
        return Ok(());
    }
    let width = width as f32;
    let height = height as f32;
    log::debug!(
        "splat at ({:.1}, {:.1}) impulse ({:.2}, {:.2})",
        splat.x,
        splat.y,
        splat.dx,
        splat.dy
    );
    backend.use_program(programs.get(Program::Splat));
    backend.set_uniform(Uniform::AspectRatio(width / height));
    backend.set_uniform(Uniform::Point([splat.x / width, 1.0 - splat.y / height]));
    backend.set_uniform(Uniform::Radius(config.splat_radius_normalized()));
    let force = config.splat_force;
    splat_into(
        backend,
        &mut fields.velocity,
        [splat.dx * force, splat.dy * force, 0.0],
    )?;
    splat_into(backend, &mut fields.dye, splat.color)
}
