use crate::backend::{BackendError, GpuBackend, Program, Sampler, Uniform};
use crate::fields::FieldSet;
use crate::programs::Programs;

pub const SURFACE_CLEAR: [f32; 4] = [0.97, 0.97, 0.95, 1.0];

pub fn composite<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &FieldSet,
) -> Result<(), BackendError> {
    let dye = fields.dye.read();
    log::trace!("pass: display");
    backend.use_program(programs.get(Program::Display));
    backend.set_uniform(Uniform::TexelSize(dye.texel_size().to_array()));
    backend.bind_texture(Sampler::Texture, dye.target());
    backend.draw_fullscreen_quad(None)
}
