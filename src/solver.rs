use crate::backend::{BackendError, GpuBackend, Program, Sampler, Uniform};
use crate::config::FluidConfig;
use crate::fields::FieldSet;
use crate::programs::Programs;

pub fn step<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
    config: &FluidConfig,
    dt: f32,
) -> Result<(), BackendError> {
    compute_curl(backend, programs, fields)?;
    confine_vorticity(backend, programs, fields, config.curl, dt)?;
    compute_divergence(backend, programs, fields)?;
    carry_over_pressure(backend, programs, fields, config.pressure)?;
    solve_pressure(backend, programs, fields, config.pressure_iterations)?;
    subtract_gradient(backend, programs, fields)?;
    advect_velocity(backend, programs, fields, config.velocity_dissipation, dt)?;
    advect_dye(backend, programs, fields, config.density_dissipation, dt)?;
    Ok(())
}

fn texel_uniform(fields: &FieldSet) -> Uniform {
    Uniform::TexelSize(fields.velocity.read().texel_size().to_array())
}

pub fn compute_curl<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
) -> Result<(), BackendError> {
    log::trace!("pass: curl");
    backend.use_program(programs.get(Program::Curl));
    backend.set_uniform(texel_uniform(fields));
    backend.bind_texture(Sampler::Velocity, fields.velocity.read().target());
    backend.draw_fullscreen_quad(Some(fields.curl.target()))
}

pub fn confine_vorticity<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
    curl_strength: f32,
    dt: f32,
) -> Result<(), BackendError> {
    log::trace!("pass: vorticity");
    backend.use_program(programs.get(Program::Vorticity));
    backend.set_uniform(texel_uniform(fields));
    backend.bind_texture(Sampler::Velocity, fields.velocity.read().target());
    backend.bind_texture(Sampler::Curl, fields.curl.target());
    backend.set_uniform(Uniform::Curl(curl_strength));
    backend.set_uniform(Uniform::Dt(dt));
    backend.draw_fullscreen_quad(Some(fields.velocity.write().target()))?;
    fields.velocity.swap();
    Ok(())
}

pub fn compute_divergence<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
) -> Result<(), BackendError> {
    log::trace!("pass: divergence");
    backend.use_program(programs.get(Program::Divergence));
    backend.set_uniform(texel_uniform(fields));
    backend.bind_texture(Sampler::Velocity, fields.velocity.read().target());
    backend.draw_fullscreen_quad(Some(fields.divergence.target()))
}

pub fn carry_over_pressure<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
    coefficient: f32,
) -> Result<(), BackendError> {
    log::trace!("pass: pressure carry-over");
    backend.use_program(programs.get(Program::Clear));
    backend.set_uniform(texel_uniform(fields));
    backend.bind_texture(Sampler::Texture, fields.pressure.read().target());
    backend.set_uniform(Uniform::Value(coefficient));
    backend.draw_fullscreen_quad(Some(fields.pressure.write().target()))?;
    fields.pressure.swap();
    Ok(())
}

pub fn solve_pressure<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
    iterations: u32,
) -> Result<(), BackendError> {
    log::trace!("pass: pressure x{iterations}");
    backend.use_program(programs.get(Program::Pressure));
    backend.set_uniform(texel_uniform(fields));
    backend.bind_texture(Sampler::Divergence, fields.divergence.target());
    for _ in 0..iterations {
        backend.bind_texture(Sampler::Pressure, fields.pressure.read().target());
        backend.draw_fullscreen_quad(Some(fields.pressure.write().target()))?;
        fields.pressure.swap();
    }
    Ok(())
}

pub fn subtract_gradient<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
) -> Result<(), BackendError> {
    log::trace!("pass: gradient subtract");
    backend.use_program(programs.get(Program::GradientSubtract));
    backend.set_uniform(texel_uniform(fields));
    backend.bind_texture(Sampler::Pressure, fields.pressure.read().target());
    backend.bind_texture(Sampler::Velocity, fields.velocity.read().target());
    backend.draw_fullscreen_quad(Some(fields.velocity.write().target()))?;
    fields.velocity.swap();
    Ok(())
}

pub fn advect_velocity<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
    dissipation: f32,
    dt: f32,
) -> Result<(), BackendError> {
    log::trace!("pass: advect velocity");
    let texel = fields.velocity.read().texel_size().to_array();
    backend.use_program(programs.get(Program::Advection));
    backend.set_uniform(Uniform::TexelSize(texel));
    backend.set_uniform(Uniform::DyeTexelSize(texel));
    backend.bind_texture(Sampler::Velocity, fields.velocity.read().target());
    backend.bind_texture(Sampler::Source, fields.velocity.read().target());
    backend.set_uniform(Uniform::Dt(dt));
    backend.set_uniform(Uniform::Dissipation(dissipation));
    backend.draw_fullscreen_quad(Some(fields.velocity.write().target()))?;
    fields.velocity.swap();
    Ok(())
}

pub fn advect_dye<B: GpuBackend>(
    backend: &mut B,
    programs: &Programs,
    fields: &mut FieldSet,
    dissipation: f32,
    dt: f32,
) -> Result<(), BackendError> {
    log::trace!("pass: advect dye");
    backend.use_program(programs.get(Program::Advection));
    backend.set_uniform(texel_uniform(fields));
    backend.set_uniform(Uniform::DyeTexelSize(
        fields.dye.read().texel_size().to_array(),
    ));
    backend.bind_texture(Sampler::Velocity, fields.velocity.read().target());
    backend.bind_texture(Sampler::Source, fields.dye.read().target());
    backend.set_uniform(Uniform::Dt(dt));
    backend.set_uniform(Uniform::Dissipation(dissipation));
    backend.draw_fullscreen_quad(Some(fields.dye.write().target()))?;
    fields.dye.swap();
    Ok(())
}
