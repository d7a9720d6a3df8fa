use std::fmt;

use thiserror::Error;

use crate::grid::Grid2;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("missing GPU capability: {0}")]
    Unsupported(String),
    #[error("failed to build {program} program: {message}")]
    Compile { program: Program, message: String },
    #[error("GPU device error: {0}")]
    Device(String),
    #[error("{program} pass samples its own render target {target:?}")]
    Aliasing { program: Program, target: TargetId },
    #[error("no program bound before draw")]
    NoProgram,
    #[error("{program} pass has nothing bound to sampler {sampler:?}")]
    UnboundSampler { program: Program, sampler: Sampler },
    #[error("unknown render target {0:?}")]
    UnknownTarget(TargetId),
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        BackendError::Device(format!("{err:#}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Clear,
    Pressure,
    GradientSubtract,
    Advection,
    Display,
}

impl Program {
    pub const ALL: [Program; 9] = [
        Program::Splat,
        Program::Curl,
        Program::Vorticity,
        Program::Divergence,
        Program::Clear,
        Program::Pressure,
        Program::GradientSubtract,
        Program::Advection,
        Program::Display,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn samplers(self) -> &'static [Sampler] {
        match self {
            Program::Splat => &[Sampler::Target],
            Program::Curl => &[Sampler::Velocity],
            Program::Vorticity => &[Sampler::Velocity, Sampler::Curl],
            Program::Divergence => &[Sampler::Velocity],
            Program::Clear => &[Sampler::Texture],
            Program::Pressure => &[Sampler::Pressure, Sampler::Divergence],
            Program::GradientSubtract => &[Sampler::Pressure, Sampler::Velocity],
            Program::Advection => &[Sampler::Velocity, Sampler::Source],
            Program::Display => &[Sampler::Texture],
        }
    }

    pub fn blend(self) -> BlendMode {
        match self {
            Program::Display => BlendMode::Alpha,
            _ => BlendMode::Replace,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Program::Splat => "splat",
            Program::Curl => "curl",
            Program::Vorticity => "vorticity",
            Program::Divergence => "divergence",
            Program::Clear => "clear",
            Program::Pressure => "pressure",
            Program::GradientSubtract => "gradient-subtract",
            Program::Advection => "advection",
            Program::Display => "display",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sampler {
    Velocity,
    Curl,
    Pressure,
    Divergence,
    Source,
    Target,
    Texture,
}

impl Sampler {
    pub const COUNT: usize = 7;

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uniform {
    TexelSize([f32; 2]),
    DyeTexelSize([f32; 2]),
    Point([f32; 2]),
    Dt(f32),
    Dissipation(f32),
    Color([f32; 3]),
    Curl(f32),
    AspectRatio(f32),
    Radius(f32),
    Value(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Replace,
    Alpha,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    HalfFloat,
    Unorm8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Linear,
    Nearest,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetDesc {
    pub grid: Grid2,
    pub format: SampleFormat,
    pub filter: FilterMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub half_float: bool,
    pub half_float_linear: bool,
}

impl Capabilities {
    pub fn preferred_format(&self) -> SampleFormat {
        if self.half_float {
            SampleFormat::HalfFloat
        } else {
            SampleFormat::Unorm8
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramHandle {
    pub program: Program,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PassConstants {
    pub texel_size: [f32; 2],
    pub dye_texel_size: [f32; 2],
    pub point: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
    pub color: [f32; 4],
    pub curl: f32,
    pub aspect_ratio: f32,
    pub radius: f32,
    pub value: f32,
}

impl PassConstants {
    pub fn apply(&mut self, uniform: Uniform) {
        match uniform {
            Uniform::TexelSize(value) => self.texel_size = value,
            Uniform::DyeTexelSize(value) => self.dye_texel_size = value,
            Uniform::Point(value) => self.point = value,
            Uniform::Dt(value) => self.dt = value,
            Uniform::Dissipation(value) => self.dissipation = value,
            Uniform::Color([r, g, b]) => self.color = [r, g, b, 0.0],
            Uniform::Curl(value) => self.curl = value,
            Uniform::AspectRatio(value) => self.aspect_ratio = value,
            Uniform::Radius(value) => self.radius = value,
            Uniform::Value(value) => self.value = value,
        }
    }
}

/// Resolves the program's sampler slots to targets and rejects a pass that
/// would sample the target it renders into.
pub fn resolve_bindings(
    program: Program,
    bound: &[Option<TargetId>; Sampler::COUNT],
    target: Option<TargetId>,
) -> Result<Vec<TargetId>, BackendError> {
    program
        .samplers()
        .iter()
        .map(|sampler| {
            let id = bound[sampler.index()].ok_or(BackendError::UnboundSampler {
                program,
                sampler: *sampler,
            })?;
            if Some(id) == target {
                return Err(BackendError::Aliasing { program, target: id });
            }
            Ok(id)
        })
        .collect()
}

pub trait GpuBackend {
    fn capabilities(&self) -> Capabilities;

    fn surface_size(&self) -> (u32, u32);

    fn compile_program(&mut self, program: Program) -> Result<ProgramHandle, BackendError>;

    fn create_render_target(&mut self, desc: &TargetDesc) -> Result<TargetId, BackendError>;

    fn destroy_render_target(&mut self, target: TargetId);

    fn use_program(&mut self, program: ProgramHandle);

    fn set_uniform(&mut self, uniform: Uniform);

    fn bind_texture(&mut self, sampler: Sampler, target: TargetId);

    /// Runs the current program over every pixel of `target`, or of the
    /// visible surface when `target` is `None`.
    fn draw_fullscreen_quad(&mut self, target: Option<TargetId>) -> Result<(), BackendError>;

    fn present(&mut self) -> Result<(), BackendError>;
}
