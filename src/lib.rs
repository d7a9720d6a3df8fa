mod backend;
mod config;
mod display;
mod double_buffer;
mod driver;
mod fields;
mod grid;
mod input;
mod programs;
mod render;
mod simulation;
pub mod solver;
mod splat;
mod vec2;

pub use backend::{
    BackendError, BlendMode, Capabilities, FilterMode, GpuBackend, PassConstants, Program,
    ProgramHandle, SampleFormat, Sampler, TargetDesc, TargetId, Uniform,
};
pub use config::{ConfigError, FluidConfig, MOBILE_WIDTH_THRESHOLD};
pub use display::SURFACE_CLEAR;
pub use double_buffer::DoubleBuffered;
pub use driver::{AlwaysRun, Clock, FrameDriver, RunGate, StopHandle, SystemClock, TickOutcome};
pub use fields::{Field, FieldSet, GridManager};
pub use grid::{resolve_dimensions, Grid2};
pub use input::{PointerTracker, TOUCH_START_IMPULSE};
pub use programs::Programs;
pub use render::VulkanBackend;
pub use simulation::{FluidSimulation, InitError};
pub use splat::{InkPalette, Splat, INK_PALETTE, INITIAL_SPLASH_COLOR, INITIAL_SPLASH_IMPULSE};
pub use vec2::Vec2;
