use thiserror::Error;

use crate::backend::{BackendError, GpuBackend, SampleFormat};
use crate::config::{ConfigError, FluidConfig};
use crate::display;
use crate::fields::{FieldSet, GridManager};
use crate::programs::Programs;
use crate::solver;
use crate::splat::{self, Splat};

#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct FluidSimulation<B: GpuBackend> {
    backend: B,
    programs: Programs,
    grids: GridManager,
    config: FluidConfig,
}

impl<B: GpuBackend> FluidSimulation<B> {
    pub fn new(mut backend: B, config: FluidConfig) -> Result<Self, InitError> {
        config.validate()?;
        let capabilities = backend.capabilities();
        let format = capabilities.preferred_format();
        if format == SampleFormat::Unorm8 {
            if config.require_half_float {
                return Err(BackendError::Unsupported(
                    "half-float render targets".to_string(),
                )
                .into());
            }
            log::warn!("half-float render targets unavailable, falling back to 8-bit");
        } else if !capabilities.half_float_linear {
            log::warn!("half-float targets cannot be filtered linearly, sampling nearest");
        }
        let programs = Programs::compile_all(&mut backend)?;
        let surface = backend.surface_size();
        let grids = GridManager::new(&mut backend, &config, format, surface)?;
        log::info!(
            "fluid ready: {:?} targets, {} pressure iterations",
            format,
            config.pressure_iterations
        );
        Ok(Self {
            backend,
            programs,
            grids,
            config,
        })
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn fields(&self) -> &FieldSet {
        self.grids.fields()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.backend.surface_size()
    }

    pub fn resize_if_needed(&mut self) -> Result<bool, BackendError> {
        let surface = self.backend.surface_size();
        if surface == self.grids.surface() || surface.0 == 0 || surface.1 == 0 {
            return Ok(false);
        }
        log::info!(
            "surface resized {:?} -> {:?}, reallocating fields",
            self.grids.surface(),
            surface
        );
        self.grids.reallocate_all(&mut self.backend, surface)?;
        Ok(true)
    }

    pub fn splat(&mut self, splat: &Splat) -> Result<(), BackendError> {
        let surface = self.backend.surface_size();
        splat::apply_splat(
            &mut self.backend,
            &self.programs,
            self.grids.fields_mut(),
            &self.config,
            surface,
            splat,
        )
    }

    pub fn step(&mut self, dt: f32) -> Result<(), BackendError> {
        solver::step(
            &mut self.backend,
            &self.programs,
            self.grids.fields_mut(),
            &self.config,
            dt,
        )
    }

    pub fn render(&mut self) -> Result<(), BackendError> {
        display::composite(&mut self.backend, &self.programs, self.grids.fields())
    }

    pub fn present(&mut self) -> Result<(), BackendError> {
        self.backend.present()
    }

    pub fn shutdown(self) -> B {
        let mut backend = self.backend;
        self.grids.release(&mut backend);
        backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capabilities, Program};
    use crate::render::software::SoftwareBackend;

    fn small_config() -> FluidConfig {
        FluidConfig {
            sim_resolution: 8,
            dye_resolution: 16,
            ..FluidConfig::default()
        }
    }

    fn no_half_float() -> Capabilities {
        Capabilities {
            half_float: false,
            half_float_linear: false,
        }
    }

    #[test]
    fn new_allocates_every_field() {
        let sim = FluidSimulation::new(SoftwareBackend::new((32, 16)), small_config()).unwrap();
        assert_eq!(sim.backend().live_targets(), 8);
        assert_eq!(sim.fields().sim_grid().width(), 16);
        assert_eq!(sim.fields().velocity.read().format(), SampleFormat::HalfFloat);
    }

    #[test]
    fn compile_failure_aborts_init() {
        let mut backend = SoftwareBackend::new((32, 16));
        backend.fail_compile(Program::Advection);
        let err = FluidSimulation::new(backend, small_config())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            InitError::Backend(BackendError::Compile {
                program: Program::Advection,
                ..
            })
        ));
    }

    #[test]
    fn falls_back_to_8bit_targets() {
        let backend = SoftwareBackend::new((32, 16)).with_capabilities(no_half_float());
        let sim = FluidSimulation::new(backend, small_config()).unwrap();
        assert_eq!(sim.fields().dye.read().format(), SampleFormat::Unorm8);
    }

    #[test]
    fn refuses_8bit_when_half_float_required() {
        let backend = SoftwareBackend::new((32, 16)).with_capabilities(no_half_float());
        let config = FluidConfig {
            require_half_float: true,
            ..small_config()
        };
        let err = FluidSimulation::new(backend, config).err().unwrap();
        assert!(matches!(err, InitError::Backend(BackendError::Unsupported(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_touching_gpu() {
        let config = FluidConfig {
            pressure_iterations: 0,
            ..small_config()
        };
        let err = FluidSimulation::new(SoftwareBackend::new((32, 16)), config)
            .err()
            .unwrap();
        assert!(matches!(err, InitError::Config(_)));
    }

    #[test]
    fn resize_only_when_surface_changes() {
        let mut sim =
            FluidSimulation::new(SoftwareBackend::new((32, 16)), small_config()).unwrap();
        assert!(!sim.resize_if_needed().unwrap());
        sim.backend_mut().set_surface_size((16, 32));
        assert!(sim.resize_if_needed().unwrap());
        assert_eq!(sim.fields().sim_grid().height(), 16);
        assert_eq!(sim.backend().live_targets(), 8);
    }

    #[test]
    fn shutdown_releases_targets() {
        let sim = FluidSimulation::new(SoftwareBackend::new((32, 16)), small_config()).unwrap();
        let backend = sim.shutdown();
        assert_eq!(backend.live_targets(), 0);
    }
}
