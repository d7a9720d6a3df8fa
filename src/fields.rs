use crate::backend::{BackendError, FilterMode, GpuBackend, SampleFormat, TargetDesc, TargetId};
use crate::config::FluidConfig;
use crate::double_buffer::DoubleBuffered;
use crate::grid::{resolve_dimensions, Grid2};
use crate::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Field {
    target: TargetId,
    grid: Grid2,
    format: SampleFormat,
    filter: FilterMode,
}

impl Field {
    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn grid(&self) -> Grid2 {
        self.grid
    }

    pub fn texel_size(&self) -> Vec2 {
        self.grid.texel_size()
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }
}

pub fn allocate<B: GpuBackend>(
    backend: &mut B,
    grid: Grid2,
    format: SampleFormat,
    filter: FilterMode,
) -> Result<Field, BackendError> {
    let desc = TargetDesc {
        grid,
        format,
        filter,
    };
    let target = backend.create_render_target(&desc)?;
    Ok(Field {
        target,
        grid,
        format,
        filter,
    })
}

struct Batch<'a, B: GpuBackend> {
    backend: &'a mut B,
    format: SampleFormat,
    created: Vec<TargetId>,
}

impl<'a, B: GpuBackend> Batch<'a, B> {
    fn new(backend: &'a mut B, format: SampleFormat) -> Self {
        Self {
            backend,
            format,
            created: Vec::new(),
        }
    }

    fn single(&mut self, grid: Grid2, filter: FilterMode) -> Result<Field, BackendError> {
        let field = allocate(&mut *self.backend, grid, self.format, filter)?;
        self.created.push(field.target());
        Ok(field)
    }

    fn double(&mut self, grid: Grid2, filter: FilterMode) -> Result<DoubleBuffered<Field>, BackendError> {
        let read = self.single(grid, filter)?;
        let write = self.single(grid, filter)?;
        Ok(DoubleBuffered::new(read, write))
    }

    fn rollback(self) {
        log::warn!("releasing {} targets from a failed allocation", self.created.len());
        for target in self.created {
            self.backend.destroy_render_target(target);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSet {
    pub velocity: DoubleBuffered<Field>,
    pub dye: DoubleBuffered<Field>,
    pub pressure: DoubleBuffered<Field>,
    pub curl: Field,
    pub divergence: Field,
}

impl FieldSet {
    pub fn allocate<B: GpuBackend>(
        backend: &mut B,
        sim: Grid2,
        dye: Grid2,
        format: SampleFormat,
    ) -> Result<Self, BackendError> {
        let mut batch = Batch::new(backend, format);
        let built = Self::allocate_in(&mut batch, sim, dye);
        if built.is_err() {
            batch.rollback();
        }
        built
    }

    fn allocate_in<B: GpuBackend>(
        batch: &mut Batch<'_, B>,
        sim: Grid2,
        dye: Grid2,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            dye: batch.double(dye, FilterMode::Linear)?,
            velocity: batch.double(sim, FilterMode::Linear)?,
            divergence: batch.single(sim, FilterMode::Nearest)?,
            curl: batch.single(sim, FilterMode::Nearest)?,
            pressure: batch.double(sim, FilterMode::Nearest)?,
        })
    }

    pub fn sim_grid(&self) -> Grid2 {
        self.velocity.read().grid()
    }

    pub fn dye_grid(&self) -> Grid2 {
        self.dye.read().grid()
    }

    pub fn targets(&self) -> Vec<TargetId> {
        self.velocity
            .iter()
            .chain(self.dye.iter())
            .chain(self.pressure.iter())
            .chain([&self.curl, &self.divergence])
            .map(Field::target)
            .collect()
    }

    pub fn release<B: GpuBackend>(self, backend: &mut B) {
        for target in self.targets() {
            backend.destroy_render_target(target);
        }
    }
}

#[derive(Debug)]
pub struct GridManager {
    format: SampleFormat,
    sim_resolution: u32,
    dye_resolution: u32,
    surface: (u32, u32),
    fields: FieldSet,
}

impl GridManager {
    pub fn new<B: GpuBackend>(
        backend: &mut B,
        config: &FluidConfig,
        format: SampleFormat,
        surface: (u32, u32),
    ) -> Result<Self, BackendError> {
        let fields = Self::build(backend, config.sim_resolution, config.dye_resolution, format, surface)?;
        Ok(Self {
            format,
            sim_resolution: config.sim_resolution,
            dye_resolution: config.dye_resolution,
            surface,
            fields,
        })
    }

    fn build<B: GpuBackend>(
        backend: &mut B,
        sim_resolution: u32,
        dye_resolution: u32,
        format: SampleFormat,
        surface: (u32, u32),
    ) -> Result<FieldSet, BackendError> {
        let sim = resolve_dimensions(sim_resolution, surface.0, surface.1);
        let dye = resolve_dimensions(dye_resolution, surface.0, surface.1);
        log::info!(
            "allocating fields for {}x{} surface: sim {}x{}, dye {}x{}",
            surface.0,
            surface.1,
            sim.width(),
            sim.height(),
            dye.width(),
            dye.height()
        );
        FieldSet::allocate(backend, sim, dye, format)
    }

    /// Drops every field and allocates fresh zeroed ones for `surface`.
    pub fn reallocate_all<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        surface: (u32, u32),
    ) -> Result<(), BackendError> {
        let fresh = Self::build(
            backend,
            self.sim_resolution,
            self.dye_resolution,
            self.format,
            surface,
        )?;
        let stale = std::mem::replace(&mut self.fields, fresh);
        stale.release(backend);
        self.surface = surface;
        Ok(())
    }

    pub fn surface(&self) -> (u32, u32) {
        self.surface
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    pub fn release<B: GpuBackend>(self, backend: &mut B) {
        self.fields.release(backend);
    }
}
