use std::collections::{HashMap, HashSet};

use crate::backend::{
    resolve_bindings, BackendError, BlendMode, Capabilities, FilterMode, GpuBackend,
    PassConstants, Program, ProgramHandle, SampleFormat, Sampler, TargetDesc, TargetId, Uniform,
};
use crate::display::SURFACE_CLEAR;
use crate::grid::Grid2;
use crate::Vec2;

#[derive(Clone, Debug, PartialEq)]
pub struct Draw {
    pub program: Program,
    pub target: Option<TargetId>,
    pub sources: Vec<TargetId>,
}

#[derive(Clone, Debug)]
struct Texture {
    grid: Grid2,
    format: SampleFormat,
    filter: FilterMode,
    texels: Vec<[f32; 4]>,
}

impl Texture {
    fn get(&self, x: usize, y: usize) -> [f32; 4] {
        self.texels[self.grid.idx(x, y)]
    }

    fn sample_clamped(&self, x: i32, y: i32) -> [f32; 4] {
        let (cx, cy) = self.grid.clamp_coord(x, y);
        self.get(cx, cy)
    }

    fn sample(&self, uv: Vec2) -> [f32; 4] {
        let w = self.grid.width() as f32;
        let h = self.grid.height() as f32;
        match self.filter {
            FilterMode::Nearest => {
                self.sample_clamped((uv.x * w).floor() as i32, (uv.y * h).floor() as i32)
            }
            FilterMode::Linear => {
                let gx = uv.x * w - 0.5;
                let gy = uv.y * h - 0.5;
                let x0 = gx.floor() as i32;
                let y0 = gy.floor() as i32;
                let sx = gx - x0 as f32;
                let sy = gy - y0 as f32;
                let v00 = self.sample_clamped(x0, y0);
                let v10 = self.sample_clamped(x0 + 1, y0);
                let v01 = self.sample_clamped(x0, y0 + 1);
                let v11 = self.sample_clamped(x0 + 1, y0 + 1);
                mix(mix(v00, v10, sx), mix(v01, v11, sx), sy)
            }
        }
    }

    fn store(&mut self, index: usize, value: [f32; 4]) {
        self.texels[index] = match self.format {
            SampleFormat::HalfFloat => value,
            SampleFormat::Unorm8 => value.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0),
        };
    }
}

fn mix(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

struct Stencil {
    uv: Vec2,
    l: Vec2,
    r: Vec2,
    t: Vec2,
    b: Vec2,
}

impl Stencil {
    fn new(uv: Vec2, texel: [f32; 2]) -> Self {
        Self {
            uv,
            l: Vec2::new(uv.x - texel[0], uv.y),
            r: Vec2::new(uv.x + texel[0], uv.y),
            t: Vec2::new(uv.x, uv.y + texel[1]),
            b: Vec2::new(uv.x, uv.y - texel[1]),
        }
    }
}

fn bilerp(texture: &Texture, uv: Vec2, tsize: [f32; 2]) -> [f32; 4] {
    let st = Vec2::new(uv.x / tsize[0] - 0.5, uv.y / tsize[1] - 0.5);
    let i = Vec2::new(st.x.floor(), st.y.floor());
    let f = Vec2::new(st.x - i.x, st.y - i.y);
    let tap = |ox: f32, oy: f32| texture.sample(Vec2::new((i.x + ox) * tsize[0], (i.y + oy) * tsize[1]));
    let a = tap(0.5, 0.5);
    let b = tap(1.5, 0.5);
    let c = tap(0.5, 1.5);
    let d = tap(1.5, 1.5);
    mix(mix(a, b, f.x), mix(c, d, f.x), f.y)
}

fn shade(program: Program, k: &PassConstants, src: &[&Texture], uv: Vec2) -> [f32; 4] {
    let s = Stencil::new(uv, k.texel_size);
    match program {
        Program::Splat => {
            let mut p = uv.sub(Vec2::from(k.point));
            p.x *= k.aspect_ratio;
            let g = (-p.dot(p) / k.radius).exp();
            let base = src[0].sample(uv);
            [
                base[0] + g * k.color[0],
                base[1] + g * k.color[1],
                base[2] + g * k.color[2],
                1.0,
            ]
        }
        Program::Curl => {
            let l = src[0].sample(s.l)[1];
            let r = src[0].sample(s.r)[1];
            let t = src[0].sample(s.t)[0];
            let b = src[0].sample(s.b)[0];
            [0.5 * (r - l - t + b), 0.0, 0.0, 1.0]
        }
        Program::Vorticity => {
            let curl = src[1];
            let l = curl.sample(s.l)[0];
            let r = curl.sample(s.r)[0];
            let t = curl.sample(s.t)[0];
            let b = curl.sample(s.b)[0];
            let c = curl.sample(s.uv)[0];
            let mut force = Vec2::new(0.5 * (t.abs() - b.abs()), 0.5 * (r.abs() - l.abs()));
            force = force.scale(1.0 / (force.length() + 0.0001));
            force = force.scale(k.curl * c);
            force.y = -force.y;
            let v = src[0].sample(s.uv);
            let vx = (v[0] + force.x * k.dt).clamp(-1000.0, 1000.0);
            let vy = (v[1] + force.y * k.dt).clamp(-1000.0, 1000.0);
            [vx, vy, 0.0, 1.0]
        }
        Program::Divergence => {
            let vel = src[0];
            let c = vel.sample(s.uv);
            let l = if s.l.x < 0.0 { -c[0] } else { vel.sample(s.l)[0] };
            let r = if s.r.x > 1.0 { -c[0] } else { vel.sample(s.r)[0] };
            let t = if s.t.y > 1.0 { -c[1] } else { vel.sample(s.t)[1] };
            let b = if s.b.y < 0.0 { -c[1] } else { vel.sample(s.b)[1] };
            [0.5 * (r - l + t - b), 0.0, 0.0, 1.0]
        }
        Program::Clear => src[0].sample(uv).map(|c| c * k.value),
        Program::Pressure => {
            let p = src[0];
            let sum = p.sample(s.l)[0] + p.sample(s.r)[0] + p.sample(s.b)[0] + p.sample(s.t)[0];
            let div = src[1].sample(uv)[0];
            [(sum - div) * 0.25, 0.0, 0.0, 1.0]
        }
        Program::GradientSubtract => {
            let p = src[0];
            let l = p.sample(s.l)[0];
            let r = p.sample(s.r)[0];
            let t = p.sample(s.t)[0];
            let b = p.sample(s.b)[0];
            let v = src[1].sample(uv);
            [v[0] - (r - l), v[1] - (t - b), 0.0, 1.0]
        }
        Program::Advection => {
            let v = bilerp(src[0], uv, k.texel_size);
            let coord = Vec2::new(
                uv.x - k.dt * v[0] * k.texel_size[0],
                uv.y - k.dt * v[1] * k.texel_size[1],
            );
            let decay = 1.0 + k.dissipation * k.dt;
            bilerp(src[1], coord, k.dye_texel_size).map(|c| c / decay)
        }
        Program::Display => display_color(src[0].sample(uv), uv),
    }
}

fn display_color(texel: [f32; 4], uv: Vec2) -> [f32; 4] {
    let mut c = [texel[0], texel[1], texel[2], 0.0];
    let brightness = c[0].max(c[1]).max(c[2]);
    let tint_mix = (uv.x * 10.0 + uv.y * 8.0).sin() * 0.5 + 0.5;
    let tint = mix([0.65, 0.55, 0.15, 0.0], [0.45, 0.25, 0.55, 0.0], tint_mix);
    let max_c = brightness.max(0.01);
    let tinted: [f32; 4] = std::array::from_fn(|i| c[i] / max_c * tint[i] * brightness * 1.2);
    c = mix(c, tinted, smoothstep(0.15, 0.4, brightness));
    let ceiling = [0.7, 0.75, 0.6];
    for (channel, limit) in c.iter_mut().zip(ceiling) {
        *channel = channel.min(limit);
    }
    let alpha = c[0].max(c[1]).max(c[2]);
    [c[0], c[1], c[2], alpha * 0.85]
}

pub struct SoftwareBackend {
    capabilities: Capabilities,
    surface_size: (u32, u32),
    surface: Grid2,
    surface_pixels: Vec<[f32; 4]>,
    textures: HashMap<TargetId, Texture>,
    next_target: u32,
    failing: HashSet<Program>,
    current: Option<ProgramHandle>,
    constants: PassConstants,
    bound: [Option<TargetId>; Sampler::COUNT],
    trace: Vec<Draw>,
    presents: usize,
}

impl SoftwareBackend {
    pub fn new(surface: (u32, u32)) -> Self {
        let grid = Grid2::new(surface.0.max(1), surface.1.max(1));
        Self {
            capabilities: Capabilities {
                half_float: true,
                half_float_linear: true,
            },
            surface_size: surface,
            surface: grid,
            surface_pixels: vec![SURFACE_CLEAR; grid.size()],
            textures: HashMap::new(),
            next_target: 1,
            failing: HashSet::new(),
            current: None,
            constants: PassConstants::default(),
            bound: [None; Sampler::COUNT],
            trace: Vec::new(),
            presents: 0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn fail_compile(&mut self, program: Program) {
        self.failing.insert(program);
    }

    pub fn set_surface_size(&mut self, size: (u32, u32)) {
        self.surface_size = size;
        self.surface = Grid2::new(size.0.max(1), size.1.max(1));
        self.surface_pixels = vec![SURFACE_CLEAR; self.surface.size()];
    }

    pub fn live_targets(&self) -> usize {
        self.textures.len()
    }

    pub fn has_target(&self, id: TargetId) -> bool {
        self.textures.contains_key(&id)
    }

    fn texture(&self, id: TargetId) -> &Texture {
        self.textures
            .get(&id)
            .unwrap_or_else(|| panic!("unknown target {id:?}"))
    }

    pub fn fill_target(&mut self, id: TargetId, value: [f32; 4]) {
        self.fill_target_with(id, |_, _| value);
    }

    pub fn fill_target_with(&mut self, id: TargetId, f: impl Fn(usize, usize) -> [f32; 4]) {
        let texture = self
            .textures
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown target {id:?}"));
        let width = texture.grid.width() as usize;
        for index in 0..texture.texels.len() {
            texture.store(index, f(index % width, index / width));
        }
    }

    pub fn read_target(&self, id: TargetId) -> Vec<[f32; 4]> {
        self.texture(id).texels.clone()
    }

    pub fn texel(&self, id: TargetId, x: usize, y: usize) -> [f32; 4] {
        self.texture(id).get(x, y)
    }

    pub fn surface_pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.surface_pixels[self.surface.idx(x, y)]
    }

    pub fn trace(&self) -> &[Draw] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    pub fn presents(&self) -> usize {
        self.presents
    }
}

impl GpuBackend for SoftwareBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn compile_program(&mut self, program: Program) -> Result<ProgramHandle, BackendError> {
        if self.failing.contains(&program) {
            return Err(BackendError::Compile {
                program,
                message: "rejected by test".to_string(),
            });
        }
        Ok(ProgramHandle { program })
    }

    fn create_render_target(&mut self, desc: &TargetDesc) -> Result<TargetId, BackendError> {
        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.textures.insert(
            id,
            Texture {
                grid: desc.grid,
                format: desc.format,
                filter: desc.filter,
                texels: vec![[0.0; 4]; desc.grid.size()],
            },
        );
        Ok(id)
    }

    fn destroy_render_target(&mut self, target: TargetId) {
        self.textures.remove(&target);
        for slot in &mut self.bound {
            if *slot == Some(target) {
                *slot = None;
            }
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current = Some(program);
    }

    fn set_uniform(&mut self, uniform: Uniform) {
        self.constants.apply(uniform);
    }

    fn bind_texture(&mut self, sampler: Sampler, target: TargetId) {
        self.bound[sampler.index()] = Some(target);
    }

    fn draw_fullscreen_quad(&mut self, target: Option<TargetId>) -> Result<(), BackendError> {
        let program = self.current.ok_or(BackendError::NoProgram)?.program;
        let sources = resolve_bindings(program, &self.bound, target)?;
        let inputs = sources
            .iter()
            .map(|id| self.textures.get(id).ok_or(BackendError::UnknownTarget(*id)))
            .collect::<Result<Vec<_>, _>>()?;
        let grid = match target {
            Some(id) => self.textures.get(&id).ok_or(BackendError::UnknownTarget(id))?.grid,
            None => self.surface,
        };
        let width = grid.width() as usize;
        let output: Vec<[f32; 4]> = (0..grid.size())
            .map(|index| {
                let uv = grid.texel_center(index % width, index / width);
                shade(program, &self.constants, &inputs, uv)
            })
            .collect();

        match target {
            Some(id) => {
                let texture = self
                    .textures
                    .get_mut(&id)
                    .ok_or(BackendError::UnknownTarget(id))?;
                for (index, value) in output.into_iter().enumerate() {
                    texture.store(index, value);
                }
            }
            None => {
                for (dst, src) in self.surface_pixels.iter_mut().zip(output) {
                    *dst = match program.blend() {
                        BlendMode::Replace => src,
                        BlendMode::Alpha => {
                            let a = src[3];
                            std::array::from_fn(|i| src[i] * a + dst[i] * (1.0 - a))
                        }
                    };
                }
            }
        }
        self.trace.push(Draw {
            program,
            target,
            sources,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.presents += 1;
        self.surface_pixels.fill(SURFACE_CLEAR);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32, tol: f32) {
        assert!(
            (a - b).abs() <= tol,
            "expected {a} to be within {tol} of {b}"
        );
    }

    fn target(backend: &mut SoftwareBackend, w: u32, h: u32, filter: FilterMode) -> TargetId {
        backend
            .create_render_target(&TargetDesc {
                grid: Grid2::new(w, h),
                format: SampleFormat::HalfFloat,
                filter,
            })
            .unwrap()
    }

    #[test]
    fn linear_sampling_clamps_to_edge() {
        let mut backend = SoftwareBackend::new((4, 4));
        let id = target(&mut backend, 4, 1, FilterMode::Linear);
        backend.fill_target_with(id, |x, _| [x as f32, 0.0, 0.0, 0.0]);
        let texture = backend.texture(id);
        assert_close(texture.sample(Vec2::new(0.0, 0.5))[0], 0.0, 1e-6);
        assert_close(texture.sample(Vec2::new(0.25, 0.5))[0], 0.5, 1e-6);
        assert_close(texture.sample(Vec2::new(1.0, 0.5))[0], 3.0, 1e-6);
    }

    #[test]
    fn unorm_targets_quantize() {
        let mut backend = SoftwareBackend::new((4, 4));
        let id = backend
            .create_render_target(&TargetDesc {
                grid: Grid2::new(2, 2),
                format: SampleFormat::Unorm8,
                filter: FilterMode::Nearest,
            })
            .unwrap();
        backend.fill_target(id, [1.5, -0.2, 0.5, 1.0]);
        let texel = backend.texel(id, 0, 0);
        assert_eq!(texel[0], 1.0);
        assert_eq!(texel[1], 0.0);
        assert_close(texel[2], 128.0 / 255.0, 1e-6);
    }

    #[test]
    fn draw_without_program_fails() {
        let mut backend = SoftwareBackend::new((4, 4));
        let id = target(&mut backend, 2, 2, FilterMode::Nearest);
        let err = backend.draw_fullscreen_quad(Some(id)).unwrap_err();
        assert!(matches!(err, BackendError::NoProgram));
    }

    #[test]
    fn aliased_draw_is_rejected_and_not_traced() {
        let mut backend = SoftwareBackend::new((4, 4));
        let id = target(&mut backend, 2, 2, FilterMode::Nearest);
        let handle = backend.compile_program(Program::Clear).unwrap();
        backend.use_program(handle);
        backend.bind_texture(Sampler::Texture, id);
        let err = backend.draw_fullscreen_quad(Some(id)).unwrap_err();
        assert!(matches!(err, BackendError::Aliasing { .. }));
        assert!(backend.trace().is_empty());
    }

    #[test]
    fn display_of_empty_dye_leaves_surface_clear() {
        let mut backend = SoftwareBackend::new((4, 4));
        let id = target(&mut backend, 4, 4, FilterMode::Linear);
        let handle = backend.compile_program(Program::Display).unwrap();
        backend.use_program(handle);
        backend.bind_texture(Sampler::Texture, id);
        backend.draw_fullscreen_quad(None).unwrap();
        assert_eq!(backend.surface_pixel(1, 2), SURFACE_CLEAR);
    }

    #[test]
    fn display_clamps_to_ceiling() {
        let color = display_color([5.0, 5.0, 5.0, 1.0], Vec2::new(0.3, 0.7));
        assert!(color[0] <= 0.7 && color[1] <= 0.75 && color[2] <= 0.6);
        let brightest = color[0].max(color[1]).max(color[2]);
        assert_close(color[3], brightest * 0.85, 1e-6);
    }

    #[test]
    fn dim_dye_is_not_tinted() {
        let color = display_color([0.1, 0.05, 0.02, 1.0], Vec2::new(0.5, 0.5));
        assert_close(color[0], 0.1, 1e-6);
        assert_close(color[1], 0.05, 1e-6);
        assert_close(color[3], 0.085, 1e-6);
    }

    #[test]
    fn destroyed_target_unbinds() {
        let mut backend = SoftwareBackend::new((4, 4));
        let id = target(&mut backend, 2, 2, FilterMode::Nearest);
        backend.bind_texture(Sampler::Texture, id);
        backend.destroy_render_target(id);
        assert!(!backend.has_target(id));
        assert_eq!(backend.bound[Sampler::Texture.index()], None);
    }
}
