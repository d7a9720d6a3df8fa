use crate::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid2 {
    width: u32,
    height: u32,
}

impl Grid2 {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "width must be > 0");
        assert!(height > 0, "height must be > 0");
        Self { width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }
}

#[cfg(test)]
impl Grid2 {
    pub fn size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width as usize && y < self.height as usize);
        y * self.width as usize + x
    }

    pub fn clamp_coord(&self, x: i32, y: i32) -> (usize, usize) {
        let max_x = self.width as i32 - 1;
        let max_y = self.height as i32 - 1;
        (x.clamp(0, max_x) as usize, y.clamp(0, max_y) as usize)
    }

    pub fn texel_center(&self, x: usize, y: usize) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }
}

/// Sizes a grid so its aspect ratio follows the output surface.
pub fn resolve_dimensions(base_resolution: u32, surface_width: u32, surface_height: u32) -> Grid2 {
    let surface_width = surface_width.max(1);
    let surface_height = surface_height.max(1);
    let mut aspect_ratio = surface_width as f32 / surface_height as f32;
    if aspect_ratio < 1.0 {
        aspect_ratio = 1.0 / aspect_ratio;
    }
    let min = (base_resolution as f32).round().max(1.0) as u32;
    let max = (base_resolution as f32 * aspect_ratio).round().max(1.0) as u32;
    if surface_width > surface_height {
        Grid2::new(max, min)
    } else {
        Grid2::new(min, max)
    }
}
