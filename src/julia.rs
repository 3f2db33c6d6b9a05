// julia.rs — Julia-set payload: parameters, kernel source, CPU reference.
//
// For pixel (x, y) on a w×h grid the starting point is
//
//   jx = scale · (w/2 − x) / (w/2)      (w/2, h/2 are integer halves)
//   jy = scale · (h/2 − y) / (h/2)
//
// and z ← z² + c is iterated up to `max_iterations` times. The pixel is in
// the set unless |z|² exceeds `escape_threshold` on some iteration.
//
// The CPU reference performs the same f32 operations in the same order as
// the kernel. Devices may still contract a·b + c into an FMA, so a handful
// of pixels on the set's boundary can legitimately differ.

use crate::config::ConfigError;
use crate::gpu::DeviceClass;
use crate::image::{Rgba, RgbaImage, BLACK};

/// WGSL template of the kernel.
pub const KERNEL_SOURCE: &str = include_str!("shaders/julia.wgsl");
/// Entry point inside [`KERNEL_SOURCE`].
pub const ENTRY_POINT: &str = "julia";
/// Device class used unless the caller overrides it.
pub const DEFAULT_DEVICE_CLASS: DeviceClass = DeviceClass::Gpu;
/// Every work item is its own workgroup.
pub const LOCAL_SIZE: [u32; 2] = [1, 1];

/// Largest accepted grid dimension.
pub const MAX_DIM: u32 = 1 << 14;

pub const IN_SET: Rgba = [255, 0, 0, 255];

/// Parameters of one Julia render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JuliaParams {
    pub width: u32,
    pub height: u32,
    /// Real part of c.
    pub cx: f32,
    /// Imaginary part of c.
    pub cy: f32,
    pub scale: f32,
    pub max_iterations: u32,
    pub escape_threshold: f32,
}

impl Default for JuliaParams {
    fn default() -> Self {
        JuliaParams {
            width: 1024,
            height: 1024,
            cx: -0.8,
            cy: 0.156,
            scale: 1.5,
            max_iterations: 200,
            escape_threshold: 1000.0,
        }
    }
}

impl JuliaParams {
    /// Same defaults on a `width × height` grid.
    pub fn with_size(width: u32, height: u32) -> Self {
        JuliaParams { width, height, ..Default::default() }
    }

    /// Reject parameters the kernel cannot evaluate.
    ///
    /// Both dimensions must be at least 2, since the integer half of the
    /// grid is a divisor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, v) in [("width", self.width), ("height", self.height)] {
            if v < 2 {
                return Err(ConfigError::TooSmall { what, min: 2, value: v as u64 });
            }
            if v > MAX_DIM {
                return Err(ConfigError::TooLarge { what, max: MAX_DIM as u64, value: v as u64 });
            }
        }
        for (what, v) in [("cx", self.cx), ("cy", self.cy), ("scale", self.scale)] {
            if !v.is_finite() {
                return Err(ConfigError::NonFinite { what, value: v });
            }
        }
        if !self.escape_threshold.is_finite() || self.escape_threshold <= 0.0 {
            return Err(ConfigError::NotPositive {
                what: "escape threshold",
                value: self.escape_threshold,
            });
        }
        Ok(())
    }

    /// Kernel source with every constant baked in. The workgroup-size
    /// placeholders are left for the dispatcher.
    pub fn kernel_source(&self) -> String {
        KERNEL_SOURCE
            .replace("{{WIDTH}}", &self.width.to_string())
            .replace("{{HEIGHT}}", &self.height.to_string())
            .replace("{{CX}}", &wgsl_f32(self.cx))
            .replace("{{CY}}", &wgsl_f32(self.cy))
            .replace("{{SCALE}}", &wgsl_f32(self.scale))
            .replace("{{MAX_ITER}}", &self.max_iterations.to_string())
            .replace("{{THRESHOLD}}", &wgsl_f32(self.escape_threshold))
    }

    /// Whether pixel (x, y) stays bounded.
    pub fn in_set(&self, x: u32, y: u32) -> bool {
        let hw = (self.width / 2) as i32;
        let hh = (self.height / 2) as i32;
        let jx = (self.scale * (hw - x as i32) as f32) / hw as f32;
        let jy = (self.scale * (hh - y as i32) as f32) / hh as f32;

        let (mut zr, mut zi) = (jx, jy);
        for _ in 0..self.max_iterations {
            let r = zr * zr - zi * zi + self.cx;
            let i = zi * zr + zr * zi + self.cy;
            zr = r;
            zi = i;
            if zr * zr + zi * zi > self.escape_threshold {
                return false;
            }
        }
        true
    }

    /// CPU reference of the kernel.
    pub fn render_cpu(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width as usize, self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let px = if self.in_set(x, y) { IN_SET } else { BLACK };
                img.set_pixel(x as usize, y as usize, px);
            }
        }
        img
    }
}

/// f32 as a WGSL float literal. `Debug` always keeps a fractional part or
/// an exponent, so the literal is never parsed as an integer.
pub(crate) fn wgsl_f32(v: f32) -> String {
    format!("{v:?}")
}
