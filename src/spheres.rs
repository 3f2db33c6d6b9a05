// spheres.rs — sphere-shading payload: scene, kernel source, CPU reference.
//
// SCENE
// ─────
// A small array of spheres with integer centre and colour and a float
// radius. Rays are cast straight down z from every pixel, so a sphere is
// hit when the pixel lies within `radius` of its projected centre (x, y).
// The scene is a plain value owned by the caller; nothing is global.
//
// SHADING
// ───────
// For a hit at planar distance d, each channel becomes
//
//   v = channel − 3·d − z
//
// Two policies decide what a pixel covered by several spheres shows:
//
//   Compatible      every hit overwrites each channel with 0 < v < 255 by
//                   trunc(v); other channels keep the previous value, so
//                   the last qualifying sphere in array order wins.
//   NearestClamped  the hit with the smallest z wins (earliest on ties),
//                   each channel is clamp(trunc(v), 0, 255).
//
// Hits are tested on the squared integer distance, so d == radius is a hit
// on every device regardless of how its sqrt rounds.

use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};

use crate::config::ConfigError;
use crate::gpu::DeviceClass;
use crate::image::{RgbaImage, BLACK};

/// WGSL template of the kernel (both policies).
pub const KERNEL_SOURCE: &str = include_str!("shaders/spheres.wgsl");
/// Device class used unless the caller overrides it.
pub const DEFAULT_DEVICE_CLASS: DeviceClass = DeviceClass::Cpu;

pub const SHADOW_FACTOR: f32 = 3.0;
/// Largest accepted grid dimension.
pub const MAX_DIM: u32 = 1 << 14;
/// Largest accepted sphere count.
pub const MAX_SPHERES: u32 = 1 << 16;

// ============================================================
// Sphere
// ============================================================

/// One sphere, laid out exactly as the WGSL `Sphere` struct (28 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Sphere {
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub radius: f32,
}

impl Sphere {
    /// Planar distance from (px, py) to the projected centre, if hit.
    /// A negative radius never hits. Offsets are widened so centres far
    /// outside the grid cannot overflow.
    #[inline]
    pub fn hit(&self, px: i32, py: i32) -> Option<f32> {
        let dx = px as i64 - self.x as i64;
        let dy = py as i64 - self.y as i64;
        let d2 = (dx * dx + dy * dy) as f32;
        (self.radius >= 0.0 && d2 <= self.radius * self.radius).then(|| d2.sqrt())
    }

    /// Unclamped shade of each channel at distance `d`.
    #[inline]
    pub fn shade(&self, d: f32) -> [f32; 3] {
        let z = self.z as f32;
        [
            self.r as f32 - d * SHADOW_FACTOR - z,
            self.g as f32 - d * SHADOW_FACTOR - z,
            self.b as f32 - d * SHADOW_FACTOR - z,
        ]
    }
}

// ============================================================
// Shading policy
// ============================================================

/// How overlapping hits combine into one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ShadingPolicy {
    #[default]
    Compatible,
    NearestClamped,
}

impl ShadingPolicy {
    /// Kernel entry point implementing this policy.
    pub fn entry_point(self) -> &'static str {
        match self {
            ShadingPolicy::Compatible => "shade_compatible",
            ShadingPolicy::NearestClamped => "shade_nearest",
        }
    }
}

impl fmt::Display for ShadingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShadingPolicy::Compatible => "compatible",
            ShadingPolicy::NearestClamped => "nearest-clamped",
        })
    }
}

impl FromStr for ShadingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compatible" => Ok(ShadingPolicy::Compatible),
            "nearest-clamped" | "nearest" => Ok(ShadingPolicy::NearestClamped),
            other => Err(format!(
                "unknown shading policy `{other}` (expected compatible or nearest-clamped)"
            )),
        }
    }
}

// ============================================================
// Scene generation
// ============================================================

/// Parameters of a randomly generated scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneParams {
    pub width: u32,
    pub height: u32,
    pub count: u32,
    pub seed: u64,
}

impl Default for SceneParams {
    fn default() -> Self {
        SceneParams { width: 800, height: 800, count: 8, seed: 0 }
    }
}

impl SceneParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, v) in [("width", self.width), ("height", self.height)] {
            if v == 0 {
                return Err(ConfigError::TooSmall { what, min: 1, value: 0 });
            }
            if v > MAX_DIM {
                return Err(ConfigError::TooLarge { what, max: MAX_DIM as u64, value: v as u64 });
            }
        }
        if self.count > MAX_SPHERES {
            return Err(ConfigError::TooLarge {
                what: "sphere count",
                max: MAX_SPHERES as u64,
                value: self.count as u64,
            });
        }
        Ok(())
    }
}

/// xorshift64* generator with owned state.
struct XorShift64Star(u64);

impl XorShift64Star {
    fn new(seed: u64) -> Self {
        // A zero state is a fixed point; fold in a non-zero constant.
        let s = seed ^ 0x9E37_79B9_7F4A_7C15;
        XorShift64Star(if s == 0 { 0x9E37_79B9_7F4A_7C15 } else { s })
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Value in `[0, n)`; `n` must be non-zero.
    fn below(&mut self, n: u32) -> i32 {
        ((self.next_u64() >> 32) % n as u64) as i32
    }
}

/// A sphere array together with the grid it is rendered on.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereScene {
    pub width: u32,
    pub height: u32,
    pub spheres: Vec<Sphere>,
}

impl SphereScene {
    pub fn new(width: u32, height: u32, spheres: Vec<Sphere>) -> Self {
        SphereScene { width, height, spheres }
    }

    /// Random scene: centre x, y in the grid, z in [0, 100), colour
    /// channels and (integral) radius in [0, 255).
    pub fn generate(params: &SceneParams) -> Self {
        let mut rng = XorShift64Star::new(params.seed);
        let spheres = (0..params.count)
            .map(|_| {
                let x = rng.below(params.width);
                let y = rng.below(params.height);
                let z = rng.below(100);
                let r = rng.below(255);
                let g = rng.below(255);
                let b = rng.below(255);
                let radius = rng.below(255) as f32;
                Sphere { r, g, b, x, y, z, radius }
            })
            .collect();
        log::debug!("generated {} spheres (seed {})", params.count, params.seed);
        SphereScene::new(params.width, params.height, spheres)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        SceneParams {
            width: self.width,
            height: self.height,
            count: self.spheres.len().min(u32::MAX as usize) as u32,
            seed: 0,
        }
        .validate()?;
        if let Some(s) = self.spheres.iter().find(|s| !s.radius.is_finite()) {
            return Err(ConfigError::NonFinite { what: "sphere radius", value: s.radius });
        }
        Ok(())
    }

    /// Records to upload. Never empty: an empty scene uploads one zeroed
    /// record so the storage binding is valid, and the kernel reads none.
    pub fn device_records(&self) -> Vec<Sphere> {
        if self.spheres.is_empty() {
            vec![Sphere::zeroed()]
        } else {
            self.spheres.clone()
        }
    }

    /// Kernel source with grid size and sphere count baked in.
    pub fn kernel_source(&self) -> String {
        KERNEL_SOURCE
            .replace("{{WIDTH}}", &self.width.to_string())
            .replace("{{HEIGHT}}", &self.height.to_string())
            .replace("{{N_SPHERES}}", &self.spheres.len().to_string())
    }

    /// Shade one pixel.
    pub fn shade_pixel(&self, px: i32, py: i32, policy: ShadingPolicy) -> [u8; 4] {
        let mut color = [0i32; 3];
        match policy {
            ShadingPolicy::Compatible => {
                for s in &self.spheres {
                    let Some(d) = s.hit(px, py) else { continue };
                    for (c, v) in color.iter_mut().zip(s.shade(d)) {
                        if v > 0.0 && v < 255.0 {
                            *c = v as i32;
                        }
                    }
                }
            }
            ShadingPolicy::NearestClamped => {
                let mut best: Option<(i32, [f32; 3])> = None;
                for s in &self.spheres {
                    let Some(d) = s.hit(px, py) else { continue };
                    if best.map_or(true, |(z, _)| s.z < z) {
                        best = Some((s.z, s.shade(d)));
                    }
                }
                if let Some((_, v)) = best {
                    for (c, v) in color.iter_mut().zip(v) {
                        *c = (v as i32).clamp(0, 255);
                    }
                }
            }
        }
        [color[0] as u8, color[1] as u8, color[2] as u8, 255]
    }

    /// CPU reference of the kernel.
    pub fn render_cpu(&self, policy: ShadingPolicy) -> RgbaImage {
        let mut img = RgbaImage::new(self.width as usize, self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let px = if self.spheres.is_empty() {
                    BLACK
                } else {
                    self.shade_pixel(x as i32, y as i32, policy)
                };
                img.set_pixel(x as usize, y as usize, px);
            }
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey(x: i32, y: i32, z: i32, radius: f32, c: i32) -> Sphere {
        Sphere { r: c, g: c, b: c, x, y, z, radius }
    }

    #[test]
    fn test_sphere_layout_is_28_bytes() {
        assert_eq!(std::mem::size_of::<Sphere>(), 28);
        let s = grey(1, 2, 3, 4.0, 5);
        let words: &[i32] = bytemuck::cast_slice(bytemuck::bytes_of(&s));
        assert_eq!(&words[..6], &[5, 5, 5, 1, 2, 3]);
    }

    #[test]
    fn test_boundary_is_hit() {
        let s = grey(2, 2, 0, 1.0, 100);
        assert_eq!(s.hit(3, 2), Some(1.0));
        assert_eq!(s.hit(3, 3), None);
    }

    #[test]
    fn test_negative_radius_never_hits() {
        let s = grey(2, 2, 0, -1.0, 100);
        assert_eq!(s.hit(2, 2), None);
        assert_eq!(s.hit(3, 2), None);
    }

    #[test]
    fn test_far_centre_does_not_overflow() {
        let s = grey(50_000, 0, 0, 10.0, 100);
        assert_eq!(s.hit(0, 0), None);
        // 65536² wraps to 0 in 32-bit arithmetic.
        let s = grey(65_536, 0, 0, 10.0, 100);
        assert_eq!(s.hit(0, 0), None);
        let s = grey(i32::MIN, i32::MAX, 0, 10.0, 100);
        assert_eq!(s.hit(0, 0), None);
    }

    #[test]
    fn test_generation_is_seeded_and_in_range() {
        let p = SceneParams { width: 50, height: 40, count: 64, seed: 7 };
        let a = SphereScene::generate(&p);
        let b = SphereScene::generate(&p);
        assert_eq!(a, b);
        assert_eq!(a.spheres.len(), 64);
        for s in &a.spheres {
            assert!((0..50).contains(&s.x) && (0..40).contains(&s.y));
            assert!((0..100).contains(&s.z));
            assert!([s.r, s.g, s.b].iter().all(|c| (0..255).contains(c)));
            assert!(s.radius >= 0.0 && s.radius < 255.0 && s.radius.fract() == 0.0);
        }
        let c = SphereScene::generate(&SceneParams { seed: 8, ..p });
        assert_ne!(a, c);
    }

    #[test]
    fn test_zero_seed_still_generates() {
        let p = SceneParams { seed: 0, ..Default::default() };
        let scene = SphereScene::generate(&p);
        assert!(scene.spheres.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_empty_scene_pads_one_record() {
        let scene = SphereScene::new(4, 4, Vec::new());
        assert_eq!(scene.device_records(), vec![Sphere::zeroed()]);
        assert!(scene.kernel_source().contains("const N_SPHERES: u32 = 0u;"));
    }

    #[test]
    fn test_compatible_keeps_out_of_range_channels() {
        // Second sphere is too deep for red (v < 0) but fine for green.
        let first = Sphere { r: 200, g: 50, b: 0, x: 0, y: 0, z: 0, radius: 5.0 };
        let second = Sphere { r: 10, g: 120, b: 0, x: 0, y: 0, z: 20, radius: 5.0 };
        let scene = SphereScene::new(1, 1, vec![first, second]);
        assert_eq!(scene.shade_pixel(0, 0, ShadingPolicy::Compatible), [200, 100, 0, 255]);
    }

    #[test]
    fn test_nearest_clamped_picks_smallest_z() {
        let near = Sphere { r: 255, g: 255, b: 255, x: 0, y: 0, z: 5, radius: 5.0 };
        let far = Sphere { r: 10, g: 120, b: 0, x: 0, y: 0, z: 20, radius: 5.0 };
        let scene = SphereScene::new(1, 1, vec![far, near]);
        assert_eq!(scene.shade_pixel(0, 0, ShadingPolicy::NearestClamped), [250, 250, 250, 255]);
        // Clamping: 10 − 0 − 20 < 0 → 0.
        let scene = SphereScene::new(1, 1, vec![far]);
        assert_eq!(scene.shade_pixel(0, 0, ShadingPolicy::NearestClamped), [0, 100, 0, 255]);
    }

    #[test]
    fn test_policy_parse_and_entry_points() {
        assert_eq!("compatible".parse::<ShadingPolicy>(), Ok(ShadingPolicy::Compatible));
        assert_eq!("Nearest-Clamped".parse::<ShadingPolicy>(), Ok(ShadingPolicy::NearestClamped));
        assert!("fancy".parse::<ShadingPolicy>().is_err());
        assert_eq!(ShadingPolicy::default(), ShadingPolicy::Compatible);
        assert_ne!(
            ShadingPolicy::Compatible.entry_point(),
            ShadingPolicy::NearestClamped.entry_point()
        );
    }

    #[test]
    fn test_validate_limits() {
        assert!(SceneParams::default().validate().is_ok());
        let p = SceneParams { width: 0, ..Default::default() };
        assert!(p.validate().is_err());
        let p = SceneParams { count: MAX_SPHERES + 1, ..Default::default() };
        assert!(p.validate().is_err());
    }
}
