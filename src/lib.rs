// gridcast: host-orchestrated GPU compute over a 2-D pixel grid
// Discover a device, upload, compile, dispatch, read back, present.
//
// Payloads: Julia-set escape-time fractal, planar sphere shading.
// Each payload carries a CPU reference its kernel is validated against.

pub mod gpu;
pub mod image;
pub mod config;
pub mod julia;
pub mod spheres;
pub mod pipeline;
pub mod display;
