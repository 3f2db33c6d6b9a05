// gpu/dispatch.rs — N-dimensional kernel launches.
//
// SIZES
// ─────
// The global size is a list of 1..=3 work-item counts. The local size is
// either given by the caller (same rank) or chosen here. Both are padded to
// three dimensions with 1. The local size must divide the global size in
// every dimension; the launch then dispatches global/local workgroups.
// Kernels guard with `if (gid.x >= W || gid.y >= H) { return; }` anyway, so
// a chosen size never needs to overshoot.
//
// CHOOSING A LOCAL SIZE
// ─────────────────────
// Per dimension, the largest power of two that divides the global size and
// fits both the default (16×8×1, the same tile shape as the image kernels
// it came from) and the device's per-dimension limit. If the product then
// exceeds `max_compute_invocations_per_workgroup`, the largest dimension is
// halved until it fits; halving a power-of-two divisor keeps it a divisor.
//
// ORDERING
// ────────
// The queue is in-order: a submission runs after everything submitted
// before it. `wait_for` therefore needs no host-side wait for events of the
// same queue; it is checked for ownership only.

use std::fmt;

use crate::gpu::context::{Event, Queue};
use crate::gpu::error::{GpuError, GpuResult};
use crate::gpu::program::Kernel;

/// Work items per workgroup in each dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Tile shape used when the caller leaves the local size open.
pub const DEFAULT_WORKGROUP: WorkgroupSize = WorkgroupSize { x: 16, y: 8, z: 1 };

impl WorkgroupSize {
    pub const ONE: WorkgroupSize = WorkgroupSize { x: 1, y: 1, z: 1 };

    /// Pad a rank 1..=3 size list to three dimensions.
    pub fn from_dims(dims: &[u32]) -> Option<Self> {
        match *dims {
            [x] => Some(WorkgroupSize { x, y: 1, z: 1 }),
            [x, y] => Some(WorkgroupSize { x, y, z: 1 }),
            [x, y, z] => Some(WorkgroupSize { x, y, z }),
            _ => None,
        }
    }

    pub fn as_array(self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    /// Invocations per workgroup.
    pub fn total(self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

fn dim_limits(limits: &wgpu::Limits) -> [u32; 3] {
    [
        limits.max_compute_workgroup_size_x,
        limits.max_compute_workgroup_size_y,
        limits.max_compute_workgroup_size_z,
    ]
}

/// Largest power of two ≤ `cap` dividing `n` (n > 0, cap ≥ 1).
fn pow2_divisor(n: u32, cap: u32) -> u32 {
    // n & n.wrapping_neg() is the largest power of two dividing n.
    let by_n = n & n.wrapping_neg();
    let by_cap = if cap == 0 { 1 } else { 1 << (31 - cap.leading_zeros()) };
    by_n.min(by_cap).max(1)
}

/// Pick a local size for `global` that divides it and respects `limits`.
pub fn choose_local_size(global: WorkgroupSize, limits: &wgpu::Limits) -> WorkgroupSize {
    let defaults = DEFAULT_WORKGROUP.as_array();
    let dims = dim_limits(limits);
    let mut local = [1u32; 3];
    for d in 0..3 {
        local[d] = pow2_divisor(global.as_array()[d], defaults[d].min(dims[d]));
    }
    let max_inv = limits.max_compute_invocations_per_workgroup.max(1) as u64;
    while local.iter().map(|&v| v as u64).product::<u64>() > max_inv {
        let widest = (0..3).max_by_key(|&d| local[d]).unwrap_or(0);
        local[widest] /= 2;
    }
    WorkgroupSize { x: local[0], y: local[1], z: local[2] }
}

/// Check a launch against the device limits and return the workgroup count.
pub(crate) fn validate_launch(
    global: WorkgroupSize,
    local: WorkgroupSize,
    limits: &wgpu::Limits,
) -> Result<[u32; 3], String> {
    let g = global.as_array();
    let l = local.as_array();
    let dims = dim_limits(limits);
    let mut counts = [0u32; 3];
    for d in 0..3 {
        if l[d] == 0 {
            return Err(format!("local size {local} has a zero dimension"));
        }
        if l[d] > dims[d] {
            return Err(format!(
                "local size {local} exceeds device limit {} in dimension {d}",
                dims[d]
            ));
        }
        if g[d] % l[d] != 0 {
            return Err(format!("local size {local} does not divide global size {global}"));
        }
        counts[d] = g[d] / l[d];
        if counts[d] > limits.max_compute_workgroups_per_dimension {
            return Err(format!(
                "{} workgroups in dimension {d} exceed device limit {}",
                counts[d], limits.max_compute_workgroups_per_dimension
            ));
        }
    }
    if local.total() > limits.max_compute_invocations_per_workgroup as u64 {
        return Err(format!(
            "local size {local} has {} invocations, device allows {}",
            local.total(),
            limits.max_compute_invocations_per_workgroup
        ));
    }
    Ok(counts)
}

// ============================================================
// Launch
// ============================================================

impl<'ctx> Queue<'ctx> {
    /// Enqueue `kernel` over `global` work items.
    ///
    /// `local` must have the same rank as `global` when given; `None` lets
    /// the dispatcher choose. The launch is ordered after `wait_for` by
    /// queue order; the events are checked for ownership, not waited on.
    ///
    /// # Errors
    /// `DispatchFailed` on invalid sizes, limits exceeded, unbound
    /// arguments, foreign kernel/events, or a runtime validation error.
    /// `CompilationFailed` if specialising the kernel to the chosen local
    /// size is rejected.
    pub fn enqueue_kernel(
        &self,
        kernel: &mut Kernel<'_, 'ctx>,
        global: &[u32],
        local: Option<&[u32]>,
        wait_for: &[Event<'_>],
    ) -> GpuResult<Event<'ctx>> {
        self.check_events(wait_for).map_err(GpuError::DispatchFailed)?;
        if kernel.context_id() != self.ctx.id() {
            return Err(GpuError::DispatchFailed(format!(
                "kernel `{}` belongs to another context",
                kernel.name()
            )));
        }

        let global3 = WorkgroupSize::from_dims(global).ok_or_else(|| {
            GpuError::DispatchFailed(format!("global size must have 1 to 3 dimensions, got {global:?}"))
        })?;
        if global3.as_array().contains(&0) {
            return Err(GpuError::DispatchFailed(format!("global size {global:?} has a zero dimension")));
        }

        let requested = match local {
            Some(l) if l.len() != global.len() => {
                return Err(GpuError::DispatchFailed(format!(
                    "local size {l:?} and global size {global:?} differ in rank"
                )))
            }
            Some(l) => WorkgroupSize::from_dims(l),
            None => None,
        };
        let wg = match (kernel.fixed_workgroup_size(), requested) {
            (Some(fixed), Some(req)) if fixed != req => {
                return Err(GpuError::DispatchFailed(format!(
                    "kernel `{}` declares workgroup size {fixed}, launch asked for {req}",
                    kernel.name()
                )))
            }
            (Some(fixed), _) => fixed,
            (None, Some(req)) => req,
            (None, None) => choose_local_size(global3, self.ctx.limits()),
        };
        let counts =
            validate_launch(global3, wg, self.ctx.limits()).map_err(GpuError::DispatchFailed)?;

        if !kernel.is_fully_bound() {
            return Err(GpuError::DispatchFailed(format!(
                "kernel `{}` has unbound parameters: {:?}",
                kernel.name(),
                kernel.unbound()
            )));
        }

        kernel.prepare(wg)?;
        let (bind_group, _uniforms) = kernel.bind_group()?;
        let Some(pipeline) = kernel.pipeline(wg) else {
            return Err(GpuError::DispatchFailed(format!(
                "kernel `{}` has no pipeline for {wg}",
                kernel.name()
            )));
        };

        let (event, err) = self.ctx.scoped(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel.name()),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(kernel.name()),
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(counts[0], counts[1], counts[2]);
            }
            self.submit(encoder)
        });
        if let Some(e) = err {
            return Err(GpuError::DispatchFailed(format!("kernel `{}`: {e}", kernel.name())));
        }

        log::debug!(
            "dispatched `{}`: global {global3}, local {wg}, {}x{}x{} workgroups",
            kernel.name(),
            counts[0],
            counts[1],
            counts[2]
        );
        Ok(event)
    }
}

// ============================================================
// Tests
// ============================================================
