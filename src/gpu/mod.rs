// gpu/mod.rs — host/device compute layer.
//
// A thin, typed layer over wgpu that the payload pipeline drives step by
// step:
//
//   device    → platforms (backends) and devices (adapters), class filter
//   context   → logical device, its single in-order queue, events
//   buffer    → device buffers, blocking and non-blocking transfers
//   program   → WGSL compilation, entry-point reflection, argument binding
//   dispatch  → N-dimensional launches with explicit or chosen local size
//
// Lifetimes carry the release order: queues, buffers, programs, kernels
// and events all borrow the `Context` they were created on, so a context
// cannot be dropped while any of them is alive.
//
// The CPU references in `julia` and `spheres` remain authoritative; GPU
// results are validated against them.

pub mod error;
pub mod device;
pub mod context;
pub mod buffer;
pub mod program;
pub mod dispatch;

pub use buffer::{AccessMode, Blocking, DeviceBuffer, PendingRead};
pub use context::{wait_all, Context, Event, Queue};
pub use device::{
    create_instance, list_devices, list_platforms, select_platform, BackendSelection, Device,
    DeviceClass, DeviceInfo, Platform,
};
pub use dispatch::{choose_local_size, WorkgroupSize, DEFAULT_WORKGROUP};
pub use error::{ErrorCategory, GpuError, GpuResult};
pub use program::{Kernel, KernelArg, Param, ParamKind, Program};

/// Run one `#[ignore]`d inner GPU test in its own `cargo test` process.
///
/// Some drivers crash on teardown of a second device in the same process;
/// isolating each inner test keeps that from taking the suite down.
#[cfg(test)]
pub(crate) fn run_gpu_test_in_subprocess(test_name: &str) -> String {
    let output = std::process::Command::new("cargo")
        .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    print!("{stdout}");
    eprint!("{stderr}");
    stdout + &stderr
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Context on the first device of the first platform, any class.
    pub fn any_context() -> Context {
        let instance = create_instance(BackendSelection::default());
        let platforms = list_platforms(&instance).expect("need a compute platform");
        let devices =
            list_devices(&instance, &platforms[0], DeviceClass::All).expect("need a device");
        Context::create(instance, devices).expect("context creation")
    }
}
