// pipeline.rs — the fixed host/device sequence of one run.
//
//   InitHost → Discover → Bind → Allocate → Upload → Build → Dispatch
//            → Readback → Drain → Release            (→ Present, by caller)
//
// Each stage is logged at `info` with its elapsed time. A failing stage
// ends the run: the error names the stage, and everything constructed so
// far is released in reverse order of construction when the locals go out
// of scope. On success the same order is spelled out as explicit drops.
//
// All waits in here (blocking upload, download, finish) block the calling
// thread until the device is done; none can be cancelled or time out.

use std::fmt;
use std::time::Instant;

use crate::config::{ConfigError, RunConfig};
use crate::gpu::{
    create_instance, list_devices, list_platforms, select_platform, AccessMode, Blocking,
    Context, DeviceBuffer, DeviceClass, GpuError, KernelArg, Program,
};
use crate::image::RgbaImage;
use crate::julia::{self, JuliaParams};
use crate::spheres::{self, ShadingPolicy, SphereScene};

// ============================================================
// Payload
// ============================================================

/// What a run computes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Julia(JuliaParams),
    Spheres { scene: SphereScene, shading: ShadingPolicy },
}

impl Payload {
    pub fn name(&self) -> &'static str {
        match self {
            Payload::Julia(_) => "julia",
            Payload::Spheres { .. } => "spheres",
        }
    }

    /// Device class the payload runs on unless overridden.
    pub fn default_device_class(&self) -> DeviceClass {
        match self {
            Payload::Julia(_) => julia::DEFAULT_DEVICE_CLASS,
            Payload::Spheres { .. } => spheres::DEFAULT_DEVICE_CLASS,
        }
    }

    /// Grid size `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Payload::Julia(p) => (p.width, p.height),
            Payload::Spheres { scene, .. } => (scene.width, scene.height),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Payload::Julia(p) => p.validate(),
            Payload::Spheres { scene, .. } => scene.validate(),
        }
    }

    fn kernel_source(&self) -> String {
        match self {
            Payload::Julia(p) => p.kernel_source(),
            Payload::Spheres { scene, .. } => scene.kernel_source(),
        }
    }

    fn entry_point(&self) -> &'static str {
        match self {
            Payload::Julia(_) => julia::ENTRY_POINT,
            Payload::Spheres { shading, .. } => shading.entry_point(),
        }
    }

    /// Pinned local size, or `None` to let the dispatcher choose.
    fn local_size(&self) -> Option<&'static [u32]> {
        match self {
            Payload::Julia(_) => Some(&julia::LOCAL_SIZE),
            Payload::Spheres { .. } => None,
        }
    }

    /// The authoritative CPU rendering of this payload.
    pub fn render_cpu(&self) -> RgbaImage {
        match self {
            Payload::Julia(p) => p.render_cpu(),
            Payload::Spheres { scene, shading } => scene.render_cpu(*shading),
        }
    }
}

// ============================================================
// Stages and errors
// ============================================================

/// Steps of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    InitHost,
    Discover,
    Bind,
    Allocate,
    Upload,
    Build,
    Dispatch,
    Readback,
    Drain,
    Release,
    Present,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::InitHost => "init-host",
            Stage::Discover => "discover",
            Stage::Bind => "bind",
            Stage::Allocate => "allocate",
            Stage::Upload => "upload",
            Stage::Build => "build",
            Stage::Dispatch => "dispatch",
            Stage::Readback => "readback",
            Stage::Drain => "drain",
            Stage::Release => "release",
            Stage::Present => "present",
        })
    }
}

/// Exit code for a configuration rejected before any device interaction.
pub const CONFIG_EXIT_CODE: i32 = 10;

/// A failed run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} failed: invalid configuration: {source}")]
    Config {
        stage: Stage,
        #[source]
        source: ConfigError,
    },

    #[error("{stage} failed: {source}")]
    Gpu {
        stage: Stage,
        #[source]
        source: GpuError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config { stage, .. } | PipelineError::Gpu { stage, .. } => *stage,
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config { .. } => CONFIG_EXIT_CODE,
            PipelineError::Gpu { source, .. } => source.category().exit_code(),
        }
    }

    /// Log the failure at `error` and return its exit code. A compilation
    /// failure carries the full diagnostic in its message.
    pub fn report(&self) -> i32 {
        log::error!("{self}");
        self.exit_code()
    }

    /// The device-layer error, if the run got that far.
    pub fn gpu_error(&self) -> Option<&GpuError> {
        match self {
            PipelineError::Gpu { source, .. } => Some(source),
            PipelineError::Config { .. } => None,
        }
    }
}

fn at(stage: Stage) -> impl Fn(GpuError) -> PipelineError {
    move |source| PipelineError::Gpu { stage, source }
}

/// Logs each stage on entry and its duration when the next one starts.
struct StageLog {
    current: Option<(Stage, Instant)>,
    payload: &'static str,
}

impl StageLog {
    fn new(payload: &'static str) -> Self {
        StageLog { current: None, payload }
    }

    fn enter(&mut self, stage: Stage) {
        self.finish();
        log::debug!("[{}] {stage}", self.payload);
        self.current = Some((stage, Instant::now()));
    }

    fn finish(&mut self) {
        if let Some((stage, t0)) = self.current.take() {
            log::info!("[{}] {stage} done in {:.2?}", self.payload, t0.elapsed());
        }
    }
}

// ============================================================
// Run
// ============================================================

/// Compute `payload` on the device selected by `config` and return the
/// finished image. One run per call; nothing is retried.
pub fn run(config: &RunConfig, payload: &Payload) -> Result<RgbaImage, PipelineError> {
    let mut stages = StageLog::new(payload.name());

    // ---- InitHost --------------------------------------------------------
    stages.enter(Stage::InitHost);
    payload
        .validate()
        .map_err(|source| PipelineError::Config { stage: Stage::InitHost, source })?;
    let (width, height) = payload.dimensions();
    let mut image = RgbaImage::new(width as usize, height as usize);

    // ---- Discover --------------------------------------------------------
    stages.enter(Stage::Discover);
    let instance = create_instance(config.backends);
    let platforms = list_platforms(&instance).map_err(at(Stage::Discover))?;
    let platform =
        select_platform(&platforms, config.platform_index).map_err(at(Stage::Discover))?;
    let class = config.device_class.unwrap_or_else(|| payload.default_device_class());
    let devices = list_devices(&instance, platform, class).map_err(at(Stage::Discover))?;

    // ---- Bind ------------------------------------------------------------
    stages.enter(Stage::Bind);
    let ctx = Context::create(instance, devices).map_err(at(Stage::Bind))?;
    let queue = ctx.create_queue().map_err(at(Stage::Bind))?;

    // ---- Allocate --------------------------------------------------------
    stages.enter(Stage::Allocate);
    let image_buf =
        DeviceBuffer::allocate(&ctx, "image", image.byte_len() as u64, AccessMode::ReadWrite)
            .map_err(at(Stage::Allocate))?;
    let sphere_records = match payload {
        Payload::Spheres { scene, .. } => Some(scene.device_records()),
        Payload::Julia(_) => None,
    };
    let sphere_buf = match &sphere_records {
        Some(records) => Some(
            DeviceBuffer::allocate(
                &ctx,
                "spheres",
                std::mem::size_of_val(records.as_slice()) as u64,
                AccessMode::ReadOnly,
            )
            .map_err(at(Stage::Allocate))?,
        ),
        None => None,
    };

    // ---- Upload ----------------------------------------------------------
    stages.enter(Stage::Upload);
    queue
        .upload(&image_buf, image.as_bytes(), Blocking::Yes)
        .map_err(at(Stage::Upload))?;
    if let (Some(buf), Some(records)) = (&sphere_buf, &sphere_records) {
        queue
            .upload(buf, bytemuck::cast_slice(records), Blocking::Yes)
            .map_err(at(Stage::Upload))?;
    }

    // ---- Build -----------------------------------------------------------
    stages.enter(Stage::Build);
    let program = Program::compile(&ctx, payload.name(), &payload.kernel_source())
        .map_err(at(Stage::Build))?;
    let mut kernel = program.create_kernel(payload.entry_point()).map_err(at(Stage::Build))?;
    kernel.set_arg(0, KernelArg::Buffer(&image_buf)).map_err(at(Stage::Build))?;
    if let Some(buf) = &sphere_buf {
        kernel.set_arg(1, KernelArg::Buffer(buf)).map_err(at(Stage::Build))?;
    }

    // ---- Dispatch --------------------------------------------------------
    stages.enter(Stage::Dispatch);
    let done = queue
        .enqueue_kernel(&mut kernel, &[width, height], payload.local_size(), &[])
        .map_err(at(Stage::Dispatch))?;

    // ---- Readback --------------------------------------------------------
    stages.enter(Stage::Readback);
    queue
        .download(&image_buf, image.as_bytes_mut(), &[done])
        .map_err(at(Stage::Readback))?;

    // ---- Drain -----------------------------------------------------------
    stages.enter(Stage::Drain);
    queue.finish();

    // ---- Release ---------------------------------------------------------
    stages.enter(Stage::Release);
    drop(kernel);
    drop(program);
    drop(sphere_buf);
    drop(image_buf);
    drop(queue);
    drop(ctx);
    stages.finish();

    Ok(image)
}
