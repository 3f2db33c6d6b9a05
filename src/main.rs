// main.rs — gridcast command line.
//
//   gridcast [--platform N] [--device-class cpu|gpu|all] [--backends LIST]
//            [--output FILE.png] [--list] <julia|spheres> [payload options]
//
// Exit codes: 0 success, 2 usage (clap), 3 enumeration, 4 resource
// creation, 5 compilation, 6 binding, 7 dispatch, 8 transfer,
// 9 presentation, 10 invalid configuration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use clap::{CommandFactory, Parser, Subcommand};

use gridcast::config::RunConfig;
use gridcast::display::{Present, PngPresenter, WindowPresenter, PRESENT_EXIT_CODE};
use gridcast::gpu::{self, BackendSelection, DeviceClass, GpuError};
use gridcast::julia::JuliaParams;
use gridcast::pipeline::{self, Payload};
use gridcast::spheres::{SceneParams, ShadingPolicy, SphereScene};

/// Host-orchestrated GPU compute harness: Julia fractal and sphere shading.
#[derive(Parser, Debug)]
#[command(name = "gridcast", version, long_about = None)]
struct Cli {
    /// Platform index (see --list)
    #[arg(long, default_value_t = 0, global = true)]
    platform: usize,

    /// Device class; defaults to the payload's (gpu for julia, cpu for spheres)
    #[arg(long, value_name = "CLASS", global = true)]
    device_class: Option<DeviceClass>,

    /// Backends to probe: all, primary, vulkan, metal, dx12, gl (comma-separated)
    #[arg(long, default_value = "all", value_name = "LIST", global = true)]
    backends: BackendSelection,

    /// Write the image to a PNG file instead of opening a window
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,

    /// List platforms and devices, then exit
    #[arg(long)]
    list: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the Julia set z ← z² + c
    Julia {
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 1024)]
        height: u32,
        /// Real part of c
        #[arg(long, default_value_t = -0.8, allow_negative_numbers = true)]
        cx: f32,
        /// Imaginary part of c
        #[arg(long, default_value_t = 0.156, allow_negative_numbers = true)]
        cy: f32,
        #[arg(long, default_value_t = 1.5)]
        scale: f32,
        #[arg(long, default_value_t = 200)]
        max_iterations: u32,
        /// |z|² above which a point has escaped
        #[arg(long, default_value_t = 1000.0)]
        escape_threshold: f32,
    },

    /// Shade a random scene of spheres
    Spheres {
        #[arg(long, default_value_t = 800)]
        width: u32,
        #[arg(long, default_value_t = 800)]
        height: u32,
        /// Number of spheres
        #[arg(long, default_value_t = 8)]
        count: u32,
        /// Scene seed; defaults to the clock
        #[arg(long)]
        seed: Option<u64>,
        /// How overlapping spheres combine: compatible or nearest-clamped
        #[arg(long, default_value = "compatible")]
        shading: ShadingPolicy,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("gridcast=info,wgpu_core=warn,wgpu_hal=warn"),
    )
    .init();

    let cli = Cli::parse();

    if cli.list {
        return match list(cli.backends) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(&e.to_string(), e.category().exit_code()),
        };
    }

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::from(2);
    };

    let payload = match command {
        Commands::Julia { width, height, cx, cy, scale, max_iterations, escape_threshold } => {
            Payload::Julia(JuliaParams {
                width,
                height,
                cx,
                cy,
                scale,
                max_iterations,
                escape_threshold,
            })
        }
        Commands::Spheres { width, height, count, seed, shading } => {
            let seed = seed.unwrap_or_else(clock_seed);
            log::info!("sphere scene seed: {seed}");
            let params = SceneParams { width, height, count, seed };
            if let Err(e) = params.validate() {
                return fail(&format!("invalid configuration: {e}"), pipeline::CONFIG_EXIT_CODE);
            }
            Payload::Spheres { scene: SphereScene::generate(&params), shading }
        }
    };

    let config = RunConfig {
        platform_index: cli.platform,
        device_class: cli.device_class,
        backends: cli.backends,
    };

    let image = match pipeline::run(&config, &payload) {
        Ok(image) => image,
        Err(e) => return fail(&e.to_string(), e.report()),
    };

    match present(&image, cli.output, payload.name()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&format!("{e:#}"), PRESENT_EXIT_CODE),
    }
}

fn present(
    image: &gridcast::image::RgbaImage,
    output: Option<PathBuf>,
    title: &str,
) -> anyhow::Result<()> {
    let mut presenter: Box<dyn Present> = match output {
        Some(path) => Box::new(PngPresenter::new(path)),
        None => Box::new(WindowPresenter::new(format!("gridcast: {title}"))),
    };
    presenter.present(image).context("present failed")
}

/// Print every platform and its devices.
fn list(backends: BackendSelection) -> Result<(), GpuError> {
    let instance = gpu::create_instance(backends);
    let platforms = gpu::list_platforms(&instance)?;
    for platform in &platforms {
        println!("{platform}");
        for device in gpu::list_devices(&instance, platform, DeviceClass::All)? {
            println!("    {device}");
        }
    }
    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn fail(message: &str, code: i32) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
