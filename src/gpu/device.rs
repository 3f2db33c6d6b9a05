// gpu/device.rs — platform and device discovery.
//
// Responsibilities:
//   - Create the wgpu instance over a chosen set of backends.
//   - List platforms: one per backend that exposes at least one adapter.
//   - List devices of a requested class on one platform.
//
// PLATFORMS
// A platform is a vendor runtime the host can talk to. wgpu reaches every
// runtime through a backend (Vulkan, Metal, DX12, GL), so a backend with at
// least one adapter is a platform. Probing order is fixed so a platform
// index chosen on the command line is stable between runs on one machine.
//
// DEVICE CLASSES
// wgpu reports `DeviceType::Cpu` for software rasterisers (llvmpipe,
// lavapipe, WARP). Everything else is hardware or a translation layer. On
// WSL2 Microsoft's dzn reports `Other`; it is a real GPU underneath, so
// `Other` counts as GPU-class.
//
// INSTANCE FLAGS
// Debug builds enable the validation layer for shader error feedback.
// ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER keeps non-conformant adapters (dzn)
// in the enumeration instead of silently dropping them.

use std::fmt;
use std::str::FromStr;

use crate::gpu::error::{GpuError, GpuResult};

/// Probing order for platforms.
const PLATFORM_ORDER: [(wgpu::Backends, wgpu::Backend); 4] = [
    (wgpu::Backends::VULKAN, wgpu::Backend::Vulkan),
    (wgpu::Backends::METAL, wgpu::Backend::Metal),
    (wgpu::Backends::DX12, wgpu::Backend::Dx12),
    (wgpu::Backends::GL, wgpu::Backend::Gl),
];

// ============================================================
// Device class
// ============================================================

/// Which kind of compute unit a payload wants to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Software / CPU-backed adapters.
    Cpu,
    /// Hardware accelerators (discrete, integrated, virtual, other).
    Gpu,
    /// Any adapter.
    All,
}

impl DeviceClass {
    pub fn matches(self, device_type: wgpu::DeviceType) -> bool {
        match self {
            DeviceClass::All => true,
            DeviceClass::Cpu => device_type == wgpu::DeviceType::Cpu,
            DeviceClass::Gpu => matches!(
                device_type,
                wgpu::DeviceType::DiscreteGpu
                    | wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu
                    | wgpu::DeviceType::Other
            ),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Cpu => write!(f, "cpu"),
            DeviceClass::Gpu => write!(f, "gpu"),
            DeviceClass::All => write!(f, "any"),
        }
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceClass::Cpu),
            "gpu" => Ok(DeviceClass::Gpu),
            "all" | "any" => Ok(DeviceClass::All),
            other => Err(format!("unknown device class `{other}` (expected cpu, gpu or all)")),
        }
    }
}

// ============================================================
// Backend selection
// ============================================================

/// Set of backends the instance is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendSelection(pub wgpu::Backends);

impl Default for BackendSelection {
    fn default() -> Self {
        BackendSelection(wgpu::Backends::all())
    }
}

impl FromStr for BackendSelection {
    type Err = String;

    /// Accepts a comma-separated list: `all`, `primary`, `vulkan`, `metal`,
    /// `dx12`, `gl`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = wgpu::Backends::empty();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            set |= match part.to_ascii_lowercase().as_str() {
                "all" => wgpu::Backends::all(),
                "primary" => wgpu::Backends::PRIMARY,
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "gl" | "gles" | "opengl" => wgpu::Backends::GL,
                other => return Err(format!("unknown backend `{other}`")),
            };
        }
        if set.is_empty() {
            return Err("empty backend selection".to_string());
        }
        Ok(BackendSelection(set))
    }
}

/// Create the wgpu instance the whole run hangs off.
pub fn create_instance(backends: BackendSelection) -> wgpu::Instance {
    let flags = if cfg!(debug_assertions) {
        wgpu::InstanceFlags::VALIDATION
            | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    } else {
        wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    };

    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: backends.0,
        flags,
        ..Default::default()
    })
}

// ============================================================
// Platform / Device
// ============================================================

/// A backend that exposes at least one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Position in the list returned by [`list_platforms`].
    pub index: usize,
    pub backend: wgpu::Backend,
    /// Adapters of any class on this backend.
    pub device_count: usize,
}

impl Platform {
    fn backends(&self) -> wgpu::Backends {
        PLATFORM_ORDER
            .iter()
            .find(|(_, b)| *b == self.backend)
            .map(|(set, _)| *set)
            .unwrap_or(wgpu::Backends::empty())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {:?} ({} device(s))", self.index, self.backend, self.device_count)
    }
}

/// Capability descriptor cached from the adapter, for logging and limits
/// checks.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
    pub limits: wgpu::Limits,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?}, vendor {:#06x}, device {:#06x})",
            self.name, self.backend, self.device_type, self.vendor, self.device
        )
    }
}

/// One adapter on a platform.
///
/// Consumed by [`Context::create`](crate::gpu::context::Context::create).
pub struct Device {
    pub(crate) adapter: wgpu::Adapter,
    pub info: DeviceInfo,
}

impl Device {
    fn from_adapter(adapter: wgpu::Adapter) -> Self {
        let raw = adapter.get_info();
        let info = DeviceInfo {
            name: raw.name,
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
            limits: adapter.limits(),
        };
        Device { adapter, info }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("info", &self.info).finish_non_exhaustive()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.info.fmt(f)
    }
}

// ============================================================
// Enumeration
// ============================================================

/// List every backend of `instance` that exposes at least one adapter.
///
/// # Errors
/// `NoPlatformFound` when no backend has an adapter.
pub fn list_platforms(instance: &wgpu::Instance) -> GpuResult<Vec<Platform>> {
    let mut platforms = Vec::new();
    for (set, backend) in PLATFORM_ORDER {
        let count = instance.enumerate_adapters(set).len();
        if count > 0 {
            let p = Platform { index: platforms.len(), backend, device_count: count };
            log::info!("platform {p}");
            platforms.push(p);
        }
    }
    if platforms.is_empty() {
        return Err(GpuError::NoPlatformFound { detail: None });
    }
    Ok(platforms)
}

/// Pick the platform at `index`.
///
/// The index is caller policy; this only checks it is in range.
pub fn select_platform(platforms: &[Platform], index: usize) -> GpuResult<&Platform> {
    platforms.get(index).ok_or_else(|| GpuError::NoPlatformFound {
        detail: Some(format!(
            "platform index {index} out of range ({} available)",
            platforms.len()
        )),
    })
}

/// List the adapters of `class` on `platform`.
///
/// # Errors
/// `NoDeviceFound` when nothing of that class exists on the platform.
pub fn list_devices(
    instance: &wgpu::Instance,
    platform: &Platform,
    class: DeviceClass,
) -> GpuResult<Vec<Device>> {
    let devices: Vec<Device> = instance
        .enumerate_adapters(platform.backends())
        .into_iter()
        .map(Device::from_adapter)
        .filter(|d| class.matches(d.info.device_type))
        .collect();

    for d in &devices {
        log::info!("{class} device on {:?}: {d}", platform.backend);
    }

    if devices.is_empty() {
        return Err(GpuError::NoDeviceFound {
            platform: format!("{:?}", platform.backend),
            class,
        });
    }
    Ok(devices)
}

// ============================================================
// Tests
// ============================================================
