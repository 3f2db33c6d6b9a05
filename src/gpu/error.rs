// gpu/error.rs — error taxonomy of the host/device layer.
//
// Every call into the enumerator, context, buffer, program or dispatcher
// returns one of these variants. Runtime-side failures are captured with
// wgpu error scopes and folded into the variant of the step that issued
// the call, so a caller never sees a raw `wgpu::Error` from this crate.

use std::fmt;

use crate::gpu::device::DeviceClass;

/// Coarse grouping of [`GpuError`] variants.
///
/// The CLI maps each category to a distinct process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Enumeration,
    ResourceCreation,
    Compilation,
    Binding,
    Dispatch,
    Transfer,
}

impl ErrorCategory {
    /// Process exit code for a run that failed in this category.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Enumeration => 3,
            ErrorCategory::ResourceCreation => 4,
            ErrorCategory::Compilation => 5,
            ErrorCategory::Binding => 6,
            ErrorCategory::Dispatch => 7,
            ErrorCategory::Transfer => 8,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Enumeration => "enumeration",
            ErrorCategory::ResourceCreation => "resource creation",
            ErrorCategory::Compilation => "compilation",
            ErrorCategory::Binding => "binding",
            ErrorCategory::Dispatch => "dispatch",
            ErrorCategory::Transfer => "transfer",
        };
        f.write_str(s)
    }
}

/// Errors from device discovery, resource creation, compilation, argument
/// binding, dispatch and transfers.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// The runtime reports no backend with at least one adapter, or the
    /// requested platform index is out of range.
    #[error("no compute platform found{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    NoPlatformFound { detail: Option<String> },

    /// The chosen platform has no adapter of the requested class.
    #[error("no {class} device found on platform {platform}")]
    NoDeviceFound { platform: String, class: DeviceClass },

    /// The runtime rejected the device request (or no device was given).
    #[error("context creation failed: {reason}")]
    ContextCreationFailed {
        reason: String,
        #[source]
        source: Option<wgpu::RequestDeviceError>,
    },

    /// A second queue was requested, or the runtime refused the queue.
    #[error("queue creation failed: {0}")]
    QueueCreationFailed(String),

    /// Buffer size invalid for the device, or device out of memory.
    #[error("allocation of {size} bytes failed: {reason}")]
    AllocationFailed { size: u64, reason: String },

    /// Kernel source failed to parse or validate. `log` holds the full
    /// rendered compiler diagnostic.
    #[error("kernel compilation failed:\n{log}")]
    CompilationFailed { log: String },

    /// No `@compute` entry point with this name exists in the program.
    #[error("entry point `{name}` not found (available: {available:?})")]
    EntryPointNotFound { name: String, available: Vec<String> },

    /// Argument rejected: bad index, wrong kind, wrong size or incompatible
    /// access mode.
    #[error("binding argument {index} failed: {reason}")]
    ArgumentBindingFailed { index: u32, reason: String },

    /// Launch rejected: invalid sizes, unbound arguments, limits exceeded or
    /// a runtime validation error at submission.
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    /// Upload/download rejected: size mismatch, foreign buffer, or a device
    /// fault while copying or mapping.
    #[error("transfer failed: {0}")]
    TransferFailed(String),
}

impl GpuError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GpuError::NoPlatformFound { .. } | GpuError::NoDeviceFound { .. } => {
                ErrorCategory::Enumeration
            }
            GpuError::ContextCreationFailed { .. }
            | GpuError::QueueCreationFailed(_)
            | GpuError::AllocationFailed { .. } => ErrorCategory::ResourceCreation,
            GpuError::CompilationFailed { .. } | GpuError::EntryPointNotFound { .. } => {
                ErrorCategory::Compilation
            }
            GpuError::ArgumentBindingFailed { .. } => ErrorCategory::Binding,
            GpuError::DispatchFailed(_) => ErrorCategory::Dispatch,
            GpuError::TransferFailed(_) => ErrorCategory::Transfer,
        }
    }
}

/// Result alias used across the `gpu` module.
pub type GpuResult<T> = Result<T, GpuError>;

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let all = [
            ErrorCategory::Enumeration,
            ErrorCategory::ResourceCreation,
            ErrorCategory::Compilation,
            ErrorCategory::Binding,
            ErrorCategory::Dispatch,
            ErrorCategory::Transfer,
        ];
        let mut codes: Vec<i32> = all.iter().map(|c| c.exit_code()).collect();
        assert!(codes.iter().all(|&c| c != 0 && c != 1 && c != 2));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            GpuError::NoPlatformFound { detail: None }.category(),
            ErrorCategory::Enumeration
        );
        assert_eq!(
            GpuError::CompilationFailed { log: "x".into() }.category(),
            ErrorCategory::Compilation
        );
        assert_eq!(
            GpuError::EntryPointNotFound { name: "main".into(), available: vec![] }.category(),
            ErrorCategory::Compilation
        );
        assert_eq!(
            GpuError::ArgumentBindingFailed { index: 3, reason: "x".into() }.category(),
            ErrorCategory::Binding
        );
        assert_eq!(
            GpuError::AllocationFailed { size: 0, reason: "zero".into() }.category(),
            ErrorCategory::ResourceCreation
        );
    }

    #[test]
    fn test_compilation_message_carries_log() {
        let err = GpuError::CompilationFailed { log: "error: expected `;`".into() };
        assert!(err.to_string().contains("expected `;`"));
    }

    #[test]
    fn test_no_platform_message() {
        let plain = GpuError::NoPlatformFound { detail: None };
        assert_eq!(plain.to_string(), "no compute platform found");
        let detailed = GpuError::NoPlatformFound { detail: Some("index 4 out of range".into()) };
        assert_eq!(detailed.to_string(), "no compute platform found: index 4 out of range");
    }
}
