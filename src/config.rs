// config.rs — run configuration shared by both payloads.
//
// Payload parameters live with their payload (`JuliaParams`,
// `SceneParams`); this file holds what the driver needs regardless of the
// payload, plus the validation error both kinds of parameters report.

use crate::gpu::{BackendSelection, DeviceClass};

/// Host-side choices for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Index into the platform list (see `gpu::list_platforms`).
    pub platform_index: usize,
    /// Overrides the payload's preferred device class.
    pub device_class: Option<DeviceClass>,
    /// Backends the instance is created with.
    pub backends: BackendSelection,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            platform_index: 0,
            device_class: None,
            backends: BackendSelection::default(),
        }
    }
}

/// Parameter rejected before any device interaction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{what} must be at least {min}, got {value}")]
    TooSmall { what: &'static str, min: u64, value: u64 },

    #[error("{what} must be at most {max}, got {value}")]
    TooLarge { what: &'static str, max: u64, value: u64 },

    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f32 },

    #[error("{what} must be positive and finite, got {value}")]
    NotPositive { what: &'static str, value: f32 },
}
