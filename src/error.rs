//! Error types for gascloud.
//!
//! This module provides error types for GPU initialization, configuration
//! loading, and the top-level application run.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("Failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support.")]
    NoAdapter,
    /// The adapter lacks a capability the cloud renderer needs.
    #[error("GPU adapter '{adapter}' does not support {capability}")]
    Unsupported {
        adapter: String,
        capability: &'static str,
    },
    /// Failed to create GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// Shader module or pipeline failed validation.
    #[error("Failed to build '{label}': {message}")]
    Shader { label: &'static str, message: String },
}

impl GpuError {
    /// True when the machine lacks a GPU or the 3D texture support the
    /// renderer needs. Device, surface and shader failures are fatal instead.
    pub fn is_missing_capability(&self) -> bool {
        matches!(self, GpuError::NoAdapter | GpuError::Unsupported { .. })
    }
}

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file from disk.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// File contents are not valid RON for [`CloudConfig`](crate::CloudConfig).
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    /// A value is outside the range the generator accepts.
    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors that can occur when running the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// Failed to create event loop.
    #[error("Failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// Failed to create window.
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// Snapshot image could not be written.
    #[error("Failed to write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_error_converts_into_app_error() {
        let err: AppError = GpuError::NoAdapter.into();
        assert!(matches!(err, AppError::Gpu(GpuError::NoAdapter)));
        assert!(err.to_string().starts_with("GPU error: No compatible GPU adapter"));
    }

    #[test]
    fn test_unsupported_message_names_adapter() {
        let err = GpuError::Unsupported {
            adapter: "llvmpipe".into(),
            capability: "filterable 3D R8Unorm textures",
        };
        let msg = err.to_string();
        assert!(msg.contains("llvmpipe"));
        assert!(msg.contains("3D R8Unorm"));
    }

    #[test]
    fn test_missing_capability_classification() {
        assert!(GpuError::NoAdapter.is_missing_capability());
        assert!(GpuError::Unsupported {
            adapter: "x".into(),
            capability: "y",
        }
        .is_missing_capability());
        assert!(!GpuError::Shader {
            label: "Cloud Pipeline",
            message: "bad".into(),
        }
        .is_missing_capability());
    }

    #[test]
    fn test_invalid_config_message() {
        let err = ConfigError::Invalid {
            field: "size",
            reason: "must be between 2 and 256, got 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid config value for 'size': must be between 2 and 256, got 1"
        );
    }
}
