//! RHI-specific error types.

use std::path::PathBuf;

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error, reported with its numeric status code
    #[error("Vulkan error: {0} (VkResult {code})", code = .0.as_raw())]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// The driver enumerated no accelerators at all
    #[error("No Vulkan-capable GPU found")]
    NoAccelerator,

    /// Accelerators exist but none passed the suitability checks
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Requested instance layers are not installed
    #[error("Requested layers not available: {}", .0.join(", "))]
    MissingLayers(Vec<String>),

    /// Every accelerator lacks required device extensions
    #[error("Required device extensions not available: {}", .0.join(", "))]
    MissingExtensions(Vec<String>),

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// The swapchain no longer matches the surface; recreation is unsupported
    #[error("Swapchain is out of date and cannot be recreated")]
    SwapchainOutOfDate,

    /// Shader blob could not be read
    #[error("Failed to read shader {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Shader blob is not usable SPIR-V
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Invalid handle error
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
