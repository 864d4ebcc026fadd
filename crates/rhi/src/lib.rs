//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate wraps the parts of Vulkan needed to put one triangle on screen.
//! It provides:
//! - The [`Driver`] trait, the seam every GPU call goes through
//! - [`VulkanDriver`], its ash-backed implementation
//! - Pure negotiation policies (queue roles, device selection, swapchain
//!   format, present mode, extent and image count)
//! - Render pass and graphics pipeline descriptions
//! - SPIR-V shader blob loading
//! - Frame synchronization primitives

mod error;

pub mod command;
pub mod device;
pub mod driver;
pub mod framebuffer;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vulkan;

pub use driver::{AcquiredImage, Driver, Presentation, Resource, Submission};
pub use error::{RhiError, RhiResult};
pub use vulkan::{SurfaceTarget, VulkanDriver};

// Re-export ash types that users might need
pub use ash::vk;
