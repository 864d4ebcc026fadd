//! Everything the frame loop needs once initialization has finished.

use triangle_rhi::command::CommandBufferSet;
use triangle_rhi::device::DeviceQueues;
use triangle_rhi::physical_device::SelectedAccelerator;
use triangle_rhi::swapchain::{SwapchainConfig, SwapchainImageSet};
use triangle_rhi::sync::FrameSyncPair;
use triangle_rhi::vk;

/// Handles produced by the bootstrap sequence.
///
/// The context does not own these objects. Ownership sits with the
/// [`TeardownStack`](crate::TeardownStack) that was filled while building it.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub surface: vk::SurfaceKHR,
    pub accelerator: SelectedAccelerator,
    pub queues: DeviceQueues,

    // Swapchain
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_config: SwapchainConfig,
    pub images: SwapchainImageSet,

    // Pipeline
    pub render_pass: vk::RenderPass,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,

    /// One per swapchain image, in image order
    pub framebuffers: Vec<vk::Framebuffer>,
    pub commands: CommandBufferSet,
    pub sync: FrameSyncPair,
}

impl RenderContext {
    /// Number of swapchain images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}
