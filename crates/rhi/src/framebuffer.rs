//! Framebuffers binding each swapchain image view to the render pass.

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// One framebuffer: a single color view bound to the render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub render_pass: vk::RenderPass,
    pub attachment: vk::ImageView,
    pub extent: vk::Extent2D,
}

/// Creates a one-layer framebuffer.
pub fn create_framebuffer(device: &Device, desc: &FramebufferDesc) -> RhiResult<vk::Framebuffer> {
    let attachments = [desc.attachment];
    let create_info = vk::FramebufferCreateInfo::default()
        .render_pass(desc.render_pass)
        .attachments(&attachments)
        .width(desc.extent.width)
        .height(desc.extent.height)
        .layers(1);

    let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };
    debug!(
        "Framebuffer created ({}x{})",
        desc.extent.width, desc.extent.height
    );
    Ok(framebuffer)
}
