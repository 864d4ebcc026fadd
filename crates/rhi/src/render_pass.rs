//! Render pass contract for presenting a single color attachment.
//!
//! One color attachment cleared on load and kept on store, transitioned from
//! an undefined layout to the presentable layout. One graphics subpass
//! writes it, ordered after any earlier use of the same swapchain image by an
//! external dependency on the color-attachment-output stage.

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Description of the render pass; the format comes from the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub color_format: vk::Format,
}

impl RenderPassDesc {
    pub fn new(color_format: vk::Format) -> Self {
        Self { color_format }
    }

    /// The single color attachment.
    pub fn color_attachment(&self) -> vk::AttachmentDescription {
        vk::AttachmentDescription::default()
            .format(self.color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
    }

    /// Reference to attachment 0 as used inside the subpass.
    pub fn color_attachment_ref(&self) -> vk::AttachmentReference {
        vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
    }

    /// External to subpass 0 dependency on color attachment output.
    pub fn subpass_dependency(&self) -> vk::SubpassDependency {
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
    }
}

/// Creates the render pass described by `desc`.
pub fn create_render_pass(device: &Device, desc: &RenderPassDesc) -> RhiResult<vk::RenderPass> {
    let attachments = [desc.color_attachment()];
    let color_refs = [desc.color_attachment_ref()];
    let dependencies = [desc.subpass_dependency()];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };
    debug!("Render pass created for format {:?}", desc.color_format);
    Ok(render_pass)
}
