//! Command pool and command buffer recording.
//!
//! - [`CommandBufferSet`] holds the pool and one buffer per swapchain image
//! - [`CommandRecorder`] wraps a VkCommandBuffer with recording methods
//! - [`RenderPassBegin`] describes the render pass instance each buffer opens
//!
//! Buffers are recorded once and resubmitted every frame, so they are begun
//! without the one-time-submit flag.

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vertices drawn per frame; positions live in the vertex stage.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// Parameters for beginning the render pass inside one command buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    /// Render area, always the full framebuffer
    pub extent: vk::Extent2D,
    /// RGBA clear color for the color attachment
    pub clear_color: [f32; 4],
}

impl RenderPassBegin {
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    pub fn clear_values(&self) -> [vk::ClearValue; 1] {
        [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }]
    }
}

/// The command pool and its pre-recorded buffers.
///
/// Holds exactly one buffer per swapchain image, in image order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBufferSet {
    pub pool: vk::CommandPool,
    pub buffers: Vec<vk::CommandBuffer>,
}

impl CommandBufferSet {
    /// Returns the buffer recorded for swapchain image `image_index`.
    pub fn buffer(&self, image_index: u32) -> RhiResult<vk::CommandBuffer> {
        self.buffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!(
                    "no command buffer for image {} ({} recorded)",
                    image_index,
                    self.buffers.len()
                ))
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Creates a command pool for the specified queue family, with no flags.
pub fn create_command_pool(device: &Device, queue_family_index: u32) -> RhiResult<vk::CommandPool> {
    let create_info = vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index);

    let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

    info!(
        "Command pool created for queue family {}",
        queue_family_index
    );
    Ok(pool)
}

/// Allocates primary command buffers from `pool`.
pub fn allocate_command_buffers(
    device: &Device,
    pool: vk::CommandPool,
    count: u32,
) -> RhiResult<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    let buffers = unsafe { device.handle().allocate_command_buffers(&alloc_info)? };
    debug!("Allocated {} command buffer(s)", buffers.len());
    Ok(buffers)
}

/// Records commands into one command buffer.
pub struct CommandRecorder<'a> {
    device: &'a Device,
    buffer: vk::CommandBuffer,
}

impl<'a> CommandRecorder<'a> {
    pub fn new(device: &'a Device, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    // =========================================================================
    // Recording lifecycle
    // =========================================================================

    /// Begins recording for a buffer that will be submitted repeatedly.
    pub fn begin_reusable(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default();

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Ends recording.
    pub fn end(&self) -> RhiResult<()> {
        unsafe { self.device.handle().end_command_buffer(self.buffer)? };
        Ok(())
    }

    // =========================================================================
    // Render pass
    // =========================================================================

    /// Begins the render pass with inline subpass contents.
    pub fn begin_render_pass(&self, begin: &RenderPassBegin) {
        let clear_values = begin.clear_values();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(begin.render_area())
            .clear_values(&clear_values);

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    /// Ends the current render pass.
    pub fn end_render_pass(&self) {
        unsafe { self.device.handle().cmd_end_render_pass(self.buffer) };
    }

    // =========================================================================
    // Binding and drawing
    // =========================================================================

    /// Binds a graphics pipeline.
    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Draws non-indexed primitives starting at vertex 0, instance 0.
    pub fn draw(&self, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw(self.buffer, vertex_count, instance_count, 0, 0);
        }
    }
}
