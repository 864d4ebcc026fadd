//! The seam between the bootstrap sequence and the graphics driver.
//!
//! Everything above this module talks to the GPU through [`Driver`]. The
//! production implementation is [`VulkanDriver`](crate::vulkan::VulkanDriver);
//! tests substitute a recording fake so call ordering can be checked without
//! a physical device.
//!
//! Creation calls hand back raw handles. Ownership is tracked by the caller,
//! which pairs every successful creation with a [`Resource`] release guard and
//! later hands that guard back to [`Driver::destroy`].

use std::ffi::CString;
use std::fmt;

use ash::vk;

use crate::command::RenderPassBegin;
use crate::device::DeviceQueues;
use crate::error::RhiResult;
use crate::framebuffer::FramebufferDesc;
use crate::instance::InstanceDesc;
use crate::physical_device::{AcceleratorCandidate, QueueRoleAssignment};
use crate::pipeline::GraphicsPipelineDesc;
use crate::render_pass::RenderPassDesc;
use crate::shader::ShaderBlob;
use crate::swapchain::{SwapchainDesc, SwapchainSupportDetails};

/// One object created through a [`Driver`], named so it can be released later.
///
/// The instance and device are singletons owned by the driver itself, so
/// their variants carry no handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Instance,
    Surface(vk::SurfaceKHR),
    Device,
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    RenderPass(vk::RenderPass),
    PipelineLayout(vk::PipelineLayout),
    Pipeline(vk::Pipeline),
    ShaderModule(vk::ShaderModule),
    Framebuffer(vk::Framebuffer),
    CommandPool(vk::CommandPool),
    Semaphore(vk::Semaphore),
}

impl Resource {
    /// Short name of the object kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Surface(_) => "surface",
            Self::Device => "device",
            Self::Swapchain(_) => "swapchain",
            Self::ImageView(_) => "image view",
            Self::RenderPass(_) => "render pass",
            Self::PipelineLayout(_) => "pipeline layout",
            Self::Pipeline(_) => "pipeline",
            Self::ShaderModule(_) => "shader module",
            Self::Framebuffer(_) => "framebuffer",
            Self::CommandPool(_) => "command pool",
            Self::Semaphore(_) => "semaphore",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance | Self::Device => f.write_str(self.kind()),
            Self::Surface(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::Swapchain(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::ImageView(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::RenderPass(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::PipelineLayout(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::Pipeline(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::ShaderModule(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::Framebuffer(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::CommandPool(h) => write!(f, "{} {:?}", self.kind(), h),
            Self::Semaphore(h) => write!(f, "{} {:?}", self.kind(), h),
        }
    }
}

/// Result of a successful image acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index into the swapchain image set
    pub index: u32,
    /// The swapchain still works but no longer matches the surface exactly
    pub suboptimal: bool,
}

/// A single command buffer submission for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub command_buffer: vk::CommandBuffer,
    /// Waited on before the color output stage runs
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    /// Signaled once the command buffer has finished executing
    pub signal_semaphore: vk::Semaphore,
}

/// A presentation request for one acquired image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    /// Presentation waits on this before reading the image
    pub wait_semaphore: vk::Semaphore,
}

/// Graphics driver operations used by the bootstrap, frame loop and teardown.
pub trait Driver {
    // ========================================================================
    // Capability negotiation
    // ========================================================================

    /// Creates the root instance. Fails if requested layers are missing.
    fn create_instance(&mut self, desc: &InstanceDesc) -> RhiResult<()>;

    /// Creates a presentable surface for the window this driver was built for.
    fn create_surface(&mut self) -> RhiResult<vk::SurfaceKHR>;

    /// Lists accelerators in driver enumeration order.
    fn enumerate_accelerators(&self) -> RhiResult<Vec<AcceleratorCandidate>>;

    /// Queue family properties of one accelerator, in family index order.
    fn queue_families(
        &self,
        accelerator: vk::PhysicalDevice,
    ) -> RhiResult<Vec<vk::QueueFamilyProperties>>;

    /// Whether a queue family of `accelerator` can present to `surface`.
    fn supports_present(
        &self,
        accelerator: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<bool>;

    /// Names of the device extensions `accelerator` supports.
    fn device_extensions(&self, accelerator: vk::PhysicalDevice) -> RhiResult<Vec<CString>>;

    /// Surface capabilities, formats and present modes for `accelerator`.
    fn surface_support(
        &self,
        accelerator: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<SwapchainSupportDetails>;

    // ========================================================================
    // Device and device-owned objects
    // ========================================================================

    fn create_device(
        &mut self,
        accelerator: vk::PhysicalDevice,
        roles: &QueueRoleAssignment,
    ) -> RhiResult<DeviceQueues>;

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> RhiResult<vk::SwapchainKHR>;

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>>;

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format)
    -> RhiResult<vk::ImageView>;

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> RhiResult<vk::RenderPass>;

    fn create_shader_module(&mut self, blob: &ShaderBlob) -> RhiResult<vk::ShaderModule>;

    /// Creates a layout with no descriptor sets and no push constants.
    fn create_pipeline_layout(&mut self) -> RhiResult<vk::PipelineLayout>;

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc)
    -> RhiResult<vk::Pipeline>;

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RhiResult<vk::Framebuffer>;

    fn create_command_pool(&mut self, queue_family: u32) -> RhiResult<vk::CommandPool>;

    /// Allocates primary command buffers. They are freed with their pool.
    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>>;

    fn create_semaphore(&mut self) -> RhiResult<vk::Semaphore>;

    // ========================================================================
    // Command recording
    // ========================================================================

    fn begin_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        begin: &RenderPassBegin,
    ) -> RhiResult<()>;

    fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        pipeline: vk::Pipeline,
    ) -> RhiResult<()>;

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
    ) -> RhiResult<()>;

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;

    // ========================================================================
    // Frame submission
    // ========================================================================

    /// Acquires the next image, signaling `signal` when it is ready.
    ///
    /// Waits without a timeout. An out-of-date swapchain is reported as
    /// [`RhiError::SwapchainOutOfDate`](crate::RhiError::SwapchainOutOfDate).
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RhiResult<AcquiredImage>;

    fn queue_submit(&mut self, queue: vk::Queue, submission: &Submission) -> RhiResult<()>;

    /// Queues an image for presentation. Returns true when suboptimal.
    fn queue_present(&mut self, queue: vk::Queue, presentation: &Presentation) -> RhiResult<bool>;

    /// Blocks until the device has finished all submitted work.
    fn wait_idle(&mut self) -> RhiResult<()>;

    // ========================================================================
    // Release
    // ========================================================================

    /// Destroys one previously created object.
    fn destroy(&mut self, resource: Resource);
}
