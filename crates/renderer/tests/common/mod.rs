//! Recording fake driver and window shared by the integration tests.

#![allow(dead_code)]

use std::ffi::CString;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use triangle_core::{AppConfig, ShaderConfig};
use triangle_platform::WindowSystem;
use triangle_rhi::command::RenderPassBegin;
use triangle_rhi::device::DeviceQueues;
use triangle_rhi::framebuffer::FramebufferDesc;
use triangle_rhi::instance::InstanceDesc;
use triangle_rhi::physical_device::{AcceleratorCandidate, QueueRoleAssignment};
use triangle_rhi::pipeline::GraphicsPipelineDesc;
use triangle_rhi::render_pass::RenderPassDesc;
use triangle_rhi::shader::{SPIRV_MAGIC, ShaderBlob};
use triangle_rhi::swapchain::{SwapchainDesc, SwapchainSupportDetails};
use triangle_rhi::vk::{self, Handle};
use triangle_rhi::{
    AcquiredImage, Driver, Presentation, Resource, RhiError, RhiResult, Submission,
};

/// Driver operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    CreateInstance,
    CreateSurface,
    CreateDevice,
    CreateSwapchain,
    CreateImageView,
    CreateRenderPass,
    CreateShaderModule,
    CreatePipelineLayout,
    CreatePipeline,
    CreateFramebuffer,
    CreateCommandPool,
    CreateSemaphore,
    Submit,
    Present,
}

/// One observed driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateInstance { validation: bool },
    CreateSurface(vk::SurfaceKHR),
    CreateDevice { graphics: u32, present: u32 },
    CreateSwapchain(vk::SwapchainKHR, SwapchainDesc),
    CreateImageView(vk::ImageView),
    CreateRenderPass(vk::RenderPass),
    CreateShaderModule(vk::ShaderModule),
    CreatePipelineLayout(vk::PipelineLayout),
    CreatePipeline(vk::Pipeline),
    CreateFramebuffer(vk::Framebuffer),
    CreateCommandPool { pool: vk::CommandPool, family: u32 },
    AllocateCommandBuffers(Vec<vk::CommandBuffer>),
    CreateSemaphore(vk::Semaphore),
    BeginCommandBuffer(vk::CommandBuffer),
    BeginRenderPass(vk::CommandBuffer, RenderPassBegin),
    BindPipeline(vk::CommandBuffer, vk::Pipeline),
    Draw(vk::CommandBuffer, u32, u32),
    EndRenderPass(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    Acquire { signal: vk::Semaphore, index: u32 },
    Submit(vk::Queue, Submission),
    Present(vk::Queue, Presentation),
    WaitIdle,
    Destroy(Resource),
}

/// A scripted accelerator.
#[derive(Debug, Clone)]
pub struct FakeAccelerator {
    pub candidate: AcceleratorCandidate,
    pub families: Vec<vk::QueueFamilyProperties>,
    /// Families able to present to the surface
    pub present_families: Vec<u32>,
    pub extensions: Vec<CString>,
    pub support: SwapchainSupportDetails,
}

impl FakeAccelerator {
    /// One family doing graphics and present, swapchain supported.
    pub fn suitable(id: u64, name: &str) -> Self {
        Self {
            candidate: AcceleratorCandidate {
                handle: vk::PhysicalDevice::from_raw(id),
                name: name.to_string(),
                device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
                features: vk::PhysicalDeviceFeatures::default(),
            },
            families: vec![family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)],
            present_families: vec![0],
            extensions: vec![c"VK_KHR_swapchain".to_owned()],
            support: default_support(),
        }
    }

    /// Graphics on family 0, present only on family 1.
    pub fn split_families(id: u64, name: &str) -> Self {
        Self {
            families: vec![
                family(vk::QueueFlags::GRAPHICS),
                family(vk::QueueFlags::TRANSFER),
            ],
            present_families: vec![1],
            ..Self::suitable(id, name)
        }
    }

    pub fn without_swapchain(id: u64, name: &str) -> Self {
        Self {
            extensions: Vec::new(),
            ..Self::suitable(id, name)
        }
    }

    pub fn without_graphics(id: u64, name: &str) -> Self {
        Self {
            families: vec![family(vk::QueueFlags::COMPUTE)],
            ..Self::suitable(id, name)
        }
    }
}

pub fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 1,
        ..Default::default()
    }
}

/// Surface reporting a fixed 800x600 extent, 2..=3 images, sRGB and FIFO.
pub fn default_support() -> SwapchainSupportDetails {
    SwapchainSupportDetails {
        capabilities: vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        },
        formats: vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ],
        present_modes: vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
    }
}

pub const GRAPHICS_QUEUE: u64 = 0xA000;
pub const PRESENT_QUEUE: u64 = 0xB000;

/// A [`Driver`] that fabricates handles and records every call.
#[derive(Debug)]
pub struct FakeDriver {
    pub calls: Vec<Call>,
    pub accelerators: Vec<FakeAccelerator>,
    /// Images the swapchain hands back
    pub swapchain_image_count: u32,
    /// Fail the first call of this kind
    pub fail_at: Option<Op>,
    /// Acquisition number (0-based) that reports an out-of-date swapchain
    pub out_of_date_at: Option<usize>,
    next_handle: u64,
    acquires: usize,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            accelerators: vec![FakeAccelerator::suitable(1, "Fake GPU")],
            swapchain_image_count: 2,
            fail_at: None,
            out_of_date_at: None,
            next_handle: 0x100,
            acquires: 0,
        }
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(op: Op) -> Self {
        Self {
            fail_at: Some(op),
            ..Self::default()
        }
    }

    pub fn with_accelerators(accelerators: Vec<FakeAccelerator>) -> Self {
        Self {
            accelerators,
            ..Self::default()
        }
    }

    pub fn with_image_count(mut self, count: u32) -> Self {
        self.swapchain_image_count = count;
        self
    }

    /// Report an out-of-date swapchain on the given acquisition.
    pub fn out_of_date_at(mut self, acquisition: usize) -> Self {
        self.out_of_date_at = Some(acquisition);
        self
    }

    /// Every object created, in creation order.
    pub fn created(&self) -> Vec<Resource> {
        self.calls.iter().filter_map(created_resource).collect()
    }

    pub fn destroyed(&self) -> Vec<Resource> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Destroy(resource) => Some(*resource),
                _ => None,
            })
            .collect()
    }

    /// Only the per-frame calls, in order.
    pub fn frame_calls(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Acquire { .. } | Call::Submit(..) | Call::Present(..)
                )
            })
            .cloned()
            .collect()
    }

    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(predicate)
    }

    fn next<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(self.next_handle)
    }

    fn check(&mut self, op: Op) -> RhiResult<()> {
        if self.fail_at == Some(op) {
            self.fail_at = None;
            return Err(RhiError::VulkanError(vk::Result::ERROR_INITIALIZATION_FAILED));
        }
        Ok(())
    }

    fn accelerator(&self, handle: vk::PhysicalDevice) -> RhiResult<&FakeAccelerator> {
        self.accelerators
            .iter()
            .find(|a| a.candidate.handle == handle)
            .ok_or_else(|| RhiError::InvalidHandle(format!("unknown accelerator {handle:?}")))
    }
}

/// The resource a creation call produced, if any.
pub fn created_resource(call: &Call) -> Option<Resource> {
    Some(match call {
        Call::CreateInstance { .. } => Resource::Instance,
        Call::CreateSurface(h) => Resource::Surface(*h),
        Call::CreateDevice { .. } => Resource::Device,
        Call::CreateSwapchain(h, _) => Resource::Swapchain(*h),
        Call::CreateImageView(h) => Resource::ImageView(*h),
        Call::CreateRenderPass(h) => Resource::RenderPass(*h),
        Call::CreateShaderModule(h) => Resource::ShaderModule(*h),
        Call::CreatePipelineLayout(h) => Resource::PipelineLayout(*h),
        Call::CreatePipeline(h) => Resource::Pipeline(*h),
        Call::CreateFramebuffer(h) => Resource::Framebuffer(*h),
        Call::CreateCommandPool { pool, .. } => Resource::CommandPool(*pool),
        Call::CreateSemaphore(h) => Resource::Semaphore(*h),
        _ => return None,
    })
}

impl Driver for FakeDriver {
    fn create_instance(&mut self, desc: &InstanceDesc) -> RhiResult<()> {
        self.check(Op::CreateInstance)?;
        self.calls.push(Call::CreateInstance {
            validation: desc.enable_validation,
        });
        Ok(())
    }

    fn create_surface(&mut self) -> RhiResult<vk::SurfaceKHR> {
        self.check(Op::CreateSurface)?;
        let surface = self.next();
        self.calls.push(Call::CreateSurface(surface));
        Ok(surface)
    }

    fn enumerate_accelerators(&self) -> RhiResult<Vec<AcceleratorCandidate>> {
        Ok(self
            .accelerators
            .iter()
            .map(|a| a.candidate.clone())
            .collect())
    }

    fn queue_families(
        &self,
        accelerator: vk::PhysicalDevice,
    ) -> RhiResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self.accelerator(accelerator)?.families.clone())
    }

    fn supports_present(
        &self,
        accelerator: vk::PhysicalDevice,
        family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> RhiResult<bool> {
        Ok(self
            .accelerator(accelerator)?
            .present_families
            .contains(&family_index))
    }

    fn device_extensions(&self, accelerator: vk::PhysicalDevice) -> RhiResult<Vec<CString>> {
        Ok(self.accelerator(accelerator)?.extensions.clone())
    }

    fn surface_support(
        &self,
        accelerator: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> RhiResult<SwapchainSupportDetails> {
        Ok(self.accelerator(accelerator)?.support.clone())
    }

    fn create_device(
        &mut self,
        _accelerator: vk::PhysicalDevice,
        roles: &QueueRoleAssignment,
    ) -> RhiResult<DeviceQueues> {
        self.check(Op::CreateDevice)?;
        self.calls.push(Call::CreateDevice {
            graphics: roles.graphics,
            present: roles.present,
        });

        let present = if roles.is_shared() {
            GRAPHICS_QUEUE
        } else {
            PRESENT_QUEUE
        };
        Ok(DeviceQueues {
            graphics: vk::Queue::from_raw(GRAPHICS_QUEUE),
            present: vk::Queue::from_raw(present),
        })
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> RhiResult<vk::SwapchainKHR> {
        self.check(Op::CreateSwapchain)?;
        let swapchain = self.next();
        self.calls.push(Call::CreateSwapchain(swapchain, *desc));
        Ok(swapchain)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        Ok((0..u64::from(self.swapchain_image_count))
            .map(|i| vk::Image::from_raw(0x9000 + i))
            .collect())
    }

    fn create_image_view(
        &mut self,
        _image: vk::Image,
        _format: vk::Format,
    ) -> RhiResult<vk::ImageView> {
        self.check(Op::CreateImageView)?;
        let view = self.next();
        self.calls.push(Call::CreateImageView(view));
        Ok(view)
    }

    fn create_render_pass(&mut self, _desc: &RenderPassDesc) -> RhiResult<vk::RenderPass> {
        self.check(Op::CreateRenderPass)?;
        let render_pass = self.next();
        self.calls.push(Call::CreateRenderPass(render_pass));
        Ok(render_pass)
    }

    fn create_shader_module(&mut self, _blob: &ShaderBlob) -> RhiResult<vk::ShaderModule> {
        self.check(Op::CreateShaderModule)?;
        let module = self.next();
        self.calls.push(Call::CreateShaderModule(module));
        Ok(module)
    }

    fn create_pipeline_layout(&mut self) -> RhiResult<vk::PipelineLayout> {
        self.check(Op::CreatePipelineLayout)?;
        let layout = self.next();
        self.calls.push(Call::CreatePipelineLayout(layout));
        Ok(layout)
    }

    fn create_graphics_pipeline(
        &mut self,
        _desc: &GraphicsPipelineDesc,
    ) -> RhiResult<vk::Pipeline> {
        self.check(Op::CreatePipeline)?;
        let pipeline = self.next();
        self.calls.push(Call::CreatePipeline(pipeline));
        Ok(pipeline)
    }

    fn create_framebuffer(&mut self, _desc: &FramebufferDesc) -> RhiResult<vk::Framebuffer> {
        self.check(Op::CreateFramebuffer)?;
        let framebuffer = self.next();
        self.calls.push(Call::CreateFramebuffer(framebuffer));
        Ok(framebuffer)
    }

    fn create_command_pool(&mut self, queue_family: u32) -> RhiResult<vk::CommandPool> {
        self.check(Op::CreateCommandPool)?;
        let pool = self.next();
        self.calls.push(Call::CreateCommandPool {
            pool,
            family: queue_family,
        });
        Ok(pool)
    }

    fn allocate_command_buffers(
        &mut self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        let buffers: Vec<vk::CommandBuffer> = (0..count).map(|_| self.next()).collect();
        self.calls.push(Call::AllocateCommandBuffers(buffers.clone()));
        Ok(buffers)
    }

    fn create_semaphore(&mut self) -> RhiResult<vk::Semaphore> {
        self.check(Op::CreateSemaphore)?;
        let semaphore = self.next();
        self.calls.push(Call::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    fn begin_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.calls.push(Call::BeginCommandBuffer(command_buffer));
        Ok(())
    }

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        begin: &RenderPassBegin,
    ) -> RhiResult<()> {
        self.calls.push(Call::BeginRenderPass(command_buffer, *begin));
        Ok(())
    }

    fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        pipeline: vk::Pipeline,
    ) -> RhiResult<()> {
        self.calls.push(Call::BindPipeline(command_buffer, pipeline));
        Ok(())
    }

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
    ) -> RhiResult<()> {
        self.calls
            .push(Call::Draw(command_buffer, vertex_count, instance_count));
        Ok(())
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.calls.push(Call::EndRenderPass(command_buffer));
        Ok(())
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.calls.push(Call::EndCommandBuffer(command_buffer));
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        _swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RhiResult<AcquiredImage> {
        let n = self.acquires;
        self.acquires += 1;
        if self.out_of_date_at == Some(n) {
            return Err(RhiError::SwapchainOutOfDate);
        }

        let index = (n % self.swapchain_image_count as usize) as u32;
        self.calls.push(Call::Acquire { signal, index });
        Ok(AcquiredImage {
            index,
            suboptimal: false,
        })
    }

    fn queue_submit(&mut self, queue: vk::Queue, submission: &Submission) -> RhiResult<()> {
        self.check(Op::Submit)?;
        self.calls.push(Call::Submit(queue, *submission));
        Ok(())
    }

    fn queue_present(&mut self, queue: vk::Queue, presentation: &Presentation) -> RhiResult<bool> {
        self.check(Op::Present)?;
        self.calls.push(Call::Present(queue, *presentation));
        Ok(false)
    }

    fn wait_idle(&mut self) -> RhiResult<()> {
        self.calls.push(Call::WaitIdle);
        Ok(())
    }

    fn destroy(&mut self, resource: Resource) {
        self.calls.push(Call::Destroy(resource));
    }
}

/// A window that asks to close after a fixed number of polls.
#[derive(Debug)]
pub struct FakeWindow {
    pub size: (u32, u32),
    pub close_after: usize,
    pub polls: usize,
}

impl FakeWindow {
    pub fn closing_after(polls: usize) -> Self {
        Self {
            size: (800, 600),
            close_after: polls,
            polls: 0,
        }
    }
}

impl WindowSystem for FakeWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn should_close(&self) -> bool {
        self.polls >= self.close_after
    }
}

/// Writes a minimal SPIR-V header as a shader blob.
pub fn write_spirv(path: &Path) {
    let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    fs::write(path, bytes).expect("failed to write shader blob");
}

/// An [`AppConfig`] whose shader paths point at valid blobs in a temp dir.
///
/// Keep the returned directory alive for as long as the config is used.
pub fn test_config() -> (TempDir, AppConfig) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    let vertex = dir.path().join("shader.vert.spv");
    let fragment = dir.path().join("shader.frag.spv");
    write_spirv(&vertex);
    write_spirv(&fragment);

    let config = AppConfig {
        enable_validation: false,
        shaders: ShaderConfig {
            vertex,
            fragment,
            ..ShaderConfig::default()
        },
        ..AppConfig::default()
    };

    (dir, config)
}
