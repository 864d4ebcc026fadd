//! The production [`Driver`]: plain ash calls against a real Vulkan loader.
//!
//! The driver owns the loader entry, the instance and the logical device.
//! Every other object is returned to the caller as a raw handle and comes
//! back through [`Driver::destroy`].

use std::ffi::{CStr, CString};

use ash::{Entry, vk};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info, warn};

use crate::command::{self, CommandRecorder, RenderPassBegin};
use crate::device::{Device, DeviceQueues};
use crate::driver::{AcquiredImage, Driver, Presentation, Resource, Submission};
use crate::error::{RhiError, RhiResult};
use crate::framebuffer::{self, FramebufferDesc};
use crate::instance::{Instance, InstanceDesc};
use crate::physical_device::{AcceleratorCandidate, QueueRoleAssignment};
use crate::pipeline::{self, GraphicsPipelineDesc};
use crate::render_pass::{self, RenderPassDesc};
use crate::shader::{self, ShaderBlob};
use crate::swapchain::{self, SwapchainDesc, SwapchainSupportDetails};
use crate::sync;

/// Native handles of the window to present to.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTarget {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

/// Vulkan-backed driver.
pub struct VulkanDriver {
    entry: Entry,
    target: SurfaceTarget,
    instance: Option<Instance>,
    device: Option<Device>,
}

impl VulkanDriver {
    /// Loads the Vulkan library. No instance exists until
    /// [`Driver::create_instance`] is called.
    ///
    /// The window behind `target` must outlive the driver.
    pub fn load(target: SurfaceTarget) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };
        info!("Vulkan loader initialized");

        Ok(Self {
            entry,
            target,
            instance: None,
            device: None,
        })
    }

    fn instance(&self) -> RhiResult<&Instance> {
        self.instance
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("instance has not been created".to_string()))
    }

    fn device(&self) -> RhiResult<&Device> {
        self.device
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("device has not been created".to_string()))
    }

    fn recorder(&self, command_buffer: vk::CommandBuffer) -> RhiResult<CommandRecorder<'_>> {
        Ok(CommandRecorder::new(self.device()?, command_buffer))
    }
}

impl Driver for VulkanDriver {
    fn create_instance(&mut self, desc: &InstanceDesc) -> RhiResult<()> {
        if self.instance.is_some() {
            return Err(RhiError::InvalidHandle(
                "instance already created".to_string(),
            ));
        }

        let extensions = ash_window::enumerate_required_extensions(self.target.display)?;
        for &name in extensions {
            debug!("Required instance extension: {:?}", unsafe {
                CStr::from_ptr(name)
            });
        }

        self.instance = Some(Instance::new(&self.entry, desc, extensions)?);
        Ok(())
    }

    fn create_surface(&mut self) -> RhiResult<vk::SurfaceKHR> {
        let instance = self.instance()?;

        // SAFETY: the window behind the raw handles outlives the driver.
        let surface = unsafe {
            ash_window::create_surface(
                &self.entry,
                instance.handle(),
                self.target.display,
                self.target.window,
                None,
            )
        }
        .map_err(|e| {
            RhiError::SurfaceError(format!(
                "Failed to create surface: {e} (VkResult {})",
                e.as_raw()
            ))
        })?;

        info!("Window surface created");
        Ok(surface)
    }

    fn enumerate_accelerators(&self) -> RhiResult<Vec<AcceleratorCandidate>> {
        let instance = self.instance()?.handle();
        let devices = unsafe { instance.enumerate_physical_devices()? };

        Ok(devices
            .into_iter()
            .map(|device| {
                let properties = unsafe { instance.get_physical_device_properties(device) };
                let features = unsafe { instance.get_physical_device_features(device) };
                AcceleratorCandidate::from_properties(device, &properties, features)
            })
            .collect())
    }

    fn queue_families(
        &self,
        accelerator: vk::PhysicalDevice,
    ) -> RhiResult<Vec<vk::QueueFamilyProperties>> {
        let instance = self.instance()?.handle();
        Ok(unsafe { instance.get_physical_device_queue_family_properties(accelerator) })
    }

    fn supports_present(
        &self,
        accelerator: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<bool> {
        let loader = self.instance()?.surface_loader();
        let supported = unsafe {
            loader.get_physical_device_surface_support(accelerator, family_index, surface)?
        };
        Ok(supported)
    }

    fn device_extensions(&self, accelerator: vk::PhysicalDevice) -> RhiResult<Vec<CString>> {
        let instance = self.instance()?.handle();
        let properties = unsafe { instance.enumerate_device_extension_properties(accelerator)? };

        Ok(properties
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
            .collect())
    }

    fn surface_support(
        &self,
        accelerator: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<SwapchainSupportDetails> {
        SwapchainSupportDetails::query(accelerator, surface, self.instance()?.surface_loader())
    }

    fn create_device(
        &mut self,
        accelerator: vk::PhysicalDevice,
        roles: &QueueRoleAssignment,
    ) -> RhiResult<DeviceQueues> {
        if self.device.is_some() {
            return Err(RhiError::InvalidHandle("device already created".to_string()));
        }

        let (device, queues) = Device::new(self.instance()?, accelerator, roles)?;
        self.device = Some(device);
        Ok(queues)
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> RhiResult<vk::SwapchainKHR> {
        swapchain::create_swapchain(self.device()?, desc)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        let images = unsafe {
            self.device()?
                .swapchain_loader()
                .get_swapchain_images(swapchain)?
        };
        info!("Swapchain created with {} images", images.len());
        Ok(images)
    }

    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> RhiResult<vk::ImageView> {
        swapchain::create_image_view(self.device()?, image, format)
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> RhiResult<vk::RenderPass> {
        render_pass::create_render_pass(self.device()?, desc)
    }

    fn create_shader_module(&mut self, blob: &ShaderBlob) -> RhiResult<vk::ShaderModule> {
        shader::create_shader_module(self.device()?, blob)
    }

    fn create_pipeline_layout(&mut self) -> RhiResult<vk::PipelineLayout> {
        pipeline::create_pipeline_layout(self.device()?)
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> RhiResult<vk::Pipeline> {
        pipeline::create_graphics_pipeline(self.device()?, desc)
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RhiResult<vk::Framebuffer> {
        framebuffer::create_framebuffer(self.device()?, desc)
    }

    fn create_command_pool(&mut self, queue_family: u32) -> RhiResult<vk::CommandPool> {
        command::create_command_pool(self.device()?, queue_family)
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        command::allocate_command_buffers(self.device()?, pool, count)
    }

    fn create_semaphore(&mut self) -> RhiResult<vk::Semaphore> {
        sync::create_semaphore(self.device()?)
    }

    fn begin_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.recorder(command_buffer)?.begin_reusable()
    }

    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        begin: &RenderPassBegin,
    ) -> RhiResult<()> {
        self.recorder(command_buffer)?.begin_render_pass(begin);
        Ok(())
    }

    fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        pipeline: vk::Pipeline,
    ) -> RhiResult<()> {
        self.recorder(command_buffer)?
            .bind_graphics_pipeline(pipeline);
        Ok(())
    }

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
    ) -> RhiResult<()> {
        self.recorder(command_buffer)?
            .draw(vertex_count, instance_count);
        Ok(())
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.recorder(command_buffer)?.end_render_pass();
        Ok(())
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.recorder(command_buffer)?.end()
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RhiResult<AcquiredImage> {
        sync::acquire_next_image(self.device()?, swapchain, signal)
    }

    fn queue_submit(&mut self, queue: vk::Queue, submission: &Submission) -> RhiResult<()> {
        sync::queue_submit(self.device()?, queue, submission)
    }

    fn queue_present(&mut self, queue: vk::Queue, presentation: &Presentation) -> RhiResult<bool> {
        sync::queue_present(self.device()?, queue, presentation)
    }

    fn wait_idle(&mut self) -> RhiResult<()> {
        self.device()?.wait_idle()
    }

    fn destroy(&mut self, resource: Resource) {
        match resource {
            Resource::Instance => {
                if let Some(instance) = self.instance.take() {
                    // SAFETY: teardown releases surfaces and the device first.
                    unsafe { instance.destroy() };
                }
                return;
            }
            Resource::Device => {
                if let Some(device) = self.device.take() {
                    // SAFETY: teardown releases device-owned objects first.
                    unsafe { device.destroy() };
                }
                return;
            }
            Resource::Surface(surface) => {
                match &self.instance {
                    Some(instance) => unsafe {
                        instance.surface_loader().destroy_surface(surface, None);
                    },
                    None => warn!("Cannot release {}: instance already destroyed", resource),
                }
                return;
            }
            _ => {}
        }

        let Some(device) = &self.device else {
            warn!("Cannot release {}: device already destroyed", resource);
            return;
        };
        let handle = device.handle();

        // SAFETY: each handle was created from this device and is released once.
        unsafe {
            match resource {
                Resource::Swapchain(h) => device.swapchain_loader().destroy_swapchain(h, None),
                Resource::ImageView(h) => handle.destroy_image_view(h, None),
                Resource::RenderPass(h) => handle.destroy_render_pass(h, None),
                Resource::PipelineLayout(h) => handle.destroy_pipeline_layout(h, None),
                Resource::Pipeline(h) => handle.destroy_pipeline(h, None),
                Resource::ShaderModule(h) => handle.destroy_shader_module(h, None),
                Resource::Framebuffer(h) => handle.destroy_framebuffer(h, None),
                Resource::CommandPool(h) => handle.destroy_command_pool(h, None),
                Resource::Semaphore(h) => handle.destroy_semaphore(h, None),
                Resource::Instance | Resource::Device | Resource::Surface(_) => {}
            }
        }
        debug!("Released {}", resource);
    }
}

impl Drop for VulkanDriver {
    fn drop(&mut self) {
        if self.device.is_some() || self.instance.is_some() {
            warn!("Vulkan driver dropped before teardown completed; releasing device and instance");
            if let Some(device) = &self.device
                && let Err(e) = device.wait_idle()
            {
                warn!("Failed to wait for device idle: {}", e);
            }
            self.destroy(Resource::Device);
            self.destroy(Resource::Instance);
        }
    }
}
