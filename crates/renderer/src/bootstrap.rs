//! The initialization sequence, one function per stage.
//!
//! Each stage consumes handles produced by earlier stages and pushes a
//! release guard for every object it creates onto the [`TeardownStack`]. When
//! a stage fails, everything created so far is already on the stack, so the
//! caller can unwind it without knowing how far initialization got.

use std::ffi::{CStr, CString};

use tracing::{debug, info};

use triangle_core::AppConfig;
use triangle_platform::WindowSystem;
use triangle_rhi::command::{CommandBufferSet, RenderPassBegin, TRIANGLE_VERTEX_COUNT};
use triangle_rhi::device::DeviceQueues;
use triangle_rhi::framebuffer::FramebufferDesc;
use triangle_rhi::instance::InstanceDesc;
use triangle_rhi::physical_device::{SelectedAccelerator, select_accelerator};
use triangle_rhi::pipeline::{FrontFace, GraphicsPipelineBuilder};
use triangle_rhi::render_pass::RenderPassDesc;
use triangle_rhi::shader::{ShaderBlob, ShaderStage};
use triangle_rhi::swapchain::{ImageSharing, SwapchainConfig, SwapchainDesc, SwapchainImageSet};
use triangle_rhi::sync::FrameSyncPair;
use triangle_rhi::vk;
use triangle_rhi::{Driver, Resource, RhiError, RhiResult};

use crate::context::RenderContext;
use crate::teardown::TeardownStack;

/// Runs every stage up to and including command recording.
///
/// On error the stack holds exactly the objects that were created.
pub fn initialize<D, W>(
    driver: &mut D,
    window: &W,
    config: &AppConfig,
    stack: &mut TeardownStack,
) -> RhiResult<RenderContext>
where
    D: Driver,
    W: WindowSystem,
{
    create_instance(driver, config, stack)?;
    let surface = create_surface(driver, stack)?;
    let accelerator = select_accelerator(driver, surface)?;
    let queues = create_device(driver, &accelerator, stack)?;

    let (swapchain, swapchain_config) =
        create_swapchain(driver, window, surface, &accelerator, stack)?;
    let images = create_image_views(driver, swapchain, swapchain_config.format(), stack)?;

    let render_pass = create_render_pass(driver, swapchain_config.format(), stack)?;
    let (pipeline_layout, pipeline) =
        create_pipeline(driver, config, render_pass, swapchain_config.extent, stack)?;

    let framebuffers = create_framebuffers(
        driver,
        render_pass,
        &images.views,
        swapchain_config.extent,
        stack,
    )?;

    let commands = create_command_buffers(
        driver,
        accelerator.roles.graphics,
        framebuffers.len(),
        stack,
    )?;
    for (&buffer, &framebuffer) in commands.buffers.iter().zip(&framebuffers) {
        let begin = RenderPassBegin {
            render_pass,
            framebuffer,
            extent: swapchain_config.extent,
            clear_color: config.clear_color,
        };
        record_triangle(driver, buffer, &begin, pipeline)?;
    }
    debug!("Recorded {} command buffers", commands.len());

    let sync = create_sync_objects(driver, stack)?;

    info!("Initialization complete ({} objects)", stack.len());

    Ok(RenderContext {
        surface,
        accelerator,
        queues,
        swapchain,
        swapchain_config,
        images,
        render_pass,
        pipeline_layout,
        pipeline,
        framebuffers,
        commands,
        sync,
    })
}

// ============================================================================
// Negotiation
// ============================================================================

pub fn create_instance<D: Driver>(
    driver: &mut D,
    config: &AppConfig,
    stack: &mut TeardownStack,
) -> RhiResult<()> {
    let desc = InstanceDesc::new(&config.application_name, config.enable_validation)?;
    driver.create_instance(&desc)?;
    stack.push(Resource::Instance);
    Ok(())
}

pub fn create_surface<D: Driver>(
    driver: &mut D,
    stack: &mut TeardownStack,
) -> RhiResult<vk::SurfaceKHR> {
    let surface = driver.create_surface()?;
    stack.push(Resource::Surface(surface));
    Ok(surface)
}

pub fn create_device<D: Driver>(
    driver: &mut D,
    accelerator: &SelectedAccelerator,
    stack: &mut TeardownStack,
) -> RhiResult<DeviceQueues> {
    let queues = driver.create_device(accelerator.candidate.handle, &accelerator.roles)?;
    stack.push(Resource::Device);
    Ok(queues)
}

// ============================================================================
// Swapchain
// ============================================================================

/// Negotiates the configuration and creates the swapchain.
///
/// Reuses the surface support captured during selection. The window is only
/// asked for its framebuffer size when the surface leaves the extent open.
pub fn create_swapchain<D, W>(
    driver: &mut D,
    window: &W,
    surface: vk::SurfaceKHR,
    accelerator: &SelectedAccelerator,
    stack: &mut TeardownStack,
) -> RhiResult<(vk::SwapchainKHR, SwapchainConfig)>
where
    D: Driver,
    W: WindowSystem,
{
    let support = &accelerator.support;
    let config = SwapchainConfig::negotiate(support, || window.framebuffer_size())?;

    let desc = SwapchainDesc {
        surface,
        config,
        sharing: ImageSharing::for_roles(&accelerator.roles),
        pre_transform: support.capabilities.current_transform,
    };

    let swapchain = driver.create_swapchain(&desc)?;
    stack.push(Resource::Swapchain(swapchain));

    info!(
        "Swapchain: {}x{}, {:?}, {:?}, min {} images",
        config.extent.width,
        config.extent.height,
        config.surface_format.format,
        config.present_mode,
        config.image_count
    );

    Ok((swapchain, config))
}

/// Fetches the swapchain images and creates one view per image.
pub fn create_image_views<D: Driver>(
    driver: &mut D,
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    stack: &mut TeardownStack,
) -> RhiResult<SwapchainImageSet> {
    let images = driver.swapchain_images(swapchain)?;
    if images.is_empty() {
        return Err(RhiError::SwapchainError(
            "Swapchain returned no images".to_string(),
        ));
    }

    let mut views = Vec::with_capacity(images.len());
    for &image in &images {
        let view = driver.create_image_view(image, format)?;
        stack.push(Resource::ImageView(view));
        views.push(view);
    }

    debug!("Created {} image views", views.len());
    Ok(SwapchainImageSet { images, views })
}

// ============================================================================
// Render pass and pipeline
// ============================================================================

pub fn create_render_pass<D: Driver>(
    driver: &mut D,
    format: vk::Format,
    stack: &mut TeardownStack,
) -> RhiResult<vk::RenderPass> {
    let render_pass = driver.create_render_pass(&RenderPassDesc::new(format))?;
    stack.push(Resource::RenderPass(render_pass));
    Ok(render_pass)
}

/// Builds the fixed triangle pipeline.
///
/// Both blobs are read before any module is created. The shader modules only
/// live for the duration of this call, whether or not the pipeline is built.
pub fn create_pipeline<D: Driver>(
    driver: &mut D,
    config: &AppConfig,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    stack: &mut TeardownStack,
) -> RhiResult<(vk::PipelineLayout, vk::Pipeline)> {
    let entry_point = CString::new(config.shaders.entry_point.as_str()).map_err(|_| {
        RhiError::PipelineError(format!(
            "Invalid shader entry point {:?}",
            config.shaders.entry_point
        ))
    })?;

    let vertex_blob = ShaderBlob::load(&config.shaders.vertex, ShaderStage::Vertex)?;
    let fragment_blob = ShaderBlob::load(&config.shaders.fragment, ShaderStage::Fragment)?;

    let vertex = driver.create_shader_module(&vertex_blob)?;
    let fragment = match driver.create_shader_module(&fragment_blob) {
        Ok(module) => module,
        Err(e) => {
            driver.destroy(Resource::ShaderModule(vertex));
            return Err(e);
        }
    };

    let result = build_pipeline(
        driver,
        (vertex, fragment),
        &entry_point,
        render_pass,
        extent,
        stack,
    );

    driver.destroy(Resource::ShaderModule(fragment));
    driver.destroy(Resource::ShaderModule(vertex));

    if result.is_ok() {
        info!("Graphics pipeline created");
    }
    result
}

fn build_pipeline<D: Driver>(
    driver: &mut D,
    (vertex, fragment): (vk::ShaderModule, vk::ShaderModule),
    entry_point: &CStr,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    stack: &mut TeardownStack,
) -> RhiResult<(vk::PipelineLayout, vk::Pipeline)> {
    let layout = driver.create_pipeline_layout()?;
    stack.push(Resource::PipelineLayout(layout));

    let desc = GraphicsPipelineBuilder::new()
        .vertex_shader(vertex, entry_point)
        .fragment_shader(fragment, entry_point)
        .front_face(FrontFace::Clockwise)
        .extent(extent)
        .render_pass(render_pass, 0)
        .layout(layout)
        .build()?;

    let pipeline = driver.create_graphics_pipeline(&desc)?;
    stack.push(Resource::Pipeline(pipeline));
    Ok((layout, pipeline))
}

// ============================================================================
// Framebuffers, commands and sync
// ============================================================================

/// Creates one framebuffer per image view, in image order.
pub fn create_framebuffers<D: Driver>(
    driver: &mut D,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
    stack: &mut TeardownStack,
) -> RhiResult<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(views.len());
    for &attachment in views {
        let framebuffer = driver.create_framebuffer(&FramebufferDesc {
            render_pass,
            attachment,
            extent,
        })?;
        stack.push(Resource::Framebuffer(framebuffer));
        framebuffers.push(framebuffer);
    }
    Ok(framebuffers)
}

/// Creates the command pool and allocates `count` buffers from it.
pub fn create_command_buffers<D: Driver>(
    driver: &mut D,
    queue_family: u32,
    count: usize,
    stack: &mut TeardownStack,
) -> RhiResult<CommandBufferSet> {
    let pool = driver.create_command_pool(queue_family)?;
    stack.push(Resource::CommandPool(pool));

    let count = u32::try_from(count).map_err(|_| {
        RhiError::SwapchainError(format!("Too many swapchain images: {count}"))
    })?;
    let buffers = driver.allocate_command_buffers(pool, count)?;
    if buffers.len() != count as usize {
        return Err(RhiError::InvalidHandle(format!(
            "Allocated {} command buffers, expected {}",
            buffers.len(),
            count
        )));
    }

    Ok(CommandBufferSet { pool, buffers })
}

/// Records the clear and the three-vertex draw into one buffer.
pub fn record_triangle<D: Driver>(
    driver: &mut D,
    buffer: vk::CommandBuffer,
    begin: &RenderPassBegin,
    pipeline: vk::Pipeline,
) -> RhiResult<()> {
    driver.begin_command_buffer(buffer)?;
    driver.cmd_begin_render_pass(buffer, begin)?;
    driver.cmd_bind_pipeline(buffer, pipeline)?;
    driver.cmd_draw(buffer, TRIANGLE_VERTEX_COUNT, 1)?;
    driver.cmd_end_render_pass(buffer)?;
    driver.end_command_buffer(buffer)
}

pub fn create_sync_objects<D: Driver>(
    driver: &mut D,
    stack: &mut TeardownStack,
) -> RhiResult<FrameSyncPair> {
    let image_available = driver.create_semaphore()?;
    stack.push(Resource::Semaphore(image_available));

    let render_finished = driver.create_semaphore()?;
    stack.push(Resource::Semaphore(render_finished));

    Ok(FrameSyncPair {
        image_available,
        render_finished,
    })
}
