//! Graphics pipeline description and creation.
//!
//! - [`GraphicsPipelineBuilder`] collects fixed-function state with sensible
//!   defaults and validates it into a [`GraphicsPipelineDesc`]
//! - [`create_graphics_pipeline`] turns a description into a VkPipeline
//!
//! Viewport and scissor are baked in from the swapchain extent, so there is
//! no dynamic state. A different extent needs a new pipeline.

use std::ffi::{CStr, CString};

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::ShaderStage;

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise winding is front-facing.
    #[default]
    CounterClockwise,
    /// Clockwise winding is front-facing.
    Clockwise,
}

impl FrontFace {
    /// Converts to Vulkan front face.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Opaque output: blending off, all channels written.
fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

/// One programmable stage of the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderStageDesc {
    pub stage: ShaderStage,
    pub module: vk::ShaderModule,
    pub entry_point: CString,
}

impl ShaderStageDesc {
    /// Returns the pipeline shader stage create info.
    pub fn create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

/// Complete, validated pipeline state.
///
/// The fixed-function state not listed here never varies: no vertex input
/// (geometry comes from the vertex stage itself), a triangle list without
/// primitive restart, filled polygons with back faces culled, line width
/// 1.0, one sample, and an opaque color attachment with logic ops off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphicsPipelineDesc {
    pub vertex: ShaderStageDesc,
    pub fragment: ShaderStageDesc,
    pub front_face: FrontFace,
    /// Viewport and scissor size
    pub extent: vk::Extent2D,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipelineDesc {
    /// Full-extent viewport with a 0..1 depth range.
    pub fn viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Full-extent scissor.
    pub fn scissor(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}

/// Builder for graphics pipeline descriptions.
///
/// Front face defaults to counter-clockwise and the subpass to 0.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineBuilder {
    // Shader stages
    vertex: Option<ShaderStageDesc>,
    fragment: Option<ShaderStageDesc>,

    // Rasterization state
    front_face: FrontFace,

    // Render target
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    subpass: u32,
    layout: vk::PipelineLayout,
}

impl Default for GraphicsPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsPipelineBuilder {
    /// Creates a new graphics pipeline builder with default settings.
    pub fn new() -> Self {
        Self {
            vertex: None,
            fragment: None,

            front_face: FrontFace::CounterClockwise,

            extent: vk::Extent2D::default(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            layout: vk::PipelineLayout::null(),
        }
    }

    /// Sets the vertex stage.
    pub fn vertex_shader(mut self, module: vk::ShaderModule, entry_point: &CStr) -> Self {
        self.vertex = Some(ShaderStageDesc {
            stage: ShaderStage::Vertex,
            module,
            entry_point: entry_point.to_owned(),
        });
        self
    }

    /// Sets the fragment stage.
    pub fn fragment_shader(mut self, module: vk::ShaderModule, entry_point: &CStr) -> Self {
        self.fragment = Some(ShaderStageDesc {
            stage: ShaderStage::Fragment,
            module,
            entry_point: entry_point.to_owned(),
        });
        self
    }

    /// Sets the front face winding order.
    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Sets the fixed viewport and scissor size.
    pub fn extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = extent;
        self
    }

    /// Sets the render pass and subpass the pipeline is used in.
    pub fn render_pass(mut self, render_pass: vk::RenderPass, subpass: u32) -> Self {
        self.render_pass = render_pass;
        self.subpass = subpass;
        self
    }

    /// Sets the pipeline layout.
    pub fn layout(mut self, layout: vk::PipelineLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Validates the state and returns the description.
    ///
    /// Returns an error if:
    /// - Vertex or fragment stage is not set
    /// - Render pass or layout is not set
    /// - Extent has a zero dimension
    pub fn build(self) -> RhiResult<GraphicsPipelineDesc> {
        let vertex = self
            .vertex
            .ok_or_else(|| RhiError::PipelineError("Vertex shader is required".to_string()))?;

        let fragment = self
            .fragment
            .ok_or_else(|| RhiError::PipelineError("Fragment shader is required".to_string()))?;

        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::PipelineError(
                "A render pass is required".to_string(),
            ));
        }

        if self.layout == vk::PipelineLayout::null() {
            return Err(RhiError::PipelineError(
                "A pipeline layout is required".to_string(),
            ));
        }

        if self.extent.width == 0 || self.extent.height == 0 {
            return Err(RhiError::PipelineError(format!(
                "Extent must be non-zero, got {}x{}",
                self.extent.width, self.extent.height
            )));
        }

        Ok(GraphicsPipelineDesc {
            vertex,
            fragment,
            front_face: self.front_face,
            extent: self.extent,
            render_pass: self.render_pass,
            subpass: self.subpass,
            layout: self.layout,
        })
    }
}

/// Creates a pipeline layout with no descriptor sets and no push constants.
pub fn create_pipeline_layout(device: &Device) -> RhiResult<vk::PipelineLayout> {
    let create_info = vk::PipelineLayoutCreateInfo::default();
    let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
    debug!("Empty pipeline layout created");
    Ok(layout)
}

/// Creates a graphics pipeline from a validated description.
pub fn create_graphics_pipeline(
    device: &Device,
    desc: &GraphicsPipelineDesc,
) -> RhiResult<vk::Pipeline> {
    let shader_stages = [desc.vertex.create_info(), desc.fragment.create_info()];

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    let viewports = [desc.viewport()];
    let scissors = [desc.scissor()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(desc.front_face.to_vk())
        .depth_bias_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachments = [color_blend_attachment()];
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&color_blend_attachments);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .layout(desc.layout)
        .render_pass(desc.render_pass)
        .subpass(desc.subpass);

    let pipelines = unsafe {
        device
            .handle()
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            .map_err(|(_, result)| result)?
    };

    let pipeline = pipelines.into_iter().next().ok_or_else(|| {
        RhiError::PipelineError("Driver returned no pipeline".to_string())
    })?;

    info!(
        "Graphics pipeline created ({}x{}, front face {:?})",
        desc.extent.width, desc.extent.height, desc.front_face
    );
    Ok(pipeline)
}
