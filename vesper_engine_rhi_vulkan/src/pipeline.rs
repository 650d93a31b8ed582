/// Graphics pipeline creation from a PipelineState
///
/// Uses dynamic rendering (core 1.3): attachment formats are part of the
/// pipeline, render-pass and framebuffer objects don't exist. Viewport and
/// scissor are dynamic states so one pipeline serves any target size.

use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use ash::vk;

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{
    next_object_id, DescriptorSetLayout, Pipeline, PipelineState, RasterizerState, Texture,
};
use vesper_engine::engine_error;

use crate::context::GpuContext;
use crate::conversions;
use crate::descriptor::VulkanDescriptorSetLayout;
use crate::shader::VulkanShader;
use crate::texture::VulkanTexture;

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    id: u64,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) pipeline_layout: vk::PipelineLayout,
}

impl Pipeline for VulkanPipeline {
    fn id(&self) -> u64 {
        self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            let _ = self.ctx.device_wait_idle();
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

pub fn create_graphics_pipeline(
    ctx: Arc<GpuContext>,
    state: &PipelineState,
    layout: &Arc<dyn DescriptorSetLayout>,
) -> Result<Arc<dyn Pipeline>> {
    let layout = layout
        .as_any()
        .downcast_ref::<VulkanDescriptorSetLayout>()
        .ok_or_else(|| Error::InvalidParameter("layout is not a Vulkan layout".to_string()))?;

    let shader_vertex = state
        .shader_vertex
        .as_ref()
        .and_then(|s| s.as_any().downcast_ref::<VulkanShader>().map(|v| v.module()))
        .ok_or_else(|| Error::InvalidResource("pipeline state has no Vulkan vertex shader".to_string()))?;
    if shader_vertex == vk::ShaderModule::null() {
        return Err(Error::InvalidResource("vertex shader module not ready".to_string()));
    }

    let entry_point = CString::new("main").unwrap();
    let mut stages = vec![vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::VERTEX)
        .module(shader_vertex)
        .name(&entry_point)];

    if let Some(shader_pixel) = &state.shader_pixel {
        let module = shader_pixel
            .as_any()
            .downcast_ref::<VulkanShader>()
            .map(|v| v.module())
            .unwrap_or(vk::ShaderModule::null());
        if module == vk::ShaderModule::null() {
            return Err(Error::InvalidResource("pixel shader module not ready".to_string()));
        }
        stages.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(module)
                .name(&entry_point),
        );
    }

    // Vertex input from the vertex shader's reflected attributes, laid out
    // sequentially at the pipeline state's stride
    let inputs = state
        .shader_vertex
        .as_ref()
        .and_then(|s| s.as_any().downcast_ref::<VulkanShader>().map(|v| v.vertex_inputs()))
        .unwrap_or_default();

    let mut attributes: Vec<vk::VertexInputAttributeDescription> = Vec::new();
    let mut offset = 0u32;
    for input in &inputs {
        attributes.push(vk::VertexInputAttributeDescription {
            location: input.location,
            binding: 0,
            format: input.format,
            offset,
        });
        offset += input.size;
    }
    let bindings = if attributes.is_empty() {
        Vec::new()
    } else {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: state.vertex_buffer_stride.max(offset),
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    };
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(conversions::topology(state.primitive_topology));

    let rasterizer = state.rasterizer_state.unwrap_or(RasterizerState::cull_back_solid());
    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(conversions::polygon_mode(rasterizer.fill_mode))
        .cull_mode(conversions::cull_mode(rasterizer.cull_mode))
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_clamp_enable(!rasterizer.depth_clip_enabled)
        .depth_bias_enable(rasterizer.depth_bias != 0.0 || rasterizer.depth_bias_slope_scaled != 0.0)
        .depth_bias_constant_factor(rasterizer.depth_bias)
        .depth_bias_slope_factor(rasterizer.depth_bias_slope_scaled)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil_state = state
        .depth_stencil_state
        .unwrap_or(vesper_engine::rhi::DepthStencilState::disabled());
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(depth_stencil_state.depth_test_enabled)
        .depth_write_enable(depth_stencil_state.depth_write_enabled)
        .depth_compare_op(conversions::compare_op(depth_stencil_state.depth_compare))
        .stencil_test_enable(depth_stencil_state.stencil_test_enabled);

    // One blend attachment per color target
    let color_count = state
        .render_target_color_textures
        .iter()
        .filter(|t| t.is_some())
        .count();
    let blend = state.blend_state.unwrap_or(vesper_engine::rhi::BlendState::disabled());
    let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(blend.enabled)
        .src_color_blend_factor(conversions::blend_factor(blend.src_factor))
        .dst_color_blend_factor(conversions::blend_factor(blend.dst_factor))
        .color_blend_op(conversions::blend_op(blend.op))
        .src_alpha_blend_factor(conversions::blend_factor(blend.src_alpha_factor))
        .dst_alpha_blend_factor(conversions::blend_factor(blend.dst_alpha_factor))
        .alpha_blend_op(conversions::blend_op(blend.alpha_op))
        .color_write_mask(vk::ColorComponentFlags::RGBA);
    let blend_attachments = vec![blend_attachment; color_count];
    let color_blend =
        vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    // Dynamic rendering: attachment formats are baked into the pipeline
    let color_formats: Vec<vk::Format> = state
        .render_target_color_textures
        .iter()
        .flatten()
        .map(|texture| {
            texture
                .as_any()
                .downcast_ref::<VulkanTexture>()
                .map(|t| conversions::format(t.info().format))
                .unwrap_or(vk::Format::UNDEFINED)
        })
        .collect();
    let depth_format = state
        .render_target_depth_texture
        .as_ref()
        .and_then(|texture| texture.as_any().downcast_ref::<VulkanTexture>())
        .map(|t| conversions::format(t.info().format))
        .unwrap_or(vk::Format::UNDEFINED);

    let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
        .color_attachment_formats(&color_formats)
        .depth_attachment_format(depth_format);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout.pipeline_layout)
        .push_next(&mut rendering_info);

    let pipelines = unsafe {
        ctx.device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    }
    .map_err(|(_, e)| {
        engine_error!(
            "vesper::vulkan::Pipeline",
            "Failed to create pipeline for pass '{}': {:?}",
            state.pass_name,
            e
        );
        Error::BackendError(format!("vkCreateGraphicsPipelines: {:?}", e))
    })?;

    Ok(Arc::new(VulkanPipeline {
        ctx,
        id: next_object_id(),
        pipeline: pipelines[0],
        pipeline_layout: layout.pipeline_layout,
    }))
}
