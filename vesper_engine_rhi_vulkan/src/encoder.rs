/// VulkanCommandEncoder - translates the validated command stream into a
/// Vulkan command buffer
///
/// One pass per command buffer, matching the engine's submit-per-pass model.
/// Descriptor sets materialize lazily at draw time, keyed by the hash of the
/// currently bound resources, so identical binding combinations reuse sets
/// across passes.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use rustc_hash::FxHashMap;

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{
    Buffer, ClearValue, CommandEncoder, DescriptorSetLayout, DescriptorType, ImageLayout,
    Pipeline, PipelineState, Sampler, ScissorRect, ShaderStageFlags, Texture, Viewport,
};
use vesper_engine::engine_error;

use crate::context::GpuContext;
use crate::conversions;
use crate::descriptor::{binding_number, descriptor_type, VulkanDescriptorSetLayout};
use crate::pipeline::VulkanPipeline;
use crate::sampler::VulkanSampler;
use crate::swapchain::VulkanSync;
use crate::texture::VulkanTexture;
use crate::buffer::VulkanBuffer;

/// A resource staged for the next descriptor-set flush
#[derive(Clone)]
enum Binding {
    Buffer { buffer: vk::Buffer, range: u64, dynamic_offset: Option<u32>, ty: vk::DescriptorType },
    Image { view: vk::ImageView },
    Sampler { sampler: vk::Sampler },
}

pub struct VulkanCommandEncoder {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
    query_pool: vk::QueryPool,
    query_index: u32,

    recording: bool,
    in_pass: bool,

    layout: Option<Arc<dyn DescriptorSetLayout>>,
    /// Current resource bindings by flat binding number
    bindings: FxHashMap<u32, Binding>,
    bindings_dirty: bool,
    bound_set: vk::DescriptorSet,

    wait_sync: Option<Arc<dyn Any + Send + Sync>>,

    /// The pass's attachments, transitioned to sampleable layouts at
    /// end_pass
    pass_color_targets: Vec<Arc<dyn Texture>>,
    pass_depth_target: Option<Arc<dyn Texture>>,
}

impl VulkanCommandEncoder {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.queue_graphics.family_index)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let pool = ctx
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateCommandPool: {:?}", e)))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cmd = ctx
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| Error::BackendError(format!("vkAllocateCommandBuffers: {:?}", e)))?[0];

            let fence = ctx
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| Error::BackendError(format!("vkCreateFence: {:?}", e)))?;

            let query_info = vk::QueryPoolCreateInfo::default()
                .query_type(vk::QueryType::TIMESTAMP)
                .query_count(64);
            let query_pool = ctx
                .device
                .create_query_pool(&query_info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateQueryPool: {:?}", e)))?;

            Ok(Self {
                ctx,
                pool,
                cmd,
                fence,
                query_pool,
                query_index: 0,
                recording: false,
                in_pass: false,
                layout: None,
                bindings: FxHashMap::default(),
                bindings_dirty: false,
                bound_set: vk::DescriptorSet::null(),
                wait_sync: None,
                pass_color_targets: Vec::new(),
                pass_depth_target: None,
            })
        }
    }

    fn barrier(&self, cmd: vk::CommandBuffer, texture: &VulkanTexture, from: ImageLayout, to: ImageLayout) {
        let aspect = conversions::aspect_mask(texture.info().format);
        let image_barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE)
            .old_layout(conversions::image_layout(from))
            .new_layout(conversions::image_layout(to))
            .image(texture.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            });

        let barriers = [image_barrier];
        let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier2(cmd, &dependency);
        }
    }

    /// Transition a texture as part of the current recording
    fn transition_recorded(&self, texture: &Arc<dyn Texture>, to: ImageLayout) {
        if texture.layout() == to {
            return;
        }
        if let Some(vulkan) = texture.as_any().downcast_ref::<VulkanTexture>() {
            self.barrier(self.cmd, vulkan, texture.layout(), to);
            texture.record_layout(to);
        }
    }

    /// Materialize the descriptor set for the current bindings and bind it
    fn flush_descriptors(&mut self) -> Result<()> {
        let layout = match &self.layout {
            Some(layout) => layout.clone(),
            None => return Ok(()),
        };
        let layout = layout
            .as_any()
            .downcast_ref::<VulkanDescriptorSetLayout>()
            .ok_or_else(|| Error::InvalidParameter("layout is not a Vulkan layout".to_string()))?;

        if !self.bindings_dirty && self.bound_set != vk::DescriptorSet::null() {
            return Ok(());
        }

        // Hash the bound resources (dynamic offsets stay out of the hash:
        // they rebind the same set)
        let mut entries: Vec<(u32, u64)> = self
            .bindings
            .iter()
            .map(|(&binding, resource)| {
                let raw = match resource {
                    Binding::Buffer { buffer, .. } => buffer.as_raw(),
                    Binding::Image { view } => view.as_raw(),
                    Binding::Sampler { sampler } => sampler.as_raw(),
                };
                (binding, raw)
            })
            .collect();
        entries.sort_unstable();

        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash::FxHasher::default();
        entries.hash(&mut hasher);
        let resource_hash = hasher.finish();

        let (set, fresh) = layout.acquire_set(resource_hash)?;

        if fresh {
            let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::new();
            let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::new();

            // Two passes: collect infos first so the write pointers stay
            // stable
            for resource in self.bindings.values() {
                match resource {
                    Binding::Buffer { buffer, range, .. } => {
                        buffer_infos.push(
                            vk::DescriptorBufferInfo::default()
                                .buffer(*buffer)
                                .offset(0)
                                .range(*range),
                        );
                    }
                    Binding::Image { view } => {
                        image_infos.push(
                            vk::DescriptorImageInfo::default()
                                .image_view(*view)
                                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                        );
                    }
                    Binding::Sampler { sampler } => {
                        image_infos.push(vk::DescriptorImageInfo::default().sampler(*sampler));
                    }
                }
            }

            let mut writes: Vec<vk::WriteDescriptorSet> = Vec::new();
            let mut buffer_cursor = 0;
            let mut image_cursor = 0;
            for (&binding, resource) in &self.bindings {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_count(1);
                match resource {
                    Binding::Buffer { ty, .. } => {
                        writes.push(
                            write
                                .descriptor_type(*ty)
                                .buffer_info(&buffer_infos[buffer_cursor..buffer_cursor + 1]),
                        );
                        buffer_cursor += 1;
                    }
                    Binding::Image { .. } => {
                        writes.push(
                            write
                                .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                                .image_info(&image_infos[image_cursor..image_cursor + 1]),
                        );
                        image_cursor += 1;
                    }
                    Binding::Sampler { .. } => {
                        writes.push(
                            write
                                .descriptor_type(vk::DescriptorType::SAMPLER)
                                .image_info(&image_infos[image_cursor..image_cursor + 1]),
                        );
                        image_cursor += 1;
                    }
                }
            }

            unsafe {
                self.ctx.device.update_descriptor_sets(&writes, &[]);
            }
        }

        // Dynamic offsets in ascending binding order
        let mut dynamic: Vec<(u32, u32)> = self
            .bindings
            .iter()
            .filter_map(|(&binding, resource)| match resource {
                Binding::Buffer { dynamic_offset: Some(offset), .. } => Some((binding, *offset)),
                _ => None,
            })
            .collect();
        dynamic.sort_unstable();
        let offsets: Vec<u32> = dynamic.into_iter().map(|(_, offset)| offset).collect();

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout.pipeline_layout,
                0,
                &[set],
                &offsets,
            );
        }

        self.bound_set = set;
        self.bindings_dirty = false;
        Ok(())
    }

    /// Record transitions + vkCmdBeginRendering for a pipeline state
    fn begin_rendering(&mut self, state: &PipelineState) -> Result<()> {
        // Attachments must be in attachment layouts before rendering starts
        for target in state.render_target_color_textures.iter().flatten() {
            self.transition_recorded(target, ImageLayout::ColorAttachment);
        }
        if let Some(depth) = &state.render_target_depth_texture {
            let layout = if state.render_target_depth_read_only {
                ImageLayout::DepthStencilReadOnly
            } else {
                ImageLayout::DepthStencilAttachment
            };
            self.transition_recorded(depth, layout);
        }

        let mut extent = vk::Extent2D { width: 0, height: 0 };
        let mut color_attachments: Vec<vk::RenderingAttachmentInfo> = Vec::new();
        for (index, target) in state.render_target_color_textures.iter().enumerate() {
            let target = match target {
                Some(target) => target,
                None => continue,
            };
            let vulkan = target
                .as_any()
                .downcast_ref::<VulkanTexture>()
                .ok_or_else(|| Error::InvalidParameter("color target is not a Vulkan texture".to_string()))?;

            let info = vulkan.info();
            extent = vk::Extent2D { width: info.width, height: info.height };

            let (load_op, clear_value) = match state.clear_color[index] {
                ClearValue::Color(rgba) => (
                    vk::AttachmentLoadOp::CLEAR,
                    vk::ClearValue { color: vk::ClearColorValue { float32: rgba } },
                ),
                _ => (vk::AttachmentLoadOp::LOAD, vk::ClearValue::default()),
            };

            color_attachments.push(
                vk::RenderingAttachmentInfo::default()
                    .image_view(vulkan.attachment_view(state.render_target_color_array_index))
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(load_op)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(clear_value),
            );
        }

        let depth_attachment = match &state.render_target_depth_texture {
            Some(depth) => {
                let vulkan = depth
                    .as_any()
                    .downcast_ref::<VulkanTexture>()
                    .ok_or_else(|| Error::InvalidParameter("depth target is not a Vulkan texture".to_string()))?;
                let info = vulkan.info();
                if extent.width == 0 {
                    extent = vk::Extent2D { width: info.width, height: info.height };
                }

                let (load_op, clear_value) = match state.clear_depth {
                    ClearValue::DepthStencil { depth, stencil } => (
                        vk::AttachmentLoadOp::CLEAR,
                        vk::ClearValue {
                            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                        },
                    ),
                    _ => (vk::AttachmentLoadOp::LOAD, vk::ClearValue::default()),
                };

                Some(
                    vk::RenderingAttachmentInfo::default()
                        .image_view(vulkan.attachment_view(state.render_target_depth_array_index))
                        .image_layout(if state.render_target_depth_read_only {
                            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                        } else {
                            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                        })
                        .load_op(load_op)
                        .store_op(vk::AttachmentStoreOp::STORE)
                        .clear_value(clear_value),
                )
            }
            None => None,
        };

        let render_area = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent };
        let mut rendering = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth) = &depth_attachment {
            rendering = rendering.depth_attachment(depth);
        }

        unsafe {
            self.ctx.device.cmd_begin_rendering(self.cmd, &rendering);

            // Dynamic state defaults covering the whole render area
            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            self.ctx.device.cmd_set_viewport(self.cmd, 0, &[viewport]);
            self.ctx.device.cmd_set_scissor(self.cmd, 0, &[render_area]);
        }

        // Remember attachments for the end-of-pass transitions
        self.pass_color_targets = state
            .render_target_color_textures
            .iter()
            .flatten()
            .cloned()
            .collect();
        self.pass_depth_target = state.render_target_depth_texture.clone();

        Ok(())
    }
}

impl CommandEncoder for VulkanCommandEncoder {
    fn begin(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("vkResetCommandBuffer: {:?}", e)))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(self.cmd, &begin_info)
                .map_err(|e| Error::BackendError(format!("vkBeginCommandBuffer: {:?}", e)))?;

            self.ctx
                .device
                .cmd_reset_query_pool(self.cmd, self.query_pool, 0, 64);
        }

        self.recording = true;
        self.in_pass = false;
        self.query_index = 0;
        self.bindings.clear();
        self.bindings_dirty = false;
        self.bound_set = vk::DescriptorSet::null();
        Ok(())
    }

    fn begin_pass(
        &mut self,
        state: &PipelineState,
        pipeline: &Arc<dyn Pipeline>,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<()> {
        self.begin_rendering(state)?;

        let vulkan_pipeline = pipeline
            .as_any()
            .downcast_ref::<VulkanPipeline>()
            .ok_or_else(|| Error::InvalidParameter("pipeline is not a Vulkan pipeline".to_string()))?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                vulkan_pipeline.pipeline,
            );
        }

        self.layout = Some(layout.clone());
        self.in_pass = true;
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        if !self.in_pass {
            return Ok(());
        }
        unsafe {
            self.ctx.device.cmd_end_rendering(self.cmd);
        }

        // Hand the attachments over to their sampled roles; the next pass
        // that renders to them transitions them back
        let color_targets = std::mem::take(&mut self.pass_color_targets);
        for target in &color_targets {
            self.transition_recorded(target, ImageLayout::ShaderRead);
        }
        if let Some(depth) = self.pass_depth_target.take() {
            self.transition_recorded(&depth, ImageLayout::DepthStencilReadOnly);
        }

        self.in_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.cmd)
                .map_err(|e| Error::BackendError(format!("vkEndCommandBuffer: {:?}", e)))?;
        }
        self.recording = false;
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        let wait_semaphore = self
            .wait_sync
            .take()
            .and_then(|sync| sync.downcast_ref::<VulkanSync>().map(|s| s.semaphore));

        unsafe {
            let cmd_buffers = [self.cmd];
            let wait_semaphores: Vec<vk::Semaphore> = wait_semaphore.into_iter().collect();
            let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];

            let submit = vk::SubmitInfo::default()
                .command_buffers(&cmd_buffers)
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages);

            self.ctx
                .device
                .queue_submit(self.ctx.queue_graphics.handle, &[submit], self.fence)
                .map_err(|e| {
                    engine_error!("vesper::vulkan::Encoder", "vkQueueSubmit failed: {:?}", e);
                    Error::BackendError(format!("vkQueueSubmit: {:?}", e))
                })?;

            // Coarse sync: wait for the pass to retire before re-recording
            self.ctx
                .device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| Error::BackendError(format!("vkWaitForFences: {:?}", e)))?;
            self.ctx
                .device
                .reset_fences(&[self.fence])
                .map_err(|e| Error::BackendError(format!("vkResetFences: {:?}", e)))?;
        }

        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>) -> Result<()> {
        let vulkan = buffer
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .ok_or_else(|| Error::InvalidParameter("buffer is not a Vulkan buffer".to_string()))?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.cmd, 0, &[vulkan.handle()], &[0]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>) -> Result<()> {
        let vulkan = buffer
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .ok_or_else(|| Error::InvalidParameter("buffer is not a Vulkan buffer".to_string()))?;
        let index_type = if buffer.stride() == 2 { vk::IndexType::UINT16 } else { vk::IndexType::UINT32 };
        unsafe {
            self.ctx
                .device
                .cmd_bind_index_buffer(self.cmd, vulkan.handle(), 0, index_type);
        }
        Ok(())
    }

    fn bind_constant_buffer(
        &mut self,
        slot: u32,
        _stages: ShaderStageFlags,
        buffer: &Arc<dyn Buffer>,
        offset_index: u32,
    ) -> Result<()> {
        let vulkan = buffer
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .ok_or_else(|| Error::InvalidParameter("buffer is not a Vulkan buffer".to_string()))?;

        // Dynamic when the layout promoted this slot
        let is_dynamic = self
            .layout
            .as_ref()
            .map(|layout| {
                layout.bindings().iter().any(|b| {
                    b.slot == slot && b.ty == DescriptorType::ConstantBufferDynamic
                })
            })
            .unwrap_or(false);

        let stride = buffer.stride() as u64;
        let binding = vesper_engine::rhi::DescriptorBinding {
            ty: if is_dynamic {
                DescriptorType::ConstantBufferDynamic
            } else {
                DescriptorType::ConstantBuffer
            },
            slot,
            stages: ShaderStageFlags::VERTEX,
        };

        self.bindings.insert(
            binding_number(&binding),
            Binding::Buffer {
                buffer: vulkan.handle(),
                range: stride,
                dynamic_offset: is_dynamic.then(|| offset_index * buffer.stride()),
                ty: descriptor_type(binding.ty),
            },
        );
        self.bindings_dirty = true;
        Ok(())
    }

    fn bind_sampler(&mut self, slot: u32, sampler: &Arc<dyn Sampler>) -> Result<()> {
        let vulkan = sampler
            .as_any()
            .downcast_ref::<VulkanSampler>()
            .ok_or_else(|| Error::InvalidParameter("sampler is not a Vulkan sampler".to_string()))?;

        let binding = vesper_engine::rhi::DescriptorBinding {
            ty: DescriptorType::Sampler,
            slot,
            stages: ShaderStageFlags::PIXEL,
        };
        self.bindings
            .insert(binding_number(&binding), Binding::Sampler { sampler: vulkan.sampler });
        self.bindings_dirty = true;
        Ok(())
    }

    fn bind_texture(&mut self, slot: u32, texture: &Arc<dyn Texture>) -> Result<()> {
        let vulkan = texture
            .as_any()
            .downcast_ref::<VulkanTexture>()
            .ok_or_else(|| Error::InvalidParameter("texture is not a Vulkan texture".to_string()))?;

        let binding = vesper_engine::rhi::DescriptorBinding {
            ty: DescriptorType::Texture,
            slot,
            stages: ShaderStageFlags::PIXEL,
        };
        self.bindings
            .insert(binding_number(&binding), Binding::Image { view: vulkan.view });
        self.bindings_dirty = true;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_set_viewport(
                self.cmd,
                0,
                &[vk::Viewport {
                    x: viewport.x,
                    y: viewport.y,
                    width: viewport.width,
                    height: viewport.height,
                    min_depth: viewport.min_depth,
                    max_depth: viewport.max_depth,
                }],
            );
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: ScissorRect) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_set_scissor(
                self.cmd,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x: scissor.x, y: scissor.y },
                    extent: vk::Extent2D { width: scissor.width, height: scissor.height },
                }],
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, vertex_offset: u32) -> Result<()> {
        self.flush_descriptors()?;
        unsafe {
            self.ctx.device.cmd_draw(self.cmd, vertex_count, 1, vertex_offset, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: u32) -> Result<()> {
        self.flush_descriptors()?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.cmd,
                index_count,
                1,
                index_offset,
                vertex_offset as i32,
                0,
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.flush_descriptors()?;
        unsafe {
            self.ctx.device.cmd_dispatch(self.cmd, x, y, z);
        }
        Ok(())
    }

    fn clear(&mut self, state: &PipelineState) -> Result<()> {
        // A rendering scope with CLEAR load ops and no draws
        self.begin_rendering(state)?;
        unsafe {
            self.ctx.device.cmd_end_rendering(self.cmd);
        }
        self.pass_color_targets.clear();
        self.pass_depth_target = None;
        Ok(())
    }

    fn transition_layout(
        &mut self,
        texture: &Arc<dyn Texture>,
        from: ImageLayout,
        to: ImageLayout,
    ) -> Result<()> {
        let vulkan = texture
            .as_any()
            .downcast_ref::<VulkanTexture>()
            .ok_or_else(|| Error::InvalidParameter("texture is not a Vulkan texture".to_string()))?;

        if self.recording {
            self.barrier(self.cmd, vulkan, from, to);
            return Ok(());
        }

        // No open recording: one-shot submission
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cmd = self
                .ctx
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| Error::BackendError(format!("vkAllocateCommandBuffers: {:?}", e)))?[0];

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| Error::BackendError(format!("vkBeginCommandBuffer: {:?}", e)))?;

            self.barrier(cmd, vulkan, from, to);

            self.ctx
                .device
                .end_command_buffer(cmd)
                .map_err(|e| Error::BackendError(format!("vkEndCommandBuffer: {:?}", e)))?;

            let cmd_buffers = [cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&cmd_buffers);
            self.ctx
                .device
                .queue_submit(self.ctx.queue_graphics.handle, &[submit], vk::Fence::null())
                .map_err(|e| Error::BackendError(format!("vkQueueSubmit: {:?}", e)))?;
            self.ctx
                .queue_wait_idle(self.ctx.queue_graphics.handle)
                .map_err(|e| Error::BackendError(format!("vkQueueWaitIdle: {:?}", e)))?;

            self.ctx.device.free_command_buffers(self.pool, &cmd_buffers);
        }
        Ok(())
    }

    fn set_wait_sync(&mut self, sync: Option<Arc<dyn Any + Send + Sync>>) {
        self.wait_sync = sync;
    }

    fn timestamp(&mut self, _label: &'static str) -> Result<()> {
        if self.query_index >= 64 {
            return Ok(());
        }
        unsafe {
            self.ctx.device.cmd_write_timestamp(
                self.cmd,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                self.query_pool,
                self.query_index,
            );
        }
        self.query_index += 1;
        Ok(())
    }
}

impl Drop for VulkanCommandEncoder {
    fn drop(&mut self) {
        unsafe {
            let _ = self.ctx.device_wait_idle();
            self.ctx.device.destroy_query_pool(self.query_pool, None);
            self.ctx.device.destroy_fence(self.fence, None);
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}
