/// Null backend command encoder and swap-chain backend

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::rhi::{
    Buffer, CommandEncoder, DescriptorSetLayout, ImageLayout, Pipeline, PipelineState, Sampler,
    ScissorRect, ShaderStageFlags, SwapChainBackend, SwapChainDesc, Texture, TextureDesc,
    TextureUsage, Viewport,
};

use super::resources::NullTexture;
use super::CommandLog;

/// Encoder that appends every call to the device's command log.
///
/// Draws additionally mark the active pass's color targets as written, which
/// is what the end-to-end tests assert on.
pub struct NullCommandEncoder {
    log: CommandLog,
    pass_targets: Vec<Arc<dyn Texture>>,
    wait_sync: Option<Arc<dyn Any + Send + Sync>>,
}

impl NullCommandEncoder {
    pub fn new(log: CommandLog) -> Self {
        Self { log, pass_targets: Vec::new(), wait_sync: None }
    }

    fn mark_targets_written(&self) {
        for target in &self.pass_targets {
            if let Some(texture) = target.as_any().downcast_ref::<NullTexture>() {
                texture.mark_written();
            }
        }
    }
}

impl CommandEncoder for NullCommandEncoder {
    fn begin(&mut self) -> Result<()> {
        self.log.push("begin".to_string());
        Ok(())
    }

    fn begin_pass(
        &mut self,
        state: &PipelineState,
        _pipeline: &Arc<dyn Pipeline>,
        _layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<()> {
        self.log.push(format!("begin_pass:{}", state.pass_name));

        self.pass_targets.clear();
        for target in state.render_target_color_textures.iter().flatten() {
            self.pass_targets.push(target.clone());
        }
        if let Some(depth) = &state.render_target_depth_texture {
            self.pass_targets.push(depth.clone());
        }
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        self.log.push("end_pass".to_string());
        self.pass_targets.clear();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.log.push("end".to_string());
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        self.log.push("submit".to_string());
        self.wait_sync = None;
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>) -> Result<()> {
        self.log.push(format!("bind_vertex_buffer:{}", buffer.id()));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>) -> Result<()> {
        self.log.push(format!("bind_index_buffer:{}", buffer.id()));
        Ok(())
    }

    fn bind_constant_buffer(
        &mut self,
        slot: u32,
        _stages: ShaderStageFlags,
        buffer: &Arc<dyn Buffer>,
        offset_index: u32,
    ) -> Result<()> {
        self.log
            .push(format!("bind_constant_buffer:slot={},id={},offset={}", slot, buffer.id(), offset_index));
        Ok(())
    }

    fn bind_sampler(&mut self, slot: u32, sampler: &Arc<dyn Sampler>) -> Result<()> {
        self.log.push(format!("bind_sampler:slot={},id={}", slot, sampler.id()));
        Ok(())
    }

    fn bind_texture(&mut self, slot: u32, texture: &Arc<dyn Texture>) -> Result<()> {
        self.log.push(format!("bind_texture:slot={},id={}", slot, texture.id()));
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.log
            .push(format!("set_viewport:{}x{}", viewport.width as u32, viewport.height as u32));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: ScissorRect) -> Result<()> {
        self.log.push(format!("set_scissor:{}x{}", scissor.width, scissor.height));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, _vertex_offset: u32) -> Result<()> {
        self.log.push(format!("draw:{}", vertex_count));
        self.mark_targets_written();
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, _index_offset: u32, _vertex_offset: u32) -> Result<()> {
        self.log.push(format!("draw_indexed:{}", index_count));
        self.mark_targets_written();
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.log.push(format!("dispatch:{}x{}x{}", x, y, z));
        Ok(())
    }

    fn clear(&mut self, state: &PipelineState) -> Result<()> {
        self.log.push(format!("clear:{}", state.pass_name));
        Ok(())
    }

    fn transition_layout(
        &mut self,
        texture: &Arc<dyn Texture>,
        from: ImageLayout,
        to: ImageLayout,
    ) -> Result<()> {
        self.log
            .push(format!("transition:{},{:?}->{:?}", texture.id(), from, to));
        Ok(())
    }

    fn set_wait_sync(&mut self, sync: Option<Arc<dyn Any + Send + Sync>>) {
        self.wait_sync = sync;
    }

    fn timestamp(&mut self, label: &'static str) -> Result<()> {
        self.log.push(format!("timestamp:{}", label));
        Ok(())
    }
}

/// Headless swap chain: a ring of null textures, acquire cycles the index.
pub struct NullSwapChainBackend {
    log: CommandLog,
    images: Vec<Arc<dyn Texture>>,
    format: crate::rhi::TextureFormat,
    next_index: u32,
}

impl NullSwapChainBackend {
    pub fn new(desc: &SwapChainDesc, log: CommandLog) -> Self {
        let images = Self::make_images(desc.width, desc.height, desc.buffer_count, desc.format);
        Self { log, images, format: desc.format, next_index: 0 }
    }

    fn make_images(
        width: u32,
        height: u32,
        count: u32,
        format: crate::rhi::TextureFormat,
    ) -> Vec<Arc<dyn Texture>> {
        (0..count)
            .map(|i| {
                Arc::new(NullTexture::new(&TextureDesc {
                    width,
                    height,
                    array_layers: 1,
                    mip_levels: 1,
                    format,
                    usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                    name: format!("backbuffer_{}", i),
                })) as Arc<dyn Texture>
            })
            .collect()
    }
}

impl SwapChainBackend for NullSwapChainBackend {
    fn acquire_next_image(&mut self) -> Result<u32> {
        let index = self.next_index;
        self.next_index = (self.next_index + 1) % self.images.len() as u32;
        self.log.push(format!("swapchain_acquire:{}", index));
        Ok(index)
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        self.log.push(format!("swapchain_present:{}", image_index));
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.images = Self::make_images(width, height, self.images.len() as u32, self.format);
        self.log.push(format!("swapchain_resize:{}x{}", width, height));
        Ok(())
    }

    fn reset_command_pool(&mut self) -> Result<()> {
        self.log.push("swapchain_reset_pool".to_string());
        Ok(())
    }

    fn backbuffer(&self, image_index: u32) -> Arc<dyn Texture> {
        self.images[image_index as usize].clone()
    }

    fn acquired_sync(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}
