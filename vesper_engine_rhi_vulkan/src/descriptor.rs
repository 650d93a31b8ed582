/// VulkanDescriptorSetLayout - set layout, pipeline layout and the sets
/// allocated against them
///
/// Descriptor sets are allocated lazily, keyed by the hash of the bound
/// resources, so re-binding an identical resource combination reuses the
/// set. All sets die when the shared pool is re-created by
/// `set_descriptor_set_capacity`.

use std::any::Any;
use std::sync::{Arc, Mutex};

use ash::vk;
use rustc_hash::FxHashMap;

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{
    next_object_id, DescriptorBinding, DescriptorSetLayout, DescriptorType, ShaderStageFlags,
};
use vesper_engine::engine_error;

use crate::context::GpuContext;
use crate::shifts;

fn stage_flags(value: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if value.contains(ShaderStageFlags::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if value.contains(ShaderStageFlags::PIXEL) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if value.contains(ShaderStageFlags::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

/// The flat Vulkan binding number for an engine binding
pub(crate) fn binding_number(binding: &DescriptorBinding) -> u32 {
    match binding.ty {
        DescriptorType::ConstantBuffer | DescriptorType::ConstantBufferDynamic => {
            binding.slot + shifts::BUFFER
        }
        DescriptorType::Texture => binding.slot + shifts::TEXTURE,
        DescriptorType::Sampler => binding.slot + shifts::SAMPLER,
        DescriptorType::UnorderedAccess => binding.slot + shifts::STORAGE,
    }
}

pub(crate) fn descriptor_type(value: DescriptorType) -> vk::DescriptorType {
    match value {
        DescriptorType::ConstantBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::ConstantBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::Texture => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::UnorderedAccess => vk::DescriptorType::STORAGE_IMAGE,
    }
}

pub struct VulkanDescriptorSetLayout {
    ctx: Arc<GpuContext>,
    id: u64,
    bindings: Vec<DescriptorBinding>,
    pub(crate) layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pool: Arc<Mutex<vk::DescriptorPool>>,
    /// Sets allocated from the pool, keyed by bound-resource hash
    sets: Mutex<FxHashMap<u64, vk::DescriptorSet>>,
}

impl VulkanDescriptorSetLayout {
    pub fn new(
        ctx: Arc<GpuContext>,
        pool: Arc<Mutex<vk::DescriptorPool>>,
        bindings: Vec<DescriptorBinding>,
    ) -> Result<Self> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding_number(binding))
                    .descriptor_type(descriptor_type(binding.ty))
                    .descriptor_count(1)
                    .stage_flags(stage_flags(binding.stages))
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe { ctx.device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(|e| {
                engine_error!(
                    "vesper::vulkan::DescriptorSetLayout",
                    "Failed to create layout: {:?}",
                    e
                );
                Error::BackendError(format!("vkCreateDescriptorSetLayout: {:?}", e))
            })?;

        let set_layouts = [layout];
        let pipeline_layout_info =
            vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let pipeline_layout =
            unsafe { ctx.device.create_pipeline_layout(&pipeline_layout_info, None) }.map_err(
                |e| {
                    unsafe { ctx.device.destroy_descriptor_set_layout(layout, None) };
                    Error::BackendError(format!("vkCreatePipelineLayout: {:?}", e))
                },
            )?;

        Ok(Self {
            ctx,
            id: next_object_id(),
            bindings,
            layout,
            pipeline_layout,
            pool,
            sets: Mutex::new(FxHashMap::default()),
        })
    }

    /// Get or allocate the descriptor set for a bound-resource hash.
    /// Returns the set and whether it was freshly allocated (and therefore
    /// needs its writes flushed).
    pub(crate) fn acquire_set(&self, resource_hash: u64) -> Result<(vk::DescriptorSet, bool)> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|_| Error::BackendError("descriptor set lock poisoned".to_string()))?;

        if let Some(&set) = sets.get(&resource_hash) {
            return Ok((set, false));
        }

        let pool = self
            .pool
            .lock()
            .map_err(|_| Error::BackendError("descriptor pool lock poisoned".to_string()))?;

        let layouts = [self.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(*pool)
            .set_layouts(&layouts);

        let set = unsafe { self.ctx.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(|e| Error::BackendError(format!("vkAllocateDescriptorSets: {:?}", e)))?[0];

        sets.insert(resource_hash, set);
        Ok((set, true))
    }

}

impl DescriptorSetLayout for VulkanDescriptorSetLayout {
    fn id(&self) -> u64 {
        self.id
    }

    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    fn set_count(&self) -> u32 {
        self.sets.lock().map(|sets| sets.len() as u32).unwrap_or(0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            let _ = self.ctx.device_wait_idle();
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
