/// VulkanSampler

use std::any::Any;
use std::sync::Arc;

use ash::vk;

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{next_object_id, Sampler, SamplerDesc};
use vesper_engine::engine_error;

use crate::context::GpuContext;
use crate::conversions;

pub struct VulkanSampler {
    ctx: Arc<GpuContext>,
    id: u64,
    desc: SamplerDesc,
    pub(crate) sampler: vk::Sampler,
}

impl VulkanSampler {
    pub fn new(ctx: Arc<GpuContext>, desc: &SamplerDesc) -> Result<Self> {
        let mut info = vk::SamplerCreateInfo::default()
            .mag_filter(conversions::filter(desc.filter_mag))
            .min_filter(conversions::filter(desc.filter_min))
            .mipmap_mode(conversions::mipmap_mode(desc.filter_mip))
            .address_mode_u(conversions::address_mode(desc.address_mode))
            .address_mode_v(conversions::address_mode(desc.address_mode))
            .address_mode_w(conversions::address_mode(desc.address_mode))
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);

        if desc.anisotropy > 0.0 {
            info = info.anisotropy_enable(true).max_anisotropy(desc.anisotropy);
        }
        if let Some(compare) = conversions::sampler_compare(desc.compare) {
            info = info.compare_enable(true).compare_op(compare);
        }

        let sampler = unsafe { ctx.device.create_sampler(&info, None) }.map_err(|e| {
            engine_error!("vesper::vulkan::Sampler", "Failed to create sampler: {:?}", e);
            Error::BackendError(format!("vkCreateSampler: {:?}", e))
        })?;

        Ok(Self { ctx, id: next_object_id(), desc: desc.clone(), sampler })
    }
}

impl Sampler for VulkanSampler {
    fn id(&self) -> u64 {
        self.id
    }

    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}
