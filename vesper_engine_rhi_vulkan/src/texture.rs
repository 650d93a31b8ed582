/// VulkanTexture - image, memory and the views the renderer binds
///
/// One whole-resource view for sampling plus one view per array layer for
/// render-target binding (shadow cascades render slice by slice). Layout is
/// tracked engine-side and mirrored here.

use std::any::Any;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{
    next_object_id, ImageLayout, Texture, TextureDesc, TextureInfo, TextureUsage,
};
use vesper_engine::engine_error;

use crate::context::GpuContext;
use crate::conversions;

pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    id: u64,
    info: TextureInfo,
    layout: Mutex<ImageLayout>,

    pub(crate) image: vk::Image,
    allocation: Option<Allocation>,
    /// Whole-resource view (all layers, sampled)
    pub(crate) view: vk::ImageView,
    /// One view per array layer for attachment binding
    pub(crate) layer_views: Vec<vk::ImageView>,
    /// False for swap-chain images, whose lifetime the swap chain owns
    owned: bool,
}

impl VulkanTexture {
    pub fn new(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let format = conversions::format(desc.format);
        let aspect = conversions::aspect_mask(desc.format);

        let mut usage = vk::ImageUsageFlags::empty();
        if desc.usage.contains(TextureUsage::SAMPLED) {
            usage |= vk::ImageUsageFlags::SAMPLED;
        }
        if desc.usage.contains(TextureUsage::RENDER_TARGET) {
            usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }
        if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
            usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
        }
        if desc.usage.contains(TextureUsage::UNORDERED_ACCESS) {
            usage |= vk::ImageUsageFlags::STORAGE;
        }
        usage |= vk::ImageUsageFlags::TRANSFER_DST;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device.create_image(&image_info, None) }.map_err(|e| {
            engine_error!("vesper::vulkan::Texture", "Failed to create image '{}': {:?}", desc.name, e);
            Error::BackendError(format!("vkCreateImage: {:?}", e))
        })?;

        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let allocation = ctx
            .allocator
            .lock()
            .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?
            .allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                engine_error!("vesper::vulkan::Texture", "Allocation failed for '{}': {}", desc.name, e);
                Error::OutOfMemory
            })?;

        unsafe {
            ctx.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| Error::BackendError(format!("vkBindImageMemory: {:?}", e)))?;
        }

        let view = Self::create_view(&ctx, image, format, aspect, 0, desc.array_layers)?;
        let mut layer_views = Vec::with_capacity(desc.array_layers as usize);
        for layer in 0..desc.array_layers {
            layer_views.push(Self::create_view(&ctx, image, format, aspect, layer, 1)?);
        }

        Ok(Self {
            ctx,
            id: next_object_id(),
            info: TextureInfo {
                width: desc.width,
                height: desc.height,
                array_layers: desc.array_layers,
                mip_levels: desc.mip_levels,
                format: desc.format,
                usage: desc.usage,
            },
            layout: Mutex::new(ImageLayout::Undefined),
            image,
            allocation: Some(allocation),
            view,
            layer_views,
            owned: true,
        })
    }

    /// Wrap a swap-chain image; destruction stays with the swap chain
    pub(crate) fn from_swapchain_image(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        info: TextureInfo,
    ) -> Self {
        Self {
            ctx,
            id: next_object_id(),
            info,
            layout: Mutex::new(ImageLayout::Undefined),
            image,
            allocation: None,
            view,
            layer_views: vec![view],
            owned: false,
        }
    }

    fn create_view(
        ctx: &GpuContext,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
        base_layer: u32,
        layer_count: u32,
    ) -> Result<vk::ImageView> {
        let view_type = if layer_count > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: base_layer,
                layer_count,
            });

        unsafe { ctx.device.create_image_view(&view_info, None) }
            .map_err(|e| Error::BackendError(format!("vkCreateImageView: {:?}", e)))
    }

    /// The attachment view for an array layer (whole-resource view for
    /// single-layer textures)
    pub(crate) fn attachment_view(&self, layer: u32) -> vk::ImageView {
        self.layer_views
            .get(layer as usize)
            .copied()
            .unwrap_or(self.view)
    }
}

impl Texture for VulkanTexture {
    fn id(&self) -> u64 {
        self.id
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn layout(&self) -> ImageLayout {
        *self.layout.lock().unwrap()
    }

    fn record_layout(&self, layout: ImageLayout) {
        *self.layout.lock().unwrap() = layout;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        unsafe {
            // Resources die only when the GPU is done with them
            let _ = self.ctx.device_wait_idle();

            for view in &self.layer_views {
                self.ctx.device.destroy_image_view(*view, None);
            }
            self.ctx.device.destroy_image_view(self.view, None);
            self.ctx.device.destroy_image(self.image, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
        }
    }
}
