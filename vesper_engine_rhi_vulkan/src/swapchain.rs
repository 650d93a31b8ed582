/// VulkanSwapChainBackend - surface, image chain, acquire/present
///
/// The engine front-end (`vesper_engine::rhi::SwapChain`) owns the state
/// machine; this half performs the native work. Back-buffer images are
/// wrapped as non-owning `VulkanTexture`s so the renderer can target and
/// transition them like any other texture.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{
    SwapChainBackend, SwapChainDesc, Texture, TextureFormat, TextureInfo, TextureUsage,
};
use vesper_engine::{engine_error, engine_info};

use crate::context::GpuContext;
use crate::conversions;
use crate::texture::VulkanTexture;

/// Acquire semaphore handed to the render submit through the engine's
/// opaque sync slot
pub struct VulkanSync {
    pub semaphore: vk::Semaphore,
}

pub struct VulkanSwapChainBackend {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,

    format: TextureFormat,
    image_count: u32,

    image_views: Vec<vk::ImageView>,
    backbuffers: Vec<Arc<dyn Texture>>,
    /// One acquire semaphore per frame slot
    acquire_semaphores: Vec<vk::Semaphore>,
    semaphore_index: usize,
    last_acquired: u32,

    /// Pool backing the per-image command lists; recycled when every buffer
    /// has cycled once
    command_pool: vk::CommandPool,
}

impl VulkanSwapChainBackend {
    pub fn new(
        ctx: Arc<GpuContext>,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        desc: &SwapChainDesc,
    ) -> Result<Self> {
        let surface = unsafe {
            ash_window::create_surface(&ctx.entry, &ctx.instance, display_handle, window_handle, None)
        }
        .map_err(|e| {
            engine_error!("vesper::vulkan::SwapChain", "Failed to create surface: {:?}", e);
            Error::BackendError(format!("vkCreateSurface: {:?}", e))
        })?;

        let surface_loader = ash::khr::surface::Instance::new(&ctx.entry, &ctx.instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                ctx.physical_device,
                ctx.queue_graphics.family_index,
                surface,
            )
        }
        .unwrap_or(false);
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            return Err(Error::InitializationFailed(
                "graphics queue cannot present to this surface".to_string(),
            ));
        }

        let mut backend = Self {
            ctx,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            format: desc.format,
            image_count: desc.buffer_count,
            image_views: Vec::new(),
            backbuffers: Vec::new(),
            acquire_semaphores: Vec::new(),
            semaphore_index: 0,
            last_acquired: 0,
            command_pool: vk::CommandPool::null(),
        };

        backend.create_swapchain(desc.width, desc.height)?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(backend.ctx.queue_graphics.family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        backend.command_pool =
            unsafe { backend.ctx.device.create_command_pool(&pool_info, None) }
                .map_err(|e| Error::BackendError(format!("vkCreateCommandPool: {:?}", e)))?;

        engine_info!(
            "vesper::vulkan::SwapChain",
            "Created ({}x{}, {} images)",
            desc.width,
            desc.height,
            backend.image_count
        );

        Ok(backend)
    }

    fn create_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
        }
        .map_err(|e| Error::BackendError(format!("surface capabilities: {:?}", e)))?;

        let extent = vk::Extent2D {
            width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        };

        let mut image_count = self.image_count.max(capabilities.min_image_count);
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let old_swapchain = self.swapchain;

        let info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(conversions::format(self.format))
            .image_color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::IMMEDIATE)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&info, None) }
            .map_err(|e| Error::BackendError(format!("vkCreateSwapchainKHR: {:?}", e)))?;

        self.destroy_image_resources();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;

        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| Error::BackendError(format!("vkGetSwapchainImagesKHR: {:?}", e)))?;
        self.image_count = images.len() as u32;

        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(conversions::format(self.format))
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { self.ctx.device.create_image_view(&view_info, None) }
                .map_err(|e| Error::BackendError(format!("vkCreateImageView: {:?}", e)))?;
            self.image_views.push(view);

            self.backbuffers.push(Arc::new(VulkanTexture::from_swapchain_image(
                self.ctx.clone(),
                image,
                view,
                TextureInfo {
                    width: extent.width,
                    height: extent.height,
                    array_layers: 1,
                    mip_levels: 1,
                    format: self.format,
                    usage: TextureUsage::RENDER_TARGET,
                },
            )) as Arc<dyn Texture>);
        }

        for _ in 0..self.image_count {
            let semaphore =
                unsafe { self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
                    .map_err(|e| Error::BackendError(format!("vkCreateSemaphore: {:?}", e)))?;
            self.acquire_semaphores.push(semaphore);
        }

        Ok(())
    }

    fn destroy_image_resources(&mut self) {
        unsafe {
            let _ = self.ctx.device_wait_idle();
            for view in self.image_views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
            for semaphore in self.acquire_semaphores.drain(..) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
        }
        self.backbuffers.clear();
        self.semaphore_index = 0;
    }
}

impl SwapChainBackend for VulkanSwapChainBackend {
    fn acquire_next_image(&mut self) -> Result<u32> {
        let semaphore = self.acquire_semaphores[self.semaphore_index];
        self.semaphore_index = (self.semaphore_index + 1) % self.acquire_semaphores.len();

        let (index, _suboptimal) = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
        .map_err(|e| Error::BackendError(format!("vkAcquireNextImageKHR: {:?}", e)))?;

        self.last_acquired = index;
        Ok(index)
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        // Render submits fence-wait to completion, so presentation needs no
        // extra semaphore
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe {
            self.swapchain_loader
                .queue_present(self.ctx.queue_graphics.handle, &present_info)
        }
        .map_err(|e| Error::BackendError(format!("vkQueuePresentKHR: {:?}", e)))?;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.create_swapchain(width, height)
    }

    fn reset_command_pool(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("vkResetCommandPool: {:?}", e)))
        }
    }

    fn backbuffer(&self, image_index: u32) -> Arc<dyn Texture> {
        self.backbuffers[image_index as usize].clone()
    }

    fn acquired_sync(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        // The semaphore used by the most recent acquire
        let index = (self.semaphore_index + self.acquire_semaphores.len() - 1)
            % self.acquire_semaphores.len();
        Some(Arc::new(VulkanSync { semaphore: self.acquire_semaphores[index] }))
    }
}

impl Drop for VulkanSwapChainBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.ctx.device_wait_idle();

            self.destroy_image_resources();

            if self.command_pool != vk::CommandPool::null() {
                self.ctx.device.destroy_command_pool(self.command_pool, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
