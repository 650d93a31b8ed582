/// VulkanDevice - the `RhiDevice` implementation
///
/// Owns the instance, logical device, queues, allocator and the descriptor
/// pool. Everything downstream shares the `GpuContext`.

use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{
    Buffer, BufferDesc, CommandEncoder, DescriptorBinding, DescriptorSetLayout, DeviceInfo,
    DeviceLimits, DisplayMode, PhysicalDevice, Pipeline, PipelineState, QueueType, RhiDevice,
    Sampler, SamplerDesc, Shader, ShaderDesc, SwapChainBackend, SwapChainDesc, Texture,
    TextureDesc,
};
use vesper_engine::{engine_error, engine_info};

use crate::buffer::VulkanBuffer;
use crate::context::{GpuContext, Queue};
use crate::descriptor::VulkanDescriptorSetLayout;
use crate::encoder::VulkanCommandEncoder;
use crate::pipeline::create_graphics_pipeline;
use crate::sampler::VulkanSampler;
use crate::shader::VulkanShader;
use crate::swapchain::VulkanSwapChainBackend;
use crate::texture::VulkanTexture;

/// Device creation configuration
#[derive(Debug, Clone)]
pub struct VulkanDeviceConfig {
    pub app_name: String,
    pub app_version: (u32, u32, u32),
}

impl Default for VulkanDeviceConfig {
    fn default() -> Self {
        Self { app_name: "Vesper Application".to_string(), app_version: (1, 0, 0) }
    }
}

pub struct VulkanDevice {
    context: Arc<GpuContext>,
    info: DeviceInfo,
    limits: DeviceLimits,
    /// Descriptor pool shared with layouts and encoders; re-created by
    /// `set_descriptor_set_capacity`
    descriptor_pool: Arc<Mutex<vk::DescriptorPool>>,
}

impl VulkanDevice {
    /// Create the device. `window` is used to pick the surface extensions
    /// and enumerate display modes; pass `None` for compute-only use.
    pub fn new(window: Option<&Window>, config: VulkanDeviceConfig) -> Result<Arc<Self>> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| Error::InitializationFailed(format!("Vulkan loader: {}", e)))?;

        // Instance
        let app_name = std::ffi::CString::new(config.app_name.clone())
            .map_err(|_| Error::InvalidParameter("app name contains NUL".to_string()))?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(
                0,
                config.app_version.0,
                config.app_version.1,
                config.app_version.2,
            ))
            .engine_name(CStr::from_bytes_with_nul(b"Vesper\0").unwrap())
            .api_version(vk::API_VERSION_1_3);

        let mut extensions: Vec<*const i8> = Vec::new();
        if let Some(window) = window {
            let display_handle = window
                .display_handle()
                .map_err(|e| Error::InitializationFailed(format!("display handle: {}", e)))?;
            extensions.extend_from_slice(
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(|e| Error::InitializationFailed(format!("surface extensions: {}", e)))?,
            );
        }

        #[allow(unused_mut)]
        let mut layers: Vec<*const i8> = Vec::new();
        #[cfg(feature = "vulkan-validation")]
        {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            layers.push(crate::debug::VALIDATION_LAYER.as_ptr());
        }

        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&instance_info, None) }
            .map_err(|e| Error::InitializationFailed(format!("vkCreateInstance: {:?}", e)))?;

        #[cfg(feature = "vulkan-validation")]
        let (debug_utils, debug_messenger) = {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = crate::debug::create_messenger(&loader).ok();
            (Some(loader), messenger)
        };

        // Physical devices: register them all, selection defaults to the
        // adapter with the most memory (index 0 post-sort)
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| Error::InitializationFailed(format!("enumerate_physical_devices: {:?}", e)))?;
        if physical_devices.is_empty() {
            return Err(Error::InitializationFailed("no Vulkan-capable GPU found".to_string()));
        }

        let mut info = DeviceInfo::new();
        for &candidate in &physical_devices {
            let properties = unsafe { instance.get_physical_device_properties(candidate) };
            let memory = unsafe { instance.get_physical_device_memory_properties(candidate) };

            let device_local: u64 = memory
                .memory_heaps
                .iter()
                .take(memory.memory_heap_count as usize)
                .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
                .map(|heap| heap.size)
                .sum();

            let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                .to_string_lossy()
                .into_owned();

            info.register_physical_device(PhysicalDevice {
                name,
                memory_mb: (device_local / (1024 * 1024)) as u32,
                vendor_id: properties.vendor_id,
                driver_version: format!(
                    "{}.{}.{}",
                    vk::api_version_major(properties.driver_version),
                    vk::api_version_minor(properties.driver_version),
                    vk::api_version_patch(properties.driver_version)
                ),
            });
        }

        // Display modes drive the frame pacing target
        if let Some(window) = window {
            if let Some(monitor) = window.current_monitor() {
                for mode in monitor.video_modes() {
                    let size = mode.size();
                    info.register_display_mode(DisplayMode {
                        width: size.width,
                        height: size.height,
                        refresh_rate_hz: mode.refresh_rate_millihertz() as f32 / 1000.0,
                    });
                }
            }
        }
        if info.display_modes().is_empty() {
            info.register_display_mode(DisplayMode { width: 1920, height: 1080, refresh_rate_hz: 60.0 });
        }

        // The primary adapter drives device creation. Match the sorted entry
        // back to its Vulkan handle by name.
        let primary_name = info
            .primary_physical_device()
            .map(|d| d.name.clone())
            .unwrap_or_default();
        let physical_device = physical_devices
            .iter()
            .copied()
            .find(|&candidate| {
                let properties = unsafe { instance.get_physical_device_properties(candidate) };
                let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned();
                name == primary_name
            })
            .unwrap_or(physical_devices[0]);

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let limits = DeviceLimits {
            max_texture_dimension_2d: properties.limits.max_image_dimension2_d,
        };

        // Queue families: graphics is mandatory; dedicated transfer/compute
        // are used when present, otherwise they alias graphics
        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let graphics_family = families
            .iter()
            .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .ok_or_else(|| Error::InitializationFailed("no graphics queue family".to_string()))?
            as u32;
        let transfer_family = families
            .iter()
            .enumerate()
            .position(|(i, f)| {
                i as u32 != graphics_family && f.queue_flags.contains(vk::QueueFlags::TRANSFER)
            })
            .map(|i| i as u32)
            .unwrap_or(graphics_family);
        let compute_family = families
            .iter()
            .enumerate()
            .position(|(i, f)| {
                i as u32 != graphics_family && f.queue_flags.contains(vk::QueueFlags::COMPUTE)
            })
            .map(|i| i as u32)
            .unwrap_or(graphics_family);

        let priorities = [1.0f32];
        let mut unique_families = vec![graphics_family];
        for family in [transfer_family, compute_family] {
            if !unique_families.contains(&family) {
                unique_families.push(family);
            }
        }
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let device_extensions = [ash::khr::swapchain::NAME.as_ptr()];

        let mut features_13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let features = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .fill_mode_non_solid(true)
            .depth_clamp(true);

        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&features)
            .push_next(&mut features_13);

        let device = unsafe { instance.create_device(physical_device, &device_info, None) }
            .map_err(|e| Error::InitializationFailed(format!("vkCreateDevice: {:?}", e)))?;

        let queue_graphics = Queue {
            handle: unsafe { device.get_device_queue(graphics_family, 0) },
            family_index: graphics_family,
        };
        let queue_transfer = Queue {
            handle: unsafe { device.get_device_queue(transfer_family, 0) },
            family_index: transfer_family,
        };
        let queue_compute = Queue {
            handle: unsafe { device.get_device_queue(compute_family, 0) },
            family_index: compute_family,
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| Error::InitializationFailed(format!("allocator: {}", e)))?;

        let context = Arc::new(GpuContext {
            entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue_graphics,
            queue_transfer,
            queue_compute,
            #[cfg(feature = "vulkan-validation")]
            debug_utils,
            #[cfg(feature = "vulkan-validation")]
            debug_messenger,
        });

        engine_info!(
            "vesper::vulkan::Device",
            "Device created ({})",
            primary_name
        );

        Ok(Arc::new(Self {
            context,
            info,
            limits,
            descriptor_pool: Arc::new(Mutex::new(vk::DescriptorPool::null())),
        }))
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    fn queue_handle(&self, queue: QueueType) -> vk::Queue {
        match queue {
            QueueType::Graphics => self.context.queue_graphics.handle,
            QueueType::Transfer => self.context.queue_transfer.handle,
            QueueType::Compute => self.context.queue_compute.handle,
        }
    }
}

impl RhiDevice for VulkanDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn queue_wait(&self, queue: QueueType) -> Result<()> {
        self.context
            .queue_wait_idle(self.queue_handle(queue))
            .map_err(|e| Error::BackendError(format!("vkQueueWaitIdle: {:?}", e)))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::new(self.context.clone(), desc)?))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(self.context.clone(), desc)?))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        Ok(Arc::new(VulkanSampler::new(self.context.clone(), desc)?))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(VulkanShader::create(self.context.clone(), desc))
    }

    fn create_pipeline(
        &self,
        state: &PipelineState,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<Arc<dyn Pipeline>> {
        create_graphics_pipeline(self.context.clone(), state, layout)
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        Ok(Arc::new(VulkanDescriptorSetLayout::new(
            self.context.clone(),
            self.descriptor_pool.clone(),
            bindings.to_vec(),
        )?))
    }

    fn set_descriptor_set_capacity(&self, capacity: u32) -> Result<()> {
        let mut pool = self
            .descriptor_pool
            .lock()
            .map_err(|_| Error::BackendError("descriptor pool lock poisoned".to_string()))?;

        unsafe {
            if *pool != vk::DescriptorPool::null() {
                // Callers wait-idle first; all sets die with the pool
                self.context.device.destroy_descriptor_pool(*pool, None);
            }

            let sizes = [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: capacity * 8,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                    descriptor_count: capacity * 2,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLED_IMAGE,
                    descriptor_count: capacity * 32,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLER,
                    descriptor_count: capacity * 8,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::STORAGE_IMAGE,
                    descriptor_count: capacity * 2,
                },
            ];
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .max_sets(capacity)
                .pool_sizes(&sizes);

            *pool = self
                .context
                .device
                .create_descriptor_pool(&pool_info, None)
                .map_err(|e| {
                    engine_error!(
                        "vesper::vulkan::Device",
                        "Failed to create descriptor pool: {:?}",
                        e
                    );
                    Error::BackendError(format!("vkCreateDescriptorPool: {:?}", e))
                })?;
        }

        Ok(())
    }

    fn create_command_encoder(&self) -> Result<Box<dyn CommandEncoder>> {
        Ok(Box::new(VulkanCommandEncoder::new(self.context.clone())?))
    }

    fn create_swapchain_backend(
        &self,
        window: Option<&Window>,
        desc: &SwapChainDesc,
    ) -> Result<Box<dyn SwapChainBackend>> {
        let window = window.ok_or_else(|| {
            engine_error!("vesper::vulkan::Device", "Swap chain requires a window");
            Error::InvalidParameter("swap chain requires a window".to_string())
        })?;
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::InvalidParameter(format!("display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::InvalidParameter(format!("window handle: {}", e)))?;

        Ok(Box::new(VulkanSwapChainBackend::new(
            self.context.clone(),
            display_handle.as_raw(),
            window_handle.as_raw(),
            desc,
        )?))
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.context.device_wait_idle();

            if let Ok(pool) = self.descriptor_pool.lock() {
                if *pool != vk::DescriptorPool::null() {
                    self.context.device.destroy_descriptor_pool(*pool, None);
                }
            }
        }
    }
}
