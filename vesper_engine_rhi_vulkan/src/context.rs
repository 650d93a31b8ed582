/// GpuContext - shared GPU resources for all Vulkan objects
///
/// Everything a Vulkan resource needs to create, bind and destroy itself:
/// the device, the allocator, the three queues and the instance. Shared via
/// `Arc` by every texture, buffer, shader and encoder so drop order never
/// outlives the device.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

/// One queue with its family index
#[derive(Clone, Copy)]
pub struct Queue {
    pub handle: vk::Queue,
    pub family_index: u32,
}

/// Shared GPU context for all Vulkan resources.
///
/// The allocator is wrapped in `ManuallyDrop` so it is dropped BEFORE the
/// device is destroyed (`VulkanDevice::drop` controls the order).
pub struct GpuContext {
    /// Loader entry (kept alive for the instance)
    pub entry: ash::Entry,

    /// Vulkan instance
    pub instance: ash::Instance,

    /// Selected physical device
    pub physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator (shared, mutex for thread safety)
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue (also used for presentation)
    pub queue_graphics: Queue,

    /// Transfer queue (may alias the graphics queue on single-queue hardware)
    pub queue_transfer: Queue,

    /// Compute queue (may alias the graphics queue on single-queue hardware)
    pub queue_compute: Queue,

    /// Debug utils loader (validation feature)
    #[cfg(feature = "vulkan-validation")]
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle (validation feature)
    #[cfg(feature = "vulkan-validation")]
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    /// Block until the given queue has drained
    pub fn queue_wait_idle(&self, queue: vk::Queue) -> ash::prelude::VkResult<()> {
        unsafe { self.device.queue_wait_idle(queue) }
    }

    /// Block until the whole device is idle
    pub fn device_wait_idle(&self) -> ash::prelude::VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // The allocator must go before the device it allocates from
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            #[cfg(feature = "vulkan-validation")]
            if let (Some(loader), Some(messenger)) = (&self.debug_utils, self.debug_messenger) {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
