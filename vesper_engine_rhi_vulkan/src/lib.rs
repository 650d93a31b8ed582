/*!
# Vesper Engine - Vulkan backend

Vulkan implementation of the `vesper_engine` RHI traits, built on `ash` with
`gpu-allocator` for memory and `spirq` for shader reflection.

The entry point is [`VulkanDevice::new`]; everything else is reached through
the `vesper_engine::rhi` trait surface.

Enable the `vulkan-validation` feature to compile in the Khronos validation
layers and debug messenger.
*/

mod context;
mod debug;
mod conversions;
mod device;
mod texture;
mod buffer;
mod shader;
mod sampler;
mod descriptor;
mod pipeline;
mod encoder;
mod swapchain;

pub use context::GpuContext;
pub use device::{VulkanDevice, VulkanDeviceConfig};

/// Binding-slot shifts translating the engine's per-type register spaces
/// (b#, t#, s#, u#) into one flat Vulkan descriptor-set binding namespace.
pub(crate) mod shifts {
    pub const BUFFER: u32 = 0;
    pub const TEXTURE: u32 = 100;
    pub const SAMPLER: u32 = 200;
    pub const STORAGE: u32 = 300;
}
