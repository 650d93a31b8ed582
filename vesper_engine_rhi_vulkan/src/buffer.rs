/// VulkanBuffer - persistently mapped buffers with reallocate-on-grow
///
/// Dynamic buffers live in CPU-to-GPU memory and stay mapped for their whole
/// lifetime; `map_write` copies into the mapped range directly. `reallocate`
/// drains the device first since the old buffer may still be referenced by
/// in-flight work.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use vesper_engine::error::{Error, Result};
use vesper_engine::rhi::{next_object_id, Buffer, BufferDesc, BufferKind};
use vesper_engine::engine_error;

use crate::context::GpuContext;

struct BufferInner {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    element_count: u32,
}

pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    id: u64,
    kind: BufferKind,
    stride: u32,
    name: String,
    offset_index: AtomicU32,
    inner: Mutex<BufferInner>,
}

impl VulkanBuffer {
    pub fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        let inner = Self::allocate(&ctx, desc.kind, desc.stride, desc.element_count, &desc.name)?;
        Ok(Self {
            ctx,
            id: next_object_id(),
            kind: desc.kind,
            stride: desc.stride,
            name: desc.name.clone(),
            offset_index: AtomicU32::new(0),
            inner: Mutex::new(inner),
        })
    }

    fn allocate(
        ctx: &GpuContext,
        kind: BufferKind,
        stride: u32,
        element_count: u32,
        name: &str,
    ) -> Result<BufferInner> {
        let usage = match kind {
            BufferKind::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferKind::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferKind::Constant => vk::BufferUsageFlags::UNIFORM_BUFFER,
        } | vk::BufferUsageFlags::TRANSFER_DST;

        let size = (stride as u64 * element_count as u64).max(1);
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { ctx.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            engine_error!("vesper::vulkan::Buffer", "Failed to create buffer '{}': {:?}", name, e);
            Error::BackendError(format!("vkCreateBuffer: {:?}", e))
        })?;

        let requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };
        let allocation = ctx
            .allocator
            .lock()
            .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                // CPU-writable, persistently mapped
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                engine_error!("vesper::vulkan::Buffer", "Allocation failed for '{}': {}", name, e);
                Error::OutOfMemory
            })?;

        unsafe {
            ctx.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| Error::BackendError(format!("vkBindBufferMemory: {:?}", e)))?;
        }

        Ok(BufferInner { buffer, allocation: Some(allocation), element_count })
    }

    fn destroy_inner(ctx: &GpuContext, inner: &mut BufferInner) {
        unsafe {
            if let Some(allocation) = inner.allocation.take() {
                if let Ok(mut allocator) = ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            ctx.device.destroy_buffer(inner.buffer, None);
        }
        inner.buffer = vk::Buffer::null();
    }

    /// The native handle for binding
    pub(crate) fn handle(&self) -> vk::Buffer {
        self.inner.lock().map(|inner| inner.buffer).unwrap_or(vk::Buffer::null())
    }
}

impl Buffer for VulkanBuffer {
    fn id(&self) -> u64 {
        self.id
    }

    fn kind(&self) -> BufferKind {
        self.kind
    }

    fn stride(&self) -> u32 {
        self.stride
    }

    fn element_count(&self) -> u32 {
        self.inner.lock().map(|inner| inner.element_count).unwrap_or(0)
    }

    fn offset_index(&self) -> u32 {
        self.offset_index.load(Ordering::Relaxed)
    }

    fn set_offset_index(&self, index: u32) {
        self.offset_index.store(index, Ordering::Relaxed);
    }

    fn map_write(&self, offset_index: u32, writer: &mut dyn FnMut(&mut [u8])) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::BackendError("buffer lock poisoned".to_string()))?;

        let element_count = inner.element_count;
        let stride = self.stride as usize;
        let allocation = inner
            .allocation
            .as_mut()
            .ok_or_else(|| Error::InvalidResource(format!("buffer '{}' has no allocation", self.name)))?;

        let mapped = allocation
            .mapped_slice_mut()
            .ok_or_else(|| Error::BackendError(format!("buffer '{}' is not CPU-accessible", self.name)))?;

        let range = match self.kind {
            BufferKind::Constant => {
                let start = offset_index as usize * stride;
                let end = start + stride;
                if end > mapped.len() {
                    return Err(Error::InvalidParameter(format!(
                        "map_write offset {} out of range ({} elements)",
                        offset_index, element_count
                    )));
                }
                start..end
            }
            // Vertex/index buffers map in full
            _ => 0..mapped.len(),
        };

        writer(&mut mapped[range]);
        Ok(())
    }

    fn reallocate(&self, element_count: u32) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::BackendError("buffer lock poisoned".to_string()))?;

        // The old buffer may still be read by in-flight submissions
        self.ctx
            .device_wait_idle()
            .map_err(|e| Error::BackendError(format!("vkDeviceWaitIdle: {:?}", e)))?;

        Self::destroy_inner(&self.ctx, &mut inner);
        *inner = Self::allocate(&self.ctx, self.kind, self.stride, element_count, &self.name)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        let _ = self.ctx.device_wait_idle();
        if let Ok(mut inner) = self.inner.lock() {
            Self::destroy_inner(&self.ctx, &mut inner);
        }
    }
}
