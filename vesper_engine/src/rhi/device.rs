/// RhiDevice trait and hardware enumeration types
///
/// The device is the dependency root for all GPU object creation. Backend
/// crates (Vulkan, Direct3D, the built-in null backend) implement `RhiDevice`
/// and fill a `DeviceInfo` during construction; everything downstream only
/// sees the trait.

use std::sync::Arc;
use winit::window::Window;

use crate::error::Result;
use crate::rhi::{
    Buffer, BufferDesc, CommandEncoder, DescriptorBinding, DescriptorSetLayout,
    Pipeline, PipelineState, Sampler, SamplerDesc, Shader, ShaderDesc,
    SwapChainBackend, SwapChainDesc, Texture, TextureDesc,
};

/// A physical GPU discovered at device creation. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDevice {
    /// Adapter name as reported by the driver
    pub name: String,
    /// Dedicated memory in megabytes
    pub memory_mb: u32,
    /// PCI vendor id
    pub vendor_id: u32,
    /// Driver version string
    pub driver_version: String,
}

/// A display mode supported by the primary output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    /// Refresh rate in Hz
    pub refresh_rate_hz: f32,
}

/// Device capability limits used for validation
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    /// Largest supported 2D texture dimension
    pub max_texture_dimension_2d: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self { max_texture_dimension_2d: 16384 }
    }
}

/// GPU queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueType {
    Graphics,
    Transfer,
    Compute,
}

/// Hardware enumeration state owned by every device.
///
/// Backends register adapters and display modes at construction time;
/// afterwards the lists are read-only.
#[derive(Debug, Default)]
pub struct DeviceInfo {
    physical_devices: Vec<PhysicalDevice>,
    display_modes: Vec<DisplayMode>,
    physical_device_index: usize,
    display_mode_index: usize,
}

impl DeviceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a physical device, keeping the list sorted by memory
    /// (highest to lowest). The list is tiny (well under 8 entries),
    /// so the re-sort cost is irrelevant.
    pub fn register_physical_device(&mut self, device: PhysicalDevice) {
        crate::engine_info!("vesper::RhiDevice", "{} ({} MB)", device.name, device.memory_mb);
        self.physical_devices.push(device);
        self.physical_devices.sort_by(|a, b| b.memory_mb.cmp(&a.memory_mb));
    }

    /// Select the primary physical device. An out-of-range index is a silent
    /// no-op — callers are expected to validate externally.
    pub fn set_primary_physical_device(&mut self, index: usize) {
        if index >= self.physical_devices.len() {
            return;
        }
        self.physical_device_index = index;

        if let Some(device) = self.primary_physical_device() {
            crate::engine_info!("vesper::RhiDevice", "Primary adapter: {} ({} MB)", device.name, device.memory_mb);
        }
    }

    /// The currently selected physical device. Index 0 post-sort (the adapter
    /// with the most memory) is the default.
    pub fn primary_physical_device(&self) -> Option<&PhysicalDevice> {
        self.physical_devices.get(self.physical_device_index)
    }

    pub fn physical_devices(&self) -> &[PhysicalDevice] {
        &self.physical_devices
    }

    /// Register a display mode, keeping the list sorted by refresh rate
    /// (highest to lowest). The front entry drives target frame pacing.
    pub fn register_display_mode(&mut self, mode: DisplayMode) {
        self.display_modes.push(mode);
        self.display_modes
            .sort_by(|a, b| b.refresh_rate_hz.partial_cmp(&a.refresh_rate_hz).unwrap_or(std::cmp::Ordering::Equal));
    }

    pub fn primary_display_mode(&self) -> Option<&DisplayMode> {
        self.display_modes.get(self.display_mode_index)
    }

    pub fn display_modes(&self) -> &[DisplayMode] {
        &self.display_modes
    }
}

/// Main device trait - the root factory for all GPU objects.
///
/// Every other RHI object holds an `Arc<dyn RhiDevice>` back-reference;
/// the device outlives all of them.
pub trait RhiDevice: Send + Sync {
    /// Hardware enumeration state (adapters, display modes)
    fn info(&self) -> &DeviceInfo;

    /// Capability limits
    fn limits(&self) -> &DeviceLimits;

    /// True iff both dimensions are non-zero and within the device's
    /// maximum 2D texture dimension.
    fn validate_resolution(&self, width: u32, height: u32) -> bool {
        let max = self.limits().max_texture_dimension_2d;
        width > 0 && width <= max && height > 0 && height <= max
    }

    /// Block until the given queue is idle
    fn queue_wait(&self, queue: QueueType) -> Result<()>;

    /// Block until all queues (graphics, transfer, compute) are idle.
    /// Used before destructive re-allocation (descriptor pool resize,
    /// swap-chain resize).
    fn queue_wait_all(&self) -> Result<()> {
        self.queue_wait(QueueType::Graphics)?;
        self.queue_wait(QueueType::Transfer)?;
        self.queue_wait(QueueType::Compute)
    }

    /// Create a texture
    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a buffer
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a sampler
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a shader and start compiling it asynchronously.
    ///
    /// The returned shader starts in `CompilationState::Compiling`; callers
    /// must poll `Shader::is_compiled()` before using it and skip dependent
    /// work until it reports `Succeeded`.
    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Create a pipeline object for the given state and descriptor layout.
    /// Called by `PipelineCache` on a cache miss; passes go through the cache.
    fn create_pipeline(
        &self,
        state: &PipelineState,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<Arc<dyn Pipeline>>;

    /// Create a descriptor set layout from merged shader reflection data.
    /// Called by `DescriptorCache` on a cache miss.
    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<Arc<dyn DescriptorSetLayout>>;

    /// Destroy and re-allocate the descriptor pool with the given set
    /// capacity. All previously allocated descriptor sets become invalid;
    /// callers must `queue_wait_all()` first and drop cached layouts.
    fn set_descriptor_set_capacity(&self, capacity: u32) -> Result<()>;

    /// Create a command encoder (the backend half of a `CommandList`)
    fn create_command_encoder(&self) -> Result<Box<dyn CommandEncoder>>;

    /// Create the backend half of a swap chain.
    ///
    /// `window` is `None` for headless backends; window-backed backends must
    /// reject the call with `Error::InvalidParameter` in that case.
    fn create_swapchain_backend(
        &self,
        window: Option<&Window>,
        desc: &SwapChainDesc,
    ) -> Result<Box<dyn SwapChainBackend>>;
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
