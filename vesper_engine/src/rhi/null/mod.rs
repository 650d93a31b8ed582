/// Null backend - a headless RhiDevice implementation
///
/// Implements the full RHI contract without a GPU: resources are plain
/// structs, command recording appends to an inspectable log, shader
/// "compilation" succeeds instantly (or on demand, for tests that need the
/// compiling state). Used by the test suite and for headless runs.

mod resources;
mod encoder;

pub use resources::{NullBuffer, NullPipeline, NullSampler, NullShader, NullTexture};
pub use encoder::NullCommandEncoder;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use winit::window::Window;

use crate::error::Result;
use crate::rhi::{
    Buffer, BufferDesc, CommandEncoder, DescriptorBinding, DescriptorSetLayout, DeviceInfo,
    DeviceLimits, DisplayMode, PhysicalDevice, Pipeline, PipelineState, QueueType, RhiDevice,
    Sampler, SamplerDesc, Shader, ShaderDesc, SwapChainBackend, SwapChainDesc, Texture,
    TextureDesc,
};

use self::encoder::NullSwapChainBackend;
use self::resources::NullDescriptorSetLayout;

/// Shared, inspectable record of every backend call the encoders received
#[derive(Clone, Default)]
pub struct CommandLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CommandLog {
    pub fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of entries starting with `prefix`
    pub fn count_of(&self, prefix: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Headless device. All factory methods succeed; queue waits are counted so
/// tests can assert the stop-the-world paths ran.
pub struct NullDevice {
    info: DeviceInfo,
    limits: DeviceLimits,
    log: CommandLog,
    queue_waits: AtomicU32,
    descriptor_set_capacity: AtomicU32,
    /// While set, newly created shaders stay in `Compiling` until released
    hold_compilation: AtomicBool,
}

impl NullDevice {
    pub fn new() -> Arc<Self> {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Arc<Self> {
        let mut info = DeviceInfo::new();
        info.register_physical_device(PhysicalDevice {
            name: "Null Adapter".to_string(),
            memory_mb: 8192,
            vendor_id: 0,
            driver_version: "0.0".to_string(),
        });
        info.register_display_mode(DisplayMode { width: 1920, height: 1080, refresh_rate_hz: 60.0 });

        Arc::new(Self {
            info,
            limits,
            log: CommandLog::default(),
            queue_waits: AtomicU32::new(0),
            descriptor_set_capacity: AtomicU32::new(0),
            hold_compilation: AtomicBool::new(false),
        })
    }

    /// The command log shared with every encoder created by this device
    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Number of `queue_wait` calls seen so far
    pub fn queue_wait_count(&self) -> u32 {
        self.queue_waits.load(Ordering::Relaxed)
    }

    /// Current descriptor pool capacity as last set by the cache
    pub fn descriptor_set_capacity(&self) -> u32 {
        self.descriptor_set_capacity.load(Ordering::Relaxed)
    }

    /// Make subsequently created shaders stay in `Compiling` until their
    /// `NullShader::release_compilation` is called
    pub fn hold_shader_compilation(&self, hold: bool) {
        self.hold_compilation.store(hold, Ordering::Relaxed);
    }
}

impl RhiDevice for NullDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn queue_wait(&self, _queue: QueueType) -> Result<()> {
        self.queue_waits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(NullTexture::new(desc)))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(NullBuffer::new(desc)))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        Ok(Arc::new(NullSampler::new(desc.clone())))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        let held = self.hold_compilation.load(Ordering::Relaxed);
        Ok(Arc::new(NullShader::new(desc, held)))
    }

    fn create_pipeline(
        &self,
        state: &PipelineState,
        _layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<Arc<dyn Pipeline>> {
        self.log.push(format!("create_pipeline:{}", state.pass_name));
        Ok(Arc::new(NullPipeline::new()))
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        Ok(Arc::new(NullDescriptorSetLayout::new(bindings.to_vec())))
    }

    fn set_descriptor_set_capacity(&self, capacity: u32) -> Result<()> {
        self.descriptor_set_capacity.store(capacity, Ordering::Relaxed);
        self.log.push(format!("set_descriptor_set_capacity:{}", capacity));
        Ok(())
    }

    fn create_command_encoder(&self) -> Result<Box<dyn CommandEncoder>> {
        Ok(Box::new(NullCommandEncoder::new(self.log.clone())))
    }

    fn create_swapchain_backend(
        &self,
        _window: Option<&Window>,
        desc: &SwapChainDesc,
    ) -> Result<Box<dyn SwapChainBackend>> {
        // Headless: a missing window is fine
        Ok(Box::new(NullSwapChainBackend::new(desc, self.log.clone())))
    }
}
