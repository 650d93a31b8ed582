/// Null backend resource implementations

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::rhi::object::next_object_id;
use crate::rhi::{
    Buffer, BufferDesc, BufferKind, CompilationState, DescriptorBinding, DescriptorSetLayout,
    DescriptorType, ImageLayout, Pipeline, Sampler, SamplerDesc, Shader, ShaderDesc, ShaderStage,
    ShaderStageFlags, Texture, TextureDesc, TextureInfo,
};

// ============================================================================
// Texture
// ============================================================================

pub struct NullTexture {
    id: u64,
    info: TextureInfo,
    layout: Mutex<ImageLayout>,
    /// Set once any pass has drawn with this texture as a render target
    written: AtomicBool,
}

impl NullTexture {
    pub fn new(desc: &TextureDesc) -> Self {
        Self {
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
            written: AtomicBool::new(false),
        }
    }

    pub(crate) fn mark_written(&self) {
        self.written.store(true, Ordering::Relaxed);
    }

    /// True once a draw has targeted this texture
    pub fn was_written(&self) -> bool {
        self.written.load(Ordering::Relaxed)
    }
}

impl Texture for NullTexture {
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

// ============================================================================
// Buffer
// ============================================================================

pub struct NullBuffer {
    id: u64,
    kind: BufferKind,
    stride: u32,
    element_count: AtomicU32,
    offset_index: AtomicU32,
    data: Mutex<Vec<u8>>,
    reallocations: AtomicU32,
}

impl NullBuffer {
    pub fn new(desc: &BufferDesc) -> Self {
        Self {
            id: next_object_id(),
            kind: desc.kind,
            stride: desc.stride,
            element_count: AtomicU32::new(desc.element_count),
            offset_index: AtomicU32::new(0),
            data: Mutex::new(vec![0u8; desc.size_bytes() as usize]),
            reallocations: AtomicU32::new(0),
        }
    }

    /// Number of `reallocate` calls, for growth tests
    pub fn reallocation_count(&self) -> u32 {
        self.reallocations.load(Ordering::Relaxed)
    }

    /// Copy of the current contents, for upload tests
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for NullBuffer {
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
        self.element_count.load(Ordering::Relaxed)
    }

    fn offset_index(&self) -> u32 {
        self.offset_index.load(Ordering::Relaxed)
    }

    fn set_offset_index(&self, index: u32) {
        self.offset_index.store(index, Ordering::Relaxed);
    }

    fn map_write(&self, offset_index: u32, writer: &mut dyn FnMut(&mut [u8])) -> Result<()> {
        let mut data = self.data.lock().unwrap();

        let range = match self.kind {
            BufferKind::Constant => {
                let start = offset_index as usize * self.stride as usize;
                let end = start + self.stride as usize;
                if end > data.len() {
                    return Err(Error::InvalidParameter(format!(
                        "map_write offset {} out of range ({} elements)",
                        offset_index,
                        self.element_count()
                    )));
                }
                start..end
            }
            // Vertex/index buffers map in full
            _ => 0..data.len(),
        };

        writer(&mut data[range]);
        Ok(())
    }

    fn reallocate(&self, element_count: u32) -> Result<()> {
        let size = self.stride as usize * element_count as usize;
        *self.data.lock().unwrap() = vec![0u8; size];
        self.element_count.store(element_count, Ordering::Relaxed);
        self.reallocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Shader
// ============================================================================

pub struct NullShader {
    id: u64,
    name: String,
    stage: ShaderStage,
    state: Mutex<CompilationState>,
}

impl NullShader {
    pub fn new(desc: ShaderDesc, hold: bool) -> Self {
        let state = if hold { CompilationState::Compiling } else { CompilationState::Succeeded };
        Self {
            id: next_object_id(),
            name: desc.name,
            stage: desc.stage,
            state: Mutex::new(state),
        }
    }

    /// Finish a held compilation (tests drive the async state machine)
    pub fn release_compilation(&self) {
        *self.state.lock().unwrap() = CompilationState::Succeeded;
    }

    /// Fail a held compilation
    pub fn fail_compilation(&self) {
        *self.state.lock().unwrap() = CompilationState::Failed;
    }
}

impl Shader for NullShader {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn compilation_state(&self) -> CompilationState {
        *self.state.lock().unwrap()
    }

    fn descriptors(&self) -> Vec<DescriptorBinding> {
        if !self.is_compiled() {
            return Vec::new();
        }

        // A plausible reflection: the engine's global constant buffers plus,
        // for pixel shaders, the sampler set and material/G-buffer texture
        // slots.
        let stage_flags: ShaderStageFlags = self.stage.into();
        let mut bindings = vec![
            DescriptorBinding { ty: DescriptorType::ConstantBuffer, slot: 0, stages: stage_flags },
            DescriptorBinding { ty: DescriptorType::ConstantBuffer, slot: 1, stages: stage_flags },
        ];

        match self.stage {
            ShaderStage::Vertex => {
                bindings.push(DescriptorBinding {
                    ty: DescriptorType::ConstantBuffer,
                    slot: 2,
                    stages: stage_flags,
                });
            }
            ShaderStage::Pixel => {
                bindings.push(DescriptorBinding {
                    ty: DescriptorType::ConstantBuffer,
                    slot: 3,
                    stages: stage_flags,
                });
                for slot in 0..6 {
                    bindings.push(DescriptorBinding {
                        ty: DescriptorType::Sampler,
                        slot,
                        stages: stage_flags,
                    });
                }
                for slot in 0..30 {
                    bindings.push(DescriptorBinding {
                        ty: DescriptorType::Texture,
                        slot,
                        stages: stage_flags,
                    });
                }
            }
            ShaderStage::Compute => {}
        }

        bindings
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Sampler
// ============================================================================

pub struct NullSampler {
    id: u64,
    desc: SamplerDesc,
}

impl NullSampler {
    pub fn new(desc: SamplerDesc) -> Self {
        Self { id: next_object_id(), desc }
    }
}

impl Sampler for NullSampler {
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

// ============================================================================
// Pipeline
// ============================================================================

pub struct NullPipeline {
    id: u64,
}

impl NullPipeline {
    pub fn new() -> Self {
        Self { id: next_object_id() }
    }
}

impl Pipeline for NullPipeline {
    fn id(&self) -> u64 {
        self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Descriptor set layout
// ============================================================================

pub struct NullDescriptorSetLayout {
    id: u64,
    bindings: Vec<DescriptorBinding>,
}

impl NullDescriptorSetLayout {
    pub fn new(bindings: Vec<DescriptorBinding>) -> Self {
        Self { id: next_object_id(), bindings }
    }
}

impl DescriptorSetLayout for NullDescriptorSetLayout {
    fn id(&self) -> u64 {
        self.id
    }

    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    fn set_count(&self) -> u32 {
        // One set per layout; enough to drive the capacity accounting
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
