/// Shader trait, descriptor and reflection types
///
/// Shader compilation is asynchronous: `RhiDevice::create_shader` returns
/// immediately and the shader transitions `Compiling -> Succeeded | Failed`
/// out-of-band. Consumers poll `is_compiled()` and skip dependent passes
/// until compilation finishes — nothing in the engine spins on the state.

use std::any::Any;
use std::collections::BTreeMap;
use bitflags::bitflags;

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

bitflags! {
    /// Stage visibility mask for reflected resource bindings
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX  = 1 << 0;
        const PIXEL   = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

impl From<ShaderStage> for ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Pixel => ShaderStageFlags::PIXEL,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

/// Compilation lifecycle of a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationState {
    Idle,
    Compiling,
    Succeeded,
    Failed,
}

/// Resource binding kind reflected from shader bytecode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    ConstantBuffer,
    /// Constant buffer addressed with a per-draw dynamic offset
    ConstantBufferDynamic,
    Texture,
    Sampler,
    /// Storage image / UAV
    UnorderedAccess,
}

/// A resource binding reflected from compiled shader bytecode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub ty: DescriptorType,
    pub slot: u32,
    pub stages: ShaderStageFlags,
}

/// Shader source payload
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// Pre-compiled SPIR-V words
    SpirV(Vec<u32>),
    /// HLSL source text; backends without a runtime compiler report
    /// `CompilationState::Failed` and log the reason
    Hlsl(String),
}

/// Descriptor for creating a shader
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    /// Logical name ("quad_v", "light_directional_p", ...)
    pub name: String,
    pub stage: ShaderStage,
    pub source: ShaderSource,
    /// Preprocessor defines, ordered for stable hashing
    pub defines: BTreeMap<String, String>,
    pub entry_point: String,
}

impl ShaderDesc {
    pub fn new(name: &str, stage: ShaderStage, source: ShaderSource) -> Self {
        Self {
            name: name.to_string(),
            stage,
            source,
            defines: BTreeMap::new(),
            entry_point: "main".to_string(),
        }
    }

    pub fn with_define(mut self, key: &str, value: &str) -> Self {
        self.defines.insert(key.to_string(), value.to_string());
        self
    }
}

/// Shader resource trait
pub trait Shader: Send + Sync {
    /// Unique id; also the key material for descriptor-layout hashing
    fn id(&self) -> u64;

    fn name(&self) -> &str;

    fn stage(&self) -> ShaderStage;

    /// Current compilation state; transitions out-of-band
    fn compilation_state(&self) -> CompilationState;

    /// True once compilation reached `Succeeded`
    fn is_compiled(&self) -> bool {
        self.compilation_state() == CompilationState::Succeeded
    }

    /// Resource bindings reflected from the compiled bytecode.
    /// Empty until `is_compiled()`.
    fn descriptors(&self) -> Vec<DescriptorBinding>;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}
