/// VulkanShader - asynchronous module creation and spirq reflection
///
/// `VulkanShader::create` returns immediately with the shader in the
/// `Compiling` state; a worker thread builds the module, reflects the
/// descriptor bindings and vertex inputs, then flips the state. Consumers
/// poll `is_compiled()` and skip dependent passes until then.

use std::any::Any;
use std::sync::{Arc, Mutex};

use ash::vk;
use spirq::prelude::*;

use vesper_engine::rhi::{
    next_object_id, CompilationState, DescriptorBinding, DescriptorType as RhiDescriptorType,
    Shader, ShaderDesc, ShaderSource, ShaderStage,
};
use vesper_engine::{engine_debug, engine_error};

use crate::context::GpuContext;
use crate::shifts;

/// A reflected vertex input attribute
#[derive(Debug, Clone, Copy)]
pub(crate) struct VertexInput {
    pub location: u32,
    pub format: vk::Format,
    pub size: u32,
}

struct Compiled {
    module: vk::ShaderModule,
    bindings: Vec<DescriptorBinding>,
    inputs: Vec<VertexInput>,
}

pub struct VulkanShader {
    ctx: Arc<GpuContext>,
    id: u64,
    name: String,
    stage: ShaderStage,
    state: Mutex<CompilationState>,
    compiled: Mutex<Option<Compiled>>,
}

impl VulkanShader {
    pub fn create(ctx: Arc<GpuContext>, desc: ShaderDesc) -> Arc<Self> {
        let shader = Arc::new(Self {
            ctx,
            id: next_object_id(),
            name: desc.name.clone(),
            stage: desc.stage,
            state: Mutex::new(CompilationState::Compiling),
            compiled: Mutex::new(None),
        });

        let worker = shader.clone();
        std::thread::spawn(move || worker.compile(desc));

        shader
    }

    fn compile(&self, desc: ShaderDesc) {
        let words = match desc.source {
            ShaderSource::SpirV(words) => words,
            ShaderSource::Hlsl(_) => {
                engine_error!(
                    "vesper::vulkan::Shader",
                    "'{}': runtime HLSL compilation is not available in this backend",
                    self.name
                );
                *self.state.lock().unwrap() = CompilationState::Failed;
                return;
            }
        };

        let module_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = match unsafe { self.ctx.device.create_shader_module(&module_info, None) } {
            Ok(module) => module,
            Err(e) => {
                engine_error!("vesper::vulkan::Shader", "'{}': vkCreateShaderModule: {:?}", self.name, e);
                *self.state.lock().unwrap() = CompilationState::Failed;
                return;
            }
        };

        let (bindings, inputs) = match self.reflect(&words) {
            Ok(reflected) => reflected,
            Err(message) => {
                engine_error!("vesper::vulkan::Shader", "'{}': reflection failed: {}", self.name, message);
                unsafe { self.ctx.device.destroy_shader_module(module, None) };
                *self.state.lock().unwrap() = CompilationState::Failed;
                return;
            }
        };

        engine_debug!(
            "vesper::vulkan::Shader",
            "'{}' compiled ({} bindings, {} inputs)",
            self.name,
            bindings.len(),
            inputs.len()
        );

        *self.compiled.lock().unwrap() = Some(Compiled { module, bindings, inputs });
        *self.state.lock().unwrap() = CompilationState::Succeeded;
    }

    /// Reflect descriptor bindings and vertex inputs from the SPIR-V.
    /// Binding slots come back in the engine's per-type register spaces
    /// (the shifts are undone so the merge logic sees logical slots).
    fn reflect(&self, words: &[u32]) -> std::result::Result<(Vec<DescriptorBinding>, Vec<VertexInput>), String> {
        let entry_points = ReflectConfig::new()
            .spv(words)
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| format!("{}", e))?;

        let entry = entry_points.first().ok_or_else(|| "no entry point".to_string())?;

        let stage_flags = self.stage.into();
        let mut bindings = Vec::new();
        let mut inputs = Vec::new();

        for var in &entry.vars {
            match var {
                Variable::Descriptor { desc_bind, desc_ty, .. } => {
                    let raw_slot = desc_bind.bind();
                    let (ty, shift) = match desc_ty {
                        DescriptorType::UniformBuffer() => {
                            (RhiDescriptorType::ConstantBuffer, shifts::BUFFER)
                        }
                        DescriptorType::SampledImage() | DescriptorType::CombinedImageSampler() => {
                            (RhiDescriptorType::Texture, shifts::TEXTURE)
                        }
                        DescriptorType::Sampler() => (RhiDescriptorType::Sampler, shifts::SAMPLER),
                        DescriptorType::StorageImage(_) => {
                            (RhiDescriptorType::UnorderedAccess, shifts::STORAGE)
                        }
                        _ => continue,
                    };
                    bindings.push(DescriptorBinding {
                        ty,
                        slot: raw_slot.saturating_sub(shift),
                        stages: stage_flags,
                    });
                }
                Variable::Input { location, ty, .. } => {
                    if self.stage != ShaderStage::Vertex {
                        continue;
                    }
                    let (format, size) = input_format(ty);
                    inputs.push(VertexInput { location: location.loc(), format, size });
                }
                _ => {}
            }
        }

        inputs.sort_by_key(|input| input.location);
        Ok((bindings, inputs))
    }

    /// The compiled module handle (null until compilation succeeds)
    pub(crate) fn module(&self) -> vk::ShaderModule {
        self.compiled
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|c| c.module))
            .unwrap_or(vk::ShaderModule::null())
    }

    /// Reflected vertex inputs (vertex shaders only)
    pub(crate) fn vertex_inputs(&self) -> Vec<VertexInput> {
        self.compiled
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|c| c.inputs.clone()))
            .unwrap_or_default()
    }
}

/// Map a reflected input type to a vertex attribute format.
/// The engine's vertex layouts are all 32-bit float scalars/vectors.
fn input_format(ty: &Type) -> (vk::Format, u32) {
    let nscalar = match ty {
        Type::Vector(vector_ty) => vector_ty.nscalar,
        _ => 1,
    };
    match nscalar {
        1 => (vk::Format::R32_SFLOAT, 4),
        2 => (vk::Format::R32G32_SFLOAT, 8),
        3 => (vk::Format::R32G32B32_SFLOAT, 12),
        _ => (vk::Format::R32G32B32A32_SFLOAT, 16),
    }
}

impl Shader for VulkanShader {
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
        self.compiled
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|c| c.bindings.clone()))
            .unwrap_or_default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.compiled.lock() {
            if let Some(compiled) = guard.take() {
                unsafe {
                    self.ctx.device.destroy_shader_module(compiled.module, None);
                }
            }
        }
    }
}
