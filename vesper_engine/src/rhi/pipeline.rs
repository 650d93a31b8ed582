/// Pipeline state objects - the POD aggregate identifying a GPU pipeline

use std::any::Any;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use rustc_hash::FxHasher;

use crate::rhi::{Shader, Texture, Viewport};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    LineList,
    PointList,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Always,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Rasterizer fixed-function state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
    /// Clamp fragments beyond the far plane instead of clipping. Disabled
    /// clipping is what makes directional shadow "pancaking" work.
    pub depth_clip_enabled: bool,
    pub depth_bias: f32,
    pub depth_bias_slope_scaled: f32,
}

impl RasterizerState {
    pub const fn cull_back_solid() -> Self {
        Self {
            cull_mode: CullMode::Back,
            fill_mode: FillMode::Solid,
            depth_clip_enabled: true,
            depth_bias: 0.0,
            depth_bias_slope_scaled: 0.0,
        }
    }

    pub const fn cull_back_solid_no_clip() -> Self {
        Self { depth_clip_enabled: false, ..Self::cull_back_solid() }
    }

    pub const fn cull_back_wireframe() -> Self {
        Self { fill_mode: FillMode::Wireframe, ..Self::cull_back_solid() }
    }

    pub const fn cull_none_solid() -> Self {
        Self { cull_mode: CullMode::None, ..Self::cull_back_solid() }
    }

    fn hash_into(&self, hasher: &mut FxHasher) {
        self.cull_mode.hash(hasher);
        self.fill_mode.hash(hasher);
        self.depth_clip_enabled.hash(hasher);
        self.depth_bias.to_bits().hash(hasher);
        self.depth_bias_slope_scaled.to_bits().hash(hasher);
    }
}

/// Color blending state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_op: BlendOp,
}

impl BlendState {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }

    pub const fn alpha() -> Self {
        Self {
            enabled: true,
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            alpha_op: BlendOp::Add,
        }
    }

    pub const fn additive() -> Self {
        Self {
            enabled: true,
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::One,
            alpha_op: BlendOp::Add,
        }
    }
}

/// Depth/stencil testing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test_enabled: bool,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareOp,
    pub stencil_test_enabled: bool,
    pub stencil_write_enabled: bool,
}

impl DepthStencilState {
    /// Depth test on, depth write off (reading against a pre-pass)
    pub const fn enabled_read(compare: CompareOp) -> Self {
        Self {
            depth_test_enabled: true,
            depth_write_enabled: false,
            depth_compare: compare,
            stencil_test_enabled: false,
            stencil_write_enabled: false,
        }
    }

    /// Depth test and write on
    pub const fn enabled_write(compare: CompareOp) -> Self {
        Self { depth_write_enabled: true, ..Self::enabled_read(compare) }
    }

    /// Everything off (full-screen passes)
    pub const fn disabled() -> Self {
        Self {
            depth_test_enabled: false,
            depth_write_enabled: false,
            depth_compare: CompareOp::Always,
            stencil_test_enabled: false,
            stencil_write_enabled: false,
        }
    }

    /// Depth off, stencil read on (restricting full-screen passes to
    /// previously stenciled pixels)
    pub const fn stencil_read() -> Self {
        Self { stencil_test_enabled: true, ..Self::disabled() }
    }
}

/// Clear behavior for one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Keep the existing contents
    DontCare,
    /// Clear color attachments to RGBA
    Color([f32; 4]),
    /// Clear depth/stencil attachments
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    fn hash_into(&self, hasher: &mut FxHasher) {
        match self {
            ClearValue::DontCare => 0u8.hash(hasher),
            ClearValue::Color(rgba) => {
                1u8.hash(hasher);
                for c in rgba {
                    c.to_bits().hash(hasher);
                }
            }
            ClearValue::DepthStencil { depth, stencil } => {
                2u8.hash(hasher);
                depth.to_bits().hash(hasher);
                stencil.hash(hasher);
            }
        }
    }
}

/// Maximum simultaneous color render targets
pub const MAX_RENDER_TARGETS: usize = 8;

/// A scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// The POD aggregate identifying a GPU pipeline object.
///
/// Built fresh by every pass, memoized by content hash in `PipelineCache`.
#[derive(Clone, Default)]
pub struct PipelineState {
    pub shader_vertex: Option<Arc<dyn Shader>>,
    pub shader_pixel: Option<Arc<dyn Shader>>,

    pub rasterizer_state: Option<RasterizerState>,
    pub blend_state: Option<BlendState>,
    pub depth_stencil_state: Option<DepthStencilState>,

    pub render_target_color_textures: [Option<Arc<dyn Texture>>; MAX_RENDER_TARGETS],
    pub render_target_color_array_index: u32,
    pub render_target_depth_texture: Option<Arc<dyn Texture>>,
    pub render_target_depth_array_index: u32,
    /// Bind the depth target as read-only (stencil-gated full-screen passes)
    pub render_target_depth_read_only: bool,

    pub clear_color: [ClearValue; MAX_RENDER_TARGETS],
    pub clear_depth: ClearValue,

    pub viewport: Option<Viewport>,
    pub scissor: Option<ScissorRect>,
    pub vertex_buffer_stride: u32,
    pub primitive_topology: PrimitiveTopology,

    /// Slot promoted to a dynamic constant buffer (per-draw offsets)
    pub dynamic_constant_buffer_slot: Option<u32>,

    /// Pass name for profiling/debug markers
    pub pass_name: &'static str,
}

impl Default for PrimitiveTopology {
    fn default() -> Self {
        PrimitiveTopology::TriangleList
    }
}

impl Default for ClearValue {
    fn default() -> Self {
        ClearValue::DontCare
    }
}

impl PipelineState {
    pub fn new(pass_name: &'static str) -> Self {
        Self { pass_name, ..Self::default() }
    }

    /// A pipeline state is usable when it has a vertex shader and writes to
    /// at least one attachment.
    pub fn is_valid(&self) -> bool {
        if self.shader_vertex.is_none() {
            return false;
        }
        let has_color = self.render_target_color_textures.iter().any(|t| t.is_some());
        has_color || self.render_target_depth_texture.is_some()
    }

    /// True once every shader referenced by this state has finished
    /// compiling successfully.
    pub fn shaders_compiled(&self) -> bool {
        let vertex_ok = self.shader_vertex.as_ref().map_or(false, |s| s.is_compiled());
        let pixel_ok = self.shader_pixel.as_ref().map_or(true, |s| s.is_compiled());
        vertex_ok && pixel_ok
    }

    /// Combined hash of the two shader ids; keys the descriptor-set layout.
    pub fn shader_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        if let Some(shader) = &self.shader_vertex {
            shader.id().hash(&mut hasher);
        }
        if let Some(shader) = &self.shader_pixel {
            shader.id().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Content hash over every identity-relevant field; keys the pipeline
    /// cache. Floats are hashed through their bit patterns.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();

        self.shader_vertex.as_ref().map(|s| s.id()).hash(&mut hasher);
        self.shader_pixel.as_ref().map(|s| s.id()).hash(&mut hasher);

        if let Some(state) = &self.rasterizer_state {
            state.hash_into(&mut hasher);
        }
        self.blend_state.hash(&mut hasher);
        self.depth_stencil_state.hash(&mut hasher);

        for target in &self.render_target_color_textures {
            target.as_ref().map(|t| t.id()).hash(&mut hasher);
        }
        self.render_target_color_array_index.hash(&mut hasher);
        self.render_target_depth_texture.as_ref().map(|t| t.id()).hash(&mut hasher);
        self.render_target_depth_array_index.hash(&mut hasher);
        self.render_target_depth_read_only.hash(&mut hasher);

        for clear in &self.clear_color {
            clear.hash_into(&mut hasher);
        }
        self.clear_depth.hash_into(&mut hasher);

        if let Some(viewport) = &self.viewport {
            viewport.x.to_bits().hash(&mut hasher);
            viewport.y.to_bits().hash(&mut hasher);
            viewport.width.to_bits().hash(&mut hasher);
            viewport.height.to_bits().hash(&mut hasher);
        }
        self.scissor.hash(&mut hasher);
        self.vertex_buffer_stride.hash(&mut hasher);
        self.primitive_topology.hash(&mut hasher);
        self.dynamic_constant_buffer_slot.hash(&mut hasher);

        hasher.finish()
    }
}

/// Pipeline resource trait - an opaque backend pipeline object
pub trait Pipeline: Send + Sync {
    fn id(&self) -> u64;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
