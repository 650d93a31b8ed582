/// Renderer module - the frame pass graph and everything it consumes

// Module declarations
pub mod options;
pub mod world;
pub mod sort;
pub mod frame_constants;
pub mod shader_library;
pub mod targets;
pub mod renderer;
mod passes;
mod passes_post;
mod passes_debug;

// Re-exports
pub use options::*;
pub use world::*;
pub use sort::{pack_draw_key, sort_renderables};
pub use frame_constants::*;
pub use shader_library::{ShaderId, ShaderLibrary};
pub use targets::{RenderTargetId, RenderTargets};
pub use renderer::*;
