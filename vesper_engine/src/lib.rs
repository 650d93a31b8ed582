/*!
# Vesper Engine

Core traits and types for the Vesper real-time rendering engine.

This crate provides the platform-agnostic Render Hardware Interface (RHI)
and the frame renderer built on top of it. Backend implementations (Vulkan,
Direct3D) live in separate crates and plug in through the `RhiDevice` trait
family; a headless null backend ships in-tree for tests and server use.

## Architecture

- **rhi**: device, textures, buffers, shaders, pipeline states, the command
  list state machine, pipeline/descriptor caches and the swap chain
- **renderer**: the per-frame pass graph (shadow maps, G-buffer, lighting,
  composition, post-processing, debug overlays), render options and the
  world contracts it consumes
*/

// Internal modules
pub mod error;
mod engine;
pub mod log;
pub mod rhi;
pub mod renderer;
pub mod resource;

// Main vesper namespace module
pub mod vesper {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine facade (logging)
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // RHI sub-module with all GPU abstraction types
    pub mod rhi {
        pub use crate::rhi::*;
    }

    // Renderer sub-module
    pub mod renderer {
        pub use crate::renderer::*;
    }

    // Resource collaborator contracts
    pub mod resource {
        pub use crate::resource::*;
    }
}

// Re-export math library at crate root
pub use glam;
