/// Resource collaborator contract
///
/// The renderer requests assets (shader bytecode, textures) by logical name
/// and never owns asset lifetime; the application supplies an implementation
/// backed by its own asset pipeline.

use std::path::Path;
use std::sync::Arc;

use crate::rhi::{ShaderSource, Texture};

pub trait ResourceProvider: Send + Sync {
    /// Root directory for engine data
    fn data_dir(&self) -> &Path;

    /// Shader payload for a logical shader name ("quad_v", "ssao_p", ...).
    /// `None` means the asset is missing; the dependent pass is skipped.
    fn shader_source(&self, name: &str) -> Option<ShaderSource>;

    /// Texture asset by logical name (noise textures, icons, font atlas).
    fn texture(&self, name: &str) -> Option<Arc<dyn Texture>>;
}
