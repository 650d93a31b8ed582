/// Texture trait, descriptor, formats and image layouts

use std::any::Any;
use bitflags::bitflags;

/// Texture and render-target pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R11G11B10_FLOAT,
    R16_FLOAT,
    R16G16_FLOAT,
    R16G16B16A16_FLOAT,
    R32_FLOAT,
    R32G32_FLOAT,
    R32G32B32A32_FLOAT,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// True for depth (and depth/stencil) formats
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT)
    }

    /// True for formats carrying a stencil aspect
    pub fn has_stencil(&self) -> bool {
        matches!(self, TextureFormat::D24_UNORM_S8_UINT)
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Can be sampled in shaders
        const SAMPLED          = 1 << 0;
        /// Can be written from compute (storage image / UAV)
        const UNORDERED_ACCESS = 1 << 1;
        /// Can be bound as a color render target
        const RENDER_TARGET    = 1 << 2;
        /// Can be bound as a depth/stencil attachment
        const DEPTH_STENCIL    = 1 << 3;
    }
}

/// Explicit image layout / resource state.
///
/// Layouts are tracked per texture and must be transitioned through a
/// command list before the texture is used in an incompatible role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderRead,
    TransferSrc,
    TransferDst,
    Present,
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Number of array layers (shadow cascades, cube faces)
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// Debug name, also used for render-target bookkeeping
    pub name: String,
}

impl TextureDesc {
    /// A single-layer, single-mip 2D render target
    pub fn render_target(name: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        let usage = if format.is_depth() {
            TextureUsage::DEPTH_STENCIL | TextureUsage::SAMPLED
        } else {
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED
        };
        Self {
            width,
            height,
            array_layers: 1,
            mip_levels: 1,
            format,
            usage,
            name: name.to_string(),
        }
    }
}

/// Read-only properties of a created texture
#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

/// A viewport covering the full texture, used when building pipeline states
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { x: 0.0, y: 0.0, width, height, min_depth: 0.0, max_depth: 1.0 }
    }

    pub fn is_defined(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Texture resource trait
///
/// Implemented by backend-specific texture types. The texture owns its GPU
/// memory and is destroyed when the last `Arc` drops (backends wait for the
/// device to go idle before freeing).
pub trait Texture: Send + Sync {
    /// Unique id for binding deduplication and pipeline hashing
    fn id(&self) -> u64;

    /// Read-only properties
    fn info(&self) -> &TextureInfo;

    /// Current image layout
    fn layout(&self) -> ImageLayout;

    /// Record the layout after a transition was written into a command list.
    /// Internal — called by `CommandList::set_texture_layout`.
    fn record_layout(&self, layout: ImageLayout);

    /// A viewport covering the whole texture
    fn viewport(&self) -> Viewport {
        let info = self.info();
        Viewport::new(info.width as f32, info.height as f32)
    }

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}
