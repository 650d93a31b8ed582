/// Render target registry
///
/// All intermediate textures of the frame live here, keyed by id. The
/// post-processing chain ping-pongs by swapping the shared handles of two
/// slots — pixel data is never copied.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::rhi::{RhiDevice, Texture, TextureDesc, TextureFormat};

/// Ids of every internal render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTargetId {
    GbufferAlbedo,
    GbufferNormal,
    GbufferMaterial,
    GbufferVelocity,
    GbufferDepth,
    BrdfSpecularLut,
    SsaoNoisy,
    Ssao,
    Ssr,
    LightDiffuse,
    LightSpecular,
    LightVolumetric,
    CompositionHdr,
    CompositionHdr2,
    CompositionLdr,
    CompositionLdr2,
    BloomLuminance,
    BloomBlur,
}

#[derive(Default)]
pub struct RenderTargets {
    map: FxHashMap<RenderTargetId, Arc<dyn Texture>>,
}

impl RenderTargets {
    /// (Re)create every render target at the given output resolution.
    /// Called at initialization and on every resolution change.
    pub fn create(device: &dyn RhiDevice, width: u32, height: u32) -> Result<Self> {
        use RenderTargetId::*;
        use TextureFormat::*;

        let mut map: FxHashMap<RenderTargetId, Arc<dyn Texture>> = FxHashMap::default();

        let mut make = |map: &mut FxHashMap<RenderTargetId, Arc<dyn Texture>>,
                        id: RenderTargetId,
                        name: &str,
                        w: u32,
                        h: u32,
                        format: TextureFormat|
         -> Result<()> {
            let texture = device.create_texture(&TextureDesc::render_target(name, w, h, format))?;
            map.insert(id, texture);
            Ok(())
        };

        // G-buffer
        make(&mut map, GbufferAlbedo, "gbuffer_albedo", width, height, R8G8B8A8_UNORM)?;
        make(&mut map, GbufferNormal, "gbuffer_normal", width, height, R16G16B16A16_FLOAT)?;
        make(&mut map, GbufferMaterial, "gbuffer_material", width, height, R8G8B8A8_UNORM)?;
        make(&mut map, GbufferVelocity, "gbuffer_velocity", width, height, R16G16_FLOAT)?;
        make(&mut map, GbufferDepth, "gbuffer_depth", width, height, D32_FLOAT)?;

        // BRDF specular LUT (fixed size, baked once)
        make(&mut map, BrdfSpecularLut, "brdf_specular_lut", 512, 512, R16G16_FLOAT)?;

        // Screen-space effects
        make(&mut map, SsaoNoisy, "ssao_noisy", width, height, R8_UNORM)?;
        make(&mut map, Ssao, "ssao", width, height, R8_UNORM)?;
        make(&mut map, Ssr, "ssr", width, height, R16G16B16A16_FLOAT)?;

        // Light accumulation
        make(&mut map, LightDiffuse, "light_diffuse", width, height, R11G11B10_FLOAT)?;
        make(&mut map, LightSpecular, "light_specular", width, height, R11G11B10_FLOAT)?;
        make(&mut map, LightVolumetric, "light_volumetric", width, height, R11G11B10_FLOAT)?;

        // Composition (HDR ping-pong pair, LDR ping-pong pair)
        make(&mut map, CompositionHdr, "composition_hdr", width, height, R16G16B16A16_FLOAT)?;
        make(&mut map, CompositionHdr2, "composition_hdr_2", width, height, R16G16B16A16_FLOAT)?;
        make(&mut map, CompositionLdr, "composition_ldr", width, height, R8G8B8A8_UNORM)?;
        make(&mut map, CompositionLdr2, "composition_ldr_2", width, height, R8G8B8A8_UNORM)?;

        // Bloom works at half resolution
        let half_w = (width / 2).max(1);
        let half_h = (height / 2).max(1);
        make(&mut map, BloomLuminance, "bloom_luminance", half_w, half_h, R16G16B16A16_FLOAT)?;
        make(&mut map, BloomBlur, "bloom_blur", half_w, half_h, R16G16B16A16_FLOAT)?;

        Ok(Self { map })
    }

    pub fn get(&self, id: RenderTargetId) -> Option<Arc<dyn Texture>> {
        self.map.get(&id).cloned()
    }

    /// Replace a slot's texture (environment prefilter, external injection)
    pub fn set(&mut self, id: RenderTargetId, texture: Arc<dyn Texture>) {
        self.map.insert(id, texture);
    }

    /// Ping-pong: swap the handles of two slots without copying pixels
    pub fn swap(&mut self, a: RenderTargetId, b: RenderTargetId) {
        if a == b {
            return;
        }
        let ta = self.map.get(&a).cloned();
        let tb = self.map.get(&b).cloned();
        if let (Some(ta), Some(tb)) = (ta, tb) {
            self.map.insert(a, tb);
            self.map.insert(b, ta);
        }
    }
}
