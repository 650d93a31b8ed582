/// Shader library - the renderer's named shader set plus the G-buffer
/// variation cache
///
/// Variations are owned by the renderer and keyed by the material's
/// texture-presence bitmask; the first material that needs a combination
/// kicks off its (asynchronous) compilation and the G-buffer pass picks the
/// variation up once it reports compiled.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::renderer::world::VariationFlags;
use crate::resource::ResourceProvider;
use crate::rhi::{RhiDevice, Shader, ShaderDesc, ShaderStage};

/// Logical ids of every engine shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderId {
    QuadV,
    DepthV,
    DepthP,
    GbufferV,
    SsaoP,
    SsrP,
    LightDirectionalP,
    LightPointP,
    LightSpotP,
    CompositionP,
    TextureP,
    TaaP,
    MotionBlurP,
    BloomLuminanceP,
    BloomBlendP,
    BlurGaussianP,
    BlurBilateralGaussianP,
    ToneMappingP,
    GammaCorrectionP,
    FxaaLuminanceP,
    FxaaP,
    DitheringP,
    ChromaticAberrationP,
    SharpenP,
    BrdfSpecularLutP,
    ColorV,
    ColorP,
    FontV,
    FontP,
    OutlineP,
}

impl ShaderId {
    /// Logical asset name and stage
    fn source_info(&self) -> (&'static str, ShaderStage) {
        match self {
            ShaderId::QuadV => ("quad_v", ShaderStage::Vertex),
            ShaderId::DepthV => ("depth_v", ShaderStage::Vertex),
            ShaderId::DepthP => ("depth_p", ShaderStage::Pixel),
            ShaderId::GbufferV => ("gbuffer_v", ShaderStage::Vertex),
            ShaderId::SsaoP => ("ssao_p", ShaderStage::Pixel),
            ShaderId::SsrP => ("ssr_p", ShaderStage::Pixel),
            ShaderId::LightDirectionalP => ("light_directional_p", ShaderStage::Pixel),
            ShaderId::LightPointP => ("light_point_p", ShaderStage::Pixel),
            ShaderId::LightSpotP => ("light_spot_p", ShaderStage::Pixel),
            ShaderId::CompositionP => ("composition_p", ShaderStage::Pixel),
            ShaderId::TextureP => ("texture_p", ShaderStage::Pixel),
            ShaderId::TaaP => ("taa_p", ShaderStage::Pixel),
            ShaderId::MotionBlurP => ("motion_blur_p", ShaderStage::Pixel),
            ShaderId::BloomLuminanceP => ("bloom_luminance_p", ShaderStage::Pixel),
            ShaderId::BloomBlendP => ("bloom_blend_p", ShaderStage::Pixel),
            ShaderId::BlurGaussianP => ("blur_gaussian_p", ShaderStage::Pixel),
            ShaderId::BlurBilateralGaussianP => ("blur_bilateral_gaussian_p", ShaderStage::Pixel),
            ShaderId::ToneMappingP => ("tone_mapping_p", ShaderStage::Pixel),
            ShaderId::GammaCorrectionP => ("gamma_correction_p", ShaderStage::Pixel),
            ShaderId::FxaaLuminanceP => ("fxaa_luminance_p", ShaderStage::Pixel),
            ShaderId::FxaaP => ("fxaa_p", ShaderStage::Pixel),
            ShaderId::DitheringP => ("dithering_p", ShaderStage::Pixel),
            ShaderId::ChromaticAberrationP => ("chromatic_aberration_p", ShaderStage::Pixel),
            ShaderId::SharpenP => ("sharpen_p", ShaderStage::Pixel),
            ShaderId::BrdfSpecularLutP => ("brdf_specular_lut_p", ShaderStage::Pixel),
            ShaderId::ColorV => ("color_v", ShaderStage::Vertex),
            ShaderId::ColorP => ("color_p", ShaderStage::Pixel),
            ShaderId::FontV => ("font_v", ShaderStage::Vertex),
            ShaderId::FontP => ("font_p", ShaderStage::Pixel),
            ShaderId::OutlineP => ("outline_p", ShaderStage::Pixel),
        }
    }

    const ALL: [ShaderId; 30] = [
        ShaderId::QuadV,
        ShaderId::DepthV,
        ShaderId::DepthP,
        ShaderId::GbufferV,
        ShaderId::SsaoP,
        ShaderId::SsrP,
        ShaderId::LightDirectionalP,
        ShaderId::LightPointP,
        ShaderId::LightSpotP,
        ShaderId::CompositionP,
        ShaderId::TextureP,
        ShaderId::TaaP,
        ShaderId::MotionBlurP,
        ShaderId::BloomLuminanceP,
        ShaderId::BloomBlendP,
        ShaderId::BlurGaussianP,
        ShaderId::BlurBilateralGaussianP,
        ShaderId::ToneMappingP,
        ShaderId::GammaCorrectionP,
        ShaderId::FxaaLuminanceP,
        ShaderId::FxaaP,
        ShaderId::DitheringP,
        ShaderId::ChromaticAberrationP,
        ShaderId::SharpenP,
        ShaderId::BrdfSpecularLutP,
        ShaderId::ColorV,
        ShaderId::ColorP,
        ShaderId::FontV,
        ShaderId::FontP,
        ShaderId::OutlineP,
    ];
}

pub struct ShaderLibrary {
    shaders: FxHashMap<ShaderId, Arc<dyn Shader>>,
    variations: FxHashMap<VariationFlags, Arc<dyn Shader>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self { shaders: FxHashMap::default(), variations: FxHashMap::default() }
    }

    /// Kick off compilation of every engine shader. Missing sources are
    /// logged and skipped — the dependent passes simply never run.
    pub fn create_all(&mut self, device: &dyn RhiDevice, resources: &dyn ResourceProvider) {
        for id in ShaderId::ALL {
            let (name, stage) = id.source_info();
            let source = match resources.shader_source(name) {
                Some(source) => source,
                None => {
                    crate::engine_warn!("vesper::ShaderLibrary", "Missing shader source '{}'", name);
                    continue;
                }
            };

            match device.create_shader(ShaderDesc::new(name, stage, source)) {
                Ok(shader) => {
                    self.shaders.insert(id, shader);
                }
                Err(err) => {
                    crate::engine_error!("vesper::ShaderLibrary", "Failed to create shader '{}': {}", name, err);
                }
            }
        }
    }

    pub fn get(&self, id: ShaderId) -> Option<&Arc<dyn Shader>> {
        self.shaders.get(&id)
    }

    /// The G-buffer pixel shader variation for a material bitmask, creating
    /// (and starting to compile) it on first use.
    pub fn gbuffer_variation(
        &mut self,
        device: &dyn RhiDevice,
        resources: &dyn ResourceProvider,
        flags: VariationFlags,
    ) -> Option<Arc<dyn Shader>> {
        if let Some(shader) = self.variations.get(&flags) {
            return Some(shader.clone());
        }

        let source = resources.shader_source("gbuffer_p")?;
        let mut desc = ShaderDesc::new("gbuffer_p", ShaderStage::Pixel, source);

        for (flag, define) in [
            (VariationFlags::ALBEDO, "HAS_ALBEDO"),
            (VariationFlags::ROUGHNESS, "HAS_ROUGHNESS"),
            (VariationFlags::METALLIC, "HAS_METALLIC"),
            (VariationFlags::NORMAL, "HAS_NORMAL"),
            (VariationFlags::HEIGHT, "HAS_HEIGHT"),
            (VariationFlags::OCCLUSION, "HAS_OCCLUSION"),
            (VariationFlags::EMISSION, "HAS_EMISSION"),
            (VariationFlags::MASK, "HAS_MASK"),
        ] {
            if flags.contains(flag) {
                desc = desc.with_define(define, "1");
            }
        }

        match device.create_shader(desc) {
            Ok(shader) => {
                crate::engine_debug!(
                    "vesper::ShaderLibrary",
                    "Compiling G-buffer variation {:#04x}",
                    flags.bits()
                );
                self.variations.insert(flags, shader.clone());
                Some(shader)
            }
            Err(err) => {
                crate::engine_error!("vesper::ShaderLibrary", "Failed to create G-buffer variation: {}", err);
                None
            }
        }
    }

    /// All created G-buffer variations with their bitmasks
    pub fn variations(&self) -> impl Iterator<Item = (&VariationFlags, &Arc<dyn Shader>)> {
        self.variations.iter()
    }

    pub fn variation_count(&self) -> usize {
        self.variations.len()
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "shader_library_tests.rs"]
mod tests;
