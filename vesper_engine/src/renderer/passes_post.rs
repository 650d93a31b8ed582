/// Post-processing chain and full-screen helpers
///
/// Stages ping-pong between two HDR (then two LDR) texture slots by swapping
/// the shared handles in the target registry; disabled stages pass through.

use glam::Vec2;

use crate::renderer::renderer::Renderer;
use crate::renderer::shader_library::ShaderId;
use crate::renderer::targets::RenderTargetId;
use crate::rhi::{
    BlendState, ClearValue, CommandList, DepthStencilState, PipelineState, RasterizerState,
};

impl Renderer {
    /// Bake the BRDF specular LUT. Runs exactly once, gated by a latch.
    pub(crate) fn pass_brdf_specular_lut(&mut self, cmd: &mut CommandList) {
        if self.brdf_lut_rendered {
            return;
        }

        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::BrdfSpecularLutP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() || !shader_p.is_compiled() {
            return;
        }

        let tex_lut = match self.targets.get(RenderTargetId::BrdfSpecularLut) {
            Some(texture) => texture,
            None => return,
        };

        let mut pso = PipelineState::new("Pass_BrdfSpecularLut");
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::disabled());
        pso.depth_stencil_state = Some(DepthStencilState::disabled());
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_lut.clone());
        pso.clear_color[0] = ClearValue::Color([0.0; 4]);
        pso.viewport = Some(tex_lut.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let info = tex_lut.info();
            self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
            self.update_uber_buffer();

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();

            self.brdf_lut_rendered = true;
        }
    }

    /// The post-processing chain:
    /// HDR: TAA -> motion blur -> bloom; tone-map (or copy) to LDR;
    /// LDR: dithering -> FXAA -> sharpening -> chromatic aberration -> gamma
    pub(crate) fn pass_post_process(&mut self, cmd: &mut CommandList) {
        use crate::renderer::options::Options;
        use RenderTargetId::{CompositionHdr, CompositionHdr2, CompositionLdr, CompositionLdr2};

        // TAA
        if self.option_enabled(Options::TAA) {
            self.pass_simple(cmd, ShaderId::TaaP, CompositionHdr, CompositionHdr2, "Pass_Taa");
            self.targets.swap(CompositionHdr, CompositionHdr2);
        }

        // Motion blur
        if self.option_enabled(Options::MOTION_BLUR) {
            self.pass_simple(cmd, ShaderId::MotionBlurP, CompositionHdr, CompositionHdr2, "Pass_MotionBlur");
            self.targets.swap(CompositionHdr, CompositionHdr2);
        }

        // Bloom
        if self.option_enabled(Options::BLOOM) {
            self.pass_bloom(cmd);
        }

        // Tone-mapping (HDR -> LDR), or a straight copy when disabled
        if self.option_value(crate::renderer::options::OptionValue::Tonemapping) != 0.0 {
            self.pass_simple(cmd, ShaderId::ToneMappingP, CompositionHdr, CompositionLdr, "Pass_ToneMapping");
        } else {
            self.pass_simple(cmd, ShaderId::TextureP, CompositionHdr, CompositionLdr, "Pass_Copy");
        }

        // Dithering
        if self.option_enabled(Options::DITHERING) {
            self.pass_simple(cmd, ShaderId::DitheringP, CompositionLdr, CompositionLdr2, "Pass_Dithering");
            self.targets.swap(CompositionLdr, CompositionLdr2);
        }

        // FXAA (luminance prepass feeds the FXAA resolve)
        if self.option_enabled(Options::FXAA) {
            self.pass_simple(cmd, ShaderId::FxaaLuminanceP, CompositionLdr, CompositionLdr2, "Pass_FXAA_Luminance");
            self.pass_simple(cmd, ShaderId::FxaaP, CompositionLdr2, CompositionLdr, "Pass_FXAA");
        }

        // Sharpening
        if self.option_enabled(Options::SHARPENING) {
            self.pass_simple(cmd, ShaderId::SharpenP, CompositionLdr, CompositionLdr2, "Pass_LumaSharpen");
            self.targets.swap(CompositionLdr, CompositionLdr2);
        }

        // Chromatic aberration
        if self.option_enabled(Options::CHROMATIC_ABERRATION) {
            self.pass_simple(
                cmd,
                ShaderId::ChromaticAberrationP,
                CompositionLdr,
                CompositionLdr2,
                "Pass_ChromaticAberration",
            );
            self.targets.swap(CompositionLdr, CompositionLdr2);
        }

        // Gamma correction always runs last
        self.pass_simple(cmd, ShaderId::GammaCorrectionP, CompositionLdr, CompositionLdr2, "Pass_GammaCorrection");
        self.targets.swap(CompositionLdr, CompositionLdr2);
    }

    /// Bloom: bright-pass the HDR image at half resolution, blur it, then
    /// additively blend it back
    fn pass_bloom(&mut self, cmd: &mut CommandList) {
        use RenderTargetId::{BloomBlur, BloomLuminance, CompositionHdr, CompositionHdr2};

        // Bright areas only
        self.pass_simple(cmd, ShaderId::BloomLuminanceP, CompositionHdr, BloomLuminance, "Pass_Bloom_Luminance");

        // Separable gaussian blur
        self.pass_blur_gaussian(cmd, BloomLuminance, BloomBlur, 2.0, 1.0);

        // Additive blend over the scene
        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::BloomBlendP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() || !shader_p.is_compiled() {
            return;
        }
        let tex_bloom = match self.targets.get(BloomLuminance) {
            Some(texture) => texture,
            None => return,
        };
        let tex_in = match self.targets.get(CompositionHdr) {
            Some(texture) => texture,
            None => return,
        };
        let tex_out = match self.targets.get(CompositionHdr2) {
            Some(texture) => texture,
            None => return,
        };

        let mut pso = PipelineState::new("Pass_Bloom_Additive_Blending");
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::disabled());
        pso.depth_stencil_state = Some(DepthStencilState::disabled());
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_out.clone());
        pso.clear_color[0] = ClearValue::Color([0.0; 4]);
        pso.viewport = Some(tex_out.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let info = tex_out.info();
            self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
            self.update_uber_buffer();

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            cmd.set_texture(28, &tex_in);
            cmd.set_texture(29, &tex_bloom);
            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();

            self.targets.swap(CompositionHdr, CompositionHdr2);
        }
    }

    /// A one-input full-screen pass: sample `source` at slot 28, write
    /// `target`
    pub(crate) fn pass_simple(
        &mut self,
        cmd: &mut CommandList,
        pixel_shader: ShaderId,
        source: RenderTargetId,
        target: RenderTargetId,
        pass_name: &'static str,
    ) {
        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(pixel_shader) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() || !shader_p.is_compiled() {
            return;
        }

        let tex_in = match self.targets.get(source) {
            Some(texture) => texture,
            None => return,
        };
        let tex_out = match self.targets.get(target) {
            Some(texture) => texture,
            None => return,
        };

        let mut pso = PipelineState::new(pass_name);
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::disabled());
        pso.depth_stencil_state = Some(DepthStencilState::disabled());
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_out.clone());
        pso.clear_color[0] = ClearValue::Color([0.0; 4]);
        pso.viewport = Some(tex_out.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let info = tex_out.info();
            self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
            self.update_uber_buffer();

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            cmd.set_texture(28, &tex_in);

            // TAA and motion blur read history and velocity
            if pixel_shader == ShaderId::TaaP {
                if let Some(history) = self.targets.get(RenderTargetId::CompositionHdr2) {
                    cmd.set_texture(27, &history);
                }
                if let Some(velocity) = self.targets.get(RenderTargetId::GbufferVelocity) {
                    cmd.set_texture(11, &velocity);
                }
                if let Some(depth) = self.targets.get(RenderTargetId::GbufferDepth) {
                    cmd.set_texture(12, &depth);
                }
            }
            if pixel_shader == ShaderId::MotionBlurP {
                if let Some(velocity) = self.targets.get(RenderTargetId::GbufferVelocity) {
                    cmd.set_texture(11, &velocity);
                }
                if let Some(depth) = self.targets.get(RenderTargetId::GbufferDepth) {
                    cmd.set_texture(12, &depth);
                }
            }

            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();
        }
    }

    /// Separable gaussian blur: horizontal into `scratch`, vertical back into
    /// `source`, so the blurred result ends up where the input came from.
    /// The two textures must match in size and format.
    pub(crate) fn pass_blur_gaussian(
        &mut self,
        cmd: &mut CommandList,
        source: RenderTargetId,
        scratch: RenderTargetId,
        sigma: f32,
        pixel_stride: f32,
    ) {
        let (tex_in, tex_out) = match (self.targets.get(source), self.targets.get(scratch)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        {
            let a = tex_in.info();
            let b = tex_out.info();
            if a.width != b.width || a.height != b.height || a.format != b.format {
                crate::engine_error!(
                    "vesper::Renderer",
                    "Blur textures must match because they get swapped"
                );
                return;
            }
        }

        self.blur_direction_pass(cmd, ShaderId::BlurGaussianP, source, scratch, sigma, Vec2::new(pixel_stride, 0.0), false, "Pass_BlurGaussian_Horizontal");
        self.blur_direction_pass(cmd, ShaderId::BlurGaussianP, scratch, source, sigma, Vec2::new(0.0, pixel_stride), false, "Pass_BlurGaussian_Vertical");
    }

    /// Depth-aware (bilateral) separable blur; used by SSAO
    pub(crate) fn pass_blur_bilateral_gaussian(
        &mut self,
        cmd: &mut CommandList,
        source: RenderTargetId,
        scratch: RenderTargetId,
        sigma: f32,
        pixel_stride: f32,
        use_stencil: bool,
    ) {
        let (tex_in, tex_out) = match (self.targets.get(source), self.targets.get(scratch)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        {
            let a = tex_in.info();
            let b = tex_out.info();
            if a.width != b.width || a.height != b.height || a.format != b.format {
                crate::engine_error!(
                    "vesper::Renderer",
                    "Blur textures must match because they get swapped"
                );
                return;
            }
        }

        self.blur_direction_pass(cmd, ShaderId::BlurBilateralGaussianP, source, scratch, sigma, Vec2::new(pixel_stride, 0.0), use_stencil, "Pass_BlurBilateralGaussian_Horizontal");
        self.blur_direction_pass(cmd, ShaderId::BlurBilateralGaussianP, scratch, source, sigma, Vec2::new(0.0, pixel_stride), use_stencil, "Pass_BlurBilateralGaussian_Vertical");
    }

    #[allow(clippy::too_many_arguments)]
    fn blur_direction_pass(
        &mut self,
        cmd: &mut CommandList,
        pixel_shader: ShaderId,
        source: RenderTargetId,
        target: RenderTargetId,
        sigma: f32,
        direction: Vec2,
        use_stencil: bool,
        pass_name: &'static str,
    ) {
        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(pixel_shader) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() || !shader_p.is_compiled() {
            return;
        }

        let tex_in = match self.targets.get(source) {
            Some(texture) => texture,
            None => return,
        };
        let tex_out = match self.targets.get(target) {
            Some(texture) => texture,
            None => return,
        };
        let tex_depth = self.targets.get(RenderTargetId::GbufferDepth);

        let mut pso = PipelineState::new(pass_name);
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::disabled());
        pso.depth_stencil_state = Some(if use_stencil {
            DepthStencilState::stencil_read()
        } else {
            DepthStencilState::disabled()
        });
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_out.clone());
        pso.render_target_depth_texture = if use_stencil { tex_depth } else { None };
        pso.render_target_depth_read_only = use_stencil;
        pso.viewport = Some(tex_out.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let info = tex_in.info();
            self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
            self.buffer_uber.cpu.blur_direction = direction;
            self.buffer_uber.cpu.blur_sigma = sigma;
            self.update_uber_buffer();

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            cmd.set_texture(28, &tex_in);
            if pixel_shader == ShaderId::BlurBilateralGaussianP {
                if let Some(depth) = self.targets.get(RenderTargetId::GbufferDepth) {
                    cmd.set_texture(12, &depth);
                }
                if let Some(normal) = self.targets.get(RenderTargetId::GbufferNormal) {
                    cmd.set_texture(9, &normal);
                }
            }
            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();
        }
    }
}
