/// The frame pass graph - geometry, lighting and composition
///
/// Every pass follows the same shape: acquire shaders (skip the pass this
/// frame if still compiling), build a pipeline state, and only run the body
/// when `begin` succeeds. Recoverable failures never abort the frame.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::renderer::frame_constants::LightConstants;
use crate::renderer::renderer::{ObjectType, Renderer, SLOT_LIGHT};
use crate::renderer::shader_library::ShaderId;
use crate::renderer::targets::RenderTargetId;
use crate::renderer::world::{Aabb, EntityKey, Geometry, LightType, Material, MaterialTexture, ShadowMap};
use crate::rhi::{
    BlendState, ClearValue, CommandList, DepthStencilState, PipelineState, PrimitiveTopology,
    RasterizerState, Texture,
};

/// Snapshot of a renderable taken out of the world so pass bodies can borrow
/// the renderer mutably while iterating
pub(crate) struct DrawItem {
    pub transform: Mat4,
    pub geometry: Geometry,
    pub material: Arc<Material>,
    pub cast_shadows: bool,
    pub world_aabb: Aabb,
}

/// Snapshot of a light with its per-slice shadow matrices precomputed
pub(crate) struct LightDraw {
    pub light_type: LightType,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    pub angle: f32,
    pub bias: f32,
    pub normal_bias: f32,
    pub shadows_enabled: bool,
    pub shadows_transparent_enabled: bool,
    pub shadows_screen_space_enabled: bool,
    pub volumetric_enabled: bool,
    pub shadow_map: Option<ShadowMap>,
    pub position: Vec3,
    pub direction: Vec3,
    pub view_projections: Vec<Mat4>,
}

impl LightDraw {
    pub fn is_in_view(&self, aabb: &Aabb) -> bool {
        match self.light_type {
            LightType::Directional => true,
            LightType::Point | LightType::Spot => {
                let closest = aabb.center().distance(self.position);
                let radius = aabb.extent().length() * 0.5;
                closest - radius <= self.range
            }
        }
    }
}

impl Renderer {
    pub(crate) fn draw_item(&self, key: EntityKey) -> Option<DrawItem> {
        let entity = self.world().get(key)?;
        let renderable = entity.renderable.as_ref()?;
        Some(DrawItem {
            transform: entity.transform,
            geometry: renderable.geometry.clone(),
            material: renderable.material.clone(),
            cast_shadows: renderable.cast_shadows,
            world_aabb: renderable.geometry.aabb.transformed(&entity.transform),
        })
    }

    pub(crate) fn light_draw(&self, key: EntityKey) -> Option<LightDraw> {
        let entity = self.world().get(key)?;
        let light = entity.light.as_ref()?;
        let position = entity.position();
        let direction = entity.forward();

        let view_projections = (0..light.shadow_array_size())
            .map(|slice| {
                light.projection_matrix(slice) * light.view_matrix(slice, position, direction)
            })
            .collect();

        Some(LightDraw {
            light_type: light.light_type,
            color: light.color,
            intensity: light.intensity,
            range: light.range,
            angle: light.angle,
            bias: light.bias,
            normal_bias: light.normal_bias,
            shadows_enabled: light.shadows_enabled,
            shadows_transparent_enabled: light.shadows_transparent_enabled,
            shadows_screen_space_enabled: light.shadows_screen_space_enabled,
            volumetric_enabled: light.volumetric_enabled,
            shadow_map: light.shadow_map().cloned(),
            position,
            direction,
            view_projections,
        })
    }

    /// The deterministic per-frame pass sequence
    pub(crate) fn pass_main(&mut self, cmd: &mut CommandList) {
        self.update_frame_buffer();

        // Runs only once
        self.pass_brdf_specular_lut(cmd);

        let draw_transparent = !self.entities(ObjectType::Transparent).is_empty();

        // Depth
        {
            self.pass_light_depth(cmd, ObjectType::Opaque);
            if draw_transparent {
                self.pass_light_depth(cmd, ObjectType::Transparent);
            }

            if self.option_enabled(crate::renderer::options::Options::DEPTH_PREPASS) {
                self.pass_depth_prepass(cmd);
            }
        }

        // G-buffer to composition
        {
            self.pass_gbuffer(cmd, ObjectType::Opaque);
            self.pass_ssao(cmd, false);
            self.pass_ssr(cmd, false);
            self.pass_light(cmd, false);
            self.pass_composition(cmd, RenderTargetId::CompositionHdr, false);

            if draw_transparent {
                self.pass_gbuffer(cmd, ObjectType::Transparent);
                self.pass_ssao(cmd, true);
                self.pass_ssr(cmd, true);
                self.pass_light(cmd, true);
                self.pass_composition(cmd, RenderTargetId::CompositionHdr2, true);

                // Alpha blend the transparent composition over the opaque one
                self.pass_alpha_blend(
                    cmd,
                    RenderTargetId::CompositionHdr2,
                    RenderTargetId::CompositionHdr,
                    true,
                );
            }
        }

        // Post-processing and overlays
        {
            self.pass_post_process(cmd);
            self.pass_outline(cmd);
            self.pass_transform_gizmo();
            self.pass_lines(cmd);
            self.pass_icons(cmd);
            self.pass_debug_buffer(cmd);
            self.pass_performance_metrics(cmd);
        }
    }

    /// Shadow maps: opaque occluders write depth from each light's view;
    /// transparent occluders write color (not depth) in a second pass for
    /// lights that cast transparent shadows.
    pub(crate) fn pass_light_depth(&mut self, cmd: &mut CommandList, object_type: ObjectType) {
        let shader_v = match self.shaders.get(ShaderId::DepthV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = self.shaders.get(ShaderId::DepthP).cloned();

        let transparent_pass = object_type == ObjectType::Transparent;
        if transparent_pass && shader_p.is_none() {
            return;
        }

        let entities = self.entities(object_type).to_vec();
        if entities.is_empty() {
            return;
        }

        let lights = self.entities(ObjectType::Light).to_vec();
        for light_key in lights {
            let light = match self.light_draw(light_key) {
                Some(light) => light,
                None => continue,
            };

            if !light.shadows_enabled {
                continue;
            }
            if transparent_pass && !light.shadows_transparent_enabled {
                continue;
            }
            let shadow_map = match &light.shadow_map {
                Some(map) => map.clone(),
                None => continue,
            };

            let array_size = shadow_map.depth.info().array_layers;
            for array_index in 0..array_size {
                let mut pso = PipelineState::new(if transparent_pass {
                    "Pass_LightShadowTransparent"
                } else {
                    "Pass_LightShadow"
                });
                pso.shader_vertex = Some(shader_v.clone());
                pso.shader_pixel = if transparent_pass { shader_p.clone() } else { None };
                pso.blend_state = Some(if transparent_pass { BlendState::alpha() } else { BlendState::disabled() });
                pso.depth_stencil_state = Some(if transparent_pass {
                    DepthStencilState::enabled_read(self.depth_compare())
                } else {
                    DepthStencilState::enabled_write(self.depth_compare())
                });
                // Always bind the color target and clear it to white (no
                // shadow tint), so it holds a valid value even when no
                // transparent occluders end up drawn
                if let Some(color) = &shadow_map.color {
                    pso.render_target_color_textures[0] = Some(color.clone());
                    pso.clear_color[0] = ClearValue::Color([1.0, 1.0, 1.0, 1.0]);
                }
                pso.render_target_depth_texture = Some(shadow_map.depth.clone());
                pso.render_target_color_array_index = array_index;
                pso.render_target_depth_array_index = array_index;
                pso.clear_depth = if transparent_pass {
                    ClearValue::DontCare
                } else {
                    ClearValue::DepthStencil { depth: self.clear_depth_value(), stencil: 0 }
                };
                pso.viewport = Some(shadow_map.depth.viewport());
                pso.vertex_buffer_stride = 20;
                pso.primitive_topology = PrimitiveTopology::TriangleList;
                pso.dynamic_constant_buffer_slot = Some(crate::renderer::renderer::SLOT_OBJECT);

                // Directional lights "pancake" casters behind the view point
                // by clamping instead of clipping
                pso.rasterizer_state = Some(if light.light_type == LightType::Directional {
                    RasterizerState::cull_back_solid_no_clip()
                } else {
                    RasterizerState::cull_back_solid()
                });

                let view_projection = light.view_projections[array_index as usize];

                if self.cmd_begin(cmd, &pso) {
                    self.bind_globals(cmd);

                    let mut bound_material_id = 0u64;
                    for (entity_index, &entity_key) in entities.iter().enumerate() {
                        let item = match self.draw_item(entity_key) {
                            Some(item) => item,
                            None => continue,
                        };

                        if !item.cast_shadows {
                            continue;
                        }
                        if !light.is_in_view(&item.world_aabb) {
                            continue;
                        }

                        // Bind material
                        if bound_material_id != item.material.id() {
                            let albedo = item
                                .material
                                .texture(MaterialTexture::Albedo)
                                .cloned()
                                .unwrap_or_else(|| self.tex_white.clone());
                            cmd.set_texture(28, &albedo);

                            self.buffer_uber.cpu.mat_albedo = item.material.color_albedo;
                            self.buffer_uber.cpu.mat_tiling_uv = item.material.tiling_uv;
                            self.buffer_uber.cpu.mat_offset_uv = item.material.offset_uv;
                            self.update_uber_buffer();

                            bound_material_id = item.material.id();
                        }

                        cmd.set_buffer_index(&item.geometry.index_buffer);
                        cmd.set_buffer_vertex(&item.geometry.vertex_buffer);

                        self.buffer_object.cpu.object = view_projection * item.transform;
                        if !self.update_object_buffer(cmd, entity_index as u32) {
                            continue;
                        }

                        cmd.draw_indexed(
                            item.geometry.index_count,
                            item.geometry.index_offset,
                            item.geometry.vertex_offset,
                        );
                    }
                    cmd.end();
                    cmd.submit();
                }
            }
        }
    }

    /// Optional full-resolution opaque depth pre-pass
    pub(crate) fn pass_depth_prepass(&mut self, cmd: &mut CommandList) {
        let shader_v = match self.shaders.get(ShaderId::DepthV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let tex_depth = match self.targets.get(RenderTargetId::GbufferDepth) {
            Some(texture) => texture,
            None => return,
        };

        let mut pso = PipelineState::new("Pass_DepthPrePass");
        pso.shader_vertex = Some(shader_v);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::disabled());
        pso.depth_stencil_state = Some(DepthStencilState::enabled_write(self.depth_compare()));
        pso.render_target_depth_texture = Some(tex_depth.clone());
        pso.clear_depth = ClearValue::DepthStencil { depth: self.clear_depth_value(), stencil: 0 };
        pso.viewport = Some(tex_depth.viewport());
        pso.vertex_buffer_stride = 20;
        pso.dynamic_constant_buffer_slot = Some(crate::renderer::renderer::SLOT_OBJECT);

        let camera = match self.camera {
            Some(camera) => camera,
            None => return,
        };
        let entities = self.entities(ObjectType::Opaque).to_vec();

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let mut bound_geometry_id = 0u64;
            for (entity_index, &entity_key) in entities.iter().enumerate() {
                let item = match self.draw_item(entity_key) {
                    Some(item) => item,
                    None => continue,
                };

                if !camera.is_in_view_frustum(&item.world_aabb) {
                    continue;
                }

                if bound_geometry_id != item.geometry.vertex_buffer.id() {
                    cmd.set_buffer_index(&item.geometry.index_buffer);
                    cmd.set_buffer_vertex(&item.geometry.vertex_buffer);
                    bound_geometry_id = item.geometry.vertex_buffer.id();
                }

                self.buffer_object.cpu.object =
                    self.buffer_frame.cpu.view_projection * item.transform;
                if !self.update_object_buffer(cmd, entity_index as u32) {
                    continue;
                }

                cmd.draw_indexed(
                    item.geometry.index_count,
                    item.geometry.index_offset,
                    item.geometry.vertex_offset,
                );
            }
            cmd.end();
            cmd.submit();
        }
    }

    /// G-buffer fill: albedo, normal, material, velocity + depth, using the
    /// shader variation matching each material's texture bitmask
    pub(crate) fn pass_gbuffer(&mut self, cmd: &mut CommandList, object_type: ObjectType) {
        let shader_v = match self.shaders.get(ShaderId::GbufferV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() {
            return;
        }

        let tex_albedo = match self.targets.get(RenderTargetId::GbufferAlbedo) {
            Some(texture) => texture,
            None => return,
        };
        let tex_normal = self.targets.get(RenderTargetId::GbufferNormal);
        let tex_material = self.targets.get(RenderTargetId::GbufferMaterial);
        let tex_velocity = self.targets.get(RenderTargetId::GbufferVelocity);
        let tex_depth = self.targets.get(RenderTargetId::GbufferDepth);

        let is_transparent = object_type == ObjectType::Transparent;
        let entities = self.entities(object_type).to_vec();

        // Make sure a variation exists (and is compiling) for every material
        // in this class
        for &entity_key in &entities {
            if let Some(item) = self.draw_item(entity_key) {
                let flags = item.material.variation_flags();
                let device = self.device.clone();
                let resources = self.resources.clone();
                self.shaders.gbuffer_variation(device.as_ref(), resources.as_ref(), flags);
            }
        }

        let camera = match self.camera {
            Some(camera) => camera,
            None => return,
        };

        let dont_clear_color = is_transparent;
        let wireframe = self.option_enabled(crate::renderer::options::Options::DEBUG_WIREFRAME);

        let mut pso = PipelineState::new("Pass_GBuffer");
        pso.shader_vertex = Some(shader_v);
        pso.vertex_buffer_stride = 20;
        pso.blend_state = Some(BlendState::disabled());
        pso.rasterizer_state = Some(if wireframe {
            RasterizerState::cull_back_wireframe()
        } else {
            RasterizerState::cull_back_solid()
        });
        pso.depth_stencil_state = Some(if is_transparent {
            DepthStencilState {
                stencil_test_enabled: true,
                stencil_write_enabled: true,
                ..DepthStencilState::enabled_write(self.depth_compare())
            }
        } else {
            DepthStencilState::enabled_write(self.depth_compare())
        });
        pso.render_target_color_textures[0] = Some(tex_albedo.clone());
        pso.render_target_color_textures[1] = tex_normal;
        pso.render_target_color_textures[2] = tex_material;
        pso.render_target_color_textures[3] = tex_velocity;
        for slot in 0..4 {
            pso.clear_color[slot] = if dont_clear_color {
                ClearValue::DontCare
            } else {
                ClearValue::Color([0.0, 0.0, 0.0, 0.0])
            };
        }
        pso.render_target_depth_texture = tex_depth;
        pso.clear_depth = if is_transparent
            || self.option_enabled(crate::renderer::options::Options::DEPTH_PREPASS)
        {
            ClearValue::DontCare
        } else {
            ClearValue::DepthStencil { depth: self.clear_depth_value(), stencil: 0 }
        };
        pso.viewport = Some(tex_albedo.viewport());
        pso.dynamic_constant_buffer_slot = Some(crate::renderer::renderer::SLOT_OBJECT);

        // Clear once up front; the per-variation passes leave attachments
        // intact
        cmd.clear(&pso);
        for slot in 0..4 {
            pso.clear_color[slot] = ClearValue::DontCare;
        }
        pso.clear_depth = ClearValue::DontCare;

        // One pass per compiled shader variation
        let variations: Vec<_> = self
            .shaders
            .variations()
            .map(|(flags, shader)| (*flags, shader.clone()))
            .collect();

        let mut bound_material_id = 0u64;
        for (flags, shader_p) in variations {
            if !shader_p.is_compiled() {
                continue;
            }

            // Nothing in this class uses the variation: skip the empty pass
            let any_match = entities.iter().any(|&key| {
                self.draw_item(key)
                    .map(|item| item.material.variation_flags() == flags)
                    .unwrap_or(false)
            });
            if !any_match {
                continue;
            }

            pso.shader_pixel = Some(shader_p.clone());

            if self.cmd_begin(cmd, &pso) {
                self.bind_globals(cmd);

                for (entity_index, &entity_key) in entities.iter().enumerate() {
                    let item = match self.draw_item(entity_key) {
                        Some(item) => item,
                        None => continue,
                    };

                    // Fully invisible transparent surfaces contribute nothing
                    if is_transparent && item.material.color_albedo.w == 0.0 {
                        continue;
                    }

                    // Draw the entities matching this variation
                    if item.material.variation_flags() != flags {
                        continue;
                    }

                    if !camera.is_in_view_frustum(&item.world_aabb) {
                        continue;
                    }

                    cmd.set_buffer_index(&item.geometry.index_buffer);
                    cmd.set_buffer_vertex(&item.geometry.vertex_buffer);

                    if bound_material_id != item.material.id() {
                        self.bind_material_textures(cmd, &item.material);

                        self.buffer_uber.cpu.mat_albedo = item.material.color_albedo;
                        self.buffer_uber.cpu.mat_tiling_uv = item.material.tiling_uv;
                        self.buffer_uber.cpu.mat_offset_uv = item.material.offset_uv;
                        self.buffer_uber.cpu.mat_roughness_mul = item.material.roughness_multiplier;
                        self.buffer_uber.cpu.mat_metallic_mul = item.material.metallic_multiplier;
                        self.buffer_uber.cpu.mat_normal_mul = item.material.normal_multiplier;
                        self.buffer_uber.cpu.mat_height_mul = item.material.height_multiplier;
                        self.update_uber_buffer();

                        bound_material_id = item.material.id();
                    }

                    let wvp_current = self.buffer_frame.cpu.view_projection * item.transform;
                    let wvp_previous =
                        self.prev_wvp.get(&entity_key).copied().unwrap_or(wvp_current);

                    self.buffer_object.cpu.object = item.transform;
                    self.buffer_object.cpu.wvp_current = wvp_current;
                    self.buffer_object.cpu.wvp_previous = wvp_previous;

                    // Save for next frame's velocity computation
                    self.prev_wvp.insert(entity_key, wvp_current);

                    if !self.update_object_buffer(cmd, entity_index as u32) {
                        continue;
                    }

                    cmd.draw_indexed(
                        item.geometry.index_count,
                        item.geometry.index_offset,
                        item.geometry.vertex_offset,
                    );
                }
                cmd.end();
                cmd.submit();
            }
        }
    }

    fn bind_material_textures(&self, cmd: &mut CommandList, material: &Material) {
        let slots = [
            (0, MaterialTexture::Albedo),
            (1, MaterialTexture::Roughness),
            (2, MaterialTexture::Metallic),
            (3, MaterialTexture::Normal),
            (4, MaterialTexture::Height),
            (5, MaterialTexture::Occlusion),
            (6, MaterialTexture::Emission),
            (7, MaterialTexture::Mask),
        ];
        for (slot, kind) in slots {
            let texture = material.texture(kind).cloned().unwrap_or_else(|| self.tex_white.clone());
            cmd.set_texture(slot, &texture);
        }
    }

    /// Screen-space ambient occlusion + bilateral blur
    pub(crate) fn pass_ssao(&mut self, cmd: &mut CommandList, use_stencil: bool) {
        if !self.option_enabled(crate::renderer::options::Options::SSAO) {
            return;
        }

        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::SsaoP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() || !shader_p.is_compiled() {
            return;
        }

        let tex_ssao_noisy = match self.targets.get(RenderTargetId::SsaoNoisy) {
            Some(texture) => texture,
            None => return,
        };
        let tex_ssao_blurred = match self.targets.get(RenderTargetId::Ssao) {
            Some(texture) => texture,
            None => return,
        };
        let tex_depth = self.targets.get(RenderTargetId::GbufferDepth);

        let mut pso = PipelineState::new("Pass_Ssao");
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
        pso.render_target_color_textures[0] = Some(if use_stencil {
            tex_ssao_blurred.clone()
        } else {
            tex_ssao_noisy.clone()
        });
        pso.clear_color[0] = if use_stencil {
            ClearValue::DontCare
        } else {
            ClearValue::Color([1.0, 1.0, 1.0, 1.0])
        };
        pso.render_target_depth_texture = if use_stencil { tex_depth } else { None };
        pso.render_target_depth_read_only = use_stencil;
        pso.viewport = Some(tex_ssao_noisy.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let info = tex_ssao_noisy.info();
            self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
            self.update_uber_buffer();

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            if let Some(depth) = self.targets.get(RenderTargetId::GbufferDepth) {
                cmd.set_texture(12, &depth);
            }
            if let Some(normal) = self.targets.get(RenderTargetId::GbufferNormal) {
                cmd.set_texture(9, &normal);
            }
            let noise = self.tex_noise_normal.clone();
            cmd.set_texture(21, &noise);
            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();

            // Bilateral blur into the final SSAO target
            let sigma = 2.0;
            let pixel_stride = 2.0;
            let (blur_in, blur_out) = if use_stencil {
                (RenderTargetId::Ssao, RenderTargetId::SsaoNoisy)
            } else {
                (RenderTargetId::SsaoNoisy, RenderTargetId::Ssao)
            };
            self.pass_blur_bilateral_gaussian(cmd, blur_in, blur_out, sigma, pixel_stride, use_stencil);
        }
    }

    /// Screen-space reflections
    pub(crate) fn pass_ssr(&mut self, cmd: &mut CommandList, use_stencil: bool) {
        if !self.option_enabled(crate::renderer::options::Options::SSR) {
            return;
        }

        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::SsrP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() || !shader_p.is_compiled() {
            return;
        }

        let tex_ssr = match self.targets.get(RenderTargetId::Ssr) {
            Some(texture) => texture,
            None => return,
        };
        let tex_depth = self.targets.get(RenderTargetId::GbufferDepth);

        let mut pso = PipelineState::new("Pass_Ssr");
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
        pso.render_target_color_textures[0] = Some(tex_ssr.clone());
        pso.clear_color[0] = if use_stencil {
            ClearValue::DontCare
        } else {
            ClearValue::Color([0.0, 0.0, 0.0, 0.0])
        };
        pso.render_target_depth_texture = if use_stencil { tex_depth } else { None };
        pso.render_target_depth_read_only = use_stencil;
        pso.viewport = Some(tex_ssr.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let info = tex_ssr.info();
            self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
            self.update_uber_buffer();

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            if let Some(normal) = self.targets.get(RenderTargetId::GbufferNormal) {
                cmd.set_texture(9, &normal);
            }
            if let Some(depth) = self.targets.get(RenderTargetId::GbufferDepth) {
                cmd.set_texture(12, &depth);
            }
            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();
        }
    }

    /// Deferred lighting accumulation, one pass per light type
    pub(crate) fn pass_light(&mut self, cmd: &mut CommandList, use_stencil: bool) {
        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_directional = match self.shaders.get(ShaderId::LightDirectionalP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_point = match self.shaders.get(ShaderId::LightPointP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_spot = match self.shaders.get(ShaderId::LightSpotP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled()
            || !shader_directional.is_compiled()
            || !shader_point.is_compiled()
            || !shader_spot.is_compiled()
        {
            return;
        }

        let tex_diffuse = match self.targets.get(RenderTargetId::LightDiffuse) {
            Some(texture) => texture,
            None => return,
        };
        let tex_specular = self.targets.get(RenderTargetId::LightSpecular);
        let tex_volumetric = self.targets.get(RenderTargetId::LightVolumetric);
        let tex_depth = self.targets.get(RenderTargetId::GbufferDepth);

        let info = tex_diffuse.info();
        self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
        self.update_uber_buffer();

        let mut pso = PipelineState::new("Pass_Light");
        pso.shader_vertex = Some(shader_v);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::additive());
        pso.depth_stencil_state = Some(if use_stencil {
            DepthStencilState::stencil_read()
        } else {
            DepthStencilState::disabled()
        });
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_diffuse.clone());
        pso.clear_color[0] = ClearValue::Color([0.0, 0.0, 0.0, 0.0]);
        pso.render_target_color_textures[1] = tex_specular;
        pso.clear_color[1] = ClearValue::Color([0.0, 0.0, 0.0, 0.0]);
        pso.render_target_color_textures[2] = tex_volumetric;
        pso.clear_color[2] = ClearValue::Color([0.0, 0.0, 0.0, 0.0]);
        pso.render_target_depth_texture = if use_stencil { tex_depth } else { None };
        pso.render_target_depth_read_only = use_stencil;
        pso.viewport = Some(tex_diffuse.viewport());

        for (object_type, shader_p) in [
            (ObjectType::LightDirectional, shader_directional),
            (ObjectType::LightPoint, shader_point),
            (ObjectType::LightSpot, shader_spot),
        ] {
            let lights = self.entities(object_type).to_vec();
            if lights.is_empty() {
                continue;
            }

            pso.shader_pixel = Some(shader_p.clone());

            if self.cmd_begin(cmd, &pso) {
                self.bind_globals(cmd);

                let quad_vb = self.quad.vertex_buffer.clone();
                let quad_ib = self.quad.index_buffer.clone();
                cmd.set_buffer_vertex(&quad_vb);
                cmd.set_buffer_index(&quad_ib);

                self.bind_gbuffer_and_effects(cmd);

                for light_key in lights {
                    let light = match self.light_draw(light_key) {
                        Some(light) => light,
                        None => continue,
                    };

                    self.fill_light_constants(&light);
                    self.update_light_buffer();
                    cmd.set_constant_buffer(
                        SLOT_LIGHT,
                        crate::rhi::ShaderStageFlags::PIXEL,
                        self.buffer_light.gpu(),
                    );

                    if light.shadows_enabled {
                        if let Some(shadow_map) = &light.shadow_map {
                            let tex_color = if light.shadows_transparent_enabled {
                                shadow_map.color.clone().unwrap_or_else(|| self.tex_white.clone())
                            } else {
                                self.tex_white.clone()
                            };
                            let (slot_depth, slot_color) = match light.light_type {
                                LightType::Directional => (13, 14),
                                LightType::Point => (15, 16),
                                LightType::Spot => (17, 18),
                            };
                            cmd.set_texture(slot_depth, &shadow_map.depth);
                            cmd.set_texture(slot_color, &tex_color);
                        }
                    }

                    cmd.draw_indexed(self.quad.index_count, 0, 0);
                }

                cmd.end();
                cmd.submit();
            }
        }
    }

    fn bind_gbuffer_and_effects(&mut self, cmd: &mut CommandList) {
        if let Some(albedo) = self.targets.get(RenderTargetId::GbufferAlbedo) {
            cmd.set_texture(8, &albedo);
        }
        if let Some(normal) = self.targets.get(RenderTargetId::GbufferNormal) {
            cmd.set_texture(9, &normal);
        }
        if let Some(material) = self.targets.get(RenderTargetId::GbufferMaterial) {
            cmd.set_texture(10, &material);
        }
        if let Some(depth) = self.targets.get(RenderTargetId::GbufferDepth) {
            cmd.set_texture(12, &depth);
        }

        let ssao = if self.option_enabled(crate::renderer::options::Options::SSAO) {
            self.targets.get(RenderTargetId::Ssao).unwrap_or_else(|| self.tex_white.clone())
        } else {
            self.tex_white.clone()
        };
        cmd.set_texture(22, &ssao);

        let ssr = if self.option_enabled(crate::renderer::options::Options::SSR) {
            self.targets.get(RenderTargetId::Ssr).unwrap_or_else(|| self.tex_black.clone())
        } else {
            self.tex_black.clone()
        };
        cmd.set_texture(26, &ssr);

        // Previous frame before post-processing
        if let Some(previous) = self.targets.get(RenderTargetId::CompositionHdr2) {
            cmd.set_texture(27, &previous);
        }
    }

    fn fill_light_constants(&mut self, light: &LightDraw) {
        let contact_shadows =
            self.option_enabled(crate::renderer::options::Options::SCREEN_SPACE_SHADOWS);
        let volumetric =
            self.option_enabled(crate::renderer::options::Options::VOLUMETRIC_LIGHTING);
        let reverse_z = self.option_enabled(crate::renderer::options::Options::REVERSE_Z);

        let constants = &mut self.buffer_light.cpu;
        *constants = LightConstants::default();
        for (slice, vp) in light.view_projections.iter().enumerate().take(6) {
            constants.view_projection[slice] = *vp;
        }
        constants.intensity_range_angle_bias = Vec4::new(
            light.intensity,
            light.range,
            light.angle,
            if reverse_z { light.bias } else { -light.bias },
        );
        constants.normal_bias_shadow_volumetric_contact = Vec4::new(
            light.normal_bias,
            if light.shadows_enabled { 1.0 } else { 0.0 },
            if contact_shadows && light.shadows_screen_space_enabled { 1.0 } else { 0.0 },
            if volumetric && light.volumetric_enabled { 1.0 } else { 0.0 },
        );
        constants.color = Vec4::new(
            light.color.x,
            light.color.y,
            light.color.z,
            if light.shadows_transparent_enabled { 1.0 } else { 0.0 },
        );
        constants.position = light.position.extend(1.0);
        constants.direction = light.direction.extend(0.0);
    }

    /// Combine G-buffer, light accumulation and environment into `target`
    pub(crate) fn pass_composition(
        &mut self,
        cmd: &mut CommandList,
        target: RenderTargetId,
        use_stencil: bool,
    ) {
        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::CompositionP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        if !shader_v.is_compiled() || !shader_p.is_compiled() {
            return;
        }

        let tex_out = match self.targets.get(target) {
            Some(texture) => texture,
            None => return,
        };
        let tex_depth = self.targets.get(RenderTargetId::GbufferDepth);

        let mut pso = PipelineState::new("Pass_Composition");
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.depth_stencil_state = Some(if use_stencil {
            DepthStencilState::stencil_read()
        } else {
            DepthStencilState::disabled()
        });
        pso.blend_state = Some(BlendState::disabled());
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_out.clone());
        pso.clear_color[0] = ClearValue::Color([0.0, 0.0, 0.0, 0.0]);
        pso.render_target_depth_texture = if use_stencil { tex_depth } else { None };
        pso.render_target_depth_read_only = use_stencil;
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

            self.bind_gbuffer_and_effects(cmd);

            if let Some(diffuse) = self.targets.get(RenderTargetId::LightDiffuse) {
                cmd.set_texture(23, &diffuse);
            }
            if let Some(specular) = self.targets.get(RenderTargetId::LightSpecular) {
                cmd.set_texture(24, &specular);
            }
            let volumetric = if self.option_enabled(crate::renderer::options::Options::VOLUMETRIC_LIGHTING) {
                self.targets.get(RenderTargetId::LightVolumetric).unwrap_or_else(|| self.tex_black.clone())
            } else {
                self.tex_black.clone()
            };
            cmd.set_texture(25, &volumetric);
            if let Some(lut) = self.targets.get(RenderTargetId::BrdfSpecularLut) {
                cmd.set_texture(19, &lut);
            }
            let environment = self.environment_texture();
            cmd.set_texture(20, &environment);

            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();
        }
    }

    /// Alpha blend `source` over `target` (transparent composition over
    /// opaque)
    pub(crate) fn pass_alpha_blend(
        &mut self,
        cmd: &mut CommandList,
        source: RenderTargetId,
        target: RenderTargetId,
        use_stencil: bool,
    ) {
        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::TextureP) {
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

        let info = tex_out.info();
        self.buffer_uber.cpu.resolution = Vec2::new(info.width as f32, info.height as f32);
        self.update_uber_buffer();

        let mut pso = PipelineState::new("Pass_AlphaBlend");
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::alpha());
        pso.depth_stencil_state = Some(if use_stencil {
            DepthStencilState::stencil_read()
        } else {
            DepthStencilState::disabled()
        });
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_out.clone());
        pso.clear_color[0] = if use_stencil { ClearValue::DontCare } else { ClearValue::Color([0.0; 4]) };
        pso.render_target_depth_texture = if use_stencil { tex_depth } else { None };
        pso.render_target_depth_read_only = use_stencil;
        pso.viewport = Some(tex_out.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            cmd.set_texture(28, &tex_in);
            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();
        }
    }

    /// Copy the final LDR composition into the current back buffer and hand
    /// the image over to presentation
    pub(crate) fn pass_copy_to_backbuffer(&mut self, cmd: &mut CommandList) {
        let shader_v = match self.shaders.get(ShaderId::QuadV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::TextureP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let tex_in = match self.targets.get(RenderTargetId::CompositionLdr) {
            Some(texture) => texture,
            None => return,
        };
        let backbuffer = match self.swap_chain.backbuffer() {
            Some(texture) => texture,
            None => return,
        };

        if self
            .swap_chain
            .set_layout(crate::rhi::ImageLayout::ColorAttachment, cmd)
            .is_err()
        {
            return;
        }

        let mut pso = PipelineState::new("Pass_CopyToBackbuffer");
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::disabled());
        pso.depth_stencil_state = Some(DepthStencilState::disabled());
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(backbuffer);
        pso.clear_color[0] = ClearValue::Color([0.0, 0.0, 0.0, 1.0]);
        pso.viewport = Some(tex_in.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            let quad_vb = self.quad.vertex_buffer.clone();
            let quad_ib = self.quad.index_buffer.clone();
            cmd.set_buffer_vertex(&quad_vb);
            cmd.set_buffer_index(&quad_ib);
            cmd.set_texture(28, &tex_in);
            cmd.draw_indexed(self.quad.index_count, 0, 0);
            cmd.end();
            cmd.submit();
        }

        let _ = self.swap_chain.set_layout(crate::rhi::ImageLayout::Present, cmd);
    }
}
