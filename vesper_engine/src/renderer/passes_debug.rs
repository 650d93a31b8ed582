/// Debug and editor overlay passes
///
/// Everything here draws on top of the final LDR composition: selection
/// outline, world-space line lists (grid, AABBs, light ranges, picking ray,
/// transform axes), light icons, the debug-buffer visualization and the
/// performance-metrics text.

use glam::{Vec2, Vec3, Vec4};

use crate::error::Result;
use crate::renderer::options::Options;
use crate::renderer::renderer::{LineVertex, ObjectType, QuadVertex, Renderer};
use crate::renderer::shader_library::ShaderId;
use crate::renderer::targets::RenderTargetId;
use crate::renderer::world::LightType;
use crate::rhi::{
    next_capacity, BlendState, Buffer, ClearValue, CommandList, DepthStencilState, PipelineState,
    PrimitiveTopology, RasterizerState,
};

use std::sync::Arc;

/// Pixel cell of one glyph in the monospace font atlas (16 columns x 6 rows,
/// ASCII 32..127)
const GLYPH_WIDTH: f32 = 8.0;
const GLYPH_HEIGHT: f32 = 16.0;
const ATLAS_COLUMNS: u32 = 16;
const ATLAS_ROWS: u32 = 6;

impl Renderer {
    /// Selection outline: redraw the selected renderable with a flat color,
    /// alpha-blended over the composition
    pub(crate) fn pass_outline(&mut self, cmd: &mut CommandList) {
        if !self.option_enabled(Options::DEBUG_SELECTION_OUTLINE) {
            return;
        }
        let selected = match self.selected_entity {
            Some(key) => key,
            None => return,
        };
        let item = match self.draw_item(selected) {
            Some(item) => item,
            None => return,
        };

        let shader_v = match self.shaders.get(ShaderId::DepthV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::OutlineP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let tex_out = match self.targets.get(RenderTargetId::CompositionLdr) {
            Some(texture) => texture,
            None => return,
        };

        let mut pso = PipelineState::new("Pass_Outline");
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::alpha());
        pso.depth_stencil_state = Some(DepthStencilState::disabled());
        pso.vertex_buffer_stride = 20;
        pso.render_target_color_textures[0] = Some(tex_out.clone());
        pso.clear_color[0] = ClearValue::DontCare;
        pso.viewport = Some(tex_out.viewport());
        pso.dynamic_constant_buffer_slot = Some(crate::renderer::renderer::SLOT_OBJECT);

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);

            // Outline color rides in the uber material slot
            self.buffer_uber.cpu.mat_albedo = Vec4::new(1.0, 0.6, 0.0, 0.4);
            self.update_uber_buffer();

            cmd.set_buffer_vertex(&item.geometry.vertex_buffer);
            cmd.set_buffer_index(&item.geometry.index_buffer);

            // Slightly inflated so the silhouette peeks out
            let inflated = item.transform
                * glam::Mat4::from_scale(Vec3::splat(1.02));
            self.buffer_object.cpu.object = self.buffer_frame.cpu.view_projection * inflated;
            if self.update_object_buffer(cmd, 0) {
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

    /// Transform gizmo: feed the axis lines of the selected entity into the
    /// no-depth line list, drawn by the following line pass
    pub(crate) fn pass_transform_gizmo(&mut self) {
        if !self.option_enabled(Options::DEBUG_TRANSFORM) {
            return;
        }
        let selected = match self.selected_entity {
            Some(key) => key,
            None => return,
        };
        let position = match self.world().get(selected) {
            Some(entity) => entity.position(),
            None => return,
        };

        let length = 1.0;
        self.draw_line(position, position + Vec3::X * length, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(1.0, 0.0, 0.0, 1.0), false);
        self.draw_line(position, position + Vec3::Y * length, Vec4::new(0.0, 1.0, 0.0, 1.0), Vec4::new(0.0, 1.0, 0.0, 1.0), false);
        self.draw_line(position, position + Vec3::Z * length, Vec4::new(0.0, 0.0, 1.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 1.0), false);
    }

    /// World-space line overlays: grid, AABBs, light ranges, picking ray and
    /// whatever the application queued through `draw_line`
    pub(crate) fn pass_lines(&mut self, cmd: &mut CommandList) {
        self.collect_debug_lines();

        let count_depth = self.lines_depth_enabled.len();
        let count_no_depth = self.lines_depth_disabled.len();
        if count_depth + count_no_depth == 0 {
            return;
        }

        if self.upload_lines().is_err() {
            self.lines_depth_enabled.clear();
            self.lines_depth_disabled.clear();
            return;
        }

        let shader_v = match self.shaders.get(ShaderId::ColorV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(ShaderId::ColorP) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let tex_out = match self.targets.get(RenderTargetId::CompositionLdr) {
            Some(texture) => texture,
            None => return,
        };
        let tex_depth = self.targets.get(RenderTargetId::GbufferDepth);

        // Depth-tested lines
        if count_depth > 0 {
            let mut pso = PipelineState::new("Pass_Lines");
            pso.shader_vertex = Some(shader_v.clone());
            pso.shader_pixel = Some(shader_p.clone());
            pso.rasterizer_state = Some(RasterizerState::cull_none_solid());
            pso.blend_state = Some(BlendState::alpha());
            pso.depth_stencil_state = Some(DepthStencilState::enabled_read(self.depth_compare()));
            pso.vertex_buffer_stride = std::mem::size_of::<LineVertex>() as u32;
            pso.render_target_color_textures[0] = Some(tex_out.clone());
            pso.clear_color[0] = ClearValue::DontCare;
            pso.render_target_depth_texture = tex_depth.clone();
            pso.render_target_depth_read_only = true;
            pso.clear_depth = ClearValue::DontCare;
            pso.viewport = Some(tex_out.viewport());
            pso.primitive_topology = PrimitiveTopology::LineList;

            if self.cmd_begin(cmd, &pso) {
                self.bind_globals(cmd);
                let lines = self.vertex_buffer_lines.clone();
                cmd.set_buffer_vertex(&lines);
                cmd.draw_offset(count_depth as u32, 0);
                cmd.end();
                cmd.submit();
            }
        }

        // Lines that render over everything
        if count_no_depth > 0 {
            let mut pso = PipelineState::new("Pass_Lines_No_Depth");
            pso.shader_vertex = Some(shader_v);
            pso.shader_pixel = Some(shader_p);
            pso.rasterizer_state = Some(RasterizerState::cull_none_solid());
            pso.blend_state = Some(BlendState::alpha());
            pso.depth_stencil_state = Some(DepthStencilState::disabled());
            pso.vertex_buffer_stride = std::mem::size_of::<LineVertex>() as u32;
            pso.render_target_color_textures[0] = Some(tex_out.clone());
            pso.clear_color[0] = ClearValue::DontCare;
            pso.viewport = Some(tex_out.viewport());
            pso.primitive_topology = PrimitiveTopology::LineList;

            if self.cmd_begin(cmd, &pso) {
                self.bind_globals(cmd);
                let lines = self.vertex_buffer_lines.clone();
                cmd.set_buffer_vertex(&lines);
                cmd.draw_offset(count_no_depth as u32, count_depth as u32);
                cmd.end();
                cmd.submit();
            }
        }

        self.lines_depth_enabled.clear();
        self.lines_depth_disabled.clear();
    }

    fn collect_debug_lines(&mut self) {
        if self.option_enabled(Options::DEBUG_GRID) {
            let half = 20;
            let step = 1.0;
            let extent = half as f32 * step;
            let color = Vec4::new(1.0, 1.0, 1.0, 0.15);
            for i in -half..=half {
                let offset = i as f32 * step;
                self.draw_line(
                    Vec3::new(offset, 0.0, -extent),
                    Vec3::new(offset, 0.0, extent),
                    color,
                    color,
                    true,
                );
                self.draw_line(
                    Vec3::new(-extent, 0.0, offset),
                    Vec3::new(extent, 0.0, offset),
                    color,
                    color,
                    true,
                );
            }
        }

        if self.option_enabled(Options::DEBUG_AABB) {
            let color = Vec4::new(0.41, 0.86, 1.0, 1.0);
            for bucket in [ObjectType::Opaque, ObjectType::Transparent] {
                for &key in &self.entities(bucket).to_vec() {
                    if let Some(item) = self.draw_item(key) {
                        self.draw_box(&item.world_aabb, color, true);
                    }
                }
            }
        }

        if self.option_enabled(Options::DEBUG_LIGHTS) {
            let color = Vec4::new(1.0, 1.0, 0.0, 0.5);
            for &key in &self.entities(ObjectType::Light).to_vec() {
                if let Some(light) = self.light_draw(key) {
                    if light.light_type != LightType::Directional {
                        let extent = Vec3::splat(light.range);
                        let aabb = crate::renderer::world::Aabb::new(
                            light.position - extent,
                            light.position + extent,
                        );
                        self.draw_box(&aabb, color, true);
                    }
                }
            }
        }

        if self.option_enabled(Options::DEBUG_PICKING_RAY) {
            if let Some(camera) = self.camera {
                let color = Vec4::new(0.0, 1.0, 0.0, 1.0);
                self.draw_line(
                    camera.position,
                    camera.position + camera.forward * camera.far,
                    color,
                    color,
                    true,
                );
            }
        }
    }

    /// Upload both line lists into the shared vertex buffer (depth-tested
    /// first), growing it by doubling when needed
    fn upload_lines(&mut self) -> Result<()> {
        let total = (self.lines_depth_enabled.len() + self.lines_depth_disabled.len()) as u32;

        if total > self.vertex_buffer_lines.element_count() {
            let new_count = next_capacity(self.vertex_buffer_lines.element_count(), total);
            self.vertex_buffer_lines.reallocate(new_count)?;
        }

        let depth_bytes: &[u8] = bytemuck::cast_slice(&self.lines_depth_enabled);
        let no_depth_bytes: &[u8] = bytemuck::cast_slice(&self.lines_depth_disabled);
        self.vertex_buffer_lines.map_write(0, &mut |dst| {
            dst[..depth_bytes.len()].copy_from_slice(depth_bytes);
            dst[depth_bytes.len()..depth_bytes.len() + no_depth_bytes.len()]
                .copy_from_slice(no_depth_bytes);
        })
    }

    /// Billboard icons for lights, drawn in screen space
    pub(crate) fn pass_icons(&mut self, cmd: &mut CommandList) {
        if !self.option_enabled(Options::DEBUG_LIGHTS) {
            return;
        }
        let camera = match self.camera {
            Some(camera) => camera,
            None => return,
        };
        let icon = match self.resources.texture("icon_light") {
            Some(texture) => texture,
            None => return,
        };

        let (width, height) = self.resolution;
        let resolution = Vec2::new(width as f32, height as f32);
        let view_projection = camera.view_projection();

        // Project each light to screen pixels
        let mut sprites: Vec<QuadVertex> = Vec::new();
        for &key in &self.entities(ObjectType::Light).to_vec() {
            let position = match self.world().get(key) {
                Some(entity) => entity.position(),
                None => continue,
            };
            let clip = view_projection * position.extend(1.0);
            if clip.w <= 0.0 {
                continue;
            }
            let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);
            let screen = (ndc * Vec2::new(0.5, -0.5) + Vec2::splat(0.5)) * resolution;

            let size = 32.0;
            push_sprite(&mut sprites, screen - Vec2::splat(size * 0.5), Vec2::splat(size), Vec2::ZERO, Vec2::ONE);
        }

        if sprites.is_empty() {
            return;
        }

        self.draw_sprites(cmd, &sprites, ShaderId::TextureP, Some(icon), "Pass_Gizmos_Lights");
    }

    /// Full-screen visualization of an internal buffer. An unset selection
    /// is a successful no-op.
    pub(crate) fn pass_debug_buffer(&mut self, cmd: &mut CommandList) {
        let target = match self.debug_buffer.target() {
            Some(target) => target,
            None => return,
        };

        self.pass_simple(cmd, ShaderId::TextureP, target, RenderTargetId::CompositionLdr, "Pass_DebugBuffer");
    }

    /// FPS / frame-time text drawn from a monospace font atlas.
    /// Skipped (recoverable) when the resource provider has no atlas.
    pub(crate) fn pass_performance_metrics(&mut self, cmd: &mut CommandList) {
        if !self.option_enabled(Options::DEBUG_PERFORMANCE_METRICS) {
            return;
        }
        let atlas = match self.resources.texture("font_atlas") {
            Some(texture) => texture,
            None => return,
        };

        let metrics = self.metrics();
        let text = format!("FPS: {:.1}\nFrame: {:.2} ms", metrics.fps, metrics.frame_time_ms);

        let mut sprites: Vec<QuadVertex> = Vec::new();
        let origin = Vec2::new(16.0, 16.0);
        let mut pen = origin;
        for ch in text.chars() {
            if ch == '\n' {
                pen.x = origin.x;
                pen.y += GLYPH_HEIGHT;
                continue;
            }
            let code = ch as u32;
            if !(32..127).contains(&code) {
                pen.x += GLYPH_WIDTH;
                continue;
            }
            let cell = code - 32;
            let uv_cell = Vec2::new(
                (cell % ATLAS_COLUMNS) as f32 / ATLAS_COLUMNS as f32,
                (cell / ATLAS_COLUMNS) as f32 / ATLAS_ROWS as f32,
            );
            let uv_size = Vec2::new(1.0 / ATLAS_COLUMNS as f32, 1.0 / ATLAS_ROWS as f32);
            push_sprite(&mut sprites, pen, Vec2::new(GLYPH_WIDTH, GLYPH_HEIGHT), uv_cell, uv_size);
            pen.x += GLYPH_WIDTH;
        }

        if sprites.is_empty() {
            return;
        }

        self.draw_sprites(cmd, &sprites, ShaderId::FontP, Some(atlas), "Pass_PerformanceMetrics");
    }

    /// Upload screen-space quads and draw them with the font vertex shader
    /// (which consumes pixel coordinates against the ortho projection)
    fn draw_sprites(
        &mut self,
        cmd: &mut CommandList,
        sprites: &[QuadVertex],
        pixel_shader: ShaderId,
        texture: Option<Arc<dyn crate::rhi::Texture>>,
        pass_name: &'static str,
    ) {
        let shader_v = match self.shaders.get(ShaderId::FontV) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let shader_p = match self.shaders.get(pixel_shader) {
            Some(shader) => shader.clone(),
            None => return,
        };
        let tex_out = match self.targets.get(RenderTargetId::CompositionLdr) {
            Some(texture) => texture,
            None => return,
        };

        let count = sprites.len() as u32;
        if count > self.vertex_buffer_sprites.element_count() {
            let new_count = next_capacity(self.vertex_buffer_sprites.element_count(), count);
            if self.vertex_buffer_sprites.reallocate(new_count).is_err() {
                return;
            }
        }
        let bytes: &[u8] = bytemuck::cast_slice(sprites);
        if self
            .vertex_buffer_sprites
            .map_write(0, &mut |dst| dst[..bytes.len()].copy_from_slice(bytes))
            .is_err()
        {
            return;
        }

        let mut pso = PipelineState::new(pass_name);
        pso.shader_vertex = Some(shader_v);
        pso.shader_pixel = Some(shader_p);
        pso.rasterizer_state = Some(RasterizerState::cull_none_solid());
        pso.blend_state = Some(BlendState::alpha());
        pso.depth_stencil_state = Some(DepthStencilState::disabled());
        pso.vertex_buffer_stride = std::mem::size_of::<QuadVertex>() as u32;
        pso.render_target_color_textures[0] = Some(tex_out.clone());
        pso.clear_color[0] = ClearValue::DontCare;
        pso.viewport = Some(tex_out.viewport());

        if self.cmd_begin(cmd, &pso) {
            self.bind_globals(cmd);
            let vertex_buffer = self.vertex_buffer_sprites.clone();
            cmd.set_buffer_vertex(&vertex_buffer);
            if let Some(texture) = &texture {
                cmd.set_texture(28, texture);
            }
            cmd.draw(count);
            cmd.end();
            cmd.submit();
        }
    }
}

/// Append the two triangles of a screen-space quad (pixel coordinates)
fn push_sprite(sprites: &mut Vec<QuadVertex>, top_left: Vec2, size: Vec2, uv: Vec2, uv_size: Vec2) {
    let p0 = top_left;
    let p1 = top_left + Vec2::new(size.x, 0.0);
    let p2 = top_left + size;
    let p3 = top_left + Vec2::new(0.0, size.y);

    let t0 = uv;
    let t1 = uv + Vec2::new(uv_size.x, 0.0);
    let t2 = uv + uv_size;
    let t3 = uv + Vec2::new(0.0, uv_size.y);

    let vertex = |p: Vec2, t: Vec2| QuadVertex { position: [p.x, p.y, 0.0], uv: [t.x, t.y] };

    sprites.extend_from_slice(&[
        vertex(p0, t0),
        vertex(p1, t1),
        vertex(p2, t2),
        vertex(p0, t0),
        vertex(p2, t2),
        vertex(p3, t3),
    ]);
}
