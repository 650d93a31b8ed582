/// Renderer - owns the frame state and drives the pass graph
///
/// One instance per output. Construction is fatal on device or swap-chain
/// failure; per-frame problems (missing camera, empty world, shaders still
/// compiling) skip the affected work and try again next frame.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use winit::window::Window;

use crate::error::{Error, Result};
use crate::renderer::frame_constants::{
    ConstantBufferSet, FrameConstants, LightConstants, ObjectConstants, UberConstants,
};
use crate::renderer::options::{
    Options, OptionValue, RenderOptions, ANISOTROPY_MAX, SHADOW_RESOLUTION_MIN,
};
use crate::renderer::shader_library::ShaderLibrary;
use crate::renderer::sort::sort_renderables;
use crate::renderer::targets::{RenderTargetId, RenderTargets};
use crate::renderer::world::{Camera, EntityKey, World};
use crate::resource::ResourceProvider;
use crate::rhi::{
    Buffer, BufferDesc, BufferKind, CommandList, DescriptorCache, PipelineCache, PipelineState,
    PresentFlags, RhiDevice, Sampler, SamplerDesc, ShaderStageFlags, SwapChain, SwapChainDesc,
    Texture, TextureDesc, TextureFormat, TextureUsage,
};

// Constant buffer slots, shared with every shader
pub(crate) const SLOT_FRAME: u32 = 0;
pub(crate) const SLOT_UBER: u32 = 1;
pub(crate) const SLOT_OBJECT: u32 = 2;
pub(crate) const SLOT_LIGHT: u32 = 3;

/// Visibility / capability buckets the world resolves into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Opaque,
    Transparent,
    Light,
    LightDirectional,
    LightPoint,
    LightSpot,
    Camera,
}

/// Which internal texture the debug-buffer pass displays full-screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugBuffer {
    None,
    Albedo,
    Normal,
    Material,
    Velocity,
    Depth,
    Ssao,
    Ssr,
    BloomLuminance,
    LightDiffuse,
    LightSpecular,
    LightVolumetric,
}

impl DebugBuffer {
    pub(crate) fn target(&self) -> Option<RenderTargetId> {
        match self {
            DebugBuffer::None => None,
            DebugBuffer::Albedo => Some(RenderTargetId::GbufferAlbedo),
            DebugBuffer::Normal => Some(RenderTargetId::GbufferNormal),
            DebugBuffer::Material => Some(RenderTargetId::GbufferMaterial),
            DebugBuffer::Velocity => Some(RenderTargetId::GbufferVelocity),
            DebugBuffer::Depth => Some(RenderTargetId::GbufferDepth),
            DebugBuffer::Ssao => Some(RenderTargetId::Ssao),
            DebugBuffer::Ssr => Some(RenderTargetId::Ssr),
            DebugBuffer::BloomLuminance => Some(RenderTargetId::BloomLuminance),
            DebugBuffer::LightDiffuse => Some(RenderTargetId::LightDiffuse),
            DebugBuffer::LightSpecular => Some(RenderTargetId::LightSpecular),
            DebugBuffer::LightVolumetric => Some(RenderTargetId::LightVolumetric),
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub buffer_count: u32,
    pub swap_format: TextureFormat,
    /// Insert GPU timestamps around every pass
    pub profiling: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            buffer_count: 2,
            swap_format: TextureFormat::R8G8B8A8_UNORM,
            profiling: false,
        }
    }
}

/// Frame timing shown by the performance-metrics overlay
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics {
    pub fps: f32,
    pub frame_time_ms: f32,
    accumulator: f32,
    frames_in_window: u32,
}

impl Metrics {
    fn update(&mut self, delta_time: f32) {
        self.frame_time_ms = delta_time * 1000.0;
        self.accumulator += delta_time;
        self.frames_in_window += 1;
        if self.accumulator >= 0.5 {
            self.fps = self.frames_in_window as f32 / self.accumulator;
            self.accumulator = 0.0;
            self.frames_in_window = 0;
        }
    }
}

/// Debug line vertex (tight 28-byte layout, no padding)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Full-screen quad vertex (position + uv, 20 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

pub(crate) struct QuadGeometry {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub index_buffer: Arc<dyn Buffer>,
    pub index_count: u32,
}

pub(crate) struct Samplers {
    pub compare_depth: Arc<dyn Sampler>,
    pub point_clamp: Arc<dyn Sampler>,
    pub bilinear_clamp: Arc<dyn Sampler>,
    pub bilinear_wrap: Arc<dyn Sampler>,
    pub trilinear_clamp: Arc<dyn Sampler>,
    pub anisotropic_wrap: Arc<dyn Sampler>,
}

pub struct Renderer {
    pub(crate) device: Arc<dyn RhiDevice>,
    pub(crate) resources: Arc<dyn ResourceProvider>,
    pub(crate) swap_chain: SwapChain,
    pub(crate) pipeline_cache: PipelineCache,
    pub(crate) descriptor_cache: DescriptorCache,
    pub(crate) targets: RenderTargets,
    pub(crate) shaders: ShaderLibrary,
    pub(crate) samplers: Samplers,

    pub(crate) buffer_frame: ConstantBufferSet<FrameConstants>,
    pub(crate) buffer_uber: ConstantBufferSet<UberConstants>,
    pub(crate) buffer_object: ConstantBufferSet<ObjectConstants>,
    pub(crate) buffer_light: ConstantBufferSet<LightConstants>,

    pub(crate) quad: QuadGeometry,
    pub(crate) vertex_buffer_lines: Arc<dyn Buffer>,
    /// Screen-space quads for icons and the metrics text overlay
    pub(crate) vertex_buffer_sprites: Arc<dyn Buffer>,

    pub(crate) tex_white: Arc<dyn Texture>,
    pub(crate) tex_black: Arc<dyn Texture>,
    pub(crate) tex_noise_normal: Arc<dyn Texture>,

    world: World,
    pub(crate) entity_buckets: FxHashMap<ObjectType, Vec<EntityKey>>,
    pub(crate) camera: Option<Camera>,
    pub(crate) prev_wvp: FxHashMap<EntityKey, Mat4>,

    pub(crate) options: RenderOptions,
    pub(crate) resolution: (u32, u32),
    pub(crate) frame_num: u64,
    pub(crate) is_odd_frame: bool,
    pub(crate) time: f32,
    pub(crate) delta_time: f32,
    pub(crate) taa_jitter: Vec2,
    pub(crate) taa_jitter_previous: Vec2,

    pub(crate) brdf_lut_rendered: bool,
    pub(crate) debug_buffer: DebugBuffer,
    pub(crate) selected_entity: Option<EntityKey>,
    pub(crate) environment_texture: Option<Arc<dyn Texture>>,

    pub(crate) lines_depth_enabled: Vec<LineVertex>,
    pub(crate) lines_depth_disabled: Vec<LineVertex>,

    pub(crate) metrics: Metrics,
    profiling: bool,
}

impl Renderer {
    /// Create the renderer and every GPU resource it owns.
    ///
    /// Device or swap-chain failure is fatal: the error is logged and
    /// returned, and the engine must not proceed to render.
    pub fn new(
        device: Arc<dyn RhiDevice>,
        resources: Arc<dyn ResourceProvider>,
        window: Option<&Window>,
        config: RendererConfig,
    ) -> Result<Self> {
        // Pixel-perfect: snap to even dimensions
        let width = config.width - (config.width % 2);
        let height = config.height - (config.height % 2);

        let swap_chain = SwapChain::new(
            &device,
            window,
            &SwapChainDesc {
                width,
                height,
                format: config.swap_format,
                buffer_count: config.buffer_count,
                flags: PresentFlags::IMMEDIATE | PresentFlags::FLIP_DISCARD,
            },
        );
        if !swap_chain.is_initialized() {
            crate::engine_error!("vesper::Renderer", "Failed to create swap chain");
            return Err(Error::InitializationFailed("swap chain creation failed".to_string()));
        }

        let pipeline_cache = PipelineCache::new();
        let descriptor_cache = DescriptorCache::new(device.as_ref())?;
        let targets = RenderTargets::create(device.as_ref(), width, height)?;

        let mut shaders = ShaderLibrary::new();
        shaders.create_all(device.as_ref(), resources.as_ref());

        let options = RenderOptions::default();
        let samplers = Samplers {
            compare_depth: device
                .create_sampler(&SamplerDesc::compare_depth(options.is_enabled(Options::REVERSE_Z)))?,
            point_clamp: device.create_sampler(&SamplerDesc::point_clamp())?,
            bilinear_clamp: device.create_sampler(&SamplerDesc::bilinear_clamp())?,
            bilinear_wrap: device.create_sampler(&SamplerDesc::bilinear_wrap())?,
            trilinear_clamp: device.create_sampler(&SamplerDesc::trilinear_clamp())?,
            anisotropic_wrap: device
                .create_sampler(&SamplerDesc::anisotropic_wrap(options.value(OptionValue::Anisotropy)))?,
        };

        let buffer_frame = ConstantBufferSet::new(device.as_ref(), "frame", 1)?;
        let buffer_uber = ConstantBufferSet::new(device.as_ref(), "uber", 1)?;
        let buffer_object = ConstantBufferSet::new(device.as_ref(), "object", 64)?;
        let buffer_light = ConstantBufferSet::new(device.as_ref(), "light", 1)?;

        let quad = Self::create_quad(device.as_ref())?;
        let vertex_buffer_lines = device.create_buffer(&BufferDesc {
            kind: BufferKind::Vertex,
            stride: std::mem::size_of::<LineVertex>() as u32,
            element_count: 1024,
            dynamic: true,
            name: "lines".to_string(),
        })?;
        let vertex_buffer_sprites = device.create_buffer(&BufferDesc {
            kind: BufferKind::Vertex,
            stride: std::mem::size_of::<QuadVertex>() as u32,
            element_count: 1024,
            dynamic: true,
            name: "sprites".to_string(),
        })?;

        let tex_white = Self::create_flat_texture(device.as_ref(), "white")?;
        let tex_black = Self::create_flat_texture(device.as_ref(), "black")?;
        let tex_noise_normal = resources.texture("noise_normal").unwrap_or_else(|| tex_white.clone());

        crate::engine_info!("vesper::Renderer", "Initialized at {}x{}", width, height);

        Ok(Self {
            device,
            resources,
            swap_chain,
            pipeline_cache,
            descriptor_cache,
            targets,
            shaders,
            samplers,
            buffer_frame,
            buffer_uber,
            buffer_object,
            buffer_light,
            quad,
            vertex_buffer_lines,
            vertex_buffer_sprites,
            tex_white,
            tex_black,
            tex_noise_normal,
            world: World::new(),
            entity_buckets: FxHashMap::default(),
            camera: None,
            prev_wvp: FxHashMap::default(),
            options,
            resolution: (width, height),
            frame_num: 0,
            is_odd_frame: false,
            time: 0.0,
            delta_time: 0.0,
            taa_jitter: Vec2::ZERO,
            taa_jitter_previous: Vec2::ZERO,
            brdf_lut_rendered: false,
            debug_buffer: DebugBuffer::None,
            selected_entity: None,
            environment_texture: None,
            lines_depth_enabled: Vec::new(),
            lines_depth_disabled: Vec::new(),
            metrics: Metrics::default(),
            profiling: config.profiling,
        })
    }

    fn create_quad(device: &dyn RhiDevice) -> Result<QuadGeometry> {
        let vertices = [
            QuadVertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 1.0] },
            QuadVertex { position: [-1.0, 1.0, 0.0], uv: [0.0, 0.0] },
            QuadVertex { position: [1.0, 1.0, 0.0], uv: [1.0, 0.0] },
            QuadVertex { position: [1.0, -1.0, 0.0], uv: [1.0, 1.0] },
        ];
        let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];

        let vertex_buffer = device.create_buffer(&BufferDesc {
            kind: BufferKind::Vertex,
            stride: std::mem::size_of::<QuadVertex>() as u32,
            element_count: vertices.len() as u32,
            dynamic: true,
            name: "quad_vertices".to_string(),
        })?;
        vertex_buffer.map_write(0, &mut |dst| {
            dst[..std::mem::size_of_val(&vertices)].copy_from_slice(bytemuck::cast_slice(&vertices));
        })?;

        let index_buffer = device.create_buffer(&BufferDesc {
            kind: BufferKind::Index,
            stride: std::mem::size_of::<u16>() as u32,
            element_count: indices.len() as u32,
            dynamic: true,
            name: "quad_indices".to_string(),
        })?;
        index_buffer.map_write(0, &mut |dst| {
            dst[..std::mem::size_of_val(&indices)].copy_from_slice(bytemuck::cast_slice(&indices));
        })?;

        Ok(QuadGeometry { vertex_buffer, index_buffer, index_count: indices.len() as u32 })
    }

    fn create_flat_texture(device: &dyn RhiDevice, name: &str) -> Result<Arc<dyn Texture>> {
        device.create_texture(&TextureDesc {
            width: 1,
            height: 1,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::R8G8B8A8_UNORM,
            usage: TextureUsage::SAMPLED,
            name: name.to_string(),
        })
    }

    // ===== WORLD ACCESS =====

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn device(&self) -> &Arc<dyn RhiDevice> {
        &self.device
    }

    /// Look up an internal render target (debug tooling, tests)
    pub fn render_target(&self, id: RenderTargetId) -> Option<Arc<dyn Texture>> {
        self.targets.get(id)
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn frame_num(&self) -> u64 {
        self.frame_num
    }

    /// Frame parity, used by temporally alternating effects
    pub fn is_odd_frame(&self) -> bool {
        self.is_odd_frame
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn set_selected_entity(&mut self, entity: Option<EntityKey>) {
        self.selected_entity = entity;
    }

    /// Select which internal buffer the debug pass displays full-screen
    pub fn set_debug_buffer(&mut self, buffer: DebugBuffer) {
        self.debug_buffer = buffer;
    }

    pub fn environment_texture(&self) -> Arc<dyn Texture> {
        self.environment_texture.clone().unwrap_or_else(|| self.tex_white.clone())
    }

    pub fn set_environment_texture(&mut self, texture: Arc<dyn Texture>) {
        self.environment_texture = Some(texture);
    }

    pub fn entities(&self, object_type: ObjectType) -> &[EntityKey] {
        self.entity_buckets.get(&object_type).map(Vec::as_slice).unwrap_or(&[])
    }

    // ===== OPTIONS =====

    pub fn option_enabled(&self, option: Options) -> bool {
        self.options.is_enabled(option)
    }

    pub fn set_option(&mut self, option: Options, enable: bool) {
        self.options.set_enabled(option, enable);
    }

    pub fn option_value(&self, option: OptionValue) -> f32 {
        self.options.value(option)
    }

    /// Set a scalar option value.
    ///
    /// Values are clamped to their valid range. Changing the shadow
    /// resolution regenerates the shadow map of every shadow-casting light.
    pub fn set_option_value(&mut self, option: OptionValue, value: f32) {
        let value = match option {
            OptionValue::Anisotropy => value.clamp(0.0, ANISOTROPY_MAX),
            OptionValue::ShadowResolution => value.clamp(
                SHADOW_RESOLUTION_MIN,
                self.device.limits().max_texture_dimension_2d as f32,
            ),
            _ => value,
        };

        if self.options.value(option) == value {
            return;
        }
        self.options.set_value_raw(option, value);

        if option == OptionValue::ShadowResolution {
            let resolution = value as u32;
            for (_, entity) in self.world.iter_mut() {
                if let Some(light) = entity.light.as_mut() {
                    if light.shadows_enabled {
                        if let Err(err) = light.create_shadow_map(self.device.as_ref(), resolution) {
                            crate::engine_error!(
                                "vesper::Renderer",
                                "Shadow map regeneration failed: {}",
                                err
                            );
                        }
                    }
                }
            }
        }
    }

    pub fn max_resolution(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    // ===== RESOLUTION =====

    /// Change the output resolution: recreates the render textures and
    /// resizes the swap chain. Odd dimensions are snapped down to even.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        if !self.device.validate_resolution(width, height) {
            crate::engine_warn!("vesper::Renderer", "{}x{} is an invalid resolution", width, height);
            return;
        }

        let width = width - (width % 2);
        let height = height - (height % 2);

        if self.resolution == (width, height) {
            return;
        }
        self.resolution = (width, height);

        match RenderTargets::create(self.device.as_ref(), width, height) {
            Ok(targets) => self.targets = targets,
            Err(err) => {
                crate::engine_error!("vesper::Renderer", "Failed to recreate render targets: {}", err);
                return;
            }
        }
        // Cached pipelines reference the old attachments
        self.pipeline_cache.clear();
        self.brdf_lut_rendered = false;

        self.swap_chain.resize(self.device.as_ref(), width, height);

        crate::engine_info!("vesper::Renderer", "Resolution set to {}x{}", width, height);
    }

    // ===== DEBUG GEOMETRY =====

    pub fn draw_line(&mut self, from: Vec3, to: Vec3, color_from: Vec4, color_to: Vec4, depth: bool) {
        let list = if depth { &mut self.lines_depth_enabled } else { &mut self.lines_depth_disabled };
        list.push(LineVertex { position: from.to_array(), color: color_from.to_array() });
        list.push(LineVertex { position: to.to_array(), color: color_to.to_array() });
    }

    pub fn draw_box(&mut self, aabb: &crate::renderer::world::Aabb, color: Vec4, depth: bool) {
        let min = aabb.min;
        let max = aabb.max;

        let corners = [
            // Bottom rectangle
            (Vec3::new(min.x, min.y, min.z), Vec3::new(max.x, min.y, min.z)),
            (Vec3::new(max.x, min.y, min.z), Vec3::new(max.x, max.y, min.z)),
            (Vec3::new(max.x, max.y, min.z), Vec3::new(min.x, max.y, min.z)),
            (Vec3::new(min.x, max.y, min.z), Vec3::new(min.x, min.y, min.z)),
            // Verticals
            (Vec3::new(min.x, min.y, min.z), Vec3::new(min.x, min.y, max.z)),
            (Vec3::new(max.x, min.y, min.z), Vec3::new(max.x, min.y, max.z)),
            (Vec3::new(max.x, max.y, min.z), Vec3::new(max.x, max.y, max.z)),
            (Vec3::new(min.x, max.y, min.z), Vec3::new(min.x, max.y, max.z)),
            // Top rectangle
            (Vec3::new(min.x, min.y, max.z), Vec3::new(max.x, min.y, max.z)),
            (Vec3::new(max.x, min.y, max.z), Vec3::new(max.x, max.y, max.z)),
            (Vec3::new(max.x, max.y, max.z), Vec3::new(min.x, max.y, max.z)),
            (Vec3::new(min.x, max.y, max.z), Vec3::new(min.x, min.y, max.z)),
        ];
        for (from, to) in corners {
            self.draw_line(from, to, color, color, depth);
        }
    }

    // ===== FRAME =====

    /// Render one frame. Recoverable per-frame conditions (no camera, empty
    /// world, suspended swap chain) skip the frame; state is revisited on
    /// the next tick.
    pub fn tick(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
        self.time += delta_time;
        self.metrics.update(delta_time);

        self.acquire_renderables();

        // No camera: nothing to render
        let camera = match self.camera {
            Some(camera) => camera,
            None => return,
        };

        // Nothing to draw
        if self.entities(ObjectType::Opaque).is_empty()
            && self.entities(ObjectType::Transparent).is_empty()
        {
            return;
        }

        self.frame_num += 1;
        self.is_odd_frame = self.frame_num % 2 == 1;

        self.update_camera_constants(&camera);

        if !self.swap_chain.acquire_next_image() {
            return;
        }
        if self.swap_chain.is_suspended() {
            return;
        }

        let mut cmd = match self.swap_chain.take_cmd_list() {
            Some(cmd) => cmd,
            None => return,
        };
        cmd.set_profiling(self.profiling);

        self.pass_main(&mut cmd);
        self.pass_copy_to_backbuffer(&mut cmd);

        self.swap_chain.return_cmd_list(cmd);
        self.swap_chain.present();
    }

    /// Fill the per-frame constants from the camera, including the TAA
    /// jitter (Halton(2,3) over 16 samples)
    fn update_camera_constants(&mut self, camera: &Camera) {
        let (width, height) = self.resolution;
        let resolution = Vec2::new(width as f32, height as f32);

        let frame = &mut self.buffer_frame.cpu;
        frame.view = camera.view;
        frame.projection = camera.projection;
        frame.view_projection_ortho = Mat4::orthographic_rh(
            0.0,
            resolution.x,
            resolution.y,
            0.0,
            camera.near,
            camera.far,
        );

        if self.options.is_enabled(Options::TAA) {
            self.taa_jitter_previous = self.taa_jitter;

            // Halton(2, 3) * 16 repeats nicely
            let samples = 16;
            let index = (self.frame_num % samples) as u32 + 1;
            let jitter = Vec2::new(halton(index, 2) * 2.0 - 1.0, halton(index, 3) * 2.0 - 1.0);
            self.taa_jitter = jitter / resolution;

            frame.projection =
                Mat4::from_translation(Vec3::new(self.taa_jitter.x, self.taa_jitter.y, 0.0))
                    * frame.projection;
        } else {
            self.taa_jitter = Vec2::ZERO;
            self.taa_jitter_previous = Vec2::ZERO;
        }

        frame.view_projection = frame.projection * frame.view;
        frame.view_projection_inv = frame.view_projection.inverse();
        frame.view_projection_unjittered = camera.projection * camera.view;
        frame.camera_near = camera.near;
        frame.camera_far = camera.far;
        frame.camera_position = camera.position;
        frame.camera_direction = camera.forward;
    }

    /// Filter the world into buckets and sort the visibility classes
    /// front-to-back
    pub fn acquire_renderables(&mut self) {
        self.entity_buckets.clear();
        self.camera = None;

        for (key, entity) in self.world.iter() {
            if !entity.active {
                continue;
            }

            if let Some(renderable) = &entity.renderable {
                let bucket = if renderable.material.is_transparent() {
                    ObjectType::Transparent
                } else {
                    ObjectType::Opaque
                };
                self.entity_buckets.entry(bucket).or_default().push(key);
            }

            if let Some(light) = &entity.light {
                self.entity_buckets.entry(ObjectType::Light).or_default().push(key);
                let typed = match light.light_type {
                    crate::renderer::world::LightType::Directional => ObjectType::LightDirectional,
                    crate::renderer::world::LightType::Point => ObjectType::LightPoint,
                    crate::renderer::world::LightType::Spot => ObjectType::LightSpot,
                };
                self.entity_buckets.entry(typed).or_default().push(key);
            }

            if let Some(camera) = &entity.camera {
                self.entity_buckets.entry(ObjectType::Camera).or_default().push(key);
                self.camera = Some(*camera);
            }
        }

        if let Some(camera) = self.camera {
            for bucket in [ObjectType::Opaque, ObjectType::Transparent] {
                if let Some(keys) = self.entity_buckets.get_mut(&bucket) {
                    sort_renderables(&self.world, keys, camera.position);
                }
            }
        }
    }

    // ===== CONSTANT BUFFER UPDATES =====

    /// Upload the per-frame buffer (unconditional: per-frame data changes by
    /// definition)
    pub(crate) fn update_frame_buffer(&mut self) -> bool {
        let mut directional_intensity = 0.0;
        if let Some(&key) = self.entities(ObjectType::LightDirectional).first() {
            if let Some(light) = self.world.get(key).and_then(|e| e.light.as_ref()) {
                directional_intensity = light.intensity;
            }
        }

        let frame = &mut self.buffer_frame.cpu;
        frame.taa_jitter_offset_previous = frame.taa_jitter_offset;
        frame.taa_jitter_offset = self.taa_jitter - self.taa_jitter_previous;
        frame.delta_time = self.delta_time;
        frame.time = self.time;
        frame.bloom_intensity = self.options.value(OptionValue::BloomIntensity);
        frame.sharpen_strength = self.options.value(OptionValue::SharpenStrength);
        frame.sharpen_clamp = self.options.value(OptionValue::SharpenClamp);
        frame.motion_blur_strength = self.options.value(OptionValue::MotionBlurIntensity);
        frame.gamma = self.options.value(OptionValue::Gamma);
        frame.exposure = self.options.value(OptionValue::Exposure);
        frame.tonemapping = self.options.value(OptionValue::Tonemapping);
        frame.directional_light_intensity = directional_intensity;
        frame.ssr_enabled = if self.options.is_enabled(Options::SSR) { 1.0 } else { 0.0 };
        frame.shadow_resolution = self.options.value(OptionValue::ShadowResolution);

        match self.buffer_frame.upload() {
            Ok(()) => true,
            Err(err) => {
                crate::engine_error!("vesper::Renderer", "Failed to map frame buffer: {}", err);
                false
            }
        }
    }

    /// Upload the uber buffer when dirty
    pub(crate) fn update_uber_buffer(&mut self) -> bool {
        match self.buffer_uber.upload_if_dirty() {
            Ok(_) => true,
            Err(err) => {
                crate::engine_error!("vesper::Renderer", "Failed to map uber buffer: {}", err);
                false
            }
        }
    }

    /// Upload the object buffer to the dynamic slot for `entity_index`,
    /// re-binding it when the offset changed
    pub(crate) fn update_object_buffer(&mut self, cmd: &mut CommandList, entity_index: u32) -> bool {
        match self.buffer_object.upload_dynamic(entity_index) {
            Ok(uploaded) => {
                if uploaded {
                    // Dynamic buffers have to be re-bound whenever their
                    // offset changes
                    cmd.set_constant_buffer(SLOT_OBJECT, ShaderStageFlags::VERTEX, self.buffer_object.gpu());
                }
                true
            }
            Err(err) => {
                crate::engine_error!("vesper::Renderer", "Failed to map object buffer: {}", err);
                false
            }
        }
    }

    /// Upload the light buffer when dirty
    pub(crate) fn update_light_buffer(&mut self) -> bool {
        match self.buffer_light.upload_if_dirty() {
            Ok(_) => true,
            Err(err) => {
                crate::engine_error!("vesper::Renderer", "Failed to map light buffer: {}", err);
                false
            }
        }
    }

    // ===== PASS PLUMBING =====

    /// `CommandList::begin` through the renderer's caches
    pub(crate) fn cmd_begin(&mut self, cmd: &mut CommandList, state: &PipelineState) -> bool {
        cmd.begin(state, self.device.as_ref(), &mut self.pipeline_cache, &mut self.descriptor_cache)
    }

    /// Bind the global constant buffers and samplers; called after every
    /// successful `begin` since bindings reset per pass
    pub(crate) fn bind_globals(&mut self, cmd: &mut CommandList) {
        cmd.set_constant_buffer(
            SLOT_FRAME,
            ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL,
            self.buffer_frame.gpu(),
        );
        cmd.set_constant_buffer(
            SLOT_UBER,
            ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL,
            self.buffer_uber.gpu(),
        );
        cmd.set_constant_buffer(SLOT_OBJECT, ShaderStageFlags::VERTEX, self.buffer_object.gpu());
        cmd.set_constant_buffer(SLOT_LIGHT, ShaderStageFlags::PIXEL, self.buffer_light.gpu());

        cmd.set_sampler(0, &self.samplers.compare_depth);
        cmd.set_sampler(1, &self.samplers.point_clamp);
        cmd.set_sampler(2, &self.samplers.bilinear_clamp);
        cmd.set_sampler(3, &self.samplers.bilinear_wrap);
        cmd.set_sampler(4, &self.samplers.trilinear_clamp);
        cmd.set_sampler(5, &self.samplers.anisotropic_wrap);
    }

    /// The depth clear value honoring reverse-Z
    pub(crate) fn clear_depth_value(&self) -> f32 {
        if self.options.is_enabled(Options::REVERSE_Z) {
            0.0
        } else {
            1.0
        }
    }

    /// The depth comparison honoring reverse-Z
    pub(crate) fn depth_compare(&self) -> crate::rhi::CompareOp {
        if self.options.is_enabled(Options::REVERSE_Z) {
            crate::rhi::CompareOp::GreaterOrEqual
        } else {
            crate::rhi::CompareOp::LessOrEqual
        }
    }
}

/// Halton low-discrepancy sequence
fn halton(mut index: u32, base: u32) -> f32 {
    let mut fraction = 1.0;
    let mut result = 0.0;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
