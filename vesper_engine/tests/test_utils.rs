//! Shared helpers for the integration tests: a stub resource provider,
//! world builders and command-log inspection.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vesper_engine::glam::{Mat4, Vec3, Vec4};
use vesper_engine::renderer::{
    Aabb, Camera, Entity, EntityKey, Geometry, Light, LightType, Material, MaterialTexture,
    Renderable, Renderer, RendererConfig,
};
use vesper_engine::resource::ResourceProvider;
use vesper_engine::rhi::null::NullDevice;
use vesper_engine::rhi::{
    BufferDesc, BufferKind, RhiDevice, ShaderSource, Texture, TextureDesc, TextureFormat,
    TextureUsage,
};

/// Resource provider serving empty SPIR-V blobs for every shader
pub struct TestResources {
    data_dir: PathBuf,
}

impl TestResources {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { data_dir: PathBuf::from("data") })
    }
}

impl ResourceProvider for TestResources {
    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn shader_source(&self, _name: &str) -> Option<ShaderSource> {
        Some(ShaderSource::SpirV(Vec::new()))
    }

    fn texture(&self, _name: &str) -> Option<Arc<dyn Texture>> {
        None
    }
}

pub fn make_renderer(device: &Arc<NullDevice>) -> Renderer {
    let device_dyn: Arc<dyn RhiDevice> = device.clone();
    Renderer::new(device_dyn, TestResources::new(), None, RendererConfig::default()).unwrap()
}

pub fn default_camera() -> Camera {
    Camera {
        view: Mat4::look_at_rh(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO, Vec3::Y),
        projection: Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 500.0),
        near: 0.1,
        far: 500.0,
        position: Vec3::new(0.0, 2.0, 8.0),
        forward: Vec3::NEG_Z,
        clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
    }
}

pub fn add_camera(renderer: &mut Renderer) -> EntityKey {
    let mut entity = Entity::new();
    entity.camera = Some(default_camera());
    renderer.world_mut().add(entity)
}

/// An opaque unit cube at the origin with an albedo texture
pub fn add_opaque_mesh(renderer: &mut Renderer, device: &Arc<NullDevice>) -> EntityKey {
    let vertex_buffer = device
        .create_buffer(&BufferDesc {
            kind: BufferKind::Vertex,
            stride: 20,
            element_count: 24,
            dynamic: true,
            name: "cube_vertices".to_string(),
        })
        .unwrap();
    let index_buffer = device
        .create_buffer(&BufferDesc {
            kind: BufferKind::Index,
            stride: 2,
            element_count: 36,
            dynamic: true,
            name: "cube_indices".to_string(),
        })
        .unwrap();

    let albedo = device
        .create_texture(&TextureDesc {
            width: 16,
            height: 16,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::R8G8B8A8_SRGB,
            usage: TextureUsage::SAMPLED,
            name: "cube_albedo".to_string(),
        })
        .unwrap();

    let mut material = Material::new();
    material.set_texture(MaterialTexture::Albedo, albedo);

    let mut entity = Entity::new();
    entity.renderable = Some(Renderable {
        geometry: Geometry {
            vertex_buffer,
            index_buffer,
            index_count: 36,
            index_offset: 0,
            vertex_offset: 0,
            aabb: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
        },
        material: Arc::new(material),
        cast_shadows: true,
    });
    renderer.world_mut().add(entity)
}

/// A directional light with shadows enabled and its shadow map created
pub fn add_directional_light(renderer: &mut Renderer, device: &Arc<NullDevice>) -> EntityKey {
    let mut light = Light::new(LightType::Directional);
    light.shadows_enabled = true;
    light
        .create_shadow_map(device.as_ref() as &dyn RhiDevice, 1024)
        .unwrap();

    let mut entity = Entity::new();
    // Pointing down at the scene
    entity.transform = Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_3);
    entity.light = Some(light);
    renderer.world_mut().add(entity)
}

/// Total draw calls recorded between every `begin_pass:<name>` and its
/// matching `end_pass`
pub fn draws_in_pass(entries: &[String], pass_name: &str) -> usize {
    let begin_marker = format!("begin_pass:{}", pass_name);
    let mut draws = 0;
    let mut in_pass = false;
    for entry in entries {
        if entry == &begin_marker {
            in_pass = true;
        } else if entry == "end_pass" {
            in_pass = false;
        } else if in_pass && (entry.starts_with("draw:") || entry.starts_with("draw_indexed:")) {
            draws += 1;
        }
    }
    draws
}

/// Number of times a pass began
pub fn pass_count(entries: &[String], pass_name: &str) -> usize {
    let marker = format!("begin_pass:{}", pass_name);
    entries.iter().filter(|entry| *entry == &marker).count()
}
