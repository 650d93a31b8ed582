//! Unit tests for world contracts: materials, lights, frustum

use glam::{Mat4, Vec3, Vec4};
use std::sync::Arc;

use crate::renderer::world::{
    Aabb, Camera, Entity, Frustum, Light, LightType, Material, MaterialTexture, VariationFlags,
    World,
};
use crate::rhi::null::NullDevice;
use crate::rhi::{RhiDevice, Texture, TextureDesc, TextureFormat, TextureUsage};

fn dummy_texture(device: &NullDevice) -> Arc<dyn crate::rhi::Texture> {
    device
        .create_texture(&TextureDesc {
            width: 4,
            height: 4,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::R8G8B8A8_UNORM,
            usage: TextureUsage::SAMPLED,
            name: "dummy".to_string(),
        })
        .unwrap()
}

// ============================================================================
// MATERIAL
// ============================================================================

#[test]
fn test_material_variation_flags_follow_textures() {
    let device = NullDevice::new();
    let mut material = Material::new();
    assert_eq!(material.variation_flags(), VariationFlags::empty());

    material.set_texture(MaterialTexture::Albedo, dummy_texture(&device));
    material.set_texture(MaterialTexture::Normal, dummy_texture(&device));

    assert_eq!(
        material.variation_flags(),
        VariationFlags::ALBEDO | VariationFlags::NORMAL
    );
}

#[test]
fn test_material_transparency() {
    let mut material = Material::new();
    assert!(!material.is_transparent());

    material.color_albedo = Vec4::new(1.0, 1.0, 1.0, 0.5);
    assert!(material.is_transparent());
}

#[test]
fn test_material_ids_are_unique() {
    let a = Material::new();
    let b = Material::new();
    assert_ne!(a.id(), b.id());
}

// ============================================================================
// LIGHT
// ============================================================================

#[test]
fn test_shadow_array_size_per_light_type() {
    assert_eq!(Light::new(LightType::Directional).shadow_array_size(), 4);
    assert_eq!(Light::new(LightType::Point).shadow_array_size(), 6);
    assert_eq!(Light::new(LightType::Spot).shadow_array_size(), 1);
}

#[test]
fn test_create_shadow_map_allocates_depth_array() {
    let device = NullDevice::new();
    let mut light = Light::new(LightType::Directional);
    light.shadows_enabled = true;

    light.create_shadow_map(device.as_ref() as &dyn RhiDevice, 2048).unwrap();

    let map = light.shadow_map().unwrap();
    assert_eq!(map.resolution, 2048);
    let info = map.depth.info();
    assert_eq!(info.width, 2048);
    assert_eq!(info.array_layers, 4);
    assert!(info.format.is_depth());
    assert!(map.color.is_none());
}

#[test]
fn test_create_shadow_map_with_transparent_shadows_adds_color() {
    let device = NullDevice::new();
    let mut light = Light::new(LightType::Spot);
    light.shadows_enabled = true;
    light.shadows_transparent_enabled = true;

    light.create_shadow_map(device.as_ref() as &dyn RhiDevice, 1024).unwrap();

    let map = light.shadow_map().unwrap();
    assert!(map.color.is_some());
    assert_eq!(map.color.as_ref().unwrap().info().array_layers, 1);
}

#[test]
fn test_shadow_map_cleared_when_shadows_disabled() {
    let device = NullDevice::new();
    let mut light = Light::new(LightType::Directional);
    light.shadows_enabled = true;
    light.create_shadow_map(device.as_ref() as &dyn RhiDevice, 512).unwrap();
    assert!(light.shadow_map().is_some());

    light.shadows_enabled = false;
    light.create_shadow_map(device.as_ref() as &dyn RhiDevice, 512).unwrap();
    assert!(light.shadow_map().is_none());
}

#[test]
fn test_point_light_range_visibility() {
    let light = Light::new(LightType::Point);
    // Default range is 10
    let near_box = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let far_box = Aabb::new(Vec3::splat(99.0), Vec3::splat(101.0));

    assert!(light.is_in_view(&near_box, Vec3::ZERO));
    assert!(!light.is_in_view(&far_box, Vec3::ZERO));
}

// ============================================================================
// FRUSTUM
// ============================================================================

fn test_camera() -> Camera {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
    Camera {
        view,
        projection,
        near: 0.1,
        far: 100.0,
        position: Vec3::new(0.0, 0.0, 5.0),
        forward: Vec3::NEG_Z,
        clear_color: Vec4::ZERO,
    }
}

#[test]
fn test_frustum_accepts_box_in_front() {
    let camera = test_camera();
    let visible = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    assert!(camera.is_in_view_frustum(&visible));
}

#[test]
fn test_frustum_rejects_box_behind_camera() {
    let camera = test_camera();
    let behind = Aabb::new(Vec3::new(-1.0, -1.0, 19.0), Vec3::new(1.0, 1.0, 21.0));
    assert!(!camera.is_in_view_frustum(&behind));
}

#[test]
fn test_frustum_plane_extraction_handles_ortho() {
    let vp = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.1, 50.0);
    let frustum = Frustum::from_view_projection(&vp);

    let inside = Aabb::new(Vec3::new(-1.0, -1.0, -10.0), Vec3::new(1.0, 1.0, -5.0));
    let outside = Aabb::new(Vec3::new(50.0, 50.0, -10.0), Vec3::new(52.0, 52.0, -5.0));
    assert!(frustum.intersects(&inside));
    assert!(!frustum.intersects(&outside));
}

// ============================================================================
// WORLD
// ============================================================================

#[test]
fn test_world_add_get_remove() {
    let mut world = World::new();
    assert!(world.is_empty());

    let key = world.add(Entity::new());
    assert_eq!(world.len(), 1);
    assert!(world.get(key).is_some());

    let removed = world.remove(key);
    assert!(removed.is_some());
    assert!(world.get(key).is_none());
    assert!(world.is_empty());
}

#[test]
fn test_entity_position_and_forward() {
    let mut entity = Entity::new();
    entity.transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

    assert_eq!(entity.position(), Vec3::new(1.0, 2.0, 3.0));
    // Identity rotation: forward is -Z
    assert!((entity.forward() - Vec3::NEG_Z).length() < 1e-6);
}

#[test]
fn test_aabb_transform_refits_corners() {
    let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let moved = aabb.transformed(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
    assert_eq!(moved.center(), Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(moved.extent(), Vec3::splat(2.0));
}
