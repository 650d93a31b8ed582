//! Unit tests for the renderable sort key

use glam::Vec3;

use crate::renderer::sort::{pack_draw_key, sort_renderables};
use crate::renderer::world::{Aabb, Entity, Geometry, Material, Renderable, World};
use crate::rhi::null::NullDevice;
use crate::rhi::{BufferDesc, BufferKind, RhiDevice};

#[test]
fn test_key_orders_by_distance_first() {
    let near = pack_draw_key(1.0, 999);
    let far = pack_draw_key(100.0, 1);
    assert!(near < far);
}

#[test]
fn test_key_breaks_ties_by_material() {
    let a = pack_draw_key(25.0, 3);
    let b = pack_draw_key(25.0, 7);
    assert!(a < b);
}

#[test]
fn test_key_zero_distance() {
    let at_camera = pack_draw_key(0.0, 5);
    let behind = pack_draw_key(0.01, 0);
    assert!(at_camera < behind);
}

fn add_renderable(world: &mut World, device: &NullDevice, z: f32) -> crate::renderer::world::EntityKey {
    let buffer = |kind, name: &str| {
        device
            .create_buffer(&BufferDesc {
                kind,
                stride: 20,
                element_count: 3,
                dynamic: true,
                name: name.to_string(),
            })
            .unwrap()
    };

    let mut entity = Entity::new();
    entity.transform = glam::Mat4::from_translation(Vec3::new(0.0, 0.0, z));
    entity.renderable = Some(Renderable {
        geometry: Geometry {
            vertex_buffer: buffer(BufferKind::Vertex, "vb"),
            index_buffer: buffer(BufferKind::Index, "ib"),
            index_count: 3,
            index_offset: 0,
            vertex_offset: 0,
            aabb: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
        },
        material: std::sync::Arc::new(Material::new()),
        cast_shadows: true,
    });
    world.add(entity)
}

#[test]
fn test_sort_front_to_back() {
    let device = NullDevice::new();
    let mut world = World::new();

    let far = add_renderable(&mut world, &device, -50.0);
    let near = add_renderable(&mut world, &device, -5.0);
    let middle = add_renderable(&mut world, &device, -20.0);

    let mut keys = vec![far, near, middle];
    sort_renderables(&world, &mut keys, Vec3::ZERO);

    assert_eq!(keys, vec![near, middle, far]);
}

#[test]
fn test_sort_small_lists_untouched() {
    let device = NullDevice::new();
    let mut world = World::new();

    let a = add_renderable(&mut world, &device, -50.0);
    let b = add_renderable(&mut world, &device, -5.0);

    // Two or fewer entries: ordering cost isn't worth it
    let mut keys = vec![a, b];
    sort_renderables(&world, &mut keys, Vec3::ZERO);
    assert_eq!(keys, vec![a, b]);
}
