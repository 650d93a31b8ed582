//! Unit tests for renderer construction, options and resolution handling

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::options::{Options, OptionValue};
use crate::renderer::renderer::{DebugBuffer, ObjectType, Renderer, RendererConfig};
use crate::renderer::world::{Camera, Entity, Light, LightType};
use crate::resource::ResourceProvider;
use crate::rhi::null::NullDevice;
use crate::rhi::{DeviceLimits, RhiDevice, ShaderSource, Texture};

struct TestResources {
    data_dir: PathBuf,
}

impl TestResources {
    fn new() -> Arc<Self> {
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

fn make_renderer(device: &Arc<NullDevice>) -> Renderer {
    let device: Arc<dyn RhiDevice> = device.clone();
    Renderer::new(device, TestResources::new(), None, RendererConfig::default()).unwrap()
}

fn test_camera() -> Camera {
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

#[test]
fn test_construction_succeeds_on_null_device() {
    let device = NullDevice::new();
    let renderer = make_renderer(&device);

    assert_eq!(renderer.resolution(), (1920, 1080));
    assert_eq!(renderer.frame_num(), 0);
}

#[test]
fn test_odd_config_resolution_snaps_even() {
    let device = NullDevice::new();
    let device_dyn: Arc<dyn RhiDevice> = device.clone();
    let renderer = Renderer::new(
        device_dyn,
        TestResources::new(),
        None,
        RendererConfig { width: 1921, height: 1081, ..RendererConfig::default() },
    )
    .unwrap();

    assert_eq!(renderer.resolution(), (1920, 1080));
}

#[test]
fn test_set_resolution_invalid_is_rejected() {
    let device = NullDevice::with_limits(DeviceLimits { max_texture_dimension_2d: 4096 });
    let mut renderer = make_renderer(&device);

    renderer.set_resolution(0, 1080);
    assert_eq!(renderer.resolution(), (1920, 1080));

    renderer.set_resolution(8192, 1080);
    assert_eq!(renderer.resolution(), (1920, 1080));
}

#[test]
fn test_set_resolution_same_is_noop() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    let pipelines_cleared_marker = device.log().count_of("swapchain_resize");
    renderer.set_resolution(1920, 1080);
    assert_eq!(device.log().count_of("swapchain_resize"), pipelines_cleared_marker);
}

#[test]
fn test_set_resolution_recreates_targets() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    let old_target = renderer.render_target(crate::renderer::targets::RenderTargetId::CompositionHdr).unwrap();
    renderer.set_resolution(1280, 720);

    assert_eq!(renderer.resolution(), (1280, 720));
    let new_target = renderer.render_target(crate::renderer::targets::RenderTargetId::CompositionHdr).unwrap();
    assert_ne!(old_target.id(), new_target.id());
    assert_eq!(new_target.info().width, 1280);
}

#[test]
fn test_anisotropy_clamped() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    renderer.set_option_value(OptionValue::Anisotropy, 64.0);
    assert_eq!(renderer.option_value(OptionValue::Anisotropy), 16.0);

    renderer.set_option_value(OptionValue::Anisotropy, -4.0);
    assert_eq!(renderer.option_value(OptionValue::Anisotropy), 0.0);
}

#[test]
fn test_shadow_resolution_clamped_to_device_max() {
    let device = NullDevice::with_limits(DeviceLimits { max_texture_dimension_2d: 4096 });
    let mut renderer = make_renderer(&device);

    renderer.set_option_value(OptionValue::ShadowResolution, 8192.0);
    assert_eq!(renderer.option_value(OptionValue::ShadowResolution), 4096.0);
}

#[test]
fn test_tick_without_camera_skips_frame() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    renderer.tick(0.016);

    assert_eq!(renderer.frame_num(), 0);
    assert_eq!(device.log().count_of("swapchain_acquire"), 0);
}

#[test]
fn test_tick_with_empty_world_skips_frame() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    let mut camera_entity = Entity::new();
    camera_entity.camera = Some(test_camera());
    renderer.world_mut().add(camera_entity);

    renderer.tick(0.016);

    // Camera exists but nothing to draw
    assert_eq!(renderer.frame_num(), 0);
    assert_eq!(device.log().count_of("swapchain_acquire"), 0);
}

#[test]
fn test_acquire_buckets_by_capability() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    let mut camera_entity = Entity::new();
    camera_entity.camera = Some(test_camera());
    renderer.world_mut().add(camera_entity);

    let mut light_entity = Entity::new();
    light_entity.light = Some(Light::new(LightType::Point));
    renderer.world_mut().add(light_entity);

    let mut inactive = Entity::new();
    inactive.active = false;
    inactive.light = Some(Light::new(LightType::Spot));
    renderer.world_mut().add(inactive);

    renderer.acquire_renderables();

    assert!(renderer.camera().is_some());
    assert_eq!(renderer.entities(ObjectType::Light).len(), 1);
    assert_eq!(renderer.entities(ObjectType::LightPoint).len(), 1);
    // Inactive entities are filtered out
    assert_eq!(renderer.entities(ObjectType::LightSpot).len(), 0);
}

#[test]
fn test_debug_buffer_selector() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    renderer.set_debug_buffer(DebugBuffer::Normal);
    // Enum maps to a real target
    assert!(DebugBuffer::Normal.target().is_some());
    assert!(DebugBuffer::None.target().is_none());

    // Selecting None is always a valid no-op
    renderer.set_debug_buffer(DebugBuffer::None);
}

#[test]
fn test_environment_texture_falls_back_to_white() {
    let device = NullDevice::new();
    let renderer = make_renderer(&device);

    // No environment set: the flat white fallback is returned
    let environment = renderer.environment_texture();
    assert_eq!(environment.info().width, 1);
}
