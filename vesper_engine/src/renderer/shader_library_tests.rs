//! Unit tests for the shader library and variation cache

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::renderer::shader_library::{ShaderId, ShaderLibrary};
use crate::renderer::world::VariationFlags;
use crate::resource::ResourceProvider;
use crate::rhi::null::NullDevice;
use crate::rhi::{RhiDevice, Shader, ShaderSource, Texture};

struct TestResources {
    data_dir: PathBuf,
}

impl TestResources {
    fn new() -> Self {
        Self { data_dir: PathBuf::from("data") }
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

/// Provider with no assets at all
struct EmptyResources {
    data_dir: PathBuf,
}

impl ResourceProvider for EmptyResources {
    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn shader_source(&self, _name: &str) -> Option<ShaderSource> {
        None
    }

    fn texture(&self, _name: &str) -> Option<Arc<dyn Texture>> {
        None
    }
}

#[test]
fn test_create_all_registers_every_shader() {
    let device = NullDevice::new();
    let resources = TestResources::new();

    let mut library = ShaderLibrary::new();
    library.create_all(device.as_ref() as &dyn RhiDevice, &resources);

    assert!(library.get(ShaderId::QuadV).is_some());
    assert!(library.get(ShaderId::GbufferV).is_some());
    assert!(library.get(ShaderId::LightDirectionalP).is_some());
    assert!(library.get(ShaderId::ToneMappingP).is_some());
    assert!(library.get(ShaderId::FontP).is_some());
}

#[test]
fn test_missing_sources_are_skipped() {
    let device = NullDevice::new();
    let resources = EmptyResources { data_dir: PathBuf::from("data") };

    let mut library = ShaderLibrary::new();
    library.create_all(device.as_ref() as &dyn RhiDevice, &resources);

    assert!(library.get(ShaderId::QuadV).is_none());
}

#[test]
fn test_variation_created_on_first_use_and_cached() {
    let device = NullDevice::new();
    let resources = TestResources::new();
    let mut library = ShaderLibrary::new();

    let flags = VariationFlags::ALBEDO | VariationFlags::NORMAL;

    assert_eq!(library.variation_count(), 0);
    let first = library
        .gbuffer_variation(device.as_ref() as &dyn RhiDevice, &resources, flags)
        .unwrap();
    assert_eq!(library.variation_count(), 1);

    // Second request returns the cached shader, no new compilation
    let second = library
        .gbuffer_variation(device.as_ref() as &dyn RhiDevice, &resources, flags)
        .unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(library.variation_count(), 1);
}

#[test]
fn test_distinct_bitmasks_get_distinct_variations() {
    let device = NullDevice::new();
    let resources = TestResources::new();
    let mut library = ShaderLibrary::new();

    let a = library
        .gbuffer_variation(device.as_ref() as &dyn RhiDevice, &resources, VariationFlags::ALBEDO)
        .unwrap();
    let b = library
        .gbuffer_variation(
            device.as_ref() as &dyn RhiDevice,
            &resources,
            VariationFlags::ALBEDO | VariationFlags::MASK,
        )
        .unwrap();

    assert_ne!(a.id(), b.id());
    assert_eq!(library.variation_count(), 2);
}
