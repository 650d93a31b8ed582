//! Unit tests for pipeline state hashing and cache memoization

use std::sync::Arc;

use crate::rhi::null::NullDevice;
use crate::rhi::{
    BlendState, ClearValue, DepthStencilState, DescriptorCache, Pipeline, PipelineCache,
    PipelineState, RasterizerState, RhiDevice, Shader, ShaderDesc, ShaderSource, ShaderStage,
    Texture, TextureDesc, TextureFormat, Viewport,
};

fn make_shader(device: &NullDevice, name: &str, stage: ShaderStage) -> Arc<dyn Shader> {
    device
        .create_shader(ShaderDesc::new(name, stage, ShaderSource::SpirV(Vec::new())))
        .unwrap()
}

fn make_target(device: &NullDevice, name: &str) -> Arc<dyn Texture> {
    device
        .create_texture(&TextureDesc::render_target(name, 128, 128, TextureFormat::R8G8B8A8_UNORM))
        .unwrap()
}

fn base_state(
    vertex: &Arc<dyn Shader>,
    pixel: &Arc<dyn Shader>,
    target: &Arc<dyn Texture>,
) -> PipelineState {
    let mut pso = PipelineState::new("test_pass");
    pso.shader_vertex = Some(vertex.clone());
    pso.shader_pixel = Some(pixel.clone());
    pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
    pso.blend_state = Some(BlendState::disabled());
    pso.depth_stencil_state = Some(DepthStencilState::disabled());
    pso.render_target_color_textures[0] = Some(target.clone());
    pso.clear_color[0] = ClearValue::Color([0.0; 4]);
    pso.viewport = Some(Viewport::new(128.0, 128.0));
    pso.vertex_buffer_stride = 20;
    pso
}

#[test]
fn test_identical_states_hash_equal() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps = make_shader(&device, "ps", ShaderStage::Pixel);
    let target = make_target(&device, "rt");

    let a = base_state(&vs, &ps, &target);
    let b = base_state(&vs, &ps, &target);
    assert_eq!(a.compute_hash(), b.compute_hash());
}

#[test]
fn test_changing_any_field_changes_the_hash() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps = make_shader(&device, "ps", ShaderStage::Pixel);
    let ps2 = make_shader(&device, "ps2", ShaderStage::Pixel);
    let target = make_target(&device, "rt");
    let target2 = make_target(&device, "rt2");

    let base = base_state(&vs, &ps, &target);
    let base_hash = base.compute_hash();

    // Different pixel shader
    let mut changed = base_state(&vs, &ps, &target);
    changed.shader_pixel = Some(ps2);
    assert_ne!(changed.compute_hash(), base_hash);

    // Different rasterizer state
    let mut changed = base_state(&vs, &ps, &target);
    changed.rasterizer_state = Some(RasterizerState::cull_back_wireframe());
    assert_ne!(changed.compute_hash(), base_hash);

    // Different blend state
    let mut changed = base_state(&vs, &ps, &target);
    changed.blend_state = Some(BlendState::additive());
    assert_ne!(changed.compute_hash(), base_hash);

    // Different depth-stencil state
    let mut changed = base_state(&vs, &ps, &target);
    changed.depth_stencil_state = Some(DepthStencilState::stencil_read());
    assert_ne!(changed.compute_hash(), base_hash);

    // Different render target
    let mut changed = base_state(&vs, &ps, &target);
    changed.render_target_color_textures[0] = Some(target2);
    assert_ne!(changed.compute_hash(), base_hash);

    // Different clear value
    let mut changed = base_state(&vs, &ps, &target);
    changed.clear_color[0] = ClearValue::Color([1.0, 0.0, 0.0, 1.0]);
    assert_ne!(changed.compute_hash(), base_hash);
}

#[test]
fn test_pipeline_cache_memoizes_identical_states() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps = make_shader(&device, "ps", ShaderStage::Pixel);
    let target = make_target(&device, "rt");

    let mut pipelines = PipelineCache::new();
    let mut descriptors = DescriptorCache::new(device.as_ref() as &dyn RhiDevice).unwrap();

    let pso_a = base_state(&vs, &ps, &target);
    let pso_b = base_state(&vs, &ps, &target);

    let layout = descriptors.set_pipeline_state(device.as_ref(), &pso_a).unwrap();
    let first = pipelines.acquire(device.as_ref(), &pso_a, &layout).unwrap();
    let second = pipelines.acquire(device.as_ref(), &pso_b, &layout).unwrap();

    // Same backend object, one cache entry
    assert_eq!(first.id(), second.id());
    assert_eq!(pipelines.len(), 1);
}

#[test]
fn test_pipeline_cache_misses_on_field_change() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps = make_shader(&device, "ps", ShaderStage::Pixel);
    let target = make_target(&device, "rt");

    let mut pipelines = PipelineCache::new();
    let mut descriptors = DescriptorCache::new(device.as_ref() as &dyn RhiDevice).unwrap();

    let pso_a = base_state(&vs, &ps, &target);
    let mut pso_b = base_state(&vs, &ps, &target);
    pso_b.blend_state = Some(BlendState::alpha());

    let layout = descriptors.set_pipeline_state(device.as_ref(), &pso_a).unwrap();
    let first = pipelines.acquire(device.as_ref(), &pso_a, &layout).unwrap();
    let second = pipelines.acquire(device.as_ref(), &pso_b, &layout).unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(pipelines.len(), 2);
}

#[test]
fn test_state_validity() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps = make_shader(&device, "ps", ShaderStage::Pixel);
    let target = make_target(&device, "rt");

    let valid = base_state(&vs, &ps, &target);
    assert!(valid.is_valid());

    // No vertex shader
    let mut no_vs = base_state(&vs, &ps, &target);
    no_vs.shader_vertex = None;
    assert!(!no_vs.is_valid());

    // No attachments at all
    let mut no_targets = base_state(&vs, &ps, &target);
    no_targets.render_target_color_textures[0] = None;
    assert!(!no_targets.is_valid());
}
