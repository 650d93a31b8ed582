//! Unit tests for descriptor merging, dynamic promotion and pool growth

use std::sync::Arc;

use crate::rhi::null::NullDevice;
use crate::rhi::{
    merge_descriptors, promote_dynamic, DescriptorBinding, DescriptorCache, DescriptorSetLayout,
    DescriptorType, PipelineState, RhiDevice, Shader, ShaderDesc, ShaderSource, ShaderStage,
    ShaderStageFlags,
};

fn binding(ty: DescriptorType, slot: u32, stages: ShaderStageFlags) -> DescriptorBinding {
    DescriptorBinding { ty, slot, stages }
}

// ============================================================================
// MERGING
// ============================================================================

#[test]
fn test_merge_ors_stage_flags_for_shared_bindings() {
    let vertex = vec![binding(DescriptorType::ConstantBuffer, 0, ShaderStageFlags::VERTEX)];
    let pixel = vec![binding(DescriptorType::ConstantBuffer, 0, ShaderStageFlags::PIXEL)];

    let merged = merge_descriptors(&vertex, &pixel);

    // Same {type, slot}: one entry, both stages visible
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].stages, ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL);
}

#[test]
fn test_merge_appends_pixel_only_bindings() {
    let vertex = vec![binding(DescriptorType::ConstantBuffer, 0, ShaderStageFlags::VERTEX)];
    let pixel = vec![
        binding(DescriptorType::ConstantBuffer, 0, ShaderStageFlags::PIXEL),
        binding(DescriptorType::Texture, 8, ShaderStageFlags::PIXEL),
        binding(DescriptorType::Sampler, 2, ShaderStageFlags::PIXEL),
    ];

    let merged = merge_descriptors(&vertex, &pixel);
    assert_eq!(merged.len(), 3);

    let texture = merged.iter().find(|b| b.ty == DescriptorType::Texture).unwrap();
    assert_eq!(texture.slot, 8);
    assert_eq!(texture.stages, ShaderStageFlags::PIXEL);
}

#[test]
fn test_merge_same_slot_different_type_stays_separate() {
    // A texture and a sampler can share a slot number; they are distinct
    // bindings
    let vertex = vec![binding(DescriptorType::Texture, 3, ShaderStageFlags::VERTEX)];
    let pixel = vec![binding(DescriptorType::Sampler, 3, ShaderStageFlags::PIXEL)];

    let merged = merge_descriptors(&vertex, &pixel);
    assert_eq!(merged.len(), 2);
}

// ============================================================================
// DYNAMIC PROMOTION
// ============================================================================

#[test]
fn test_promote_dynamic_targets_only_the_requested_slot() {
    let mut bindings = vec![
        binding(DescriptorType::ConstantBuffer, 0, ShaderStageFlags::VERTEX),
        binding(DescriptorType::ConstantBuffer, 2, ShaderStageFlags::VERTEX),
        binding(DescriptorType::Texture, 2, ShaderStageFlags::PIXEL),
    ];

    promote_dynamic(&mut bindings, 2);

    assert_eq!(bindings[0].ty, DescriptorType::ConstantBuffer);
    assert_eq!(bindings[1].ty, DescriptorType::ConstantBufferDynamic);
    // Textures on the same slot are untouched
    assert_eq!(bindings[2].ty, DescriptorType::Texture);
}

// ============================================================================
// CACHE + GROWTH
// ============================================================================

fn make_shader(device: &NullDevice, name: &str, stage: ShaderStage) -> Arc<dyn Shader> {
    device
        .create_shader(ShaderDesc::new(name, stage, ShaderSource::SpirV(Vec::new())))
        .unwrap()
}

fn state_with(vertex: &Arc<dyn Shader>, pixel: &Arc<dyn Shader>) -> PipelineState {
    let mut pso = PipelineState::new("test");
    pso.shader_vertex = Some(vertex.clone());
    pso.shader_pixel = Some(pixel.clone());
    pso
}

#[test]
fn test_layout_reused_for_same_shader_pair() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps = make_shader(&device, "ps", ShaderStage::Pixel);

    let mut cache = DescriptorCache::new(device.as_ref() as &dyn RhiDevice).unwrap();

    let first = cache.set_pipeline_state(device.as_ref(), &state_with(&vs, &ps)).unwrap();
    let second = cache.set_pipeline_state(device.as_ref(), &state_with(&vs, &ps)).unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(cache.layout_count(), 1);
}

#[test]
fn test_layout_differs_per_shader_pair() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps_a = make_shader(&device, "ps_a", ShaderStage::Pixel);
    let ps_b = make_shader(&device, "ps_b", ShaderStage::Pixel);

    let mut cache = DescriptorCache::new(device.as_ref() as &dyn RhiDevice).unwrap();

    let first = cache.set_pipeline_state(device.as_ref(), &state_with(&vs, &ps_a)).unwrap();
    let second = cache.set_pipeline_state(device.as_ref(), &state_with(&vs, &ps_b)).unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(cache.layout_count(), 2);
}

#[test]
fn test_growth_doubles_capacity_and_drains_queues() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps_a = make_shader(&device, "ps_a", ShaderStage::Pixel);
    let ps_b = make_shader(&device, "ps_b", ShaderStage::Pixel);

    // Tiny pool: two layouts (one set each) exhaust it
    let mut cache = DescriptorCache::with_capacity(device.as_ref() as &dyn RhiDevice, 2).unwrap();
    assert_eq!(device.descriptor_set_capacity(), 2);

    cache.set_pipeline_state(device.as_ref(), &state_with(&vs, &ps_a)).unwrap();
    cache.set_pipeline_state(device.as_ref(), &state_with(&vs, &ps_b)).unwrap();
    assert_eq!(cache.descriptor_set_count(), 2);
    assert!(!cache.has_enough_capacity());

    let waits_before = device.queue_wait_count();
    cache.grow_if_needed(device.as_ref()).unwrap();

    // Doubled, stop-the-world wait happened, cached layouts were destroyed
    assert_eq!(cache.capacity(), 4);
    assert_eq!(device.descriptor_set_capacity(), 4);
    assert_eq!(device.queue_wait_count(), waits_before + 3);
    assert_eq!(cache.layout_count(), 0);
}

#[test]
fn test_growth_is_noop_with_room_to_spare() {
    let device = NullDevice::new();
    let vs = make_shader(&device, "vs", ShaderStage::Vertex);
    let ps = make_shader(&device, "ps", ShaderStage::Pixel);

    let mut cache = DescriptorCache::with_capacity(device.as_ref() as &dyn RhiDevice, 8).unwrap();
    cache.set_pipeline_state(device.as_ref(), &state_with(&vs, &ps)).unwrap();

    let waits_before = device.queue_wait_count();
    cache.grow_if_needed(device.as_ref()).unwrap();

    assert_eq!(cache.capacity(), 8);
    assert_eq!(device.queue_wait_count(), waits_before);
    assert_eq!(cache.layout_count(), 1);
}
