//! End-to-end frame tests on the null backend
//!
//! These drive whole frames through the pass graph and assert on the
//! backend command log: pass counts, draw counts, written targets.

mod test_utils;

use serial_test::serial;

use test_utils::*;
use vesper_engine::renderer::{ObjectType, OptionValue, RenderTargetId};
use vesper_engine::rhi::null::{NullDevice, NullTexture};
use vesper_engine::rhi::{DeviceLimits, Texture};

/// Scenario: one directional light with shadows and one opaque mesh.
/// The shadow pass renders once per array slice, the G-buffer pass draws the
/// mesh exactly once with its matching variation, the lighting pass
/// accumulates exactly one directional contribution, and composition
/// produces a non-empty HDR target.
#[test]
#[serial]
fn test_frame_directional_light_and_opaque_mesh() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    add_directional_light(&mut renderer, &device);
    add_opaque_mesh(&mut renderer, &device);

    device.log().clear();
    renderer.tick(0.016);

    let entries = device.log().entries();

    // Shadow depth: one pass per cascade slice, one occluder each
    assert_eq!(pass_count(&entries, "Pass_LightShadow"), 4);
    assert_eq!(draws_in_pass(&entries, "Pass_LightShadow"), 4);

    // No transparent objects: no transparent shadow pass
    assert_eq!(pass_count(&entries, "Pass_LightShadowTransparent"), 0);

    // G-buffer: one variation in play, the mesh drawn exactly once
    assert_eq!(pass_count(&entries, "Pass_GBuffer"), 1);
    assert_eq!(draws_in_pass(&entries, "Pass_GBuffer"), 1);

    // Exactly one directional light accumulated
    assert_eq!(pass_count(&entries, "Pass_Light"), 1);
    assert_eq!(draws_in_pass(&entries, "Pass_Light"), 1);

    // Composition wrote the HDR chain
    assert_eq!(pass_count(&entries, "Pass_Composition"), 1);
    let hdr = renderer.render_target(RenderTargetId::CompositionHdr).unwrap();
    let hdr = hdr.as_any().downcast_ref::<NullTexture>().unwrap();
    assert!(hdr.was_written());

    // The frame made it to the screen
    assert_eq!(device.log().count_of("swapchain_present"), 1);
    assert_eq!(renderer.frame_num(), 1);
}

/// Scenario: clamping the shadow resolution against the device maximum also
/// regenerates the shadow map of every shadow-casting light.
#[test]
#[serial]
fn test_shadow_resolution_clamp_regenerates_maps() {
    let device = NullDevice::with_limits(DeviceLimits { max_texture_dimension_2d: 4096 });
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    let light_key = add_directional_light(&mut renderer, &device);

    let old_resolution = {
        let light = renderer.world().get(light_key).unwrap().light.as_ref().unwrap();
        light.shadow_map().unwrap().resolution
    };
    assert_eq!(old_resolution, 1024);

    renderer.set_option_value(OptionValue::ShadowResolution, 8192.0);

    // Clamped against the device maximum
    assert_eq!(renderer.option_value(OptionValue::ShadowResolution), 4096.0);

    // Shadow map regenerated at the clamped size
    let light = renderer.world().get(light_key).unwrap().light.as_ref().unwrap();
    let map = light.shadow_map().unwrap();
    assert_eq!(map.resolution, 4096);
    assert_eq!(map.depth.info().width, 4096);
}

/// Scenario: while shaders are still compiling every pass skips silently;
/// the frame neither crashes nor records passes, and rendering resumes once
/// compilation would complete.
#[test]
#[serial]
fn test_uncompiled_shaders_skip_passes_gracefully() {
    let device = NullDevice::new();
    device.hold_shader_compilation(true);
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    add_directional_light(&mut renderer, &device);
    add_opaque_mesh(&mut renderer, &device);

    device.log().clear();
    renderer.tick(0.016);

    let entries = device.log().entries();

    // Nothing ran: no pass began anywhere in the frame
    assert_eq!(entries.iter().filter(|e| e.starts_with("begin_pass:")).count(), 0);

    // The frame still progressed and presented the (empty) back buffer
    assert_eq!(renderer.frame_num(), 1);
    assert_eq!(device.log().count_of("swapchain_present"), 1);
}

/// Transparent objects trigger the transparent branch: second G-buffer pass
/// and the alpha-blend composition.
#[test]
#[serial]
fn test_transparent_branch_runs_when_present() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    add_directional_light(&mut renderer, &device);
    add_opaque_mesh(&mut renderer, &device);

    // A transparent copy of the mesh
    let key = add_opaque_mesh(&mut renderer, &device);
    {
        let entity = renderer.world_mut().get_mut(key).unwrap();
        let renderable = entity.renderable.as_mut().unwrap();
        let mut material = vesper_engine::renderer::Material::new();
        material.color_albedo = vesper_engine::glam::Vec4::new(1.0, 1.0, 1.0, 0.5);
        renderable.material = std::sync::Arc::new(material);
    }

    device.log().clear();
    renderer.tick(0.016);

    let entries = device.log().entries();

    // Opaque + transparent G-buffer fills
    assert_eq!(pass_count(&entries, "Pass_GBuffer"), 2);
    // Both compositions plus the alpha blend of transparent over opaque
    assert_eq!(pass_count(&entries, "Pass_Composition"), 2);
    assert_eq!(pass_count(&entries, "Pass_AlphaBlend"), 1);

    renderer.acquire_renderables();
    assert_eq!(renderer.entities(ObjectType::Opaque).len(), 1);
    assert_eq!(renderer.entities(ObjectType::Transparent).len(), 1);
}

/// The BRDF LUT bakes exactly once across frames.
#[test]
#[serial]
fn test_brdf_lut_bakes_once() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    add_opaque_mesh(&mut renderer, &device);

    device.log().clear();
    renderer.tick(0.016);
    renderer.tick(0.016);
    renderer.tick(0.016);

    let entries = device.log().entries();
    assert_eq!(pass_count(&entries, "Pass_BrdfSpecularLut"), 1);
}

/// Lights without shadows skip the shadow pass entirely.
#[test]
#[serial]
fn test_light_without_shadows_skips_depth_pass() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    add_opaque_mesh(&mut renderer, &device);

    let mut light = vesper_engine::renderer::Light::new(vesper_engine::renderer::LightType::Point);
    light.shadows_enabled = false;
    let mut entity = vesper_engine::renderer::Entity::new();
    entity.light = Some(light);
    renderer.world_mut().add(entity);

    device.log().clear();
    renderer.tick(0.016);

    let entries = device.log().entries();
    assert_eq!(pass_count(&entries, "Pass_LightShadow"), 0);
    // The light still contributes to the lighting pass
    assert_eq!(draws_in_pass(&entries, "Pass_Light"), 1);
}

/// The post chain ping-pongs by swapping handles; the final gamma pass
/// always runs and the LDR output ends up written.
#[test]
#[serial]
fn test_post_process_chain_writes_ldr_output() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    add_opaque_mesh(&mut renderer, &device);

    device.log().clear();
    renderer.tick(0.016);

    let entries = device.log().entries();

    // Defaults: TAA, motion blur, bloom, sharpening on; tone-mapping ACES
    assert_eq!(pass_count(&entries, "Pass_Taa"), 1);
    assert_eq!(pass_count(&entries, "Pass_MotionBlur"), 1);
    assert_eq!(pass_count(&entries, "Pass_Bloom_Luminance"), 1);
    assert_eq!(pass_count(&entries, "Pass_ToneMapping"), 1);
    assert_eq!(pass_count(&entries, "Pass_Copy"), 0);
    assert_eq!(pass_count(&entries, "Pass_LumaSharpen"), 1);
    assert_eq!(pass_count(&entries, "Pass_GammaCorrection"), 1);
    // Disabled stages pass through
    assert_eq!(pass_count(&entries, "Pass_FXAA"), 0);
    assert_eq!(pass_count(&entries, "Pass_Dithering"), 0);
    assert_eq!(pass_count(&entries, "Pass_ChromaticAberration"), 0);

    let ldr = renderer.render_target(RenderTargetId::CompositionLdr).unwrap();
    let ldr = ldr.as_any().downcast_ref::<NullTexture>().unwrap();
    assert!(ldr.was_written());
}

/// Disabling tone-mapping routes through the copy pass instead.
#[test]
#[serial]
fn test_tonemapping_disabled_copies() {
    let device = NullDevice::new();
    let mut renderer = make_renderer(&device);

    add_camera(&mut renderer);
    add_opaque_mesh(&mut renderer, &device);
    renderer.set_option_value(OptionValue::Tonemapping, 0.0);

    device.log().clear();
    renderer.tick(0.016);

    let entries = device.log().entries();
    assert_eq!(pass_count(&entries, "Pass_ToneMapping"), 0);
    assert_eq!(pass_count(&entries, "Pass_Copy"), 1);
}
