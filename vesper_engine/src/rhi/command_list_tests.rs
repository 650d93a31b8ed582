//! Unit tests for the command list state machine and binding deduplication

use std::sync::Arc;

use crate::rhi::null::{NullDevice, NullShader};
use crate::rhi::{
    BlendState, Buffer, ClearValue, CmdListState, CommandList, DepthStencilState, DescriptorCache,
    PipelineCache, PipelineState, RasterizerState, RhiDevice, Shader, ShaderDesc, ShaderSource,
    ShaderStage, Texture, TextureDesc, TextureFormat, Viewport,
};

struct Harness {
    device: Arc<NullDevice>,
    pipelines: PipelineCache,
    descriptors: DescriptorCache,
}

impl Harness {
    fn new() -> Self {
        let device = NullDevice::new();
        let descriptors = DescriptorCache::new(device.as_ref() as &dyn RhiDevice).unwrap();
        Self { device, pipelines: PipelineCache::new(), descriptors }
    }

    fn shader(&self, name: &str, stage: ShaderStage) -> Arc<dyn Shader> {
        self.device
            .create_shader(ShaderDesc::new(name, stage, ShaderSource::SpirV(Vec::new())))
            .unwrap()
    }

    fn target(&self) -> Arc<dyn Texture> {
        self.device
            .create_texture(&TextureDesc::render_target("rt", 64, 64, TextureFormat::R8G8B8A8_UNORM))
            .unwrap()
    }

    fn state(&self, vertex: &Arc<dyn Shader>, pixel: Option<&Arc<dyn Shader>>) -> PipelineState {
        let mut pso = PipelineState::new("test_pass");
        pso.shader_vertex = Some(vertex.clone());
        pso.shader_pixel = pixel.cloned();
        pso.rasterizer_state = Some(RasterizerState::cull_back_solid());
        pso.blend_state = Some(BlendState::disabled());
        pso.depth_stencil_state = Some(DepthStencilState::disabled());
        pso.render_target_color_textures[0] = Some(self.target());
        pso.clear_color[0] = ClearValue::Color([0.0; 4]);
        pso.viewport = Some(Viewport::new(64.0, 64.0));
        pso.vertex_buffer_stride = 20;
        pso
    }

    fn cmd(&self) -> CommandList {
        CommandList::new(self.device.as_ref() as &dyn RhiDevice).unwrap()
    }

    fn begin(&mut self, cmd: &mut CommandList, pso: &PipelineState) -> bool {
        cmd.begin(pso, self.device.as_ref(), &mut self.pipelines, &mut self.descriptors)
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[test]
fn test_full_pass_cycle_returns_to_idle() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);
    let ps = harness.shader("ps", ShaderStage::Pixel);
    let pso = harness.state(&vs, Some(&ps));

    let mut cmd = harness.cmd();
    assert_eq!(cmd.state(), CmdListState::Idle);

    assert!(harness.begin(&mut cmd, &pso));
    assert_eq!(cmd.state(), CmdListState::Recording);

    assert!(cmd.end());
    assert_eq!(cmd.state(), CmdListState::Ended);

    assert!(cmd.submit());
    assert_eq!(cmd.state(), CmdListState::Idle);

    // A new begin succeeds after submit
    assert!(harness.begin(&mut cmd, &pso));
    assert!(cmd.end());
    assert!(cmd.submit());
}

#[test]
fn test_end_without_begin_is_rejected() {
    let harness = Harness::new();
    let mut cmd = harness.cmd();

    assert!(!cmd.end());
    assert_eq!(cmd.state(), CmdListState::Idle);
}

#[test]
fn test_submit_requires_ended_state() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);
    let ps = harness.shader("ps", ShaderStage::Pixel);
    let pso = harness.state(&vs, Some(&ps));

    let mut cmd = harness.cmd();
    assert!(!cmd.submit());

    assert!(harness.begin(&mut cmd, &pso));
    // Still recording: submit is rejected
    assert!(!cmd.submit());
    assert_eq!(cmd.state(), CmdListState::Recording);

    assert!(cmd.end());
    assert!(cmd.submit());
}

#[test]
fn test_begin_while_recording_is_rejected() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);
    let ps = harness.shader("ps", ShaderStage::Pixel);
    let pso = harness.state(&vs, Some(&ps));

    let mut cmd = harness.cmd();
    assert!(harness.begin(&mut cmd, &pso));
    assert!(!harness.begin(&mut cmd, &pso));
    assert_eq!(cmd.state(), CmdListState::Recording);
}

#[test]
fn test_begin_with_uncompiled_pixel_shader_stays_idle() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);

    // Pixel shader stuck in Compiling
    harness.device.hold_shader_compilation(true);
    let ps = harness.shader("ps_pending", ShaderStage::Pixel);
    harness.device.hold_shader_compilation(false);

    let pso = harness.state(&vs, Some(&ps));

    let mut cmd = harness.cmd();
    assert!(!harness.begin(&mut cmd, &pso));
    assert_eq!(cmd.state(), CmdListState::Idle);

    // Compilation finishing lets the pass run on a later frame
    ps.as_any().downcast_ref::<NullShader>().unwrap().release_compilation();
    assert!(harness.begin(&mut cmd, &pso));
    assert_eq!(cmd.state(), CmdListState::Recording);
}

#[test]
fn test_begin_with_invalid_state_is_rejected() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);
    let ps = harness.shader("ps", ShaderStage::Pixel);

    let mut pso = harness.state(&vs, Some(&ps));
    pso.shader_vertex = None;

    let mut cmd = harness.cmd();
    assert!(!harness.begin(&mut cmd, &pso));
    assert_eq!(cmd.state(), CmdListState::Idle);
}

// ============================================================================
// BINDING DEDUPLICATION
// ============================================================================

#[test]
fn test_rebinding_same_texture_skips_backend_call() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);
    let ps = harness.shader("ps", ShaderStage::Pixel);
    let pso = harness.state(&vs, Some(&ps));
    let texture = harness.target();

    let mut cmd = harness.cmd();
    assert!(harness.begin(&mut cmd, &pso));

    cmd.set_texture(8, &texture);
    cmd.draw(3);
    cmd.set_texture(8, &texture); // unchanged: skipped
    cmd.draw(3);
    cmd.end();
    cmd.submit();

    let binds = harness
        .device
        .log()
        .entries()
        .iter()
        .filter(|entry| entry.starts_with(&format!("bind_texture:slot=8,id={}", texture.id())))
        .count();
    assert_eq!(binds, 1);
}

#[test]
fn test_binds_are_flushed_at_draw_time() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);
    let ps = harness.shader("ps", ShaderStage::Pixel);
    let pso = harness.state(&vs, Some(&ps));
    let texture = harness.target();

    let mut cmd = harness.cmd();
    assert!(harness.begin(&mut cmd, &pso));
    cmd.set_texture(8, &texture);

    // Not flushed yet
    assert_eq!(harness.device.log().count_of("bind_texture:slot=8"), 0);

    cmd.draw(3);
    assert_eq!(harness.device.log().count_of("bind_texture:slot=8"), 1);

    cmd.end();
    cmd.submit();
}

#[test]
fn test_constant_buffer_rebinds_when_offset_changes() {
    let mut harness = Harness::new();
    let vs = harness.shader("vs", ShaderStage::Vertex);
    let ps = harness.shader("ps", ShaderStage::Pixel);
    let pso = harness.state(&vs, Some(&ps));

    let buffer = harness
        .device
        .create_buffer(&crate::rhi::BufferDesc {
            kind: crate::rhi::BufferKind::Constant,
            stride: 64,
            element_count: 8,
            dynamic: true,
            name: "object".to_string(),
        })
        .unwrap();

    let mut cmd = harness.cmd();
    assert!(harness.begin(&mut cmd, &pso));

    cmd.set_constant_buffer(2, crate::rhi::ShaderStageFlags::VERTEX, &buffer);
    cmd.draw(3);

    // Same buffer, same offset: skipped
    cmd.set_constant_buffer(2, crate::rhi::ShaderStageFlags::VERTEX, &buffer);
    cmd.draw(3);

    // Offset changed: must re-bind
    buffer.set_offset_index(1);
    cmd.set_constant_buffer(2, crate::rhi::ShaderStageFlags::VERTEX, &buffer);
    cmd.draw(3);

    cmd.end();
    cmd.submit();

    assert_eq!(harness.device.log().count_of("bind_constant_buffer:slot=2"), 2);
}

#[test]
fn test_draw_outside_recording_is_rejected() {
    let harness = Harness::new();
    let mut cmd = harness.cmd();
    assert!(!cmd.draw(3));
    assert!(!cmd.draw_indexed(3, 0, 0));
    assert!(!cmd.dispatch(1, 1, 1));
}
