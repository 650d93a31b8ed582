/// Command list - records a single pipeline-state pass and submits it
///
/// The command list owns the pass state machine and the binding tables; the
/// backend half (`CommandEncoder`) only sees already-deduplicated, flushed
/// binds. `begin` resolves the pipeline through the caches and returns
/// `false` without touching GPU state when the pass cannot run (invalid
/// state, shaders still compiling, pipeline creation failure) — the caller
/// must skip the pass body entirely.

use std::any::Any;
use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::rhi::{
    Buffer, DescriptorCache, DescriptorSetLayout, ImageLayout, Pipeline, PipelineCache,
    PipelineState, RhiDevice, Sampler, ScissorRect, ShaderStageFlags, Texture, Viewport,
};

/// Command list state machine:
/// `Idle -> (begin succeeds) -> Recording -> (end) -> Ended -> (submit) -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdListState {
    Idle,
    Recording,
    Ended,
}

/// Backend command recording interface.
///
/// Implementations translate the already-validated calls into native command
/// buffer operations. They never see redundant binds.
pub trait CommandEncoder: Send {
    /// Begin native command buffer recording
    fn begin(&mut self) -> Result<()>;

    /// Begin the render pass described by the pipeline state: transition
    /// attachments, apply clears, bind the pipeline
    fn begin_pass(
        &mut self,
        state: &PipelineState,
        pipeline: &Arc<dyn Pipeline>,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<()>;

    fn end_pass(&mut self) -> Result<()>;

    /// End native command buffer recording
    fn end(&mut self) -> Result<()>;

    /// Submit to the graphics queue. Consumes the wait-sync installed by
    /// `set_wait_sync`, if any.
    fn submit(&mut self) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>) -> Result<()>;
    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>) -> Result<()>;
    fn bind_constant_buffer(
        &mut self,
        slot: u32,
        stages: ShaderStageFlags,
        buffer: &Arc<dyn Buffer>,
        offset_index: u32,
    ) -> Result<()>;
    fn bind_sampler(&mut self, slot: u32, sampler: &Arc<dyn Sampler>) -> Result<()>;
    fn bind_texture(&mut self, slot: u32, texture: &Arc<dyn Texture>) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;
    fn set_scissor(&mut self, scissor: ScissorRect) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, vertex_offset: u32) -> Result<()>;
    fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: u32) -> Result<()>;
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    /// Record the clears of the given state as a standalone operation
    fn clear(&mut self, state: &PipelineState) -> Result<()>;

    /// Record an image layout transition barrier. Valid outside of an active
    /// render pass (the encoder uses a transient command buffer when no
    /// recording is open).
    fn transition_layout(
        &mut self,
        texture: &Arc<dyn Texture>,
        from: ImageLayout,
        to: ImageLayout,
    ) -> Result<()>;

    /// Install a one-shot sync object (swap-chain acquire semaphore) the
    /// next submit must wait on
    fn set_wait_sync(&mut self, sync: Option<Arc<dyn Any + Send + Sync>>);

    /// Insert a GPU timestamp for profiling
    fn timestamp(&mut self, label: &'static str) -> Result<()>;
}

/// Bindings recorded since `begin`, keyed by slot.
///
/// `pending` holds values not yet seen by the encoder; `bound` remembers what
/// the encoder last received so unchanged re-binds skip the backend call.
#[derive(Default)]
struct BindingTables {
    pending_constant_buffers: FxHashMap<u32, (ShaderStageFlags, Arc<dyn Buffer>, u32)>,
    pending_textures: FxHashMap<u32, Arc<dyn Texture>>,
    pending_samplers: FxHashMap<u32, Arc<dyn Sampler>>,
    pending_vertex_buffer: Option<Arc<dyn Buffer>>,
    pending_index_buffer: Option<Arc<dyn Buffer>>,

    bound_constant_buffers: FxHashMap<u32, (u64, u32)>,
    bound_textures: FxHashMap<u32, u64>,
    bound_samplers: FxHashMap<u32, u64>,
    bound_vertex_buffer: Option<u64>,
    bound_index_buffer: Option<u64>,
}

impl BindingTables {
    fn clear(&mut self) {
        self.pending_constant_buffers.clear();
        self.pending_textures.clear();
        self.pending_samplers.clear();
        self.pending_vertex_buffer = None;
        self.pending_index_buffer = None;
        self.bound_constant_buffers.clear();
        self.bound_textures.clear();
        self.bound_samplers.clear();
        self.bound_vertex_buffer = None;
        self.bound_index_buffer = None;
    }
}

pub struct CommandList {
    state: CmdListState,
    encoder: Box<dyn CommandEncoder>,
    bindings: BindingTables,
    pipeline: Option<Arc<dyn Pipeline>>,
    profiling: bool,
    pass_name: &'static str,
}

impl CommandList {
    pub fn new(device: &dyn RhiDevice) -> Result<Self> {
        Ok(Self {
            state: CmdListState::Idle,
            encoder: device.create_command_encoder()?,
            bindings: BindingTables::default(),
            pipeline: None,
            profiling: false,
            pass_name: "",
        })
    }

    pub fn state(&self) -> CmdListState {
        self.state
    }

    /// Enable GPU timestamps around begin/end
    pub fn set_profiling(&mut self, enabled: bool) {
        self.profiling = enabled;
    }

    /// Begin recording the pass described by `pipeline_state`.
    ///
    /// Returns `false` — leaving the list in `Idle` and GPU state untouched —
    /// when the list is not idle, the state is invalid, a required shader has
    /// not finished compiling, or the pipeline/descriptor objects cannot be
    /// resolved. Callers must skip the pass body in that case.
    pub fn begin(
        &mut self,
        pipeline_state: &PipelineState,
        device: &dyn RhiDevice,
        pipelines: &mut PipelineCache,
        descriptors: &mut DescriptorCache,
    ) -> bool {
        if self.state != CmdListState::Idle {
            crate::engine_error!(
                "vesper::CommandList",
                "begin() in state {:?}, pass '{}'",
                self.state,
                pipeline_state.pass_name
            );
            return false;
        }

        if !pipeline_state.is_valid() {
            crate::engine_error!(
                "vesper::CommandList",
                "Invalid pipeline state for pass '{}'",
                pipeline_state.pass_name
            );
            return false;
        }

        // Still-compiling shaders are a per-frame skip, not an error
        if !pipeline_state.shaders_compiled() {
            return false;
        }

        // Make room before resolving: a layout resolved after a pool
        // re-allocation never references destroyed sets
        if let Err(err) = descriptors.grow_if_needed(device) {
            crate::engine_error!("vesper::CommandList", "Descriptor pool growth failed: {}", err);
            return false;
        }

        let layout = match descriptors.set_pipeline_state(device, pipeline_state) {
            Ok(layout) => layout,
            Err(err) => {
                crate::engine_error!(
                    "vesper::CommandList",
                    "Failed to resolve descriptor layout for '{}': {}",
                    pipeline_state.pass_name,
                    err
                );
                return false;
            }
        };

        let pipeline = match pipelines.acquire(device, pipeline_state, &layout) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                crate::engine_error!(
                    "vesper::CommandList",
                    "Failed to resolve pipeline for '{}': {}",
                    pipeline_state.pass_name,
                    err
                );
                return false;
            }
        };

        if self.encoder.begin().is_err() {
            return false;
        }
        if self.profiling {
            let _ = self.encoder.timestamp(pipeline_state.pass_name);
        }
        if self.encoder.begin_pass(pipeline_state, &pipeline, &layout).is_err() {
            let _ = self.encoder.end();
            return false;
        }

        if let Some(viewport) = pipeline_state.viewport {
            if viewport.is_defined() && self.encoder.set_viewport(viewport).is_err() {
                return false;
            }
        }

        self.bindings.clear();
        self.pipeline = Some(pipeline);
        self.pass_name = pipeline_state.pass_name;
        self.state = CmdListState::Recording;
        true
    }

    /// End recording. Rejected (returns `false`) without a prior successful
    /// `begin`.
    pub fn end(&mut self) -> bool {
        if self.state != CmdListState::Recording {
            crate::engine_error!("vesper::CommandList", "end() in state {:?}", self.state);
            return false;
        }

        if self.encoder.end_pass().is_err() {
            return false;
        }
        if self.profiling {
            let _ = self.encoder.timestamp(self.pass_name);
        }
        if self.encoder.end().is_err() {
            return false;
        }

        self.state = CmdListState::Ended;
        true
    }

    /// Submit the recorded pass. Rejected unless the list is in `Ended`;
    /// afterwards the list is back in `Idle` and a new `begin` succeeds.
    pub fn submit(&mut self) -> bool {
        if self.state != CmdListState::Ended {
            crate::engine_error!("vesper::CommandList", "submit() in state {:?}", self.state);
            return false;
        }

        if self.encoder.submit().is_err() {
            return false;
        }

        self.pipeline = None;
        self.state = CmdListState::Idle;
        true
    }

    /// Record the clears of `pipeline_state` as a standalone operation
    /// (no pass body). Valid only while idle.
    pub fn clear(&mut self, pipeline_state: &PipelineState) -> bool {
        if self.state != CmdListState::Idle {
            crate::engine_error!("vesper::CommandList", "clear() in state {:?}", self.state);
            return false;
        }

        let ok = self.encoder.begin().is_ok()
            && self.encoder.clear(pipeline_state).is_ok()
            && self.encoder.end().is_ok()
            && self.encoder.submit().is_ok();
        if !ok {
            crate::engine_error!("vesper::CommandList", "clear() failed for pass '{}'", pipeline_state.pass_name);
        }
        ok
    }

    /// Transition a texture to `layout`, recording the barrier through this
    /// list. Skipped when the texture is already in the requested layout.
    pub fn set_texture_layout(&mut self, texture: &Arc<dyn Texture>, layout: ImageLayout) -> Result<()> {
        if texture.layout() == layout {
            return Ok(());
        }
        self.encoder.transition_layout(texture, texture.layout(), layout)?;
        texture.record_layout(layout);
        Ok(())
    }

    /// Install the swap-chain acquire sync the next submit must wait on
    pub fn set_wait_sync(&mut self, sync: Option<Arc<dyn Any + Send + Sync>>) {
        self.encoder.set_wait_sync(sync);
    }

    // ===== BINDINGS =====
    //
    // Binding calls are buffered against the active pass and flushed to the
    // backend at draw time; re-binding an unchanged value on a slot skips the
    // backend call entirely.

    pub fn set_buffer_vertex(&mut self, buffer: &Arc<dyn Buffer>) {
        if !self.require_recording("set_buffer_vertex") {
            return;
        }
        if self.bindings.bound_vertex_buffer == Some(buffer.id()) {
            return;
        }
        self.bindings.pending_vertex_buffer = Some(buffer.clone());
    }

    pub fn set_buffer_index(&mut self, buffer: &Arc<dyn Buffer>) {
        if !self.require_recording("set_buffer_index") {
            return;
        }
        if self.bindings.bound_index_buffer == Some(buffer.id()) {
            return;
        }
        self.bindings.pending_index_buffer = Some(buffer.clone());
    }

    pub fn set_constant_buffer(&mut self, slot: u32, stages: ShaderStageFlags, buffer: &Arc<dyn Buffer>) {
        if !self.require_recording("set_constant_buffer") {
            return;
        }
        let key = (buffer.id(), buffer.offset_index());
        if self.bindings.bound_constant_buffers.get(&slot) == Some(&key) {
            return;
        }
        self.bindings
            .pending_constant_buffers
            .insert(slot, (stages, buffer.clone(), buffer.offset_index()));
    }

    pub fn set_sampler(&mut self, slot: u32, sampler: &Arc<dyn Sampler>) {
        if !self.require_recording("set_sampler") {
            return;
        }
        if self.bindings.bound_samplers.get(&slot) == Some(&sampler.id()) {
            return;
        }
        self.bindings.pending_samplers.insert(slot, sampler.clone());
    }

    pub fn set_texture(&mut self, slot: u32, texture: &Arc<dyn Texture>) {
        if !self.require_recording("set_texture") {
            return;
        }
        if self.bindings.bound_textures.get(&slot) == Some(&texture.id()) {
            return;
        }
        self.bindings.pending_textures.insert(slot, texture.clone());
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if !self.require_recording("set_viewport") {
            return;
        }
        let _ = self.encoder.set_viewport(viewport);
    }

    pub fn set_scissor_rectangle(&mut self, scissor: ScissorRect) {
        if !self.require_recording("set_scissor_rectangle") {
            return;
        }
        let _ = self.encoder.set_scissor(scissor);
    }

    // ===== DRAW / DISPATCH =====

    pub fn draw(&mut self, vertex_count: u32) -> bool {
        self.draw_offset(vertex_count, 0)
    }

    pub fn draw_offset(&mut self, vertex_count: u32, vertex_offset: u32) -> bool {
        if !self.require_recording("draw") {
            return false;
        }
        if self.flush_bindings().is_err() {
            return false;
        }
        self.encoder.draw(vertex_count, vertex_offset).is_ok()
    }

    pub fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: u32) -> bool {
        if !self.require_recording("draw_indexed") {
            return false;
        }
        if self.flush_bindings().is_err() {
            return false;
        }
        self.encoder
            .draw_indexed(index_count, index_offset, vertex_offset)
            .is_ok()
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> bool {
        if !self.require_recording("dispatch") {
            return false;
        }
        if self.flush_bindings().is_err() {
            return false;
        }
        self.encoder.dispatch(x, y, z).is_ok()
    }

    // ===== INTERNAL =====

    fn require_recording(&self, op: &str) -> bool {
        if self.state != CmdListState::Recording {
            crate::engine_error!("vesper::CommandList", "{}() outside of recording", op);
            return false;
        }
        true
    }

    /// Push every pending bind to the encoder and remember it as bound
    fn flush_bindings(&mut self) -> Result<()> {
        if let Some(buffer) = self.bindings.pending_vertex_buffer.take() {
            self.encoder.bind_vertex_buffer(&buffer)?;
            self.bindings.bound_vertex_buffer = Some(buffer.id());
        }
        if let Some(buffer) = self.bindings.pending_index_buffer.take() {
            self.encoder.bind_index_buffer(&buffer)?;
            self.bindings.bound_index_buffer = Some(buffer.id());
        }
        for (slot, (stages, buffer, offset_index)) in self.bindings.pending_constant_buffers.drain() {
            self.encoder.bind_constant_buffer(slot, stages, &buffer, offset_index)?;
            self.bindings.bound_constant_buffers.insert(slot, (buffer.id(), offset_index));
        }
        for (slot, sampler) in self.bindings.pending_samplers.drain() {
            self.encoder.bind_sampler(slot, &sampler)?;
            self.bindings.bound_samplers.insert(slot, sampler.id());
        }
        for (slot, texture) in self.bindings.pending_textures.drain() {
            self.encoder.bind_texture(slot, &texture)?;
            self.bindings.bound_textures.insert(slot, texture.id());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_list_tests.rs"]
mod tests;
