/// Pipeline cache - memoizes backend pipeline objects by content hash
///
/// Two pipeline states with identical shaders, fixed-function state and
/// render-target sets resolve to the same backend object; changing any one
/// field produces a cache miss and a new object.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::rhi::{DescriptorSetLayout, Pipeline, PipelineState, RhiDevice};

pub struct PipelineCache {
    pipelines: FxHashMap<u64, Arc<dyn Pipeline>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self { pipelines: FxHashMap::default() }
    }

    /// Resolve a pipeline for the given state, creating and caching it on a
    /// miss. The descriptor set layout must be the one resolved for the same
    /// state by the `DescriptorCache`.
    pub fn acquire(
        &mut self,
        device: &dyn RhiDevice,
        state: &PipelineState,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<Arc<dyn Pipeline>> {
        let hash = state.compute_hash();

        if let Some(pipeline) = self.pipelines.get(&hash) {
            return Ok(pipeline.clone());
        }

        let pipeline = device.create_pipeline(state, layout)?;
        crate::engine_debug!(
            "vesper::PipelineCache",
            "Created pipeline for pass '{}' ({} cached)",
            state.pass_name,
            self.pipelines.len() + 1
        );
        self.pipelines.insert(hash, pipeline.clone());
        Ok(pipeline)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Drop every cached pipeline (resolution change, device loss)
    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}
