/// Descriptor cache - deduplicates descriptor-set layouts per shader pair
///
/// Layouts are keyed by the combined hash of the vertex + pixel shader ids.
/// On a miss the reflected bindings of both stages are merged (same
/// {type, slot} in both stages ORs the stage visibility instead of
/// duplicating the entry), the designated dynamic slot is promoted, and the
/// backend layout is created and cached.

use std::any::Any;
use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::rhi::{DescriptorBinding, DescriptorType, PipelineState, RhiDevice};

/// Initial descriptor-set pool capacity
pub const DESCRIPTOR_SET_CAPACITY_INITIAL: u32 = 256;

/// Descriptor set layout trait - an opaque backend layout plus the set
/// allocations made against it
pub trait DescriptorSetLayout: Send + Sync {
    fn id(&self) -> u64;

    /// The merged bindings this layout was created from
    fn bindings(&self) -> &[DescriptorBinding];

    /// Number of descriptor sets allocated from the pool for this layout
    fn set_count(&self) -> u32;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// Merge pixel-stage bindings into the vertex-stage list.
///
/// A binding present in both stages (same type and slot) keeps one entry
/// with the stage flags ORed together; bindings unique to the pixel stage
/// are appended.
pub fn merge_descriptors(
    vertex: &[DescriptorBinding],
    pixel: &[DescriptorBinding],
) -> Vec<DescriptorBinding> {
    let mut merged = vertex.to_vec();

    for reflected in pixel {
        let mut updated_existing = false;
        for binding in merged.iter_mut() {
            if binding.ty == reflected.ty && binding.slot == reflected.slot {
                binding.stages |= reflected.stages;
                updated_existing = true;
                break;
            }
        }
        if !updated_existing {
            merged.push(*reflected);
        }
    }

    merged
}

/// Promote the constant buffer at `slot` to a dynamic constant buffer
/// (per-draw offset indexing).
pub fn promote_dynamic(bindings: &mut [DescriptorBinding], slot: u32) {
    for binding in bindings.iter_mut() {
        if binding.ty == DescriptorType::ConstantBuffer && binding.slot == slot {
            binding.ty = DescriptorType::ConstantBufferDynamic;
        }
    }
}

pub struct DescriptorCache {
    layouts: FxHashMap<u64, Arc<dyn DescriptorSetLayout>>,
    capacity: u32,
}

impl DescriptorCache {
    /// Create the cache, allocating the backend pool at the initial capacity.
    pub fn new(device: &dyn RhiDevice) -> Result<Self> {
        Self::with_capacity(device, DESCRIPTOR_SET_CAPACITY_INITIAL)
    }

    /// Create the cache with an explicit starting capacity (tests use a tiny
    /// one to exercise growth).
    pub fn with_capacity(device: &dyn RhiDevice, capacity: u32) -> Result<Self> {
        device.set_descriptor_set_capacity(capacity)?;
        Ok(Self { layouts: FxHashMap::default(), capacity })
    }

    /// Resolve the descriptor set layout for a pipeline state, creating it
    /// from shader reflection on a miss.
    ///
    /// Both shaders must have finished compiling; `CommandList::begin`
    /// guarantees this before calling in.
    pub fn set_pipeline_state(
        &mut self,
        device: &dyn RhiDevice,
        state: &PipelineState,
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        let shader_vertex = state
            .shader_vertex
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("pipeline state has no vertex shader".to_string()))?;

        let hash = state.shader_hash();

        if let Some(layout) = self.layouts.get(&hash) {
            return Ok(layout.clone());
        }

        // Generate descriptors from the reflected shaders
        let mut bindings = match &state.shader_pixel {
            Some(shader_pixel) => {
                merge_descriptors(&shader_vertex.descriptors(), &shader_pixel.descriptors())
            }
            None => shader_vertex.descriptors(),
        };

        if let Some(slot) = state.dynamic_constant_buffer_slot {
            promote_dynamic(&mut bindings, slot);
        }

        let layout = device.create_descriptor_set_layout(&bindings)?;
        self.layouts.insert(hash, layout.clone());
        Ok(layout)
    }

    /// Total descriptor sets allocated across every cached layout
    pub fn descriptor_set_count(&self) -> u32 {
        self.layouts.values().map(|layout| layout.set_count()).sum()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn has_enough_capacity(&self) -> bool {
        self.capacity > self.descriptor_set_count()
    }

    /// Double the pool if one more descriptor set would not fit.
    ///
    /// Growing is stop-the-world: every queue is drained, all cached
    /// layouts/sets are destroyed, and the pool is re-allocated at the new
    /// capacity. Callers must tolerate the frame hitch.
    pub fn grow_if_needed(&mut self, device: &dyn RhiDevice) -> Result<()> {
        // Room for at least one more set (hence +1) means no re-allocation yet
        let required_capacity = self.descriptor_set_count() + 1;
        if required_capacity <= self.capacity {
            return Ok(());
        }

        self.capacity *= 2;

        device.queue_wait_all()?;
        self.layouts.clear();
        device.set_descriptor_set_capacity(self.capacity)?;

        crate::engine_info!(
            "vesper::DescriptorCache",
            "Capacity has been increased to {} sets",
            self.capacity
        );
        Ok(())
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }
}

#[cfg(test)]
#[path = "descriptor_cache_tests.rs"]
mod tests;
