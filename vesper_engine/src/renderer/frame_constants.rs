/// Constant buffer layouts and their dirty-checked GPU mirrors
///
/// Every CPU-side struct pairs with a GPU buffer and the snapshot of the
/// last-uploaded contents; uploads happen only when the contents changed
/// (an optimization, not a correctness requirement — the per-frame buffer
/// uploads unconditionally since its data changes by definition).

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::Result;
use crate::rhi::{next_capacity, Buffer, BufferDesc, BufferKind, RhiDevice};

/// Per-frame data: camera matrices, jitter, time, post-process parameters
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub view_projection_inv: Mat4,
    pub view_projection_unjittered: Mat4,
    pub view_projection_ortho: Mat4,

    pub camera_position: Vec3,
    pub camera_near: f32,
    pub camera_direction: Vec3,
    pub camera_far: f32,

    pub taa_jitter_offset: Vec2,
    pub taa_jitter_offset_previous: Vec2,

    pub delta_time: f32,
    pub time: f32,
    pub bloom_intensity: f32,
    pub sharpen_strength: f32,

    pub sharpen_clamp: f32,
    pub motion_blur_strength: f32,
    pub gamma: f32,
    pub exposure: f32,

    pub tonemapping: f32,
    pub directional_light_intensity: f32,
    pub ssr_enabled: f32,
    pub shadow_resolution: f32,
}

impl Default for FrameConstants {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

/// Per-pass scratch data: transform, material parameters, resolution,
/// blur parameters
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UberConstants {
    pub transform: Mat4,

    pub mat_albedo: Vec4,

    pub mat_tiling_uv: Vec2,
    pub mat_offset_uv: Vec2,

    pub mat_roughness_mul: f32,
    pub mat_metallic_mul: f32,
    pub mat_normal_mul: f32,
    pub mat_height_mul: f32,

    pub resolution: Vec2,
    pub blur_direction: Vec2,

    pub blur_sigma: f32,
    pub is_transparent_pass: f32,
    pub taa_feedback: f32,
    pub padding: f32,
}

impl Default for UberConstants {
    fn default() -> Self {
        let mut value: Self = Zeroable::zeroed();
        value.transform = Mat4::IDENTITY;
        value.mat_albedo = Vec4::ONE;
        value.mat_tiling_uv = Vec2::ONE;
        value
    }
}

/// Per-object data, indexed per-draw through the dynamic offset
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub object: Mat4,
    pub wvp_current: Mat4,
    pub wvp_previous: Mat4,
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self {
            object: Mat4::IDENTITY,
            wvp_current: Mat4::IDENTITY,
            wvp_previous: Mat4::IDENTITY,
        }
    }
}

/// Per-light data for the deferred lighting pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightConstants {
    /// One view-projection per shadow-map slice
    pub view_projection: [Mat4; 6],
    pub intensity_range_angle_bias: Vec4,
    pub normal_bias_shadow_volumetric_contact: Vec4,
    pub color: Vec4,
    pub position: Vec4,
    pub direction: Vec4,
}

impl Default for LightConstants {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

/// A CPU constant struct paired with its GPU buffer and the snapshot of the
/// last upload
pub struct ConstantBufferSet<T: Pod + PartialEq> {
    pub cpu: T,
    previous: Option<T>,
    gpu: Arc<dyn Buffer>,
}

impl<T: Pod + PartialEq + Default> ConstantBufferSet<T> {
    /// Create with `element_count` slots (1 for plain buffers, more for the
    /// dynamically indexed per-object buffer)
    pub fn new(device: &dyn RhiDevice, name: &str, element_count: u32) -> Result<Self> {
        let gpu = device.create_buffer(&BufferDesc {
            kind: BufferKind::Constant,
            stride: std::mem::size_of::<T>() as u32,
            element_count,
            dynamic: true,
            name: name.to_string(),
        })?;
        Ok(Self { cpu: T::default(), previous: None, gpu })
    }

    pub fn gpu(&self) -> &Arc<dyn Buffer> {
        &self.gpu
    }

    /// Upload unconditionally (per-frame data)
    pub fn upload(&mut self) -> Result<()> {
        let bytes = bytemuck::bytes_of(&self.cpu);
        self.gpu.map_write(0, &mut |dst| {
            dst[..bytes.len()].copy_from_slice(bytes);
        })?;
        self.previous = Some(self.cpu);
        Ok(())
    }

    /// Upload only when the contents differ from the last upload.
    /// Returns whether an upload happened.
    pub fn upload_if_dirty(&mut self) -> Result<bool> {
        if self.previous.as_ref() == Some(&self.cpu) {
            return Ok(false);
        }
        self.upload()?;
        Ok(true)
    }

    /// Upload to the dynamic slot `offset_index`, growing the buffer by
    /// doubling when the index is out of range. Returns whether an upload
    /// happened (same content at the same offset skips).
    pub fn upload_dynamic(&mut self, offset_index: u32) -> Result<bool> {
        let same_content = self.previous.as_ref() == Some(&self.cpu);
        let same_offset = self.gpu.offset_index() == offset_index;
        if same_content && same_offset {
            return Ok(false);
        }

        let required = offset_index + 1;
        if required > self.gpu.element_count() {
            let new_count = next_capacity(self.gpu.element_count(), required);
            self.gpu.reallocate(new_count)?;
            crate::engine_info!(
                "vesper::ConstantBufferSet",
                "Re-allocated dynamic buffer to {} slots",
                new_count
            );
        }

        self.gpu.set_offset_index(offset_index);

        let bytes = bytemuck::bytes_of(&self.cpu);
        self.gpu.map_write(offset_index, &mut |dst| {
            dst[..bytes.len()].copy_from_slice(bytes);
        })?;
        self.previous = Some(self.cpu);
        Ok(true)
    }
}

#[cfg(test)]
#[path = "frame_constants_tests.rs"]
mod tests;
