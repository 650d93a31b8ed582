/// World contracts - the entity data the renderer consumes
///
/// The world is a slotmap of entities; each entity optionally carries a
/// renderable, a light and a camera. The renderer filters and buckets them
/// every frame. Nothing here touches the GPU except the shadow-map textures
/// a light owns.

use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::error::Result;
use crate::rhi::{next_object_id, Buffer, RhiDevice, Texture, TextureDesc, TextureFormat, TextureUsage};

new_key_type! {
    /// Stable key of an entity in the world
    pub struct EntityKey;
}

// ============================================================================
// Geometry
// ============================================================================

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// The box transformed into world space (conservative: transforms the
    /// eight corners and re-fits)
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for corner in corners {
            let p = matrix.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }
}

/// GPU geometry of a renderable
#[derive(Clone)]
pub struct Geometry {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub index_buffer: Arc<dyn Buffer>,
    pub index_count: u32,
    pub index_offset: u32,
    pub vertex_offset: u32,
    /// Object-space bounds
    pub aabb: Aabb,
}

// ============================================================================
// Material
// ============================================================================

bitflags! {
    /// Texture-presence bitmask selecting the G-buffer shader variation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VariationFlags: u32 {
        const ALBEDO    = 1 << 0;
        const ROUGHNESS = 1 << 1;
        const METALLIC  = 1 << 2;
        const NORMAL    = 1 << 3;
        const HEIGHT    = 1 << 4;
        const OCCLUSION = 1 << 5;
        const EMISSION  = 1 << 6;
        const MASK      = 1 << 7;
    }
}

/// Material texture slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialTexture {
    Albedo,
    Roughness,
    Metallic,
    Normal,
    Height,
    Occlusion,
    Emission,
    Mask,
}

impl MaterialTexture {
    fn variation_flag(&self) -> VariationFlags {
        match self {
            MaterialTexture::Albedo => VariationFlags::ALBEDO,
            MaterialTexture::Roughness => VariationFlags::ROUGHNESS,
            MaterialTexture::Metallic => VariationFlags::METALLIC,
            MaterialTexture::Normal => VariationFlags::NORMAL,
            MaterialTexture::Height => VariationFlags::HEIGHT,
            MaterialTexture::Occlusion => VariationFlags::OCCLUSION,
            MaterialTexture::Emission => VariationFlags::EMISSION,
            MaterialTexture::Mask => VariationFlags::MASK,
        }
    }
}

/// Surface description of a renderable
pub struct Material {
    id: u64,
    pub color_albedo: Vec4,
    pub tiling_uv: Vec2,
    pub offset_uv: Vec2,
    pub roughness_multiplier: f32,
    pub metallic_multiplier: f32,
    pub normal_multiplier: f32,
    pub height_multiplier: f32,
    textures: FxHashMap<MaterialTexture, Arc<dyn Texture>>,
}

impl Material {
    pub fn new() -> Self {
        Self {
            id: next_object_id(),
            color_albedo: Vec4::ONE,
            tiling_uv: Vec2::ONE,
            offset_uv: Vec2::ZERO,
            roughness_multiplier: 1.0,
            metallic_multiplier: 0.0,
            normal_multiplier: 0.0,
            height_multiplier: 0.0,
            textures: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_texture(&mut self, slot: MaterialTexture, texture: Arc<dyn Texture>) {
        self.textures.insert(slot, texture);
    }

    pub fn texture(&self, slot: MaterialTexture) -> Option<&Arc<dyn Texture>> {
        self.textures.get(&slot)
    }

    /// The texture-presence bitmask that selects the G-buffer shader
    /// variation for this material
    pub fn variation_flags(&self) -> VariationFlags {
        let mut flags = VariationFlags::empty();
        for slot in self.textures.keys() {
            flags |= slot.variation_flag();
        }
        flags
    }

    /// Transparent materials render in the transparent visibility class
    pub fn is_transparent(&self) -> bool {
        self.color_albedo.w < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

/// Mesh + material + shadow participation
#[derive(Clone)]
pub struct Renderable {
    pub geometry: Geometry,
    pub material: Arc<Material>,
    pub cast_shadows: bool,
}

// ============================================================================
// Light
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

/// Shadow-map textures owned by a light
#[derive(Clone)]
pub struct ShadowMap {
    /// Depth array (cascades / cube faces / single slice)
    pub depth: Arc<dyn Texture>,
    /// Color target for transparent shadows, if the light casts them
    pub color: Option<Arc<dyn Texture>>,
    pub resolution: u32,
}

pub struct Light {
    pub light_type: LightType,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    /// Cone angle in radians (spot lights)
    pub angle: f32,
    pub bias: f32,
    pub normal_bias: f32,
    pub shadows_enabled: bool,
    pub shadows_transparent_enabled: bool,
    pub shadows_screen_space_enabled: bool,
    pub volumetric_enabled: bool,
    shadow_map: Option<ShadowMap>,
}

impl Light {
    pub fn new(light_type: LightType) -> Self {
        Self {
            light_type,
            color: Vec4::ONE,
            intensity: 2.0,
            range: 10.0,
            angle: 0.5,
            bias: 0.0001,
            normal_bias: 2.0,
            shadows_enabled: light_type == LightType::Directional,
            shadows_transparent_enabled: false,
            shadows_screen_space_enabled: false,
            volumetric_enabled: false,
            shadow_map: None,
        }
    }

    /// Number of shadow-map array slices for this light type
    /// (cascades, cube faces, or one)
    pub fn shadow_array_size(&self) -> u32 {
        match self.light_type {
            LightType::Directional => 4,
            LightType::Point => 6,
            LightType::Spot => 1,
        }
    }

    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    /// (Re)create the shadow-map textures at `resolution`.
    ///
    /// Called at light creation and again whenever the shadow-resolution
    /// option changes.
    pub fn create_shadow_map(&mut self, device: &dyn RhiDevice, resolution: u32) -> Result<()> {
        if !self.shadows_enabled {
            self.shadow_map = None;
            return Ok(());
        }

        let array_size = self.shadow_array_size();

        let depth = device.create_texture(&TextureDesc {
            width: resolution,
            height: resolution,
            array_layers: array_size,
            mip_levels: 1,
            format: TextureFormat::D32_FLOAT,
            usage: TextureUsage::DEPTH_STENCIL | TextureUsage::SAMPLED,
            name: "light_shadow_depth".to_string(),
        })?;

        let color = if self.shadows_transparent_enabled {
            Some(device.create_texture(&TextureDesc {
                width: resolution,
                height: resolution,
                array_layers: array_size,
                mip_levels: 1,
                format: TextureFormat::R8G8B8A8_UNORM,
                usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                name: "light_shadow_color".to_string(),
            })?)
        } else {
            None
        };

        self.shadow_map = Some(ShadowMap { depth, color, resolution });
        Ok(())
    }

    /// View matrix for a shadow-map slice, derived from the owning entity's
    /// transform
    pub fn view_matrix(&self, slice: u32, position: Vec3, direction: Vec3) -> Mat4 {
        match self.light_type {
            LightType::Directional | LightType::Spot => {
                let eye = position;
                Mat4::look_at_rh(eye, eye + direction, up_for(direction))
            }
            LightType::Point => {
                let (forward, up) = cube_face_basis(slice);
                Mat4::look_at_rh(position, position + forward, up)
            }
        }
    }

    /// Projection matrix for a shadow-map slice
    pub fn projection_matrix(&self, slice: u32) -> Mat4 {
        match self.light_type {
            LightType::Directional => {
                // Cascade extents double per slice
                let extent = 10.0 * (1 << slice) as f32;
                Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.1, self.range.max(extent * 4.0))
            }
            LightType::Point => {
                Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, self.range)
            }
            LightType::Spot => Mat4::perspective_rh(self.angle * 2.0, 1.0, 0.1, self.range),
        }
    }

    /// Conservative visibility test of a world-space box against the light's
    /// shadow volume
    pub fn is_in_view(&self, aabb: &Aabb, light_position: Vec3) -> bool {
        match self.light_type {
            // Directional lights capture every caster ("pancaking" keeps
            // behind-the-view silhouettes)
            LightType::Directional => true,
            LightType::Point | LightType::Spot => {
                let closest = aabb.center().distance(light_position);
                let radius = aabb.extent().length() * 0.5;
                closest - radius <= self.range
            }
        }
    }
}

/// A stable up vector that is never collinear with the light direction
fn up_for(direction: Vec3) -> Vec3 {
    if direction.normalize_or_zero().dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Forward/up pair for each cube-map face
fn cube_face_basis(face: u32) -> (Vec3, Vec3) {
    match face {
        0 => (Vec3::X, Vec3::Y),
        1 => (Vec3::NEG_X, Vec3::Y),
        2 => (Vec3::Y, Vec3::NEG_Z),
        3 => (Vec3::NEG_Y, Vec3::Z),
        4 => (Vec3::Z, Vec3::Y),
        _ => (Vec3::NEG_Z, Vec3::Y),
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Camera data the renderer reads each frame
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub forward: Vec3,
    pub clear_color: Vec4,
}

impl Camera {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Frustum test against a world-space box
    pub fn is_in_view_frustum(&self, aabb: &Aabb) -> bool {
        Frustum::from_view_projection(&self.view_projection()).intersects(aabb)
    }
}

/// Six clipping planes extracted from a view-projection matrix
/// (Gribb & Hartmann). Works for perspective and orthographic projections.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let m = vp.to_cols_array_2d();

        let mut planes = [
            Vec4::new(m[0][3] + m[0][0], m[1][3] + m[1][0], m[2][3] + m[2][0], m[3][3] + m[3][0]),
            Vec4::new(m[0][3] - m[0][0], m[1][3] - m[1][0], m[2][3] - m[2][0], m[3][3] - m[3][0]),
            Vec4::new(m[0][3] + m[0][1], m[1][3] + m[1][1], m[2][3] + m[2][1], m[3][3] + m[3][1]),
            Vec4::new(m[0][3] - m[0][1], m[1][3] - m[1][1], m[2][3] - m[2][1], m[3][3] - m[3][1]),
            Vec4::new(m[0][3] + m[0][2], m[1][3] + m[1][2], m[2][3] + m[2][2], m[3][3] + m[3][2]),
            Vec4::new(m[0][3] - m[0][2], m[1][3] - m[1][2], m[2][3] - m[2][2], m[3][3] - m[3][2]),
        ];

        for plane in &mut planes {
            let normal_len = Vec3::new(plane.x, plane.y, plane.z).length();
            if normal_len > 0.0 {
                *plane /= normal_len;
            }
        }

        Self { planes }
    }

    /// Positive-vertex test: the box is outside as soon as its most-inward
    /// corner is behind any plane
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let positive = Vec3::new(
                if plane.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.x * positive.x + plane.y * positive.y + plane.z * positive.z + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// World
// ============================================================================

/// An entity the renderer can consume: a transform plus optional
/// renderable/light/camera capabilities
pub struct Entity {
    pub active: bool,
    pub transform: Mat4,
    pub renderable: Option<Renderable>,
    pub light: Option<Light>,
    pub camera: Option<Camera>,
}

impl Entity {
    pub fn new() -> Self {
        Self {
            active: true,
            transform: Mat4::IDENTITY,
            renderable: None,
            light: None,
            camera: None,
        }
    }

    /// Position column of the transform
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    /// Forward axis of the transform (negative Z)
    pub fn forward(&self) -> Vec3 {
        -self.transform.z_axis.truncate().normalize_or_zero()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

/// Entity storage with stable keys
#[derive(Default)]
pub struct World {
    entities: SlotMap<EntityKey, Entity>,
}

impl World {
    pub fn new() -> Self {
        Self { entities: SlotMap::with_key() }
    }

    pub fn add(&mut self, entity: Entity) -> EntityKey {
        self.entities.insert(entity)
    }

    pub fn remove(&mut self, key: EntityKey) -> Option<Entity> {
        self.entities.remove(key)
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityKey, &mut Entity)> {
        self.entities.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
#[path = "world_tests.rs"]
mod tests;
