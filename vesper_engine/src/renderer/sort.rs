/// Renderable draw ordering
///
/// Visibility classes sort front-to-back by a composite key: squared
/// camera-to-bounds-center distance first, material id second. The two
/// values pack into one u64 and the list radix-sorts on it — an exact tuple
/// comparison (non-negative f32 bit patterns order like the floats).

use glam::Vec3;
use rdst::{RadixKey, RadixSort};

use crate::renderer::world::{EntityKey, World};

/// One sortable draw entry
#[derive(Debug, Clone, Copy)]
pub struct DrawKey {
    key: u64,
    pub entity: EntityKey,
}

impl RadixKey for DrawKey {
    const LEVELS: usize = 8;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.key >> (level * 8)) as u8
    }
}

/// Pack (distance², material id) into one ascending sort key.
/// Distance is the primary ordering, material id breaks ties.
pub fn pack_draw_key(distance_sq: f32, material_id: u64) -> u64 {
    ((distance_sq.max(0.0).to_bits() as u64) << 32) | (material_id & 0xFFFF_FFFF)
}

/// Sort a visibility class front-to-back (then by material id).
///
/// Entities without a renderable or material keep a zero key, matching the
/// behavior of sorting them to the front.
pub fn sort_renderables(world: &World, keys: &mut Vec<EntityKey>, camera_position: Vec3) {
    if keys.len() <= 2 {
        return;
    }

    let mut draws: Vec<DrawKey> = keys
        .iter()
        .map(|&entity| {
            let key = world
                .get(entity)
                .and_then(|e| e.renderable.as_ref().map(|r| (e, r)))
                .map(|(e, renderable)| {
                    let center = renderable.geometry.aabb.transformed(&e.transform).center();
                    let distance_sq = center.distance_squared(camera_position);
                    pack_draw_key(distance_sq, renderable.material.id())
                })
                .unwrap_or(0);
            DrawKey { key, entity }
        })
        .collect();

    draws.radix_sort_unstable();

    keys.clear();
    keys.extend(draws.iter().map(|draw| draw.entity));
}

#[cfg(test)]
#[path = "sort_tests.rs"]
mod tests;
