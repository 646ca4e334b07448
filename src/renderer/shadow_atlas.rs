//! Shadow Atlas Allocation
//!
//! All shadow maps of a frame share one square depth texture. Every
//! shadow-casting light asks for a contiguous run of slots (spot: 1,
//! point: 6 cube faces, directional: one per cascade). The atlas is cut into
//! `divisor × divisor` equal tiles, where `divisor` is the smallest power of
//! two whose square holds every accepted slot, and slots are laid out
//! row-major: left to right, wrapping to the next row at the atlas edge.
//!
//! Allocation is a single pass over one request list. A light whose run does
//! not fit in the remaining slot capacity is dropped as a whole and keeps
//! `shadow_atlas_index = -1`.

use glam::{Mat4, Vec2, Vec4};
use log::warn;
use smallvec::SmallVec;

use crate::renderer::device::Viewport;
use crate::resources::uniforms::{GpuShadowRegion, MAX_SHADOW_SLOTS};

/// One light's shadow request: one view-projection per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowRequest {
    /// Index of the light in the frame's light list.
    pub light_index: usize,
    pub view_projections: SmallVec<[Mat4; 6]>,
}

impl ShadowRequest {
    #[must_use]
    pub fn new(light_index: usize, view_projections: impl IntoIterator<Item = Mat4>) -> Self {
        Self {
            light_index,
            view_projections: view_projections.into_iter().collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.view_projections.len()
    }
}

/// One tile of the atlas, assigned to one face or cascade of one light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMapRegion {
    pub light_index: usize,
    /// Face or cascade index within the light's run.
    pub face: u32,
    pub view_projection: Mat4,
    /// Pixel rectangle in the atlas.
    pub rect: Viewport,
    pub uv_start: Vec2,
    pub uv_end: Vec2,
}

impl ShadowMapRegion {
    #[must_use]
    pub fn to_gpu(&self) -> GpuShadowRegion {
        GpuShadowRegion {
            view_projection: self.view_projection,
            uv_rect: Vec4::new(self.uv_start.x, self.uv_start.y, self.uv_end.x, self.uv_end.y),
        }
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let (a, b) = (self.rect, other.rect);
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }
}

/// Slots granted to one light: `first_slot..first_slot + slot_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightRun {
    pub light_index: usize,
    pub first_slot: usize,
    pub slot_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowAllocation {
    pub regions: Vec<ShadowMapRegion>,
    pub runs: SmallVec<[LightRun; 8]>,
    /// Tiles per atlas row (and column).
    pub divisor: u32,
    /// Tile edge length in texels.
    pub tile_size: u32,
    /// Requests dropped for lack of capacity.
    pub dropped: usize,
}

impl ShadowAllocation {
    /// The run granted to `light_index`, if any.
    #[must_use]
    pub fn run_for(&self, light_index: usize) -> Option<&LightRun> {
        self.runs.iter().find(|r| r.light_index == light_index)
    }

    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.regions.len()
    }
}

/// Smallest power of two `d` with `d * d >= slots` (1 for no slots).
#[must_use]
pub fn tile_divisor(slots: usize) -> u32 {
    let mut divisor = 1u32;
    while (divisor as usize) * (divisor as usize) < slots {
        divisor *= 2;
    }
    divisor
}

/// Packs `requests` into an `atlas_size²` atlas holding at most `max_slots`
/// tiles, and never more than the [`MAX_SHADOW_SLOTS`] regions the shadow
/// block can upload.
#[must_use]
pub fn allocate(requests: &[ShadowRequest], atlas_size: u32, max_slots: usize) -> ShadowAllocation {
    let texel_cap = (atlas_size as usize).saturating_mul(atlas_size as usize);
    let capacity = max_slots.min(MAX_SHADOW_SLOTS).min(texel_cap);

    let mut accepted: SmallVec<[&ShadowRequest; 8]> = SmallVec::new();
    let mut runs: SmallVec<[LightRun; 8]> = SmallVec::new();
    let mut used = 0usize;
    let mut dropped = 0usize;

    for request in requests {
        let count = request.slot_count();
        if count == 0 {
            continue;
        }
        if used + count > capacity {
            dropped += 1;
            continue;
        }
        runs.push(LightRun {
            light_index: request.light_index,
            first_slot: used,
            slot_count: count,
        });
        accepted.push(request);
        used += count;
    }

    if dropped > 0 {
        warn!(
            "Shadow atlas full: {dropped} light(s) dropped ({used}/{capacity} slots in use)"
        );
    }

    let divisor = tile_divisor(used);
    let tile_size = atlas_size / divisor;
    let inv_size = 1.0 / atlas_size.max(1) as f32;

    let mut regions = Vec::with_capacity(used);
    let (mut x, mut y) = (0u32, 0u32);
    for request in accepted {
        for (face, vp) in request.view_projections.iter().enumerate() {
            if x + tile_size > atlas_size {
                x = 0;
                y += tile_size;
            }
            let rect = Viewport::new(x, y, tile_size, tile_size);
            regions.push(ShadowMapRegion {
                light_index: request.light_index,
                face: face as u32,
                view_projection: *vp,
                rect,
                uv_start: Vec2::new(x as f32, y as f32) * inv_size,
                uv_end: Vec2::new((x + tile_size) as f32, (y + tile_size) as f32) * inv_size,
            });
            x += tile_size;
        }
    }

    ShadowAllocation {
        regions,
        runs,
        divisor,
        tile_size,
        dropped,
    }
}
