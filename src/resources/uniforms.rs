//! GPU uniform blocks.
//!
//! Every block is `#[repr(C)]` + `Pod`, laid out in 16-byte rows so the same
//! bytes can be uploaded to a std140 uniform buffer without repacking. The
//! renderer binds each block to a fixed [`UniformSlot`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3, Vec4};

/// Hard capacity of the light block. Lights past this are dropped.
pub const MAX_LIGHTS: usize = 16;

/// Hard capacity of the shadow-region block.
pub const MAX_SHADOW_SLOTS: usize = 64;

/// Fixed uniform-buffer binding slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum UniformSlot {
    /// Per-pass data: view, projection, camera, time.
    Frame = 0,
    /// Per-draw data: model, MVP, normal matrix.
    Object = 1,
    /// Light snapshots and `Light_LightCount`.
    Lights = 2,
    /// Shadow-atlas regions.
    Shadows = 3,
}

impl UniformSlot {
    #[inline]
    #[must_use]
    pub fn binding(self) -> u32 {
        self as u32
    }
}

/// 3x3 matrix padded to three `vec4` columns.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Mat3Uniform(pub [Vec4; 3]);

impl From<Mat3> for Mat3Uniform {
    fn from(m: Mat3) -> Self {
        Self([m.x_axis.extend(0.0), m.y_axis.extend(0.0), m.z_axis.extend(0.0)])
    }
}

// ============================================================================
// Per-pass / per-draw blocks
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub time: f32,
    /// x, y, width, height in pixels.
    pub viewport: Vec4,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            time: 0.0,
            viewport: Vec4::ZERO,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: Mat4,
    pub model_view_projection: Mat4,
    pub normal_matrix: Mat3Uniform,
}

impl ObjectUniforms {
    #[must_use]
    pub fn new(model: Mat4, view_projection: Mat4) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        let normal = if normal.is_finite() { normal } else { Mat3::IDENTITY };
        Self {
            model,
            model_view_projection: view_projection * model,
            normal_matrix: normal.into(),
        }
    }
}

// ============================================================================
// Lights
// ============================================================================

/// Shader-side light type tag.
pub const LIGHT_TYPE_POINT: u32 = 0;
pub const LIGHT_TYPE_SPOT: u32 = 1;
pub const LIGHT_TYPE_DIRECTIONAL: u32 = 2;

/// Value snapshot of one light as the shading pass reads it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: Vec3,
    pub range: f32,

    pub direction: Vec3,
    /// Cosine of the spot half-angle; unused by other types.
    pub spot_cos: f32,

    pub color: Vec3,
    pub intensity: f32,

    /// Constant, linear, quadratic.
    pub attenuation: Vec3,
    pub light_type: u32,

    /// First shadow-atlas slot of this light, `-1` when it has none.
    pub shadow_atlas_index: i32,
    pub shadow_slot_count: u32,
    pub shadow_bias: f32,
    pub _pad: u32,
}

impl Default for GpuLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            range: 0.0,
            direction: -Vec3::Z,
            spot_cos: 0.0,
            color: Vec3::ONE,
            intensity: 0.0,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
            light_type: LIGHT_TYPE_POINT,
            shadow_atlas_index: -1,
            shadow_slot_count: 0,
            shadow_bias: 0.0,
            _pad: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightBlock {
    pub lights: [GpuLight; MAX_LIGHTS],
    /// `Light_LightCount` in the shader interface.
    pub light_count: u32,
    pub _pad: [u32; 3],
}

impl Default for LightBlock {
    fn default() -> Self {
        Self {
            lights: [GpuLight::default(); MAX_LIGHTS],
            light_count: 0,
            _pad: [0; 3],
        }
    }
}

// ============================================================================
// Shadows
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuShadowRegion {
    pub view_projection: Mat4,
    /// Normalized atlas rectangle: start in `xy`, end in `zw`.
    pub uv_rect: Vec4,
}

impl Default for GpuShadowRegion {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            uv_rect: Vec4::ZERO,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ShadowBlock {
    pub regions: [GpuShadowRegion; MAX_SHADOW_SLOTS],
    pub region_count: u32,
    pub _pad: [u32; 3],
}

impl Default for ShadowBlock {
    fn default() -> Self {
        Self {
            regions: [GpuShadowRegion::default(); MAX_SHADOW_SLOTS],
            region_count: 0,
            _pad: [0; 3],
        }
    }
}
