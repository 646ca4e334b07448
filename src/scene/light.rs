//! Lights and the light-gathering system.
//!
//! A [`Light`] is a plain scene object. Its shader-visible form, [`GpuLight`],
//! is a value snapshot regenerated only when a field changed or the owning
//! node moved (tracked through the node's transform revision).
//!
//! [`LightSystem`] keeps the list of lights in attach order and, before the
//! render hooks run, gathers the active ones into [`LightSnapshot`]s for the
//! renderer. Lights past the capacity ceiling are dropped with a warning.

use glam::{Affine3A, Vec3};
use log::warn;

use crate::resources::uniforms::{
    GpuLight, LIGHT_TYPE_DIRECTIONAL, LIGHT_TYPE_POINT, LIGHT_TYPE_SPOT, MAX_LIGHTS,
};
use crate::scene::component::SceneComponent;
use crate::scene::object::{GameObject, ObjectInfo};
use crate::scene::{ObjectKey, Scene};
use crate::utils::FrameTime;

/// Upper bound on directional shadow cascades.
pub const MAX_CASCADES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    Point,
    Spot,
    Directional,
}

impl LightType {
    #[must_use]
    pub fn shader_tag(self) -> u32 {
        match self {
            Self::Point => LIGHT_TYPE_POINT,
            Self::Spot => LIGHT_TYPE_SPOT,
            Self::Directional => LIGHT_TYPE_DIRECTIONAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Light {
    color: Vec3,
    light_type: LightType,
    range: f32,
    /// Full cone angle in degrees.
    spot_angle: f32,
    intensity: f32,
    /// Constant, linear, quadratic.
    attenuation: Vec3,
    casts_shadows: bool,
    shadow_bias: f32,
    cascade_count: u32,

    dirty: bool,
    seen_revision: Option<u64>,
    snapshot: GpuLight,
}

impl GameObject for Light {}

impl Light {
    fn with_type(light_type: LightType, color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            light_type,
            range: 10.0,
            spot_angle: 45.0,
            intensity,
            attenuation: Vec3::new(1.0, 0.09, 0.032),
            casts_shadows: false,
            shadow_bias: 0.005,
            cascade_count: MAX_CASCADES,
            dirty: true,
            seen_revision: None,
            snapshot: GpuLight::default(),
        }
    }

    #[must_use]
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        let mut light = Self::with_type(LightType::Point, color, intensity);
        light.range = range;
        light
    }

    /// `angle` is the full cone angle in degrees.
    #[must_use]
    pub fn spot(color: Vec3, intensity: f32, range: f32, angle: f32) -> Self {
        let mut light = Self::with_type(LightType::Spot, color, intensity);
        light.range = range;
        light.spot_angle = angle.clamp(0.0, 179.0);
        light
    }

    #[must_use]
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self::with_type(LightType::Directional, color, intensity)
    }

    #[must_use]
    pub fn with_shadows(mut self, casts_shadows: bool) -> Self {
        self.set_casts_shadows(casts_shadows);
        self
    }

    #[must_use]
    pub fn with_cascades(mut self, count: u32) -> Self {
        self.set_cascade_count(count);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.dirty = true;
    }

    #[must_use]
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    pub fn set_light_type(&mut self, light_type: LightType) {
        self.light_type = light_type;
        self.dirty = true;
    }

    #[must_use]
    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = range.max(0.0);
        self.dirty = true;
    }

    #[must_use]
    pub fn spot_angle(&self) -> f32 {
        self.spot_angle
    }

    pub fn set_spot_angle(&mut self, degrees: f32) {
        self.spot_angle = degrees.clamp(0.0, 179.0);
        self.dirty = true;
    }

    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
        self.dirty = true;
    }

    #[must_use]
    pub fn attenuation(&self) -> Vec3 {
        self.attenuation
    }

    pub fn set_attenuation(&mut self, constant: f32, linear: f32, quadratic: f32) {
        self.attenuation = Vec3::new(constant, linear, quadratic);
        self.dirty = true;
    }

    #[must_use]
    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        self.casts_shadows = casts_shadows;
        self.dirty = true;
    }

    #[must_use]
    pub fn shadow_bias(&self) -> f32 {
        self.shadow_bias
    }

    pub fn set_shadow_bias(&mut self, bias: f32) {
        self.shadow_bias = bias;
        self.dirty = true;
    }

    #[must_use]
    pub fn cascade_count(&self) -> u32 {
        self.cascade_count
    }

    /// Clamped to `1..=MAX_CASCADES`.
    pub fn set_cascade_count(&mut self, count: u32) {
        self.cascade_count = count.clamp(1, MAX_CASCADES);
        self.dirty = true;
    }

    /// Shadow-atlas slots this light needs when it casts shadows.
    #[must_use]
    pub fn shadow_slot_count(&self) -> u32 {
        match self.light_type {
            LightType::Spot => 1,
            LightType::Point => 6,
            LightType::Directional => self.cascade_count,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ========================================================================
    // Shader representation
    // ========================================================================

    /// Returns the shader snapshot, rebuilding it when a field changed or
    /// `transform_revision` differs from the one last seen. Clears the dirty
    /// flag.
    ///
    /// The shadow fields are left at "no shadow"; the renderer fills them
    /// per frame.
    pub fn shader_data(&mut self, world: &Affine3A, transform_revision: u64) -> GpuLight {
        if self.dirty || self.seen_revision != Some(transform_revision) {
            let direction = world
                .transform_vector3(Vec3::NEG_Z)
                .normalize_or(Vec3::NEG_Z);
            self.snapshot = GpuLight {
                position: world.translation.into(),
                range: self.range,
                direction,
                spot_cos: (self.spot_angle.to_radians() * 0.5).cos(),
                color: self.color,
                intensity: self.intensity,
                attenuation: self.attenuation,
                light_type: self.light_type.shader_tag(),
                shadow_atlas_index: -1,
                shadow_slot_count: 0,
                shadow_bias: self.shadow_bias,
                _pad: 0,
            };
            self.dirty = false;
            self.seen_revision = Some(transform_revision);
        }
        self.snapshot
    }
}

// ============================================================================
// Light System
// ============================================================================

/// One active light as the renderer consumes it.
#[derive(Debug, Clone, Copy)]
pub struct LightSnapshot {
    pub key: ObjectKey,
    pub light_type: LightType,
    pub world: Affine3A,
    pub casts_shadows: bool,
    pub cascade_count: u32,
    /// Full cone angle in degrees.
    pub spot_angle: f32,
    pub range: f32,
    pub gpu: GpuLight,
}

impl LightSnapshot {
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.gpu.position
    }

    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.gpu.direction
    }
}

pub struct LightSystem {
    lights: Vec<ObjectKey>,
    snapshots: Vec<LightSnapshot>,
    max_lights: usize,
}

impl Default for LightSystem {
    fn default() -> Self {
        Self::new(MAX_LIGHTS)
    }
}

impl LightSystem {
    /// `max_lights` is capped at the light block capacity.
    #[must_use]
    pub fn new(max_lights: usize) -> Self {
        Self {
            lights: Vec::new(),
            snapshots: Vec::with_capacity(max_lights.min(MAX_LIGHTS)),
            max_lights: max_lights.min(MAX_LIGHTS),
        }
    }

    /// Every registered light, active or not, in attach order.
    #[must_use]
    pub fn lights(&self) -> &[ObjectKey] {
        &self.lights
    }

    /// Active lights gathered for the current frame.
    #[must_use]
    pub fn snapshots(&self) -> &[LightSnapshot] {
        &self.snapshots
    }

    #[must_use]
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    pub fn set_max_lights(&mut self, max_lights: usize) {
        self.max_lights = max_lights.min(MAX_LIGHTS);
    }

    /// Rebuilds the snapshot list from the scene.
    pub fn gather(&mut self, scene: &Scene) {
        self.snapshots.clear();
        let mut dropped = 0usize;

        for &key in &self.lights {
            if !scene.is_object_active(key) {
                continue;
            }
            let Some(node) = scene.object_node(key) else { continue };
            if self.snapshots.len() >= self.max_lights {
                dropped += 1;
                continue;
            }
            let world = scene.world_matrix(node);
            let revision = scene.transform_revision(node);
            let Some(mut light) = scene.object_mut::<Light>(key) else { continue };
            let gpu = light.shader_data(&world, revision);
            self.snapshots.push(LightSnapshot {
                key,
                light_type: light.light_type(),
                world,
                casts_shadows: light.casts_shadows(),
                cascade_count: light.cascade_count(),
                spot_angle: light.spot_angle(),
                range: light.range(),
                gpu,
            });
        }

        if dropped > 0 {
            warn!(
                "{dropped} light(s) dropped: the scene has more than {} active lights",
                self.max_lights
            );
        }
    }
}

impl SceneComponent for LightSystem {
    fn order(&self) -> i32 {
        0
    }

    fn on_pre_render(&mut self, scene: &mut Scene, _time: &FrameTime) {
        self.gather(scene);
    }

    fn on_object_added(&mut self, object: &ObjectInfo) {
        if object.is::<Light>() {
            self.lights.push(object.key);
        }
    }

    fn on_object_removed(&mut self, key: ObjectKey) {
        self.lights.retain(|&k| k != key);
        self.snapshots.retain(|s| s.key != key);
    }
}
