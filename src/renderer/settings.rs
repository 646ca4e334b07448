//! Renderer Settings
//!
//! Configuration consumed by [`Renderer::new`](super::Renderer::new) and
//! [`Renderer::set_settings`](super::Renderer::set_settings).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ember::renderer::RendererSettings;
//!
//! let settings = RendererSettings {
//!     shadow_atlas_size: 2048,
//!     cascade_count: 3,
//!     ..Default::default()
//! };
//!
//! // Or from a JSON document; missing fields keep their defaults.
//! let settings = RendererSettings::from_json(r#"{ "max_lights": 8 }"#)?;
//! ```
//!
//! # Fields
//!
//! | Field                  | Description                                   | Default      |
//! |------------------------|-----------------------------------------------|--------------|
//! | `shadow_atlas_size`    | Shadow atlas edge length in texels            | `4096`       |
//! | `max_lights`           | Lights uploaded per frame (≤ 16)              | `16`         |
//! | `max_shadow_slots`     | Shadow regions per frame (≤ 64)               | `64`         |
//! | `cascade_count`        | Cascades for new directional lights (1..=4)   | `4`          |
//! | `cascade_split_lambda` | Log/uniform split blend                       | `0.5`        |
//! | `shadow_distance`      | Directional shadow reach, clamped to far      | `100.0`      |
//! | `cascade_padding_back` | Light-space extension away from the light     | `10.0`       |
//! | `cascade_padding_front`| Light-space extension toward the light        | `10.0`       |
//! | `clear_color`          | Colour clear when no skybox is bound          | black        |
//! | `draw_gizmos`          | Run `OnDrawGizmos` hooks                      | `false`      |
//! | `viewport`             | Initial render size in pixels                 | `1280x720`   |

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::resources::uniforms::{MAX_LIGHTS, MAX_SHADOW_SLOTS};
use crate::scene::light::MAX_CASCADES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    // === Shadows ===
    pub shadow_atlas_size: u32,
    pub max_shadow_slots: usize,
    pub cascade_count: u32,
    pub cascade_split_lambda: f32,
    pub shadow_distance: f32,
    pub cascade_padding_back: f32,
    pub cascade_padding_front: f32,

    // === Lights ===
    pub max_lights: usize,

    // === Output ===
    /// Linear RGBA.
    pub clear_color: [f64; 4],
    pub draw_gizmos: bool,
    pub viewport: (u32, u32),
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            shadow_atlas_size: 4096,
            max_shadow_slots: MAX_SHADOW_SLOTS,
            cascade_count: MAX_CASCADES,
            cascade_split_lambda: 0.5,
            shadow_distance: 100.0,
            cascade_padding_back: 10.0,
            cascade_padding_front: 10.0,
            max_lights: MAX_LIGHTS,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            draw_gizmos: false,
            viewport: (1280, 720),
        }
    }
}

impl RendererSettings {
    /// Parses settings from JSON and validates them.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.clamp_ranges();
        settings.validate()?;
        Ok(settings)
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Pulls soft-limited values back into range.
    pub fn clamp_ranges(&mut self) {
        self.cascade_count = self.cascade_count.clamp(1, MAX_CASCADES);
        self.max_lights = self.max_lights.min(MAX_LIGHTS);
        self.max_shadow_slots = self.max_shadow_slots.min(MAX_SHADOW_SLOTS);
        self.cascade_split_lambda = self.cascade_split_lambda.clamp(0.0, 1.0);
    }

    pub fn validate(&self) -> Result<()> {
        if self.shadow_atlas_size == 0 || !self.shadow_atlas_size.is_power_of_two() {
            return Err(EngineError::InvalidSettings(format!(
                "shadow_atlas_size must be a non-zero power of two, got {}",
                self.shadow_atlas_size
            )));
        }
        if self.max_lights == 0 {
            return Err(EngineError::InvalidSettings("max_lights must be at least 1".into()));
        }
        if self.max_lights > MAX_LIGHTS {
            return Err(EngineError::InvalidSettings(format!(
                "max_lights must be at most {MAX_LIGHTS}, got {}",
                self.max_lights
            )));
        }
        if !(1..=MAX_SHADOW_SLOTS).contains(&self.max_shadow_slots) {
            return Err(EngineError::InvalidSettings(format!(
                "max_shadow_slots must be in 1..={MAX_SHADOW_SLOTS}, got {}",
                self.max_shadow_slots
            )));
        }
        if !(1..=MAX_CASCADES).contains(&self.cascade_count) {
            return Err(EngineError::InvalidSettings(format!(
                "cascade_count must be in 1..={MAX_CASCADES}, got {}",
                self.cascade_count
            )));
        }
        if self.shadow_distance.is_nan() || self.shadow_distance <= 0.0 {
            return Err(EngineError::InvalidSettings(format!(
                "shadow_distance must be positive, got {}",
                self.shadow_distance
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RendererSettings::default().validate().is_ok());
    }

    #[test]
    fn json_overrides_and_clamps() {
        let s = RendererSettings::from_json(r#"{ "cascade_count": 9, "max_lights": 4 }"#)
            .expect("valid settings");
        assert_eq!(s.cascade_count, MAX_CASCADES);
        assert_eq!(s.max_lights, 4);
        assert_eq!(s.shadow_atlas_size, 4096);
    }

    #[test]
    fn rejects_limits_past_the_uniform_blocks() {
        for bad in [
            RendererSettings { max_shadow_slots: MAX_SHADOW_SLOTS + 1, ..Default::default() },
            RendererSettings { max_lights: MAX_LIGHTS + 1, ..Default::default() },
            RendererSettings { cascade_count: 0, ..Default::default() },
            RendererSettings { cascade_count: MAX_CASCADES + 1, ..Default::default() },
        ] {
            assert!(matches!(bad.validate(), Err(EngineError::InvalidSettings(_))), "{bad:?}");
        }
    }

    #[test]
    fn rejects_non_power_of_two_atlas() {
        let err = RendererSettings::from_json(r#"{ "shadow_atlas_size": 1000 }"#);
        assert!(matches!(err, Err(EngineError::InvalidSettings(_))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = RendererSettings::from_json("{ nope");
        assert!(matches!(err, Err(EngineError::SettingsParse(_))));
    }
}
