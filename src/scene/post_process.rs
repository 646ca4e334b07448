//! Post-processing effects.
//!
//! An effect is any scene object that binds the post-process role:
//!
//! ```rust,ignore
//! impl GameObject for Vignette {
//!     fn bind_hooks(hooks: &mut HookBinder<'_, Self>) {
//!         hooks.post_process();
//!     }
//! }
//! ```
//!
//! [`PostProcessingSystem`] collects effects in attach order. Each frame the
//! renderer copies the colour target into a ping-pong texture before every
//! effect; the effect samples that copy and writes straight into the colour
//! target.

use std::cell::RefCell;
use std::rc::Rc;

use crate::renderer::device::{GraphicsDevice, Viewport};
use crate::resources::uniforms::{FrameUniforms, UniformSlot};
use crate::resources::{FramebufferHandle, ShaderProgram, TextureHandle};
use crate::scene::component::SceneComponent;
use crate::scene::object::{GameObject, HookBinder, ObjectInfo};
use crate::scene::{ObjectKey, Scene};
use crate::utils::FrameTime;

/// Texture unit the effect input is bound to.
pub const POST_PROCESS_INPUT_UNIT: u32 = 0;

pub trait PostProcessEffect {
    fn name(&self) -> &str;

    /// Reads `pass.input`, writes `pass.target`.
    fn apply(&mut self, pass: &mut PostProcessPass<'_>);
}

/// Device access and targets for one effect invocation.
pub struct PostProcessPass<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    /// Copy of the colour target taken just before this effect.
    pub input: TextureHandle,
    /// The frame's colour framebuffer.
    pub target: FramebufferHandle,
    pub viewport: Viewport,
    pub frame: &'a FrameUniforms,
}

/// Fullscreen effect driven by a single shader program.
#[derive(Debug, Clone)]
pub struct ShaderEffect {
    pub name: String,
    pub program: Rc<ShaderProgram>,
}

impl ShaderEffect {
    #[must_use]
    pub fn new(name: impl Into<String>, program: Rc<ShaderProgram>) -> Self {
        Self {
            name: name.into(),
            program,
        }
    }
}

impl GameObject for ShaderEffect {
    fn bind_hooks(hooks: &mut HookBinder<'_, Self>) {
        hooks.post_process();
    }
}

impl PostProcessEffect for ShaderEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, pass: &mut PostProcessPass<'_>) {
        let device = &mut *pass.device;
        device.bind_framebuffer(Some(pass.target));
        device.set_viewport(pass.viewport);
        device.set_depth_state(None, false);
        device.set_cull_mode(None);
        device.bind_program(self.program.handle());
        device.upload_uniforms(UniformSlot::Frame, bytemuck::bytes_of(pass.frame));
        device.bind_texture(POST_PROCESS_INPUT_UNIT, pass.input);
        device.draw_fullscreen_quad();
    }
}

// ============================================================================
// Post Processing System
// ============================================================================

pub struct PostProcessingSystem {
    effects: Vec<(ObjectKey, Rc<RefCell<dyn PostProcessEffect>>)>,
    active: Vec<(ObjectKey, Rc<RefCell<dyn PostProcessEffect>>)>,
}

impl Default for PostProcessingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessingSystem {
    /// Runs after lighting and before the graphics component.
    pub const ORDER: i32 = 1000;

    #[must_use]
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
            active: Vec::new(),
        }
    }

    /// Every registered effect, in attach order.
    #[must_use]
    pub fn effect_keys(&self) -> Vec<ObjectKey> {
        self.effects.iter().map(|(k, _)| *k).collect()
    }

    /// Effects active this frame, in attach order.
    #[must_use]
    pub fn active_effects(&self) -> Vec<Rc<RefCell<dyn PostProcessEffect>>> {
        self.active.iter().map(|(_, e)| Rc::clone(e)).collect()
    }

    pub fn gather(&mut self, scene: &Scene) {
        self.active.clear();
        self.active.extend(
            self.effects
                .iter()
                .filter(|(key, _)| scene.is_object_active(*key))
                .map(|(key, effect)| (*key, Rc::clone(effect))),
        );
    }
}

impl SceneComponent for PostProcessingSystem {
    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_pre_render(&mut self, scene: &mut Scene, _time: &FrameTime) {
        self.gather(scene);
    }

    fn on_object_added(&mut self, object: &ObjectInfo) {
        if let Some(effect) = object.hooks.post_process() {
            self.effects.push((object.key, Rc::clone(effect)));
        }
    }

    fn on_object_removed(&mut self, key: ObjectKey) {
        self.effects.retain(|(k, _)| *k != key);
        self.active.retain(|(k, _)| *k != key);
    }
}
