//! The scene component that draws.
//!
//! [`SceneGraphics`] owns the [`Renderer`] and sorts last in the component
//! pipeline. In `on_post_render` it collects the frame from the scene (main
//! camera, render queue, gathered lights, active post effects) and renders
//! it. A frame that cannot be drawn is logged and skipped.

use std::rc::Rc;

use log::warn;

use crate::errors::{EngineError, Result};
use crate::renderer::renderer::{FrameInput, FrameStats, Renderer};
use crate::resources::{Mesh, ShaderProgram, TextureHandle};
use crate::scene::camera::Camera;
use crate::scene::component::SceneComponent;
use crate::scene::light::LightSystem;
use crate::scene::post_process::PostProcessingSystem;
use crate::scene::Scene;
use crate::utils::FrameTime;

/// Cubemap background drawn after opaque geometry.
#[derive(Debug, Clone)]
pub struct Skybox {
    pub program: Rc<ShaderProgram>,
    pub cubemap: TextureHandle,
    pub mesh: Rc<Mesh>,
}

pub struct SceneGraphics {
    renderer: Renderer,
    skybox: Option<Skybox>,
    last_stats: Option<FrameStats>,
}

impl SceneGraphics {
    #[must_use]
    pub fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            skybox: None,
            last_stats: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn set_skybox(&mut self, skybox: Option<Skybox>) {
        self.skybox = skybox;
    }

    #[must_use]
    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    /// Stats of the last frame drawn, `None` until one succeeds.
    #[must_use]
    pub fn last_stats(&self) -> Option<FrameStats> {
        self.last_stats
    }

    /// Draws the scene's current frame. A main camera that is disabled, or
    /// sits under an inactive node, counts as missing.
    pub fn draw(&mut self, scene: &Scene, time: FrameTime) -> Result<FrameStats> {
        let camera_key = scene
            .main_camera()
            .filter(|&key| scene.is_object_active(key))
            .ok_or(EngineError::NoMainCamera)?;
        let camera_node = scene
            .object_node(camera_key)
            .ok_or(EngineError::NoMainCamera)?;
        let camera = scene
            .object::<Camera>(camera_key)
            .map(|c| c.extract(&scene.world_matrix(camera_node)))
            .ok_or_else(|| EngineError::ObjectTypeMismatch {
                key: format!("{camera_key:?}"),
                expected: "Camera",
            })?;

        let lights = scene
            .component::<LightSystem>()
            .map(|system| {
                let system = system.borrow();
                system.snapshots().to_vec()
            })
            .unwrap_or_default();
        let effects = scene
            .component::<PostProcessingSystem>()
            .map(|system| {
                let system = system.borrow();
                system.active_effects()
            })
            .unwrap_or_default();

        let input = FrameInput {
            camera: &camera,
            draws: scene.render_queue().draws(),
            lights: &lights,
            effects: &effects,
            skybox: self.skybox.as_ref(),
            time,
        };
        self.renderer.render(&input)
    }
}

impl SceneComponent for SceneGraphics {
    fn order(&self) -> i32 {
        i32::MAX
    }

    fn on_pre_render(&mut self, scene: &mut Scene, _time: &FrameTime) {
        scene.set_draw_gizmos(self.renderer.settings().draw_gizmos);
    }

    fn on_post_render(&mut self, scene: &mut Scene, time: &FrameTime) {
        match self.draw(scene, *time) {
            Ok(stats) => self.last_stats = Some(stats),
            Err(err) => warn!("Frame skipped: {err}"),
        }
    }
}
