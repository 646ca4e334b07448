//! # Ember Engine
//!
//! Runtime core of a real-time 3D renderer:
//!
//! - [`scene`]: node hierarchy with lazily reconciled transforms, objects
//!   bound through capability hooks, and a priority-ordered component
//!   pipeline
//! - [`renderer`]: frustum culling, shadow-atlas allocation and the
//!   depth / shadow / colour / post-processing / present pass sequence
//! - [`resources`]: provider data the core consumes opaquely
//!
//! ```rust,ignore
//! use ember::prelude::*;
//!
//! let (device, _log) = RecordingDevice::new();
//! let renderer = Renderer::new(Box::new(device), RendererSettings::default())?;
//!
//! let mut scene = Scene::new();
//! scene.add_component::<LightSystem>();
//! scene.add_component_with(|| SceneGraphics::new(renderer));
//!
//! let cam = scene.create_node(None, "Camera");
//! let key = scene.add_object(cam, Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 100.0))?;
//! scene.set_main_camera(key)?;
//!
//! scene.update(1.0 / 60.0);
//! scene.render();
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use errors::{EngineError, Result};
pub use renderer::{Renderer, RendererSettings, SceneGraphics};
pub use scene::{Camera, Light, NodeHandle, ObjectKey, Scene};

pub mod prelude {
    pub use crate::errors::{EngineError, Result};
    pub use crate::renderer::{
        DrawItem, FrameStats, GraphicsDevice, RecordingDevice, Renderer, RendererSettings,
        SceneGraphics, Skybox,
    };
    pub use crate::resources::{
        BoundingBox, DrawMode, Material, Mesh, ProgramHandle, ShaderFlags, ShaderProgram, SubMesh,
        TextureHandle, VertexArrayHandle,
    };
    pub use crate::scene::{
        Camera, GameObject, HookBinder, HookContext, Light, LightSystem, LightType, MeshRenderer,
        NodeHandle, ObjectKey, OnAwake, OnDisable, OnDrawGizmos, OnEnable, OnRender, OnUpdate,
        PostProcessEffect, PostProcessingSystem, Scene, SceneComponent, ShaderEffect,
    };
    pub use crate::utils::{FrameTime, Timer};
}
