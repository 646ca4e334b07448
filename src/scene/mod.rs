//! Scene graph
//!
//! - [`Scene`]: node arena, attached objects, component pipeline
//! - [`SceneNode`]: hierarchy + transform + per-hook dispatch lists
//! - [`Transform`]: lazily reconciled local/global matrices
//! - [`GameObject`] and the hook traits: capability-based dispatch
//! - [`SceneComponent`]: scene-wide systems run in priority order
//! - Object kinds: [`Camera`], [`Light`], [`MeshRenderer`], post-process effects

pub mod camera;
pub mod component;
pub mod light;
pub mod mesh_renderer;
pub mod node;
pub mod object;
pub mod post_process;
pub mod scene;
pub mod transform;
pub mod transform_system;

pub use camera::{Camera, Frustum, FrustumPlane, ProjectionType, RenderCamera};
pub use component::SceneComponent;
pub use light::{Light, LightSnapshot, LightSystem, LightType};
pub use mesh_renderer::MeshRenderer;
pub use node::{NodeId, SceneNode};
pub use object::{
    Capabilities, DispatchList, GameObject, HookBinder, HookContext, ObjectInfo, OnAwake,
    OnDisable, OnDrawGizmos, OnEnable, OnRender, OnUpdate,
};
pub use post_process::{PostProcessEffect, PostProcessPass, PostProcessingSystem, ShaderEffect};
pub use scene::Scene;
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a node in a [`Scene`].
    pub struct NodeHandle;
    /// Handle to an object attached to a node.
    pub struct ObjectKey;
}
