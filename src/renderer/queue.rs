//! Per-frame render queue.
//!
//! Filled by `OnRender` / `OnDrawGizmos` hooks during `Scene::render`, read by
//! the renderer in `SceneGraphics::on_post_render`, cleared at the start of
//! the next render.

use std::rc::Rc;

use glam::{Affine3A, Vec3, Vec4};

use crate::resources::{Material, Mesh, SubMesh};
use crate::scene::{NodeHandle, ObjectKey};

/// A mesh instance to draw this frame.
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub object: ObjectKey,
    pub node: NodeHandle,
    /// World matrix at submission time.
    pub model: Affine3A,
    pub mesh: Rc<Mesh>,
    /// Indexed by `SubMesh::material_index`.
    pub materials: Rc<[Material]>,
}

impl DrawItem {
    /// Material for a sub-mesh. Out-of-range indices fall back to the last
    /// material.
    #[must_use]
    pub fn material_for(&self, sub_mesh: &SubMesh) -> Option<&Material> {
        self.materials
            .get(sub_mesh.material_index)
            .or_else(|| self.materials.last())
    }
}

/// A debug line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GizmoLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Vec4,
}

#[derive(Debug, Default)]
pub struct RenderQueue {
    draws: Vec<DrawItem>,
    gizmos: Vec<GizmoLine>,
}

impl RenderQueue {
    pub fn clear(&mut self) {
        self.draws.clear();
        self.gizmos.clear();
    }

    pub fn push(&mut self, item: DrawItem) {
        self.draws.push(item);
    }

    pub fn push_gizmo(&mut self, line: GizmoLine) {
        self.gizmos.push(line);
    }

    #[must_use]
    pub fn draws(&self) -> &[DrawItem] {
        &self.draws
    }

    #[must_use]
    pub fn gizmos(&self) -> &[GizmoLine] {
        &self.gizmos
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty() && self.gizmos.is_empty()
    }
}
