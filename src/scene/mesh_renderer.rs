use std::rc::Rc;

use crate::renderer::queue::DrawItem;
use crate::resources::{Material, Mesh};
use crate::scene::object::{GameObject, HookBinder, HookContext, OnRender};

/// Draws a mesh at its node's world transform.
///
/// `materials[i]` shades every sub-mesh whose `material_index` is `i`.
#[derive(Debug, Clone)]
pub struct MeshRenderer {
    pub mesh: Rc<Mesh>,
    pub materials: Rc<[Material]>,
}

impl MeshRenderer {
    #[must_use]
    pub fn new(mesh: Rc<Mesh>, materials: Vec<Material>) -> Self {
        Self {
            mesh,
            materials: materials.into(),
        }
    }

    #[must_use]
    pub fn with_material(mesh: Rc<Mesh>, material: Material) -> Self {
        Self::new(mesh, vec![material])
    }
}

impl GameObject for MeshRenderer {
    fn bind_hooks(hooks: &mut HookBinder<'_, Self>) {
        hooks.render();
    }
}

impl OnRender for MeshRenderer {
    fn render(&mut self, ctx: &mut HookContext<'_>) {
        if self.mesh.sub_meshes.is_empty() {
            return;
        }
        let item = DrawItem {
            object: ctx.object,
            node: ctx.node,
            model: ctx.world_matrix(),
            mesh: Rc::clone(&self.mesh),
            materials: Rc::clone(&self.materials),
        };
        ctx.submit(item);
    }
}
