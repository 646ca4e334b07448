use crate::scene::object::NodeHooks;
use crate::scene::transform::Transform;
use crate::scene::{NodeHandle, ObjectKey};

/// Monotonic node identifier, unique for the lifetime of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// A scene-graph node.
///
/// # Hierarchy
///
/// Nodes live in the scene's arena and refer to each other by
/// [`NodeHandle`]:
/// - `parent`: `None` only for the scene root
/// - `children`: ordered child handles
///
/// `Scene` is the only writer of both fields and keeps them mutually
/// consistent.
///
/// # Objects
///
/// Attached objects are listed in attach order. The per-hook dispatch lists
/// in `hooks` hold only the objects that implement that hook.
#[derive(Debug)]
pub struct SceneNode {
    pub(crate) id: NodeId,
    pub(crate) scene_id: u32,
    pub(crate) name: String,
    pub(crate) enabled: bool,

    // === Hierarchy ===
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    // === Spatial ===
    pub(crate) transform: Transform,

    // === Attached objects ===
    pub(crate) objects: Vec<ObjectKey>,
    pub(crate) hooks: NodeHooks,
}

impl SceneNode {
    pub(crate) fn new(id: NodeId, scene_id: u32, name: String) -> Self {
        Self {
            id,
            scene_id,
            name,
            enabled: true,
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            objects: Vec::new(),
            hooks: NodeHooks::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Identifier of the owning scene.
    #[inline]
    #[must_use]
    pub fn scene_id(&self) -> u32 {
        self.scene_id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's own flag. See `Scene::is_active_in_hierarchy` for the
    /// effective state.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn objects(&self) -> &[ObjectKey] {
        &self.objects
    }

    #[inline]
    #[must_use]
    pub fn hooks(&self) -> &NodeHooks {
        &self.hooks
    }

    /// Transform cache. Reads of the raw cache may be stale; go through the
    /// scene accessors for reconciled values.
    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}
