//! The scene: node arena, attached objects, and the per-frame pipeline.
//!
//! # Frame
//!
//! ```text
//! update(dt):  components.on_pre_update  -> OnUpdate hooks  -> components.on_post_update
//! render():    components.on_pre_render  -> OnRender hooks
//!                                        -> OnDrawGizmos hooks (when enabled)
//!                                        -> components.on_post_render
//! ```
//!
//! Hook dispatch walks the tree depth-first with an explicit stack, skipping
//! disabled subtrees, collects every matching call record, then drains the
//! collected calls LIFO. Cross-object ordering is therefore not FIFO.

use std::any::{TypeId, type_name};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Affine3A, Quat, Vec3};
use log::{debug, trace, warn};
use slotmap::SlotMap;

use crate::errors::{EngineError, Result};
use crate::renderer::queue::RenderQueue;
use crate::scene::camera::Camera;
use crate::scene::component::{self, ComponentPipeline, SceneComponent, Stage};
use crate::scene::node::{NodeId, SceneNode};
use crate::scene::object::{
    Capabilities, GameObject, HookBinder, HookContext, HookRecord, HookTable, NodeHooks,
    ObjectEntry, ObjectEvent, as_any, as_any_mut,
};
use crate::scene::transform::{self, position_of, rotation_of, scale_of};
use crate::scene::transform_system;
use crate::scene::{NodeHandle, ObjectKey};
use crate::utils::{FrameTime, Timer};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

const ROOT_NAME: &str = "Root";

type Call<H> = (NodeHandle, HookRecord<H>);

pub struct Scene {
    id: u32,

    nodes: SlotMap<NodeHandle, SceneNode>,
    root: NodeHandle,
    next_node_id: u64,

    objects: SlotMap<ObjectKey, ObjectEntry>,
    next_object_seq: u64,

    components: ComponentPipeline,
    main_camera: Option<ObjectKey>,

    render_queue: RenderQueue,
    draw_gizmos: bool,
    time: FrameTime,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        let id = NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed);
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new(NodeId(0), id, ROOT_NAME.to_owned()));
        Self {
            id,
            nodes,
            root,
            next_node_id: 1,
            objects: SlotMap::with_key(),
            next_object_seq: 0,
            components: ComponentPipeline::default(),
            main_camera: None,
            render_queue: RenderQueue::default(),
            draw_gizmos: false,
            time: FrameTime::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> FrameTime {
        self.time
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn alloc_node(&mut self, name: String) -> NodeHandle {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(SceneNode::new(id, self.id, name))
    }

    /// Creates a node under `parent`, or under the root when `parent` is
    /// `None` or no longer exists.
    pub fn create_node(&mut self, parent: Option<NodeHandle>, name: impl Into<String>) -> NodeHandle {
        let parent = match parent {
            Some(p) if self.nodes.contains_key(p) => p,
            Some(p) => {
                warn!("Parent node {p:?} not found, attaching to the scene root");
                self.root
            }
            None => self.root,
        };
        let handle = self.alloc_node(name.into());
        if let Some(node) = self.nodes.get_mut(handle) {
            node.parent = Some(parent);
            node.transform.invalidate_global();
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(handle);
        }
        handle
    }

    #[inline]
    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&SceneNode> {
        self.nodes.get(handle)
    }

    #[inline]
    #[must_use]
    pub fn contains_node(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(handle).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.nodes.get(handle).map_or(&[], |n| n.children.as_slice())
    }

    /// First node named `name` in depth-first order.
    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.iter_depth_first()
            .find(|&(h, _)| self.nodes.get(h).is_some_and(|n| n.name == name))
            .map(|(h, _)| h)
    }

    /// Pre-order walk of the whole tree, yielding each node with its depth.
    /// Disabled nodes are included.
    #[must_use]
    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            nodes: &self.nodes,
            stack: vec![(self.root, 0)],
        }
    }

    /// `true` when `ancestor` is a strict ancestor of `node`.
    #[must_use]
    pub fn is_child_of(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        let mut cursor = self.parent(node);
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.parent(p);
        }
        false
    }

    /// Moves `child` under `parent` (the root when `None`), keeping its local
    /// transform. Its world transform follows the new parent.
    pub fn set_parent(&mut self, child: NodeHandle, parent: Option<NodeHandle>) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(EngineError::NodeNotFound(format!("{child:?}")));
        }
        if child == self.root {
            return Err(EngineError::RootReparent);
        }
        let parent = parent.unwrap_or(self.root);
        if !self.nodes.contains_key(parent) {
            return Err(EngineError::NodeNotFound(format!("{parent:?}")));
        }
        if parent == child || self.is_child_of(parent, child) {
            warn!("Refusing to parent {child:?} under its own descendant {parent:?}");
            return Err(EngineError::HierarchyCycle {
                child: format!("{child:?}"),
                parent: format!("{parent:?}"),
            });
        }
        if self.parent(child) == Some(parent) {
            return Ok(());
        }

        let was_active = self.is_active_in_hierarchy(child);

        // Resolve pending global writes against the old parent chain.
        let _ = transform_system::local_matrix(&self.nodes, child);
        transform_system::settle_subtree(&self.nodes, child);

        self.detach_from_parent(child);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.invalidate_global();
        }
        transform_system::invalidate_descendants(&self.nodes, child);

        let is_active = self.is_active_in_hierarchy(child);
        if was_active != is_active {
            self.notify_activity(child, is_active);
        }
        Ok(())
    }

    /// Like [`Self::set_parent`] but keeps the world transform instead.
    pub fn set_parent_keep_world(&mut self, child: NodeHandle, parent: Option<NodeHandle>) -> Result<()> {
        let world = self.world_matrix(child);
        self.set_parent(child, parent)?;
        self.set_world_matrix(child, world);
        Ok(())
    }

    fn detach_from_parent(&mut self, child: NodeHandle) {
        let Some(parent) = self.parent(child) else { return };
        if let Some(p) = self.nodes.get_mut(parent)
            && let Some(pos) = p.children.iter().position(|&c| c == child)
        {
            p.children.remove(pos);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
    }

    fn collect_subtree(&self, start: NodeHandle) -> Vec<NodeHandle> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(h) = stack.pop() {
            let Some(node) = self.nodes.get(h) else { continue };
            order.push(h);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    /// Destroys `handle`, its attached objects and its whole subtree.
    ///
    /// Objects go first (node before children), notifying every component.
    /// Nodes are then freed bottom-up and `handle` is detached from its
    /// parent. Destroying the root leaves a fresh, empty root behind.
    pub fn destroy_node(&mut self, handle: NodeHandle) {
        if !self.nodes.contains_key(handle) {
            warn!("destroy_node: node {handle:?} not found");
            return;
        }

        for node in self.collect_subtree(handle) {
            let keys = self.nodes.get(node).map(|n| n.objects.clone()).unwrap_or_default();
            for key in keys {
                let _ = self.remove_object(key);
            }
        }

        // Hooks may have added nodes below the subtree; collect again.
        let doomed = self.collect_subtree(handle);
        self.detach_from_parent(handle);
        for &node in doomed.iter().rev() {
            // Objects attached by a disable hook mid-teardown.
            let late = self.nodes.get(node).map(|n| n.objects.clone()).unwrap_or_default();
            for key in late {
                let _ = self.remove_object(key);
            }
            self.nodes.remove(node);
        }
        debug!("Destroyed {} node(s) rooted at {handle:?}", doomed.len());

        if handle == self.root {
            self.root = self.alloc_node(ROOT_NAME.to_owned());
            debug!("Scene {} root recreated", self.id);
        }
    }

    /// Sets the node's own flag. Enable/disable hooks fire for every object
    /// whose effective activity changes.
    pub fn set_enabled(&mut self, handle: NodeHandle, enabled: bool) {
        let Some(node) = self.nodes.get(handle) else {
            warn!("set_enabled: node {handle:?} not found");
            return;
        };
        if node.enabled == enabled {
            return;
        }
        let was_active = self.is_active_in_hierarchy(handle);
        if let Some(node) = self.nodes.get_mut(handle) {
            node.enabled = enabled;
        }
        let is_active = self.is_active_in_hierarchy(handle);
        if was_active != is_active {
            self.notify_activity(handle, is_active);
        }
    }

    /// The node and every ancestor are enabled.
    #[must_use]
    pub fn is_active_in_hierarchy(&self, handle: NodeHandle) -> bool {
        let mut cursor = Some(handle);
        while let Some(h) = cursor {
            match self.nodes.get(h) {
                Some(node) if node.enabled => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn notify_activity(&mut self, start: NodeHandle, active: bool) {
        if active {
            let calls = self.collect_calls(start, |h| h.enable.as_slice(), true);
            self.run_calls(calls, |o, ctx| o.on_enable(ctx), false);
        } else {
            let calls = self.collect_calls(start, |h| h.disable.as_slice(), true);
            self.run_calls(calls, |o, ctx| o.on_disable(ctx), false);
        }
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    #[must_use]
    pub fn world_matrix(&self, handle: NodeHandle) -> Affine3A {
        transform_system::world_matrix(&self.nodes, handle)
    }

    #[must_use]
    pub fn local_matrix(&self, handle: NodeHandle) -> Affine3A {
        transform_system::local_matrix(&self.nodes, handle)
    }

    pub fn set_local_matrix(&mut self, handle: NodeHandle, local: Affine3A) {
        if !self.nodes.contains_key(handle) {
            warn!("set_local_matrix: node {handle:?} not found");
            return;
        }
        transform_system::write_local(&self.nodes, handle, local);
    }

    /// Writes the world matrix; the local matrix is derived on next read.
    pub fn set_world_matrix(&mut self, handle: NodeHandle, global: Affine3A) {
        if !self.nodes.contains_key(handle) {
            warn!("set_world_matrix: node {handle:?} not found");
            return;
        }
        transform_system::write_global(&self.nodes, handle, global);
    }

    /// Changes whenever the node's world transform may have changed,
    /// including through an ancestor.
    #[must_use]
    pub fn transform_revision(&self, handle: NodeHandle) -> u64 {
        self.nodes.get(handle).map_or(0, |n| n.transform.revision())
    }

    #[must_use]
    pub fn position(&self, handle: NodeHandle) -> Vec3 {
        position_of(&self.world_matrix(handle))
    }

    pub fn set_position(&mut self, handle: NodeHandle, position: Vec3) {
        let m = transform::with_position(&self.world_matrix(handle), position);
        self.set_world_matrix(handle, m);
    }

    #[must_use]
    pub fn local_position(&self, handle: NodeHandle) -> Vec3 {
        position_of(&self.local_matrix(handle))
    }

    pub fn set_local_position(&mut self, handle: NodeHandle, position: Vec3) {
        let m = transform::with_position(&self.local_matrix(handle), position);
        self.set_local_matrix(handle, m);
    }

    #[must_use]
    pub fn rotation(&self, handle: NodeHandle) -> Quat {
        rotation_of(&self.world_matrix(handle))
    }

    pub fn set_rotation(&mut self, handle: NodeHandle, rotation: Quat) {
        let m = transform::with_rotation(&self.world_matrix(handle), rotation);
        self.set_world_matrix(handle, m);
    }

    #[must_use]
    pub fn local_rotation(&self, handle: NodeHandle) -> Quat {
        rotation_of(&self.local_matrix(handle))
    }

    pub fn set_local_rotation(&mut self, handle: NodeHandle, rotation: Quat) {
        let m = transform::with_rotation(&self.local_matrix(handle), rotation);
        self.set_local_matrix(handle, m);
    }

    /// World-space scale. Lossy under rotated non-uniform parents.
    #[must_use]
    pub fn scale(&self, handle: NodeHandle) -> Vec3 {
        scale_of(&self.world_matrix(handle))
    }

    pub fn set_scale(&mut self, handle: NodeHandle, scale: Vec3) {
        let m = transform::with_scale(&self.world_matrix(handle), scale);
        self.set_world_matrix(handle, m);
    }

    #[must_use]
    pub fn local_scale(&self, handle: NodeHandle) -> Vec3 {
        scale_of(&self.local_matrix(handle))
    }

    pub fn set_local_scale(&mut self, handle: NodeHandle, scale: Vec3) {
        let m = transform::with_scale(&self.local_matrix(handle), scale);
        self.set_local_matrix(handle, m);
    }

    /// Moves the node by `delta` in world space.
    pub fn translate(&mut self, handle: NodeHandle, delta: Vec3) {
        let p = self.position(handle);
        self.set_position(handle, p + delta);
    }

    /// Rotates the node so its -Z axis points at `target`. Returns `false`
    /// (and leaves the node untouched) when no unique rotation exists.
    pub fn look_at(&mut self, handle: NodeHandle, target: Vec3, up: Vec3) -> bool {
        let eye = self.position(handle);
        match transform::look_rotation(eye, target, up) {
            Some(rotation) => {
                self.set_rotation(handle, rotation);
                true
            }
            None => false,
        }
    }

    /// World-space -Z.
    #[must_use]
    pub fn forward(&self, handle: NodeHandle) -> Vec3 {
        self.world_matrix(handle)
            .transform_vector3(Vec3::NEG_Z)
            .normalize_or_zero()
    }

    #[must_use]
    pub fn right(&self, handle: NodeHandle) -> Vec3 {
        self.world_matrix(handle)
            .transform_vector3(Vec3::X)
            .normalize_or_zero()
    }

    #[must_use]
    pub fn up(&self, handle: NodeHandle) -> Vec3 {
        self.world_matrix(handle)
            .transform_vector3(Vec3::Y)
            .normalize_or_zero()
    }

    /// Reconciles every cached transform in the tree.
    pub fn update_transforms(&self) {
        transform_system::update_subtree(&self.nodes, self.root);
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Attaches `object` to `node` and binds its hooks.
    ///
    /// Components are notified first, then `OnAwake` runs, then `OnEnable`
    /// when the node is active.
    pub fn add_object<T: GameObject>(&mut self, node: NodeHandle, object: T) -> Result<ObjectKey> {
        if !self.nodes.contains_key(node) {
            return Err(EngineError::NodeNotFound(format!("{node:?}")));
        }

        let shared = Rc::new(RefCell::new(object));
        let mut hooks = HookTable::default();
        T::bind_hooks(&mut HookBinder::new(&shared, &mut hooks));
        let erased: Rc<RefCell<dyn GameObject>> = shared;

        let seq = self.next_object_seq;
        self.next_object_seq += 1;
        let key = self.objects.insert(ObjectEntry {
            node,
            enabled: true,
            seq,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            object: erased,
            hooks: hooks.clone(),
        });
        if let Some(n) = self.nodes.get_mut(node) {
            n.objects.push(key);
            n.hooks.register(key, &hooks);
        }
        trace!(
            "Attached {} to {node:?} with {:?}",
            type_name::<T>(),
            hooks.capabilities()
        );

        if let Some(entry) = self.objects.get(key) {
            let event = ObjectEvent::Added(entry.info(key));
            self.components.broadcast(&event);
        }

        if let Some(awake) = &hooks.awake {
            self.invoke(node, key, awake, |o, ctx| o.awake(ctx));
        }
        if let Some(enable) = &hooks.enable
            && self.is_object_active(key)
        {
            self.invoke(node, key, enable, |o, ctx| o.on_enable(ctx));
        }
        Ok(key)
    }

    /// Detaches and drops an object. Active objects get `OnDisable` first.
    pub fn remove_object(&mut self, key: ObjectKey) -> Result<()> {
        let Some(entry) = self.objects.get(key) else {
            return Err(EngineError::ObjectNotFound(format!("{key:?}")));
        };
        let node = entry.node;
        let disable = entry.hooks.disable.clone();
        if let Some(disable) = &disable
            && self.is_object_active(key)
        {
            self.invoke(node, key, disable, |o, ctx| o.on_disable(ctx));
        }

        // The disable hook may already have removed it.
        if self.objects.remove(key).is_none() {
            return Ok(());
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.objects.retain(|&k| k != key);
            n.hooks.unregister(key);
        }
        if self.main_camera == Some(key) {
            debug!("Main camera {key:?} removed");
            self.main_camera = None;
        }
        self.components.broadcast(&ObjectEvent::Removed(key));
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn contains_object(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    #[inline]
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Borrows an object as its concrete type.
    ///
    /// `None` when the key is stale, the type differs, or the object is
    /// currently mutably borrowed (for example by its own running hook).
    #[must_use]
    pub fn object<T: GameObject>(&self, key: ObjectKey) -> Option<Ref<'_, T>> {
        let entry = self.objects.get(key)?;
        let borrowed = entry.object.try_borrow().ok()?;
        Ref::filter_map(borrowed, |o| as_any(o).downcast_ref::<T>()).ok()
    }

    /// Mutable counterpart of [`Self::object`].
    #[must_use]
    pub fn object_mut<T: GameObject>(&self, key: ObjectKey) -> Option<RefMut<'_, T>> {
        let entry = self.objects.get(key)?;
        let borrowed = entry.object.try_borrow_mut().ok()?;
        RefMut::filter_map(borrowed, |o| as_any_mut(o).downcast_mut::<T>()).ok()
    }

    #[must_use]
    pub fn is_object<T: GameObject>(&self, key: ObjectKey) -> bool {
        self.objects
            .get(key)
            .is_some_and(|e| e.type_id == TypeId::of::<T>())
    }

    /// Keys of every object of type `T`, in attach order.
    #[must_use]
    pub fn objects_of_type<T: GameObject>(&self) -> Vec<ObjectKey> {
        let mut found: Vec<(u64, ObjectKey)> = self
            .objects
            .iter()
            .filter(|(_, e)| e.type_id == TypeId::of::<T>())
            .map(|(k, e)| (e.seq, k))
            .collect();
        found.sort_unstable_by_key(|&(seq, _)| seq);
        found.into_iter().map(|(_, k)| k).collect()
    }

    #[must_use]
    pub fn object_node(&self, key: ObjectKey) -> Option<NodeHandle> {
        self.objects.get(key).map(|e| e.node)
    }

    #[must_use]
    pub fn capabilities(&self, key: ObjectKey) -> Option<Capabilities> {
        self.objects.get(key).map(|e| e.hooks.capabilities())
    }

    #[must_use]
    pub fn is_object_enabled(&self, key: ObjectKey) -> bool {
        self.objects.get(key).is_some_and(|e| e.enabled)
    }

    /// Enabled itself and attached to an active node.
    #[must_use]
    pub fn is_object_active(&self, key: ObjectKey) -> bool {
        self.objects
            .get(key)
            .is_some_and(|e| e.enabled && self.is_active_in_hierarchy(e.node))
    }

    pub fn set_object_enabled(&mut self, key: ObjectKey, enabled: bool) -> Result<()> {
        let Some(entry) = self.objects.get(key) else {
            return Err(EngineError::ObjectNotFound(format!("{key:?}")));
        };
        if entry.enabled == enabled {
            return Ok(());
        }
        let was_active = self.is_object_active(key);
        let (node, enable, disable) = match self.objects.get_mut(key) {
            Some(e) => {
                e.enabled = enabled;
                (e.node, e.hooks.enable.clone(), e.hooks.disable.clone())
            }
            None => return Ok(()),
        };
        let is_active = self.is_object_active(key);
        if was_active == is_active {
            return Ok(());
        }
        if is_active {
            if let Some(enable) = &enable {
                self.invoke(node, key, enable, |o, ctx| o.on_enable(ctx));
            }
        } else if let Some(disable) = &disable {
            self.invoke(node, key, disable, |o, ctx| o.on_disable(ctx));
        }
        Ok(())
    }

    // ========================================================================
    // Main camera
    // ========================================================================

    /// Makes `key` the camera the renderer draws from. It must be a
    /// [`Camera`].
    pub fn set_main_camera(&mut self, key: ObjectKey) -> Result<()> {
        let Some(entry) = self.objects.get(key) else {
            return Err(EngineError::ObjectNotFound(format!("{key:?}")));
        };
        if entry.type_id != TypeId::of::<Camera>() {
            return Err(EngineError::ObjectTypeMismatch {
                key: format!("{key:?}"),
                expected: "Camera",
            });
        }
        self.main_camera = Some(key);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn main_camera(&self) -> Option<ObjectKey> {
        self.main_camera
    }

    pub fn clear_main_camera(&mut self) {
        self.main_camera = None;
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Returns the scene's `T`, creating it with `T::default()` on first use.
    pub fn add_component<T: SceneComponent + Default>(&mut self) -> Rc<RefCell<T>> {
        self.add_component_with(T::default)
    }

    /// Returns the scene's `T`, creating it with `make` on first use. A new
    /// component is told about every object already in the scene.
    pub fn add_component_with<T: SceneComponent>(&mut self, make: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        let (typed, fresh) = self.components.get_or_insert_with(make);
        if let Some(erased) = fresh {
            let mut existing: Vec<_> = self.objects.iter().map(|(k, e)| (e.seq, e.info(k))).collect();
            existing.sort_unstable_by_key(|(seq, _)| *seq);
            if let Ok(mut c) = erased.try_borrow_mut() {
                for (_, info) in &existing {
                    c.on_object_added(info);
                }
            }
        }
        typed
    }

    #[must_use]
    pub fn component<T: SceneComponent>(&self) -> Option<Rc<RefCell<T>>> {
        self.components.get::<T>()
    }

    #[must_use]
    pub fn has_component<T: SceneComponent>(&self) -> bool {
        self.components.contains::<T>()
    }

    pub fn remove_component<T: SceneComponent>(&mut self) -> bool {
        self.components.remove::<T>()
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn flush_component_events(&mut self) {
        self.components.flush_deferred();
    }

    // ========================================================================
    // Frame
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn render_queue(&self) -> &RenderQueue {
        &self.render_queue
    }

    #[inline]
    pub fn render_queue_mut(&mut self) -> &mut RenderQueue {
        &mut self.render_queue
    }

    #[inline]
    #[must_use]
    pub fn draw_gizmos(&self) -> bool {
        self.draw_gizmos
    }

    pub fn set_draw_gizmos(&mut self, enabled: bool) {
        self.draw_gizmos = enabled;
    }

    /// Advances scene time by `dt` seconds and runs the update pipeline.
    pub fn update(&mut self, dt: f32) {
        self.time.delta = dt;
        self.time.elapsed += dt;
        self.time.frame += 1;
        self.run_update();
    }

    /// Runs the render pipeline. Drawing happens in whichever component
    /// consumes the render queue (normally `SceneGraphics`).
    pub fn render(&mut self) {
        self.render_queue.clear();
        let time = self.time;
        let components = self.components.snapshot();

        component::run_stage(self, &components, Stage::PreRender, &time);

        let calls = self.collect_calls(self.root, |h| h.render.as_slice(), false);
        self.run_calls(calls, |o, ctx| o.render(ctx), true);
        if self.draw_gizmos {
            let calls = self.collect_calls(self.root, |h| h.draw_gizmos.as_slice(), false);
            self.run_calls(calls, |o, ctx| o.draw_gizmos(ctx), true);
        }

        component::run_stage(self, &components, Stage::PostRender, &time);
    }

    /// Ticks `timer` and runs one full update + render.
    pub fn frame(&mut self, timer: &mut Timer) {
        timer.tick();
        self.time = timer.frame_time();
        self.run_update();
        self.render();
    }

    fn run_update(&mut self) {
        let time = self.time;
        let components = self.components.snapshot();

        component::run_stage(self, &components, Stage::PreUpdate, &time);

        let calls = self.collect_calls(self.root, |h| h.update.as_slice(), false);
        self.run_calls(calls, |o, ctx| o.update(ctx), true);

        component::run_stage(self, &components, Stage::PostUpdate, &time);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Depth-first walk from `start` collecting call records, skipping
    /// disabled subtrees. `start` itself is visited regardless of its flag
    /// when `include_start` is set.
    fn collect_calls<H: ?Sized>(
        &self,
        start: NodeHandle,
        pick: fn(&NodeHooks) -> &[HookRecord<H>],
        include_start: bool,
    ) -> Vec<Call<H>> {
        let mut calls = Vec::new();
        let mut stack = vec![start];
        while let Some(h) = stack.pop() {
            let Some(node) = self.nodes.get(h) else { continue };
            if !node.enabled && !(include_start && h == start) {
                continue;
            }
            calls.extend(pick(&node.hooks).iter().map(|r| (h, r.clone())));
            stack.extend_from_slice(&node.children);
        }
        calls
    }

    /// Drains `calls` LIFO. Objects removed or disabled by an earlier call
    /// are skipped.
    fn run_calls<H: ?Sized>(
        &mut self,
        mut calls: Vec<Call<H>>,
        call: fn(&mut H, &mut HookContext<'_>),
        require_active: bool,
    ) {
        while let Some((node, record)) = calls.pop() {
            let live = if require_active {
                self.is_object_active(record.object)
            } else {
                self.is_object_enabled(record.object)
            };
            if live {
                self.invoke(node, record.object, &record.target, call);
            }
        }
    }

    fn invoke<H: ?Sized>(
        &mut self,
        node: NodeHandle,
        object: ObjectKey,
        target: &Rc<RefCell<H>>,
        call: fn(&mut H, &mut HookContext<'_>),
    ) {
        let Ok(mut hook) = target.try_borrow_mut() else {
            warn!("Re-entrant hook call on {object:?} skipped");
            return;
        };
        let time = self.time;
        let mut ctx = HookContext {
            scene: self,
            node,
            object,
            time,
        };
        call(&mut *hook, &mut ctx);
        drop(hook);
        self.components.flush_deferred();
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Pre-order iterator returned by [`Scene::iter_depth_first`].
pub struct DepthFirst<'a> {
    nodes: &'a SlotMap<NodeHandle, SceneNode>,
    stack: Vec<(NodeHandle, usize)>,
}

impl Iterator for DepthFirst<'_> {
    type Item = (NodeHandle, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (h, depth) = self.stack.pop()?;
            let Some(node) = self.nodes.get(h) else { continue };
            self.stack
                .extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
            return Some((h, depth));
        }
    }
}
