//! Scene objects and capability dispatch.
//!
//! A [`GameObject`] is attached to exactly one node. Which lifecycle hooks it
//! takes part in is declared once, at registration, by
//! [`GameObject::bind_hooks`]:
//!
//! ```rust,ignore
//! impl GameObject for Spinner {
//!     fn bind_hooks(hooks: &mut HookBinder<'_, Self>) {
//!         hooks.update().draw_gizmos();
//!     }
//! }
//! impl OnUpdate for Spinner { /* ... */ }
//! impl OnDrawGizmos for Spinner { /* ... */ }
//! ```
//!
//! Each binder method is bounded on the matching hook trait (`T: OnUpdate`),
//! so binding a hook the type does not implement fails to compile. The
//! binder coerces the shared object into one trait object per bound hook and
//! stores it in a [`HookTable`]; the node then keeps a [`HookRecord`] only in
//! the dispatch lists for hooks that were bound. Objects that bind nothing
//! cost nothing per frame.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use glam::{Affine3A, Vec3, Vec4};

use crate::renderer::queue::{DrawItem, GizmoLine};
use crate::scene::post_process::PostProcessEffect;
use crate::scene::{NodeHandle, ObjectKey, Scene};
use crate::utils::FrameTime;

// ============================================================================
// Object and hook traits
// ============================================================================

/// An entity attached to a scene node.
pub trait GameObject: Any {
    /// Declares the hooks this type implements. Binds nothing by default.
    fn bind_hooks(hooks: &mut HookBinder<'_, Self>)
    where
        Self: Sized,
    {
        let _ = hooks;
    }
}

/// Called once, right after the object is attached.
pub trait OnAwake {
    fn awake(&mut self, ctx: &mut HookContext<'_>);
}

/// Called once per `Scene::update` while the object is active.
pub trait OnUpdate {
    fn update(&mut self, ctx: &mut HookContext<'_>);
}

/// Called once per `Scene::render` while the object is active. Typically
/// submits draw items through [`HookContext::submit`].
pub trait OnRender {
    fn render(&mut self, ctx: &mut HookContext<'_>);
}

/// Called when the object becomes active: on attach, when re-enabled, or
/// when its node (or an ancestor) is re-enabled.
pub trait OnEnable {
    fn on_enable(&mut self, ctx: &mut HookContext<'_>);
}

/// Mirror of [`OnEnable`]; also called when an active object is removed.
pub trait OnDisable {
    fn on_disable(&mut self, ctx: &mut HookContext<'_>);
}

/// Called after `OnRender` when gizmo drawing is on.
pub trait OnDrawGizmos {
    fn draw_gizmos(&mut self, ctx: &mut HookContext<'_>);
}

// ============================================================================
// Capability table
// ============================================================================

bitflags! {
    /// Hooks an object bound at registration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const AWAKE        = 1 << 0;
        const UPDATE       = 1 << 1;
        const RENDER       = 1 << 2;
        const ENABLE       = 1 << 3;
        const DISABLE      = 1 << 4;
        const DRAW_GIZMOS  = 1 << 5;
        const POST_PROCESS = 1 << 6;
    }
}

/// Trait objects for every hook an object bound, built once at registration.
#[derive(Clone, Default)]
pub struct HookTable {
    pub(crate) awake: Option<Rc<RefCell<dyn OnAwake>>>,
    pub(crate) update: Option<Rc<RefCell<dyn OnUpdate>>>,
    pub(crate) render: Option<Rc<RefCell<dyn OnRender>>>,
    pub(crate) enable: Option<Rc<RefCell<dyn OnEnable>>>,
    pub(crate) disable: Option<Rc<RefCell<dyn OnDisable>>>,
    pub(crate) draw_gizmos: Option<Rc<RefCell<dyn OnDrawGizmos>>>,
    pub(crate) post_process: Option<Rc<RefCell<dyn PostProcessEffect>>>,
}

impl HookTable {
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::AWAKE, self.awake.is_some());
        caps.set(Capabilities::UPDATE, self.update.is_some());
        caps.set(Capabilities::RENDER, self.render.is_some());
        caps.set(Capabilities::ENABLE, self.enable.is_some());
        caps.set(Capabilities::DISABLE, self.disable.is_some());
        caps.set(Capabilities::DRAW_GIZMOS, self.draw_gizmos.is_some());
        caps.set(Capabilities::POST_PROCESS, self.post_process.is_some());
        caps
    }

    /// The post-process role, if the object bound one.
    #[must_use]
    pub fn post_process(&self) -> Option<&Rc<RefCell<dyn PostProcessEffect>>> {
        self.post_process.as_ref()
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookTable").field(&self.capabilities()).finish()
    }
}

/// Registration-time view over a freshly attached object.
pub struct HookBinder<'a, T: GameObject> {
    object: &'a Rc<RefCell<T>>,
    table: &'a mut HookTable,
}

impl<'a, T: GameObject> HookBinder<'a, T> {
    pub(crate) fn new(object: &'a Rc<RefCell<T>>, table: &'a mut HookTable) -> Self {
        Self { object, table }
    }

    pub fn awake(&mut self) -> &mut Self
    where
        T: OnAwake,
    {
        let hook: Rc<RefCell<dyn OnAwake>> = self.object.clone();
        self.table.awake = Some(hook);
        self
    }

    pub fn update(&mut self) -> &mut Self
    where
        T: OnUpdate,
    {
        let hook: Rc<RefCell<dyn OnUpdate>> = self.object.clone();
        self.table.update = Some(hook);
        self
    }

    pub fn render(&mut self) -> &mut Self
    where
        T: OnRender,
    {
        let hook: Rc<RefCell<dyn OnRender>> = self.object.clone();
        self.table.render = Some(hook);
        self
    }

    pub fn enable(&mut self) -> &mut Self
    where
        T: OnEnable,
    {
        let hook: Rc<RefCell<dyn OnEnable>> = self.object.clone();
        self.table.enable = Some(hook);
        self
    }

    pub fn disable(&mut self) -> &mut Self
    where
        T: OnDisable,
    {
        let hook: Rc<RefCell<dyn OnDisable>> = self.object.clone();
        self.table.disable = Some(hook);
        self
    }

    pub fn draw_gizmos(&mut self) -> &mut Self
    where
        T: OnDrawGizmos,
    {
        let hook: Rc<RefCell<dyn OnDrawGizmos>> = self.object.clone();
        self.table.draw_gizmos = Some(hook);
        self
    }

    /// Registers the object as a post-process effect.
    pub fn post_process(&mut self) -> &mut Self
    where
        T: PostProcessEffect,
    {
        let effect: Rc<RefCell<dyn PostProcessEffect>> = self.object.clone();
        self.table.post_process = Some(effect);
        self
    }
}

// ============================================================================
// Per-node dispatch lists
// ============================================================================

/// A bound call: the object key plus the hook's trait object.
pub struct HookRecord<H: ?Sized> {
    pub(crate) object: ObjectKey,
    pub(crate) target: Rc<RefCell<H>>,
}

impl<H: ?Sized> Clone for HookRecord<H> {
    fn clone(&self) -> Self {
        Self {
            object: self.object,
            target: Rc::clone(&self.target),
        }
    }
}

impl<H: ?Sized> HookRecord<H> {
    #[inline]
    #[must_use]
    pub fn object(&self) -> ObjectKey {
        self.object
    }
}

/// Per-node dispatch lists. `Awake` is fired at registration and never
/// listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchList {
    Update,
    Render,
    Enable,
    Disable,
    DrawGizmos,
}

#[derive(Default)]
pub struct NodeHooks {
    pub(crate) update: Vec<HookRecord<dyn OnUpdate>>,
    pub(crate) render: Vec<HookRecord<dyn OnRender>>,
    pub(crate) enable: Vec<HookRecord<dyn OnEnable>>,
    pub(crate) disable: Vec<HookRecord<dyn OnDisable>>,
    pub(crate) draw_gizmos: Vec<HookRecord<dyn OnDrawGizmos>>,
}

fn push_record<H: ?Sized>(list: &mut Vec<HookRecord<H>>, object: ObjectKey, hook: Option<&Rc<RefCell<H>>>) {
    if let Some(target) = hook {
        list.push(HookRecord {
            object,
            target: Rc::clone(target),
        });
    }
}

impl NodeHooks {
    pub(crate) fn register(&mut self, object: ObjectKey, table: &HookTable) {
        push_record(&mut self.update, object, table.update.as_ref());
        push_record(&mut self.render, object, table.render.as_ref());
        push_record(&mut self.enable, object, table.enable.as_ref());
        push_record(&mut self.disable, object, table.disable.as_ref());
        push_record(&mut self.draw_gizmos, object, table.draw_gizmos.as_ref());
    }

    pub(crate) fn unregister(&mut self, object: ObjectKey) {
        self.update.retain(|r| r.object != object);
        self.render.retain(|r| r.object != object);
        self.enable.retain(|r| r.object != object);
        self.disable.retain(|r| r.object != object);
        self.draw_gizmos.retain(|r| r.object != object);
    }

    #[must_use]
    pub fn len(&self, list: DispatchList) -> usize {
        match list {
            DispatchList::Update => self.update.len(),
            DispatchList::Render => self.render.len(),
            DispatchList::Enable => self.enable.len(),
            DispatchList::Disable => self.disable.len(),
            DispatchList::DrawGizmos => self.draw_gizmos.len(),
        }
    }

    #[must_use]
    pub fn contains(&self, list: DispatchList, object: ObjectKey) -> bool {
        match list {
            DispatchList::Update => self.update.iter().any(|r| r.object == object),
            DispatchList::Render => self.render.iter().any(|r| r.object == object),
            DispatchList::Enable => self.enable.iter().any(|r| r.object == object),
            DispatchList::Disable => self.disable.iter().any(|r| r.object == object),
            DispatchList::DrawGizmos => self.draw_gizmos.iter().any(|r| r.object == object),
        }
    }
}

impl fmt::Debug for NodeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHooks")
            .field("update", &self.update.len())
            .field("render", &self.render.len())
            .field("enable", &self.enable.len())
            .field("disable", &self.disable.len())
            .field("draw_gizmos", &self.draw_gizmos.len())
            .finish()
    }
}

// ============================================================================
// Object storage
// ============================================================================

pub(crate) struct ObjectEntry {
    pub(crate) node: NodeHandle,
    pub(crate) enabled: bool,
    /// Attach order across the whole scene.
    pub(crate) seq: u64,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) object: Rc<RefCell<dyn GameObject>>,
    pub(crate) hooks: HookTable,
}

impl ObjectEntry {
    pub(crate) fn info(&self, key: ObjectKey) -> ObjectInfo {
        ObjectInfo {
            key,
            node: self.node,
            type_id: self.type_id,
            type_name: self.type_name,
            object: Rc::clone(&self.object),
            hooks: self.hooks.clone(),
        }
    }
}

/// What a scene component learns about a newly attached object.
#[derive(Clone)]
pub struct ObjectInfo {
    pub key: ObjectKey,
    pub node: NodeHandle,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub object: Rc<RefCell<dyn GameObject>>,
    pub hooks: HookTable,
}

impl ObjectInfo {
    #[inline]
    #[must_use]
    pub fn is<T: GameObject>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Debug for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectInfo")
            .field("key", &self.key)
            .field("node", &self.node)
            .field("type_name", &self.type_name)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Attach/detach notifications delivered to every scene component.
#[derive(Debug, Clone)]
pub enum ObjectEvent {
    Added(ObjectInfo),
    Removed(ObjectKey),
}

// ============================================================================
// Hook context
// ============================================================================

/// Everything a hook may touch while it runs.
///
/// The object's own `RefCell` is borrowed for the duration of the call, so
/// looking the object up again through `scene` yields `None`.
pub struct HookContext<'a> {
    pub scene: &'a mut Scene,
    pub node: NodeHandle,
    pub object: ObjectKey,
    pub time: FrameTime,
}

impl HookContext<'_> {
    /// World matrix of the owning node.
    #[must_use]
    pub fn world_matrix(&self) -> Affine3A {
        self.scene.world_matrix(self.node)
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.scene.position(self.node)
    }

    /// Queues a draw for this frame's render passes.
    pub fn submit(&mut self, item: DrawItem) {
        self.scene.render_queue_mut().push(item);
    }

    /// Queues a debug line for this frame.
    pub fn gizmo_line(&mut self, start: Vec3, end: Vec3, color: Vec4) {
        self.scene
            .render_queue_mut()
            .push_gizmo(GizmoLine { start, end, color });
    }
}

// ============================================================================
// Typed access
// ============================================================================

/// Upcasts a type-erased object for downcasting.
#[inline]
pub(crate) fn as_any(object: &dyn GameObject) -> &dyn Any {
    object
}

#[inline]
pub(crate) fn as_any_mut(object: &mut dyn GameObject) -> &mut dyn Any {
    object
}
