//! Scene-wide systems.
//!
//! A [`SceneComponent`] is a per-scene singleton (lighting, post-processing,
//! graphics, ...). The scene keeps them in a list sorted by
//! [`SceneComponent::order`], lowest first. Insertion is stable: two
//! components with the same order run in the order they were added.
//!
//! Components are shared as `Rc<RefCell<_>>`. During a pipeline pass the
//! scene iterates a snapshot of the list, so components may add other
//! components or objects from inside their hooks.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::scene::object::{ObjectEvent, ObjectInfo};
use crate::scene::{ObjectKey, Scene};
use crate::utils::FrameTime;

pub trait SceneComponent: Any {
    /// Position in the pipeline. Lower runs first.
    fn order(&self) -> i32 {
        0
    }

    fn on_pre_update(&mut self, _scene: &mut Scene, _time: &FrameTime) {}
    fn on_post_update(&mut self, _scene: &mut Scene, _time: &FrameTime) {}
    fn on_pre_render(&mut self, _scene: &mut Scene, _time: &FrameTime) {}
    fn on_post_render(&mut self, _scene: &mut Scene, _time: &FrameTime) {}

    /// An object was attached. Also replayed for every existing object when
    /// the component itself is added.
    fn on_object_added(&mut self, _object: &ObjectInfo) {}

    /// An object was detached; drop any reference to `key`.
    fn on_object_removed(&mut self, _key: ObjectKey) {}
}

/// Pipeline stage, used to pick the hook in [`ComponentPipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreUpdate,
    PostUpdate,
    PreRender,
    PostRender,
}

struct ComponentSlot {
    type_id: TypeId,
    order: i32,
    component: Rc<RefCell<dyn SceneComponent>>,
}

#[derive(Default)]
pub struct ComponentPipeline {
    slots: Vec<ComponentSlot>,
    typed: FxHashMap<TypeId, Rc<dyn Any>>,
    /// Events that arrived while their component was mid-hook.
    deferred: Vec<(Rc<RefCell<dyn SceneComponent>>, ObjectEvent)>,
}

impl ComponentPipeline {
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn contains<T: SceneComponent>(&self) -> bool {
        self.typed.contains_key(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn get<T: SceneComponent>(&self) -> Option<Rc<RefCell<T>>> {
        let any = self.typed.get(&TypeId::of::<T>())?;
        Rc::clone(any).downcast::<RefCell<T>>().ok()
    }

    /// Returns the existing instance, or inserts the one `make` builds.
    /// The second value is the type-erased handle of a fresh insertion.
    pub(crate) fn get_or_insert_with<T: SceneComponent>(
        &mut self,
        make: impl FnOnce() -> T,
    ) -> (Rc<RefCell<T>>, Option<Rc<RefCell<dyn SceneComponent>>>) {
        if let Some(existing) = self.get::<T>() {
            return (existing, None);
        }

        let typed = Rc::new(RefCell::new(make()));
        let order = typed.borrow().order();
        let erased: Rc<RefCell<dyn SceneComponent>> = typed.clone();
        let any: Rc<dyn Any> = typed.clone();

        // Stable: after every slot with an order <= the new one.
        let at = self.slots.partition_point(|s| s.order <= order);
        self.slots.insert(
            at,
            ComponentSlot {
                type_id: TypeId::of::<T>(),
                order,
                component: Rc::clone(&erased),
            },
        );
        self.typed.insert(TypeId::of::<T>(), any);
        debug!(
            "Added scene component {} (order {order}, slot {at})",
            std::any::type_name::<T>()
        );
        (typed, Some(erased))
    }

    pub(crate) fn remove<T: SceneComponent>(&mut self) -> bool {
        let id = TypeId::of::<T>();
        if self.typed.remove(&id).is_none() {
            return false;
        }
        self.slots.retain(|s| s.type_id != id);
        true
    }

    /// Components in pipeline order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Rc<RefCell<dyn SceneComponent>>> {
        self.slots.iter().map(|s| Rc::clone(&s.component)).collect()
    }

    /// Delivers `event` to every component, deferring the ones that are
    /// currently running a hook.
    pub(crate) fn broadcast(&mut self, event: &ObjectEvent) {
        for slot in &self.slots {
            match slot.component.try_borrow_mut() {
                Ok(mut c) => deliver(&mut *c, event),
                Err(_) => self
                    .deferred
                    .push((Rc::clone(&slot.component), event.clone())),
            }
        }
    }

    /// Retries deferred deliveries whose component is no longer busy.
    pub(crate) fn flush_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.deferred);
        for (component, event) in pending {
            let busy = match component.try_borrow_mut() {
                Ok(mut c) => {
                    deliver(&mut *c, &event);
                    false
                }
                Err(_) => true,
            };
            if busy {
                self.deferred.push((component, event));
            }
        }
    }
}

fn deliver(component: &mut dyn SceneComponent, event: &ObjectEvent) {
    match event {
        ObjectEvent::Added(info) => component.on_object_added(info),
        ObjectEvent::Removed(key) => component.on_object_removed(*key),
    }
}

/// Runs one pipeline stage over `components` against `scene`.
pub(crate) fn run_stage(
    scene: &mut Scene,
    components: &[Rc<RefCell<dyn SceneComponent>>],
    stage: Stage,
    time: &FrameTime,
) {
    for component in components {
        let Ok(mut c) = component.try_borrow_mut() else {
            debug!("Scene component busy, skipping {stage:?}");
            continue;
        };
        match stage {
            Stage::PreUpdate => c.on_pre_update(scene, time),
            Stage::PostUpdate => c.on_post_update(scene, time),
            Stage::PreRender => c.on_pre_render(scene, time),
            Stage::PostRender => c.on_post_render(scene, time),
        }
        drop(c);
        scene.flush_component_events();
    }
}
