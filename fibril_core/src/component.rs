// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The component capability and the engine-owned instance table.
//!
//! A [`Component`] is constructed once per tree position, receives an
//! [`UpdateHandle`] it can keep for requesting state changes later, and
//! renders its children from the current props and state. The engine owns the
//! props and state of every instance; a component only ever sees them by
//! reference during [`render`](Component::render).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::TypeId;
use core::fmt;

use crate::descriptor::Descriptor;
use crate::error::RenderError;
use crate::id::{FiberId, InstanceId};
use crate::props::{Props, State};
use crate::queue::UpdateHandle;

/// Positional child slots returned by a render.
pub type Children = Vec<Option<Descriptor>>;

/// A stateful node that renders to child descriptors.
pub trait Component: 'static {
    /// Constructs the instance on first encounter.
    ///
    /// `updates` is bound to this instance; keep it to request state changes.
    fn create(props: &Props, updates: UpdateHandle) -> Self
    where
        Self: Sized;

    /// State installed right after construction.
    fn initial_state(&self, props: &Props) -> State {
        _ = props;
        State::new()
    }

    /// Produces the children for the given props and state.
    ///
    /// An error aborts the whole reconciliation pass it occurs in.
    fn render(&self, props: &Props, state: &State) -> Result<Children, RenderError>;
}

type CreateFn = fn(&Props, UpdateHandle) -> Box<dyn Component>;

fn create_boxed<C: Component>(props: &Props, updates: UpdateHandle) -> Box<dyn Component> {
    Box::new(C::create(props, updates))
}

/// Type identity of a component, used to match fibers across renders.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    create: CreateFn,
}

impl ComponentType {
    /// Returns the identity of component type `C`.
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: core::any::type_name::<C>(),
            create: create_boxed::<C>,
        }
    }

    /// Returns the Rust type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns whether this is the identity of `C`.
    #[must_use]
    pub fn is<C: Component>(&self) -> bool {
        self.id == TypeId::of::<C>()
    }

    pub(crate) fn instantiate(&self, props: &Props, updates: UpdateHandle) -> Box<dyn Component> {
        (self.create)(props, updates)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

// -- Instance table --

/// Engine-side record of one component instance.
pub(crate) struct Instance {
    pub(crate) component: Box<dyn Component>,
    pub(crate) ty: ComponentType,
    pub(crate) props: Props,
    pub(crate) state: State,
    /// The fiber that last completed for this instance.
    pub(crate) fiber: Option<FiberId>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("ty", &self.ty)
            .field("props", &self.props)
            .field("state", &self.state)
            .field("fiber", &self.fiber)
            .finish_non_exhaustive()
    }
}

/// Generational slab of component instances.
#[derive(Debug, Default)]
pub(crate) struct InstanceStore {
    slots: Vec<Option<Instance>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
}

impl InstanceStore {
    /// Allocates a slot and fills it with the instance built by `make`.
    ///
    /// `make` receives the id the instance will live under, so the component
    /// can be handed an update handle bound to itself.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "instance count is bounded well below u32::MAX"
    )]
    pub(crate) fn insert_with(&mut self, make: impl FnOnce(InstanceId) -> Instance) -> InstanceId {
        let idx = if let Some(idx) = self.free_list.pop() {
            self.generation[idx as usize] += 1;
            idx
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(None);
            self.generation.push(0);
            idx
        };
        let id = InstanceId {
            idx,
            generation: self.generation[idx as usize],
        };
        self.slots[idx as usize] = Some(make(id));
        id
    }

    /// Removes an instance, returning it if the handle was live.
    pub(crate) fn remove(&mut self, id: InstanceId) -> Option<Instance> {
        if !self.is_alive(id) {
            return None;
        }
        self.free_list.push(id.idx);
        self.slots[id.idx as usize].take()
    }

    pub(crate) fn is_alive(&self, id: InstanceId) -> bool {
        self.generation.get(id.idx as usize) == Some(&id.generation)
            && self.slots[id.idx as usize].is_some()
    }

    pub(crate) fn get(&self, id: InstanceId) -> Option<&Instance> {
        if self.is_alive(id) {
            self.slots[id.idx as usize].as_ref()
        } else {
            None
        }
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        if self.is_alive(id) {
            self.slots[id.idx as usize].as_mut()
        } else {
            None
        }
    }

    /// Iterates live instances in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (InstanceId, &Instance)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let instance = slot.as_ref()?;
            let idx = u32::try_from(idx).ok()?;
            Some((
                InstanceId {
                    idx,
                    generation: self.generation[idx as usize],
                },
                instance,
            ))
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::UpdateQueue;

    struct Empty;

    impl Component for Empty {
        fn create(_props: &Props, _updates: UpdateHandle) -> Self {
            Self
        }

        fn render(&self, _props: &Props, _state: &State) -> Result<Children, RenderError> {
            Ok(Vec::new())
        }
    }

    fn instance(queue: &UpdateQueue, id: InstanceId) -> Instance {
        let ty = ComponentType::of::<Empty>();
        let props = Props::empty();
        Instance {
            component: ty.instantiate(&props, queue.handle(id)),
            ty,
            props,
            state: State::new(),
            fiber: None,
        }
    }

    #[test]
    fn removed_handles_go_stale() {
        let queue = UpdateQueue::new(|| {});
        let mut store = InstanceStore::default();
        let a = store.insert_with(|id| instance(&queue, id));
        assert!(store.remove(a).is_some(), "live handle removes");
        assert!(store.get(a).is_none(), "stale after removal");

        let b = store.insert_with(|id| instance(&queue, id));
        assert_eq!(a.index(), b.index(), "slot reused");
        assert_ne!(a, b, "generation distinguishes reuse");
        assert!(store.remove(a).is_none(), "stale handle cannot remove the new tenant");
        assert_eq!(store.len(), 1, "one live instance");
    }

    #[test]
    fn component_type_identity() {
        let ty = ComponentType::of::<Empty>();
        assert!(ty.is::<Empty>(), "matches its own type");
        assert!(ty.name().ends_with("Empty"), "carries the type name");
    }
}
