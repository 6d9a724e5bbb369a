// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One unit of work: begin a fiber, reconcile its children, complete upward.
//!
//! Traversal is pre-order depth-first over the work-in-progress tree:
//!
//! ```text
//!   perform_unit(f)
//!     begin_work(f) ── produces f's children by diffing against f.alternate
//!     f has a child?        ──► next unit is the child
//!     else complete f, then:
//!       f has a sibling?    ──► next unit is the sibling
//!       else complete parent, repeat; at the root the pass is ready to commit
//! ```
//!
//! Children are matched strictly by position: slot `i` of the new render is
//! compared with the fiber that came from slot `i` of the previous render.

use crate::component::{Instance, InstanceStore};
use crate::descriptor::{Descriptor, Kind};
use crate::error::EngineError;
use crate::fiber::{Effect, EffectTag, FiberStore, FiberTag, NewFiber, StateNode};
use crate::host::Host;
use crate::id::{FiberId, INVALID, InstanceId};
use crate::journal::PassJournal;
use crate::props::{Props, PropsDelta, State};
use crate::queue::UpdateQueue;

/// Borrowed engine state needed while a pass runs.
pub(crate) struct Work<'a> {
    pub(crate) fibers: &'a mut FiberStore,
    pub(crate) instances: &'a mut InstanceStore,
    pub(crate) queue: &'a UpdateQueue,
    pub(crate) host: &'a mut dyn Host,
    pub(crate) journal: &'a mut PassJournal,
}

impl Work<'_> {
    /// Processes `fiber` and returns the next unit, or `None` once the root
    /// has completed and its effect list is final.
    pub(crate) fn perform_unit(&mut self, fiber: FiberId) -> Result<Option<FiberId>, EngineError> {
        self.begin_work(fiber)?;
        if let Some(child) = self.fibers.first_child(fiber) {
            return Ok(Some(child));
        }
        let mut node = fiber;
        loop {
            self.complete_work(node);
            if let Some(sibling) = self.fibers.next_sibling(node) {
                return Ok(Some(sibling));
            }
            match self.fibers.parent(node) {
                Some(parent) => node = parent,
                None => return Ok(None),
            }
        }
    }

    fn alloc(&mut self, new: NewFiber) -> FiberId {
        let id = self.fibers.alloc(new);
        self.journal.fibers.push(id);
        id
    }

    // -- Begin --

    fn begin_work(&mut self, fiber: FiberId) -> Result<(), EngineError> {
        match self.fibers.tag(fiber) {
            FiberTag::Component => self.update_component(fiber),
            FiberTag::Host => self.update_host(fiber),
            FiberTag::Root => {
                let props = self.fibers.props(fiber).clone();
                self.reconcile_children(fiber, props.children());
                Ok(())
            }
        }
    }

    fn update_host(&mut self, fiber: FiberId) -> Result<(), EngineError> {
        if self.fibers.state_node(fiber) == StateNode::None
            && let Some(Kind::Host(kind)) = self.fibers.kind(fiber)
        {
            let handle = self.host.create_handle(kind, self.fibers.props(fiber))?;
            self.journal.handles.push(handle);
            self.fibers.set_state_node(fiber, StateNode::Host(handle));
        }
        let props = self.fibers.props(fiber).clone();
        self.reconcile_children(fiber, props.children());
        Ok(())
    }

    fn update_component(&mut self, fiber: FiberId) -> Result<(), EngineError> {
        let props = self.fibers.props(fiber).clone();
        let existing = match self.fibers.state_node(fiber) {
            StateNode::Component(id) if self.instances.is_alive(id) => Some(id),
            _ => None,
        };

        let id = if let Some(id) = existing {
            let Some(instance) = self.instances.get(id) else {
                return Ok(());
            };
            if Props::ptr_eq(&instance.props, &props) && self.fibers.partial_state(fiber).is_none() {
                self.clone_child_fibers(fiber);
                return Ok(());
            }
            self.journal.snapshot(id, instance);
            id
        } else {
            let Some(id) = self.create_instance(fiber, &props) else {
                return Ok(());
            };
            id
        };

        let partial = self.fibers.take_partial(fiber);
        let Some(instance) = self.instances.get_mut(id) else {
            return Ok(());
        };
        instance.props = props;
        if let Some(delta) = partial {
            instance.state.merge(delta);
        }
        let children = instance
            .component
            .render(&instance.props, &instance.state)
            .map_err(|error| EngineError::Render {
                component: instance.ty.name(),
                error,
            })?;
        self.reconcile_children(fiber, &children);
        Ok(())
    }

    fn create_instance(&mut self, fiber: FiberId, props: &Props) -> Option<InstanceId> {
        let Some(Kind::Component(ty)) = self.fibers.kind(fiber) else {
            return None;
        };
        let ty = *ty;
        let queue = self.queue;
        let id = self.instances.insert_with(|id| {
            let component = ty.instantiate(props, queue.handle(id));
            let state = component.initial_state(props);
            Instance {
                component,
                ty,
                props: props.clone(),
                state,
                fiber: None,
            }
        });
        self.journal.created.push(id);
        self.fibers.set_state_node(fiber, StateNode::Component(id));
        Some(id)
    }

    /// Copies the previous children verbatim, for a component that skipped
    /// rendering. The copies carry no effect but are still visited.
    fn clone_child_fibers(&mut self, fiber: FiberId) {
        let Some(old) = self.fibers.alternate(fiber) else {
            return;
        };
        let mut prev: Option<FiberId> = None;
        let mut cursor = self.fibers.first_child(old);
        while let Some(old_child) = cursor {
            let new = self.alloc(NewFiber {
                tag: self.fibers.tag(old_child),
                kind: self.fibers.kind(old_child).cloned(),
                props: self.fibers.props(old_child).clone(),
                state_node: self.fibers.state_node(old_child),
                parent: fiber.idx,
                slot: self.fibers.slot(old_child),
                alternate: old_child.idx,
                partial_state: self.fibers.partial_state(old_child).cloned(),
                effect_tag: EffectTag::None,
            });
            self.link(fiber, prev, new);
            prev = Some(new);
            cursor = self.fibers.next_sibling(old_child);
        }
    }

    // -- Child reconciliation --

    #[expect(
        clippy::cast_possible_truncation,
        reason = "child slot counts are bounded well below u32::MAX"
    )]
    fn reconcile_children(&mut self, wip: FiberId, elements: &[Option<Descriptor>]) {
        let mut old = self
            .fibers
            .alternate(wip)
            .and_then(|alt| self.fibers.first_child(alt));
        let mut prev: Option<FiberId> = None;
        let mut index = 0_usize;

        while index < elements.len() || old.is_some() {
            let slot = index as u32;
            let old_here = old.filter(|&o| self.fibers.slot(o) == slot);
            let element = elements.get(index).and_then(Option::as_ref);

            let same = match (old_here, element) {
                (Some(o), Some(e)) => self
                    .fibers
                    .kind(o)
                    .is_some_and(|kind| kind.same_type(e.kind())),
                _ => false,
            };

            let new = match (old_here, element) {
                (Some(o), Some(e)) if same => Some(self.reuse(wip, o, e, slot)),
                (_, Some(e)) => Some(self.place(wip, e, slot)),
                _ => None,
            };

            if let Some(o) = old_here {
                if !same {
                    // Host for host in the same slot: swap in place at commit.
                    let replacement = new.filter(|&n| {
                        self.fibers.tag(n) == FiberTag::Host && self.fibers.tag(o) == FiberTag::Host
                    });
                    if let Some(n) = replacement {
                        self.fibers.set_replaces(n, o);
                    }
                    self.fibers.push_effect(
                        wip,
                        Effect {
                            tag: EffectTag::Deletion,
                            fiber: o,
                            replaced: replacement.is_some(),
                        },
                    );
                }
                old = self.fibers.next_sibling(o);
            }

            if let Some(n) = new {
                self.link(wip, prev, n);
                prev = Some(n);
            }
            index += 1;
        }
    }

    fn reuse(&mut self, wip: FiberId, old: FiberId, element: &Descriptor, slot: u32) -> FiberId {
        // Children are reconciled separately and never count toward the delta.
        let prev = self.fibers.props(old);
        let next = element.props();
        let effect_tag = if Props::ptr_eq(prev, next) || PropsDelta::between(prev, next).is_empty()
        {
            EffectTag::None
        } else {
            EffectTag::Update
        };
        self.alloc(NewFiber {
            tag: self.fibers.tag(old),
            kind: Some(element.kind().clone()),
            props: element.props().clone(),
            state_node: self.fibers.state_node(old),
            parent: wip.idx,
            slot,
            alternate: old.idx,
            partial_state: self.fibers.partial_state(old).cloned(),
            effect_tag,
        })
    }

    fn place(&mut self, wip: FiberId, element: &Descriptor, slot: u32) -> FiberId {
        let tag = match element.kind() {
            Kind::Host(_) => FiberTag::Host,
            Kind::Component(_) => FiberTag::Component,
        };
        self.alloc(NewFiber {
            tag,
            kind: Some(element.kind().clone()),
            props: element.props().clone(),
            state_node: StateNode::None,
            parent: wip.idx,
            slot,
            alternate: INVALID,
            partial_state: None,
            effect_tag: EffectTag::Placement,
        })
    }

    fn link(&mut self, parent: FiberId, prev: Option<FiberId>, new: FiberId) {
        match prev {
            None => self.fibers.set_first_child(parent, new),
            Some(prev) => self.fibers.set_next_sibling(prev, new),
        }
    }

    // -- Complete --

    /// Publishes component fibers and bubbles effects to the parent.
    fn complete_work(&mut self, fiber: FiberId) {
        if let StateNode::Component(id) = self.fibers.state_node(fiber)
            && let Some(instance) = self.instances.get(id)
        {
            self.journal.snapshot(id, instance);
            if let Some(instance) = self.instances.get_mut(id) {
                instance.fiber = Some(fiber);
            }
        }

        let Some(parent) = self.fibers.parent(fiber) else {
            return;
        };
        let effects = self.fibers.take_effects(fiber);
        self.fibers.extend_effects(parent, effects);
        let tag = self.fibers.effect_tag(fiber);
        if tag != EffectTag::None {
            self.fibers.push_effect(
                parent,
                Effect {
                    tag,
                    fiber,
                    replaced: false,
                },
            );
        }
    }
}

/// Returns the topmost ancestor of `fiber` (its root).
pub(crate) fn root_of(fibers: &FiberStore, fiber: FiberId) -> FiberId {
    let mut node = fiber;
    while let Some(parent) = fibers.parent(node) {
        node = parent;
    }
    node
}

/// Attaches a seeded partial state to an instance's committed fiber.
pub(crate) fn attach_partial(
    fibers: &mut FiberStore,
    instances: &InstanceStore,
    journal: &mut PassJournal,
    instance: InstanceId,
    partial: State,
) -> Option<FiberId> {
    let fiber = instances
        .get(instance)
        .and_then(|i| i.fiber)
        .filter(|&f| fibers.is_alive(f))?;
    fibers.merge_partial(fiber, partial);
    journal.attached.push(fiber);
    Some(fiber)
}
