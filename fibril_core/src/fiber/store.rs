// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays fiber storage with allocation and link management.

use alloc::vec::Vec;

use super::traverse::{Children, Descendants};
use super::{Effect, EffectTag, FiberTag, StateNode};
use crate::descriptor::Kind;
use crate::id::{FiberId, HostHandle, INVALID, InstanceId};
use crate::props::{Props, State};

/// Everything needed to allocate one fiber.
#[derive(Debug)]
pub(crate) struct NewFiber {
    pub(crate) tag: FiberTag,
    pub(crate) kind: Option<Kind>,
    pub(crate) props: Props,
    pub(crate) state_node: StateNode,
    pub(crate) parent: u32,
    pub(crate) slot: u32,
    pub(crate) alternate: u32,
    pub(crate) partial_state: Option<State>,
    pub(crate) effect_tag: EffectTag,
}

/// Struct-of-arrays storage for the fibers of every tree generation.
///
/// Fibers are addressed by [`FiberId`] handles. Freed fibers are recycled via
/// a free list, and generation counters make stale handles fail validation.
#[derive(Debug, Default)]
pub struct FiberStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) child: Vec<u32>,
    pub(crate) sibling: Vec<u32>,
    /// Index of the child slot this fiber was reconciled from.
    pub(crate) slot: Vec<u32>,

    // -- Cross-generation links --
    pub(crate) alternate: Vec<u32>,
    /// Current-tree host fiber this placement swaps out in place.
    pub(crate) replaces: Vec<u32>,

    // -- Payload --
    pub(crate) tag: Vec<FiberTag>,
    pub(crate) kind: Vec<Option<Kind>>,
    pub(crate) props: Vec<Props>,
    pub(crate) state_node: Vec<StateNode>,
    pub(crate) partial_state: Vec<Option<State>>,

    // -- Effects --
    pub(crate) effect_tag: Vec<EffectTag>,
    pub(crate) effects: Vec<Vec<Effect>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
}

impl FiberStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Allocation --

    pub(crate) fn alloc(&mut self, new: NewFiber) -> FiberId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = new.parent;
            self.child[i] = INVALID;
            self.sibling[i] = INVALID;
            self.slot[i] = new.slot;
            self.alternate[i] = new.alternate;
            self.replaces[i] = INVALID;
            self.tag[i] = new.tag;
            self.kind[i] = new.kind;
            self.props[i] = new.props;
            self.state_node[i] = new.state_node;
            self.partial_state[i] = new.partial_state;
            self.effect_tag[i] = new.effect_tag;
            self.effects[i].clear();
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(new.parent);
            self.child.push(INVALID);
            self.sibling.push(INVALID);
            self.slot.push(new.slot);
            self.alternate.push(new.alternate);
            self.replaces.push(INVALID);
            self.tag.push(new.tag);
            self.kind.push(new.kind);
            self.props.push(new.props);
            self.state_node.push(new.state_node);
            self.partial_state.push(new.partial_state);
            self.effect_tag.push(new.effect_tag);
            self.effects.push(Vec::new());
            self.generation.push(0);
            idx
        };
        self.id_at(idx)
    }

    /// Frees a fiber. Links pointing at it are not touched.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub(crate) fn free(&mut self, id: FiberId) {
        self.validate(id);
        let i = id.idx as usize;
        self.generation[i] += 1;
        self.kind[i] = None;
        self.props[i] = Props::empty();
        self.state_node[i] = StateNode::None;
        self.partial_state[i] = None;
        self.effects[i] = Vec::new();
        self.free_list.push(id.idx);
    }

    /// Returns whether the given handle refers to a live fiber.
    #[must_use]
    pub fn is_alive(&self, id: FiberId) -> bool {
        id.idx < self.len && self.generation[id.idx as usize] == id.generation
    }

    /// Returns the number of live fibers across all generations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Read API --

    /// Returns the fiber's tag.
    #[must_use]
    pub fn tag(&self, id: FiberId) -> FiberTag {
        self.validate(id);
        self.tag[id.idx as usize]
    }

    /// Returns the fiber's kind; `None` for roots.
    #[must_use]
    pub fn kind(&self, id: FiberId) -> Option<&Kind> {
        self.validate(id);
        self.kind[id.idx as usize].as_ref()
    }

    /// Returns the fiber's props.
    #[must_use]
    pub fn props(&self, id: FiberId) -> &Props {
        self.validate(id);
        &self.props[id.idx as usize]
    }

    /// Returns what the fiber is bound to.
    #[must_use]
    pub fn state_node(&self, id: FiberId) -> StateNode {
        self.validate(id);
        self.state_node[id.idx as usize]
    }

    /// Returns the host node (or container, for roots) bound to the fiber.
    #[must_use]
    pub fn host_handle(&self, id: FiberId) -> Option<HostHandle> {
        match self.state_node(id) {
            StateNode::Host(handle) => Some(handle),
            _ => None,
        }
    }

    /// Returns the component instance bound to the fiber.
    #[must_use]
    pub fn instance(&self, id: FiberId) -> Option<InstanceId> {
        match self.state_node(id) {
            StateNode::Component(instance) => Some(instance),
            _ => None,
        }
    }

    /// Returns the parent, or `None` for roots.
    #[must_use]
    pub fn parent(&self, id: FiberId) -> Option<FiberId> {
        self.validate(id);
        self.link(self.parent[id.idx as usize])
    }

    /// Returns the first child.
    #[must_use]
    pub fn first_child(&self, id: FiberId) -> Option<FiberId> {
        self.validate(id);
        self.link(self.child[id.idx as usize])
    }

    /// Returns the next sibling.
    #[must_use]
    pub fn next_sibling(&self, id: FiberId) -> Option<FiberId> {
        self.validate(id);
        self.link(self.sibling[id.idx as usize])
    }

    /// Returns the fiber this one was reconciled against, while a pass is in
    /// flight. Cleared once the pass commits.
    #[must_use]
    pub fn alternate(&self, id: FiberId) -> Option<FiberId> {
        self.validate(id);
        self.link(self.alternate[id.idx as usize])
    }

    /// Returns the pending effect tag. Cleared once the pass commits.
    #[must_use]
    pub fn effect_tag(&self, id: FiberId) -> EffectTag {
        self.validate(id);
        self.effect_tag[id.idx as usize]
    }

    /// Returns the state delta waiting to be merged at this fiber.
    #[must_use]
    pub fn partial_state(&self, id: FiberId) -> Option<&State> {
        self.validate(id);
        self.partial_state[id.idx as usize].as_ref()
    }

    /// Returns the effects bubbled up to this fiber so far.
    #[must_use]
    pub fn effects(&self, id: FiberId) -> &[Effect] {
        self.validate(id);
        &self.effects[id.idx as usize]
    }

    /// Returns an iterator over the direct children.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn children(&self, id: FiberId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.child[id.idx as usize])
    }

    /// Returns a pre-order iterator over `id` and its whole subtree.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn descendants(&self, id: FiberId) -> Descendants<'_> {
        self.validate(id);
        Descendants::new(self, id.idx)
    }

    // -- Link API --

    /// Makes `child` the first child of `parent`.
    pub(crate) fn set_first_child(&mut self, parent: FiberId, child: FiberId) {
        self.validate(parent);
        self.validate(child);
        self.child[parent.idx as usize] = child.idx;
    }

    /// Makes `next` the next sibling of `prev`.
    pub(crate) fn set_next_sibling(&mut self, prev: FiberId, next: FiberId) {
        self.validate(prev);
        self.validate(next);
        self.sibling[prev.idx as usize] = next.idx;
    }

    pub(crate) fn set_state_node(&mut self, id: FiberId, node: StateNode) {
        self.validate(id);
        self.state_node[id.idx as usize] = node;
    }

    pub(crate) fn set_replaces(&mut self, id: FiberId, old: FiberId) {
        self.validate(id);
        self.replaces[id.idx as usize] = old.idx;
    }

    /// Returns the current-tree fiber this placement replaces in place.
    pub(crate) fn replaces(&self, id: FiberId) -> Option<FiberId> {
        self.validate(id);
        self.link(self.replaces[id.idx as usize])
    }

    pub(crate) fn set_effect_tag(&mut self, id: FiberId, tag: EffectTag) {
        self.validate(id);
        self.effect_tag[id.idx as usize] = tag;
    }

    pub(crate) fn slot(&self, id: FiberId) -> u32 {
        self.validate(id);
        self.slot[id.idx as usize]
    }

    /// Merges `delta` into the fiber's pending partial state.
    pub(crate) fn merge_partial(&mut self, id: FiberId, delta: State) {
        self.validate(id);
        let pending = &mut self.partial_state[id.idx as usize];
        if let Some(existing) = pending {
            existing.merge(delta);
        } else {
            *pending = Some(delta);
        }
    }

    pub(crate) fn take_partial(&mut self, id: FiberId) -> Option<State> {
        self.validate(id);
        self.partial_state[id.idx as usize].take()
    }

    pub(crate) fn clear_partial(&mut self, id: FiberId) {
        self.validate(id);
        self.partial_state[id.idx as usize] = None;
    }

    pub(crate) fn push_effect(&mut self, id: FiberId, effect: Effect) {
        self.validate(id);
        self.effects[id.idx as usize].push(effect);
    }

    pub(crate) fn take_effects(&mut self, id: FiberId) -> Vec<Effect> {
        self.validate(id);
        core::mem::take(&mut self.effects[id.idx as usize])
    }

    pub(crate) fn extend_effects(&mut self, id: FiberId, effects: Vec<Effect>) {
        self.validate(id);
        self.effects[id.idx as usize].extend(effects);
    }

    /// Drops every link into the previous generation once a pass commits.
    pub(crate) fn settle(&mut self, id: FiberId) {
        self.validate(id);
        let i = id.idx as usize;
        self.alternate[i] = INVALID;
        self.replaces[i] = INVALID;
        self.effect_tag[i] = EffectTag::None;
        self.effects[i].clear();
    }

    // -- Internal helpers --

    pub(crate) fn id_at(&self, idx: u32) -> FiberId {
        FiberId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    fn link(&self, idx: u32) -> Option<FiberId> {
        (idx != INVALID).then(|| self.id_at(idx))
    }

    /// Panics if `id` is stale.
    pub(crate) fn validate(&self, id: FiberId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale FiberId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::descriptor::HostKind;

    fn host(store: &mut FiberStore, parent: Option<FiberId>, slot: u32) -> FiberId {
        store.alloc(NewFiber {
            tag: FiberTag::Host,
            kind: Some(Kind::Host(HostKind::new("div"))),
            props: Props::empty(),
            state_node: StateNode::None,
            parent: parent.map_or(INVALID, |p| p.idx),
            slot,
            alternate: INVALID,
            partial_state: None,
            effect_tag: EffectTag::Placement,
        })
    }

    /// Builds `a -> [b -> [d], c]` and returns `[a, b, c, d]`.
    fn small_tree(store: &mut FiberStore) -> [FiberId; 4] {
        let a = host(store, None, 0);
        let b = host(store, Some(a), 0);
        let c = host(store, Some(a), 1);
        let d = host(store, Some(b), 0);
        store.set_first_child(a, b);
        store.set_next_sibling(b, c);
        store.set_first_child(b, d);
        [a, b, c, d]
    }

    #[test]
    fn children_follow_sibling_links() {
        let mut store = FiberStore::new();
        let [a, b, c, _] = small_tree(&mut store);
        let kids: Vec<_> = store.children(a).collect();
        assert_eq!(kids, vec![b, c], "first child then sibling");
    }

    #[test]
    fn descendants_is_preorder_and_stays_in_subtree() {
        let mut store = FiberStore::new();
        let [a, b, c, d] = small_tree(&mut store);
        let all: Vec<_> = store.descendants(a).collect();
        assert_eq!(all, vec![a, b, d, c], "pre-order walk");
        let sub: Vec<_> = store.descendants(b).collect();
        assert_eq!(sub, vec![b, d], "sibling c is outside b's subtree");
    }

    #[test]
    fn freed_slots_are_recycled_with_new_generation() {
        let mut store = FiberStore::new();
        let a = host(&mut store, None, 0);
        store.free(a);
        assert!(!store.is_alive(a), "freed fiber is dead");
        let b = host(&mut store, None, 0);
        assert_eq!(a.index(), b.index(), "slot recycled");
        assert_ne!(a.generation(), b.generation(), "generation bumped");
        assert_eq!(store.live_count(), 1, "one live fiber");
    }

    #[test]
    fn liveness_tracks_generations_across_many_frees() {
        let mut store = FiberStore::new();
        let first: Vec<_> = (0..64).map(|i| host(&mut store, None, i)).collect();
        for &id in &first {
            store.free(id);
        }
        assert!(first.iter().all(|&id| !store.is_alive(id)), "every freed fiber is dead");
        let second: Vec<_> = (0..64).map(|i| host(&mut store, None, i)).collect();
        assert!(second.iter().all(|&id| store.is_alive(id)), "recycled slots are live");
        assert!(first.iter().all(|&id| !store.is_alive(id)), "old handles stay dead");
        assert_eq!(store.live_count(), 64, "free list drained");
    }

    #[test]
    #[should_panic(expected = "stale FiberId")]
    fn stale_handle_panics() {
        let mut store = FiberStore::new();
        let a = host(&mut store, None, 0);
        store.free(a);
        let _ = store.tag(a);
    }

    #[test]
    fn merge_partial_accumulates() {
        let mut store = FiberStore::new();
        let a = host(&mut store, None, 0);
        store.merge_partial(a, State::new().with("x", 1));
        store.merge_partial(a, State::new().with("y", 2));
        let merged = store.take_partial(a);
        assert_eq!(
            merged,
            Some(State::new().with("x", 1).with("y", 2)),
            "both deltas kept"
        );
        assert!(store.partial_state(a).is_none(), "taken");
    }

    #[test]
    fn settle_clears_pass_bookkeeping() {
        let mut store = FiberStore::new();
        let [a, b, ..] = small_tree(&mut store);
        store.push_effect(
            a,
            Effect {
                tag: EffectTag::Placement,
                fiber: b,
                replaced: false,
            },
        );
        store.settle(a);
        assert_eq!(store.effect_tag(a), EffectTag::None, "tag cleared");
        assert!(store.effects(a).is_empty(), "effects cleared");
        assert!(store.alternate(a).is_none(), "no alternate");
    }
}
