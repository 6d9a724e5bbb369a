// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Applying a finished effect list to the host.
//!
//! Effects run in list order. Deletions of a fiber's old children are
//! recorded while the fiber reconciles, so they precede the placements and
//! updates bubbled up from its new children.
//!
//! Host mutations always target the nearest *host* ancestor: component fibers
//! have no host node of their own and are skipped when looking up a parent,
//! looking for an insertion anchor, or removing a deleted subtree.

use alloc::vec::Vec;

use crate::error::EngineError;
use crate::fiber::{Effect, EffectTag, FiberTag};
use crate::id::{FiberId, HostHandle, InstanceId};
use crate::reconcile::Work;
use crate::slice::{CommitSummary, EffectRecord};

/// A commit whose host mutations all succeeded.
#[derive(Debug)]
pub(crate) struct Committed {
    pub(crate) summary: CommitSummary,
    /// Instances inside deleted subtrees, to release once the tree is published.
    pub(crate) released: Vec<InstanceId>,
}

impl Work<'_> {
    /// Applies every effect collected on `root`.
    ///
    /// Stops at the first host failure; the caller must then abandon the pass.
    pub(crate) fn commit_effects(&mut self, root: FiberId) -> Result<Committed, EngineError> {
        let effects = self.fibers.take_effects(root);
        let mut committed = Committed {
            summary: CommitSummary::default(),
            released: Vec::new(),
        };
        for effect in effects {
            self.commit_effect(effect, &mut committed.released)?;
            let fiber_tag = self.fibers.tag(effect.fiber);
            committed.summary.record(EffectRecord {
                tag: effect.tag,
                fiber_tag,
                fiber_index: effect.fiber.index(),
                handle: match fiber_tag {
                    FiberTag::Host => self.fibers.host_handle(effect.fiber),
                    _ => None,
                },
            });
        }
        Ok(committed)
    }

    fn commit_effect(
        &mut self,
        effect: Effect,
        released: &mut Vec<InstanceId>,
    ) -> Result<(), EngineError> {
        let fiber = effect.fiber;
        match effect.tag {
            EffectTag::Placement => {
                if self.fibers.tag(fiber) == FiberTag::Host {
                    self.commit_placement(fiber)?;
                }
                // Attached from here on; later anchor searches may use it.
                self.fibers.set_effect_tag(fiber, EffectTag::None);
            }
            EffectTag::Update => {
                if self.fibers.tag(fiber) == FiberTag::Host
                    && let (Some(handle), Some(old)) =
                        (self.fibers.host_handle(fiber), self.fibers.alternate(fiber))
                {
                    self.host
                        .set_properties(handle, self.fibers.props(old), self.fibers.props(fiber))?;
                }
            }
            EffectTag::Deletion => self.commit_deletion(fiber, effect.replaced, released)?,
            EffectTag::None => {}
        }
        Ok(())
    }

    fn commit_placement(&mut self, fiber: FiberId) -> Result<(), EngineError> {
        let (Some(parent), Some(handle)) = (self.host_parent(fiber), self.fibers.host_handle(fiber))
        else {
            return Ok(());
        };
        if let Some(old) = self.fibers.replaces(fiber)
            && let Some(old_handle) = self.fibers.host_handle(old)
        {
            self.host.replace_child(parent, old_handle, handle)?;
        } else if let Some(anchor) = self.host_sibling(fiber) {
            self.host.insert_before(parent, handle, anchor)?;
        } else {
            self.host.insert_child(parent, handle)?;
        }
        Ok(())
    }

    /// Removes the host-visible part of a deleted subtree and collects its
    /// component instances.
    fn commit_deletion(
        &mut self,
        fiber: FiberId,
        replaced: bool,
        released: &mut Vec<InstanceId>,
    ) -> Result<(), EngineError> {
        released.extend(
            self.fibers
                .descendants(fiber)
                .filter_map(|id| self.fibers.instance(id)),
        );
        if replaced {
            return Ok(());
        }
        let Some(parent) = self.host_parent(fiber) else {
            return Ok(());
        };

        let mut node = fiber;
        loop {
            if self.fibers.tag(node) == FiberTag::Component {
                if let Some(child) = self.fibers.first_child(node) {
                    node = child;
                    continue;
                }
            } else if let Some(handle) = self.fibers.host_handle(node) {
                self.host.remove_child(parent, handle)?;
            }

            while node != fiber && self.fibers.next_sibling(node).is_none() {
                match self.fibers.parent(node) {
                    Some(up) => node = up,
                    None => return Ok(()),
                }
            }
            if node == fiber {
                return Ok(());
            }
            match self.fibers.next_sibling(node) {
                Some(next) => node = next,
                None => return Ok(()),
            }
        }
    }

    /// Returns the host node of the nearest host (or root) ancestor.
    fn host_parent(&self, fiber: FiberId) -> Option<HostHandle> {
        let mut node = self.fibers.parent(fiber)?;
        while self.fibers.tag(node) == FiberTag::Component {
            node = self.fibers.parent(node)?;
        }
        self.fibers.host_handle(node)
    }

    /// Returns the attached host node that should follow `fiber` under the
    /// same host parent, if any.
    fn host_sibling(&self, fiber: FiberId) -> Option<HostHandle> {
        let mut node = fiber;
        'siblings: loop {
            // Climb through component ancestors until a next sibling exists.
            while self.fibers.next_sibling(node).is_none() {
                let parent = self.fibers.parent(node)?;
                if self.fibers.tag(parent) != FiberTag::Component {
                    return None;
                }
                node = parent;
            }
            node = self.fibers.next_sibling(node)?;

            // Descend to the first host node of this sibling.
            loop {
                let pending = self.fibers.effect_tag(node) == EffectTag::Placement;
                match self.fibers.tag(node) {
                    FiberTag::Host if !pending => return self.fibers.host_handle(node),
                    FiberTag::Host => {
                        // Not attached yet, unless it takes over a node that is.
                        if let Some(old) = self.fibers.replaces(node) {
                            return self.fibers.host_handle(old);
                        }
                        continue 'siblings;
                    }
                    FiberTag::Component if pending => continue 'siblings,
                    FiberTag::Component => match self.fibers.first_child(node) {
                        Some(child) => node = child,
                        None => continue 'siblings,
                    },
                    FiberTag::Root => return None,
                }
            }
        }
    }
}
