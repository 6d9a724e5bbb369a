// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fiber storage: one node per rendered tree position, across two generations.
//!
//! ```text
//!   current tree            work-in-progress tree
//!
//!   Root ◄─────alternate───── Root'
//!    │                         │
//!    ▼ child                   ▼ child
//!   App  ◄─────alternate───── App'
//!    │                         │
//!    ▼ child                   ▼ child
//!   div ──sibling──► p  ◄───  div' ──sibling──► span'   (p: Deletion effect)
//! ```
//!
//! Both generations live in one [`FiberStore`]. Links are slot indices; the
//! `alternate` link is a plain lookup from a work-in-progress fiber to the
//! fiber it was reconciled against, never an ownership edge. The
//! work-in-progress tree never writes to current-tree fibers; deletions are
//! recorded as [`Effect`]s on the new parent instead of tags on the old node.

mod store;
mod traverse;

pub use store::FiberStore;
pub(crate) use store::NewFiber;
pub use traverse::{Children, Descendants};

use crate::id::{FiberId, HostHandle, InstanceId};

/// What a fiber stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FiberTag {
    /// A host node; its state node is a [`HostHandle`].
    Host,
    /// A component; its state node is an [`InstanceId`].
    Component,
    /// The root of a container's tree; its state node is the container.
    Root,
}

/// The host mutation a fiber owes at commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EffectTag {
    /// Nothing to do.
    #[default]
    None,
    /// Newly created; insert into the host tree.
    Placement,
    /// Reused with new props; update host properties.
    Update,
    /// Gone from the new render; remove from the host tree.
    Deletion,
}

/// The opaque object a fiber is bound to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StateNode {
    /// Not yet bound (fresh component before its first begin phase).
    #[default]
    None,
    /// A host node, or the container of a root fiber.
    Host(HostHandle),
    /// A component instance.
    Component(InstanceId),
}

/// One entry of an effect list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Effect {
    /// What to do.
    pub tag: EffectTag,
    /// The fiber to do it for. Deletions point into the current tree.
    pub fiber: FiberId,
    /// For deletions: the host node is swapped out in place by the placement
    /// of the fiber that took its position, instead of being removed.
    pub replaced: bool,
}
