// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handle types for fibers, component instances, and host nodes.

use core::fmt;

/// Sentinel value indicating "no fiber" in index fields.
pub const INVALID: u32 = u32::MAX;

/// A handle to a fiber in a [`FiberStore`](crate::fiber::FiberStore).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a fiber is freed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiberId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl FiberId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberId({}@gen{})", self.idx, self.generation)
    }
}

/// A handle to a live component instance owned by an [`Engine`](crate::Engine).
///
/// Instances outlive individual fibers: the same instance is carried from the
/// current tree to the work-in-progress tree whenever its position keeps the
/// same component type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl InstanceId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({}@gen{})", self.idx, self.generation)
    }
}

/// An opaque reference to a node in the host's tree.
///
/// Handles are minted by [`Host::create_handle`](crate::host::Host::create_handle)
/// and by whoever owns a root container. The engine never looks inside them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostHandle(pub u32);

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({})", self.0)
    }
}
