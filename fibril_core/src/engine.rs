// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The caller-owned engine context and its configuration.
//!
//! An [`Engine`] owns everything a render needs between slices: the fiber
//! arena, the component instances, the update queue, and the committed root
//! of every container. Nothing is global; two engines never share state.
//!
//! The work loop itself lives in [`scheduler`](crate::scheduler).

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::component::{Component, InstanceStore};
use crate::descriptor::Descriptor;
use crate::fiber::FiberStore;
use crate::id::{FiberId, HostHandle, InstanceId};
use crate::props::{Props, State};
use crate::queue::{SliceRequester, Update, UpdateHandle, UpdateQueue};
use crate::scheduler::Pass;
use crate::time::Duration;

/// Tuning knobs for the work loop.
///
/// Durations are in host ticks. The presets assume nanosecond ticks; use
/// [`with_min_remaining`](Self::with_min_remaining) for other timebases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// A unit only starts while the slice has more than this much time left.
    pub min_remaining: Duration,
    /// When the host grants a slice because its timeout fired, run at least
    /// one unit even if no time is left, so work always makes progress.
    pub progress_when_expired: bool,
}

impl EngineConfig {
    /// Preset for idle-callback hosts: keep 1 ms in reserve.
    #[must_use]
    pub const fn idle_callback() -> Self {
        Self {
            min_remaining: Duration(1_000_000),
            progress_when_expired: true,
        }
    }

    /// Preset for hosts that slice inside a frame callback: keep 2 ms in
    /// reserve for the host's own frame work.
    #[must_use]
    pub const fn frame_aligned() -> Self {
        Self {
            min_remaining: Duration(2_000_000),
            progress_when_expired: true,
        }
    }

    /// Returns this config with a different reserve.
    #[must_use]
    pub const fn with_min_remaining(mut self, min_remaining: Duration) -> Self {
        self.min_remaining = min_remaining;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::idle_callback()
    }
}

/// Incremental reconciliation engine.
///
/// Feed it with [`mount`](Self::mount), [`unmount`](Self::unmount), and
/// component update handles; drive it with
/// [`advance`](Self::advance) whenever the host grants a slice.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) fibers: FiberStore,
    pub(crate) instances: InstanceStore,
    pub(crate) queue: UpdateQueue,
    /// Committed root fiber per container.
    pub(crate) roots: BTreeMap<HostHandle, FiberId>,
    pub(crate) pass: Option<Pass>,
    pub(crate) slice_index: u64,
    pub(crate) pass_index: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("roots", &self.roots)
            .field("queued", &self.queue.len())
            .field("live_fibers", &self.fibers.live_count())
            .field("instances", &self.instances.len())
            .field("reconciling", &self.pass.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine that calls `requester` whenever it needs a slice.
    pub fn new(config: EngineConfig, requester: impl SliceRequester + 'static) -> Self {
        Self {
            config,
            fibers: FiberStore::new(),
            instances: InstanceStore::default(),
            queue: UpdateQueue::new(requester),
            roots: BTreeMap::new(),
            pass: None,
            slice_index: 0,
            pass_index: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Entry points --

    /// Queues rendering `descriptor` as the whole tree of `container`.
    pub fn mount(&mut self, descriptor: Descriptor, container: HostHandle) {
        self.queue.push(Update::Root {
            container,
            descriptor: Some(descriptor),
        });
    }

    /// Queues tearing down the tree of `container`.
    pub fn unmount(&mut self, container: HostHandle) {
        self.queue.push(Update::Root {
            container,
            descriptor: None,
        });
    }

    /// Queues merging `partial` into the state of `instance`.
    pub fn request_update(&self, instance: InstanceId, partial: State) {
        self.queue.handle(instance).request_update(partial);
    }

    /// Returns an update handle for `instance`, like the one it was created with.
    #[must_use]
    pub fn update_handle(&self, instance: InstanceId) -> UpdateHandle {
        self.queue.handle(instance)
    }

    // -- Inspection --

    /// Returns whether queued updates or an in-flight pass remain.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.pass.is_some() || !self.queue.is_empty()
    }

    /// Returns whether a pass has started reconciling but not yet committed.
    #[must_use]
    pub const fn is_reconciling(&self) -> bool {
        self.pass.is_some()
    }

    /// Returns the number of queued updates.
    #[must_use]
    pub fn pending_updates(&self) -> usize {
        self.queue.len()
    }

    /// Returns the committed root fiber of `container`.
    #[must_use]
    pub fn current_root(&self, container: HostHandle) -> Option<FiberId> {
        self.roots.get(&container).copied()
    }

    /// Iterates containers that have a committed tree.
    pub fn containers(&self) -> impl Iterator<Item = HostHandle> + '_ {
        self.roots.keys().copied()
    }

    /// Returns the fiber arena for read-only inspection.
    #[must_use]
    pub const fn fibers(&self) -> &FiberStore {
        &self.fibers
    }

    /// Returns the state of a live instance.
    #[must_use]
    pub fn instance_state(&self, instance: InstanceId) -> Option<&State> {
        self.instances.get(instance).map(|i| &i.state)
    }

    /// Returns the props a live instance last rendered with.
    #[must_use]
    pub fn instance_props(&self, instance: InstanceId) -> Option<&Props> {
        self.instances.get(instance).map(|i| &i.props)
    }

    /// Returns the fiber a live instance last completed on.
    #[must_use]
    pub fn instance_fiber(&self, instance: InstanceId) -> Option<FiberId> {
        self.instances.get(instance).and_then(|i| i.fiber)
    }

    /// Returns every live instance of component type `C`, in slot order.
    #[must_use]
    pub fn instances_of<C: Component>(&self) -> Vec<InstanceId> {
        self.instances
            .iter()
            .filter(|(_, i)| i.ty.is::<C>())
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns the number of live component instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_reserve_time() {
        assert_eq!(
            EngineConfig::default(),
            EngineConfig::idle_callback(),
            "idle callback is the default"
        );
        assert!(
            EngineConfig::frame_aligned().min_remaining > EngineConfig::idle_callback().min_remaining,
            "frame-aligned hosts keep a larger reserve"
        );
        let custom = EngineConfig::idle_callback().with_min_remaining(Duration(5));
        assert_eq!(custom.min_remaining, Duration(5), "override applied");
        assert!(custom.progress_when_expired, "other fields kept");
    }

    #[test]
    fn mount_queues_and_requests_a_slice() {
        use alloc::rc::Rc;
        use core::cell::Cell;

        let requests = Rc::new(Cell::new(0_u32));
        let seen = Rc::clone(&requests);
        let mut engine = Engine::new(EngineConfig::default(), move || seen.set(seen.get() + 1));
        assert!(!engine.has_pending_work(), "fresh engine is idle");

        engine.mount(Descriptor::element("div").build(), HostHandle(0));
        assert_eq!(requests.get(), 1, "slice requested");
        assert_eq!(engine.pending_updates(), 1, "one update queued");
        assert!(engine.has_pending_work(), "work pending");
        assert!(engine.current_root(HostHandle(0)).is_none(), "nothing committed yet");
    }
}
