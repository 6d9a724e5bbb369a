// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pass undo log.
//!
//! Everything a pass does outside its own work-in-progress fibers is recorded
//! here so an aborted pass leaves the engine as it found it.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::component::{Instance, InstanceStore};
use crate::fiber::FiberStore;
use crate::host::Host;
use crate::id::{FiberId, HostHandle, InstanceId};
use crate::props::{Props, State};
use crate::queue::{TakenPartial, UpdateQueue};

#[derive(Debug)]
struct InstanceSnapshot {
    props: Props,
    state: State,
    fiber: Option<FiberId>,
}

#[derive(Debug, Default)]
pub(crate) struct PassJournal {
    /// Fibers allocated by the pass.
    pub(crate) fibers: Vec<FiberId>,
    /// Instances constructed by the pass.
    pub(crate) created: Vec<InstanceId>,
    /// Pre-pass props, state, and fiber of instances the pass touched.
    snapshots: BTreeMap<InstanceId, InstanceSnapshot>,
    /// Host nodes created by the pass.
    pub(crate) handles: Vec<HostHandle>,
    /// Current-tree fibers that received a seeded partial state.
    pub(crate) attached: Vec<FiberId>,
    /// Partial states taken from queue entries behind the head.
    pub(crate) absorbed: Vec<TakenPartial>,
}

impl PassJournal {
    /// Remembers `instance` as it was before the pass first touched it.
    pub(crate) fn snapshot(&mut self, id: InstanceId, instance: &Instance) {
        if self.created.contains(&id) {
            return;
        }
        self.snapshots.entry(id).or_insert_with(|| InstanceSnapshot {
            props: instance.props.clone(),
            state: instance.state.clone(),
            fiber: instance.fiber,
        });
    }

    /// Undoes the pass.
    pub(crate) fn roll_back(
        self,
        fibers: &mut FiberStore,
        instances: &mut InstanceStore,
        host: &mut dyn Host,
        queue: &UpdateQueue,
    ) {
        for fiber in self.fibers {
            if fibers.is_alive(fiber) {
                fibers.free(fiber);
            }
        }
        for id in self.created {
            instances.remove(id);
        }
        for (id, snapshot) in self.snapshots {
            if let Some(instance) = instances.get_mut(id) {
                instance.props = snapshot.props;
                instance.state = snapshot.state;
                instance.fiber = snapshot.fiber;
            }
        }
        for handle in self.handles {
            host.discard(handle);
        }
        for fiber in self.attached {
            if fibers.is_alive(fiber) {
                fibers.clear_partial(fiber);
            }
        }
        queue.restore_partials(self.absorbed);
    }
}
