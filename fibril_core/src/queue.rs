// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The FIFO update queue and the handles components use to feed it.
//!
//! ```text
//!   Engine::mount ─────────┐
//!   Engine::unmount ───────┤
//!   UpdateHandle::request ─┴──► UpdateQueue ──► SliceRequester::request_slice()
//!                                   │
//!                                   ▼
//!                     Engine::advance pops one entry per pass
//! ```
//!
//! The queue is shared between the engine and every [`UpdateHandle`] it has
//! handed out, so it lives behind `Rc<RefCell<_>>`. No borrow is held while the
//! slice requester runs or while a component renders.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::descriptor::Descriptor;
use crate::id::{HostHandle, InstanceId};
use crate::props::State;

/// Asks the host to grant a work slice "soon".
///
/// The host answers by calling [`Engine::advance`](crate::Engine::advance).
/// Implementations must not call back into the engine synchronously.
pub trait SliceRequester {
    /// Requests one slice.
    fn request_slice(&mut self);
}

impl<F: FnMut()> SliceRequester for F {
    fn request_slice(&mut self) {
        self();
    }
}

/// One queued request.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// Replace the tree under `container`. `None` tears the tree down.
    Root {
        /// Host container the tree is rendered into.
        container: HostHandle,
        /// New root descriptor.
        descriptor: Option<Descriptor>,
    },
    /// Apply a partial state to a component instance.
    Component {
        /// Target instance.
        instance: InstanceId,
        /// State delta; `None` once an earlier pass has already absorbed it.
        partial: Option<State>,
    },
}

struct Shared {
    entries: RefCell<VecDeque<Update>>,
    requester: RefCell<Box<dyn SliceRequester>>,
}

/// Shared FIFO of pending updates.
#[derive(Clone)]
pub struct UpdateQueue(Rc<Shared>);

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl UpdateQueue {
    /// Creates an empty queue that calls `requester` after every push.
    pub fn new(requester: impl SliceRequester + 'static) -> Self {
        Self(Rc::new(Shared {
            entries: RefCell::new(VecDeque::new()),
            requester: RefCell::new(Box::new(requester)),
        }))
    }

    /// Appends an update and requests a slice.
    pub fn push(&self, update: Update) {
        self.0.entries.borrow_mut().push_back(update);
        self.request_slice();
    }

    /// Forwards a slice request to the host.
    pub fn request_slice(&self) {
        self.0.requester.borrow_mut().request_slice();
    }

    /// Removes and returns the oldest update.
    pub fn pop_front(&self) -> Option<Update> {
        self.0.entries.borrow_mut().pop_front()
    }

    /// Returns the number of queued updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    /// Returns whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.entries.borrow().is_empty()
    }

    /// Returns a handle that enqueues component updates for `instance`.
    #[must_use]
    pub fn handle(&self, instance: InstanceId) -> UpdateHandle {
        UpdateHandle {
            queue: self.clone(),
            instance,
        }
    }

    /// Takes the partial states of queued component updates, front to back,
    /// stopping at the first root update.
    ///
    /// The entries stay queued with their payload consumed.
    pub(crate) fn take_pending_partials(&self) -> Vec<TakenPartial> {
        let mut taken = Vec::new();
        for (position, entry) in self.0.entries.borrow_mut().iter_mut().enumerate() {
            match entry {
                Update::Root { .. } => break,
                Update::Component { instance, partial } => {
                    if let Some(p) = partial.take() {
                        taken.push(TakenPartial {
                            position,
                            instance: *instance,
                            partial: p,
                        });
                    }
                }
            }
        }
        taken
    }

    /// Puts partial states taken by [`take_pending_partials`](Self::take_pending_partials)
    /// back into the exact entries they came from.
    ///
    /// Positions are only valid while nothing has been popped since the take.
    /// A position that no longer holds an empty entry for the same instance
    /// is skipped.
    pub(crate) fn restore_partials(&self, partials: Vec<TakenPartial>) {
        let mut entries = self.0.entries.borrow_mut();
        for taken in partials {
            if let Some(Update::Component { instance, partial }) = entries.get_mut(taken.position)
                && partial.is_none()
                && *instance == taken.instance
            {
                *partial = Some(taken.partial);
            }
        }
    }
}

/// A partial state lifted out of a queued component update.
#[derive(Clone, Debug)]
pub(crate) struct TakenPartial {
    /// Index of the entry in the queue at the time it was taken.
    pub(crate) position: usize,
    /// Instance the entry targets.
    pub(crate) instance: InstanceId,
    /// The lifted payload.
    pub(crate) partial: State,
}

/// Enqueues component updates for one instance.
///
/// Cloneable; every clone targets the same instance. Requests against an
/// instance that has since been removed from the tree are dropped when they
/// reach the head of the queue.
#[derive(Clone, Debug)]
pub struct UpdateHandle {
    queue: UpdateQueue,
    instance: InstanceId,
}

impl UpdateHandle {
    /// Returns the instance this handle updates.
    #[must_use]
    pub const fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Enqueues `partial` to be merged into the instance's state.
    pub fn request_update(&self, partial: State) {
        self.queue.push(Update::Component {
            instance: self.instance,
            partial: Some(partial),
        });
    }
}
