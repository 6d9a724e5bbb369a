// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host contract: the mutations the engine applies to a native tree.
//!
//! The engine owns the fiber trees and decides *what* changes; a [`Host`]
//! owns the native nodes and applies *how*. Handles are opaque to the engine.
//!
//! Handle creation happens during reconciliation (so the work-in-progress tree
//! can carry the handle); every other mutation happens during commit, in
//! effect-list order. A typical driver looks like this:
//!
//! ```rust,ignore
//! fn on_idle(deadline: IdleDeadline) {
//!     let mut budget = DeadlineBudget::new(now, deadline.end(), deadline.did_timeout());
//!     match engine.advance(&mut budget, &mut dom_host) {
//!         Ok(report) => { /* report.more_work already re-armed the slice */ }
//!         Err(err) => log_error(err),
//!     }
//! }
//! ```

use crate::descriptor::HostKind;
use crate::error::HostError;
use crate::id::HostHandle;
use crate::props::Props;

/// Applies reconciled mutations to a native tree.
///
/// Implement this for each rendering target; test doubles implement it too.
pub trait Host {
    /// Creates a detached node of `kind` with `props` already applied.
    ///
    /// Children in `props` are ignored; the engine inserts them itself.
    fn create_handle(&mut self, kind: &HostKind, props: &Props) -> Result<HostHandle, HostError>;

    /// Applies the difference between `prev` and `next` to `handle`.
    ///
    /// [`PropsDelta::between`](crate::props::PropsDelta::between) computes the
    /// difference in the order a DOM-like host should apply it.
    fn set_properties(
        &mut self,
        handle: HostHandle,
        prev: &Props,
        next: &Props,
    ) -> Result<(), HostError>;

    /// Appends `child` as the last child of `parent`.
    fn insert_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;

    /// Inserts `child` into `parent` immediately before `anchor`.
    fn insert_before(
        &mut self,
        parent: HostHandle,
        child: HostHandle,
        anchor: HostHandle,
    ) -> Result<(), HostError>;

    /// Puts `new` in `old`'s place under `parent`, detaching `old`.
    fn replace_child(
        &mut self,
        parent: HostHandle,
        old: HostHandle,
        new: HostHandle,
    ) -> Result<(), HostError>;

    /// Detaches `child` (with its subtree) from `parent`.
    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;

    /// Called for handles created by a pass that was aborted.
    ///
    /// The engine will never reference `handle` again.
    fn discard(&mut self, handle: HostHandle) {
        _ = handle;
    }
}
