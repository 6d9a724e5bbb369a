// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drive loops that stand in for a host scheduler.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;

use fibril_core::Engine;
use fibril_core::error::EngineError;
use fibril_core::host::Host;
use fibril_core::queue::SliceRequester;
use fibril_core::slice::{CommitSummary, EffectRecord, SliceBudget, SliceReport};

/// Counts slice requests instead of scheduling anything.
///
/// Clones share the count, so keep one and hand the other to the engine.
#[derive(Clone, Debug, Default)]
pub struct SliceCounter(Rc<Cell<usize>>);

impl SliceCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of requests so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.get()
    }

    /// Resets the count to zero.
    pub fn reset(&self) {
        self.0.set(0);
    }
}

impl SliceRequester for SliceCounter {
    fn request_slice(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Everything that happened while driving an engine to idle.
#[derive(Debug, Default)]
pub struct Drive {
    /// Reports of the slices that succeeded, in order.
    pub reports: Vec<SliceReport>,
    /// Errors of the slices that failed, in order.
    pub errors: Vec<EngineError>,
    /// Set when a slice made no progress while work remained.
    pub stalled: bool,
}

impl Drive {
    /// Returns the number of successful slices.
    #[must_use]
    pub fn slices(&self) -> usize {
        self.reports.len()
    }

    /// Returns the units performed by successful slices.
    #[must_use]
    pub fn units(&self) -> u64 {
        self.reports.iter().map(|r| u64::from(r.units)).sum()
    }

    /// Iterates the commits, in order.
    pub fn commits(&self) -> impl Iterator<Item = &CommitSummary> + '_ {
        self.reports.iter().filter_map(|r| r.commit.as_ref())
    }

    /// Returns every applied effect across all commits, in order.
    #[must_use]
    pub fn effects(&self) -> Vec<EffectRecord> {
        self.commits()
            .flat_map(|c| c.effects.iter().copied())
            .collect()
    }
}

/// Advances `engine` with a fresh budget from `budget` until nothing is left.
///
/// Failed slices are recorded and driving continues; the engine has already
/// dropped the failed pass. Stops early, setting [`Drive::stalled`], when a
/// slice does nothing although work remains (a budget that never grants time).
pub fn drive_to_idle<B: SliceBudget>(
    engine: &mut Engine,
    host: &mut impl Host,
    mut budget: impl FnMut() -> B,
) -> Drive {
    let mut drive = Drive::default();
    while engine.has_pending_work() {
        let mut slice = budget();
        match engine.advance(&mut slice, host) {
            Ok(report) => {
                let idle = report.units == 0 && report.commit.is_none();
                drive.reports.push(report);
                if idle && engine.has_pending_work() {
                    drive.stalled = true;
                    break;
                }
            }
            Err(err) => drive.errors.push(err),
        }
    }
    drive
}
