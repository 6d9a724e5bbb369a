// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slice budgets and the reports [`Engine::advance`](crate::Engine::advance)
//! returns.
//!
//! Types flow through the work loop like this:
//!
//! ```text
//!   host idle/frame callback
//!       │
//!       ▼
//!   SliceBudget ──► Engine::advance() ──► SliceReport
//!                        │                    │
//!                        ▼                    ▼
//!                  units of work        CommitSummary (when a pass commits)
//! ```
//!
//! A budget is consulted between units only; a unit that has started always
//! finishes.

use alloc::vec::Vec;

use crate::fiber::{EffectTag, FiberTag};
use crate::id::HostHandle;
use crate::time::{Duration, HostTime};

/// Time granted by the host for one slice.
pub trait SliceBudget {
    /// Current host time, used for trace timestamps.
    fn now(&self) -> HostTime;

    /// Time left in this slice.
    fn remaining(&self) -> Duration;

    /// Whether the host granted this slice because its timeout elapsed rather
    /// than because it was idle.
    fn expired(&self) -> bool {
        false
    }

    /// Called after each completed unit of work.
    fn record_unit(&mut self) {}
}

/// A budget that runs until a deadline on a host clock.
pub struct DeadlineBudget<C> {
    clock: C,
    deadline: HostTime,
    timed_out: bool,
}

impl<C: Fn() -> HostTime> DeadlineBudget<C> {
    /// Creates a budget ending at `deadline` as measured by `clock`.
    pub const fn new(clock: C, deadline: HostTime) -> Self {
        Self {
            clock,
            deadline,
            timed_out: false,
        }
    }

    /// Marks the slice as granted on timeout.
    #[must_use]
    pub const fn timed_out(mut self, timed_out: bool) -> Self {
        self.timed_out = timed_out;
        self
    }
}

impl<C> core::fmt::Debug for DeadlineBudget<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeadlineBudget")
            .field("deadline", &self.deadline)
            .field("timed_out", &self.timed_out)
            .finish_non_exhaustive()
    }
}

impl<C: Fn() -> HostTime> SliceBudget for DeadlineBudget<C> {
    fn now(&self) -> HostTime {
        (self.clock)()
    }

    fn remaining(&self) -> Duration {
        self.now().until(self.deadline)
    }

    fn expired(&self) -> bool {
        self.timed_out
    }
}

/// A budget that grants a fixed number of units.
///
/// Its clock advances one tick per unit, which keeps traces deterministic.
/// `UnitBudget::new(1)` exhausts the budget after every single unit.
#[derive(Clone, Copy, Debug)]
pub struct UnitBudget {
    left: u32,
    used: u64,
}

impl UnitBudget {
    /// Grants `units` units.
    #[must_use]
    pub const fn new(units: u32) -> Self {
        Self { left: units, used: 0 }
    }

    /// Grants an unbounded number of units.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(u32::MAX)
    }

    /// Returns how many units have been recorded.
    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used
    }
}

impl SliceBudget for UnitBudget {
    fn now(&self) -> HostTime {
        HostTime(self.used)
    }

    fn remaining(&self) -> Duration {
        if self.left == 0 {
            Duration::ZERO
        } else {
            Duration::MAX
        }
    }

    fn record_unit(&mut self) {
        self.used += 1;
        if self.left != u32::MAX {
            self.left = self.left.saturating_sub(1);
        }
    }
}

// -- Reports --

/// One applied effect, as seen by diagnostics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectRecord {
    /// What was done.
    pub tag: EffectTag,
    /// The kind of fiber it was done for.
    pub fiber_tag: FiberTag,
    /// Slot index of the fiber (diagnostics only).
    pub fiber_index: u32,
    /// Host node touched, if the fiber is a host node.
    pub handle: Option<HostHandle>,
}

/// What a successful commit did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Container whose tree was replaced.
    pub container: Option<HostHandle>,
    /// Number of placement effects.
    pub placements: u32,
    /// Number of update effects.
    pub updates: u32,
    /// Number of deletion effects.
    pub deletions: u32,
    /// Every effect, in the order it was applied.
    pub effects: Vec<EffectRecord>,
}

impl CommitSummary {
    pub(crate) fn record(&mut self, record: EffectRecord) {
        match record.tag {
            EffectTag::Placement => self.placements += 1,
            EffectTag::Update => self.updates += 1,
            EffectTag::Deletion => self.deletions += 1,
            EffectTag::None => {}
        }
        self.effects.push(record);
    }

    /// Returns the total number of effects applied.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Returns whether the commit applied no effects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Outcome of one [`Engine::advance`](crate::Engine::advance) call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SliceReport {
    /// Units of work performed.
    pub units: u32,
    /// Present when a pass committed during this slice.
    pub commit: Option<CommitSummary>,
    /// Whether work remains; a new slice has already been requested if so.
    pub more_work: bool,
}

impl SliceReport {
    /// Returns whether the engine is idle after this slice.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        !self.more_work
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    #[test]
    fn unit_budget_runs_out() {
        let mut budget = UnitBudget::new(2);
        assert!(budget.remaining() > Duration::ZERO, "fresh budget has time");
        budget.record_unit();
        budget.record_unit();
        assert_eq!(budget.remaining(), Duration::ZERO, "two units spent");
        assert_eq!(budget.now(), HostTime(2), "clock follows units");
    }

    #[test]
    fn unbounded_budget_never_runs_out() {
        let mut budget = UnitBudget::unbounded();
        for _ in 0..1_000 {
            budget.record_unit();
        }
        assert_eq!(budget.remaining(), Duration::MAX, "still unbounded");
        assert_eq!(budget.used(), 1_000, "units counted");
    }

    #[test]
    fn deadline_budget_reads_the_clock() {
        let clock = Cell::new(100_u64);
        let budget = DeadlineBudget::new(|| HostTime(clock.get()), HostTime(150)).timed_out(true);
        assert_eq!(budget.remaining(), Duration(50), "deadline ahead");
        clock.set(200);
        assert_eq!(budget.remaining(), Duration::ZERO, "deadline passed");
        assert!(budget.expired(), "granted on timeout");
    }

    #[test]
    fn commit_summary_counts_by_tag() {
        let mut summary = CommitSummary::default();
        for tag in [EffectTag::Placement, EffectTag::Placement, EffectTag::Deletion] {
            summary.record(EffectRecord {
                tag,
                fiber_tag: FiberTag::Host,
                fiber_index: 0,
                handle: None,
            });
        }
        assert_eq!(
            (summary.placements, summary.updates, summary.deletions),
            (2, 0, 1),
            "per-tag counts"
        );
        assert_eq!(summary.len(), 3, "all effects listed");
    }
}
