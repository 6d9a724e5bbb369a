// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The cooperative work loop.
//!
//! Each call to [`Engine::advance`] is one slice:
//!
//! ```text
//!   no pass in flight? ── pop the queue head, seed a root fiber ──┐
//!                                                                 ▼
//!   while budget.remaining() > min_remaining:  perform one unit of work
//!                                                                 │
//!   root completed? ── commit every effect, publish the new tree ◄┘
//!                                                                 │
//!   work left? ── SliceRequester::request_slice() ◄───────────────┘
//! ```
//!
//! A pass is never interrupted mid-unit, and its commit runs to completion in
//! the slice that finished reconciliation. A component update re-walks the
//! tree from its root; components whose props are unchanged and that have no
//! pending state skip rendering, so only the updated subtree re-renders.

use alloc::vec::Vec;

use crate::commit::Committed;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::fiber::{EffectTag, FiberTag, NewFiber, StateNode};
use crate::host::Host;
use crate::id::{FiberId, HostHandle, INVALID, InstanceId};
use crate::journal::PassJournal;
use crate::props::Props;
use crate::queue::Update;
use crate::reconcile::{Work, attach_partial, root_of};
use crate::slice::{SliceBudget, SliceReport};
use crate::time::HostTime;
use crate::trace::{
    AbortReason, PassAbortedEvent, PassBeginEvent, PassOrigin, PassSummaryBuilder,
    PhaseBeginEvent, PhaseEndEvent, PhaseKind, SliceBeginEvent, SliceEndEvent, Tracer,
};

/// A reconciliation pass in flight.
#[derive(Debug)]
pub(crate) struct Pass {
    index: u64,
    origin: PassOrigin,
    container: HostHandle,
    root: FiberId,
    /// Next unit of work; `None` once the root has completed.
    next: Option<FiberId>,
    journal: PassJournal,
    summary: PassSummaryBuilder,
}

impl Engine {
    /// Runs one slice of work within `budget`.
    ///
    /// Returns what the slice did. If work remains, a new slice has already
    /// been requested from the host by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if a component render or a host mutation fails.
    /// The pass in flight is then abandoned: its work-in-progress fibers,
    /// instances, and host handles are released, and the container keeps its
    /// previously committed tree.
    pub fn advance(
        &mut self,
        budget: &mut impl SliceBudget,
        host: &mut impl Host,
    ) -> Result<SliceReport, EngineError> {
        self.advance_traced(budget, host, &mut Tracer::none())
    }

    /// Like [`advance`](Self::advance), reporting events to `tracer`.
    ///
    /// # Errors
    ///
    /// See [`advance`](Self::advance).
    pub fn advance_traced(
        &mut self,
        budget: &mut impl SliceBudget,
        host: &mut impl Host,
        tracer: &mut Tracer<'_>,
    ) -> Result<SliceReport, EngineError> {
        self.slice_index += 1;
        let slice_index = self.slice_index;
        tracer.slice_begin(&SliceBeginEvent {
            slice_index,
            now: budget.now(),
            remaining: budget.remaining(),
            expired: budget.expired(),
        });

        let mut report = SliceReport::default();
        let result = self.run_slice(budget, host, tracer, &mut report);

        report.more_work = self.has_pending_work();
        if report.more_work {
            self.queue.request_slice();
        }
        tracer.slice_end(&SliceEndEvent {
            slice_index,
            now: budget.now(),
            units: report.units,
            more_work: report.more_work,
        });
        result.map(|()| report)
    }

    fn run_slice(
        &mut self,
        budget: &mut dyn SliceBudget,
        host: &mut dyn Host,
        tracer: &mut Tracer<'_>,
        report: &mut SliceReport,
    ) -> Result<(), EngineError> {
        if self.pass.is_none() {
            self.pass = self.seed(budget.now(), tracer);
        }
        let Some(mut pass) = self.pass.take() else {
            return Ok(());
        };
        pass.summary.add_slice();

        let mut first = true;
        while let Some(fiber) = pass.next {
            let has_time = budget.remaining() > self.config.min_remaining;
            let forced = first && self.config.progress_when_expired && budget.expired();
            if !has_time && !forced {
                break;
            }
            first = false;

            let step = Work {
                fibers: &mut self.fibers,
                instances: &mut self.instances,
                queue: &self.queue,
                host: &mut *host,
                journal: &mut pass.journal,
            }
            .perform_unit(fiber);

            match step {
                Ok(next) => pass.next = next,
                Err(err) => {
                    self.abort(pass, host, tracer, &err, budget.now());
                    return Err(err);
                }
            }
            budget.record_unit();
            report.units += 1;
            pass.summary.add_unit();

            #[cfg(feature = "trace-rich")]
            tracer.unit(&crate::trace::UnitEvent {
                pass_index: pass.index,
                fiber_index: fiber.index(),
                tag: self.fibers.tag(fiber),
                timestamp: budget.now(),
            });
        }

        if pass.next.is_some() {
            self.pass = Some(pass);
            return Ok(());
        }
        self.commit(pass, budget, host, tracer, report)
    }

    /// Pops queue entries until one seeds a pass.
    ///
    /// Entries that have nothing to do (a stale instance, a teardown of an
    /// empty container) are dropped.
    fn seed(&mut self, now: HostTime, tracer: &mut Tracer<'_>) -> Option<Pass> {
        loop {
            let update = self.queue.pop_front()?;
            let mut journal = PassJournal::default();

            let (container, props, alternate, origin) = match update {
                Update::Root {
                    container,
                    descriptor,
                } => {
                    let alternate = self.roots.get(&container).copied();
                    let origin = if descriptor.is_some() {
                        PassOrigin::Root
                    } else if alternate.is_some() {
                        PassOrigin::Unmount
                    } else {
                        continue;
                    };
                    let props = Props::root(descriptor.into_iter().map(Some).collect());
                    (container, props, alternate, origin)
                }
                Update::Component { instance, partial } => {
                    let fiber = match partial {
                        Some(partial) => attach_partial(
                            &mut self.fibers,
                            &self.instances,
                            &mut journal,
                            instance,
                            partial,
                        ),
                        None => self.instance_fiber(instance),
                    };
                    let Some(fiber) = fiber.filter(|&f| self.fibers.is_alive(f)) else {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(?instance, "dropping update for released instance");
                        continue;
                    };
                    let old_root = root_of(&self.fibers, fiber);
                    let Some(container) = self.fibers.host_handle(old_root) else {
                        continue;
                    };
                    let props = self.fibers.props(old_root).clone();
                    (container, props, Some(old_root), PassOrigin::Component)
                }
            };

            // Let every component update queued before the next root update
            // ride along; its own entry later seeds an effect-free pass.
            for taken in self.queue.take_pending_partials() {
                attach_partial(
                    &mut self.fibers,
                    &self.instances,
                    &mut journal,
                    taken.instance,
                    taken.partial.clone(),
                );
                journal.absorbed.push(taken);
            }

            let root = self.fibers.alloc(NewFiber {
                tag: FiberTag::Root,
                kind: None,
                props,
                state_node: StateNode::Host(container),
                parent: INVALID,
                slot: 0,
                alternate: alternate.map_or(INVALID, |alt| alt.idx),
                partial_state: None,
                effect_tag: EffectTag::None,
            });
            journal.fibers.push(root);

            self.pass_index += 1;
            let begin = PassBeginEvent {
                pass_index: self.pass_index,
                origin,
                container,
                timestamp: now,
            };
            tracer.pass_begin(&begin);
            tracer.phase_begin(&PhaseBeginEvent {
                pass_index: self.pass_index,
                phase: PhaseKind::Reconcile,
                timestamp: now,
            });
            let mut summary = PassSummaryBuilder::new(&begin);
            summary.phase_begin(PhaseKind::Reconcile, now);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                pass = self.pass_index,
                ?origin,
                container = container.0,
                queued = self.queue.len(),
                "seeded pass"
            );

            return Some(Pass {
                index: self.pass_index,
                origin,
                container,
                root,
                next: Some(root),
                journal,
                summary,
            });
        }
    }

    fn commit(
        &mut self,
        mut pass: Pass,
        budget: &mut dyn SliceBudget,
        host: &mut dyn Host,
        tracer: &mut Tracer<'_>,
        report: &mut SliceReport,
    ) -> Result<(), EngineError> {
        let now = budget.now();
        pass.summary.phase_end(PhaseKind::Reconcile, now);
        tracer.phase_end(&PhaseEndEvent {
            pass_index: pass.index,
            phase: PhaseKind::Reconcile,
            timestamp: now,
        });
        pass.summary.phase_begin(PhaseKind::Commit, now);
        tracer.phase_begin(&PhaseBeginEvent {
            pass_index: pass.index,
            phase: PhaseKind::Commit,
            timestamp: now,
        });

        let result = Work {
            fibers: &mut self.fibers,
            instances: &mut self.instances,
            queue: &self.queue,
            host: &mut *host,
            journal: &mut pass.journal,
        }
        .commit_effects(pass.root);

        let Committed {
            mut summary,
            released,
        } = match result {
            Ok(committed) => committed,
            Err(err) => {
                self.abort(pass, host, tracer, &err, budget.now());
                return Err(err);
            }
        };
        summary.container = Some(pass.container);
        self.publish(&pass, released);

        let end = budget.now();
        pass.summary.phase_end(PhaseKind::Commit, end);
        tracer.phase_end(&PhaseEndEvent {
            pass_index: pass.index,
            phase: PhaseKind::Commit,
            timestamp: end,
        });
        #[cfg(feature = "trace-rich")]
        tracer.effects(pass.index, &summary.effects);
        tracer.pass_summary(&pass.summary.finish(
            summary.placements,
            summary.updates,
            summary.deletions,
        ));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            pass = pass.index,
            placements = summary.placements,
            updates = summary.updates,
            deletions = summary.deletions,
            "committed pass"
        );

        report.commit = Some(summary);
        Ok(())
    }

    /// Makes the pass's root the container's current tree and frees the one
    /// it replaces.
    fn publish(&mut self, pass: &Pass, released: Vec<InstanceId>) {
        if let Some(old_root) = self.roots.remove(&pass.container) {
            let old: Vec<FiberId> = self.fibers.descendants(old_root).collect();
            for fiber in old {
                self.fibers.free(fiber);
            }
        }

        let tree: Vec<FiberId> = self.fibers.descendants(pass.root).collect();
        if pass.origin == PassOrigin::Unmount {
            for fiber in tree {
                self.fibers.free(fiber);
            }
        } else {
            for &fiber in &tree {
                self.fibers.settle(fiber);
            }
            self.roots.insert(pass.container, pass.root);
        }

        for instance in released {
            self.instances.remove(instance);
        }
    }

    fn abort(
        &mut self,
        pass: Pass,
        host: &mut dyn Host,
        tracer: &mut Tracer<'_>,
        err: &EngineError,
        now: HostTime,
    ) {
        let reason = match err {
            EngineError::Render { .. } => AbortReason::Render,
            EngineError::Host(_) => AbortReason::Host,
        };
        pass.journal
            .roll_back(&mut self.fibers, &mut self.instances, host, &self.queue);
        tracer.pass_aborted(&PassAbortedEvent {
            pass_index: pass.index,
            reason,
            timestamp: now,
        });

        #[cfg(feature = "tracing")]
        tracing::warn!(pass = pass.index, error = %err, "pass aborted");
    }
}
