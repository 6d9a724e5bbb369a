// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the work loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! engine calls at slice, pass, and phase boundaries. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`PassSummaryBuilder`] collects phase timestamps across the slices of one
//! pass and produces a [`PassSummary`] when the pass commits.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates per-unit [`UnitEvent`]s and the
//!   per-pass effect list, plus the corresponding `TraceSink` methods.

use crate::id::HostHandle;
use crate::time::{Duration, HostTime};

#[cfg(feature = "trace-rich")]
use crate::fiber::FiberTag;
#[cfg(feature = "trace-rich")]
use crate::slice::EffectRecord;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a pass is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Building the work-in-progress tree (may span many slices).
    Reconcile,
    /// Applying the effect list to the host.
    Commit,
}

/// What kind of queue entry seeded a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassOrigin {
    /// A root descriptor replacement (`mount`).
    Root,
    /// A component state update.
    Component,
    /// A tree teardown (`unmount`).
    Unmount,
}

/// Why a pass was abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// A component's render failed.
    Render,
    /// A host mutation failed.
    Host,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the host grants a slice.
#[derive(Clone, Copy, Debug)]
pub struct SliceBeginEvent {
    /// Monotonic slice counter.
    pub slice_index: u64,
    /// Host time at the start of the slice.
    pub now: HostTime,
    /// Budget reported by the host.
    pub remaining: Duration,
    /// Whether the slice was granted on timeout.
    pub expired: bool,
}

/// Emitted when a slice returns to the host.
#[derive(Clone, Copy, Debug)]
pub struct SliceEndEvent {
    /// Slice counter.
    pub slice_index: u64,
    /// Host time at the end of the slice.
    pub now: HostTime,
    /// Units of work performed.
    pub units: u32,
    /// Whether another slice was requested.
    pub more_work: bool,
}

/// Emitted when a queue entry seeds a new pass.
#[derive(Clone, Copy, Debug)]
pub struct PassBeginEvent {
    /// Monotonic pass counter.
    pub pass_index: u64,
    /// What seeded the pass.
    pub origin: PassOrigin,
    /// Container being rendered.
    pub container: HostHandle,
    /// Host time at seeding.
    pub timestamp: HostTime,
}

/// Marks the beginning of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Pass counter.
    pub pass_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Pass counter.
    pub pass_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted when a pass is abandoned and its work rolled back.
#[derive(Clone, Copy, Debug)]
pub struct PassAbortedEvent {
    /// Pass counter.
    pub pass_index: u64,
    /// Why.
    pub reason: AbortReason,
    /// Host time of the abort.
    pub timestamp: HostTime,
}

/// Per-pass summary produced by [`PassSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct PassSummary {
    /// Pass counter.
    pub pass_index: u64,
    /// What seeded the pass.
    pub origin: PassOrigin,
    /// Container rendered.
    pub container: HostHandle,
    /// Number of slices the pass spanned.
    pub slices: u32,
    /// Units of work performed.
    pub units: u32,
    /// Placement effects committed.
    pub placements: u32,
    /// Update effects committed.
    pub updates: u32,
    /// Deletion effects committed.
    pub deletions: u32,
    /// Reconcile phase wall span in ticks (0 if not measured).
    pub reconcile_ticks: u64,
    /// Commit phase duration in ticks (0 if not measured).
    pub commit_ticks: u64,
}

/// Emitted after each unit of work (requires `trace-rich`).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct UnitEvent {
    /// Pass counter.
    pub pass_index: u64,
    /// Slot index of the fiber that began work.
    pub fiber_index: u32,
    /// Its tag.
    pub tag: FiberTag,
    /// Host time after the unit.
    pub timestamp: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the work loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a slice starts.
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        _ = e;
    }

    /// Called when a slice ends.
    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        _ = e;
    }

    /// Called when a pass is seeded.
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a pass is rolled back.
    fn on_pass_aborted(&mut self, e: &PassAbortedEvent) {
        _ = e;
    }

    /// Called with a per-pass summary after a successful commit.
    fn on_pass_summary(&mut self, s: &PassSummary) {
        _ = s;
    }

    /// Called after each unit of work (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_unit(&mut self, e: &UnitEvent) {
        _ = e;
    }

    /// Called with the effects a commit applied (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_effects(&mut self, pass_index: u64, effects: &[EffectRecord]) {
        _ = (pass_index, effects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $e:expr) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &mut $self.sink {
            s.$method($e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = $e;
        }
    }};
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`SliceBeginEvent`].
    #[inline]
    pub fn slice_begin(&mut self, e: &SliceBeginEvent) {
        dispatch!(self, on_slice_begin, e);
    }

    /// Emits a [`SliceEndEvent`].
    #[inline]
    pub fn slice_end(&mut self, e: &SliceEndEvent) {
        dispatch!(self, on_slice_end, e);
    }

    /// Emits a [`PassBeginEvent`].
    #[inline]
    pub fn pass_begin(&mut self, e: &PassBeginEvent) {
        dispatch!(self, on_pass_begin, e);
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        dispatch!(self, on_phase_begin, e);
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        dispatch!(self, on_phase_end, e);
    }

    /// Emits a [`PassAbortedEvent`].
    #[inline]
    pub fn pass_aborted(&mut self, e: &PassAbortedEvent) {
        dispatch!(self, on_pass_aborted, e);
    }

    /// Emits a [`PassSummary`].
    #[inline]
    pub fn pass_summary(&mut self, s: &PassSummary) {
        dispatch!(self, on_pass_summary, s);
    }

    /// Emits a [`UnitEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn unit(&mut self, e: &UnitEvent) {
        if let Some(s) = &mut self.sink {
            s.on_unit(e);
        }
    }

    /// Emits the applied effect list (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn effects(&mut self, pass_index: u64, effects: &[EffectRecord]) {
        if let Some(s) = &mut self.sink {
            s.on_effects(pass_index, effects);
        }
    }
}

// ---------------------------------------------------------------------------
// PassSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps and counters across the slices of one pass.
#[derive(Clone, Copy, Debug)]
pub struct PassSummaryBuilder {
    begin: PassBeginEvent,
    phase_starts: [Option<HostTime>; 2],
    phase_ends: [Option<HostTime>; 2],
    slices: u32,
    units: u32,
}

impl PassSummaryBuilder {
    /// Starts building a summary for the given pass.
    #[must_use]
    pub const fn new(begin: &PassBeginEvent) -> Self {
        Self {
            begin: *begin,
            phase_starts: [None; 2],
            phase_ends: [None; 2],
            slices: 0,
            units: 0,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Counts one slice that did work for this pass.
    pub fn add_slice(&mut self) {
        self.slices += 1;
    }

    /// Counts one unit of work.
    pub fn add_unit(&mut self) {
        self.units += 1;
    }

    /// Consumes the builder and produces the final [`PassSummary`].
    #[must_use]
    pub fn finish(self, placements: u32, updates: u32, deletions: u32) -> PassSummary {
        PassSummary {
            pass_index: self.begin.pass_index,
            origin: self.begin.origin,
            container: self.begin.container,
            slices: self.slices,
            units: self.units,
            placements,
            updates,
            deletions,
            reconcile_ticks: self.phase_duration(PhaseKind::Reconcile),
            commit_ticks: self.phase_duration(PhaseKind::Commit),
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_duration_since(start).ticks(),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Reconcile => 0,
        PhaseKind::Commit => 1,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_begin() -> PassBeginEvent {
        PassBeginEvent {
            pass_index: 3,
            origin: PassOrigin::Component,
            container: HostHandle(1),
            timestamp: HostTime(1_000),
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_pass_begin(&sample_begin());
        sink.on_slice_begin(&SliceBeginEvent {
            slice_index: 0,
            now: HostTime(0),
            remaining: Duration::ZERO,
            expired: true,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.pass_begin(&sample_begin());
        tracer.phase_begin(&PhaseBeginEvent {
            pass_index: 3,
            phase: PhaseKind::Reconcile,
            timestamp: HostTime(1_000),
        });
    }

    #[test]
    fn summary_builder_computes_durations() {
        let mut builder = PassSummaryBuilder::new(&sample_begin());
        builder.phase_begin(PhaseKind::Reconcile, HostTime(1_000));
        builder.add_slice();
        builder.add_unit();
        builder.add_unit();
        builder.add_slice();
        builder.add_unit();
        builder.phase_end(PhaseKind::Reconcile, HostTime(1_400));
        builder.phase_begin(PhaseKind::Commit, HostTime(1_400));
        builder.phase_end(PhaseKind::Commit, HostTime(1_450));

        let summary = builder.finish(2, 1, 0);
        assert_eq!(summary.reconcile_ticks, 400, "reconcile spans both slices");
        assert_eq!(summary.commit_ticks, 50, "commit duration");
        assert_eq!(summary.slices, 2, "two slices");
        assert_eq!(summary.units, 3, "three units");
        assert_eq!(summary.placements, 2, "counts passed through");
        assert_eq!(summary.origin, PassOrigin::Component, "origin kept");
    }

    #[test]
    fn summary_builder_missing_phases_are_zero() {
        let summary = PassSummaryBuilder::new(&sample_begin()).finish(0, 0, 0);
        assert_eq!(summary.reconcile_ticks, 0, "no reconcile timestamps");
        assert_eq!(summary.commit_ticks, 0, "no commit timestamps");
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            passes: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_pass_begin(&mut self, e: &PassBeginEvent) {
                self.passes.push(e.pass_index);
            }
        }

        let mut sink = RecordingSink { passes: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.pass_begin(&sample_begin());
        drop(tracer);
        assert_eq!(sink.passes, &[3], "event delivered");
    }
}
