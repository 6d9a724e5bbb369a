// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use fibril_core::fiber::{EffectTag, FiberTag};
use fibril_core::slice::EffectRecord;
use fibril_core::time::{Duration, HostTime, Timebase};
use fibril_core::trace::{
    PassAbortedEvent, PassBeginEvent, PassOrigin, PassSummary, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, SliceBeginEvent, SliceEndEvent, TraceSink, UnitEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ticks_to_us(&self, ticks: u64) -> f64 {
        Duration(ticks).to_nanos(self.timebase) as f64 / 1000.0
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.ticks_to_us(t.ticks())
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Reconcile => "reconcile",
        PhaseKind::Commit => "commit",
    }
}

fn origin_name(origin: PassOrigin) -> &'static str {
    match origin {
        PassOrigin::Root => "root",
        PassOrigin::Component => "component",
        PassOrigin::Unmount => "unmount",
    }
}

fn fiber_name(tag: FiberTag) -> &'static str {
    match tag {
        FiberTag::Host => "host",
        FiberTag::Component => "component",
        FiberTag::Root => "root",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        let expired = if e.expired { " EXPIRED" } else { "" };
        let _ = writeln!(
            self.writer,
            "[slice:begin] slice={} now={:.1}µs budget={:.1}µs{expired}",
            e.slice_index,
            self.host_us(e.now),
            self.ticks_to_us(e.remaining.ticks()),
        );
    }

    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        let more = if e.more_work { "yield" } else { "idle" };
        let _ = writeln!(
            self.writer,
            "[slice:end] slice={} units={} at {:.1}µs {more}",
            e.slice_index,
            e.units,
            self.host_us(e.now),
        );
    }

    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[pass] pass={} origin={} container={} at {:.1}µs",
            e.pass_index,
            origin_name(e.origin),
            e.container.0,
            self.host_us(e.timestamp),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] pass={} {} at {:.1}µs",
            e.pass_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] pass={} {} at {:.1}µs",
            e.pass_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_pass_aborted(&mut self, e: &PassAbortedEvent) {
        let _ = writeln!(
            self.writer,
            "[abort] pass={} reason={:?} at {:.1}µs",
            e.pass_index,
            e.reason,
            self.host_us(e.timestamp),
        );
    }

    fn on_pass_summary(&mut self, s: &PassSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] pass={} origin={} slices={} units={} \
             +{} ~{} -{} reconcile={:.1}µs commit={:.1}µs",
            s.pass_index,
            origin_name(s.origin),
            s.slices,
            s.units,
            s.placements,
            s.updates,
            s.deletions,
            self.ticks_to_us(s.reconcile_ticks),
            self.ticks_to_us(s.commit_ticks),
        );
    }

    fn on_unit(&mut self, e: &UnitEvent) {
        let _ = writeln!(
            self.writer,
            "[unit] pass={} fiber={} {}",
            e.pass_index,
            e.fiber_index,
            fiber_name(e.tag),
        );
    }

    fn on_effects(&mut self, pass_index: u64, effects: &[EffectRecord]) {
        let deletions = effects
            .iter()
            .filter(|e| e.tag == EffectTag::Deletion)
            .count();
        let _ = writeln!(
            self.writer,
            "[effects] pass={pass_index} count={} deletions={deletions}",
            effects.len(),
        );
    }
}
