// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! The rich [`on_effects`](TraceSink::on_effects) event stores only per-tag
//! counts.

use fibril_core::fiber::{EffectTag, FiberTag};
use fibril_core::id::HostHandle;
use fibril_core::slice::EffectRecord;
use fibril_core::time::{Duration, HostTime};
use fibril_core::trace::{
    AbortReason, PassAbortedEvent, PassBeginEvent, PassOrigin, PassSummary, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, SliceBeginEvent, SliceEndEvent, TraceSink, UnitEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_SLICE_BEGIN: u8 = 1;
const TAG_SLICE_END: u8 = 2;
const TAG_PASS_BEGIN: u8 = 3;
const TAG_PHASE_BEGIN: u8 = 4;
const TAG_PHASE_END: u8 = 5;
const TAG_PASS_ABORTED: u8 = 6;
const TAG_PASS_SUMMARY: u8 = 7;
const TAG_UNIT: u8 = 8;
const TAG_EFFECT_COUNTS: u8 = 9;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Reconcile => 0,
            PhaseKind::Commit => 1,
        });
    }

    fn write_origin(&mut self, o: PassOrigin) {
        self.write_u8(match o {
            PassOrigin::Root => 0,
            PassOrigin::Component => 1,
            PassOrigin::Unmount => 2,
        });
    }

    fn write_fiber_tag(&mut self, t: FiberTag) {
        self.write_u8(match t {
            FiberTag::Host => 0,
            FiberTag::Component => 1,
            FiberTag::Root => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        self.write_u8(TAG_SLICE_BEGIN);
        self.write_u64(e.slice_index);
        self.write_u64(e.now.ticks());
        self.write_u64(e.remaining.ticks());
        self.write_bool(e.expired);
    }

    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        self.write_u8(TAG_SLICE_END);
        self.write_u64(e.slice_index);
        self.write_u64(e.now.ticks());
        self.write_u32(e.units);
        self.write_bool(e.more_work);
    }

    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.write_u8(TAG_PASS_BEGIN);
        self.write_u64(e.pass_index);
        self.write_origin(e.origin);
        self.write_u32(e.container.0);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.pass_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.pass_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_pass_aborted(&mut self, e: &PassAbortedEvent) {
        self.write_u8(TAG_PASS_ABORTED);
        self.write_u64(e.pass_index);
        self.write_u8(match e.reason {
            AbortReason::Render => 0,
            AbortReason::Host => 1,
        });
        self.write_u64(e.timestamp.ticks());
    }

    fn on_pass_summary(&mut self, s: &PassSummary) {
        self.write_u8(TAG_PASS_SUMMARY);
        self.write_u64(s.pass_index);
        self.write_origin(s.origin);
        self.write_u32(s.container.0);
        self.write_u32(s.slices);
        self.write_u32(s.units);
        self.write_u32(s.placements);
        self.write_u32(s.updates);
        self.write_u32(s.deletions);
        self.write_u64(s.reconcile_ticks);
        self.write_u64(s.commit_ticks);
    }

    fn on_unit(&mut self, e: &UnitEvent) {
        self.write_u8(TAG_UNIT);
        self.write_u64(e.pass_index);
        self.write_u32(e.fiber_index);
        self.write_fiber_tag(e.tag);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_effects(&mut self, pass_index: u64, effects: &[EffectRecord]) {
        let mut counts = [0_u32; 3];
        for effect in effects {
            let slot = match effect.tag {
                EffectTag::Placement => 0,
                EffectTag::Update => 1,
                EffectTag::Deletion => 2,
                EffectTag::None => continue,
            };
            counts[slot] = counts[slot].saturating_add(1);
        }
        self.write_u8(TAG_EFFECT_COUNTS);
        self.write_u64(pass_index);
        for count in counts {
            self.write_u32(count);
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`SliceBeginEvent`].
    SliceBegin(SliceBeginEvent),
    /// A [`SliceEndEvent`].
    SliceEnd(SliceEndEvent),
    /// A [`PassBeginEvent`].
    PassBegin(PassBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`PassAbortedEvent`].
    PassAborted(PassAbortedEvent),
    /// A [`PassSummary`].
    PassSummary(PassSummary),
    /// A [`UnitEvent`].
    Unit(UnitEvent),
    /// Committed effects of a pass, by tag.
    EffectCounts {
        /// Pass counter.
        pass_index: u64,
        /// Placement effects.
        placements: u32,
        /// Update effects.
        updates: u32,
        /// Deletion effects.
        deletions: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Reconcile,
            _ => PhaseKind::Commit,
        })
    }

    fn read_origin(&mut self) -> Option<PassOrigin> {
        Some(match self.read_u8()? {
            0 => PassOrigin::Root,
            1 => PassOrigin::Component,
            _ => PassOrigin::Unmount,
        })
    }

    fn read_fiber_tag(&mut self) -> Option<FiberTag> {
        Some(match self.read_u8()? {
            0 => FiberTag::Host,
            1 => FiberTag::Component,
            _ => FiberTag::Root,
        })
    }

    fn decode_slice_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SliceBegin(SliceBeginEvent {
            slice_index: self.read_u64()?,
            now: HostTime(self.read_u64()?),
            remaining: Duration(self.read_u64()?),
            expired: self.read_bool()?,
        }))
    }

    fn decode_slice_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SliceEnd(SliceEndEvent {
            slice_index: self.read_u64()?,
            now: HostTime(self.read_u64()?),
            units: self.read_u32()?,
            more_work: self.read_bool()?,
        }))
    }

    fn decode_pass_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassBegin(PassBeginEvent {
            pass_index: self.read_u64()?,
            origin: self.read_origin()?,
            container: HostHandle(self.read_u32()?),
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            pass_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            pass_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_pass_aborted(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassAborted(PassAbortedEvent {
            pass_index: self.read_u64()?,
            reason: match self.read_u8()? {
                0 => AbortReason::Render,
                _ => AbortReason::Host,
            },
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_pass_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassSummary(PassSummary {
            pass_index: self.read_u64()?,
            origin: self.read_origin()?,
            container: HostHandle(self.read_u32()?),
            slices: self.read_u32()?,
            units: self.read_u32()?,
            placements: self.read_u32()?,
            updates: self.read_u32()?,
            deletions: self.read_u32()?,
            reconcile_ticks: self.read_u64()?,
            commit_ticks: self.read_u64()?,
        }))
    }

    fn decode_unit(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Unit(UnitEvent {
            pass_index: self.read_u64()?,
            fiber_index: self.read_u32()?,
            tag: self.read_fiber_tag()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_effect_counts(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::EffectCounts {
            pass_index: self.read_u64()?,
            placements: self.read_u32()?,
            updates: self.read_u32()?,
            deletions: self.read_u32()?,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_SLICE_BEGIN => self.decode_slice_begin(),
            TAG_SLICE_END => self.decode_slice_end(),
            TAG_PASS_BEGIN => self.decode_pass_begin(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_PASS_ABORTED => self.decode_pass_aborted(),
            TAG_PASS_SUMMARY => self.decode_pass_summary(),
            TAG_UNIT => self.decode_unit(),
            TAG_EFFECT_COUNTS => self.decode_effect_counts(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
