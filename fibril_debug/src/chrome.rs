// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Slices become complete (`X`) events on thread 0, phases become `B`/`E`
//! pairs on thread 1, and everything else is an instant event.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use fibril_core::time::{Duration, HostTime, Timebase};

use crate::recorder::{RecordedEvent, decode};

const SLICE_TID: u32 = 0;
const PASS_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
/// Events that carry no timestamp of their own are placed at the most recent
/// timestamp seen in the recording.
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut open_slice: Option<HostTime> = None;
    let mut last = HostTime(0);

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::SliceBegin(e) => {
                open_slice = Some(e.now);
                last = e.now;
            }
            RecordedEvent::SliceEnd(e) => {
                let start = open_slice.take().unwrap_or(e.now);
                last = e.now;
                events.push(json!({
                    "ph": "X",
                    "name": "Slice",
                    "cat": "Loop",
                    "ts": to_us(start.ticks(), timebase),
                    "dur": to_us(e.now.saturating_duration_since(start).ticks(), timebase),
                    "pid": 0,
                    "tid": SLICE_TID,
                    "args": {
                        "slice_index": e.slice_index,
                        "units": e.units,
                        "more_work": e.more_work,
                    }
                }));
            }
            RecordedEvent::PassBegin(e) => {
                last = e.timestamp;
                events.push(json!({
                    "ph": "i",
                    "name": "PassBegin",
                    "cat": "Pass",
                    "ts": to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": PASS_TID,
                    "s": "t",
                    "args": {
                        "pass_index": e.pass_index,
                        "origin": format!("{:?}", e.origin),
                        "container": e.container.0,
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                last = e.timestamp;
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Pass",
                    "ts": to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": PASS_TID,
                    "args": {
                        "pass_index": e.pass_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                last = e.timestamp;
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Pass",
                    "ts": to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": PASS_TID,
                    "args": {
                        "pass_index": e.pass_index,
                    }
                }));
            }
            RecordedEvent::PassAborted(e) => {
                last = e.timestamp;
                events.push(json!({
                    "ph": "i",
                    "name": "PassAborted",
                    "cat": "Pass",
                    "ts": to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": PASS_TID,
                    "s": "g",
                    "args": {
                        "pass_index": e.pass_index,
                        "reason": format!("{:?}", e.reason),
                    }
                }));
            }
            RecordedEvent::PassSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PassSummary",
                    "cat": "Summary",
                    "ts": to_us(last.ticks(), timebase),
                    "pid": 0,
                    "tid": PASS_TID,
                    "s": "t",
                    "args": {
                        "pass_index": s.pass_index,
                        "origin": format!("{:?}", s.origin),
                        "container": s.container.0,
                        "slices": s.slices,
                        "units": s.units,
                        "placements": s.placements,
                        "updates": s.updates,
                        "deletions": s.deletions,
                        "reconcile_us": to_us(s.reconcile_ticks, timebase),
                        "commit_us": to_us(s.commit_ticks, timebase),
                    }
                }));
            }
            RecordedEvent::Unit(e) => {
                last = e.timestamp;
                events.push(json!({
                    "ph": "i",
                    "name": "Unit",
                    "cat": "Rich",
                    "ts": to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": SLICE_TID,
                    "s": "t",
                    "args": {
                        "pass_index": e.pass_index,
                        "fiber_index": e.fiber_index,
                        "tag": format!("{:?}", e.tag),
                    }
                }));
            }
            RecordedEvent::EffectCounts {
                pass_index,
                placements,
                updates,
                deletions,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "Effects",
                    "cat": "Rich",
                    "ts": to_us(last.ticks(), timebase),
                    "pid": 0,
                    "tid": PASS_TID,
                    "s": "t",
                    "args": {
                        "pass_index": pass_index,
                        "placements": placements,
                        "updates": updates,
                        "deletions": deletions,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_us(ticks: u64, timebase: Timebase) -> f64 {
    Duration(ticks).to_nanos(timebase) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use fibril_core::id::HostHandle;
    use fibril_core::trace::{
        PassBeginEvent, PassOrigin, PhaseBeginEvent, PhaseEndEvent, PhaseKind, SliceBeginEvent,
        SliceEndEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_slice_begin(&SliceBeginEvent {
            slice_index: 0,
            now: HostTime(1_000_000),
            remaining: Duration(5_000_000),
            expired: false,
        });
        rec.on_pass_begin(&PassBeginEvent {
            pass_index: 0,
            origin: PassOrigin::Root,
            container: HostHandle(0),
            timestamp: HostTime(1_000_000),
        });
        rec.on_phase_begin(&PhaseBeginEvent {
            pass_index: 0,
            phase: PhaseKind::Reconcile,
            timestamp: HostTime(1_000_000),
        });
        rec.on_phase_end(&PhaseEndEvent {
            pass_index: 0,
            phase: PhaseKind::Reconcile,
            timestamp: HostTime(1_000_400),
        });
        rec.on_slice_end(&SliceEndEvent {
            slice_index: 0,
            now: HostTime(1_000_500),
            units: 3,
            more_work: false,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), Timebase::NANOS, &mut out).expect("export succeeds");
        let json_str = String::from_utf8(out).expect("utf-8 output");
        let parsed: Vec<Value> = serde_json::from_str(&json_str).expect("a JSON array");
        assert_eq!(parsed.len(), 4, "slice begin folds into the complete event");

        assert_eq!(parsed[0]["name"], "PassBegin", "pass instant first");
        assert_eq!(parsed[1]["ph"], "B", "phase begin");
        assert_eq!(parsed[1]["name"], "Reconcile", "phase name");
        assert_eq!(parsed[2]["ph"], "E", "phase end");

        assert_eq!(parsed[3]["ph"], "X", "slice is a complete event");
        assert_eq!(parsed[3]["ts"], 1_000.0, "slice start in µs");
        assert_eq!(parsed[3]["dur"], 0.5, "slice duration in µs");
        assert_eq!(parsed[3]["args"]["units"], 3, "units carried");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], Timebase::NANOS, &mut out).expect("export succeeds");
        let json_str = String::from_utf8(out).expect("utf-8 output");
        let parsed: Vec<Value> = serde_json::from_str(&json_str).expect("a JSON array");
        assert!(parsed.is_empty(), "no events");
    }
}
