// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated idle-callback loop that exercises the tracing and diagnostics
//! pipeline.
//!
//! Mounts a small list of counters into a [`MemoryHost`], then bumps a few of
//! them and finally unmounts the tree. Every slice runs against a simulated
//! clock where each unit of work costs a fixed amount of time, so passes span
//! several slices. Events go to both a
//! [`PrettyPrintSink`](fibril_debug::pretty::PrettyPrintSink) and a
//! [`RecorderSink`](fibril_debug::recorder::RecorderSink), and the recording
//! is exported as a Chrome trace JSON file.

use std::cell::Cell;
use std::fs::File;
use std::io::BufWriter;

use fibril_core::component::{Children, Component};
use fibril_core::descriptor::Descriptor;
use fibril_core::error::RenderError;
use fibril_core::props::{Props, State, Value};
use fibril_core::queue::UpdateHandle;
use fibril_core::slice::{EffectRecord, SliceBudget};
use fibril_core::time::{Duration, HostTime, Timebase};
use fibril_core::trace::{
    PassAbortedEvent, PassBeginEvent, PassSummary, PhaseBeginEvent, PhaseEndEvent,
    SliceBeginEvent, SliceEndEvent, TraceSink, Tracer, UnitEvent,
};
use fibril_core::{Engine, EngineConfig};

use fibril_debug::pretty::PrettyPrintSink;
use fibril_debug::recorder::RecorderSink;
use fibril_harness::{MemoryHost, SliceCounter};

const COUNTERS: i64 = 6;
/// Simulated cost of one unit of work (0.3 ms).
const UNIT_COST_NS: u64 = 300_000;
/// Length of an idle period granted by the host (2.5 ms).
const SLICE_NS: u64 = 2_500_000;
/// Gap between idle periods (4 ms).
const GAP_NS: u64 = 4_000_000;
/// Every this many slices the host grants a slice on timeout with no time left.
const EXPIRED_EVERY: u64 = 5;

/// Renders `<li>{label}: {count}</li>`.
struct Counter;

impl Component for Counter {
    fn create(_props: &Props, _updates: UpdateHandle) -> Self {
        Self
    }

    fn initial_state(&self, _props: &Props) -> State {
        State::new().with("count", 0)
    }

    fn render(&self, props: &Props, state: &State) -> Result<Children, RenderError> {
        let label = props.get("label").and_then(Value::as_text).unwrap_or("?");
        let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
        Ok(vec![Some(
            Descriptor::element("li")
                .text(format!("{label}: {count}"))
                .build(),
        )])
    }
}

fn app() -> Descriptor {
    let mut list = Descriptor::element("ul").attr("class", "counters");
    for i in 0..COUNTERS {
        list = list.child(Descriptor::component::<Counter>(
            Props::builder().attr("label", format!("c{i}")).build(),
        ));
    }
    Descriptor::element("main")
        .child(Descriptor::element("h1").text("Counters").build())
        .child(list.build())
        .build()
}

/// A slice on the simulated clock; each completed unit advances time.
struct SimBudget<'a> {
    clock: &'a Cell<u64>,
    deadline: u64,
    expired: bool,
}

impl SliceBudget for SimBudget<'_> {
    fn now(&self) -> HostTime {
        HostTime(self.clock.get())
    }

    fn remaining(&self) -> Duration {
        self.now().until(HostTime(self.deadline))
    }

    fn expired(&self) -> bool {
        self.expired
    }

    fn record_unit(&mut self) {
        self.clock.set(self.clock.get() + UNIT_COST_NS);
    }
}

/// Forwards every event to both sinks.
struct Tee<'a> {
    pretty: &'a mut PrettyPrintSink,
    recorder: &'a mut RecorderSink,
}

impl TraceSink for Tee<'_> {
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        self.pretty.on_slice_begin(e);
        self.recorder.on_slice_begin(e);
    }

    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        self.pretty.on_slice_end(e);
        self.recorder.on_slice_end(e);
    }

    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.pretty.on_pass_begin(e);
        self.recorder.on_pass_begin(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.pretty.on_phase_begin(e);
        self.recorder.on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.pretty.on_phase_end(e);
        self.recorder.on_phase_end(e);
    }

    fn on_pass_aborted(&mut self, e: &PassAbortedEvent) {
        self.pretty.on_pass_aborted(e);
        self.recorder.on_pass_aborted(e);
    }

    fn on_pass_summary(&mut self, s: &PassSummary) {
        self.pretty.on_pass_summary(s);
        self.recorder.on_pass_summary(s);
    }

    fn on_unit(&mut self, e: &UnitEvent) {
        // Units are too chatty for the console.
        self.recorder.on_unit(e);
    }

    fn on_effects(&mut self, pass_index: u64, effects: &[EffectRecord]) {
        self.pretty.on_effects(pass_index, effects);
        self.recorder.on_effects(pass_index, effects);
    }
}

fn main() {
    let timebase = Timebase::NANOS;

    // -- sinks -------------------------------------------------------------
    let mut pretty = PrettyPrintSink::new(Box::new(std::io::stdout()), timebase);
    let mut recorder = RecorderSink::new();

    // -- engine and host ---------------------------------------------------
    let mut host = MemoryHost::new();
    let root = host.add_container();
    let requests = SliceCounter::new();
    let mut engine = Engine::new(EngineConfig::idle_callback(), requests.clone());
    let clock = Cell::new(1_000_000_000); // start at 1s
    let mut slices = 0_u64;

    let mut run_until_idle = |engine: &mut Engine, host: &mut MemoryHost| {
        while engine.has_pending_work() {
            slices += 1;
            let expired = slices % EXPIRED_EVERY == 0;
            let start = clock.get();
            let mut budget = SimBudget {
                clock: &clock,
                deadline: if expired { start } else { start + SLICE_NS },
                expired,
            };
            let mut tee = Tee {
                pretty: &mut pretty,
                recorder: &mut recorder,
            };
            let mut tracer = Tracer::new(&mut tee);
            if let Err(err) = engine.advance_traced(&mut budget, host, &mut tracer) {
                eprintln!("slice {slices} failed: {err}");
            }
            clock.set(clock.get() + GAP_NS);
        }
    };

    // 1. Initial mount.
    engine.mount(app(), root);
    run_until_idle(&mut engine, &mut host);
    println!("mounted: {}", host.render(root));

    // 2. Bump a few counters; their updates queue up and run one pass each.
    for (n, id) in engine.instances_of::<Counter>().into_iter().enumerate().step_by(2) {
        engine.request_update(id, State::new().with("count", i64::try_from(n).unwrap_or(0) + 1));
    }
    run_until_idle(&mut engine, &mut host);
    println!("updated: {}", host.render(root));

    // 3. Tear everything down.
    engine.unmount(root);
    run_until_idle(&mut engine, &mut host);
    println!("unmounted: {:?}", host.render(root));

    // -- export Chrome trace -----------------------------------------------
    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    fibril_debug::chrome::export(recorder.as_bytes(), timebase, &mut writer)
        .expect("failed to write Chrome trace");

    println!(
        "Wrote {path} ({slices} slices, {} slice requests)",
        requests.count()
    );
}
