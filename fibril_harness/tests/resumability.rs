// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slicing must not change results.
//!
//! Random sequences of descriptor trees are mounted once with unbounded slices
//! and once with slices that end after every unit. Both runs must produce the
//! same host calls, the same effect order, and the same final host tree, and
//! that tree must match a fresh mount of the last descriptor. Random component
//! update sequences get the same treatment.

use fibril_core::component::{Children, Component};
use fibril_core::descriptor::Descriptor;
use fibril_core::error::RenderError;
use fibril_core::props::{Props, State, Value};
use fibril_core::queue::UpdateHandle;
use fibril_core::slice::{EffectRecord, UnitBudget};
use fibril_core::{Engine, EngineConfig};
use fibril_harness::{HostCall, MemoryHost, SliceCounter, drive_to_idle};
use proptest::prelude::*;

/// Renders its `children` prop.
struct Wrap;

impl Component for Wrap {
    fn create(_props: &Props, _updates: UpdateHandle) -> Self {
        Self
    }

    fn render(&self, props: &Props, _state: &State) -> Result<Children, RenderError> {
        Ok(props.children().to_vec())
    }
}

#[derive(Clone, Debug)]
enum NodeSpec {
    Element {
        kind: u8,
        label: u8,
        children: Vec<Option<NodeSpec>>,
    },
    Text(u8),
    Wrap(Vec<Option<NodeSpec>>),
}

const KINDS: [&str; 3] = ["div", "p", "span"];

impl NodeSpec {
    fn build(&self) -> Descriptor {
        match self {
            Self::Element {
                kind,
                label,
                children,
            } => {
                let mut element = Descriptor::element(KINDS[usize::from(*kind) % KINDS.len()])
                    .attr("label", i64::from(*label));
                for child in children {
                    element = element.maybe_child(child.as_ref().map(Self::build));
                }
                element.build()
            }
            Self::Text(value) => Descriptor::text(format!("t{value}")),
            Self::Wrap(children) => {
                let mut props = Props::builder();
                for child in children {
                    props = props.maybe_child(child.as_ref().map(Self::build));
                }
                Descriptor::component::<Wrap>(props.build())
            }
        }
    }
}

fn node_spec() -> impl Strategy<Value = NodeSpec> {
    let leaf = prop_oneof![
        (0..3_u8, 0..3_u8).prop_map(|(kind, label)| NodeSpec::Element {
            kind,
            label,
            children: Vec::new(),
        }),
        (0..3_u8).prop_map(NodeSpec::Text),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            (
                0..3_u8,
                0..3_u8,
                prop::collection::vec(prop::option::of(inner.clone()), 0..4)
            )
                .prop_map(|(kind, label, children)| NodeSpec::Element {
                    kind,
                    label,
                    children,
                }),
            prop::collection::vec(prop::option::of(inner), 0..4).prop_map(NodeSpec::Wrap),
        ]
    })
}

/// A root element, so the container always holds exactly one node.
fn root_spec() -> impl Strategy<Value = NodeSpec> {
    prop::collection::vec(prop::option::of(node_spec()), 0..5).prop_map(|children| {
        NodeSpec::Element {
            kind: 0,
            label: 0,
            children,
        }
    })
}

struct Run {
    log: Vec<HostCall>,
    effects: Vec<Vec<EffectRecord>>,
    rendered: String,
    units: u64,
}

fn run(trees: &[NodeSpec], unit_slices: bool) -> Run {
    let mut host = MemoryHost::new();
    let root = host.add_container();
    let mut engine = Engine::new(EngineConfig::default(), SliceCounter::new());
    let mut effects = Vec::new();
    let mut units = 0;
    for tree in trees {
        engine.mount(tree.build(), root);
        let drive = if unit_slices {
            drive_to_idle(&mut engine, &mut host, || UnitBudget::new(1))
        } else {
            drive_to_idle(&mut engine, &mut host, UnitBudget::unbounded)
        };
        assert!(drive.errors.is_empty(), "no failures: {:?}", drive.errors);
        assert!(!drive.stalled, "every slice makes progress");
        effects.push(drive.effects());
        units += drive.units();
    }
    Run {
        log: host.take_log(),
        effects,
        rendered: host.render(root),
        units,
    }
}

fn fresh_render(tree: &NodeSpec) -> String {
    run(core::slice::from_ref(tree), false).rendered
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn unit_slices_match_unbounded_slices(trees in prop::collection::vec(root_spec(), 1..4)) {
        let whole = run(&trees, false);
        let sliced = run(&trees, true);
        prop_assert_eq!(&whole.log, &sliced.log, "identical host calls");
        prop_assert_eq!(&whole.effects, &sliced.effects, "identical effect order");
        prop_assert_eq!(&whole.rendered, &sliced.rendered, "identical host tree");
        prop_assert_eq!(whole.units, sliced.units, "identical unit count");
    }

    #[test]
    fn incremental_result_matches_fresh_mount(trees in prop::collection::vec(root_spec(), 1..4)) {
        let incremental = run(&trees, true);
        let last = trees.last().expect("at least one tree");
        prop_assert_eq!(incremental.rendered, fresh_render(last), "same tree as a fresh mount");
    }

    #[test]
    fn remounting_the_same_descriptor_is_silent(tree in root_spec()) {
        let mut host = MemoryHost::new();
        let root = host.add_container();
        let mut engine = Engine::new(EngineConfig::default(), SliceCounter::new());
        let descriptor = tree.build();
        engine.mount(descriptor.clone(), root);
        drive_to_idle(&mut engine, &mut host, UnitBudget::unbounded);
        host.take_log();

        engine.mount(descriptor, root);
        let drive = drive_to_idle(&mut engine, &mut host, || UnitBudget::new(1));
        prop_assert!(drive.effects().is_empty(), "no effects");
        prop_assert!(host.log().is_empty(), "no host calls");
    }
}

/// Renders `<b>{n}</b>` from state.
struct Tally;

/// Mounts `cells` tallies, then queues `updates` in order and drives to idle.
fn run_updates(
    cells: usize,
    updates: &[(usize, i64)],
    unit_slices: bool,
) -> (Vec<HostCall>, String) {
    let mut host = MemoryHost::new();
    let root = host.add_container();
    let mut engine = Engine::new(EngineConfig::default(), SliceCounter::new());
    let mut row = Descriptor::element("div");
    for _ in 0..cells {
        row = row.child(Descriptor::component::<Tally>(Props::empty()));
    }
    engine.mount(row.build(), root);
    drive_to_idle(&mut engine, &mut host, UnitBudget::unbounded);
    host.take_log();

    let ids = engine.instances_of::<Tally>();
    for &(cell, n) in updates {
        engine.request_update(ids[cell % ids.len()], State::new().with("n", n));
    }
    let drive = if unit_slices {
        drive_to_idle(&mut engine, &mut host, || UnitBudget::new(1))
    } else {
        drive_to_idle(&mut engine, &mut host, UnitBudget::unbounded)
    };
    assert!(drive.errors.is_empty(), "no failures: {:?}", drive.errors);
    (host.take_log(), host.render(root))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn update_sequences_are_slice_independent(
        cells in 1..5_usize,
        updates in prop::collection::vec((0..5_usize, 0..4_i64), 0..8),
    ) {
        let whole = run_updates(cells, &updates, false);
        let sliced = run_updates(cells, &updates, true);
        prop_assert_eq!(&whole.0, &sliced.0, "identical host calls");
        prop_assert_eq!(&whole.1, &sliced.1, "identical host tree");
    }
}

impl Component for Tally {
    fn create(_props: &Props, _updates: UpdateHandle) -> Self {
        Self
    }

    fn render(&self, _props: &Props, state: &State) -> Result<Children, RenderError> {
        let n = state.get("n").and_then(Value::as_int).unwrap_or(0);
        Ok(vec![Some(Descriptor::element("b").text(n.to_string()).build())])
    }
}

#[test]
fn update_queued_mid_pass_runs_after_commit() {
    let mut host = MemoryHost::new();
    let root = host.add_container();
    let requests = SliceCounter::new();
    let mut engine = Engine::new(EngineConfig::default(), requests.clone());
    let tally = |label: i64| {
        Descriptor::element("div")
            .attr("label", label)
            .child(Descriptor::component::<Tally>(Props::empty()))
            .build()
    };
    engine.mount(tally(0), root);
    drive_to_idle(&mut engine, &mut host, UnitBudget::unbounded);
    let [id] = engine.instances_of::<Tally>()[..] else {
        panic!("one tally expected");
    };

    engine.mount(tally(1), root);
    let mut budget = UnitBudget::new(1);
    engine.advance(&mut budget, &mut host).expect("slice succeeds");
    assert!(engine.is_reconciling(), "pass in flight");
    requests.reset();
    engine.request_update(id, State::new().with("n", 4));
    assert_eq!(requests.count(), 1, "update requested a slice");

    let drive = drive_to_idle(&mut engine, &mut host, || UnitBudget::new(1));
    assert_eq!(drive.commits().count(), 2, "mount pass, then update pass");
    assert_eq!(host.render(root), "<div label=1><b>4</b></div>", "both applied");
}
