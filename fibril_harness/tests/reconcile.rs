// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Child reconciliation against `MemoryHost`: identity reuse, positional
//! matching, and trailing insertion and removal.

use fibril_core::descriptor::Descriptor;
use fibril_core::fiber::{EffectTag, FiberTag};
use fibril_core::id::HostHandle;
use fibril_core::props::HandlerId;
use fibril_core::slice::{CommitSummary, UnitBudget};
use fibril_core::{Engine, EngineConfig};
use fibril_harness::{HostCall, MemoryHost, SliceCounter, drive_to_idle};

struct Fixture {
    engine: Engine,
    host: MemoryHost,
    root: HostHandle,
}

impl Fixture {
    fn new() -> Self {
        let mut host = MemoryHost::new();
        let root = host.add_container();
        Self {
            engine: Engine::new(EngineConfig::default(), SliceCounter::new()),
            host,
            root,
        }
    }

    /// Mounts `tree` and returns the one commit it produced.
    fn mount(&mut self, tree: Descriptor) -> CommitSummary {
        self.engine.mount(tree, self.root);
        let drive = drive_to_idle(&mut self.engine, &mut self.host, UnitBudget::unbounded);
        assert!(drive.errors.is_empty(), "no failures: {:?}", drive.errors);
        let mut commits: Vec<_> = drive.commits().cloned().collect();
        assert_eq!(commits.len(), 1, "one pass per mount");
        commits.remove(0)
    }

    fn render(&self) -> String {
        self.host.render(self.root)
    }
}

fn item(kind: &'static str, label: &str) -> Descriptor {
    Descriptor::element(kind).attr("label", label).build()
}

fn list(items: impl IntoIterator<Item = Descriptor>) -> Descriptor {
    let mut ul = Descriptor::element("ul");
    for i in items {
        ul = ul.child(i);
    }
    ul.build()
}

fn tags(commit: &CommitSummary) -> Vec<EffectTag> {
    commit.effects.iter().map(|e| e.tag).collect()
}

#[test]
fn identical_descriptor_produces_no_effects() {
    let mut fx = Fixture::new();
    let tree = list([item("li", "a"), item("li", "b")]);
    fx.mount(tree.clone());
    fx.host.take_log();

    let commit = fx.mount(tree);
    assert!(commit.is_empty(), "effect list is empty: {:?}", commit.effects);
    assert!(fx.host.log().is_empty(), "no host mutations on the second mount");
}

#[test]
fn rebuilt_equal_tree_produces_no_effects() {
    let mut fx = Fixture::new();
    let tree = || {
        list([
            Descriptor::element("li")
                .attr("label", "a")
                .attr("onclick", HandlerId(1))
                .text("first")
                .build(),
            item("li", "b"),
        ])
    };
    fx.mount(tree());
    fx.host.take_log();

    let commit = fx.mount(tree());
    assert!(commit.is_empty(), "effect list is empty: {:?}", commit.effects);
    assert!(fx.host.log().is_empty(), "no host mutations: {:?}", fx.host.log());
}

#[test]
fn attribute_change_alone_updates_only_that_node() {
    let mut fx = Fixture::new();
    fx.mount(list([item("li", "a"), item("li", "b")]));
    let ul = fx.host.children(fx.root)[0];
    let second = fx.host.children(ul)[1];
    fx.host.take_log();

    let commit = fx.mount(list([item("li", "a"), item("li", "b2")]));
    assert_eq!(commit.updates, 1, "one update");
    assert_eq!(
        fx.host.log(),
        [HostCall::SetProperties { handle: second }],
        "only the changed item is written"
    );
}

#[test]
fn positional_diff_marks_update_placement_deletion() {
    let mut fx = Fixture::new();
    fx.mount(list([item("div", "A"), item("div", "B"), item("div", "C")]));
    let before = fx.host.children(fx.host.children(fx.root)[0]).to_vec();

    let commit = fx.mount(list([item("div", "A'"), item("p", "X"), item("div", "C'")]));
    let host_effects: Vec<_> = commit
        .effects
        .iter()
        .filter(|e| e.fiber_tag == FiberTag::Host)
        .map(|e| (e.tag, e.handle))
        .collect();

    let after = fx.host.children(fx.host.children(fx.root)[0]).to_vec();
    assert_eq!(after[0], before[0], "position 0 keeps its node");
    assert_eq!(after[2], before[2], "position 2 keeps its node");
    assert_ne!(after[1], before[1], "position 1 gets a new node");
    assert_eq!(
        host_effects[..4],
        [
            (EffectTag::Deletion, Some(before[1])),
            (EffectTag::Update, Some(before[0])),
            (EffectTag::Placement, Some(after[1])),
            (EffectTag::Update, Some(before[2])),
        ],
        "B deleted, A and C updated, X placed"
    );
    assert_eq!(
        fx.render(),
        "<ul><div label=\"A'\"></div><p label=\"X\"></p><div label=\"C'\"></div></ul>",
        "host tree follows the new children"
    );
}

#[test]
fn trailing_insertion_places_exactly_one_node() {
    let mut fx = Fixture::new();
    let a = item("li", "a");
    fx.mount(list([a.clone()]));
    fx.host.take_log();

    let commit = fx.mount(list([a, item("li", "b")]));
    assert_eq!(commit.placements, 1, "one placement");
    assert_eq!(commit.deletions, 0, "no deletion");
    let structural: Vec<_> = fx.host.log().iter().filter(|c| c.is_structural()).collect();
    assert!(
        matches!(structural[..], [HostCall::InsertChild { .. }]),
        "appended: {structural:?}"
    );
    assert_eq!(fx.render(), "<ul><li label=\"a\"></li><li label=\"b\"></li></ul>", "appended");
}

#[test]
fn trailing_removal_deletes_exactly_one_node() {
    let mut fx = Fixture::new();
    let a = item("li", "a");
    fx.mount(list([a.clone(), item("li", "b")]));

    let commit = fx.mount(list([a]));
    assert_eq!(commit.deletions, 1, "one deletion");
    assert_eq!(commit.placements, 0, "no spurious placement");
    assert_eq!(fx.render(), "<ul><li label=\"a\"></li></ul>", "trailing node removed");
}

#[test]
fn empty_slot_does_not_shift_later_children() {
    let mut fx = Fixture::new();
    let a = item("li", "a");
    let c = item("li", "c");
    fx.mount(list([a.clone(), item("li", "b"), c.clone()]));
    let ul = fx.host.children(fx.root)[0];
    let c_node = fx.host.children(ul)[2];

    let tree = Descriptor::element("ul")
        .child(a.clone())
        .maybe_child(None)
        .child(c.clone())
        .build();
    let commit = fx.mount(tree);
    assert_eq!(commit.deletions, 1, "the emptied slot is deleted");
    assert_eq!(commit.placements, 0, "nothing moves");
    assert_eq!(fx.host.children(ul)[1], c_node, "c keeps its node");

    let tree = Descriptor::element("ul")
        .child(a)
        .child(item("li", "b2"))
        .child(c)
        .build();
    fx.mount(tree);
    assert_eq!(
        fx.render(),
        "<ul><li label=\"a\"></li><li label=\"b2\"></li><li label=\"c\"></li></ul>",
        "refilled slot is inserted before its next sibling"
    );
}

#[test]
fn text_children_update_in_place() {
    let mut fx = Fixture::new();
    fx.mount(Descriptor::element("p").text("hello").build());
    let p = fx.host.children(fx.root)[0];
    let text = fx.host.children(p)[0];
    fx.host.take_log();

    let commit = fx.mount(Descriptor::element("p").text("world").build());
    assert_eq!(commit.placements, 0, "text node reused");
    assert_eq!(fx.host.children(p), [text], "same text node");
    assert!(
        fx.host.log().contains(&HostCall::SetProperties { handle: text }),
        "text value written"
    );
    assert_eq!(fx.render(), "<p>world</p>", "new text rendered");
}

#[test]
fn changed_root_kind_replaces_the_whole_tree() {
    let mut fx = Fixture::new();
    fx.mount(list([item("li", "a")]));
    let old = fx.host.children(fx.root)[0];

    fx.mount(Descriptor::element("ol").child(item("li", "a")).build());
    let new = fx.host.children(fx.root)[0];
    assert_ne!(new, old, "new root node");
    assert!(!fx.host.contains(old), "old subtree gone");
    assert_eq!(fx.render(), "<ol><li label=\"a\"></li></ol>", "replaced");
}
