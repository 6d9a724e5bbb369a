// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory host tree.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Write as _;

use fibril_core::descriptor::{HostKind, NODE_VALUE};
use fibril_core::error::{HostError, HostOp};
use fibril_core::host::Host;
use fibril_core::id::HostHandle;
use fibril_core::props::{Props, PropsDelta, Value};

/// One successful host mutation, in the order the engine made it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCall {
    /// A node was created.
    Create {
        /// New node.
        handle: HostHandle,
        /// Its host kind.
        kind: String,
    },
    /// A node's properties were updated.
    SetProperties {
        /// Updated node.
        handle: HostHandle,
    },
    /// A node was appended.
    InsertChild {
        /// New parent.
        parent: HostHandle,
        /// Appended node.
        child: HostHandle,
    },
    /// A node was inserted before a sibling.
    InsertBefore {
        /// New parent.
        parent: HostHandle,
        /// Inserted node.
        child: HostHandle,
        /// Sibling it now precedes.
        anchor: HostHandle,
    },
    /// A node took another's place.
    ReplaceChild {
        /// Shared parent.
        parent: HostHandle,
        /// Detached node.
        old: HostHandle,
        /// Attached node.
        new: HostHandle,
    },
    /// A node was detached.
    RemoveChild {
        /// Former parent.
        parent: HostHandle,
        /// Detached node.
        child: HostHandle,
    },
}

impl HostCall {
    /// Returns which [`Host`] method this call was.
    #[must_use]
    pub const fn op(&self) -> HostOp {
        match self {
            Self::Create { .. } => HostOp::CreateHandle,
            Self::SetProperties { .. } => HostOp::SetProperties,
            Self::InsertChild { .. } => HostOp::InsertChild,
            Self::InsertBefore { .. } => HostOp::InsertBefore,
            Self::ReplaceChild { .. } => HostOp::ReplaceChild,
            Self::RemoveChild { .. } => HostOp::RemoveChild,
        }
    }

    /// Returns whether this call changed the shape of the tree.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InsertChild { .. }
                | Self::InsertBefore { .. }
                | Self::ReplaceChild { .. }
                | Self::RemoveChild { .. }
        )
    }
}

#[derive(Clone, Debug)]
struct Node {
    kind: String,
    attributes: BTreeMap<String, Value>,
    listeners: BTreeMap<String, Value>,
    children: Vec<HostHandle>,
    parent: Option<HostHandle>,
}

impl Node {
    fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
            listeners: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    fn apply(&mut self, delta: &PropsDelta<'_>) {
        for (name, _) in &delta.removed_listeners {
            self.listeners.remove(*name);
        }
        for name in &delta.removed_attributes {
            self.attributes.remove(*name);
        }
        for (name, value) in &delta.set_attributes {
            self.attributes.insert((*name).to_string(), (*value).clone());
        }
        for (name, value) in &delta.added_listeners {
            self.listeners.insert((*name).to_string(), (*value).clone());
        }
    }
}

/// A host whose nodes live in a table.
///
/// Mutations are validated the way a DOM would validate them: inserting a node
/// that already has a parent, or removing a node from a parent it is not under,
/// is a [`HostError`]. Detached subtrees are dropped from the table.
///
/// Handles are allocated sequentially, so two hosts driven identically assign
/// identical handles.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: BTreeMap<HostHandle, Node>,
    next: u32,
    log: Vec<HostCall>,
    discarded: Vec<HostHandle>,
    fail_at: Option<usize>,
}

impl MemoryHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a container node to mount trees into.
    pub fn add_container(&mut self) -> HostHandle {
        let handle = self.alloc();
        self.nodes.insert(handle, Node::new("#container"));
        handle
    }

    /// Makes the call that would become log entry `index` fail, once.
    pub fn fail_at(&mut self, index: usize) {
        self.fail_at = Some(index);
    }

    /// Makes the next call fail, once.
    pub fn fail_next(&mut self) {
        self.fail_at = Some(self.log.len());
    }

    /// Cancels a pending injected failure.
    pub fn clear_failure(&mut self) {
        self.fail_at = None;
    }

    /// Returns every successful call so far.
    #[must_use]
    pub fn log(&self) -> &[HostCall] {
        &self.log
    }

    /// Returns the calls made since the last `take_log`, clearing the log.
    ///
    /// Failure indices passed to [`fail_at`](Self::fail_at) count from the
    /// cleared log.
    pub fn take_log(&mut self) -> Vec<HostCall> {
        core::mem::take(&mut self.log)
    }

    /// Returns handles the engine gave back after an aborted pass.
    #[must_use]
    pub fn discarded(&self) -> &[HostHandle] {
        &self.discarded
    }

    /// Returns whether `handle` is a live node.
    #[must_use]
    pub fn contains(&self, handle: HostHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    /// Returns the number of live nodes, containers included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the host kind of `handle`.
    #[must_use]
    pub fn kind(&self, handle: HostHandle) -> Option<&str> {
        self.nodes.get(&handle).map(|n| n.kind.as_str())
    }

    /// Returns an attribute of `handle`.
    #[must_use]
    pub fn attribute(&self, handle: HostHandle, name: &str) -> Option<&Value> {
        self.nodes.get(&handle)?.attributes.get(name)
    }

    /// Returns a bound listener of `handle`.
    #[must_use]
    pub fn listener(&self, handle: HostHandle, name: &str) -> Option<&Value> {
        self.nodes.get(&handle)?.listeners.get(name)
    }

    /// Returns the children of `handle`, in order.
    #[must_use]
    pub fn children(&self, handle: HostHandle) -> &[HostHandle] {
        self.nodes
            .get(&handle)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the parent of `handle`, if attached.
    #[must_use]
    pub fn parent(&self, handle: HostHandle) -> Option<HostHandle> {
        self.nodes.get(&handle)?.parent
    }

    /// Serializes the subtree under `container` canonically.
    ///
    /// Elements render as `<kind name=value ...>children</kind>` with
    /// attributes in name order; text nodes render their value. Listeners are
    /// not rendered.
    #[must_use]
    pub fn render(&self, container: HostHandle) -> String {
        let mut out = String::new();
        for &child in self.children(container) {
            self.render_node(child, &mut out);
        }
        out
    }

    fn render_node(&self, handle: HostHandle, out: &mut String) {
        let Some(node) = self.nodes.get(&handle) else {
            return;
        };
        if node.kind == HostKind::TEXT.as_str() {
            if let Some(value) = node.attributes.get(NODE_VALUE) {
                match value.as_text() {
                    Some(text) => out.push_str(text),
                    None => {
                        _ = write!(out, "{value}");
                    }
                }
            }
            return;
        }
        out.push('<');
        out.push_str(&node.kind);
        for (name, value) in &node.attributes {
            _ = write!(out, " {name}={value}");
        }
        out.push('>');
        for &child in &node.children {
            self.render_node(child, out);
        }
        _ = write!(out, "</{}>", node.kind);
    }

    // -- Internals --

    fn alloc(&mut self) -> HostHandle {
        let handle = HostHandle(self.next);
        self.next += 1;
        handle
    }

    fn check(&mut self, op: HostOp) -> Result<(), HostError> {
        if self.fail_at == Some(self.log.len()) {
            self.fail_at = None;
            return Err(HostError::new(op, "injected failure"));
        }
        Ok(())
    }

    fn node(&self, op: HostOp, handle: HostHandle) -> Result<&Node, HostError> {
        self.nodes
            .get(&handle)
            .ok_or_else(|| HostError::new(op, alloc::format!("unknown node {handle:?}")))
    }

    fn node_mut(&mut self, op: HostOp, handle: HostHandle) -> Result<&mut Node, HostError> {
        self.nodes
            .get_mut(&handle)
            .ok_or_else(|| HostError::new(op, alloc::format!("unknown node {handle:?}")))
    }

    fn detached(&self, op: HostOp, handle: HostHandle) -> Result<(), HostError> {
        match self.node(op, handle)?.parent {
            None => Ok(()),
            Some(parent) => Err(HostError::new(
                op,
                alloc::format!("{handle:?} is already under {parent:?}"),
            )),
        }
    }

    fn position(
        &self,
        op: HostOp,
        parent: HostHandle,
        child: HostHandle,
    ) -> Result<usize, HostError> {
        self.node(op, parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| {
                HostError::new(op, alloc::format!("{child:?} is not under {parent:?}"))
            })
    }

    fn attach(
        &mut self,
        op: HostOp,
        parent: HostHandle,
        child: HostHandle,
        at: Option<usize>,
    ) -> Result<(), HostError> {
        let siblings = &mut self.node_mut(op, parent)?.children;
        match at {
            Some(index) => siblings.insert(index, child),
            None => siblings.push(child),
        }
        self.node_mut(op, child)?.parent = Some(parent);
        Ok(())
    }

    /// Drops `handle` and everything under it.
    fn drop_subtree(&mut self, handle: HostHandle) {
        let mut stack = alloc::vec![handle];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
            }
        }
    }
}

impl Host for MemoryHost {
    fn create_handle(&mut self, kind: &HostKind, props: &Props) -> Result<HostHandle, HostError> {
        self.check(HostOp::CreateHandle)?;
        let handle = self.alloc();
        let mut node = Node::new(kind.as_str());
        let empty = Props::empty();
        node.apply(&PropsDelta::between(&empty, props));
        self.nodes.insert(handle, node);
        self.log.push(HostCall::Create {
            handle,
            kind: kind.as_str().to_string(),
        });
        Ok(handle)
    }

    fn set_properties(
        &mut self,
        handle: HostHandle,
        prev: &Props,
        next: &Props,
    ) -> Result<(), HostError> {
        self.check(HostOp::SetProperties)?;
        self.node_mut(HostOp::SetProperties, handle)?
            .apply(&PropsDelta::between(prev, next));
        self.log.push(HostCall::SetProperties { handle });
        Ok(())
    }

    fn insert_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        const OP: HostOp = HostOp::InsertChild;
        self.check(OP)?;
        self.node(OP, parent)?;
        self.detached(OP, child)?;
        self.attach(OP, parent, child, None)?;
        self.log.push(HostCall::InsertChild { parent, child });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostHandle,
        child: HostHandle,
        anchor: HostHandle,
    ) -> Result<(), HostError> {
        const OP: HostOp = HostOp::InsertBefore;
        self.check(OP)?;
        self.detached(OP, child)?;
        let index = self.position(OP, parent, anchor)?;
        self.attach(OP, parent, child, Some(index))?;
        self.log.push(HostCall::InsertBefore {
            parent,
            child,
            anchor,
        });
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: HostHandle,
        old: HostHandle,
        new: HostHandle,
    ) -> Result<(), HostError> {
        const OP: HostOp = HostOp::ReplaceChild;
        self.check(OP)?;
        self.detached(OP, new)?;
        let index = self.position(OP, parent, old)?;
        self.node_mut(OP, parent)?.children.remove(index);
        self.attach(OP, parent, new, Some(index))?;
        self.drop_subtree(old);
        self.log.push(HostCall::ReplaceChild { parent, old, new });
        Ok(())
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        const OP: HostOp = HostOp::RemoveChild;
        self.check(OP)?;
        let index = self.position(OP, parent, child)?;
        self.node_mut(OP, parent)?.children.remove(index);
        self.drop_subtree(child);
        self.log.push(HostCall::RemoveChild { parent, child });
        Ok(())
    }

    fn discard(&mut self, handle: HostHandle) {
        // A failed commit may already have attached some of the pass's nodes.
        if let Some(parent) = self.parent(handle)
            && let Some(siblings) = self.nodes.get_mut(&parent).map(|n| &mut n.children)
        {
            siblings.retain(|&c| c != handle);
        }
        self.drop_subtree(handle);
        self.discarded.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use fibril_core::props::HandlerId;

    use super::*;

    fn element(host: &mut MemoryHost, kind: &'static str, props: &Props) -> HostHandle {
        host.create_handle(&HostKind::new(kind), props)
            .expect("create succeeds")
    }

    #[test]
    fn builds_and_renders_a_tree() {
        let mut host = MemoryHost::new();
        let root = host.add_container();
        let list = element(&mut host, "ul", &Props::builder().attr("id", "l").build());
        let first = element(&mut host, "li", &Props::empty());
        let text = host
            .create_handle(
                &HostKind::TEXT,
                &Props::builder().attr(NODE_VALUE, "one").build(),
            )
            .expect("create succeeds");
        let second = element(&mut host, "li", &Props::empty());

        host.insert_child(first, text).expect("append text");
        host.insert_child(list, second).expect("append second");
        host.insert_before(list, first, second).expect("insert first");
        host.insert_child(root, list).expect("attach list");

        assert_eq!(
            host.render(root),
            "<ul id=\"l\"><li>one</li><li></li></ul>",
            "canonical rendering"
        );
        assert_eq!(host.children(list), [first, second], "anchor respected");
        assert_eq!(host.log().len(), 8, "every call logged");
    }

    #[test]
    fn rejects_double_attachment() {
        let mut host = MemoryHost::new();
        let root = host.add_container();
        let node = element(&mut host, "div", &Props::empty());
        host.insert_child(root, node).expect("first attach");
        let err = host.insert_child(root, node).expect_err("second attach");
        assert_eq!(err.op, HostOp::InsertChild, "failing op reported");
    }

    #[test]
    fn replace_and_remove_drop_old_subtrees() {
        let mut host = MemoryHost::new();
        let root = host.add_container();
        let old = element(&mut host, "div", &Props::empty());
        let inner = element(&mut host, "b", &Props::empty());
        host.insert_child(old, inner).expect("attach inner");
        host.insert_child(root, old).expect("attach old");

        let new = element(&mut host, "p", &Props::empty());
        host.replace_child(root, old, new).expect("replace");
        assert_eq!(host.children(root), [new], "new node in place");
        assert!(!host.contains(old) && !host.contains(inner), "old subtree dropped");

        host.remove_child(root, new).expect("remove");
        assert_eq!(host.render(root), "", "container empty");
        assert_eq!(host.node_count(), 1, "only the container is left");
    }

    #[test]
    fn set_properties_applies_delta() {
        let mut host = MemoryHost::new();
        let prev = Props::builder()
            .attr("class", "a")
            .attr("title", "t")
            .attr("onclick", HandlerId(1))
            .build();
        let next = Props::builder()
            .attr("class", "b")
            .attr("onclick", HandlerId(2))
            .build();
        let node = element(&mut host, "button", &prev);
        host.set_properties(node, &prev, &next).expect("update");

        assert_eq!(host.attribute(node, "class"), Some(&Value::from("b")), "changed");
        assert_eq!(host.attribute(node, "title"), None, "removed");
        assert_eq!(
            host.listener(node, "onclick"),
            Some(&Value::Handler(HandlerId(2))),
            "listener rebound"
        );
        assert_eq!(host.attribute(node, "onclick"), None, "listeners are not attributes");
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut host = MemoryHost::new();
        let root = host.add_container();
        let node = element(&mut host, "div", &Props::empty());
        host.fail_next();
        let err = host.insert_child(root, node).expect_err("injected");
        assert_eq!(err.op, HostOp::InsertChild, "failing op reported");
        assert!(host.children(root).is_empty(), "nothing applied");
        host.insert_child(root, node).expect("second try succeeds");
    }

    #[test]
    fn discard_detaches_and_drops() {
        let mut host = MemoryHost::new();
        let root = host.add_container();
        let node = element(&mut host, "div", &Props::empty());
        host.insert_child(root, node).expect("attach");
        host.discard(node);
        assert!(host.children(root).is_empty(), "detached");
        assert!(!host.contains(node), "dropped");
        assert_eq!(host.discarded(), [node], "recorded");
    }
}
