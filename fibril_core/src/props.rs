// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property payloads, component state, and host property deltas.
//!
//! [`Props`] is the immutable payload carried by a [`Descriptor`] and by every
//! fiber built from it. It is reference counted; the reconciler compares props
//! by identity ([`Props::ptr_eq`]), never structurally, when deciding whether a
//! component may skip rendering or a host node needs an update.
//!
//! [`State`] is a component's keyed state. Updates carry partial states that
//! are merged key-wise with [`State::merge`].
//!
//! [`PropsDelta`] classifies the difference between two host property sets
//! the way a DOM-like host applies them: listeners (names starting with `on`)
//! are unbound and rebound around plain attribute writes.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::descriptor::Descriptor;

/// An opaque reference to a host-side event handler.
///
/// The engine never invokes handlers; it only tells the host when a listener
/// attribute is bound, changed, or removed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub u32);

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerId({})", self.0)
    }
}

/// A single attribute or state value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicitly empty.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Event handler reference.
    Handler(HandlerId),
}

impl Value {
    /// Returns the integer payload, if this is an [`Int`](Self::Int).
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a [`Bool`](Self::Bool).
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if this is a [`Text`](Self::Text).
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Handler(h) => write!(f, "handler#{}", h.0),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<HandlerId> for Value {
    fn from(v: HandlerId) -> Self {
        Self::Handler(v)
    }
}

/// Returns whether an attribute name denotes an event listener.
#[inline]
#[must_use]
pub fn is_listener(name: &str) -> bool {
    name.starts_with("on")
}

// -- Props --

#[derive(Default, PartialEq)]
struct PropsData {
    attributes: BTreeMap<String, Value>,
    children: Vec<Option<Descriptor>>,
}

/// Immutable, reference-counted property payload.
///
/// Children are positional slots: an empty slot (`None`) keeps its index so
/// that siblings after it line up with the previous render.
#[derive(Clone, Default)]
pub struct Props(Rc<PropsData>);

impl Props {
    /// Returns an empty payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a payload.
    #[must_use]
    pub fn builder() -> PropsBuilder {
        PropsBuilder::default()
    }

    /// Builds the payload of a root fiber: no attributes, the given children.
    pub(crate) fn root(children: Vec<Option<Descriptor>>) -> Self {
        Self(Rc::new(PropsData {
            attributes: BTreeMap::new(),
            children,
        }))
    }

    /// Returns the value of the named attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.attributes.get(name)
    }

    /// Iterates attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the positional child slots.
    #[must_use]
    pub fn children(&self) -> &[Option<Descriptor>] {
        &self.0.children
    }

    /// Returns whether both payloads are the same allocation.
    #[inline]
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || self.0 == other.0
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attributes", &self.0.attributes)
            .field("children", &self.0.children)
            .finish()
    }
}

/// Builder for [`Props`].
#[derive(Debug, Default)]
pub struct PropsBuilder {
    attributes: BTreeMap<String, Value>,
    children: Vec<Option<Descriptor>>,
}

impl PropsBuilder {
    /// Sets an attribute, replacing any earlier value under the same name.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Appends a child slot.
    #[must_use]
    pub fn child(mut self, child: Descriptor) -> Self {
        self.children.push(Some(child));
        self
    }

    /// Appends a child slot that may be empty.
    #[must_use]
    pub fn maybe_child(mut self, child: Option<Descriptor>) -> Self {
        self.children.push(child);
        self
    }

    /// Appends every child in order.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Descriptor>) -> Self {
        self.children.extend(children.into_iter().map(Some));
        self
    }

    /// Finishes the payload.
    #[must_use]
    pub fn build(self) -> Props {
        Props(Rc::new(PropsData {
            attributes: self.attributes,
            children: self.children,
        }))
    }
}

// -- State --

/// Keyed component state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State(BTreeMap<String, Value>);

impl State {
    /// Creates an empty state.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns this state with one more key set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns whether no keys are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Shallow key-wise merge: every key in `delta` overwrites the same key in
    /// `self`; keys absent from `delta` are left alone.
    pub fn merge(&mut self, delta: Self) {
        self.0.extend(delta.0);
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// -- Host property delta --

/// The host-visible difference between two property payloads.
///
/// Hosts apply the four lists in field order: unbind stale listeners, clear
/// attributes that disappeared, write new or changed attributes, then bind
/// new or changed listeners. Children never appear here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropsDelta<'a> {
    /// Listeners that are gone or whose handler changed.
    pub removed_listeners: Vec<(&'a str, &'a Value)>,
    /// Attributes present before and absent now.
    pub removed_attributes: Vec<&'a str>,
    /// Attributes that are new or whose value changed.
    pub set_attributes: Vec<(&'a str, &'a Value)>,
    /// Listeners that are new or whose handler changed.
    pub added_listeners: Vec<(&'a str, &'a Value)>,
}

impl<'a> PropsDelta<'a> {
    /// Computes the delta that turns `prev` into `next`.
    #[must_use]
    pub fn between(prev: &'a Props, next: &'a Props) -> Self {
        let mut delta = Self::default();
        for (name, value) in prev.attributes() {
            let after = next.get(name);
            if is_listener(name) {
                if after != Some(value) {
                    delta.removed_listeners.push((name, value));
                }
            } else if after.is_none() {
                delta.removed_attributes.push(name);
            }
        }
        for (name, value) in next.attributes() {
            if prev.get(name) == Some(value) {
                continue;
            }
            if is_listener(name) {
                delta.added_listeners.push((name, value));
            } else {
                delta.set_attributes.push((name, value));
            }
        }
        delta
    }

    /// Returns whether applying the delta would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed_listeners.is_empty()
            && self.removed_attributes.is_empty()
            && self.set_attributes.is_empty()
            && self.added_listeners.is_empty()
    }
}
