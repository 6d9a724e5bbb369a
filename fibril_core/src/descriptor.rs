// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node descriptors: the immutable description of one render's desired tree.

use alloc::borrow::Cow;
use alloc::string::String;
use core::fmt;

use crate::component::{Component, ComponentType};
use crate::props::{Props, PropsBuilder, Value};

/// Attribute carrying the text of a [`HostKind::TEXT`] node.
pub const NODE_VALUE: &str = "nodeValue";

/// The tag name of a host node.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostKind(Cow<'static, str>);

impl HostKind {
    /// The kind used for text leaves.
    pub const TEXT: Self = Self(Cow::Borrowed("TEXT_ELEMENT"));

    /// Creates a host kind from a tag name.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the tag name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether this is the text leaf kind.
    #[must_use]
    pub fn is_text(&self) -> bool {
        *self == Self::TEXT
    }
}

impl fmt::Debug for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostKind({})", self.0)
    }
}

/// What a descriptor renders to: a host node or a component.
#[derive(Clone, Debug, PartialEq)]
pub enum Kind {
    /// A host node with the given tag name.
    Host(HostKind),
    /// A component of the given type.
    Component(ComponentType),
}

impl Kind {
    /// Returns whether a fiber of kind `self` may be reused for `other`.
    ///
    /// Host kinds match by tag name, component kinds by type identity. A host
    /// kind never matches a component kind.
    #[must_use]
    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => a == b,
            (Self::Component(a), Self::Component(b)) => a == b,
            _ => false,
        }
    }

    /// Returns a display name (tag name or component type name).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Host(kind) => kind.as_str(),
            Self::Component(ty) => ty.name(),
        }
    }
}

/// An immutable `{ kind, props }` pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    kind: Kind,
    props: Props,
}

impl Descriptor {
    /// Creates a descriptor from its parts.
    #[must_use]
    pub const fn new(kind: Kind, props: Props) -> Self {
        Self { kind, props }
    }

    /// Starts describing a host element.
    #[must_use]
    pub fn element(kind: impl Into<Cow<'static, str>>) -> ElementBuilder {
        ElementBuilder {
            kind: HostKind::new(kind),
            props: Props::builder(),
        }
    }

    /// Describes a text leaf.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: Kind::Host(HostKind::TEXT),
            props: Props::builder()
                .attr(NODE_VALUE, Value::Text(value.into()))
                .build(),
        }
    }

    /// Describes a component of type `C`.
    #[must_use]
    pub fn component<C: Component>(props: Props) -> Self {
        Self {
            kind: Kind::Component(ComponentType::of::<C>()),
            props,
        }
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Returns the props.
    #[must_use]
    pub const fn props(&self) -> &Props {
        &self.props
    }
}

/// Builder returned by [`Descriptor::element`].
#[derive(Debug)]
pub struct ElementBuilder {
    kind: HostKind,
    props: PropsBuilder,
}

impl ElementBuilder {
    /// Sets an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props = self.props.attr(name, value);
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn child(mut self, child: Descriptor) -> Self {
        self.props = self.props.child(child);
        self
    }

    /// Appends a child slot that may be empty.
    #[must_use]
    pub fn maybe_child(mut self, child: Option<Descriptor>) -> Self {
        self.props = self.props.maybe_child(child);
        self
    }

    /// Appends a text leaf child.
    #[must_use]
    pub fn text(self, value: impl Into<String>) -> Self {
        self.child(Descriptor::text(value))
    }

    /// Finishes the descriptor.
    #[must_use]
    pub fn build(self) -> Descriptor {
        Descriptor {
            kind: Kind::Host(self.kind),
            props: self.props.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::component::Children;
    use crate::error::RenderError;
    use crate::props::State;
    use crate::queue::UpdateHandle;

    struct Label;

    impl Component for Label {
        fn create(_props: &Props, _updates: UpdateHandle) -> Self {
            Self
        }

        fn render(&self, _props: &Props, _state: &State) -> Result<Children, RenderError> {
            Ok(Vec::new())
        }
    }

    struct Badge;

    impl Component for Badge {
        fn create(_props: &Props, _updates: UpdateHandle) -> Self {
            Self
        }

        fn render(&self, _props: &Props, _state: &State) -> Result<Children, RenderError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn host_kinds_match_by_name() {
        let a = Descriptor::element("div").build();
        let b = Descriptor::element(String::from("div")).attr("id", 1).build();
        let c = Descriptor::element("span").build();
        assert!(a.kind().same_type(b.kind()), "same tag, owned or borrowed");
        assert!(!a.kind().same_type(c.kind()), "different tag");
    }

    #[test]
    fn component_kinds_match_by_type() {
        let a = Descriptor::component::<Label>(Props::empty());
        let b = Descriptor::component::<Label>(Props::builder().attr("x", 1).build());
        let c = Descriptor::component::<Badge>(Props::empty());
        assert!(a.kind().same_type(b.kind()), "same component type");
        assert!(!a.kind().same_type(c.kind()), "different component type");
        assert!(
            !a.kind().same_type(Descriptor::element("div").build().kind()),
            "component never matches host"
        );
    }

    #[test]
    fn text_children_use_text_kind() {
        let d = Descriptor::element("p").text("hello").maybe_child(None).build();
        assert_eq!(d.props().children().len(), 2, "empty slot keeps its position");
        let Some(text) = &d.props().children()[0] else {
            panic!("first slot should be filled");
        };
        assert!(matches!(text.kind(), Kind::Host(k) if k.is_text()), "text kind");
        assert_eq!(
            text.props().get(NODE_VALUE).and_then(Value::as_text),
            Some("hello"),
            "text stored as nodeValue"
        );
    }
}
