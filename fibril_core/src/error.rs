// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types surfaced by [`Engine::advance`](crate::Engine::advance).
//!
//! Structural mismatches between renders are never errors. Only two things
//! can fail a pass: a component's render, and a host mutation.

use alloc::string::String;
use core::fmt;

/// A host mutation operation, for error reporting and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostOp {
    /// [`Host::create_handle`](crate::host::Host::create_handle).
    CreateHandle,
    /// [`Host::set_properties`](crate::host::Host::set_properties).
    SetProperties,
    /// [`Host::insert_child`](crate::host::Host::insert_child).
    InsertChild,
    /// [`Host::insert_before`](crate::host::Host::insert_before).
    InsertBefore,
    /// [`Host::replace_child`](crate::host::Host::replace_child).
    ReplaceChild,
    /// [`Host::remove_child`](crate::host::Host::remove_child).
    RemoveChild,
}

impl HostOp {
    /// Returns the operation name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateHandle => "create_handle",
            Self::SetProperties => "set_properties",
            Self::InsertChild => "insert_child",
            Self::InsertBefore => "insert_before",
            Self::ReplaceChild => "replace_child",
            Self::RemoveChild => "remove_child",
        }
    }
}

/// A host mutation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostError {
    /// Which operation failed.
    pub op: HostOp,
    /// Host-supplied detail.
    pub message: String,
}

impl HostError {
    /// Creates a host error.
    #[must_use]
    pub fn new(op: HostOp, message: impl Into<String>) -> Self {
        Self {
            op,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host {} failed: {}", self.op.name(), self.message)
    }
}

impl core::error::Error for HostError {}

/// A component's render failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderError {
    /// Component-supplied detail.
    pub message: String,
}

impl RenderError {
    /// Creates a render error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl core::error::Error for RenderError {}

/// A pass was aborted.
///
/// In both cases the container's committed tree is left as it was before the
/// pass started, and the failed update is not retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// A component's render failed during reconciliation.
    Render {
        /// Type name of the failing component.
        component: &'static str,
        /// The component's error.
        error: RenderError,
    },
    /// A host mutation failed, during reconciliation (handle creation) or
    /// commit. A commit failure may leave the host tree partially mutated.
    Host(HostError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render { component, error } => {
                write!(f, "render of {component} failed: {error}")
            }
            Self::Host(error) => write!(f, "{error}"),
        }
    }
}

impl core::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Render { error, .. } => Some(error),
            Self::Host(error) => Some(error),
        }
    }
}

impl From<HostError> for EngineError {
    fn from(error: HostError) -> Self {
        Self::Host(error)
    }
}
