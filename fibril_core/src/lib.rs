// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental, interruptible tree reconciliation.
//!
//! `fibril_core` turns a previously committed tree and a newly described tree
//! into a minimal list of host mutations. Reconciliation is split into small
//! units of work that can be spread across many cooperative time slices; the
//! resulting mutations are applied in one uninterrupted commit. It is
//! `no_std` compatible (with `alloc`) and stores fibers in struct-of-arrays
//! form addressed by generational handles.
//!
//! # Architecture
//!
//! ```text
//!   mount / unmount / UpdateHandle::request_update
//!       │
//!       ▼
//!   UpdateQueue ──► SliceRequester::request_slice()
//!                          │
//!                 ┌────────┘  (host grants a slice)
//!                 ▼
//!   Engine::advance(budget, host)
//!       │  perform_unit × N   (begin ─► reconcile children ─► complete)
//!       ▼
//!   effect list on the root ──► commit ──► Host mutations ──► new current tree
//! ```
//!
//! **[`descriptor`]** and **[`props`]**: immutable node descriptions, their
//! reference-counted property payloads, component state, and host property
//! deltas.
//!
//! **[`component`]**: the [`Component`](component::Component) capability and
//! component type identity.
//!
//! **[`fiber`]**: struct-of-arrays storage for both tree generations, linked
//! by `alternate` indices.
//!
//! **[`queue`]**: the FIFO of root and component updates, and the
//! [`UpdateHandle`](queue::UpdateHandle) components keep.
//!
//! **[`scheduler`]**: [`Engine::advance`], the slice-bounded work loop.
//!
//! **[`host`]**: the [`Host`](host::Host) trait that rendering targets
//! implement.
//!
//! **[`slice`]**: budgets the host passes in and reports it gets back.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! work-loop instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-unit and
//!   per-effect events.
//! - `tracing` (disabled by default): Emits `tracing` records when passes are
//!   seeded, committed, and aborted.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

mod commit;
mod journal;
mod reconcile;

pub mod component;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod fiber;
pub mod host;
pub mod id;
pub mod props;
pub mod queue;
pub mod scheduler;
pub mod slice;
pub mod time;
pub mod trace;

pub use engine::{Engine, EngineConfig};
