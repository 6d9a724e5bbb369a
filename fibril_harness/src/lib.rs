// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic host doubles and drive loops for fibril engines.
//!
//! - [`MemoryHost`]: an in-memory node tree that implements
//!   [`Host`](fibril_core::host::Host), logs every mutation in order, renders
//!   containers to a canonical string, and can fail a chosen call.
//! - [`SliceCounter`]: a [`SliceRequester`](fibril_core::queue::SliceRequester)
//!   that only counts requests.
//! - [`drive_to_idle`]: runs slices until the engine has nothing left to do.

#![no_std]

extern crate alloc;

mod drive;
mod memory;

pub use drive::{Drive, SliceCounter, drive_to_idle};
pub use memory::{HostCall, MemoryHost};
