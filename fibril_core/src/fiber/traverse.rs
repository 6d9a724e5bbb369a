// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::store::FiberStore;
use crate::id::{FiberId, INVALID};

/// An iterator over the direct children of a fiber.
///
/// Created by [`FiberStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a FiberStore,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a FiberStore, first: u32) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.sibling[idx as usize];
        Some(self.store.id_at(idx))
    }
}

/// A pre-order iterator over a fiber and everything below it.
///
/// Created by [`FiberStore::descendants`]. The walk never leaves the subtree:
/// siblings of the starting fiber are not visited.
#[derive(Debug)]
pub struct Descendants<'a> {
    store: &'a FiberStore,
    root: u32,
    next: u32,
}

impl<'a> Descendants<'a> {
    pub(crate) fn new(store: &'a FiberStore, root: u32) -> Self {
        Self {
            store,
            root,
            next: root,
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let idx = self.next;
        if idx == INVALID {
            return None;
        }
        let s = self.store;
        self.next = if s.child[idx as usize] != INVALID {
            s.child[idx as usize]
        } else {
            // Climb until a sibling is found or the walk is back at the root.
            let mut n = idx;
            loop {
                if n == self.root {
                    break INVALID;
                }
                let sib = s.sibling[n as usize];
                if sib != INVALID {
                    break sib;
                }
                n = s.parent[n as usize];
                if n == INVALID {
                    break INVALID;
                }
            }
        };
        Some(s.id_at(idx))
    }
}
