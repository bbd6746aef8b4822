// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Dense, atomically-allocated identifiers for the entity kinds described in
//! the data model. Each id is a thin `u32` newtype so callers cannot pass a
//! `ModuleId` where a `ContextId` is expected.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Sentinel value used by [`ContextId`] for an id slot that has not yet been
/// assigned by the identifier finalizer.
pub const UNASSIGNED: u32 = u32::MAX;

macro_rules! dense_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(u32);

        impl $name {
            pub const UNASSIGNED: $name = $name(UNASSIGNED);

            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u32 {
                self.0
            }

            pub const fn is_assigned(self) -> bool {
                self.0 != UNASSIGNED
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::UNASSIGNED
            }
        }
    };
}

dense_id!(ModuleId);
dense_id!(FileId);
dense_id!(FunctionId);
dense_id!(ContextId);
dense_id!(MetricId);
dense_id!(ThreadId);

/// Atomic fetch-and-increment allocator for one entity kind's dense id
/// space. First access to an entity's id slot calls [`IdAllocator::next`],
/// which is the only place a given value is handed out.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self { next: AtomicU32::new(0) }
    }

    /// Atomically claims the next dense id.
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Atomically claims a contiguous block of `width` ids, returning the
    /// first one. Used by the Metric allocator, whose width is
    /// `max(partials.len, 1) * scopes.len`.
    pub fn next_block(&self, width: u32) -> u32 {
        debug_assert!(width >= 1);
        self.next.fetch_add(width, Ordering::SeqCst)
    }

    pub fn count(&self) -> u32 {
        self.next.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_hands_out_distinct_ids() {
        let alloc = IdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert_ne!(a, b);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn allocator_block_reserves_width() {
        let alloc = IdAllocator::new();
        let base = alloc.next_block(4);
        let next_single = alloc.next();
        assert_eq!(next_single, base + 4);
    }

    #[test]
    fn unassigned_is_distinguishable() {
        let id = ContextId::default();
        assert!(!id.is_assigned());
        let id = ContextId::new(0);
        assert!(id.is_assigned());
    }
}
