// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Bitsets tagging the categories of pipeline events ([`DataClass`]) and of
//! Finalizer-provided metadata ([`ExtensionClass`]).

use std::ops::{BitAnd, BitOr, BitOrAssign, Sub};

macro_rules! bitset {
    ($name:ident { $($bit:ident = $shift:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: $name = $name(0);
            $(pub const $bit: $name = $name(1 << $shift);)+

            pub const fn empty() -> Self { Self(0) }

            pub fn contains(self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }
        }

        impl BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name { $name(self.0 | rhs.0) }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) { self.0 |= rhs.0; }
        }

        impl BitAnd for $name {
            type Output = $name;
            fn bitand(self, rhs: $name) -> $name { $name(self.0 & rhs.0) }
        }

        impl Sub for $name {
            type Output = $name;
            fn sub(self, rhs: $name) -> $name { $name(self.0 & !rhs.0) }
        }
    };
}

bitset!(DataClass {
    ATTRIBUTES = 0,
    REFERENCES = 1,
    THREADS = 2,
    CONTEXTS = 3,
    METRICS = 4,
    TIMEPOINTS = 5,
});

impl DataClass {
    /// Rewrites a request by adding the prerequisites a data class implies:
    /// `metrics ⇒ contexts + threads + attributes`, `timepoints ⇒ contexts`,
    /// `contexts ⇒ references`.
    pub fn with_implied_prerequisites(self) -> DataClass {
        let mut out = self;
        if out.contains(DataClass::METRICS) {
            out.insert(DataClass::CONTEXTS | DataClass::THREADS | DataClass::ATTRIBUTES);
        }
        if out.contains(DataClass::TIMEPOINTS) {
            out.insert(DataClass::CONTEXTS);
        }
        if out.contains(DataClass::CONTEXTS) {
            out.insert(DataClass::REFERENCES);
        }
        out
    }

    /// The total wavefront order: `attributes → references → threads →
    /// contexts → (metrics, timepoints)`.
    pub const WAVEFRONT_ORDER: [DataClass; 5] =
        [DataClass::ATTRIBUTES, DataClass::REFERENCES, DataClass::THREADS, DataClass::CONTEXTS, DataClass::METRICS];
}

bitset!(ExtensionClass {
    CLASSIFICATION = 0,
    IDENTIFIER = 1,
    MSCOPE_IDENTIFIERS = 2,
    RESOLVED_PATH = 3,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_implies_contexts_threads_attributes_references() {
        let req = DataClass::METRICS.with_implied_prerequisites();
        assert!(req.contains(DataClass::CONTEXTS));
        assert!(req.contains(DataClass::THREADS));
        assert!(req.contains(DataClass::ATTRIBUTES));
        assert!(req.contains(DataClass::REFERENCES));
    }

    #[test]
    fn timepoints_implies_contexts_only_transitively_to_references() {
        let req = DataClass::TIMEPOINTS.with_implied_prerequisites();
        assert!(req.contains(DataClass::CONTEXTS));
        assert!(req.contains(DataClass::REFERENCES));
        assert!(!req.contains(DataClass::THREADS));
    }

    #[test]
    fn bitset_algebra() {
        let a = DataClass::ATTRIBUTES | DataClass::THREADS;
        let b = DataClass::THREADS;
        assert_eq!((a - b), DataClass::ATTRIBUTES);
        assert!((a & b).contains(DataClass::THREADS));
    }
}
