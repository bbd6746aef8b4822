// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Scopes label the edges of the calling-context tree. A raw sample leaf
//! starts life as `Scope::Point` and is replaced by a chain of source-level
//! scopes once a classifier runs over it.

use crate::ids::{FunctionId, ModuleId};

/// A placeholder scope's reason for existing without a resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// The sampled address fell inside an unmapped or unknown region.
    Unknown(u64),
    /// A GPU kernel launch whose static structure has not been loaded.
    GpuKernel(u64),
    /// Any other value the source layer could not resolve.
    Other(u64),
}

/// A tagged location in the program's static structure, or a synthetic
/// marker used during context reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The single root of the calling-context tree.
    Global,
    /// An intentionally unresolved location (partial-unwind stitching).
    Unknown,
    /// A raw `(module, offset)` pair as read from a profile, not yet
    /// classified.
    Point { module: ModuleId, offset: u64 },
    /// A location the source layer could not resolve to any module.
    Placeholder(PlaceholderKind),
    /// A callable, produced by classification.
    Function(FunctionId),
    /// A source line, produced by classification.
    Line { file: crate::ids::FileId, line: u32 },
    /// A source loop header, produced by classification.
    Loop { file: crate::ids::FileId, line: u32 },
}

impl Scope {
    /// Whether this scope is still subject to classification.
    pub fn is_point(&self) -> bool {
        matches!(self, Scope::Point { .. })
    }

    /// Scope kinds the ID packer accepts as wire input. `function`, `line`,
    /// `loop`, and `global` never appear directly in packer traffic — they
    /// are produced only by classification on the receiving side.
    pub fn is_packable(&self) -> bool {
        matches!(self, Scope::Unknown | Scope::Placeholder(_) | Scope::Point { .. })
    }
}

/// How a child Context relates to its parent along one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// The child lexically encloses the parent's location (e.g. a line
    /// inside a function).
    Enclosure,
    /// The child is an inlined call site.
    InlinedCall,
    /// The child is an ordinary (non-inlined) call.
    Call,
}

/// The uniquing key for a Context's children: an edge label pairing a
/// [`Relation`] with a [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NestedScope {
    pub relation: Relation,
    pub scope: Scope,
}

impl NestedScope {
    pub fn new(relation: Relation, scope: Scope) -> Self {
        Self { relation, scope }
    }

    pub fn call(scope: Scope) -> Self {
        Self::new(Relation::Call, scope)
    }

    pub fn enclosure(scope: Scope) -> Self {
        Self::new(Relation::Enclosure, scope)
    }

    pub fn inlined_call(scope: Scope) -> Self {
        Self::new(Relation::InlinedCall, scope)
    }
}
