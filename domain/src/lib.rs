// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Layer
//!
//! Entities, value objects, and uniquing containers for calling-context-tree
//! profile processing: the data model that the source parser, classifier,
//! pipeline engine, and sparse database writer all build on.
//!
//! ## Module Structure
//!
//! - `ids` - dense, atomically-allocated entity identifiers
//! - `scope` / `identifier_tuple` - the Scope/NestedScope/Relation model and
//!   the hierarchical Thread key
//! - `dataclass` - `DataClass`/`ExtensionClass` bitsets
//! - `uniquing` - the generic locked uniquing-set container
//! - `userdata` - typed, lazily-initialized per-entity extension slots
//! - `entities` - Module, SourceFile, Function, Context, Metric,
//!   ExtraStatistic, Thread, ThreadTemporary
//! - `registry` - `EntityTables`, the single owner of every uniqued set and
//!   id allocator for a run
//! - `error` - `ProfError`/`FatalError`, the two error tiers of the run

pub mod dataclass;
pub mod entities;
pub mod error;
pub mod identifier_tuple;
pub mod ids;
pub mod registry;
pub mod scope;
pub mod traits;
pub mod uniquing;
pub mod userdata;

pub use dataclass::{DataClass, ExtensionClass};
pub use error::{FatalError, ProfError};
pub use identifier_tuple::{IdTupleInterpretation, IdTupleKind, IdentifierTuple, IdentifierTupleEntry};
pub use ids::{ContextId, FileId, FunctionId, IdAllocator, MetricId, ModuleId, ThreadId};
pub use registry::{EntityTables, SlotFactories};
pub use scope::{NestedScope, PlaceholderKind, Relation, Scope};
pub use traits::{Finalizer, HelpResult, RankTransport, Sink, Source, TimepointAction};
