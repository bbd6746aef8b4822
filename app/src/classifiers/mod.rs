// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Finalizers: the classification, identifier-assignment, path-resolution,
//! and derived-statistic collaborators bound to the pipeline at startup.
//!
//! The three classifiers (struct, logical, direct) implement
//! [`profkit_domain::traits::Finalizer::classify`] and are tried in that
//! order by [`crate::pipeline::router::ContextRouter`]. The identifier and
//! resolved-path finalizers don't classify scopes; their slot-fill work
//! (dense ids, resolved paths) is invoked directly by the router/engine
//! against the entities' own idempotent setters (`Context::set_id`,
//! `Module::set_resolved_path`, ...) rather than through trait dispatch,
//! since those setters already are the finalizer contract in this data
//! model.

pub mod call_graph;
pub mod derived_stats;
pub mod direct_classifier;
pub mod identifier_finalizer;
pub mod logical_classifier;
pub mod path_finalizer;
pub mod struct_classifier;

pub use call_graph::{resolve as resolve_call_graph, CallPath, FlowGraph, PathRole};
pub use derived_stats::DerivedStatsEvaluator;
pub use direct_classifier::{DirectClassifier, DwarfReader, NullDwarfReader};
pub use identifier_finalizer::IdentifierFinalizer;
pub use logical_classifier::LogicalClassifier;
pub use path_finalizer::PathFinalizer;
pub use struct_classifier::StructClassifier;
