// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # profkit
//!
//! A parallel calling-context-tree profile processing pipeline: reads
//! sampling-profiler measurement files, classifies their raw `(module,
//! offset)` samples against program structure, and writes the sparse
//! `profile.db`/`cct.db` databases a downstream viewer loads.
//!
//! ## Architecture
//!
//! The domain layer (`profkit-domain`) owns the calling-context-tree data
//! model: entities, dense identifiers, uniquing, and the `Source`/`Sink`/
//! `Finalizer`/`RankTransport` trait contracts. This crate provides the
//! concrete collaborators bound to those contracts at startup:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      pipeline engine (C4)                     │
//! │   binds sources/sinks/finalizers, drives the wavefronts       │
//! └───────────┬─────────────────────────────────────┬─────────────┘
//!             │                                     │
//! ┌───────────┴───────────┐           ┌─────────────┴─────────────┐
//! │   source (C2)         │           │   classifiers (C3)        │
//! │   measurement-format   │           │   struct / logical /      │
//! │   reader + trace       │           │   direct classification,  │
//! │   companion            │           │   identifiers, paths,     │
//! │                        │           │   derived statistics      │
//! └───────────┬───────────┘           └─────────────┬─────────────┘
//!             │                                     │
//! ┌───────────┴─────────────────────────────────────┴─────────────┐
//! │                      sparsedb (C6)                            │
//! │        profile.db / cct.db sparse database writer             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `packer`/`transport` (C5) let a run span multiple distributed ranks:
//! rank 0 computes identifiers and broadcasts them so every rank agrees on
//! `(Context, Scope) -> id` without re-deriving it. `concurrency` (C7)
//! supplies the bounded worker pool, shared accumulator, and shared-file
//! primitives the engine and sparse DB writer build on.
//!
//! `presentation` wires the `profkit-bootstrap` CLI/config layer to this
//! crate's pipeline; `application` holds the use cases (`process`,
//! `validate-config`, ...) the CLI dispatches to.

pub mod application;
pub mod classifiers;
pub mod concurrency;
pub mod packer;
pub mod pipeline;
pub mod presentation;
pub mod source;
pub mod sparsedb;
pub mod transport;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory
