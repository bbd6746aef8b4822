// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concurrency primitives the pipeline engine and sparse DB writer build on:
//! a bounded/resettable parallel-for, a single-shot guard, a shared
//! accumulator over distributed memory, and scoped shared-file access.

pub mod once;
pub mod parallel_for;
pub mod scoped_file;
pub mod shared_accumulator;

pub use once::Once;
pub use parallel_for::{ParallelForEach, ResettableParallelForEach};
pub use scoped_file::{SharedFile, SharedFileInstance};
pub use shared_accumulator::SharedAccumulator;
