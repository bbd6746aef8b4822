// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Identifier packing and unpacking (C5). When a run spans multiple
//! distributed ranks, rank 0 runs the full pipeline against its own
//! Sources, records every context-expansion decision plus the module/file/
//! function/metric tables behind them into one blob, and broadcasts it.
//! Every other rank feeds the blob to a [`ContextUnpacker`] bound as a
//! [`profkit_domain::traits::Finalizer`], reproducing rank 0's
//! `(Context, Scope) -> id` assignment exactly rather than re-deriving it.

pub mod encoding;
pub mod packer;
pub mod unpacker;

pub use packer::ContextPacker;
pub use unpacker::ContextUnpacker;
