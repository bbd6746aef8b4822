// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The sparse database writer (C6): a [`Sink`](profkit_domain::traits::Sink)
//! that accumulates every Thread's final metric values and, at `write()`,
//! produces `profile.db` (context-indexed, per profile) and `cct.db`
//! (profile-indexed, per context) — the pair of binary files a downstream
//! viewer loads.
//!
//! [`profile_db::write`] and [`cct_db::write`] both follow §4.6.3's writing
//! protocol: file regions are reserved through a
//! [`crate::concurrency::shared_accumulator::SharedAccumulator`]'s
//! `fetch_add`, `profile.db`'s data blobs stream through a double-buffered
//! flush cycle, and `cct.db`'s contexts are partitioned into byte-bounded
//! groups (the first `world_size` claimed statically, the rest dynamically
//! off a second accumulator) and assembled with a heap-based transpose
//! merge. With only [`crate::transport::SingleProcessTransport`] shipped,
//! every accumulator and collective call resolves locally and there is only
//! ever one rank's worth of groups — the shape of the protocol is identical
//! to a clustered run, just with `world_size == 1`.

mod cct_db;
mod format;
mod profile_db;
mod sink;

pub use sink::SparseDbSink;

use profkit_domain::entities::Context;
use std::sync::Arc;

/// Flattens the calling-context tree into a `Vec` ordered by ascending
/// `ContextId`, the order both `profile.db`'s ctx-index entries and
/// `cct.db`'s context info table require.
fn contexts_by_id(root: &Arc<Context>) -> Vec<Arc<Context>> {
    let mut all = Vec::new();
    let mut stack = vec![Arc::clone(root)];
    while let Some(ctx) = stack.pop() {
        stack.extend(ctx.children());
        all.push(ctx);
    }
    all.sort_by_key(|ctx| ctx.id().map(|id| id.get()).unwrap_or(u32::MAX));
    all
}
