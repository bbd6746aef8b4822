// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `cct.db` layout: a header, a fixed-width context info table sorted by
//! ctx-id, and one profile-indexed data blob per context — the
//! context-major transpose of every [`ProfileRecord`].
//!
//! Built per §4.6.3's "CCT computation": per-context byte offsets are
//! computed up front from per-context `(nzval, nzmid)` counts combined
//! across ranks with `allreduce_sum`, contexts are partitioned into
//! contiguous byte-bounded groups, groups beyond the first `world_size` are
//! claimed dynamically off a [`SharedAccumulator`], and each owned group is
//! assembled with a heap-based k-way merge over every profile's sorted
//! `(context-id, value)` entries — not a single whole-run `BTreeMap`
//! transpose, since a clustered writer never holds every profile's data at
//! once.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::path::Path;
use std::sync::Arc;

use profkit_domain::entities::Context;
use profkit_domain::error::FatalError;
use profkit_domain::ids::{ContextId, MetricId};
use profkit_domain::traits::RankTransport;

use super::format::*;
use super::sink::ProfileRecord;
use crate::concurrency::scoped_file::SharedFile;
use crate::concurrency::shared_accumulator::SharedAccumulator;

/// The context-group-claim [`SharedAccumulator`]'s tag. The first
/// `world_size` groups are assigned statically (one per rank); this
/// accumulator hands out every group after that.
const GROUP_CLAIM_TAG: u32 = 0xF00D_0002;

/// Upper bound on a context group's combined byte size, matching §4.6.3's
/// `min(3 GiB, total/(3·ranks))`.
const MAX_GROUP_BYTES: u64 = 3 * 1024 * 1024 * 1024;

fn metric_id_u16(raw: u32) -> Result<u16, FatalError> {
    u16::try_from(raw).map_err(|_| FatalError::OutputUnusable(format!("metric id {raw} exceeds cct.db's 16-bit field")))
}

/// Bytes occupied by one (value, profile-index) pair plus the trailing
/// (metric-id, value-index) sentinel entry's contribution per distinct
/// metric — the per-context blob size formula from §4.6.3.
fn context_blob_size(nzval: u64, nzmid: u64) -> u64 {
    nzval * 12 + (nzmid + 1) * 10
}

/// Splits `sizes` (one entry per context, in ascending ctx-id order) into
/// contiguous `[start, end)` index ranges, each holding at most
/// `byte_limit` bytes. A single context heavier than `byte_limit` still
/// gets its own group rather than being dropped.
fn partition_into_groups(sizes: &[u64], byte_limit: u64) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    if sizes.is_empty() {
        return groups;
    }
    let mut start = 0;
    let mut acc = 0u64;
    for (i, &sz) in sizes.iter().enumerate() {
        if acc > 0 && acc + sz > byte_limit {
            groups.push((start, i));
            start = i;
            acc = 0;
        }
        acc += sz;
    }
    groups.push((start, sizes.len()));
    groups
}

/// One profile's cursor over its `(context-id, metric values)` entries
/// restricted to a group's `[first, last]` ctx-id range, ascending.
struct ProfileCursor<'a> {
    profile_idx: u32,
    entries: Vec<(u32, &'a BTreeMap<MetricId, f64>)>,
    pos: usize,
}

/// Heap-based k-way merge of every profile's sorted context entries within
/// one group, assembling each touched context's `metric -> profile ->
/// value` block. Mirrors §4.6.3's "maintain a min-heap of `(ctx-id,
/// profile-idx, cursor)` tuples ... pop entries with equal ctx-id to
/// assemble one CtxMetricBlock".
fn heap_merge_group(profiles: &[ProfileRecord], group_first: u32, group_last: u32) -> BTreeMap<u32, BTreeMap<MetricId, BTreeMap<u32, f64>>> {
    let mut cursors: Vec<ProfileCursor> = profiles
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let entries: Vec<(u32, &BTreeMap<MetricId, f64>)> =
                p.values.range(ContextId::new(group_first)..=ContextId::new(group_last)).map(|(&ctx, by_metric)| (ctx.get(), by_metric)).collect();
            ProfileCursor { profile_idx: idx as u32, entries, pos: 0 }
        })
        .collect();

    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    for (i, cursor) in cursors.iter().enumerate() {
        if let Some(&(ctx_id, _)) = cursor.entries.first() {
            heap.push(Reverse((ctx_id, i)));
        }
    }

    let mut result: BTreeMap<u32, BTreeMap<MetricId, BTreeMap<u32, f64>>> = BTreeMap::new();
    while let Some(&Reverse((ctx_id, _))) = heap.peek() {
        let mut matched = Vec::new();
        while let Some(&Reverse((id, idx))) = heap.peek() {
            if id != ctx_id {
                break;
            }
            heap.pop();
            matched.push(idx);
        }

        let ctx_entry = result.entry(ctx_id).or_default();
        for idx in matched {
            let cursor = &mut cursors[idx];
            let (_, by_metric) = cursor.entries[cursor.pos];
            for (&metric, &value) in by_metric {
                ctx_entry.entry(metric).or_default().insert(cursor.profile_idx, value);
            }
            cursor.pos += 1;
            if let Some(&(next_ctx, _)) = cursor.entries.get(cursor.pos) {
                heap.push(Reverse((next_ctx, idx)));
            }
        }
    }
    result
}

pub(crate) fn write(path: &Path, transport: &Arc<dyn RankTransport>, contexts: &[Arc<Context>], profiles: &[ProfileRecord]) -> Result<(), FatalError> {
    let ctx_ids: Vec<u32> = contexts.iter().map(|c| c.id().expect("context ids are assigned before any Sink observes a Context").get()).collect();

    // One pass over every profile's sparse map to get each context's
    // distinct-metric count and total (profile, metric) value count —
    // the `local_nzval_cnt`/`local_nzmid_cnt` arrays of §4.6.3.
    let mut nzval_cnt: HashMap<u32, u64> = HashMap::new();
    let mut nzmid_set: HashMap<u32, std::collections::BTreeSet<MetricId>> = HashMap::new();
    for profile in profiles {
        for (&ctx, by_metric) in &profile.values {
            *nzval_cnt.entry(ctx.get()).or_insert(0) += by_metric.len() as u64;
            nzmid_set.entry(ctx.get()).or_default().extend(by_metric.keys().copied());
        }
    }

    let sizes: Vec<u64> = ctx_ids
        .iter()
        .map(|&id| {
            let nzval = nzval_cnt.get(&id).copied().unwrap_or(0);
            let nzmid = nzmid_set.get(&id).map(|s| s.len() as u64).unwrap_or(0);
            context_blob_size(nzval, nzmid)
        })
        .collect();

    let mut header = Vec::new();
    header.extend_from_slice(CCT_DB_MAGIC);
    header.push(FORMAT_MAJOR);
    header.push(FORMAT_MINOR);
    push_u32(&mut header, contexts.len() as u32);
    push_u16(&mut header, 1); // num_sections: context info
    let ctx_info_size_pos = header.len();
    push_u64(&mut header, 0);
    let ctx_info_ptr_pos = header.len();
    push_u64(&mut header, 0);
    pad_buf_to_8(&mut header);

    let ctx_info_ptr = header.len() as u64;
    let ctx_info_size = (contexts.len() * 22) as u64;
    header.resize(header.len() + contexts.len() * 22, 0);
    pad_buf_to_8(&mut header);

    // §4.6.3 step 1: `ctx_off[i]` is a deterministic prefix sum over every
    // context's *combined* (all-ranks) size, each combined via
    // `allreduce_sum` — with one rank this is the identity, but the call
    // keeps the arithmetic shaped the way a clustered writer needs it.
    let data_region_start = header.len() as u64;
    let mut ctx_off = Vec::with_capacity(sizes.len());
    let mut running = data_region_start;
    for &sz in &sizes {
        let combined = transport.allreduce_sum(sz);
        ctx_off.push(running);
        running += combined;
    }
    let total_len = running;

    for (i, &ctx_id) in ctx_ids.iter().enumerate() {
        let nzval = nzval_cnt.get(&ctx_id).copied().unwrap_or(0);
        let nzmid = nzmid_set.get(&ctx_id).map(|s| s.len() as u16).unwrap_or(0);
        let record_pos = ctx_info_ptr as usize + i * 22;
        let record = &mut header[record_pos..record_pos + 22];
        record[0..4].copy_from_slice(&ctx_id.to_be_bytes());
        record[4..12].copy_from_slice(&nzval.to_be_bytes());
        record[12..14].copy_from_slice(&nzmid.to_be_bytes());
        record[14..22].copy_from_slice(&ctx_off[i].to_be_bytes());
    }

    header[ctx_info_size_pos..ctx_info_size_pos + 8].copy_from_slice(&ctx_info_size.to_be_bytes());
    header[ctx_info_ptr_pos..ctx_info_ptr_pos + 8].copy_from_slice(&ctx_info_ptr.to_be_bytes());

    let mut buf = vec![0u8; (total_len + CCT_DB_FOOTER.len() as u64) as usize];
    buf[..header.len()].copy_from_slice(&header);

    // §4.6.3 step 2-3: partition into byte-bounded groups; the first
    // `world_size` are static (rank r owns group r), the rest are claimed
    // dynamically off `GROUP_CLAIM_TAG`.
    let world_size = transport.world_size();
    let rank = transport.rank();
    let byte_limit = std::cmp::min(MAX_GROUP_BYTES, total_len.saturating_div(3 * world_size.max(1) as u64)).max(1);
    let groups = partition_into_groups(&sizes, byte_limit);

    let mut owned_groups: Vec<usize> = Vec::new();
    if (rank as usize) < groups.len() {
        owned_groups.push(rank as usize);
    }
    let claim = SharedAccumulator::new(Arc::clone(transport), GROUP_CLAIM_TAG, world_size as u64);
    loop {
        let next = claim.fetch_add(1) as usize;
        if next >= groups.len() {
            break;
        }
        owned_groups.push(next);
    }

    for group_idx in owned_groups {
        let (start, end) = groups[group_idx];
        if start == end {
            continue;
        }
        let group_first = ctx_ids[start];
        let group_last = ctx_ids[end - 1];
        let merged = heap_merge_group(profiles, group_first, group_last);

        for i in start..end {
            let ctx_id = ctx_ids[i];
            let offset = ctx_off[i] as usize;
            let empty = BTreeMap::new();
            let by_metric = merged.get(&ctx_id).unwrap_or(&empty);

            let mut blob = Vec::new();
            let mut num_vals: u64 = 0;
            let mut metric_index = Vec::with_capacity(by_metric.len() + 1);
            for (&metric, by_profile) in by_metric {
                metric_index.push((metric_id_u16(metric.get())?, num_vals));
                for (&prof_idx, &value) in by_profile {
                    push_f64(&mut blob, value);
                    push_u32(&mut blob, prof_idx);
                    num_vals += 1;
                }
            }
            metric_index.push((METRIC_INDEX_SENTINEL, num_vals));
            for (metric_id, value_index) in metric_index {
                push_u16(&mut blob, metric_id);
                push_u64(&mut blob, value_index);
            }

            buf[offset..offset + blob.len()].copy_from_slice(&blob);
        }
    }

    buf[total_len as usize..total_len as usize + CCT_DB_FOOTER.len()].copy_from_slice(CCT_DB_FOOTER);

    let file = SharedFile::open(transport.as_ref(), path, true).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    let instance = file.open_instance(true).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    instance.set_len(buf.len() as u64).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    instance.writeat(0, &buf).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    instance.sync_all().map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SingleProcessTransport;
    use profkit_domain::identifier_tuple::IdentifierTuple;
    use profkit_domain::ids::ThreadId;
    use profkit_domain::registry::SlotFactories;

    #[test]
    fn writes_magic_and_footer_and_covers_every_context() {
        let root = Context::root(SlotFactories::default().context.create());
        root.set_id(ContextId::new(0));

        let mut values = BTreeMap::new();
        let mut by_metric = BTreeMap::new();
        by_metric.insert(MetricId::new(0), 4.0);
        values.insert(ContextId::new(0), by_metric);
        let profiles = vec![ProfileRecord { thread_id: Some(ThreadId::new(0)), id_tuple: IdentifierTuple::from_legacy_scalars(1, 0, 0, 7), values }];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cct.db");
        let transport: Arc<dyn RankTransport> = Arc::new(SingleProcessTransport::new());
        write(&path, &transport, &[root], &profiles).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..10], CCT_DB_MAGIC);
        assert_eq!(&bytes[bytes.len() - 8..], CCT_DB_FOOTER);
    }

    #[test]
    fn empty_context_set_has_zero_vals_and_zero_nzmids() {
        let root = Context::root(SlotFactories::default().context.create());
        root.set_id(ContextId::new(0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cct.db");
        let transport: Arc<dyn RankTransport> = Arc::new(SingleProcessTransport::new());
        write(&path, &transport, &[Arc::clone(&root)], &[]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let ctx_info_ptr = u64::from_be_bytes(bytes[26..34].try_into().unwrap());
        let record = &bytes[ctx_info_ptr as usize..ctx_info_ptr as usize + 22];
        let num_vals = u64::from_be_bytes(record[4..12].try_into().unwrap());
        let num_nzmids = u16::from_be_bytes(record[12..14].try_into().unwrap());
        assert_eq!(num_vals, 0);
        assert_eq!(num_nzmids, 0);

        let data_offset = u64::from_be_bytes(record[14..22].try_into().unwrap());
        let sentinel_metric = u16::from_be_bytes(bytes[data_offset as usize..data_offset as usize + 2].try_into().unwrap());
        assert_eq!(sentinel_metric, METRIC_INDEX_SENTINEL);
    }

    #[test]
    fn many_contexts_are_fully_covered_across_multiple_groups() {
        let root = Context::root(SlotFactories::default().context.create());
        root.set_id(ContextId::new(0));

        let mut contexts = vec![Arc::clone(&root)];
        let mut profiles = Vec::new();
        for i in 1..20u32 {
            let mut values = BTreeMap::new();
            let mut by_metric = BTreeMap::new();
            by_metric.insert(MetricId::new(0), i as f64);
            values.insert(ContextId::new(i), by_metric);
            profiles.push(ProfileRecord { thread_id: Some(ThreadId::new(i)), id_tuple: IdentifierTuple::from_legacy_scalars(1, 0, i as u64, 7), values });

            let child = Context::root(SlotFactories::default().context.create());
            child.set_id(ContextId::new(i));
            contexts.push(child);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cct.db");
        let transport: Arc<dyn RankTransport> = Arc::new(SingleProcessTransport::new());
        write(&path, &transport, &contexts, &profiles).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let num_ctx = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
        assert_eq!(num_ctx, 20);

        let ctx_info_ptr = u64::from_be_bytes(bytes[26..34].try_into().unwrap());
        for i in 1..20usize {
            let record_pos = ctx_info_ptr as usize + i * 22;
            let record = &bytes[record_pos..record_pos + 22];
            let num_vals = u64::from_be_bytes(record[4..12].try_into().unwrap());
            assert_eq!(num_vals, 1, "context {i} should carry its one sample");
        }
    }
}
