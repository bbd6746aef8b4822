// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `profile.db` layout: a header, a fixed-width profile info table, a
//! variable-width id-tuple dictionary, and one context-indexed data blob
//! per profile.
//!
//! Per §4.6.3, the data blobs are not assembled into one contiguous `Vec`
//! and written in a single call: each profile's blob is appended to one of
//! two alternating [`OutBuffer`]s, and once a buffer crosses the flush
//! threshold it is handed a file region by [`SharedAccumulator::fetch_add`]
//! and written while the other buffer keeps accepting appends. A clustered
//! writer would have every rank racing the same accumulator; with the
//! single shipped [`RankTransport`] there is only ever one rank doing the
//! racing, but the reservation/flush/patch cycle is identical.

use std::path::Path;
use std::sync::Arc;

use profkit_domain::error::FatalError;
use profkit_domain::traits::RankTransport;

use super::format::*;
use super::sink::ProfileRecord;
use crate::concurrency::scoped_file::{SharedFile, SharedFileInstance};
use crate::concurrency::shared_accumulator::SharedAccumulator;

/// Bytes buffered per `OutBuffer` before it is flushed to its reserved file
/// region. The spec's writer buffers up to 1 GiB per rank; this
/// single-process writer uses a much smaller default so that a run with
/// more than a handful of profiles still exercises more than one
/// `fetch_add`/flush cycle.
const DEFAULT_FLUSH_THRESHOLD: usize = 1 << 20;

/// The file-offset cursor's [`SharedAccumulator`] tag. Distinct from
/// `cct_db`'s context-group-claim tag so the two collectives never cross
/// wires if a future `RankTransport` multiplexes by tag over one channel.
const OFFSET_CURSOR_TAG: u32 = 0xF00D_0001;

fn metric_id_u16(raw: u32) -> Result<u16, FatalError> {
    u16::try_from(raw).map_err(|_| FatalError::OutputUnusable(format!("metric id {raw} exceeds profile.db's 16-bit field")))
}

/// One profile's data blob staged in an [`OutBuffer`], waiting for its
/// header record to be patched once the buffer is flushed and the blob's
/// true file offset is known.
struct PendingProfile {
    record_pos: usize,
    local_offset: usize,
    num_vals: u64,
    num_nzctxs: u32,
}

/// One of the two buffers a rank alternates between while staging profile
/// data blobs. Appends go to whichever buffer is `active`; flushing drains
/// the other slot's pending content to disk and clears it for reuse.
struct DoubleBuffer {
    bytes: [Vec<u8>; 2],
    pending: [Vec<PendingProfile>; 2],
    active: usize,
}

impl DoubleBuffer {
    fn new() -> Self {
        Self { bytes: [Vec::new(), Vec::new()], pending: [Vec::new(), Vec::new()], active: 0 }
    }

    fn current_bytes(&mut self) -> &mut Vec<u8> {
        &mut self.bytes[self.active]
    }

    fn push_pending(&mut self, pending: PendingProfile) {
        self.pending[self.active].push(pending);
    }

    /// Swaps the active slot and returns the index that just went idle
    /// (ready to be flushed by the caller).
    fn swap(&mut self) -> usize {
        let idle = self.active;
        self.active = 1 - self.active;
        idle
    }

    fn take(&mut self, slot: usize) -> (Vec<u8>, Vec<PendingProfile>) {
        (std::mem::take(&mut self.bytes[slot]), std::mem::take(&mut self.pending[slot]))
    }
}

/// Reserves a file region for `bytes` via `cursor.fetch_add`, writes it,
/// then patches every pending profile's header record with the offset the
/// reservation actually landed at.
fn flush_slot(instance: &SharedFileInstance, cursor: &SharedAccumulator, header: &mut [u8], bytes: Vec<u8>, pending: Vec<PendingProfile>) -> Result<(), FatalError> {
    if bytes.is_empty() {
        return Ok(());
    }
    let reserved = cursor.fetch_add(bytes.len() as u64);
    instance.writeat(reserved, &bytes).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    for p in &pending {
        let data_offset = reserved + p.local_offset as u64;
        let record = &mut header[p.record_pos..p.record_pos + 52];
        record[32..40].copy_from_slice(&p.num_vals.to_be_bytes());
        record[40..44].copy_from_slice(&(p.num_nzctxs).to_be_bytes());
        record[44..52].copy_from_slice(&data_offset.to_be_bytes());
    }
    Ok(())
}

pub(crate) fn write(path: &Path, transport: &Arc<dyn RankTransport>, profiles: &[ProfileRecord]) -> Result<(), FatalError> {
    write_with_flush_threshold(path, transport, profiles, DEFAULT_FLUSH_THRESHOLD)
}

fn write_with_flush_threshold(path: &Path, transport: &Arc<dyn RankTransport>, profiles: &[ProfileRecord], flush_threshold: usize) -> Result<(), FatalError> {
    let mut header = Vec::new();

    header.extend_from_slice(PROFILE_DB_MAGIC);
    header.push(FORMAT_MAJOR);
    header.push(FORMAT_MINOR);
    push_u32(&mut header, profiles.len() as u32);
    push_u16(&mut header, 2); // num_sections: profile info, id tuples
    let prof_info_size_pos = header.len();
    push_u64(&mut header, 0);
    let prof_info_ptr_pos = header.len();
    push_u64(&mut header, 0);
    let id_tuple_size_pos = header.len();
    push_u64(&mut header, 0);
    let id_tuple_ptr_pos = header.len();
    push_u64(&mut header, 0);
    pad_buf_to_8(&mut header);

    let prof_info_ptr = header.len() as u64;
    let prof_info_size = (profiles.len() * 52) as u64;
    let record_positions: Vec<usize> = (0..profiles.len())
        .map(|_| {
            let pos = header.len();
            header.resize(header.len() + 52, 0);
            pos
        })
        .collect();
    pad_buf_to_8(&mut header);

    // Id-tuple section. §4.6.3: each rank computes the size of its own id
    // tuples and participates in an `exscan(sum)` to obtain its section
    // offset; the total size comes from `allreduce(sum)`. With one rank
    // the offset is always 0 and the total is the local size, but routing
    // through the collective calls keeps the offset arithmetic identical
    // in shape to a clustered run.
    let mut local_id_tuple_bytes = Vec::new();
    let mut local_id_tuple_local_offsets = Vec::with_capacity(profiles.len());
    for profile in profiles {
        local_id_tuple_local_offsets.push(local_id_tuple_bytes.len() as u64);
        push_u16(&mut local_id_tuple_bytes, profile.id_tuple.entries().len() as u16);
        for entry in profile.id_tuple.entries() {
            push_u16(&mut local_id_tuple_bytes, entry.kind as u16);
            push_u64(&mut local_id_tuple_bytes, entry.physical_index);
        }
    }
    let local_id_tuple_size = local_id_tuple_bytes.len() as u64;
    let rank_id_tuple_offset = transport.exscan_sum(local_id_tuple_size);
    let id_tuple_total_size = transport.allreduce_sum(local_id_tuple_size);

    let id_tuple_ptr = header.len() as u64;
    header.resize(header.len() + id_tuple_total_size as usize, 0);
    let local_start = (id_tuple_ptr + rank_id_tuple_offset) as usize;
    header[local_start..local_start + local_id_tuple_bytes.len()].copy_from_slice(&local_id_tuple_bytes);
    let id_tuple_ptrs: Vec<u64> = local_id_tuple_local_offsets.iter().map(|&p| id_tuple_ptr + rank_id_tuple_offset + p).collect();
    pad_buf_to_8(&mut header);

    for (i, ptr) in id_tuple_ptrs.iter().enumerate() {
        let record = &mut header[record_positions[i]..record_positions[i] + 52];
        record[0..8].copy_from_slice(&ptr.to_be_bytes());
        // metadata_ptr/spare1/spare2 (bytes 8..32) are left zero: reserved,
        // never populated by any known writer (SPEC_FULL.md open question).
    }

    let data_region_start = header.len() as u64;

    let file = SharedFile::open(transport.as_ref(), path, true).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    let instance = file.open_instance(true).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    let cursor = SharedAccumulator::new(Arc::clone(transport), OFFSET_CURSOR_TAG, data_region_start);

    let mut double_buffer = DoubleBuffer::new();
    for (i, profile) in profiles.iter().enumerate() {
        let buffer = double_buffer.current_bytes();
        let local_offset = buffer.len();
        let mut num_vals: u64 = 0;
        let mut ctx_index = Vec::with_capacity(profile.values.len() + 1);
        for (&ctx, by_metric) in &profile.values {
            ctx_index.push((ctx.get(), num_vals));
            for (&metric, &value) in by_metric {
                push_f64(buffer, value);
                push_u16(buffer, metric_id_u16(metric.get())?);
                num_vals += 1;
            }
        }
        ctx_index.push((CTX_INDEX_SENTINEL, num_vals));
        let num_nzctxs = profile.values.len() as u32;
        for (ctx_id, value_index) in ctx_index {
            push_u32(buffer, ctx_id);
            push_u64(buffer, value_index);
        }
        double_buffer.push_pending(PendingProfile { record_pos: record_positions[i], local_offset, num_vals, num_nzctxs });

        if double_buffer.current_bytes().len() >= flush_threshold {
            let idle = double_buffer.swap();
            let (bytes, pending) = double_buffer.take(idle);
            flush_slot(&instance, &cursor, &mut header, bytes, pending)?;
        }
    }
    // Flush whichever slot still holds the tail of the run; the other slot
    // was already drained the last time it went idle (or was never used),
    // so a single final flush is always enough.
    let idle = double_buffer.swap();
    let (bytes, pending) = double_buffer.take(idle);
    flush_slot(&instance, &cursor, &mut header, bytes, pending)?;

    let footer_offset = cursor.fetch_add(PROFILE_DB_FOOTER.len() as u64);
    instance.writeat(footer_offset, PROFILE_DB_FOOTER).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    let total_len = cursor.get();

    header[prof_info_size_pos..prof_info_size_pos + 8].copy_from_slice(&prof_info_size.to_be_bytes());
    header[prof_info_ptr_pos..prof_info_ptr_pos + 8].copy_from_slice(&prof_info_ptr.to_be_bytes());
    header[id_tuple_size_pos..id_tuple_size_pos + 8].copy_from_slice(&id_tuple_total_size.to_be_bytes());
    header[id_tuple_ptr_pos..id_tuple_ptr_pos + 8].copy_from_slice(&id_tuple_ptr.to_be_bytes());

    instance.set_len(total_len).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    instance.writeat(0, &header).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    instance.sync_all().map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
    Ok(())
}
