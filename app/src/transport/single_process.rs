// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The single-process `RankTransport`: `world_size() == 1`, every collective
//! operation is a local no-op or identity. This is the only transport this
//! crate ships; a real multi-host deployment supplies its own
//! implementation backed by an actual collective-messaging library.

use profkit_domain::error::FatalError;
use profkit_domain::traits::RankTransport;

#[derive(Debug, Default)]
pub struct SingleProcessTransport;

impl SingleProcessTransport {
    pub fn new() -> Self {
        Self
    }
}

impl RankTransport for SingleProcessTransport {
    fn rank(&self) -> u32 {
        0
    }

    fn world_size(&self) -> u32 {
        1
    }

    fn send_to(&self, rank: u32, _tag: u32, _bytes: &[u8]) -> Result<(), FatalError> {
        Err(FatalError::Transport(format!("single-process transport has no peer rank {rank}")))
    }

    fn recv_from(&self, rank: u32, _tag: u32) -> Result<Vec<u8>, FatalError> {
        Err(FatalError::Transport(format!("single-process transport has no peer rank {rank}")))
    }

    fn broadcast_from(&self, root: u32, bytes: &[u8]) -> Result<Vec<u8>, FatalError> {
        if root != 0 {
            return Err(FatalError::Transport(format!("single-process transport has no rank {root}")));
        }
        Ok(bytes.to_vec())
    }

    fn barrier(&self) {}

    fn allreduce_sum(&self, value: u64) -> u64 {
        value
    }

    fn exscan_sum(&self, _value: u64) -> u64 {
        // Exclusive scan over a world of one rank: nothing precedes rank 0.
        0
    }
}
