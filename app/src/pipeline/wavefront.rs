// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The wavefront fence: a barrier over `DataClass::WAVEFRONT_ORDER`
//! (`attributes → references → threads → contexts → metrics`) that every
//! Source arrives at after finishing one stage's reads. The engine calls
//! [`WavefrontFence::arrive_and_wait`] once per Source per stage; the
//! thread that completes the barrier is told so via `is_leader`, matching
//! `std::sync::Barrier`'s leader convention, so the engine's driving loop
//! (not every worker) fires the Sink notifications exactly once.

use std::sync::{Condvar, Mutex};

use profkit_domain::dataclass::DataClass;

pub struct BarrierResult {
    pub is_leader: bool,
}

struct FenceState {
    arrived: usize,
    generation: u64,
}

/// A reusable multi-stage barrier: `total` participants must all call
/// `arrive_and_wait` before any of them proceeds past the fence, after
/// which the fence resets for the next stage.
pub struct WavefrontFence {
    total: usize,
    state: Mutex<FenceState>,
    cv: Condvar,
}

impl WavefrontFence {
    pub fn new(total: usize) -> Self {
        Self { total: total.max(1), state: Mutex::new(FenceState { arrived: 0, generation: 0 }), cv: Condvar::new() }
    }

    pub fn arrive_and_wait(&self) -> BarrierResult {
        let mut state = self.state.lock().unwrap();
        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.total {
            state.arrived = 0;
            state.generation += 1;
            self.cv.notify_all();
            return BarrierResult { is_leader: true };
        }

        while state.generation == generation {
            state = self.cv.wait(state).unwrap();
        }
        BarrierResult { is_leader: false }
    }
}

/// Walks `DataClass::WAVEFRONT_ORDER`, exposing only the stages whose bits
/// are present in `scheduled` — a run that never schedules `timepoints`
/// never fires a wavefront for it, since no Source declared it.
pub struct WavefrontSchedule {
    stages: Vec<DataClass>,
    cursor: usize,
}

impl WavefrontSchedule {
    pub fn new(scheduled: DataClass) -> Self {
        let stages = DataClass::WAVEFRONT_ORDER.into_iter().filter(|&stage| scheduled.contains(stage)).collect();
        Self { stages, cursor: 0 }
    }

    pub fn next(&mut self) -> Option<DataClass> {
        let stage = self.stages.get(self.cursor).copied();
        self.cursor += 1;
        stage
    }

    pub fn is_final(&self) -> bool {
        self.cursor >= self.stages.len()
    }
}
