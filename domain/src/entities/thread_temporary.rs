// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-thread accumulation workspace. A Source owns exactly one
//! [`ThreadTemporary`] per Thread it reads, accumulating sample values into
//! per-(context, metric) [`Accumulator`]s; the workspace is handed to sinks
//! at `notifyThreadFinal` and then cleared.

use super::metric::PartialStatistic;
use crate::ids::{ContextId, MetricId};
use std::collections::HashMap;

/// Running partial statistics for one (context, metric) cell.
#[derive(Debug, Clone, Copy)]
pub struct Accumulator {
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
    sum_sq: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self { sum: 0.0, count: 0, min: f64::INFINITY, max: f64::NEG_INFINITY, sum_sq: 0.0 }
    }

    /// Folds one sample value in. Zero-valued samples are discarded before
    /// they reach an accumulator (the source parser's responsibility), not
    /// here, so every call here represents a real contribution.
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum_sq += value * value;
    }

    pub fn partial(&self, kind: PartialStatistic) -> f64 {
        match kind {
            PartialStatistic::Sum => self.sum,
            PartialStatistic::Count => self.count as f64,
            PartialStatistic::Min => {
                if self.count == 0 {
                    0.0
                } else {
                    self.min
                }
            }
            PartialStatistic::Max => {
                if self.count == 0 {
                    0.0
                } else {
                    self.max
                }
            }
            PartialStatistic::SumSq => self.sum_sq,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct ThreadTemporary {
    cells: HashMap<ContextId, HashMap<MetricId, Accumulator>>,
}

impl ThreadTemporary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the (context, metric) accumulator, creating it on
    /// first touch. Zero values should be filtered by the caller before
    /// this is reached.
    pub fn add_value(&mut self, context: ContextId, metric: MetricId, value: f64) {
        self.cells.entry(context).or_default().entry(metric).or_insert_with(Accumulator::new).add(value);
    }

    pub fn accumulator(&self, context: ContextId, metric: MetricId) -> Option<&Accumulator> {
        self.cells.get(&context).and_then(|by_metric| by_metric.get(&metric))
    }

    pub fn contexts(&self) -> impl Iterator<Item = &ContextId> {
        self.cells.keys()
    }

    pub fn metrics_for(&self, context: ContextId) -> impl Iterator<Item = (&MetricId, &Accumulator)> {
        self.cells.get(&context).into_iter().flat_map(|m| m.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drains the workspace, matching the "cleared at ThreadFinal" lifecycle.
    pub fn take(&mut self) -> HashMap<ContextId, HashMap<MetricId, Accumulator>> {
        std::mem::take(&mut self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_tracks_partials() {
        let mut acc = Accumulator::new();
        acc.add(2.0);
        acc.add(4.0);
        assert_eq!(acc.partial(PartialStatistic::Sum), 6.0);
        assert_eq!(acc.partial(PartialStatistic::Count), 2.0);
        assert_eq!(acc.partial(PartialStatistic::Min), 2.0);
        assert_eq!(acc.partial(PartialStatistic::Max), 4.0);
        assert_eq!(acc.partial(PartialStatistic::SumSq), 20.0);
    }

    #[test]
    fn empty_accumulator_partials_are_zero_not_inf() {
        let acc = Accumulator::new();
        assert_eq!(acc.partial(PartialStatistic::Min), 0.0);
        assert_eq!(acc.partial(PartialStatistic::Max), 0.0);
    }

    #[test]
    fn thread_temporary_groups_by_context_then_metric() {
        let mut temp = ThreadTemporary::new();
        let ctx = ContextId::new(1);
        let metric = MetricId::new(0);
        temp.add_value(ctx, metric, 2.5);
        temp.add_value(ctx, metric, 2.5);
        let acc = temp.accumulator(ctx, metric).unwrap();
        assert_eq!(acc.partial(PartialStatistic::Sum), 5.0);
    }

    #[test]
    fn take_clears_and_returns_contents() {
        let mut temp = ThreadTemporary::new();
        temp.add_value(ContextId::new(0), MetricId::new(0), 1.0);
        let drained = temp.take();
        assert!(!drained.is_empty());
        assert!(temp.is_empty());
    }
}
