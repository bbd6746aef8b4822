// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Metrics and the partial statistics a Source accumulates for them.
//! A Metric is thawed while a Source configures it and frozen before any
//! Sink may observe it; no sink ever sees a thawed Metric.

use crate::ids::MetricId;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which value-kinds a Metric reports per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricScopeSet {
    pub point: bool,
    pub function: bool,
    pub execution: bool,
}

impl MetricScopeSet {
    pub fn count(self) -> usize {
        [self.point, self.function, self.execution].iter().filter(|b| **b).count()
    }
}

impl Default for MetricScopeSet {
    fn default() -> Self {
        Self { point: true, function: true, execution: true }
    }
}

/// One decomposition of a summary statistic into a per-sample contribution
/// that can be combined across samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialStatistic {
    Sum,
    Count,
    Min,
    Max,
    SumSq,
}

pub struct Metric {
    name: String,
    description: String,
    visible: bool,
    scopes: MetricScopeSet,
    partials: Vec<PartialStatistic>,
    frozen: AtomicBool,
    base_id: std::sync::OnceLock<MetricId>,
}

impl Metric {
    pub fn new(name: impl Into<String>, description: impl Into<String>, visible: bool, scopes: MetricScopeSet, partials: Vec<PartialStatistic>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            visible,
            scopes,
            partials,
            frozen: AtomicBool::new(false),
            base_id: std::sync::OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn scopes(&self) -> MetricScopeSet {
        self.scopes
    }

    pub fn partials(&self) -> &[PartialStatistic] {
        &self.partials
    }

    /// The id-space width this metric occupies: `max(partials.len, 1) *
    /// scopes.len`, leaving room for one sub-id per (partial, scope) pair.
    pub fn id_width(&self) -> u32 {
        (self.partials.len().max(1) * self.scopes.count().max(1)) as u32
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    pub fn base_id(&self) -> Option<MetricId> {
        self.base_id.get().copied()
    }

    pub fn set_base_id(&self, id: MetricId) -> MetricId {
        *self.base_id.get_or_init(|| id)
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("frozen", &self.is_frozen())
            .field("partials", &self.partials)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_width_accounts_for_partials_and_scopes() {
        let metric = Metric::new(
            "CPUTIME",
            "wall time",
            true,
            MetricScopeSet { point: true, function: true, execution: false },
            vec![PartialStatistic::Sum, PartialStatistic::Count],
        );
        assert_eq!(metric.id_width(), 4);
    }

    #[test]
    fn id_width_floors_partials_at_one() {
        let metric = Metric::new("X", "", true, MetricScopeSet { point: true, function: false, execution: false }, vec![]);
        assert_eq!(metric.id_width(), 1);
    }

    #[test]
    fn freeze_is_observable() {
        let metric = Metric::new("X", "", true, MetricScopeSet::default(), vec![PartialStatistic::Sum]);
        assert!(!metric.is_frozen());
        metric.freeze();
        assert!(metric.is_frozen());
    }
}
