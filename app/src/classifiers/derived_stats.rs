// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Derived-statistic evaluation. `sum`/`min`/`max` are raw [`Accumulator`]
//! partials and need no formula; `mean`/`stddev`/`cfvar`, when enabled by
//! [`StatKinds`], are registered as their own derived [`Metric`]s (each
//! with its own dense id) the first time a base metric is seen, then
//! evaluated against that base metric's accumulator and folded back into a
//! [`ThreadTemporary`] under the derived metric's id.

use parking_lot::Mutex;
use profkit_bootstrap::config::StatKinds;
use profkit_domain::entities::{Accumulator, ExtraStatistic, Formula, Metric, ThreadTemporary};
use profkit_domain::ids::{ContextId, MetricId};
use profkit_domain::registry::EntityTables;
use std::collections::HashMap;
use std::sync::Arc;

use crate::classifiers::identifier_finalizer::IdentifierFinalizer;

pub struct DerivedStatsEvaluator {
    tables: Arc<EntityTables>,
    identifiers: Arc<IdentifierFinalizer>,
    stats: StatKinds,
    registrations: Mutex<HashMap<MetricId, Vec<(Arc<Metric>, Formula)>>>,
}

impl DerivedStatsEvaluator {
    pub fn new(tables: Arc<EntityTables>, identifiers: Arc<IdentifierFinalizer>, stats: StatKinds) -> Self {
        Self { tables, identifiers, stats, registrations: Mutex::new(HashMap::new()) }
    }

    fn enabled_kinds(&self) -> Vec<(&'static str, Formula)> {
        let mut kinds = Vec::new();
        if self.stats.mean {
            kinds.push(("mean", ExtraStatistic::mean()));
        }
        if self.stats.stddev {
            kinds.push(("stddev", ExtraStatistic::stddev()));
        }
        if self.stats.cfvar {
            kinds.push(("cfvar", ExtraStatistic::cfvar()));
        }
        kinds
    }

    /// Registers this run's enabled derived metrics for `base`, idempotent
    /// per base metric. Must be called after `base`'s own dense id has been
    /// assigned.
    pub fn register(&self, base: &Arc<Metric>) -> Vec<Arc<Metric>> {
        let base_id = base.base_id().expect("base metric must carry a dense id before derived-stat registration");
        if let Some(existing) = self.registrations.lock().get(&base_id) {
            return existing.iter().map(|(metric, _)| Arc::clone(metric)).collect();
        }

        let mut entries = Vec::new();
        for (suffix, formula) in self.enabled_kinds() {
            let key = format!("{}.{suffix}", base.name());
            let description = format!("derived {suffix} of {}", base.name());
            let name = key.clone();
            let scopes = base.scopes();
            let visible = base.is_visible();
            let (metric, inserted) =
                self.tables.get_or_insert_metric(key, move || Metric::new(name, description, visible, scopes, Vec::new()));
            if inserted {
                self.identifiers.assign_metric(&metric);
                metric.freeze();
            }
            entries.push((metric, formula));
        }

        let result = entries.iter().map(|(metric, _)| Arc::clone(metric)).collect();
        self.registrations.lock().insert(base_id, entries);
        result
    }

    /// Evaluates every derived metric registered against `base` over
    /// `accumulator`, writing each result into `temp` at `context` under
    /// the derived metric's own id.
    pub fn evaluate(&self, context: ContextId, base: &Arc<Metric>, accumulator: &Accumulator, temp: &mut ThreadTemporary) {
        let Some(base_id) = base.base_id() else { return };
        let derived = self.registrations.lock().get(&base_id).cloned();
        let Some(derived) = derived else { return };
        for (metric, formula) in derived {
            let Some(metric_id) = metric.base_id() else { continue };
            let value = formula.eval(&|p| accumulator.partial(p));
            temp.add_value(context, metric_id, value);
        }
    }
}
