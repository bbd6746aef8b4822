// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! [`SparseDbSink`]: the concrete Sink that drives the writers in
//! [`super::profile_db`] and [`super::cct_db`].

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use profkit_domain::dataclass::{DataClass, ExtensionClass};
use profkit_domain::entities::{Metric, PartialStatistic, Thread, ThreadTemporary};
use profkit_domain::error::FatalError;
use profkit_domain::identifier_tuple::IdentifierTuple;
use profkit_domain::ids::{ContextId, MetricId, ThreadId};
use profkit_domain::registry::EntityTables;
use profkit_domain::traits::{RankTransport, Sink};

use crate::classifiers::DerivedStatsEvaluator;

use super::{cct_db, profile_db};

/// One profile's sparse (context, metric) → value map, collected from a
/// Thread's final [`ThreadTemporary`]. Profile index 0 is reserved for the
/// rank-0 summary profile, synthesized in [`SparseDbSink::write`]; real
/// threads occupy indices `1..=N` in ascending [`ThreadId`] order.
pub(crate) struct ProfileRecord {
    pub thread_id: Option<ThreadId>,
    pub id_tuple: IdentifierTuple,
    pub values: BTreeMap<ContextId, BTreeMap<MetricId, f64>>,
}

pub struct SparseDbSink {
    tables: Arc<EntityTables>,
    transport: Arc<dyn RankTransport>,
    output_dir: PathBuf,
    profiles: Mutex<Vec<ProfileRecord>>,
    derived: Arc<DerivedStatsEvaluator>,
    metrics_by_id: Mutex<HashMap<MetricId, Arc<Metric>>>,
}

impl SparseDbSink {
    pub fn new(tables: Arc<EntityTables>, transport: Arc<dyn RankTransport>, output_dir: PathBuf, derived: Arc<DerivedStatsEvaluator>) -> Self {
        Self { tables, transport, output_dir, profiles: Mutex::new(Vec::new()), derived, metrics_by_id: Mutex::new(HashMap::new()) }
    }
}

impl Sink for SparseDbSink {
    fn accepts(&self) -> DataClass {
        DataClass::METRICS.with_implied_prerequisites()
    }

    fn wavefronts(&self) -> DataClass {
        DataClass::METRICS
    }

    fn requires(&self) -> ExtensionClass {
        ExtensionClass::IDENTIFIER
    }

    fn notify_metric(&self, metric: &Arc<Metric>) {
        if let Some(base_id) = metric.base_id() {
            self.metrics_by_id.lock().unwrap().insert(base_id, Arc::clone(metric));
        }
        self.derived.register(metric);
    }

    fn notify_thread_final(&self, thread: &Arc<Thread>, temporary: &mut ThreadTemporary) {
        let cells = temporary.take();
        let mut values: BTreeMap<ContextId, BTreeMap<MetricId, f64>> = BTreeMap::new();
        let metrics_by_id = self.metrics_by_id.lock().unwrap();
        for (ctx, by_metric) in cells {
            let entry = values.entry(ctx).or_default();
            for (metric_id, accumulator) in by_metric {
                entry.insert(metric_id, accumulator.partial(PartialStatistic::Sum));
                if let Some(metric) = metrics_by_id.get(&metric_id) {
                    let mut derived_temp = ThreadTemporary::new();
                    self.derived.evaluate(ctx, metric, &accumulator, &mut derived_temp);
                    for (derived_id, derived_acc) in derived_temp.metrics_for(ctx) {
                        entry.insert(*derived_id, derived_acc.partial(PartialStatistic::Sum));
                    }
                }
            }
        }
        drop(metrics_by_id);
        self.profiles.lock().unwrap().push(ProfileRecord { thread_id: thread.id(), id_tuple: thread.id_tuple().clone(), values });
    }

    fn write(&self) -> Result<(), FatalError> {
        let mut profiles = self.profiles.lock().unwrap();
        profiles.sort_by_key(|p| p.thread_id.map(|id| id.get()).unwrap_or(u32::MAX));

        let mut summary: BTreeMap<ContextId, BTreeMap<MetricId, f64>> = BTreeMap::new();
        for profile in profiles.iter() {
            for (&ctx, by_metric) in &profile.values {
                let entry = summary.entry(ctx).or_default();
                for (&metric, &value) in by_metric {
                    *entry.entry(metric).or_insert(0.0) += value;
                }
            }
        }

        let mut all_profiles = Vec::with_capacity(profiles.len() + 1);
        if self.transport.rank() == 0 {
            all_profiles.push(ProfileRecord { thread_id: None, id_tuple: IdentifierTuple::new(Vec::new()), values: summary });
        }
        all_profiles.extend(profiles.drain(..));

        std::fs::create_dir_all(&self.output_dir).map_err(|e| FatalError::OutputUnusable(e.to_string()))?;
        let contexts = super::contexts_by_id(self.tables.root_context());

        profile_db::write(&self.output_dir.join("profile.db"), &self.transport, &all_profiles)?;
        cct_db::write(&self.output_dir.join("cct.db"), &self.transport, &contexts, &all_profiles)?;
        Ok(())
    }
}
