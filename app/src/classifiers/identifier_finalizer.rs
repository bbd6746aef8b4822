// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Dense identifier assignment. First access to an entity's id slot
//! atomically fetches a new id from the entity kind's allocator in
//! [`EntityTables`]; every later access returns the same id, since the
//! underlying `Context`/`Thread`/`Metric` setters are themselves
//! idempotent.

use profkit_domain::dataclass::ExtensionClass;
use profkit_domain::entities::{Context, Metric, Thread};
use profkit_domain::ids::{ContextId, MetricId, ThreadId};
use profkit_domain::registry::EntityTables;
use profkit_domain::traits::Finalizer;
use std::sync::Arc;

pub struct IdentifierFinalizer {
    tables: Arc<EntityTables>,
}

impl IdentifierFinalizer {
    pub fn new(tables: Arc<EntityTables>) -> Self {
        Self { tables }
    }

    pub fn assign_context(&self, context: &Context) -> ContextId {
        context.set_id(ContextId::new(self.tables.context_ids.next()))
    }

    pub fn assign_thread(&self, thread: &Thread) -> ThreadId {
        thread.set_id(ThreadId::new(self.tables.thread_ids.next()))
    }

    /// Allocates `metric`'s id-space block (`max(partials, 1) * scopes`) and
    /// assigns its base id. The function-variant and execution-variant ids
    /// referenced by SPEC_FULL.md's `ScopedIdentifiers` are offsets within
    /// this block, computed by the caller from `metric.scopes()`.
    pub fn assign_metric(&self, metric: &Metric) -> MetricId {
        let width = metric.id_width();
        let base = self.tables.metric_ids.next_block(width);
        metric.set_base_id(MetricId::new(base))
    }
}

impl Finalizer for IdentifierFinalizer {
    fn provides(&self) -> ExtensionClass {
        ExtensionClass::IDENTIFIER | ExtensionClass::MSCOPE_IDENTIFIERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profkit_domain::entities::{MetricScopeSet, PartialStatistic};
    use profkit_domain::identifier_tuple::IdentifierTuple;
    use profkit_domain::registry::SlotFactories;
    use profkit_domain::userdata::SlotRegistry;

    #[test]
    fn context_id_assignment_is_idempotent() {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let finalizer = IdentifierFinalizer::new(Arc::clone(&tables));
        let root = tables.root_context();
        let a = finalizer.assign_context(root);
        let b = finalizer.assign_context(root);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_threads_get_distinct_ids() {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let finalizer = IdentifierFinalizer::new(Arc::clone(&tables));
        let t1 = Thread::new(IdentifierTuple::from_legacy_scalars(0, 0, 0, 0), SlotRegistry::new().freeze().create());
        let t2 = Thread::new(IdentifierTuple::from_legacy_scalars(0, 0, 1, 0), SlotRegistry::new().freeze().create());
        assert_ne!(finalizer.assign_thread(&t1), finalizer.assign_thread(&t2));
    }

    #[test]
    fn metric_block_width_reserves_one_id_per_partial_scope_pair() {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let finalizer = IdentifierFinalizer::new(Arc::clone(&tables));
        let m1 = Metric::new(
            "A",
            "",
            true,
            MetricScopeSet { point: true, function: true, execution: false },
            vec![PartialStatistic::Sum, PartialStatistic::Count],
        );
        let m2 = Metric::new("B", "", true, MetricScopeSet::default(), vec![PartialStatistic::Sum]);

        let base1 = finalizer.assign_metric(&m1);
        let base2 = finalizer.assign_metric(&m2);
        assert_eq!(base2.get(), base1.get() + m1.id_width());
    }
}
