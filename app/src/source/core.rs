// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The epoch/CCT-node reading logic shared by [`super::measurement::MeasurementSource`]
//! (format 4.0) and [`super::legacy::LegacySource`] (format 2.0/3.0): both
//! formats frame epochs, metric description tables, load-maps, and
//! preorder node streams identically, differing only in how the file
//! prelude and profile-identifier tuple are read.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use byteorder::ReadBytesExt;
use profkit_domain::entities::{Context, Metric, MetricScopeSet, PartialStatistic, ThreadTemporary};
use profkit_domain::error::ProfError;
use profkit_domain::ids::{MetricId, ModuleId};
use profkit_domain::registry::EntityTables;
use profkit_domain::scope::{NestedScope, PlaceholderKind, Scope};
use profkit_domain::traits::Sink;

use crate::classifiers::IdentifierFinalizer;
use crate::pipeline::module_registry::ModuleRegistry;
use crate::pipeline::router::ContextRouter;
use crate::source::header::{read_nul_terminated, read_f64, read_u32, read_u64, ByteOrderMarker};
use crate::source::sentinels;

pub enum NodeBinding {
    Context(Arc<Context>),
    PartialSentinel,
    GpuRootSentinel,
}

pub struct MeasurementReaderCore {
    pub router: Arc<ContextRouter>,
    pub tables: Arc<EntityTables>,
    pub modules: Arc<ModuleRegistry>,
    pub identifiers: Arc<IdentifierFinalizer>,
    pub sinks: Vec<Arc<dyn Sink>>,
}

impl MeasurementReaderCore {
    pub fn new(router: Arc<ContextRouter>, tables: Arc<EntityTables>, modules: Arc<ModuleRegistry>, identifiers: Arc<IdentifierFinalizer>, sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { router, tables, modules, identifiers, sinks }
    }

    fn notify_metric_value(&self, thread_temp: &mut ThreadTemporary, context: &Arc<Context>, metric_id: MetricId, value: f64) {
        if value == 0.0 {
            return;
        }
        let ctx_id = context.id().expect("context must have an id before it accumulates metric values");
        thread_temp.add_value(ctx_id, metric_id, value);
    }

    fn resolve_metric(&self, name: &str, description: &str, scopes: MetricScopeSet, partials: Vec<PartialStatistic>) -> (Arc<Metric>, MetricId) {
        let (metric, inserted) = self.tables.get_or_insert_metric(name.to_string(), || Metric::new(name, description, true, scopes, partials));
        if inserted {
            self.identifiers.assign_metric(&metric);
            for sink in &self.sinks {
                sink.notify_metric(&metric);
            }
        }
        let base_id = metric.base_id().expect("metric must be assigned before any Source reads values for it");
        (metric, base_id)
    }

    /// Reads one epoch: flags, metric description table, load-map, and the
    /// preorder CCT-node stream, accumulating sparse metric values into
    /// `thread_temp`.
    pub fn read_epoch<R: Read>(&self, r: &mut R, marker: ByteOrderMarker, thread_temp: &mut ThreadTemporary) -> Result<(), ProfError> {
        let _flags = read_u32(r, marker)?;

        let metric_count = read_u32(r, marker)?;
        let mut local_metrics: HashMap<u32, MetricId> = HashMap::with_capacity(metric_count as usize);
        let mut local_formats: HashMap<u32, u8> = HashMap::with_capacity(metric_count as usize);
        for _ in 0..metric_count {
            let local_id = read_u32(r, marker)?;
            let name = read_nul_terminated(r)?;
            let description = read_nul_terminated(r)?;
            let value_format = r.read_u8().map_err(ProfError::from)?;
            let show_flags = r.read_u8().map_err(ProfError::from)?;
            let scopes = MetricScopeSet { point: show_flags & 0b001 != 0, function: show_flags & 0b010 != 0, execution: show_flags & 0b100 != 0 };
            let partials = vec![PartialStatistic::Sum, PartialStatistic::Count, PartialStatistic::Min, PartialStatistic::Max, PartialStatistic::SumSq];
            let (_, base_id) = self.resolve_metric(&name, &description, scopes, partials);
            local_metrics.insert(local_id, base_id);
            local_formats.insert(local_id, value_format);
        }

        let module_count = read_u32(r, marker)?;
        let mut local_modules: HashMap<u32, ModuleId> = HashMap::with_capacity(module_count as usize);
        for _ in 0..module_count {
            let local_id = read_u32(r, marker)?;
            let path = read_nul_terminated(r)?;
            let (dense_id, _) = self.modules.resolve(&self.tables, PathBuf::from(path));
            local_modules.insert(local_id, dense_id);
        }

        let root = Arc::clone(self.tables.root_context());
        let mut bindings: HashMap<u32, NodeBinding> = HashMap::new();
        let mut unknown_ctx: Option<Arc<Context>> = None;

        let node_count = read_u64(r, marker)?;
        for _ in 0..node_count {
            let node_id = read_u32(r, marker)?;
            let parent_id = read_u32(r, marker)?;
            let module_id = read_u32(r, marker)?;
            let offset = read_u64(r, marker)?;
            let value_count = read_u32(r, marker)?;

            if parent_id == 0 {
                if module_id == sentinels::PLACEHOLDER && offset == sentinels::ROOT_PRIMARY {
                    bindings.insert(node_id, NodeBinding::Context(Arc::clone(&root)));
                    self.skip_values(r, marker, value_count)?;
                    continue;
                }
                if offset == sentinels::ROOT_PARTIAL {
                    bindings.insert(node_id, NodeBinding::PartialSentinel);
                    self.skip_values(r, marker, value_count)?;
                    continue;
                }
            }

            let parent_ctx: Arc<Context> = if parent_id == 0 {
                Arc::clone(&root)
            } else {
                match bindings.get(&parent_id) {
                    Some(NodeBinding::Context(ctx)) => Arc::clone(ctx),
                    Some(NodeBinding::PartialSentinel) => {
                        if unknown_ctx.is_none() {
                            unknown_ctx = Some(self.router.get_or_create_context(&root, NestedScope::call(Scope::Unknown)));
                        }
                        Arc::clone(unknown_ctx.as_ref().unwrap())
                    }
                    Some(NodeBinding::GpuRootSentinel) => Arc::clone(&root),
                    None => return Err(ProfError::malformed_record(node_id as u64, "node references an unknown parent id (preorder violation)")),
                }
            };

            if module_id == sentinels::GPU_ROOT {
                bindings.insert(node_id, NodeBinding::GpuRootSentinel);
                self.skip_values(r, marker, value_count)?;
                continue;
            }

            let scope = if module_id == sentinels::PLACEHOLDER {
                Scope::Placeholder(PlaceholderKind::Unknown(offset))
            } else if module_id == sentinels::GPU_CONTEXT || module_id == sentinels::GPU_RANGE {
                Scope::Placeholder(PlaceholderKind::GpuKernel(offset))
            } else {
                let module = *local_modules
                    .get(&module_id)
                    .ok_or_else(|| ProfError::malformed_record(node_id as u64, format!("unknown load-module id {module_id}")))?;
                Scope::Point { module, offset }
            };

            let child = self.router.get_or_create_context(&parent_ctx, NestedScope::call(scope));
            bindings.insert(node_id, NodeBinding::Context(Arc::clone(&child)));

            for _ in 0..value_count {
                let local_metric_id = read_u32(r, marker)?;
                let format = *local_formats.get(&local_metric_id).unwrap_or(&1);
                let value = if format == 0 { read_u64(r, marker)? as f64 } else { read_f64(r, marker)? };
                if let Some(metric_id) = local_metrics.get(&local_metric_id) {
                    self.notify_metric_value(thread_temp, &child, *metric_id, value);
                }
            }
        }

        Ok(())
    }

    fn skip_values<R: Read>(&self, r: &mut R, marker: ByteOrderMarker, value_count: u32) -> Result<(), ProfError> {
        for _ in 0..value_count {
            let _local_metric_id = read_u32(r, marker)?;
            let _ = read_u64(r, marker)?;
        }
        Ok(())
    }
}
