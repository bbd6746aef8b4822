// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The packer side of C5: a [`Sink`] that records every context-expansion
//! decision rank 0 observes, then serializes them plus the module/file/
//! function/metric tables those decisions reference into one blob other
//! ranks can replay without re-running classification themselves.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use byteorder::{WriteBytesExt, BE};
use parking_lot::Mutex;
use profkit_domain::dataclass::DataClass;
use profkit_domain::entities::Context;
use profkit_domain::error::FatalError;
use profkit_domain::ids::ContextId;
use profkit_domain::registry::EntityTables;
use profkit_domain::scope::NestedScope;
use profkit_domain::traits::Sink;

use crate::packer::encoding::{encode_nested_scope, encode_scope_key};
use crate::pipeline::module_registry::{FileRegistry, FunctionRegistry, ModuleRegistry};

const STRIPES: usize = 256;

struct ExpansionRecord {
    from: ContextId,
    key_scope: profkit_domain::scope::Scope,
    /// The chain from just after `from` down to `to`, root-to-leaf.
    chain: Vec<(NestedScope, ContextId)>,
}

fn stripe_index(from: ContextId, edge: NestedScope) -> usize {
    let mut hasher = DefaultHasher::new();
    from.hash(&mut hasher);
    edge.hash(&mut hasher);
    (hasher.finish() as usize) % STRIPES
}

/// Records every `(from, scope) -> to` expansion exactly once, sharded
/// across 256 lock stripes so concurrent Sources don't serialize on a
/// single mutex.
pub struct ContextPacker {
    modules: Arc<ModuleRegistry>,
    files: Arc<FileRegistry>,
    functions: Arc<FunctionRegistry>,
    seen: Vec<Mutex<HashSet<(ContextId, NestedScope)>>>,
    records: Vec<Mutex<Vec<ExpansionRecord>>>,
}

impl ContextPacker {
    pub fn new(modules: Arc<ModuleRegistry>, files: Arc<FileRegistry>, functions: Arc<FunctionRegistry>) -> Self {
        Self {
            modules,
            files,
            functions,
            seen: (0..STRIPES).map(|_| Mutex::new(HashSet::new())).collect(),
            records: (0..STRIPES).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Serializes the root id, module/file/function/metric tables, and
    /// every recorded expansion into one blob, per the wire layout in
    /// §4.5. Called once, on the `references+contexts` wavefront.
    pub fn encode(&self, root_id: ContextId, tables: &EntityTables) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<BE>(root_id.get()).unwrap();

        write_path_table(&mut out, self.modules.all().iter().map(|m| m.resolvable_path()));
        write_path_table(&mut out, self.files.all().iter().map(|f| f.resolvable_path()));

        let functions = self.functions.all();
        out.write_u32::<BE>(functions.len() as u32).unwrap();
        for function in &functions {
            let module_idx = self
                .modules
                .all()
                .iter()
                .position(|m| Arc::ptr_eq(m, function.module()))
                .expect("function's module must be registered") as u32;
            out.write_u32::<BE>(module_idx).unwrap();
            match function.entry_offset() {
                Some(offset) => {
                    out.write_u8(1).unwrap();
                    out.write_u64::<BE>(offset).unwrap();
                }
                None => {
                    out.write_u8(0).unwrap();
                    out.write_u64::<BE>(0).unwrap();
                }
            }
            write_nul_terminated(&mut out, function.display_name());
        }

        let mut strip: Vec<u8> = Vec::new();
        let mut count: u64 = 0;
        for bucket in &self.records {
            for record in bucket.lock().iter() {
                count += 1;
                strip.write_u32::<BE>(record.from.get()).unwrap();
                let (disc, offset) = encode_scope_key(record.key_scope);
                strip.write_u64::<BE>(disc).unwrap();
                strip.write_u64::<BE>(offset).unwrap();
                strip.write_u16::<BE>(record.chain.len() as u16).unwrap();
                for (edge, ctx_id) in &record.chain {
                    encode_nested_scope(&mut strip, *edge).unwrap();
                    strip.write_u32::<BE>(ctx_id.get()).unwrap();
                }
            }
        }
        out.write_u64::<BE>(count).unwrap();
        out.extend_from_slice(&strip);

        let metrics = tables.metrics();
        out.write_u32::<BE>(metrics.len() as u32).unwrap();
        for metric in &metrics {
            let base_id = metric.base_id().expect("metric must have an assigned base id before packing");
            out.write_u32::<BE>(base_id.get()).unwrap();
            write_nul_terminated(&mut out, metric.name());
        }

        out
    }
}

fn write_path_table<'a>(out: &mut Vec<u8>, paths: impl ExactSizeIterator<Item = &'a std::path::Path>) {
    out.write_u32::<BE>(paths.len() as u32).unwrap();
    for path in paths {
        write_nul_terminated(out, &path.to_string_lossy());
    }
}

fn write_nul_terminated(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

impl Sink for ContextPacker {
    fn accepts(&self) -> DataClass {
        DataClass::CONTEXTS
    }

    fn wavefronts(&self) -> DataClass {
        DataClass::CONTEXTS
    }

    fn notify_context_expansion(&self, from: &Arc<Context>, edge: NestedScope, to: &Arc<Context>) {
        if !edge.scope.is_packable() {
            return;
        }
        let from_id = match from.id() {
            Some(id) => id,
            None => return,
        };
        let stripe = stripe_index(from_id, edge);
        {
            let mut seen = self.seen[stripe].lock();
            if !seen.insert((from_id, edge)) {
                return;
            }
        }

        let mut chain = Vec::new();
        let mut current = Arc::clone(to);
        while !Arc::ptr_eq(&current, from) {
            let ctx_id = current.id().expect("context must be assigned an id before the packer observes it");
            let ns = NestedScope::new(current.incoming_relation(), current.scope());
            chain.push((ns, ctx_id));
            current = current.parent().expect("non-`from` context in a chain must have a parent");
        }
        chain.reverse();

        self.records[stripe].lock().push(ExpansionRecord { from: from_id, key_scope: edge.scope, chain });
    }

    fn write(&self) -> Result<(), FatalError> {
        Ok(())
    }
}
