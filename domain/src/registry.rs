// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! [`EntityTables`] is the single owner of every uniqued entity set plus the
//! dense-id allocators for each entity kind. It is built once at pipeline
//! startup (run phase 1, "freeze all entity structs") and shared
//! read-mostly across every worker thread for the rest of the run.

use std::path::PathBuf;
use std::sync::Arc;

use crate::entities::{Context, Metric, Module, SourceFile, Thread};
use crate::ids::IdAllocator;
use crate::uniquing::UniqueSet;
use crate::userdata::{SlotRegistry, SlotSpaceFactory};

/// One [`SlotSpaceFactory`] per entity kind, built from the Finalizers'
/// slot registrations at startup and frozen before any entity is created.
pub struct SlotFactories {
    pub module: SlotSpaceFactory,
    pub source_file: SlotSpaceFactory,
    pub function: SlotSpaceFactory,
    pub context: SlotSpaceFactory,
    pub thread: SlotSpaceFactory,
}

impl Default for SlotFactories {
    fn default() -> Self {
        Self {
            module: SlotRegistry::new().freeze(),
            source_file: SlotRegistry::new().freeze(),
            function: SlotRegistry::new().freeze(),
            context: SlotRegistry::new().freeze(),
            thread: SlotRegistry::new().freeze(),
        }
    }
}

pub struct EntityTables {
    modules: UniqueSet<PathBuf, Module>,
    source_files: UniqueSet<PathBuf, SourceFile>,
    metrics: UniqueSet<String, Metric>,
    threads: UniqueSet<crate::identifier_tuple::IdentifierTuple, Thread>,
    root: Arc<Context>,
    slots: SlotFactories,

    pub context_ids: IdAllocator,
    pub module_ids: IdAllocator,
    pub file_ids: IdAllocator,
    pub function_ids: IdAllocator,
    pub thread_ids: IdAllocator,
    pub metric_ids: IdAllocator,
}

impl EntityTables {
    pub fn new(slots: SlotFactories) -> Self {
        let root = Context::root(slots.context.create());
        Self {
            modules: UniqueSet::new(),
            source_files: UniqueSet::new(),
            metrics: UniqueSet::new(),
            threads: UniqueSet::new(),
            root,
            slots,
            context_ids: IdAllocator::new(),
            module_ids: IdAllocator::new(),
            file_ids: IdAllocator::new(),
            function_ids: IdAllocator::new(),
            thread_ids: IdAllocator::new(),
            metric_ids: IdAllocator::new(),
        }
    }

    pub fn root_context(&self) -> &Arc<Context> {
        &self.root
    }

    pub fn get_or_insert_module(&self, path: PathBuf) -> (Arc<Module>, bool) {
        let factory = &self.slots.module;
        self.modules.get_or_insert_with(path.clone(), move || Module::new(path, factory.create()))
    }

    pub fn get_or_insert_source_file(&self, path: PathBuf) -> (Arc<SourceFile>, bool) {
        let factory = &self.slots.source_file;
        self.source_files.get_or_insert_with(path.clone(), move || SourceFile::new(path, factory.create()))
    }

    pub fn get_or_insert_thread(&self, id_tuple: crate::identifier_tuple::IdentifierTuple) -> (Arc<Thread>, bool) {
        let factory = &self.slots.thread;
        self.threads.get_or_insert_with(id_tuple.clone(), move || Thread::new(id_tuple, factory.create()))
    }

    pub fn get_or_insert_metric(&self, key: String, make: impl FnOnce() -> Metric) -> (Arc<Metric>, bool) {
        self.metrics.get_or_insert_with(key, make)
    }

    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.values()
    }

    pub fn source_files(&self) -> Vec<Arc<SourceFile>> {
        self.source_files.values()
    }

    pub fn threads(&self) -> Vec<Arc<Thread>> {
        self.threads.values()
    }

    pub fn metrics(&self) -> Vec<Arc<Metric>> {
        self.metrics.values()
    }

    pub fn context_slots(&self) -> crate::userdata::SlotSpace {
        self.slots.context.create()
    }

    pub fn function_slots(&self) -> crate::userdata::SlotSpace {
        self.slots.function.create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier_tuple::IdentifierTuple;

    #[test]
    fn modules_are_uniqued_by_path() {
        let tables = EntityTables::new(SlotFactories::default());
        let (m1, inserted1) = tables.get_or_insert_module(PathBuf::from("/lib/a.so"));
        let (m2, inserted2) = tables.get_or_insert_module(PathBuf::from("/lib/a.so"));
        assert!(inserted1);
        assert!(!inserted2);
        assert!(Arc::ptr_eq(&m1, &m2));
        assert_eq!(tables.modules().len(), 1);
    }

    #[test]
    fn threads_are_uniqued_by_identifier_tuple() {
        let tables = EntityTables::new(SlotFactories::default());
        let tuple = IdentifierTuple::from_legacy_scalars(1, 0, 0, 7);
        let (t1, _) = tables.get_or_insert_thread(tuple.clone());
        let (t2, _) = tables.get_or_insert_thread(tuple);
        assert!(Arc::ptr_eq(&t1, &t2));
    }

    #[test]
    fn root_context_is_shared() {
        let tables = EntityTables::new(SlotFactories::default());
        assert!(tables.root_context().is_root());
    }
}
