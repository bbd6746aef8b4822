// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Maps the dense [`ModuleId`] carried by a `Scope::Point` back to its
//! canonical [`Module`] entity, and the dense [`FunctionId`] carried by a
//! `Scope::Function` back to the `Function` a classifier synthesized. A
//! module is canonicalized (uniqued by resolvable path) and assigned its
//! dense id the first time any Source's load-map references it; every later
//! reference, from this file or another, reuses both. [`FileRegistry`] does
//! the same for `Scope::Line`/`Scope::Loop`'s [`FileId`], keyed by a
//! classifier's source file path. Functions have no natural uniquing key
//! (two classifiers could describe the same address range differently), so
//! [`FunctionRegistry`] is append-only: every registration gets a fresh id.

use parking_lot::Mutex;
use profkit_domain::entities::{Function, Module, SourceFile};
use profkit_domain::ids::{FileId, FunctionId, ModuleId};
use profkit_domain::registry::EntityTables;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Default)]
pub struct ModuleRegistry {
    by_id: Mutex<Vec<Arc<Module>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalizes `path` against `tables`, assigning a fresh dense id on
    /// first sight or returning the id already on file.
    pub fn resolve(&self, tables: &EntityTables, path: PathBuf) -> (ModuleId, Arc<Module>) {
        let mut guard = self.by_id.lock();
        let (module, inserted) = tables.get_or_insert_module(path);
        if inserted {
            let id = ModuleId::new(tables.module_ids.next());
            debug_assert_eq!(id.get() as usize, guard.len(), "module registry out of sync with the id allocator");
            guard.push(Arc::clone(&module));
            (id, module)
        } else {
            let idx = guard
                .iter()
                .position(|m| Arc::ptr_eq(m, &module))
                .expect("canonical module missing from registry");
            (ModuleId::new(idx as u32), module)
        }
    }

    pub fn get(&self, id: ModuleId) -> Option<Arc<Module>> {
        self.by_id.lock().get(id.get() as usize).cloned()
    }

    /// Every registered module, in dense-id order.
    pub fn all(&self) -> Vec<Arc<Module>> {
        self.by_id.lock().clone()
    }
}

/// Mirrors [`ModuleRegistry`] for [`SourceFile`]s: canonicalized by
/// resolvable path, assigned a dense [`FileId`] the first time any
/// classifier references it.
#[derive(Default)]
pub struct FileRegistry {
    by_id: Mutex<Vec<Arc<SourceFile>>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, tables: &EntityTables, path: PathBuf) -> (FileId, Arc<SourceFile>) {
        let mut guard = self.by_id.lock();
        let (file, inserted) = tables.get_or_insert_source_file(path);
        if inserted {
            let id = FileId::new(tables.file_ids.next());
            debug_assert_eq!(id.get() as usize, guard.len(), "file registry out of sync with the id allocator");
            guard.push(Arc::clone(&file));
            (id, file)
        } else {
            let idx = guard
                .iter()
                .position(|f| Arc::ptr_eq(f, &file))
                .expect("canonical source file missing from registry");
            (FileId::new(idx as u32), file)
        }
    }

    pub fn get(&self, id: FileId) -> Option<Arc<SourceFile>> {
        self.by_id.lock().get(id.get() as usize).cloned()
    }

    /// Every registered file, in dense-id order.
    pub fn all(&self) -> Vec<Arc<SourceFile>> {
        self.by_id.lock().clone()
    }
}

/// Append-only id assignment for classifier-synthesized [`Function`]s.
#[derive(Default)]
pub struct FunctionRegistry {
    by_id: Mutex<Vec<Arc<Function>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tables: &EntityTables, function: Arc<Function>) -> FunctionId {
        let mut guard = self.by_id.lock();
        let id = FunctionId::new(tables.function_ids.next());
        debug_assert_eq!(id.get() as usize, guard.len(), "function registry out of sync with the id allocator");
        guard.push(function);
        id
    }

    pub fn get(&self, id: FunctionId) -> Option<Arc<Function>> {
        self.by_id.lock().get(id.get() as usize).cloned()
    }

    /// Every registered function, in dense-id order.
    pub fn all(&self) -> Vec<Arc<Function>> {
        self.by_id.lock().clone()
    }
}
