// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Logical classification for interpreted-language or bytecode Modules that
//! embed their own source mapping rather than exposing DWARF or a struct
//! sidecar. A Module opts in by starting its on-disk contents with the
//! marker `HPCLOGICAL`, followed by one stanza per line:
//!
//! ```text
//! HPCLOGICAL
//! F 1000-1010 src/script.py
//! N 2000-2010 helper
//! ```
//!
//! `F <start>-<end> <path>` maps the offset range to a line in a logical
//! source file, numbered from 1 at `start`. `N <start>-<end> <name>` maps
//! the range to a synthetic Function with no further enclosing scope.

use parking_lot::Mutex;
use profkit_domain::dataclass::ExtensionClass;
use profkit_domain::entities::{Context, Function};
use profkit_domain::ids::ModuleId;
use profkit_domain::registry::EntityTables;
use profkit_domain::scope::{NestedScope, Scope};
use profkit_domain::traits::Finalizer;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::pipeline::module_registry::{FileRegistry, FunctionRegistry, ModuleRegistry};

const MARKER: &str = "HPCLOGICAL";

enum LogicalTarget {
    File(profkit_domain::ids::FileId),
    Function(profkit_domain::ids::FunctionId),
}

struct Stanza {
    start: u64,
    end: u64,
    target: LogicalTarget,
}

struct LogicalTable {
    stanzas: Vec<Stanza>,
}

impl LogicalTable {
    fn lookup(&self, offset: u64) -> Option<&Stanza> {
        self.stanzas.iter().find(|s| s.start <= offset && offset < s.end)
    }
}

pub struct LogicalClassifier {
    tables: Arc<EntityTables>,
    modules: Arc<ModuleRegistry>,
    files: Arc<FileRegistry>,
    functions: Arc<FunctionRegistry>,
    compiled: Mutex<HashMap<ModuleId, Option<Arc<LogicalTable>>>>,
}

impl LogicalClassifier {
    pub fn new(tables: Arc<EntityTables>, modules: Arc<ModuleRegistry>, files: Arc<FileRegistry>, functions: Arc<FunctionRegistry>) -> Self {
        Self { tables, modules, files, functions, compiled: Mutex::new(HashMap::new()) }
    }

    fn compiled_for(&self, module_id: ModuleId) -> Option<Arc<LogicalTable>> {
        if let Some(cached) = self.compiled.lock().get(&module_id) {
            return cached.clone();
        }
        let module = self.modules.get(module_id);
        let table = module.and_then(|m| self.parse_module(&m));
        self.compiled.lock().insert(module_id, table.clone());
        table
    }

    fn parse_module(&self, module: &Arc<profkit_domain::entities::Module>) -> Option<Arc<LogicalTable>> {
        let content = std::fs::read_to_string(module.resolvable_path()).ok()?;
        let mut lines = content.lines();
        if lines.next()?.trim() != MARKER {
            return None;
        }

        let mut stanzas = Vec::new();
        for line in lines {
            let mut parts = line.split_whitespace();
            let kind = parts.next()?;
            let range = parts.next()?;
            let rest = parts.collect::<Vec<_>>().join(" ");
            let (start, end) = range.split_once('-')?;
            let start = u64::from_str_radix(start, 16).ok()?;
            let end = u64::from_str_radix(end, 16).ok()?;
            let target = match kind {
                "F" => {
                    let (file_id, _) = self.files.resolve(&self.tables, PathBuf::from(rest));
                    LogicalTarget::File(file_id)
                }
                "N" => {
                    let function = Arc::new(Function::new(Arc::clone(module), Some(start), rest, None, self.tables.function_slots()));
                    LogicalTarget::Function(self.functions.register(&self.tables, function))
                }
                _ => continue,
            };
            stanzas.push(Stanza { start, end, target });
        }
        Some(Arc::new(LogicalTable { stanzas }))
    }
}

impl Finalizer for LogicalClassifier {
    fn provides(&self) -> ExtensionClass {
        ExtensionClass::CLASSIFICATION
    }

    fn classify(&self, parent: &Arc<Context>, scope: &mut NestedScope) -> Option<(Arc<Context>, Arc<Context>)> {
        let Scope::Point { module, offset } = scope.scope else {
            return None;
        };
        let table = self.compiled_for(module)?;
        let stanza = table.lookup(offset)?;
        let edge = match stanza.target {
            LogicalTarget::File(file) => {
                let line = (offset - stanza.start) as u32 + 1;
                NestedScope::enclosure(Scope::Line { file, line })
            }
            LogicalTarget::Function(function) => NestedScope::enclosure(Scope::Function(function)),
        };
        let (child, _) = parent.get_or_create_child(edge, || self.tables.context_slots());
        Some((Arc::clone(&child), child))
    }
}
