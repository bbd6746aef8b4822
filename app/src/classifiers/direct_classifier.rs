// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Direct (DWARF-fallback) classification. Symbol-table/DWARF *reading* is
//! an external collaborator (SPEC_FULL.md §1): this classifier only applies
//! the size cap and hands qualifying offsets to a [`DwarfReader`] the
//! embedder supplies. [`NullDwarfReader`] is the shipped stub — it never
//! resolves anything, leaving every point scope as passthrough, which is a
//! legal (if uninformative) classification result.

use profkit_domain::dataclass::ExtensionClass;
use profkit_domain::entities::Context;
use profkit_domain::registry::EntityTables;
use profkit_domain::scope::{NestedScope, Scope};
use profkit_domain::traits::Finalizer;
use std::path::Path;
use std::sync::Arc;

use crate::pipeline::module_registry::{FileRegistry, FunctionRegistry, ModuleRegistry};

/// A resolved DWARF line-table lookup: the enclosing function's display
/// name (if the reader can determine one) and a `(file, line)` pair.
pub struct DwarfLine {
    pub function_name: Option<String>,
    pub file_path: std::path::PathBuf,
    pub line: u32,
}

/// External collaborator seam for DWARF line-table lookups. A real
/// integrator backs this with an actual DWARF reader (e.g. `gimli`); this
/// crate only consults it, never parses DWARF itself.
pub trait DwarfReader: Send + Sync {
    fn resolve(&self, module_path: &Path, offset: u64) -> Option<DwarfLine>;
}

/// Stub reader that never resolves anything; every module falls through to
/// passthrough `point` scopes, which downstream sinks accept as-is.
pub struct NullDwarfReader;

impl DwarfReader for NullDwarfReader {
    fn resolve(&self, _module_path: &Path, _offset: u64) -> Option<DwarfLine> {
        None
    }
}

pub struct DirectClassifier {
    tables: Arc<EntityTables>,
    modules: Arc<ModuleRegistry>,
    files: Arc<FileRegistry>,
    functions: Arc<FunctionRegistry>,
    reader: Arc<dyn DwarfReader>,
    max_size: u64,
}

impl DirectClassifier {
    pub fn new(
        tables: Arc<EntityTables>,
        modules: Arc<ModuleRegistry>,
        files: Arc<FileRegistry>,
        functions: Arc<FunctionRegistry>,
        reader: Arc<dyn DwarfReader>,
        max_size: u64,
    ) -> Self {
        Self { tables, modules, files, functions, reader, max_size }
    }

    fn under_size_cap(&self, module_path: &Path) -> bool {
        std::fs::metadata(module_path).map(|meta| meta.len() <= self.max_size).unwrap_or(false)
    }
}

impl Finalizer for DirectClassifier {
    fn provides(&self) -> ExtensionClass {
        ExtensionClass::CLASSIFICATION
    }

    fn classify(&self, parent: &Arc<Context>, scope: &mut NestedScope) -> Option<(Arc<Context>, Arc<Context>)> {
        let Scope::Point { module, offset } = scope.scope else {
            return None;
        };
        let module_entity = self.modules.get(module)?;
        if !self.under_size_cap(module_entity.resolvable_path()) {
            return None;
        }
        let resolved = self.reader.resolve(module_entity.resolvable_path(), offset)?;

        let (file_id, _) = self.files.resolve(&self.tables, resolved.file_path);
        let line_edge = NestedScope::enclosure(Scope::Line { file: file_id, line: resolved.line });

        let function_name = resolved.function_name?;
        let function = profkit_domain::entities::Function::new(Arc::clone(&module_entity), None, function_name, None, self.tables.function_slots());
        let function_id = self.functions.register(&self.tables, Arc::new(function));
        let function_edge = NestedScope::enclosure(Scope::Function(function_id));

        let (function_ctx, _) = parent.get_or_create_child(function_edge, || self.tables.context_slots());
        let (line_ctx, _) = function_ctx.get_or_create_child(line_edge, || self.tables.context_slots());
        Some((function_ctx, line_ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profkit_domain::registry::SlotFactories;

    struct StubReader {
        line: u32,
    }

    impl DwarfReader for StubReader {
        fn resolve(&self, _module_path: &Path, _offset: u64) -> Option<DwarfLine> {
            Some(DwarfLine { function_name: Some("decoded_fn".to_string()), file_path: std::path::PathBuf::from("src/lib.rs"), line: self.line })
        }
    }

    fn harness(max_size: u64, reader: Arc<dyn DwarfReader>) -> (Arc<EntityTables>, Arc<ModuleRegistry>, DirectClassifier) {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let modules = Arc::new(ModuleRegistry::new());
        let files = Arc::new(FileRegistry::new());
        let functions = Arc::new(FunctionRegistry::new());
        let classifier = DirectClassifier::new(Arc::clone(&tables), Arc::clone(&modules), files, functions, reader, max_size);
        (tables, modules, classifier)
    }

    #[test]
    fn module_under_cap_with_resolving_reader_produces_function_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("app.so");
        std::fs::write(&module_path, vec![0u8; 16]).unwrap();

        let (tables, modules, classifier) = harness(1024, Arc::new(StubReader { line: 7 }));
        let (module_id, _) = modules.resolve(&tables, module_path);
        let root = tables.root_context();
        let mut scope = NestedScope::call(Scope::Point { module: module_id, offset: 0x10 });

        let (first, leaf) = classifier.classify(root, &mut scope).expect("stub reader should resolve");
        assert!(matches!(first.scope(), Scope::Function(_)));
        assert!(matches!(leaf.scope(), Scope::Line { line: 7, .. }));
    }

    #[test]
    fn module_over_cap_is_left_unclassified() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("app.so");
        std::fs::write(&module_path, vec![0u8; 16]).unwrap();

        let (tables, modules, classifier) = harness(4, Arc::new(StubReader { line: 7 }));
        let (module_id, _) = modules.resolve(&tables, module_path);
        let root = tables.root_context();
        let mut scope = NestedScope::call(Scope::Point { module: module_id, offset: 0x10 });

        assert!(classifier.classify(root, &mut scope).is_none());
    }

    #[test]
    fn null_reader_always_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("app.so");
        std::fs::write(&module_path, vec![0u8; 16]).unwrap();

        let (tables, modules, classifier) = harness(1024, Arc::new(NullDwarfReader));
        let (module_id, _) = modules.resolve(&tables, module_path);
        let root = tables.root_context();
        let mut scope = NestedScope::call(Scope::Point { module: module_id, offset: 0x10 });

        assert!(classifier.classify(root, &mut scope).is_none());
    }
}
