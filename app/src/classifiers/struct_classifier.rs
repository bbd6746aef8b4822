// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Struct-file classification: parses a per-load-module XML sidecar lazily
//! on first access and turns a raw `point(module, offset)` leaf into a
//! chain of `function`/`line`/`loop`/`inlined_call` Contexts.
//!
//! ## Sidecar schema
//!
//! Each module's sidecar is an XML document of nested `<P>` (procedure),
//! `<L>` (loop), `<S>` (statement), `<A>` (alien/inlined) elements, each
//! carrying a `vma="start-end"` hex address range; `<F>` declares a source
//! file referenced by `<S file="...">`; `<C vma=".." callee="..">` records
//! a call edge for the reversed call graph consumed by
//! [`crate::classifiers::call_graph`]:
//!
//! ```xml
//! <Structure>
//!   <F id="0" name="src/foo.c"/>
//!   <P id="0" name="foo" vma="1000-1010">
//!     <S vma="1004-1008" file="0" line="42"/>
//!     <L vma="1008-1010">
//!       <S vma="1008-100c" file="0" line="50"/>
//!     </L>
//!     <C vma="1006" callee="1"/>
//!   </P>
//!   <P id="1" name="bar" vma="2000-2010"/>
//! </Structure>
//! ```

use parking_lot::Mutex;
use profkit_domain::dataclass::ExtensionClass;
use profkit_domain::entities::{Context, Function, Module};
use profkit_domain::error::ProfError;
use profkit_domain::ids::{FileId, FunctionId, ModuleId};
use profkit_domain::registry::EntityTables;
use profkit_domain::scope::{NestedScope, Scope};
use profkit_domain::traits::Finalizer;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::pipeline::module_registry::{FileRegistry, FunctionRegistry, ModuleRegistry};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Specificity {
    Procedure,
    Loop,
    Statement,
}

struct TrieNode {
    parent: Option<usize>,
    edge: NestedScope,
}

struct Interval {
    start: u64,
    end: u64,
    specificity: Specificity,
    node: usize,
    function: FunctionId,
}

/// One module's compiled classification structure: an append-only arena of
/// classification-chain links plus an interval map from address offset to
/// `(trie node, enclosing function)`, as `(arena, index)` pairs rather than
/// raw pointers so the whole thing can be shared behind an `Arc` and read
/// concurrently without further locking.
pub struct CompiledStruct {
    arena: Vec<TrieNode>,
    intervals: Vec<Interval>,
    reversed_calls: HashMap<u32, Vec<(u64, u32)>>,
}

impl CompiledStruct {
    fn lookup(&self, offset: u64) -> Option<(usize, FunctionId)> {
        self.intervals
            .iter()
            .filter(|iv| iv.start <= offset && offset < iv.end)
            .max_by_key(|iv| iv.specificity)
            .map(|iv| (iv.node, iv.function))
    }

    fn chain_to_root(&self, mut node: usize) -> Vec<NestedScope> {
        let mut edges = Vec::new();
        loop {
            edges.push(self.arena[node].edge);
            match self.arena[node].parent {
                Some(p) => node = p,
                None => break,
            }
        }
        edges.reverse();
        edges
    }

    /// Callers of `callee`, as recorded by `<C>` tags: `(call-site offset,
    /// caller function id)`.
    pub fn callers_of(&self, callee: FunctionId) -> &[(u64, u32)] {
        self.reversed_calls.get(&callee.get()).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Builds a `CompiledStruct` exposing only a reversed call graph, for
    /// `call_graph` tests that exercise `resolve` independent of a parsed
    /// sidecar.
    #[cfg(test)]
    pub(crate) fn for_test(reversed_calls: HashMap<u32, Vec<(u64, u32)>>) -> Self {
        Self { arena: Vec::new(), intervals: Vec::new(), reversed_calls }
    }
}

pub struct StructClassifier {
    tables: Arc<EntityTables>,
    modules: Arc<ModuleRegistry>,
    files: Arc<FileRegistry>,
    functions: Arc<FunctionRegistry>,
    struct_dir: Option<PathBuf>,
    compiled: Mutex<HashMap<ModuleId, Arc<CompiledStruct>>>,
}

impl StructClassifier {
    pub fn new(
        tables: Arc<EntityTables>,
        modules: Arc<ModuleRegistry>,
        files: Arc<FileRegistry>,
        functions: Arc<FunctionRegistry>,
        struct_dir: Option<PathBuf>,
    ) -> Self {
        Self { tables, modules, files, functions, struct_dir, compiled: Mutex::new(HashMap::new()) }
    }

    fn sidecar_path(&self, module: &Module) -> Option<PathBuf> {
        let dir = self.struct_dir.as_ref()?;
        let name = module.resolvable_path().file_name()?.to_string_lossy().into_owned();
        Some(dir.join(format!("{name}.xml")))
    }

    fn compiled_for(&self, module_id: ModuleId) -> Option<Arc<CompiledStruct>> {
        if let Some(existing) = self.compiled.lock().get(&module_id) {
            return Some(Arc::clone(existing));
        }
        let module = self.modules.get(module_id)?;
        let sidecar = self.sidecar_path(&module)?;
        let compiled = Arc::new(
            parse_struct_file(&sidecar, &module, &self.tables, &self.files, &self.functions)
                .inspect_err(|err| tracing::warn!(path = %sidecar.display(), %err, "struct file parse failed"))
                .ok()?,
        );
        self.compiled.lock().insert(module_id, Arc::clone(&compiled));
        Some(compiled)
    }
}

impl Finalizer for StructClassifier {
    fn provides(&self) -> ExtensionClass {
        ExtensionClass::CLASSIFICATION
    }

    fn classify(&self, parent: &Arc<Context>, scope: &mut NestedScope) -> Option<(Arc<Context>, Arc<Context>)> {
        let Scope::Point { module, offset } = scope.scope else {
            return None;
        };
        let compiled = self.compiled_for(module)?;
        let (node, _function) = compiled.lookup(offset)?;
        let chain = compiled.chain_to_root(node);
        Some(splice_chain(parent, &chain, &self.tables))
    }
}

/// Inserts `chain` (root-to-leaf `NestedScope` edges) under `parent`,
/// returning `(first inserted context, leaf context)`.
pub(crate) fn splice_chain(parent: &Arc<Context>, chain: &[NestedScope], tables: &EntityTables) -> (Arc<Context>, Arc<Context>) {
    let mut current = Arc::clone(parent);
    let mut first = None;
    for edge in chain {
        let (child, _) = current.get_or_create_child(*edge, || tables.context_slots());
        if first.is_none() {
            first = Some(Arc::clone(&child));
        }
        current = child;
    }
    let leaf = current;
    (first.unwrap_or_else(|| Arc::clone(&leaf)), leaf)
}

fn parse_vma(raw: &str) -> Result<(u64, u64), ProfError> {
    let (start, end) = raw.split_once('-').ok_or_else(|| ProfError::Xml(format!("malformed vma range: {raw}")))?;
    let start = u64::from_str_radix(start.trim(), 16).map_err(|e| ProfError::Xml(e.to_string()))?;
    let end = u64::from_str_radix(end.trim(), 16).map_err(|e| ProfError::Xml(e.to_string()))?;
    Ok((start, end))
}

fn attr_string(tag: &BytesStart<'_>, key: &str) -> Option<String> {
    tag.attributes().flatten().find(|a| a.key.as_ref() == key.as_bytes()).map(|a| {
        String::from_utf8_lossy(a.value.as_ref()).into_owned()
    })
}

struct ParseScope {
    node: Option<usize>,
    function: FunctionId,
}

fn parse_struct_file(
    path: &Path,
    module: &Arc<Module>,
    tables: &EntityTables,
    files_registry: &FileRegistry,
    functions: &FunctionRegistry,
) -> Result<CompiledStruct, ProfError> {
    let content = std::fs::read_to_string(path)?;
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut arena: Vec<TrieNode> = Vec::new();
    let mut intervals: Vec<Interval> = Vec::new();
    let mut file_ids: HashMap<String, FileId> = HashMap::new();
    let mut reversed_calls: HashMap<u32, Vec<(u64, u32)>> = HashMap::new();
    // `P`/`L`/`A` nest and close with a matching `End`; `S` is always
    // self-closing (`Event::Empty`) in this sidecar schema, so it never
    // pushes a stack frame of its own.
    let mut stack: Vec<ParseScope> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| ProfError::Xml(e.to_string()))?;
        match event {
            Event::Eof => break,
            Event::Empty(tag) if tag.name().as_ref() == b"F" => {
                let xml_id = attr_string(&tag, "id").unwrap_or_default();
                let path = attr_string(&tag, "name").unwrap_or_default();
                let (file_id, _) = files_registry.resolve(tables, PathBuf::from(path));
                file_ids.insert(xml_id, file_id);
            }
            Event::Empty(tag) if tag.name().as_ref() == b"S" => {
                let (start, end) = parse_vma(&attr_string(&tag, "vma").unwrap_or_default())?;
                let enclosing = stack.last().map(|s| s.function).unwrap_or(FunctionId::UNASSIGNED);
                let parent_node = stack.last().and_then(|s| s.node);
                let line: u32 = attr_string(&tag, "line").and_then(|s| s.parse().ok()).unwrap_or(0);
                let file_key = attr_string(&tag, "file").unwrap_or_default();
                let file_id = file_ids.get(&file_key).copied().unwrap_or(FileId::UNASSIGNED);
                let node_idx = arena.len();
                arena.push(TrieNode { parent: parent_node, edge: NestedScope::enclosure(Scope::Line { file: file_id, line }) });
                intervals.push(Interval { start, end, specificity: Specificity::Statement, node: node_idx, function: enclosing });
            }
            Event::Empty(tag) if tag.name().as_ref() == b"C" => {
                let offset: u64 = attr_string(&tag, "vma").and_then(|s| u64::from_str_radix(s.trim(), 16).ok()).unwrap_or(0);
                let callee_id: u32 = attr_string(&tag, "callee").and_then(|s| s.parse().ok()).unwrap_or(0);
                let caller = stack.last().map(|s| s.function.get()).unwrap_or(u32::MAX);
                reversed_calls.entry(callee_id).or_default().push((offset, caller));
            }
            Event::Start(tag) if tag.name().as_ref() == b"P" => {
                let (start, end) = parse_vma(&attr_string(&tag, "vma").unwrap_or_default())?;
                let display_name = attr_string(&tag, "name").unwrap_or_default();
                let function = Arc::new(Function::new(Arc::clone(module), Some(start), display_name, None, tables.function_slots()));
                let function_id = functions.register(tables, function);
                let parent_node = stack.last().and_then(|s| s.node);
                let node_idx = arena.len();
                arena.push(TrieNode { parent: parent_node, edge: NestedScope::enclosure(Scope::Function(function_id)) });
                intervals.push(Interval { start, end, specificity: Specificity::Procedure, node: node_idx, function: function_id });
                stack.push(ParseScope { node: Some(node_idx), function: function_id });
            }
            Event::Start(tag) if tag.name().as_ref() == b"L" => {
                let (start, end) = parse_vma(&attr_string(&tag, "vma").unwrap_or_default())?;
                let enclosing = stack.last().map(|s| s.function).unwrap_or(FunctionId::UNASSIGNED);
                let parent_node = stack.last().and_then(|s| s.node);
                let node_idx = arena.len();
                // A loop header alone carries no file/line in this schema;
                // any `<S>` nested directly under it supplies the precise
                // source location via its own interval entry.
                arena.push(TrieNode { parent: parent_node, edge: NestedScope::enclosure(Scope::Loop { file: FileId::UNASSIGNED, line: 0 }) });
                intervals.push(Interval { start, end, specificity: Specificity::Loop, node: node_idx, function: enclosing });
                stack.push(ParseScope { node: Some(node_idx), function: enclosing });
            }
            Event::Start(tag) if tag.name().as_ref() == b"A" => {
                let (start, end) = parse_vma(&attr_string(&tag, "vma").unwrap_or_default())?;
                let enclosing = stack.last().map(|s| s.function).unwrap_or(FunctionId::UNASSIGNED);
                let parent_node = stack.last().and_then(|s| s.node);
                let node_idx = arena.len();
                arena.push(TrieNode { parent: parent_node, edge: NestedScope::inlined_call(Scope::Function(enclosing)) });
                intervals.push(Interval { start, end, specificity: Specificity::Loop, node: node_idx, function: enclosing });
                stack.push(ParseScope { node: Some(node_idx), function: enclosing });
            }
            Event::End(tag) if matches!(tag.name().as_ref(), b"P" | b"L" | b"A") => {
                stack.pop();
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(CompiledStruct { arena, intervals, reversed_calls })
}

#[cfg(test)]
mod tests {
    use super::*;
    use profkit_domain::registry::SlotFactories;

    fn write_sidecar(dir: &Path, module_file: &str) -> PathBuf {
        let xml = r#"<Structure>
  <F id="0" name="src/foo.c"/>
  <P id="0" name="foo" vma="1000-1010">
    <S vma="1004-1008" file="0" line="42"/>
    <L vma="1008-1010">
      <S vma="1008-100c" file="0" line="50"/>
    </L>
  </P>
</Structure>"#;
        let sidecar = dir.join(format!("{module_file}.xml"));
        std::fs::write(&sidecar, xml).unwrap();
        sidecar
    }

    #[test]
    fn offset_inside_statement_classifies_to_function_then_line() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(dir.path(), "app.so");

        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let modules = Arc::new(ModuleRegistry::new());
        let files = Arc::new(FileRegistry::new());
        let functions = Arc::new(FunctionRegistry::new());
        let classifier = StructClassifier::new(Arc::clone(&tables), Arc::clone(&modules), Arc::clone(&files), Arc::clone(&functions), Some(dir.path().to_path_buf()));

        let (module_id, _) = modules.resolve(&tables, dir.path().join("app.so"));
        let root = tables.root_context();
        let mut scope = NestedScope::call(Scope::Point { module: module_id, offset: 0x1004 });

        let (first, leaf) = classifier.classify(root, &mut scope).expect("struct file should classify this offset");
        assert!(Arc::ptr_eq(&first.parent().unwrap(), root));
        assert!(matches!(leaf.scope(), Scope::Line { line: 42, .. }));
        assert!(matches!(first.scope(), Scope::Function(_)));
    }

    #[test]
    fn offset_outside_any_struct_interval_is_unclaimed() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(dir.path(), "app.so");

        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let modules = Arc::new(ModuleRegistry::new());
        let files = Arc::new(FileRegistry::new());
        let functions = Arc::new(FunctionRegistry::new());
        let classifier = StructClassifier::new(Arc::clone(&tables), Arc::clone(&modules), Arc::clone(&files), Arc::clone(&functions), Some(dir.path().to_path_buf()));

        let (module_id, _) = modules.resolve(&tables, dir.path().join("app.so"));
        let root = tables.root_context();
        let mut scope = NestedScope::call(Scope::Point { module: module_id, offset: 0x9000 });

        assert!(classifier.classify(root, &mut scope).is_none());
    }

    #[test]
    fn no_struct_dir_means_passthrough() {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let modules = Arc::new(ModuleRegistry::new());
        let files = Arc::new(FileRegistry::new());
        let functions = Arc::new(FunctionRegistry::new());
        let classifier = StructClassifier::new(Arc::clone(&tables), Arc::clone(&modules), Arc::clone(&files), Arc::clone(&functions), None);

        let (module_id, _) = modules.resolve(&tables, PathBuf::from("/lib/app.so"));
        let root = tables.root_context();
        let mut scope = NestedScope::call(Scope::Point { module: module_id, offset: 0x10 });
        assert!(classifier.classify(root, &mut scope).is_none());
    }
}
