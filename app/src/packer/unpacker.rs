// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The unpacking side of C5: a [`Finalizer`] bound ahead of the real
//! classifiers that replays rank 0's `(from, scope) -> chain` table instead
//! of re-deriving it. A scope this rank never saw on rank 0 (a module or
//! call path unique to this rank's inputs) falls through to the next bound
//! classifier — the packed table is a cache of rank 0's answers, not the
//! only source of truth.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use byteorder::{ReadBytesExt, BE};
use profkit_domain::dataclass::ExtensionClass;
use profkit_domain::entities::{Context, Function, SourceLocation};
use profkit_domain::error::ProfError;
use profkit_domain::ids::{ContextId, MetricId};
use profkit_domain::registry::EntityTables;
use profkit_domain::scope::NestedScope;
use profkit_domain::traits::Finalizer;

use crate::packer::encoding::{decode_nested_scope, encode_scope_key};
use crate::pipeline::module_registry::{FileRegistry, FunctionRegistry, ModuleRegistry};

type ScopeKey = (ContextId, u64, u64);

/// One rank's decoding of a packed blob: the module/file/function tables
/// replayed into this rank's registries, and the `(from, scope) -> chain`
/// map those tables' ids are referenced by.
pub struct ContextUnpacker {
    tables: Arc<EntityTables>,
    expansions: HashMap<ScopeKey, Vec<(NestedScope, ContextId)>>,
    metric_base_ids: HashMap<String, MetricId>,
    root_id: ContextId,
}

fn read_nul_terminated<R: Read>(r: &mut R) -> io::Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = r.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl ContextUnpacker {
    /// Decodes `blob` (as produced by [`super::packer::ContextPacker::encode`]),
    /// replaying its module/file/function tables into `modules`/`files`/
    /// `functions` in blob order so the dense ids those tables assign land
    /// on the same values rank 0 used. Must run before any local Source
    /// registers a module, file, or function of its own.
    pub fn from_blob(
        blob: &[u8],
        tables: Arc<EntityTables>,
        modules: &ModuleRegistry,
        files: &FileRegistry,
        functions: &FunctionRegistry,
    ) -> Result<Self, ProfError> {
        let mut cursor = Cursor::new(blob);
        let root_id = ContextId::new(read_u32(&mut cursor)?);

        let module_paths = read_path_table(&mut cursor)?;
        for (idx, path) in module_paths.into_iter().enumerate() {
            let (id, _) = modules.resolve(&tables, path);
            if id.get() as usize != idx {
                return Err(ProfError::IdPacking(format!("module table out of order at index {idx}")));
            }
        }

        let file_paths = read_path_table(&mut cursor)?;
        for (idx, path) in file_paths.into_iter().enumerate() {
            let (id, _) = files.resolve(&tables, path);
            if id.get() as usize != idx {
                return Err(ProfError::IdPacking(format!("file table out of order at index {idx}")));
            }
        }

        let function_count = read_u32(&mut cursor)?;
        for idx in 0..function_count {
            let module_idx = read_u32(&mut cursor)?;
            let has_offset = cursor.read_u8().map_err(io_err)?;
            let offset = read_u64(&mut cursor)?;
            let display_name = read_nul_terminated(&mut cursor).map_err(io_err)?;

            let module = modules
                .get(profkit_domain::ids::ModuleId::new(module_idx))
                .ok_or_else(|| ProfError::IdPacking(format!("function {idx} references unknown module {module_idx}")))?;
            let entry_offset = if has_offset != 0 { Some(offset) } else { None };
            let function = Function::new(module, entry_offset, display_name, None::<SourceLocation>, tables.function_slots());
            let id = functions.register(&tables, Arc::new(function));
            if id.get() != idx {
                return Err(ProfError::IdPacking(format!("function table out of order at index {idx}")));
            }
        }

        let expansion_count = read_u64(&mut cursor)?;
        let mut expansions = HashMap::with_capacity(expansion_count as usize);
        for _ in 0..expansion_count {
            let from = ContextId::new(read_u32(&mut cursor)?);
            let disc = read_u64(&mut cursor)?;
            let offset = read_u64(&mut cursor)?;
            let chain_len = cursor.read_u16::<BE>().map_err(io_err)?;
            let mut chain = Vec::with_capacity(chain_len as usize);
            for _ in 0..chain_len {
                let edge = decode_nested_scope(&mut cursor).map_err(io_err)?;
                let ctx_id = ContextId::new(read_u32(&mut cursor)?);
                chain.push((edge, ctx_id));
            }
            expansions.insert((from, disc, offset), chain);
        }

        let metric_count = read_u32(&mut cursor)?;
        let mut metric_base_ids = HashMap::with_capacity(metric_count as usize);
        for _ in 0..metric_count {
            let base_id = MetricId::new(read_u32(&mut cursor)?);
            let name = read_nul_terminated(&mut cursor).map_err(io_err)?;
            metric_base_ids.insert(name, base_id);
        }

        Ok(Self { tables, expansions, metric_base_ids, root_id })
    }

    pub fn root_id(&self) -> ContextId {
        self.root_id
    }

    /// The dense id rank 0 assigned `name`'s metric block, if the blob
    /// carried one. The engine consults this instead of allocating a fresh
    /// block when binding a Source's declared metrics on a non-zero rank.
    pub fn metric_base_id(&self, name: &str) -> Option<MetricId> {
        self.metric_base_ids.get(name).copied()
    }
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, ProfError> {
    cursor.read_u32::<BE>().map_err(io_err)
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, ProfError> {
    cursor.read_u64::<BE>().map_err(io_err)
}

fn read_path_table(cursor: &mut Cursor<&[u8]>) -> Result<Vec<PathBuf>, ProfError> {
    let count = read_u32(cursor)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(PathBuf::from(read_nul_terminated(cursor).map_err(io_err)?));
    }
    Ok(out)
}

fn io_err(e: io::Error) -> ProfError {
    ProfError::IdPacking(e.to_string())
}

impl Finalizer for ContextUnpacker {
    fn provides(&self) -> ExtensionClass {
        ExtensionClass::CLASSIFICATION | ExtensionClass::IDENTIFIER | ExtensionClass::MSCOPE_IDENTIFIERS
    }

    fn classify(&self, parent: &Arc<Context>, scope: &mut NestedScope) -> Option<(Arc<Context>, Arc<Context>)> {
        if !scope.scope.is_packable() {
            return None;
        }
        let from_id = parent.id()?;
        let (disc, offset) = encode_scope_key(scope.scope);
        let chain = self.expansions.get(&(from_id, disc, offset))?;

        let mut current = Arc::clone(parent);
        let mut first: Option<Arc<Context>> = None;
        for (edge, ctx_id) in chain {
            let (child, _inserted) = current.get_or_create_child(*edge, || self.tables.context_slots());
            child.set_id(*ctx_id);
            if first.is_none() {
                first = Some(Arc::clone(&child));
            }
            current = child;
        }
        let leaf = current;
        Some((first.unwrap_or_else(|| Arc::clone(&leaf)), leaf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::packer::ContextPacker;
    use profkit_domain::ids::ModuleId;
    use profkit_domain::registry::SlotFactories;
    use profkit_domain::scope::Scope;

    #[test]
    fn unpacker_reproduces_rank_zeros_context_id() {
        let tables_a = Arc::new(EntityTables::new(SlotFactories::default()));
        let modules_a = ModuleRegistry::new();
        let files_a = FileRegistry::new();
        let functions_a = FunctionRegistry::new();
        let (_, module) = modules_a.resolve(&tables_a, PathBuf::from("/lib/a.so"));
        let _ = module;

        let root_a = tables_a.root_context();
        root_a.set_id(ContextId::new(0));
        let edge = NestedScope::call(Scope::Point { module: ModuleId::new(0), offset: 0x10 });
        let (leaf_a, _) = root_a.get_or_create_child(edge, || tables_a.context_slots());
        leaf_a.set_id(ContextId::new(7));

        let packer = ContextPacker::new(Arc::new(modules_a), Arc::new(files_a), Arc::new(functions_a));
        packer.notify_context_expansion(root_a, edge, &leaf_a);
        let blob = packer.encode(ContextId::new(0), &tables_a);

        let tables_b = Arc::new(EntityTables::new(SlotFactories::default()));
        let modules_b = ModuleRegistry::new();
        let files_b = FileRegistry::new();
        let functions_b = FunctionRegistry::new();
        let unpacker = ContextUnpacker::from_blob(&blob, Arc::clone(&tables_b), &modules_b, &files_b, &functions_b).unwrap();

        let root_b = tables_b.root_context();
        root_b.set_id(unpacker.root_id());
        let mut scope = edge;
        let (_first, leaf_b) = unpacker.classify(root_b, &mut scope).expect("packed scope must be found");
        assert_eq!(leaf_b.id(), Some(ContextId::new(7)));
    }

    #[test]
    fn unseen_scope_falls_through() {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let modules = ModuleRegistry::new();
        let files = FileRegistry::new();
        let functions = FunctionRegistry::new();
        let empty_packer = ContextPacker::new(Arc::new(ModuleRegistry::new()), Arc::new(FileRegistry::new()), Arc::new(FunctionRegistry::new()));
        let root = tables.root_context();
        root.set_id(ContextId::new(0));
        let blob = empty_packer.encode(ContextId::new(0), &tables);

        let unpacker = ContextUnpacker::from_blob(&blob, Arc::clone(&tables), &modules, &files, &functions).unwrap();
        let mut scope = NestedScope::call(Scope::Point { module: ModuleId::new(0), offset: 0x99 });
        assert!(unpacker.classify(root, &mut scope).is_none());
    }
}
