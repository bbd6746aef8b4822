// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `process` use case: discover measurement inputs, bind the classifier
//! chain and the sparse DB sink to a [`PipelineEngine`], run it, then resolve
//! every canonicalized module/file's filesystem path.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use profkit_bootstrap::config::Settings;
use profkit_domain::dataclass::DataClass;
use profkit_domain::error::FatalError;
use profkit_domain::registry::{EntityTables, SlotFactories};
use profkit_domain::traits::{Finalizer, Sink, Source};

use crate::classifiers::{DerivedStatsEvaluator, DirectClassifier, IdentifierFinalizer, LogicalClassifier, NullDwarfReader, PathFinalizer, StructClassifier};
use crate::concurrency::ParallelForEach;
use crate::pipeline::{ContextRouter, FileRegistry, FunctionRegistry, ModuleRegistry, PipelineEngine};
use crate::source;
use crate::sparsedb::SparseDbSink;
use crate::transport::SingleProcessTransport;

use super::validate_config::validate_config;

/// Walks `roots`, collecting every `.hpcrun` measurement file under a
/// directory and taking any file argument as-is. Order is unspecified;
/// `open_sources` below bounds the concurrency that reads them, not the
/// order they're discovered in.
fn discover_inputs(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for root in roots {
        if root.is_dir() {
            walk_dir(root, &mut found);
        } else {
            found.push(root.clone());
        }
    }
    found
}

fn walk_dir(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "could not list input directory");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_dir(&path, found);
        } else if path.extension().and_then(|e| e.to_str()) == Some("hpcrun") {
            found.push(path);
        }
    }
}

/// Opens every discovered input concurrently, bounded by `team_size`
/// worker threads draining a shared [`ParallelForEach`] queue. A per-input
/// open failure is logged and the input dropped; it never aborts the run.
#[allow(clippy::too_many_arguments)]
fn open_sources(
    team_size: usize,
    inputs: Vec<PathBuf>,
    router: Arc<ContextRouter>,
    tables: Arc<EntityTables>,
    modules: Arc<ModuleRegistry>,
    identifiers: Arc<IdentifierFinalizer>,
    sinks: Vec<Arc<dyn Sink>>,
) -> Vec<Arc<dyn Source>> {
    let opened: Mutex<Vec<Arc<dyn Source>>> = Mutex::new(Vec::new());
    let queue = ParallelForEach::new(inputs);

    std::thread::scope(|scope| {
        for _ in 0..team_size.max(1) {
            let queue = &queue;
            let opened = &opened;
            let router = Arc::clone(&router);
            let tables = Arc::clone(&tables);
            let modules = Arc::clone(&modules);
            let identifiers = Arc::clone(&identifiers);
            let sinks = sinks.clone();
            scope.spawn(move || {
                queue.contribute(|path| {
                    match source::open_source(path.clone(), Arc::clone(&router), Arc::clone(&tables), Arc::clone(&modules), Arc::clone(&identifiers), sinks.clone()) {
                        Ok(source) => opened.lock().unwrap().push(source),
                        Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping unreadable input"),
                    }
                });
            });
        }
    });

    opened.into_inner().unwrap()
}

/// Runs a full merge of `inputs` into `settings.dir()`'s `profile.db` /
/// `cct.db`. Per-input parse errors are logged and that input dropped; the
/// run only fails if every input was dropped or a Sink's final write fails.
pub fn process(settings: &Settings, inputs: &[PathBuf]) -> Result<(), FatalError> {
    validate_config(settings).map_err(|e| FatalError::Other(e.to_string()))?;

    let tables = Arc::new(EntityTables::new(SlotFactories::default()));
    let modules = Arc::new(ModuleRegistry::new());
    let files = Arc::new(FileRegistry::new());
    let functions = Arc::new(FunctionRegistry::new());
    let identifiers = Arc::new(IdentifierFinalizer::new(Arc::clone(&tables)));

    let classifiers: Vec<Arc<dyn Finalizer>> = vec![
        Arc::new(StructClassifier::new(
            Arc::clone(&tables),
            Arc::clone(&modules),
            Arc::clone(&files),
            Arc::clone(&functions),
            settings.struct_dir().map(Path::to_path_buf),
        )),
        Arc::new(LogicalClassifier::new(Arc::clone(&tables), Arc::clone(&modules), Arc::clone(&files), Arc::clone(&functions))),
        Arc::new(DirectClassifier::new(
            Arc::clone(&tables),
            Arc::clone(&modules),
            Arc::clone(&files),
            Arc::clone(&functions),
            Arc::new(NullDwarfReader),
            settings.dwarf_max_size(),
        )),
    ];

    let derived = Arc::new(DerivedStatsEvaluator::new(Arc::clone(&tables), Arc::clone(&identifiers), settings.stats()));
    let transport = Arc::new(SingleProcessTransport::new());
    let sink: Arc<SparseDbSink> = Arc::new(SparseDbSink::new(Arc::clone(&tables), transport, settings.dir().to_path_buf(), derived));
    let sinks: Vec<Arc<dyn Sink>> = vec![sink];

    let router = Arc::new(ContextRouter::new(Arc::clone(&tables), classifiers, sinks.clone(), Arc::clone(&identifiers)));

    let discovered = discover_inputs(inputs);
    if discovered.is_empty() {
        return Err(FatalError::NoSurvivingInputs);
    }
    let sources = open_sources(settings.team_size(), discovered, router, Arc::clone(&tables), Arc::clone(&modules), Arc::clone(&identifiers), sinks.clone());
    if sources.is_empty() {
        return Err(FatalError::NoSurvivingInputs);
    }

    let mut requested = DataClass::METRICS;
    if settings.include_traces() {
        requested |= DataClass::TIMEPOINTS;
    }

    let engine = PipelineEngine::new(sources, sinks, Arc::clone(&identifiers));
    let result = engine.run(requested, tables.root_context());

    resolve_paths(&tables, settings);

    result
}

/// Assigns a resolved filesystem path to every canonicalized module and
/// source file, per the bound prefix substitutions. Neither `profile.db`
/// nor `cct.db` reference resolved paths directly — they carry dense ids
/// only — so this is only observable through the `Module`/`SourceFile`
/// entities themselves (e.g. by a future consumer walking `tables`).
fn resolve_paths(tables: &Arc<EntityTables>, settings: &Settings) {
    let path_finalizer = PathFinalizer::new(settings.path_substitutions().to_vec(), settings.foreign());
    for module in tables.modules() {
        path_finalizer.resolve_module(&module);
    }
    for file in tables.source_files() {
        path_finalizer.resolve_file(&file);
    }
}
