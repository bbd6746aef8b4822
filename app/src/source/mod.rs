// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! [`Source`](profkit_domain::traits::Source) implementations for the
//! on-disk measurement formats: the current version 4.0 format, its legacy
//! 2.0/3.0 predecessor, and the optional trace companion.

mod core;
mod header;
mod identifier_tuple_codec;
mod legacy;
mod measurement;
mod sentinels;
mod trace;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use profkit_domain::error::ProfError;
use profkit_domain::registry::EntityTables;
use profkit_domain::traits::{Sink, Source};

use crate::classifiers::IdentifierFinalizer;
use crate::pipeline::module_registry::ModuleRegistry;
use crate::pipeline::router::ContextRouter;

pub use legacy::LegacySource;
pub use measurement::MeasurementSource;
pub use trace::TraceReader;

/// Peeks `path`'s format-version byte to pick the matching [`Source`]
/// implementation: major version 4 gets [`MeasurementSource`], 2 and 3 get
/// [`LegacySource`]. Reopens the file for the chosen Source's own `read()`,
/// since neither reader supports resuming from a partially consumed stream.
pub fn open_source(
    path: PathBuf,
    router: Arc<ContextRouter>,
    tables: Arc<EntityTables>,
    modules: Arc<ModuleRegistry>,
    identifiers: Arc<IdentifierFinalizer>,
    sinks: Vec<Arc<dyn Sink>>,
) -> Result<Arc<dyn Source>, ProfError> {
    let file = File::open(&path).map_err(|e| ProfError::invalid_header(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let (version, _marker) = header::read_prelude(&mut reader)?;
    drop(reader);

    if version.is_current() {
        Ok(Arc::new(MeasurementSource::new(path, router, tables, modules, identifiers, sinks)))
    } else {
        Ok(Arc::new(LegacySource::new(path, router, tables, modules, identifiers, sinks)))
    }
}
