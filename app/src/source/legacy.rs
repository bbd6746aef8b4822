// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The legacy 2.0/3.0 measurement-format [`Source`]. Differs from
//! [`super::measurement::MeasurementSource`] only in its prelude: instead
//! of a profile-identifier tuple dictionary, the file carries four scalar
//! fields (`node-id`, `mpi-rank`, `thread-id`, `hostid`) that
//! [`IdentifierTuple::from_legacy_scalars`] turns into the same tuple shape
//! the rest of the pipeline expects. Legacy files never carry a trace
//! companion tagged with timepoints, so `provides()` never reports
//! [`DataClass::TIMEPOINTS`].

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use profkit_domain::dataclass::DataClass;
use profkit_domain::entities::ThreadTemporary;
use profkit_domain::error::ProfError;
use profkit_domain::identifier_tuple::IdentifierTuple;
use profkit_domain::registry::EntityTables;
use profkit_domain::traits::{Sink, Source};

use crate::classifiers::IdentifierFinalizer;
use crate::pipeline::module_registry::ModuleRegistry;
use crate::pipeline::router::ContextRouter;
use crate::source::core::MeasurementReaderCore;
use crate::source::header::{read_name_value_header, read_prelude, read_u32, read_u64};

/// One measurement-format v2.0/3.0 input file.
pub struct LegacySource {
    path: PathBuf,
    core: MeasurementReaderCore,
    done: Mutex<bool>,
}

impl LegacySource {
    pub fn new(
        path: PathBuf,
        router: Arc<ContextRouter>,
        tables: Arc<EntityTables>,
        modules: Arc<ModuleRegistry>,
        identifiers: Arc<IdentifierFinalizer>,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Self {
        Self { path, core: MeasurementReaderCore::new(router, tables, modules, identifiers, sinks), done: Mutex::new(false) }
    }
}

impl Source for LegacySource {
    fn provides(&self) -> DataClass {
        DataClass::METRICS.with_implied_prerequisites()
    }

    fn read(&self, _req: DataClass) -> Result<(), ProfError> {
        let mut done = self.done.lock().unwrap();
        if *done {
            return Ok(());
        }

        let file = File::open(&self.path).map_err(|e| ProfError::invalid_header(format!("{}: {e}", self.path.display())))?;
        let mut reader = BufReader::new(file);
        let (version, marker) = read_prelude(&mut reader)?;
        if !version.is_legacy() {
            return Err(ProfError::UnsupportedVersion { major: version.major, minor: version.minor });
        }

        let _header = read_name_value_header(&mut reader, marker)?;
        let node_id = read_u32(&mut reader, marker)?;
        let mpi_rank = read_u32(&mut reader, marker)? as i32;
        let thread_id = read_u32(&mut reader, marker)? as i32;
        let hostid = read_u64(&mut reader, marker)? as u32;
        let id_tuple = IdentifierTuple::from_legacy_scalars(node_id, mpi_rank, thread_id, hostid);

        let (thread, inserted) = self.core.tables.get_or_insert_thread(id_tuple);
        if inserted {
            self.core.identifiers.assign_thread(&thread);
            for sink in &self.core.sinks {
                sink.notify_thread(&thread);
            }
        }

        let mut thread_temp = ThreadTemporary::new();
        let epoch_count = read_u32(&mut reader, marker)?;
        for _ in 0..epoch_count {
            self.core.read_epoch(&mut reader, marker, &mut thread_temp)?;
        }

        for sink in &self.core.sinks {
            sink.notify_thread_final(&thread, &mut thread_temp);
        }

        *done = true;
        Ok(())
    }
}
