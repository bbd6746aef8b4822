// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The optional trace companion: a fixed header followed by a stream of
//! `(context-id, time-ns)` records. A Sink may answer `RewindStart` from
//! [`Sink::notify_timepoint`] to ask for the stream to be replayed from the
//! first record.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{ReadBytesExt, BE};
use profkit_domain::entities::Thread;
use profkit_domain::error::ProfError;
use profkit_domain::ids::ContextId;
use profkit_domain::traits::{Sink, TimepointAction};

pub const TRACE_MAGIC: &[u8; 8] = b"PROFTRCE";

pub struct TraceReader {
    path: PathBuf,
}

impl TraceReader {
    pub fn open(path: &Path) -> Result<Self, ProfError> {
        if !path.exists() {
            return Err(ProfError::invalid_header(format!("trace companion not found: {}", path.display())));
        }
        Ok(Self { path: path.to_path_buf() })
    }

    /// Replays every `(context-id, time-ns)` record, translating each id
    /// through `lookup`; records whose id does not resolve are skipped
    /// rather than treated as an error, since a trace may reference
    /// contexts this rank's load-map never encountered. Restarts from the
    /// first record whenever any Sink answers [`TimepointAction::RewindStart`].
    pub fn replay(
        &self,
        thread: &Arc<Thread>,
        sinks: &[Arc<dyn Sink>],
        mut lookup: impl FnMut(ContextId) -> Option<Arc<profkit_domain::entities::Context>>,
    ) -> Result<(), ProfError> {
        loop {
            let file = File::open(&self.path)?;
            let mut reader = BufReader::new(file);
            let mut magic = [0u8; 8];
            reader.read_exact(&mut magic)?;
            if &magic != TRACE_MAGIC {
                return Err(ProfError::invalid_header("bad trace magic"));
            }

            let mut rewind = false;
            loop {
                let context_id = match reader.read_u32::<BE>() {
                    Ok(v) => v,
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(ProfError::from(e)),
                };
                let time_ns = reader.read_u64::<BE>().map_err(ProfError::from)?;

                if let Some(context) = lookup(ContextId::new(context_id)) {
                    for sink in sinks {
                        if sink.notify_timepoint(thread, &context, time_ns) == TimepointAction::RewindStart {
                            rewind = true;
                        }
                    }
                }
            }

            if !rewind {
                return Ok(());
            }
        }
    }
}
