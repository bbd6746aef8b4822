// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # External Interfaces
//!
//! The domain layer defines the contracts Sources, Sinks, Finalizers, and a
//! distributed rank transport must satisfy. Concrete implementations — the
//! measurement-format parser, the sparse database writer, the struct-file
//! classifier, the single-process transport — live in the application
//! layer and are bound to these traits at pipeline construction.
//!
//! ## Implementation Strategy
//!
//! ### Domain layer (this module)
//! - Defines the trait contracts and the small capability set each
//!   implementor declares (`provides`/`requires`/`accepts`)
//! - Remains storage- and format-agnostic
//!
//! ### Application layer
//! - Provides concrete Sources (measurement-format readers), Sinks (the
//!   sparse DB writer), Finalizers (classifiers), and a `RankTransport`
//! - Registers them with the pipeline engine at startup

use std::sync::Arc;

use crate::dataclass::{DataClass, ExtensionClass};
use crate::entities::{Context, Metric, Thread, ThreadTemporary};
use crate::error::{FatalError, ProfError};
use crate::scope::NestedScope;

/// A Source's response to a trace replay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimepointAction {
    Continue,
    /// Request rereading the trace from the first record.
    RewindStart,
}

/// The result of a Sink cooperating with the idle thread pool during the
/// final barrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelpResult {
    pub completed: bool,
    pub contributed: usize,
}

/// One binary profile input (or trace companion). Implemented by the
/// measurement-format v4.0 reader and the legacy 2.0/3.0 adapter.
pub trait Source: Send + Sync {
    /// The maximal set of data classes this Source can emit.
    fn provides(&self) -> DataClass;

    /// Rewrites a request by adding implied prerequisites. The default
    /// implementation applies the universal rule of §6; Sources generally
    /// should not override this.
    fn finalize_request(&self, req: DataClass) -> DataClass {
        req.with_implied_prerequisites()
    }

    /// Blocks until `req` is satisfied or the Source is exhausted. Must be
    /// idempotent: requesting an already-satisfied bit a second time emits
    /// no new events.
    fn read(&self, req: DataClass) -> Result<(), ProfError>;
}

/// A consumer of pipeline events; the sparse database writer is the
/// primary concrete Sink.
pub trait Sink: Send + Sync {
    fn accepts(&self) -> DataClass;
    fn wavefronts(&self) -> DataClass;
    fn requires(&self) -> ExtensionClass {
        ExtensionClass::empty()
    }

    fn notify_pipeline(&self) {}
    fn notify_wavefront(&self, _data_class: DataClass) {}
    fn notify_thread(&self, _thread: &Arc<Thread>) {}
    fn notify_thread_final(&self, _thread: &Arc<Thread>, _temporary: &mut ThreadTemporary) {}
    fn notify_context(&self, _context: &Arc<Context>) {}
    fn notify_context_expansion(&self, _from: &Arc<Context>, _edge: NestedScope, _to: &Arc<Context>) {}
    fn notify_metric(&self, _metric: &Arc<Metric>) {}
    fn notify_timepoint(&self, _thread: &Arc<Thread>, _context: &Arc<Context>, _time_ns: u64) -> TimepointAction {
        TimepointAction::Continue
    }

    /// Called once, after the final wavefront's barrier. Fatal failures here
    /// abort the run.
    fn write(&self) -> Result<(), FatalError>;

    fn help(&self) -> HelpResult {
        HelpResult::default()
    }
}

/// A classifier or id-assignment collaborator bound to the pipeline at
/// startup. The pipeline validates the provides/requires DAG at binding
/// time; an unsatisfied `requires` is fatal.
pub trait Finalizer: Send + Sync {
    fn provides(&self) -> ExtensionClass;
    fn requires(&self) -> ExtensionClass {
        ExtensionClass::empty()
    }

    /// Attempts to classify a `point` NestedScope into a chain. Returns the
    /// `(first_inserted, leaf)` range the engine must splice between the
    /// parent and the original leaf, or `None` if this finalizer does not
    /// claim the scope.
    fn classify(&self, _parent: &Arc<Context>, _scope: &mut NestedScope) -> Option<(Arc<Context>, Arc<Context>)> {
        None
    }
}

/// The distributed-messaging collaborator. A real multi-host deployment
/// supplies an implementation backed by a collective-messaging library;
/// this crate ships only `SingleProcessTransport` (`world_size() == 1`).
pub trait RankTransport: Send + Sync {
    fn rank(&self) -> u32;
    fn world_size(&self) -> u32;
    fn send_to(&self, rank: u32, tag: u32, bytes: &[u8]) -> Result<(), FatalError>;
    fn recv_from(&self, rank: u32, tag: u32) -> Result<Vec<u8>, FatalError>;
    fn broadcast_from(&self, root: u32, bytes: &[u8]) -> Result<Vec<u8>, FatalError>;
    fn barrier(&self);
    fn allreduce_sum(&self, value: u64) -> u64;
    fn exscan_sum(&self, value: u64) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;
    impl Sink for NullSink {
        fn accepts(&self) -> DataClass {
            DataClass::empty()
        }
        fn wavefronts(&self) -> DataClass {
            DataClass::empty()
        }
        fn write(&self) -> Result<(), FatalError> {
            Ok(())
        }
    }

    #[test]
    fn default_sink_methods_are_callable() {
        let sink = NullSink;
        assert!(sink.write().is_ok());
        assert_eq!(sink.help().contributed, 0);
    }
}
