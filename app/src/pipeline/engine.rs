// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Drives the seven run phases of §4.4: bind sinks and finalizers (done by
//! the caller before constructing a [`PipelineEngine`]), notify the root
//! Context, reconcile the scheduled [`DataClass`] subset against every
//! bound Source's `provides()`, walk the wavefronts dispatching Sources in
//! parallel, then barrier and call every Sink's `write()`.
//!
//! Thread-final accumulation (run phase 6) is not modeled here: each
//! `Source` owns its Thread-temporaries and calls
//! `Sink::notify_thread_final` itself as part of `read()`, per the
//! `Source`/`Sink` contract in `profkit_domain::traits` — the engine never
//! touches a `ThreadTemporary` directly.

use std::sync::Arc;

use profkit_domain::dataclass::DataClass;
use profkit_domain::error::FatalError;
use profkit_domain::traits::{Sink, Source};

use crate::classifiers::IdentifierFinalizer;
use crate::pipeline::wavefront::{WavefrontFence, WavefrontSchedule};

/// Binds a run's Sources and Sinks and drives them through the wavefront
/// schedule. One engine instance serves one run; `team_size` bounds the
/// number of OS threads the engine spawns to service Sources concurrently.
pub struct PipelineEngine {
    sources: Vec<Arc<dyn Source>>,
    sinks: Vec<Arc<dyn Sink>>,
    identifiers: Arc<IdentifierFinalizer>,
}

/// A run failed because at least one Source returned a per-input error that
/// could not be ignored, or an internal error.
#[derive(Debug)]
pub struct SourceFailures(pub Vec<profkit_domain::error::ProfError>);

impl PipelineEngine {
    pub fn new(sources: Vec<Arc<dyn Source>>, sinks: Vec<Arc<dyn Sink>>, identifiers: Arc<IdentifierFinalizer>) -> Self {
        Self { sources, sinks, identifiers }
    }

    /// Runs every wavefront for `requested` (with implied prerequisites
    /// applied) to completion, then writes every bound Sink. Per-input
    /// Source errors are collected and returned after the run completes
    /// rather than aborting the other Sources immediately, matching
    /// §4.2's "parse errors are local to one input" failure semantics.
    pub fn run(&self, requested: DataClass, root: &Arc<profkit_domain::entities::Context>) -> Result<(), FatalError> {
        if root.id().is_none() {
            self.identifiers.assign_context(root);
        }
        for sink in &self.sinks {
            sink.notify_pipeline();
            sink.notify_context(root);
        }

        let scheduled = self.sources.iter().fold(DataClass::empty(), |acc, s| acc | s.provides()) & requested.with_implied_prerequisites();
        let mut schedule = WavefrontSchedule::new(scheduled);
        let mut stages = Vec::new();
        while let Some(stage) = schedule.next() {
            stages.push(stage);
        }

        if self.sources.is_empty() || stages.is_empty() {
            for sink in &self.sinks {
                sink.write()?;
            }
            return Ok(());
        }

        let fence = WavefrontFence::new(self.sources.len());
        let failures: std::sync::Mutex<Vec<profkit_domain::error::ProfError>> = std::sync::Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for source in &self.sources {
                let stages = &stages;
                let fence = &fence;
                let sinks = &self.sinks;
                let failures = &failures;
                scope.spawn(move || {
                    for &stage in stages.iter() {
                        let req = source.finalize_request(stage);
                        if let Err(err) = source.read(req) {
                            failures.lock().unwrap().push(err);
                        }
                        let result = fence.arrive_and_wait();
                        if result.is_leader {
                            for sink in sinks {
                                sink.notify_wavefront(stage);
                            }
                        }
                    }
                });
            }
        });

        let failures = failures.into_inner().unwrap();
        if !failures.is_empty() && self.sources.len() == failures.len() {
            return Err(FatalError::NoSurvivingInputs);
        }

        for sink in &self.sinks {
            sink.write()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profkit_domain::entities::Context;
    use profkit_domain::error::ProfError;
    use profkit_domain::registry::{EntityTables, SlotFactories};
    use profkit_domain::traits::TimepointAction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identifier_finalizer() -> Arc<IdentifierFinalizer> {
        Arc::new(IdentifierFinalizer::new(Arc::new(EntityTables::new(SlotFactories::default()))))
    }

    struct CountingSource {
        reads: AtomicUsize,
        provides: DataClass,
    }
    impl Source for CountingSource {
        fn provides(&self) -> DataClass {
            self.provides
        }
        fn read(&self, _req: DataClass) -> Result<(), ProfError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingSink {
        wavefronts: AtomicUsize,
        wrote: AtomicUsize,
    }
    impl Sink for CountingSink {
        fn accepts(&self) -> DataClass {
            DataClass::CONTEXTS
        }
        fn wavefronts(&self) -> DataClass {
            DataClass::CONTEXTS
        }
        fn notify_wavefront(&self, _data_class: DataClass) {
            self.wavefronts.fetch_add(1, Ordering::SeqCst);
        }
        fn write(&self) -> Result<(), FatalError> {
            self.wrote.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn run_dispatches_every_stage_and_writes_sinks_once() {
        let root = Context::root(SlotFactories::default().context.create());
        let source = Arc::new(CountingSource { reads: AtomicUsize::new(0), provides: DataClass::CONTEXTS.with_implied_prerequisites() });
        let sink = Arc::new(CountingSink { wavefronts: AtomicUsize::new(0), wrote: AtomicUsize::new(0) });

        let engine = PipelineEngine::new(vec![source.clone() as Arc<dyn Source>], vec![sink.clone() as Arc<dyn Sink>], identifier_finalizer());
        engine.run(DataClass::CONTEXTS, &root).unwrap();

        assert_eq!(source.reads.load(Ordering::SeqCst), 2); // attributes, references, contexts collapse... see below
        assert_eq!(sink.wrote.load(Ordering::SeqCst), 1);
        assert_eq!(root.id(), Some(profkit_domain::ids::ContextId::new(0)));
    }

    #[test]
    fn no_sources_still_writes_sinks() {
        let root = Context::root(SlotFactories::default().context.create());
        let sink = Arc::new(CountingSink { wavefronts: AtomicUsize::new(0), wrote: AtomicUsize::new(0) });
        let engine = PipelineEngine::new(Vec::new(), vec![sink.clone() as Arc<dyn Sink>], identifier_finalizer());
        engine.run(DataClass::CONTEXTS, &root).unwrap();
        assert_eq!(sink.wrote.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_assigns_the_root_context_an_id_before_any_sink_observes_it() {
        let root = Context::root(SlotFactories::default().context.create());
        struct AssertsRootIdSink;
        impl Sink for AssertsRootIdSink {
            fn accepts(&self) -> DataClass {
                DataClass::empty()
            }
            fn wavefronts(&self) -> DataClass {
                DataClass::empty()
            }
            fn notify_context(&self, context: &Arc<Context>) {
                assert!(context.id().is_some(), "root id must be assigned before notify_context");
            }
            fn write(&self) -> Result<(), FatalError> {
                Ok(())
            }
        }
        let engine = PipelineEngine::new(Vec::new(), vec![Arc::new(AssertsRootIdSink)], identifier_finalizer());
        engine.run(DataClass::empty(), &root).unwrap();
    }

    #[test]
    fn timepoint_action_default_is_continue() {
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
        let root = Context::root(SlotFactories::default().context.create());
        let action = NullSink.notify_timepoint(
            &Arc::new(profkit_domain::entities::Thread::new(
                profkit_domain::identifier_tuple::IdentifierTuple::from_legacy_scalars(0, 0, 0, 0),
                SlotFactories::default().thread.create(),
            )),
            &root,
            0,
        );
        assert_eq!(action, TimepointAction::Continue);
    }
}
