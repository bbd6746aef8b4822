// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! [`ContextRouter`] is the Source-facing entry point for turning a raw
//! `NestedScope` into a Context: it tries each bound classifier in order,
//! falls back to a plain child insertion when none claims the scope, and
//! notifies every bound Sink of the resulting expansion exactly once per
//! `(from, scope)` pair.

use std::sync::Arc;

use profkit_domain::entities::Context;
use profkit_domain::registry::EntityTables;
use profkit_domain::scope::NestedScope;
use profkit_domain::traits::{Finalizer, Sink};

use crate::classifiers::IdentifierFinalizer;

/// Binds the ordered classifier chain (struct, logical, direct) and the
/// sinks that must be told about every new Context, to the shared entity
/// tables built at startup.
pub struct ContextRouter {
    tables: Arc<EntityTables>,
    classifiers: Vec<Arc<dyn Finalizer>>,
    sinks: Vec<Arc<dyn Sink>>,
    identifiers: Arc<IdentifierFinalizer>,
}

impl ContextRouter {
    pub fn new(tables: Arc<EntityTables>, classifiers: Vec<Arc<dyn Finalizer>>, sinks: Vec<Arc<dyn Sink>>, identifiers: Arc<IdentifierFinalizer>) -> Self {
        Self { tables, classifiers, sinks, identifiers }
    }

    /// Resolves `edge` from `parent`, trying each classifier in binding
    /// order before falling back to a plain uniqued child. Every inserted
    /// Context along the way gets a dense id and a `notify_context`/
    /// `notify_context_expansion` broadcast to every bound Sink.
    pub fn get_or_create_context(&self, parent: &Arc<Context>, edge: NestedScope) -> Arc<Context> {
        for classifier in &self.classifiers {
            let mut scope = edge;
            if let Some((first, leaf)) = classifier.classify(parent, &mut scope) {
                self.assign_ids_from(parent, &leaf);
                self.notify_expansion(parent, edge, &first, &leaf);
                return leaf;
            }
        }

        let (child, inserted) = parent.get_or_create_child(edge, || self.tables.context_slots());
        if inserted {
            self.identifiers.assign_context(&child);
            for sink in &self.sinks {
                sink.notify_context(&child);
            }
        }
        self.notify_expansion(parent, edge, &child, &child);
        child
    }

    /// Assigns dense ids to every Context spliced in between `parent`
    /// (exclusive) and `leaf` (inclusive) by walking the parent chain
    /// upward until it reaches `parent` again.
    fn assign_ids_from(&self, parent: &Arc<Context>, leaf: &Arc<Context>) {
        let mut current = Arc::clone(leaf);
        loop {
            if current.id().is_none() {
                self.identifiers.assign_context(&current);
                for sink in &self.sinks {
                    sink.notify_context(&current);
                }
            }
            if Arc::ptr_eq(&current, parent) {
                break;
            }
            match current.parent() {
                Some(next) => current = next,
                None => break,
            }
        }
    }

    fn notify_expansion(&self, from: &Arc<Context>, edge: NestedScope, _first: &Arc<Context>, to: &Arc<Context>) {
        for sink in &self.sinks {
            sink.notify_context_expansion(from, edge, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profkit_domain::dataclass::DataClass;
    use profkit_domain::ids::ModuleId;
    use profkit_domain::registry::SlotFactories;
    use profkit_domain::scope::Scope;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        expansions: AtomicUsize,
    }
    impl Sink for CountingSink {
        fn accepts(&self) -> DataClass {
            DataClass::CONTEXTS
        }
        fn wavefronts(&self) -> DataClass {
            DataClass::CONTEXTS
        }
        fn notify_context_expansion(&self, _from: &Arc<Context>, _edge: NestedScope, _to: &Arc<Context>) {
            self.expansions.fetch_add(1, Ordering::SeqCst);
        }
        fn write(&self) -> Result<(), profkit_domain::error::FatalError> {
            Ok(())
        }
    }

    #[test]
    fn fallback_inserts_plain_child_and_assigns_id_when_no_classifier_claims() {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let identifiers = Arc::new(IdentifierFinalizer::new(Arc::clone(&tables)));
        let sink: Arc<CountingSink> = Arc::new(CountingSink { expansions: AtomicUsize::new(0) });
        let router = ContextRouter::new(Arc::clone(&tables), Vec::new(), vec![sink.clone() as Arc<dyn Sink>], Arc::clone(&identifiers));

        let root = tables.root_context();
        let edge = NestedScope::call(Scope::Point { module: ModuleId::new(0), offset: 0x10 });
        let child = router.get_or_create_context(root, edge);

        assert!(child.id().is_some());
        assert_eq!(sink.expansions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_scope_reuses_the_same_context() {
        let tables = Arc::new(EntityTables::new(SlotFactories::default()));
        let identifiers = Arc::new(IdentifierFinalizer::new(Arc::clone(&tables)));
        let router = ContextRouter::new(Arc::clone(&tables), Vec::new(), Vec::new(), identifiers);

        let root = tables.root_context();
        let edge = NestedScope::call(Scope::Point { module: ModuleId::new(1), offset: 0x20 });
        let a = router.get_or_create_context(root, edge);
        let b = router.get_or_create_context(root, edge);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
