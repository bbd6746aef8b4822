// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A Context is one node of the calling-context tree. Children are uniqued
//! by [`NestedScope`] under a single parent; the tree is built once and
//! never mutated except by inserting new children.

use crate::ids::ContextId;
use crate::scope::{NestedScope, Relation, Scope};
use crate::uniquing::UniqueSet;
use crate::userdata::SlotSpace;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};

pub struct Context {
    parent: Option<Weak<Context>>,
    /// How this Context relates to its parent; meaningless on the root,
    /// which has no incoming edge.
    relation: Relation,
    scope: Scope,
    children: UniqueSet<NestedScope, Context>,
    id: OnceCell<ContextId>,
    extensions: SlotSpace,
}

impl Context {
    /// Builds the single root `global` Context. Owned by the Pipeline, not
    /// by any parent.
    pub fn root(extensions: SlotSpace) -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            relation: Relation::Call,
            scope: Scope::Global,
            children: UniqueSet::new(),
            id: OnceCell::new(),
            extensions,
        })
    }

    pub fn parent(&self) -> Option<Arc<Context>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The [`Relation`] labeling the edge from this Context's parent to
    /// itself. Meaningless (and arbitrary) on the root.
    pub fn incoming_relation(&self) -> Relation {
        self.relation
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn id(&self) -> Option<ContextId> {
        self.id.get().copied()
    }

    /// Assigns the dense id for this context; idempotent, matching the
    /// identifier finalizer's "same id on every access" guarantee.
    pub fn set_id(&self, id: ContextId) -> ContextId {
        *self.id.get_or_init(|| id)
    }

    /// Finds or creates the child reached by `edge` from `self`, uniqued by
    /// `NestedScope` as required by the context-tree uniqueness invariant.
    pub fn get_or_create_child(
        self: &Arc<Self>,
        edge: NestedScope,
        extensions_for_new: impl FnOnce() -> SlotSpace,
    ) -> (Arc<Context>, bool) {
        let parent_weak = Arc::downgrade(self);
        self.children.get_or_insert_with(edge, move || Context {
            parent: Some(parent_weak),
            relation: edge.relation,
            scope: edge.scope,
            children: UniqueSet::new(),
            id: OnceCell::new(),
            extensions: extensions_for_new(),
        })
    }

    pub fn children(&self) -> Vec<Arc<Context>> {
        self.children.values()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn extensions(&self) -> &SlotSpace {
        &self.extensions
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("scope", &self.scope)
            .field("id", &self.id.get())
            .field("children", &self.child_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ModuleId;
    use crate::userdata::SlotRegistry;

    fn empty_slots() -> SlotSpace {
        SlotRegistry::new().freeze().create()
    }

    #[test]
    fn duplicate_nested_scope_reuses_child() {
        let root = Context::root(empty_slots());
        let edge = NestedScope::call(Scope::Point { module: ModuleId::new(0), offset: 0x1000 });

        let (c1, inserted1) = root.get_or_create_child(edge, empty_slots);
        let (c2, inserted2) = root.get_or_create_child(edge, empty_slots);

        assert!(inserted1);
        assert!(!inserted2);
        assert!(Arc::ptr_eq(&c1, &c2));
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn child_parent_roundtrip() {
        let root = Context::root(empty_slots());
        let edge = NestedScope::call(Scope::Unknown);
        let (child, _) = root.get_or_create_child(edge, empty_slots);

        let parent = child.parent().expect("child has a parent");
        assert!(Arc::ptr_eq(&parent, &root));
        assert!(root.is_root());
        assert!(!child.is_root());
    }

    #[test]
    fn child_remembers_its_incoming_relation() {
        let root = Context::root(empty_slots());
        let edge = NestedScope::inlined_call(Scope::Unknown);
        let (child, _) = root.get_or_create_child(edge, empty_slots);
        assert_eq!(child.incoming_relation(), Relation::InlinedCall);
    }

    #[test]
    fn id_assignment_is_idempotent() {
        let root = Context::root(empty_slots());
        let first = root.set_id(ContextId::new(5));
        let second = root.set_id(ContextId::new(99));
        assert_eq!(first, second);
        assert_eq!(root.id(), Some(ContextId::new(5)));
    }
}
