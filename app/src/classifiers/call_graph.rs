// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Call-graph-driven context reconstruction. A GPU sample that lands inside
//! a kernel whose caller is unknown at sample time carries only the kernel's
//! containing function; [`resolve`] walks the reversed call graph the
//! struct classifier built (`callee -> {(caller offset, caller function)}`)
//! back to every root (a function with no recorded caller), pushing each
//! root-to-sample path it finds as a template into a [`FlowGraph`]. Simple
//! cycles are truncated with a seen-set popped on unwind, so a recursive
//! call chain contributes one path per distinct entry rather than looping.

use profkit_domain::ids::FunctionId;
use profkit_domain::scope::{NestedScope, Scope};
use std::collections::HashSet;

use crate::classifiers::struct_classifier::CompiledStruct;

/// One root-to-sample call path, root first.
#[derive(Debug, Clone)]
pub struct CallPath {
    pub edges: Vec<NestedScope>,
}

/// Whether a metric value observed along a reconstructed path belongs to
/// the sampled function itself (interior) or one of its reconstructed
/// callers (exterior); the caller-supplied handler decides how each is
/// folded into the CCT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    Interior,
    Exterior,
}

/// Accumulates the templates [`resolve`] discovers for one sample.
#[derive(Default)]
pub struct FlowGraph {
    paths: Vec<CallPath>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: CallPath) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[CallPath] {
        &self.paths
    }

    /// Invokes `handler` once per function on every discovered path,
    /// tagging the sampled leaf function as interior and every
    /// reconstructed caller as exterior.
    pub fn notify(&self, handler: &mut dyn FnMut(FunctionId, PathRole)) {
        for path in &self.paths {
            for (i, edge) in path.edges.iter().enumerate() {
                if let Scope::Function(function) = edge.scope {
                    let role = if i + 1 == path.edges.len() { PathRole::Interior } else { PathRole::Exterior };
                    handler(function, role);
                }
            }
        }
    }
}

/// DFS over `compiled`'s reversed call graph from `leaf`'s every recorded
/// caller back to a root (a function nothing in the graph calls), pushing
/// each discovered root-to-`leaf` path into `flow_graph`.
pub fn resolve(compiled: &CompiledStruct, leaf: FunctionId, flow_graph: &mut FlowGraph) {
    let mut seen = HashSet::new();
    let mut path = vec![NestedScope::call(Scope::Function(leaf))];
    walk(compiled, leaf, &mut seen, &mut path, flow_graph);
}

fn walk(compiled: &CompiledStruct, callee: FunctionId, seen: &mut HashSet<u32>, path: &mut Vec<NestedScope>, flow_graph: &mut FlowGraph) {
    let callers = compiled.callers_of(callee);
    if callers.is_empty() {
        flow_graph.push(CallPath { edges: path.iter().rev().cloned().collect() });
        return;
    }

    if !seen.insert(callee.get()) {
        // Cycle: truncate here rather than recursing forever: the caller
        // already appears deeper in `path`, so this is as far back as the
        // path can usefully go.
        flow_graph.push(CallPath { edges: path.iter().rev().cloned().collect() });
        return;
    }

    for &(_offset, caller_id) in callers {
        let caller = FunctionId::new(caller_id);
        path.push(NestedScope::call(Scope::Function(caller)));
        walk(compiled, caller, seen, path, flow_graph);
        path.pop();
    }

    seen.remove(&callee.get());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a `CompiledStruct` whose reversed call graph is exactly
    /// `edges`: each `(callee, caller)` pair records `caller` at call-site
    /// offset 0.
    fn compiled_with_edges(edges: &[(u32, u32)]) -> CompiledStruct {
        let mut reversed: std::collections::HashMap<u32, Vec<(u64, u32)>> = std::collections::HashMap::new();
        for &(callee, caller) in edges {
            reversed.entry(callee).or_default().push((0, caller));
        }
        CompiledStruct::for_test(reversed)
    }

    #[test]
    fn single_caller_chain_produces_one_root_to_leaf_path() {
        // callee 2 is called by 1, which is called by 0 (a root).
        let compiled = compiled_with_edges(&[(2, 1), (1, 0)]);
        let mut flow_graph = FlowGraph::new();
        resolve(&compiled, FunctionId::new(2), &mut flow_graph);

        assert_eq!(flow_graph.paths().len(), 1);
        let path = &flow_graph.paths()[0];
        assert_eq!(path.edges.len(), 3);
        assert_eq!(path.edges[0].scope, Scope::Function(FunctionId::new(0)));
        assert_eq!(path.edges[2].scope, Scope::Function(FunctionId::new(2)));
    }

    #[test]
    fn leaf_with_no_recorded_caller_is_its_own_single_node_path() {
        let compiled = compiled_with_edges(&[]);
        let mut flow_graph = FlowGraph::new();
        resolve(&compiled, FunctionId::new(9), &mut flow_graph);

        assert_eq!(flow_graph.paths().len(), 1);
        assert_eq!(flow_graph.paths()[0].edges.len(), 1);
    }

    #[test]
    fn cycle_is_truncated_rather_than_looping_forever() {
        // 1 calls 2 and 2 calls 1: a cycle with no root.
        let compiled = compiled_with_edges(&[(2, 1), (1, 2)]);
        let mut flow_graph = FlowGraph::new();
        resolve(&compiled, FunctionId::new(2), &mut flow_graph);

        assert!(!flow_graph.paths().is_empty());
        assert!(flow_graph.paths()[0].edges.len() <= 3);
    }

    #[test]
    fn notify_tags_only_the_deepest_function_as_interior() {
        let compiled = compiled_with_edges(&[(2, 1), (1, 0)]);
        let mut flow_graph = FlowGraph::new();
        resolve(&compiled, FunctionId::new(2), &mut flow_graph);

        let mut interior = Vec::new();
        let mut exterior = Vec::new();
        flow_graph.notify(&mut |function, role| match role {
            PathRole::Interior => interior.push(function),
            PathRole::Exterior => exterior.push(function),
        });
        assert_eq!(interior, vec![FunctionId::new(2)]);
        assert_eq!(exterior, vec![FunctionId::new(0), FunctionId::new(1)]);
    }
}
