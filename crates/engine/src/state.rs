// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run's shared, lock-guarded state: the `Node` map, the published
//! output map, and the step map (spec.md §5 "Shared state"). All three
//! live behind one scheduler-owned lock; mutation happens only at step
//! boundaries so contention stays low.

use dagflow_core::node::{Node, NodeStatus};
use dagflow_expand::StepObservable;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Shared state for one run, guarded by a single lock (spec.md §5).
/// Writers release the lock before a step's downstream edge is activated,
/// so "writes to a step's Node happen-before reads of that step by
/// downstream steps" (spec.md §5 "Ordering") holds without extra
/// synchronization.
#[derive(Debug, Default)]
pub struct RunState {
    /// Insertion-ordered so a [`dagflow_core::RunStatus`] built from this
    /// map lists nodes in declaration order, matching the DAG's own
    /// ordered-`env` texture.
    pub nodes: IndexMap<String, Node>,
    /// Named outputs published by steps with an `output` field, keyed by
    /// that variable name (spec.md §3 `StepOutput`, §4.2 "variables").
    pub outputs: HashMap<String, String>,
    /// Per-step observables (`stdout`, `stderr`, `exitCode`) keyed by step
    /// name, consulted by `${step.stdout}`-style references (spec.md §4.2
    /// options table, "stepMap").
    pub step_map: HashMap<String, StepObservable>,
}

impl RunState {
    /// Seeds one `NotStarted` node per step name, in declaration order.
    pub fn new(step_names: impl IntoIterator<Item = String>) -> Self {
        let mut nodes = IndexMap::new();
        for name in step_names {
            nodes.insert(name.clone(), Node::new(name));
        }
        Self {
            nodes,
            outputs: HashMap::new(),
            step_map: HashMap::new(),
        }
    }

    pub fn node_status(&self, name: &str) -> Option<NodeStatus> {
        self.nodes.get(name).map(|n| n.status)
    }

    /// Snapshot of the variable mapping and step map for building this
    /// step's [`dagflow_expand::ExpandOptions`] — cloned under the lock,
    /// then released, so expansion (which may shell out for command
    /// substitution) never runs while holding the lock.
    pub fn expansion_snapshot(&self) -> (HashMap<String, String>, HashMap<String, StepObservable>) {
        (self.outputs.clone(), self.step_map.clone())
    }
}
