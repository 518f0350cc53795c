// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle handler dispatch (spec.md §4.5 step 5): `exit` always runs
//! after the main graph completes; `success`/`failure`/`cancel` run
//! additionally when the aggregate run status matches. Handlers are
//! ordinary steps, executed sequentially, with the main graph's final
//! outputs and step map visible to their expansions.

use crate::executor::{execute_step, ExecutorContext};
use crate::state::RunState;
use dagflow_core::node::Node;
use dagflow_core::{Clock, Dag, RunStatusKind};
use dagflow_expand::StepObservable;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved handler names applicable to a given aggregate run status, in
/// the fixed dispatch order `exit`, then the status-specific one.
fn applicable_handlers(status: RunStatusKind) -> Vec<&'static str> {
    let mut names = vec!["exit"];
    match status {
        RunStatusKind::Success => names.push("success"),
        RunStatusKind::Failed => names.push("failure"),
        RunStatusKind::Cancel => names.push("cancel"),
        RunStatusKind::PartialSuccess | RunStatusKind::Running => {}
    }
    names
}

/// Runs every handler applicable to `run_status`, sequentially, seeding
/// their variable/step-map context with the main graph's final outputs
/// and step observables (spec.md §4.5 step 5, "final run state visible
/// via the step map"). Returns the handler steps' own terminal nodes.
pub async fn run_handlers<C: Clock>(
    dag: &Dag,
    params: &[(String, String)],
    ctx: Arc<ExecutorContext<C>>,
    run_status: RunStatusKind,
    prior_outputs: HashMap<String, String>,
    prior_step_map: HashMap<String, StepObservable>,
) -> IndexMap<String, Node> {
    let applicable = applicable_handlers(run_status);
    let configured: Vec<&str> = applicable
        .into_iter()
        .filter(|name| dag.handlers.contains_key(*name))
        .collect();

    let mut state = RunState::new(configured.iter().map(|s| s.to_string()));
    state.outputs = prior_outputs;
    state.step_map = prior_step_map;
    let state = parking_lot::Mutex::new(state);

    for name in &configured {
        if let Some(step) = dag.handlers.get(*name) {
            execute_step(&ctx, step, params, &state).await;
        }
    }

    state.into_inner().nodes
}
