// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The DAG scheduler (spec.md §4.5): indegree-driven dispatch over a
//! bounded worker pool, cascading cancellation across edges that would
//! otherwise propagate `Failed`/`Skipped` past a dependent that doesn't
//! opt in via `continueOn`, and the run-level status aggregate.

use crate::executor::{execute_step, ExecutorContext};
use crate::state::RunState;
use dagflow_core::graph::{adjacency_of, Adjacency};
use dagflow_core::node::{Node, NodeStatus};
use dagflow_core::{Clock, Dag, RunStatusKind, Step};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

/// Outcome of running the main step graph to completion (handlers are run
/// separately by [`crate::handlers::run_handlers`] once this returns).
pub struct GraphOutcome {
    pub nodes: indexmap::IndexMap<String, Node>,
    pub outputs: HashMap<String, String>,
    pub step_map: HashMap<String, dagflow_expand::StepObservable>,
    pub status: RunStatusKind,
}

/// Marks `name` and every reachable descendant `Cancel`, stopping at any
/// node already in a terminal status (spec.md §4.5 step 2, third bullet:
/// cancellation propagates unconditionally). Returns the names actually
/// transitioned, so the caller can advance its finished-count.
fn cascade_cancel(name: &str, adjacency: &Adjacency, state: &parking_lot::Mutex<RunState>) -> Vec<String> {
    let mut newly_cancelled = Vec::new();
    let mut stack = vec![name.to_string()];

    while let Some(current) = stack.pop() {
        let transitioned = {
            let mut guard = state.lock();
            match guard.nodes.get_mut(&current) {
                Some(node) if !node.status.is_terminal() => node.transition_to(NodeStatus::Cancel),
                _ => false,
            }
        };
        if transitioned {
            newly_cancelled.push(current.clone());
            for child in adjacency.children(&current) {
                stack.push(child.clone());
            }
        }
    }

    newly_cancelled
}

/// Applies the outcome of one finished step to its dependents' indegree
/// counters, per the edge rules in spec.md §4.5 step 2. Steps whose edge
/// is not satisfied are cascade-cancelled rather than left dangling.
fn on_step_finished(
    parent_status: NodeStatus,
    parent_name: &str,
    step_by_name: &HashMap<String, Step>,
    adjacency: &Adjacency,
    indegree: &mut HashMap<String, usize>,
    state: &parking_lot::Mutex<RunState>,
    ready: &mut VecDeque<String>,
    finished: &mut usize,
) {
    for child in adjacency.children(parent_name) {
        let already_terminal = state
            .lock()
            .node_status(child)
            .map(NodeStatus::is_terminal)
            .unwrap_or(true);
        if already_terminal {
            continue;
        }

        let child_step = step_by_name.get(child);
        let edge_ok = match parent_status {
            NodeStatus::Success => true,
            NodeStatus::Skipped => child_step.is_some_and(|s| s.continue_on.skipped),
            NodeStatus::Failed => child_step.is_some_and(|s| s.continue_on.failure),
            NodeStatus::Cancel | NodeStatus::NotStarted | NodeStatus::Running => false,
        };

        if edge_ok {
            if let Some(count) = indegree.get_mut(child) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.push_back(child.clone());
                }
            }
        } else {
            let cancelled = cascade_cancel(child, adjacency, state);
            *finished += cancelled.len();
        }
    }
}

/// Cancels every not-yet-running step reachable from the ready queue on
/// external stop (spec.md §4.5 step 6, "cancels the ready queue"). Steps
/// already `Running` are left alone — their own process-level cancel
/// watch (spec.md §5 "Cancellation") reports them `Cancel` through the
/// normal finish path instead.
fn cancel_not_yet_started(order: &[String], adjacency: &Adjacency, state: &parking_lot::Mutex<RunState>, finished: &mut usize) {
    for name in order {
        let status = state.lock().node_status(name);
        if status == Some(NodeStatus::NotStarted) {
            let cancelled = cascade_cancel(name, adjacency, state);
            *finished += cancelled.len();
        }
    }
}

/// Runs `dag`'s main step graph (handlers excluded) to completion: a
/// bounded pool of workers dispatches ready steps, cascades cancellation
/// across unmet edges, and returns once every step has reached a
/// terminal status (spec.md §4.5).
pub async fn run_graph<C: Clock>(dag: &Dag, params: &[(String, String)], ctx: Arc<ExecutorContext<C>>) -> GraphOutcome {
    let order = dag.step_names();
    let state = Arc::new(parking_lot::Mutex::new(RunState::new(order.clone())));
    let adjacency = adjacency_of(&dag.dependency_pairs());
    let step_by_name: HashMap<String, Step> = dag.steps.iter().map(|s| (s.name.clone(), s.clone())).collect();
    let mut indegree: HashMap<String, usize> = order.iter().map(|n| (n.clone(), adjacency.indegree(n))).collect();
    let mut ready: VecDeque<String> = adjacency.initial_ready(&order).into_iter().collect();
    let semaphore = Arc::new(Semaphore::new(std::cmp::max(1, dag.max_active_runs as usize)));
    let total = order.len();
    let mut finished = 0usize;
    let mut in_flight: JoinSet<(String, NodeStatus)> = JoinSet::new();

    loop {
        if ctx.cancel.is_cancelled() {
            cancel_not_yet_started(&order, &adjacency, &state, &mut finished);
            ready.clear();
        }

        while let Some(name) = ready.pop_front() {
            let Some(step) = step_by_name.get(&name) else { continue };
            let step = step.clone();
            let params = params.to_vec();
            let ctx = Arc::clone(&ctx);
            let state = Arc::clone(&state);
            let semaphore = Arc::clone(&semaphore);
            in_flight.spawn(async move {
                // The semaphore is only closed by dropping every handle to
                // it, which never happens while the scheduler loop holds
                // its own clone — a closed permit here would mean the
                // scheduler itself has already gone away.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (step.name.clone(), NodeStatus::Cancel);
                };
                let status = execute_step(&ctx, &step, &params, &state).await;
                (step.name.clone(), status)
            });
        }

        if finished >= total {
            break;
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };
        let (name, status) = match joined {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!(error = %err, "step worker task panicked");
                continue;
            }
        };
        info!(step = %name, ?status, "step reached a terminal status");
        finished += 1;
        on_step_finished(
            status,
            &name,
            &step_by_name,
            &adjacency,
            &mut indegree,
            &state,
            &mut ready,
            &mut finished,
        );
    }

    let guard = state.lock();
    let nodes = guard.nodes.clone();
    let outputs = guard.outputs.clone();
    let step_map = guard.step_map.clone();
    drop(guard);
    let status = RunStatusKind::aggregate(nodes.values().map(|n| &n.status));

    GraphOutcome {
        nodes,
        outputs,
        step_map,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::collaborators::{NullMailer, NullSubWorkflowRunner};
    use dagflow_core::step::StepKind;
    use dagflow_core::FakeClock;
    use std::time::Duration;

    fn test_ctx(base_dir: &std::path::Path) -> Arc<ExecutorContext<FakeClock>> {
        Arc::new(ExecutorContext {
            run_id: "test-run".to_string(),
            base_dir: base_dir.to_path_buf(),
            log_dir: base_dir.to_path_buf(),
            dag_env: Vec::new(),
            shell_override: Some("sh".to_string()),
            tail_capacity: crate::tail_buffer::DEFAULT_TAIL_CAPACITY,
            max_cleanup_time: Duration::from_secs(1),
            clock: FakeClock::new(0),
            cancel: CancelToken::new(),
            sub_workflow: Arc::new(NullSubWorkflowRunner),
            mailer: Arc::new(NullMailer),
        })
    }

    fn step(name: &str, command: &str, depends: &[&str]) -> Step {
        Step {
            name: name.to_string(),
            kind: StepKind::Command,
            command: command.to_string(),
            depends: depends.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn runs_a_linear_chain_to_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let dag = Dag {
            name: "chain".to_string(),
            max_active_runs: 2,
            steps: vec![
                step("a", "echo a", &[]),
                step("b", "echo b", &["a"]),
                step("c", "echo c", &["b"]),
            ],
            ..Default::default()
        };

        let outcome = run_graph(&dag, &[], ctx).await;
        assert_eq!(outcome.status, RunStatusKind::Success);
        assert_eq!(outcome.nodes.get("c").unwrap().status, NodeStatus::Success);
    }

    #[tokio::test]
    async fn failure_cancels_dependent_without_continue_on() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let dag = Dag {
            name: "fails".to_string(),
            max_active_runs: 2,
            steps: vec![step("a", "exit 1", &[]), step("b", "echo b", &["a"])],
            ..Default::default()
        };

        let outcome = run_graph(&dag, &[], ctx).await;
        assert_eq!(outcome.status, RunStatusKind::Failed);
        assert_eq!(outcome.nodes.get("a").unwrap().status, NodeStatus::Failed);
        assert_eq!(outcome.nodes.get("b").unwrap().status, NodeStatus::Cancel);
    }

    #[tokio::test]
    async fn failure_with_continue_on_failure_still_runs_dependent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let mut b = step("b", "echo b", &["a"]);
        b.continue_on.failure = true;
        let dag = Dag {
            name: "continues".to_string(),
            max_active_runs: 2,
            steps: vec![step("a", "exit 1", &[]), b],
            ..Default::default()
        };

        let outcome = run_graph(&dag, &[], ctx).await;
        assert_eq!(outcome.nodes.get("b").unwrap().status, NodeStatus::Success);
        assert_eq!(outcome.status, RunStatusKind::PartialSuccess);
    }

    #[tokio::test]
    async fn independent_branches_both_complete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let dag = Dag {
            name: "fanout".to_string(),
            max_active_runs: 4,
            steps: vec![
                step("a", "echo a", &[]),
                step("b1", "echo b1", &["a"]),
                step("b2", "echo b2", &["a"]),
                step("c", "echo c", &["b1", "b2"]),
            ],
            ..Default::default()
        };

        let outcome = run_graph(&dag, &[], ctx).await;
        assert_eq!(outcome.status, RunStatusKind::Success);
        assert_eq!(outcome.nodes.len(), 4);
    }

    #[tokio::test]
    async fn precondition_skip_cancels_dependent_without_continue_on_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let mut a = step("a", "echo a", &[]);
        a.preconditions = vec![dagflow_core::Condition::new("no", "yes")];
        let dag = Dag {
            name: "skips".to_string(),
            max_active_runs: 2,
            steps: vec![a, step("b", "echo b", &["a"])],
            ..Default::default()
        };

        let outcome = run_graph(&dag, &[], ctx).await;
        assert_eq!(outcome.nodes.get("a").unwrap().status, NodeStatus::Skipped);
        assert_eq!(outcome.nodes.get("b").unwrap().status, NodeStatus::Cancel);
        assert_eq!(outcome.status, RunStatusKind::Cancel);
    }
}
