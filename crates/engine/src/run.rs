// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level run orchestration: wires the scheduler, the lifecycle
//! handlers, and the external collaborators (sub-workflow runner, mailer,
//! history writer) around one execution of a compiled [`Dag`]
//! (spec.md §4.5, §6.4, §6.5).

use crate::cancel::CancelToken;
use crate::collaborators::{HistoryWriter, MailMessage, Mailer, SubWorkflowRunner};
use crate::executor::ExecutorContext;
use crate::{handlers, scheduler};
use dagflow_core::id::RunId;
use dagflow_core::node::Node;
use dagflow_core::{Clock, Dag, RunStatus, RunStatusKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default cadence for intermediate history snapshots (spec.md §6.5).
pub const DEFAULT_HISTORY_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

/// Everything [`run_dag`] needs that isn't part of the compiled [`Dag`]
/// itself: the collaborators, the clock, and the run's cancellation
/// handle (callers keep a clone of `cancel` to stop the run externally).
pub struct RunConfig<C: Clock> {
    pub clock: C,
    pub cancel: CancelToken,
    pub shell_override: Option<String>,
    pub tail_capacity: usize,
    pub history_snapshot_interval: Duration,
    pub sub_workflow: Arc<dyn SubWorkflowRunner>,
    pub mailer: Arc<dyn Mailer>,
    pub history: Arc<dyn HistoryWriter>,
}

/// Runs `dag` end to end: the main step graph, then applicable lifecycle
/// handlers, with history snapshots ticking in the background and a
/// dag-level mail notification fired if `mailOn` matches the final
/// status (spec.md §6.4).
pub async fn run_dag<C: Clock>(
    dag: &Dag,
    params: Vec<(String, String)>,
    base_dir: PathBuf,
    run_id: RunId,
    config: RunConfig<C>,
) -> RunStatus {
    let started_at_ms = config.clock.now_ms();
    let log_dir = dag
        .log_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| base_dir.join("logs"));

    let ctx = Arc::new(ExecutorContext {
        run_id: run_id.as_str().to_string(),
        base_dir,
        log_dir,
        dag_env: dag.env.clone(),
        shell_override: config.shell_override.clone(),
        tail_capacity: config.tail_capacity,
        max_cleanup_time: Duration::from_secs(dag.max_cleanup_time_sec),
        clock: config.clock.clone(),
        cancel: config.cancel.clone(),
        sub_workflow: Arc::clone(&config.sub_workflow),
        mailer: Arc::clone(&config.mailer),
    });

    if let Err(err) = config.history.write_start(run_id.as_str(), RunStatusKind::Running).await {
        warn!(run_id = %run_id, error = %err, "failed to write run-start history record");
    }

    let snapshot_task = spawn_snapshot_ticker(
        Arc::clone(&config.history),
        config.clock.clone(),
        config.history_snapshot_interval,
        run_id.as_str().to_string(),
    );

    let outcome = scheduler::run_graph(dag, &params, Arc::clone(&ctx)).await;

    let handler_nodes = handlers::run_handlers(
        dag,
        &params,
        Arc::clone(&ctx),
        outcome.status,
        outcome.outputs.clone(),
        outcome.step_map.clone(),
    )
    .await;

    snapshot_task.abort();

    if let Err(err) = config.history.write_end(run_id.as_str(), outcome.status).await {
        warn!(run_id = %run_id, error = %err, "failed to write run-end history record");
    }

    maybe_notify_dag_level_mail(dag, outcome.status, &config).await;

    let mut nodes: Vec<Node> = outcome.nodes.into_values().collect();
    nodes.extend(handler_nodes.into_values());

    RunStatus {
        request_id: run_id,
        status: outcome.status,
        params,
        started_at_ms,
        finished_at_ms: Some(config.clock.now_ms()),
        nodes,
        scheduler_log_path: None,
    }
}

fn spawn_snapshot_ticker<C: Clock>(
    history: Arc<dyn HistoryWriter>,
    clock: C,
    interval: Duration,
    run_id: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            clock.sleep(interval).await;
            if let Err(err) = history.write_snapshot(&run_id, RunStatusKind::Running).await {
                warn!(run_id = %run_id, error = %err, "failed to write history snapshot");
            }
        }
    })
}

/// Fires the dag-level `mailOn` notification if the final status matches
/// a configured flag (spec.md §6.4). Distinct from a step's
/// `mailOnError`, which the executor handles per-step.
async fn maybe_notify_dag_level_mail<C: Clock>(dag: &Dag, status: RunStatusKind, config: &RunConfig<C>) {
    let should_notify = match status {
        RunStatusKind::Success => dag.mail_on.success,
        RunStatusKind::Failed => dag.mail_on.failure,
        RunStatusKind::Cancel | RunStatusKind::PartialSuccess | RunStatusKind::Running => false,
    };
    if !should_notify {
        return;
    }
    let message = MailMessage {
        from: String::new(),
        to: Vec::new(),
        subject: format!("dag `{}` finished: {status:?}", dag.name),
        body_html: format!("<p>dag <code>{}</code> finished with status {status:?}</p>", dag.name),
        attachments: Vec::new(),
    };
    if let Err(err) = config.mailer.send(message).await {
        warn!(dag = %dag.name, error = %err, "dag-level mail notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullHistoryWriter, NullMailer, NullSubWorkflowRunner, RecordingMailer};
    use dagflow_core::step::StepKind;
    use dagflow_core::{FakeClock, Step};

    fn test_config(mailer: Arc<dyn Mailer>) -> RunConfig<FakeClock> {
        RunConfig {
            clock: FakeClock::new(0),
            cancel: CancelToken::new(),
            shell_override: Some("sh".to_string()),
            tail_capacity: crate::tail_buffer::DEFAULT_TAIL_CAPACITY,
            history_snapshot_interval: Duration::from_secs(5),
            sub_workflow: Arc::new(NullSubWorkflowRunner),
            mailer,
            history: Arc::new(NullHistoryWriter),
        }
    }

    #[tokio::test]
    async fn runs_a_dag_and_reports_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dag = Dag {
            name: "demo".to_string(),
            max_active_runs: 1,
            steps: vec![Step {
                name: "a".to_string(),
                kind: StepKind::Command,
                command: "echo hi".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let status = run_dag(
            &dag,
            Vec::new(),
            dir.path().to_path_buf(),
            RunId::new("run-1"),
            test_config(Arc::new(NullMailer)),
        )
        .await;

        assert_eq!(status.status, RunStatusKind::Success);
        assert_eq!(status.nodes.len(), 1);
        assert!(status.finished_at_ms.is_some());
    }

    #[tokio::test]
    async fn mail_on_failure_fires_when_configured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut dag = Dag {
            name: "demo".to_string(),
            max_active_runs: 1,
            steps: vec![Step {
                name: "a".to_string(),
                kind: StepKind::Command,
                command: "exit 1".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        dag.mail_on.failure = true;

        let mailer = Arc::new(RecordingMailer::default());
        let status = run_dag(
            &dag,
            Vec::new(),
            dir.path().to_path_buf(),
            RunId::new("run-2"),
            test_config(mailer.clone()),
        )
        .await;

        assert_eq!(status.status, RunStatusKind::Failed);
        assert_eq!(mailer.sent.lock().len(), 1);
    }
}
