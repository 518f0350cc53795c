// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-step executor (spec.md §4.4): field expansion, preconditions,
//! process launch, retries, repeats, output publication, and
//! mail-on-error — one full pass over a single [`Step`] per invocation of
//! [`execute_step`], called again by the scheduler on retry/repeat.

use crate::cancel::CancelToken;
use crate::collaborators::{Mailer, MailMessage, SubWorkflowContext, SubWorkflowRunner};
use crate::error::RuntimeError;
use crate::process;
use crate::state::RunState;
use dagflow_core::node::NodeStatus;
use dagflow_core::{Clock, Step, StepKind};
use dagflow_expand::{eval_string, ExpandOptions, StepObservable};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Fixed per-run configuration the executor needs but does not own —
/// threaded through from [`crate::run::RunConfig`].
pub struct ExecutorContext<C: Clock> {
    pub run_id: String,
    pub base_dir: PathBuf,
    pub log_dir: PathBuf,
    pub dag_env: Vec<(String, String)>,
    pub shell_override: Option<String>,
    pub tail_capacity: usize,
    pub max_cleanup_time: Duration,
    pub clock: C,
    pub cancel: CancelToken,
    pub sub_workflow: Arc<dyn SubWorkflowRunner>,
    pub mailer: Arc<dyn Mailer>,
}

/// Default stdout/stderr paths when a step doesn't declare its own
/// (spec.md §4.4 step 10 still requires *some* path be recorded).
fn default_log_paths(log_dir: &Path, step_name: &str) -> (PathBuf, PathBuf) {
    (
        log_dir.join(format!("{step_name}.out")),
        log_dir.join(format!("{step_name}.err")),
    )
}

/// One expand-and-run attempt: steps 1-2 (field expansion, preconditions)
/// of spec.md §4.4, returning `Ok(None)` to continue to process launch or
/// `Ok(Some(Skipped))` on a precondition mismatch.
struct ExpandedStep {
    command: String,
    args: Vec<String>,
    dir: PathBuf,
    stdout: PathBuf,
    stderr: PathBuf,
    script: String,
}

fn build_expand_options(
    dag_env: &[(String, String)],
    params: &[(String, String)],
    outputs: &std::collections::HashMap<String, String>,
    step_map: &std::collections::HashMap<String, StepObservable>,
    shell_override: Option<&str>,
) -> ExpandOptions {
    let mut opts = ExpandOptions::new();
    for (k, v) in params {
        opts = opts.with_variable(k.as_str(), v.as_str());
    }
    for (k, v) in outputs {
        opts = opts.with_variable(k.as_str(), v.as_str());
    }
    for (k, v) in dag_env {
        opts = opts.with_variable(k.as_str(), v.as_str());
    }
    for (name, observable) in step_map {
        opts = opts.with_step(name.as_str(), observable.clone());
    }
    if let Some(shell) = shell_override {
        opts = opts.shell(shell);
    }
    opts
}

fn expand_step<C: Clock>(
    ctx: &ExecutorContext<C>,
    step: &Step,
    opts: &ExpandOptions,
) -> Result<ExpandedStep, RuntimeError> {
    let command = eval_string(&step.command, opts).map_err(|e| RuntimeError::ConditionEval(e.to_string()))?;
    let mut args = Vec::with_capacity(step.args.len());
    for a in &step.args {
        args.push(eval_string(a, opts).map_err(|e| RuntimeError::ConditionEval(e.to_string()))?);
    }
    let dir = match &step.dir {
        Some(d) => {
            let expanded = eval_string(d, opts).map_err(|e| RuntimeError::ConditionEval(e.to_string()))?;
            PathBuf::from(expanded)
        }
        None => ctx.base_dir.clone(),
    };
    let (default_stdout, default_stderr) = default_log_paths(&ctx.log_dir, &step.name);
    let stdout = match &step.stdout {
        Some(s) => {
            PathBuf::from(eval_string(s, opts).map_err(|e| RuntimeError::ConditionEval(e.to_string()))?)
        }
        None => default_stdout,
    };
    let stderr = match &step.stderr {
        Some(s) => {
            PathBuf::from(eval_string(s, opts).map_err(|e| RuntimeError::ConditionEval(e.to_string()))?)
        }
        None => default_stderr,
    };
    let script = eval_string(&step.script, opts).map_err(|e| RuntimeError::ConditionEval(e.to_string()))?;

    Ok(ExpandedStep {
        command,
        args,
        dir,
        stdout,
        stderr,
        script,
    })
}

/// Preconditions: exact-string-equality against each expanded condition
/// (spec.md §4.4 step 2). Returns `true` when every precondition is met.
fn preconditions_met(step: &Step, opts: &ExpandOptions) -> Result<bool, RuntimeError> {
    for condition in &step.preconditions {
        let evaluated =
            eval_string(&condition.condition, opts).map_err(|e| RuntimeError::ConditionEval(e.to_string()))?;
        if !condition.is_met(&evaluated) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Writes a script body to a uniquely-named temp file inside `dir`
/// (spec.md §4.4 step 4). Uses a UUID rather than a dedicated temp-file
/// crate since concurrent steps may share `dir`.
async fn write_script_file(dir: &Path, script: &str) -> Result<PathBuf, RuntimeError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("dagflow-script-{}", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, script).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(&path).await?.permissions();
        perms.set_mode(0o700);
        tokio::fs::set_permissions(&path, perms).await?;
    }
    Ok(path)
}

/// One full run of a single step through to a terminal [`NodeStatus`],
/// including retries and repeats (spec.md §4.4 steps 1-11). Mutates the
/// step's [`dagflow_core::node::Node`] and the run's output/step maps in
/// `state` as it progresses.
pub async fn execute_step<C: Clock>(
    ctx: &ExecutorContext<C>,
    step: &Step,
    params: &[(String, String)],
    state: &parking_lot::Mutex<RunState>,
) -> NodeStatus {
    {
        let mut guard = state.lock();
        guard.nodes.entry(step.name.clone()).and_modify(|n| {
            n.transition_to(NodeStatus::Running);
            n.started_at_ms = Some(ctx.clock.now_ms());
        });
    }

    loop {
        let (outputs, step_map) = {
            let guard = state.lock();
            guard.expansion_snapshot()
        };
        let opts = build_expand_options(
            &ctx.dag_env,
            params,
            &outputs,
            &step_map,
            ctx.shell_override.as_deref(),
        );

        let expanded = match expand_step(ctx, step, &opts) {
            Ok(e) => e,
            Err(err) => {
                warn!(step = %step.name, error = %err, "precondition/field expansion failed");
                return finish_step(ctx, step, state, NodeStatus::Failed, None, None, None, Some(err.to_string()))
                    .await;
            }
        };

        match preconditions_met(step, &opts) {
            Ok(true) => {}
            Ok(false) => {
                info!(step = %step.name, "precondition not met, skipping");
                return finish_step(
                    ctx,
                    step,
                    state,
                    NodeStatus::Skipped,
                    Some(&expanded.stdout),
                    Some(&expanded.stderr),
                    None,
                    None,
                )
                .await;
            }
            Err(err) => {
                warn!(step = %step.name, error = %err, "precondition evaluation failed");
                return finish_step(ctx, step, state, NodeStatus::Failed, None, None, None, Some(err.to_string()))
                    .await;
            }
        }

        let attempt_result = run_one_attempt(ctx, step, &expanded).await;

        let (status, exit_code, stdout_tail) = match attempt_result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(step = %step.name, error = %err, "step attempt errored");
                (NodeStatus::Failed, None, None)
            }
        };

        if status == NodeStatus::Failed {
            let attempt = state.lock().nodes.get(&step.name).map(|n| n.attempt).unwrap_or(0);
            if attempt < step.retry_policy.limit && !ctx.cancel.is_cancelled() {
                {
                    let mut guard = state.lock();
                    guard.nodes.entry(step.name.clone()).and_modify(|n| n.attempt += 1);
                }
                info!(step = %step.name, attempt = attempt + 1, "retrying after failure");
                tokio::select! {
                    _ = ctx.clock.sleep(step.retry_policy.interval) => {}
                    _ = ctx.cancel.cancelled() => {
                        return finish_step(ctx, step, state, NodeStatus::Cancel, Some(&expanded.stdout), Some(&expanded.stderr), exit_code, None).await;
                    }
                }
                continue;
            }
        }

        if status == NodeStatus::Failed && step.mail_on_error {
            let message = MailMessage {
                from: String::new(),
                to: Vec::new(),
                subject: format!("step `{}` failed in run {}", step.name, ctx.run_id),
                body_html: format!(
                    "<p>step <code>{}</code> exited with {:?}</p>",
                    step.name, exit_code
                ),
                attachments: Vec::new(),
            };
            if let Err(err) = ctx.mailer.send(message).await {
                warn!(step = %step.name, error = %err, "mail-on-error notification failed");
            }
        }

        if status == NodeStatus::Success && step.repeat_policy.repeat && !ctx.cancel.is_cancelled() {
            finish_step(
                ctx,
                step,
                state,
                NodeStatus::Success,
                Some(&expanded.stdout),
                Some(&expanded.stderr),
                exit_code,
                None,
            )
            .await;
            tokio::select! {
                _ = ctx.clock.sleep(step.repeat_policy.interval) => {
                    let mut guard = state.lock();
                    guard.nodes.entry(step.name.clone()).and_modify(|n| {
                        let _ = n.transition_to(NodeStatus::Running);
                    });
                    drop(guard);
                    continue;
                }
                _ = ctx.cancel.cancelled() => {
                    return finish_step(ctx, step, state, NodeStatus::Cancel, Some(&expanded.stdout), Some(&expanded.stderr), exit_code, None).await;
                }
            }
        }

        let trimmed = stdout_tail.as_deref();
        return finish_step(
            ctx,
            step,
            state,
            status,
            Some(&expanded.stdout),
            Some(&expanded.stderr),
            exit_code,
            None,
        )
        .await
        .tap_output(step, state, trimmed);
    }
}

/// Runs the process for one attempt, resolving script/sub-workflow/command
/// step kinds (spec.md §4.4 steps 4-7). Returns the terminal status for
/// this attempt plus the observables needed for output publication.
async fn run_one_attempt<C: Clock>(
    ctx: &ExecutorContext<C>,
    step: &Step,
    expanded: &ExpandedStep,
) -> Result<(NodeStatus, Option<i32>, Option<String>), RuntimeError> {
    if step.kind == StepKind::SubWorkflow {
        let sub_ref = step
            .sub_workflow
            .as_ref()
            .ok_or_else(|| RuntimeError::SubWorkflow(step.name.clone(), "missing subWorkflow config".to_string()))?;
        let sub_ctx = SubWorkflowContext {
            parent_run_id: ctx.run_id.clone(),
            parent_step_name: step.name.clone(),
        };
        let (status, output) = ctx
            .sub_workflow
            .run_sub_workflow(&sub_ref.name, &sub_ref.params, &sub_ctx)
            .await?;
        return Ok((status, None, output));
    }

    let shell = dagflow_expand::resolve_shell(ctx.shell_override.as_deref());
    if shell.is_empty() {
        return Err(RuntimeError::ShellMissing);
    }

    let (shell_args, run_dir) = if step.kind == StepKind::Script {
        let script_path = write_script_file(&expanded.dir, &expanded.script).await?;
        (vec![script_path.display().to_string()], expanded.dir.clone())
    } else {
        let full_command = dagflow_shell::build_escaped(&expanded.command, &expanded.args);
        (
            dagflow_expand::shell_invocation_args(&shell, &full_command),
            expanded.dir.clone(),
        )
    };

    let signal = step.signal_on_stop.clone().unwrap_or_else(|| "SIGTERM".to_string());

    let outcome = process::run_command(
        &shell,
        &shell_args,
        &run_dir,
        &ctx.dag_env,
        &expanded.stdout,
        &expanded.stderr,
        ctx.tail_capacity,
        &ctx.cancel,
        &signal,
        ctx.max_cleanup_time,
    )
    .await?;

    if outcome.cancelled {
        return Ok((NodeStatus::Cancel, outcome.exit_code, Some(outcome.stdout_tail)));
    }

    let status = match outcome.exit_code {
        Some(0) => NodeStatus::Success,
        _ => NodeStatus::Failed,
    };
    Ok((status, outcome.exit_code, Some(outcome.stdout_tail)))
}

/// Writes the terminal result for this step into `state`: the node's
/// status/exit code/paths, and — on success with an `output` name — the
/// published variable (spec.md §4.4 step 10).
#[allow(clippy::too_many_arguments)]
async fn finish_step<C: Clock>(
    ctx: &ExecutorContext<C>,
    step: &Step,
    state: &parking_lot::Mutex<RunState>,
    status: NodeStatus,
    stdout: Option<&Path>,
    stderr: Option<&Path>,
    exit_code: Option<i32>,
    error: Option<String>,
) -> NodeStatus {
    let mut guard = state.lock();
    guard.nodes.entry(step.name.clone()).and_modify(|n| {
        let _ = n.transition_to(status);
        n.finished_at_ms = Some(ctx.clock.now_ms());
        n.exit_code = exit_code;
        n.error = error;
        n.stdout_path = stdout.map(Path::to_path_buf);
        n.stderr_path = stderr.map(Path::to_path_buf);
    });
    guard.step_map.insert(
        step.name.clone(),
        StepObservable {
            stdout: stdout.map(Path::to_path_buf).unwrap_or_default(),
            stderr: stderr.map(Path::to_path_buf).unwrap_or_default(),
            exit_code: exit_code.unwrap_or(-1),
        },
    );
    status
}

/// Extension used only to thread the stdout tail into output publication
/// without widening `finish_step`'s already-long signature further.
trait TapOutput {
    fn tap_output(self, step: &Step, state: &parking_lot::Mutex<RunState>, stdout_tail: Option<&str>) -> NodeStatus;
}

impl TapOutput for NodeStatus {
    fn tap_output(self, step: &Step, state: &parking_lot::Mutex<RunState>, stdout_tail: Option<&str>) -> NodeStatus {
        if self == NodeStatus::Success {
            if let (Some(name), Some(tail)) = (&step.output, stdout_tail) {
                state.lock().outputs.insert(name.clone(), tail.trim_end().to_string());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullMailer, NullSubWorkflowRunner};
    use dagflow_core::FakeClock;

    fn test_ctx(base_dir: &Path) -> ExecutorContext<FakeClock> {
        ExecutorContext {
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
        }
    }

    fn command_step(name: &str, command: &str) -> Step {
        Step {
            name: name.to_string(),
            kind: StepKind::Command,
            command: command.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn runs_a_successful_command_and_publishes_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let mut step = command_step("greet", "echo hello");
        step.output = Some("GREETING".to_string());
        let state = parking_lot::Mutex::new(RunState::new(["greet".to_string()]));

        let status = execute_step(&ctx, &step, &[], &state).await;
        assert_eq!(status, NodeStatus::Success);
        assert_eq!(state.lock().outputs.get("GREETING").map(String::as_str), Some("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let step = command_step("boom", "exit 9");
        let state = parking_lot::Mutex::new(RunState::new(["boom".to_string()]));

        let status = execute_step(&ctx, &step, &[], &state).await;
        assert_eq!(status, NodeStatus::Failed);
        assert_eq!(state.lock().nodes.get("boom").unwrap().exit_code, Some(9));
    }

    #[tokio::test]
    async fn precondition_mismatch_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let mut step = command_step("cond", "echo should-not-run");
        step.preconditions = vec![dagflow_core::Condition::new("no", "yes")];
        let state = parking_lot::Mutex::new(RunState::new(["cond".to_string()]));

        let status = execute_step(&ctx, &step, &[], &state).await;
        assert_eq!(status, NodeStatus::Skipped);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let marker = dir.path().join("marker");
        let mut step = command_step(
            "flaky",
            &format!(
                "test -f {0} && echo ok || (touch {0} && exit 1)",
                marker.display()
            ),
        );
        step.retry_policy = dagflow_core::RetryPolicy {
            limit: 1,
            interval: Duration::from_millis(1),
        };
        let state = parking_lot::Mutex::new(RunState::new(["flaky".to_string()]));

        let status = execute_step(&ctx, &step, &[], &state).await;
        assert_eq!(status, NodeStatus::Success);
    }

    #[tokio::test]
    async fn script_step_runs_the_script_body() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_ctx(dir.path());
        let mut step = command_step("script-step", "");
        step.kind = StepKind::Script;
        step.script = "echo from-script".to_string();
        step.output = Some("OUT".to_string());
        let state = parking_lot::Mutex::new(RunState::new(["script-step".to_string()]));

        let status = execute_step(&ctx, &step, &[], &state).await;
        assert_eq!(status, NodeStatus::Success);
        assert_eq!(
            state.lock().outputs.get("OUT").map(String::as_str),
            Some("from-script")
        );
    }
}
