// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-error kinds (spec.md §7 "Execution errors") plus the
//! collaborator-facing errors the executor and scheduler can surface.

use thiserror::Error;

/// Errors raised while driving a single step or a whole run. Step failures
/// never abort the scheduler (spec.md §7 "Propagation policy") — these are
/// recorded on the offending [`dagflow_core::Node`], not bubbled up as a
/// hard error, except where the scheduler itself cannot make progress
/// (history/mail collaborator failures, which are logged and swallowed).
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no shell available to run this step")]
    ShellMissing,
    #[error("failed to spawn process: {0}")]
    ProcessSpawn(String),
    #[error("precondition evaluation failed: {0}")]
    ConditionEval(String),
    #[error("step was cancelled")]
    Cancelled,
    #[error("sub-workflow `{0}` failed: {1}")]
    SubWorkflow(String, String),
    #[error("mail notification failed: {0}")]
    Mail(String),
    #[error("history write failed: {0}")]
    History(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
