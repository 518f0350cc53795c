// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External collaborator interfaces the core drives but never implements
//! itself: the sub-workflow runner (spec.md §6.3), the mailer (§6.4), and
//! the history writer (§6.5). Callers supply real implementations; the
//! `Null*` ones here back tests the way the rest of this workspace's test
//! suites stub out their own collaborators.

use crate::error::RuntimeError;
use async_trait::async_trait;
use dagflow_core::NodeStatus;

/// Context handed to [`SubWorkflowRunner::run_sub_workflow`]: the caller
/// needs the parent run's identity to thread logging/history correlation
/// through, even though the core treats the call as an opaque function
/// (spec.md §6.3).
#[derive(Debug, Clone)]
pub struct SubWorkflowContext {
    pub parent_run_id: String,
    pub parent_step_name: String,
}

/// Locates and runs another DAG by name, returning its terminal status and
/// optional captured output. The core treats the result exactly as it
/// would a step's exit code (spec.md §6.3).
#[async_trait]
pub trait SubWorkflowRunner: Send + Sync {
    async fn run_sub_workflow(
        &self,
        name: &str,
        params: &[(String, String)],
        ctx: &SubWorkflowContext,
    ) -> Result<(NodeStatus, Option<String>), RuntimeError>;
}

/// One email, as assembled by the caller (the core fills in subject/body
/// from templates but does not render HTML or handle delivery itself)
/// (spec.md §6.4).
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body_html: String,
    pub attachments: Vec<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), RuntimeError>;
}

/// One record per run: a start event, periodic intermediate snapshots, and
/// a terminal event (spec.md §6.5).
#[async_trait]
pub trait HistoryWriter: Send + Sync {
    async fn write_start(&self, run_id: &str, status: dagflow_core::RunStatusKind) -> Result<(), RuntimeError>;

    async fn write_snapshot(&self, run_id: &str, status: dagflow_core::RunStatusKind) -> Result<(), RuntimeError>;

    async fn write_end(&self, run_id: &str, status: dagflow_core::RunStatusKind) -> Result<(), RuntimeError>;
}

/// No-op [`SubWorkflowRunner`] for tests that never configure a
/// `subWorkflow` step.
#[derive(Debug, Default)]
pub struct NullSubWorkflowRunner;

#[async_trait]
impl SubWorkflowRunner for NullSubWorkflowRunner {
    async fn run_sub_workflow(
        &self,
        name: &str,
        _params: &[(String, String)],
        _ctx: &SubWorkflowContext,
    ) -> Result<(NodeStatus, Option<String>), RuntimeError> {
        Err(RuntimeError::SubWorkflow(
            name.to_string(),
            "no sub-workflow runner configured".to_string(),
        ))
    }
}

/// No-op [`Mailer`] for tests that never trip a `mailOn`/`mailOnError` rule.
#[derive(Debug, Default)]
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, _message: MailMessage) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// No-op [`HistoryWriter`] for tests that don't assert on persisted history.
#[derive(Debug, Default)]
pub struct NullHistoryWriter;

#[async_trait]
impl HistoryWriter for NullHistoryWriter {
    async fn write_start(&self, _run_id: &str, _status: dagflow_core::RunStatusKind) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn write_snapshot(&self, _run_id: &str, _status: dagflow_core::RunStatusKind) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn write_end(&self, _run_id: &str, _status: dagflow_core::RunStatusKind) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// A [`Mailer`] that records every message it was asked to send, for
/// assertions in tests that configure `mailOn`/`mailOnError`.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: parking_lot::Mutex<Vec<MailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), RuntimeError> {
        self.sent.lock().push(message);
        Ok(())
    }
}
