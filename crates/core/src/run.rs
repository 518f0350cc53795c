// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate run state and published step outputs.

use crate::id::RunId;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Aggregate outcome of a run, computed once every step has reached a
/// terminal state (spec.md §4.5 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatusKind {
    Running,
    Success,
    Failed,
    Cancel,
    PartialSuccess,
}

impl RunStatusKind {
    /// Compute the aggregate outcome from terminal node statuses, per
    /// spec.md §4.5 step 4. Callers only invoke this once every node has
    /// reached a terminal status.
    pub fn aggregate<'a>(statuses: impl IntoIterator<Item = &'a crate::NodeStatus>) -> Self {
        use crate::NodeStatus::*;

        let mut any_failed = false;
        let mut any_cancel = false;
        let mut any_skipped = false;
        let mut any_success = false;
        let mut count = 0;

        for status in statuses {
            count += 1;
            match status {
                Failed => any_failed = true,
                Cancel => any_cancel = true,
                Skipped => any_skipped = true,
                Success => any_success = true,
                NotStarted | Running => {}
            }
        }

        if count == 0 {
            return RunStatusKind::Success;
        }
        if any_failed {
            RunStatusKind::Failed
        } else if any_cancel {
            RunStatusKind::Cancel
        } else if any_skipped && any_success {
            RunStatusKind::PartialSuccess
        } else if any_success {
            RunStatusKind::Success
        } else {
            // All skipped, none succeeded/failed/cancelled.
            RunStatusKind::PartialSuccess
        }
    }
}

/// Observable result of a completed step, published into the run's step
/// map for downstream expansion (spec.md §3 `StepOutput`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub exit_code: i32,
    /// Present when the step declared an `output` variable name.
    pub value: Option<String>,
}

/// Aggregate state of one run of a DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub request_id: RunId,
    pub status: RunStatusKind,
    pub params: Vec<(String, String)>,
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    pub nodes: Vec<Node>,
    pub scheduler_log_path: Option<PathBuf>,
}
