// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step definitions — the compiled, immutable node template in a [`crate::Dag`].

use crate::condition::Condition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Retry behavior after a non-zero exit (spec.md §4.4 step 8).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first run. `0` disables retries.
    #[serde(default)]
    pub limit: u32,
    /// Delay between attempts.
    #[serde(default, with = "duration_secs")]
    pub interval: Duration,
}

/// Repeat behavior after a successful run (spec.md §4.4 step 9).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatPolicy {
    #[serde(default)]
    pub repeat: bool,
    #[serde(default, with = "duration_secs")]
    pub interval: Duration,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Per-step flags permitting dependents to proceed across edges that would
/// otherwise propagate `Failed`/`Skipped` (spec.md glossary "Continue-on").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueOn {
    #[serde(default)]
    pub failure: bool,
    #[serde(default)]
    pub skipped: bool,
}

/// An executor type plus its opaque string-keyed configuration
/// (spec.md §4.3 item 6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// A reference to another DAG, invoked as a sub-workflow (spec.md §6.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubWorkflowRef {
    pub name: String,
    /// Positional/named params to pass, in declaration order.
    pub params: Vec<(String, String)>,
}

/// What a step actually runs, after `buildStep` has resolved `command`,
/// `call`, or `run` (spec.md §4.3 item 6). Mutually exclusive by
/// construction: the builder never produces a `Step` with more than one
/// of these populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    #[default]
    Command,
    Script,
    SubWorkflow,
}

/// A node in the DAG, as compiled by the builder. Immutable for the
/// lifetime of a run; runtime state lives in the corresponding [`crate::Node`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: StepKind,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Script body, written to a temp file and invoked through the shell
    /// when `kind == Script` (spec.md §4.4 step 4).
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    /// Variable name that receives `trim(stdout)` on success.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub continue_on: ContinueOn,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub repeat_policy: RepeatPolicy,
    /// Signal sent on external stop, e.g. `"SIGTERM"`. Defaults applied by
    /// the executor when unset.
    #[serde(default)]
    pub signal_on_stop: Option<String>,
    #[serde(default)]
    pub executor: Option<ExecutorConfig>,
    #[serde(default)]
    pub sub_workflow: Option<SubWorkflowRef>,
    #[serde(default)]
    pub preconditions: Vec<Condition>,
    #[serde(default)]
    pub mail_on_error: bool,
}

impl Step {
    pub fn is_handler(&self) -> bool {
        matches!(self.name.as_str(), "exit" | "success" | "failure" | "cancel")
    }
}
