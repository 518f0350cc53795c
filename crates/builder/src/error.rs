// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use dagflow_core::GraphError;
use std::fmt;
use thiserror::Error;

/// One build-error kind (spec.md §7 "Parse errors" and "Graph errors").
/// Builder errors are accumulated rather than raised one at a time
/// (spec.md §4.3, final paragraph).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("schedule must be a string, list of strings, or mapping")]
    InvalidScheduleType,
    #[error("unknown schedule key `{0}`")]
    ScheduleKey(String),
    #[error("invalid cron expression `{0}`")]
    InvalidSchedule(String),
    #[error("invalid signal name `{0}`")]
    InvalidSignal(String),
    #[error("invalid env value for `{0}`")]
    InvalidEnvValue(String),
    #[error("unknown executor key `{0}`")]
    ExecutorKey(String),
    #[error("executor must be a string or a mapping")]
    ExecutorMustBeStringOrMap,
    #[error("step `{0}`: args must be a string or a sequence")]
    ArgsKind(String),
    #[error("step name is required")]
    StepNameRequired,
    #[error("step `{0}` requires one of command, call, run, or executor")]
    StepCommandOrCallRequired(String),
    #[error("duplicate function `{0}`")]
    DuplicateFunction(String),
    #[error("function `{0}` parameter list does not match its template")]
    FuncParamsMismatch(String),
    #[error("step `{0}` calls unknown function `{1}`")]
    CallTargetMissing(String, String),
    #[error("step `{0}` call is missing required parameter `{1}`")]
    RequiredParamMissing(String, String),
    #[error("step `{0}` call supplies unknown argument `{1}`")]
    UnknownCallArg(String, String),
    #[error("param substitution failed: {0}")]
    ParamSubstitution(String),
    #[error("step `{0}` depends on unknown step `{1}`")]
    UnknownDependency(String, String),
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

impl From<GraphError> for BuildError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownDependency { step, dependency } => {
                BuildError::UnknownDependency(step, dependency)
            }
            GraphError::DependencyCycle(path) => BuildError::DependencyCycle(path),
        }
    }
}

impl From<dagflow_shell::ShellError> for BuildError {
    fn from(_: dagflow_shell::ShellError) -> Self {
        BuildError::EmptyCommand
    }
}

/// All build errors accumulated while compiling one DAG.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildErrors(pub Vec<BuildError>);

impl BuildErrors {
    pub fn push(&mut self, err: BuildError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, BuildErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}

impl std::error::Error for BuildErrors {}
