// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;

/// Observable result of a step that a later step's expansion may refer to
/// via `${step.stdout}`, `${step.stderr}`, `${step.exitCode}`
/// (spec.md §4.2 options table, "stepMap").
#[derive(Debug, Clone)]
pub struct StepObservable {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub exit_code: i32,
}

/// Toggles for each stage of [`crate::eval_string`] (spec.md §4.2 options
/// table). All default on except `only_replace_vars`.
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// Variable mapping consulted by reference expansion and simple
    /// variable replacement. First occurrence of a key wins, matching the
    /// DAG's own env-ordering invariant — callers add mappings with
    /// [`ExpandOptions::with_variable`] in priority order.
    variables: HashMap<String, String>,
    step_map: HashMap<String, StepObservable>,
    expand_env: bool,
    substitute: bool,
    only_replace_vars: bool,
    /// Caller-supplied shell path for command substitution (spec.md §4.2b
    /// shell selection rule, step 1).
    shell: Option<String>,
}

impl ExpandOptions {
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
            step_map: HashMap::new(),
            expand_env: true,
            substitute: true,
            only_replace_vars: false,
            shell: None,
        }
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    #[must_use]
    pub fn with_variables<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.variables.entry(k.into()).or_insert_with(|| v.into());
        }
        self
    }

    #[must_use]
    pub fn with_step(mut self, name: impl Into<String>, observable: StepObservable) -> Self {
        self.step_map.insert(name.into(), observable);
        self
    }

    #[must_use]
    pub fn expand_env(mut self, value: bool) -> Self {
        self.expand_env = value;
        self
    }

    #[must_use]
    pub fn substitute(mut self, value: bool) -> Self {
        self.substitute = value;
        self
    }

    /// Shortcut: disables `expandEnv` and `substitute`.
    #[must_use]
    pub fn only_replace_vars(mut self, value: bool) -> Self {
        self.only_replace_vars = value;
        self
    }

    #[must_use]
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn step(&self, name: &str) -> Option<&StepObservable> {
        self.step_map.get(name)
    }

    pub fn shell_override(&self) -> Option<&str> {
        self.shell.as_deref()
    }

    pub fn should_expand_env(&self) -> bool {
        self.expand_env && !self.only_replace_vars
    }

    pub fn should_substitute(&self) -> bool {
        self.substitute && !self.only_replace_vars
    }
}
