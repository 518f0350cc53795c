// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The compiled, immutable workflow description produced by the builder.

use crate::condition::Condition;
use crate::cron::Cron;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `start`/`stop`/`restart` cron entries (spec.md §4.3 item 3). Each may
/// have zero or more expressions; an empty vec means "not configured".
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub start: Vec<Cron>,
    pub stop: Vec<Cron>,
    pub restart: Vec<Cron>,
}

/// Which terminal statuses trigger a mail notification (spec.md §4.3 item 1,
/// "mailOn (failure/success flags)"). Present-or-absent semantics (not a
/// default-then-overlay) matter for the base-config merge in §4.3 item 8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailOnConfig {
    pub failure: bool,
    pub success: bool,
}

/// A compiled workflow: immutable after [`crate::graph::validate_acyclic`]
/// has run over it at build time.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    pub name: String,
    pub group: String,
    pub description: String,
    pub steps: Vec<Step>,
    /// Reserved-name handler steps (`exit`, `success`, `failure`, `cancel`).
    pub handlers: HashMap<String, Step>,
    pub schedule: Schedule,
    /// Ordered; first occurrence of a key wins when expansion reads it
    /// (spec.md §3 invariants).
    pub env: Vec<(String, String)>,
    pub params: String,
    pub max_active_runs: u32,
    pub hist_retention_days: Option<i64>,
    pub log_dir: Option<String>,
    pub preconditions: Vec<Condition>,
    pub mail_on: MailOnConfig,
    pub delay_sec: u64,
    pub restart_wait_sec: u64,
    pub max_cleanup_time_sec: u64,
    pub tags: Vec<String>,
}

impl Dag {
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    /// `(name, depends)` pairs for graph validation/scheduling.
    pub fn dependency_pairs(&self) -> Vec<(String, Vec<String>)> {
        self.steps
            .iter()
            .map(|s| (s.name.clone(), s.depends.clone()))
            .collect()
    }

    /// First value for `key` in the ordered env list, per the "first
    /// occurrence wins" invariant.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;

    fn step(name: &str, depends: &[&str]) -> Step {
        Step {
            name: name.to_string(),
            kind: StepKind::Command,
            depends: depends.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn env_var_first_occurrence_wins() {
        let dag = Dag {
            env: vec![
                ("A".to_string(), "1".to_string()),
                ("A".to_string(), "2".to_string()),
            ],
            ..Default::default()
        };
        assert_eq!(dag.env_var("A"), Some("1"));
        assert_eq!(dag.env_var("MISSING"), None);
    }

    #[test]
    fn dependency_pairs_reflect_steps() {
        let dag = Dag {
            steps: vec![step("a", &[]), step("b", &["a"])],
            ..Default::default()
        };
        let pairs = dag.dependency_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].1, vec!["a".to_string()]);
    }
}
