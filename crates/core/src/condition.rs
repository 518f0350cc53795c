// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preconditions: a (template, expected) pair whose mismatch skips the
//! owning step or DAG (spec.md glossary "Precondition").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Template string, evaluated through the expander each time the owner runs.
    pub condition: String,
    /// Literal value the expanded condition must equal exactly.
    pub expected: String,
}

impl Condition {
    pub fn new(condition: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            expected: expected.into(),
        }
    }

    /// Exact string equality, per spec.md §4.4 step 2.
    pub fn is_met(&self, evaluated: &str) -> bool {
        evaluated == self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn met_on_exact_match() {
        let c = Condition::new("${FOO}", "bar");
        assert!(c.is_met("bar"));
        assert!(!c.is_met("baz"));
        assert!(!c.is_met(" bar"));
    }
}
