// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Expansion-error kinds (spec.md §7 "Expansion errors"). Unresolved
/// references never raise — only command substitution and integer
/// conversion can.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpandError {
    #[error("command substitution failed for `{command}`: {stderr}")]
    CommandSubstitution { command: String, stderr: String },

    #[error("value is not an integer: {0:?}")]
    NotAnInteger(String),

    #[error("unsupported root value for field expansion")]
    UnsupportedRoot,

    #[error("no shell available to run command substitution")]
    ShellMissing,
}
