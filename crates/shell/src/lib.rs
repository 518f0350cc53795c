// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dagflow-shell: the shell-aware command/argument splitter and pipeline
//! parser (spec.md §4.1).
//!
//! This crate only tokenizes; it never spawns processes. It honors double
//! quotes, single quotes, backticks and backslash escapes the way a POSIX
//! shell's word-splitting does, but does not implement a full shell
//! grammar — `&&`, `||`, `;` and `&` are ordinary tokens here, never
//! control-flow boundaries (spec.md §4.1, §9 open question).

mod error;
mod escape;
mod lexer;

pub use error::ShellError;
pub use escape::{double_control_escapes, quote_if_needed};
pub use lexer::{build_escaped, join_command_args, parse_pipeline, split_command, split_command_args};
