// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dagflow-builder: the DAG builder (spec.md §4.3) — turns a decoded
//! configuration tree into a compiled, validated [`dagflow_core::Dag`].
//!
//! This crate owns decoding of the heterogeneous configuration shape
//! ([`ConfigValue`]) and every per-concern compile step (env, schedule,
//! params, functions, steps, handlers, base-config overlay, cycle/reference
//! validation); it has no knowledge of process execution. `build_dag` is
//! the single entry point; everything else is an implementation detail
//! composed by [`dag_builder::build_dag`].

mod config_value;
mod dag_builder;
mod error;
mod function;
mod params;
mod signal;
mod step_builder;

pub use config_value::ConfigValue;
pub use dag_builder::build_dag;
pub use error::{BuildError, BuildErrors};
pub use function::Function;
pub use params::parse_params;
pub use step_builder::{compile_step, BuildContext};
