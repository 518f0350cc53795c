// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dagflow-engine: the step executor and DAG scheduler (spec.md §4.4,
//! §4.5) — drives a compiled [`dagflow_core::Dag`] to completion.
//!
//! This crate owns process lifetime (launch, tee, signal, retry/repeat),
//! the indegree-driven worker pool that dispatches steps as their
//! dependencies clear, cascading cancellation across edges a step didn't
//! opt into via `continueOn`, and lifecycle handler dispatch once the
//! main graph terminates. It has no knowledge of configuration decoding
//! or graph validation — those belong to `dagflow-builder` and
//! `dagflow-core::graph` respectively. [`run::run_dag`] is the single
//! entry point; everything else is an implementation detail it composes.

mod cancel;
mod collaborators;
mod error;
mod executor;
mod handlers;
mod process;
mod run;
mod scheduler;
mod state;
mod tail_buffer;

pub use cancel::CancelToken;
pub use collaborators::{
    HistoryWriter, MailMessage, Mailer, NullHistoryWriter, NullMailer, NullSubWorkflowRunner,
    RecordingMailer, SubWorkflowContext, SubWorkflowRunner,
};
pub use error::RuntimeError;
pub use executor::{execute_step, ExecutorContext};
pub use handlers::run_handlers;
pub use process::{run_command, ProcessOutcome};
pub use run::{run_dag, RunConfig, DEFAULT_HISTORY_SNAPSHOT_INTERVAL};
pub use scheduler::{run_graph, GraphOutcome};
pub use state::RunState;
pub use tail_buffer::{TailBuffer, DEFAULT_TAIL_CAPACITY};
