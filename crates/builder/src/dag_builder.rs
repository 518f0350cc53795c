// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level `build_dag` orchestration (spec.md §4.3), composing the
//! per-concern helpers in this crate into one compiled [`Dag`].

use crate::config_value::ConfigValue;
use crate::error::{BuildError, BuildErrors};
use crate::function::Function;
use crate::params::parse_params;
use crate::step_builder::{compile_step, BuildContext};
use dagflow_core::cron::Cron;
use dagflow_core::dag::{Dag, MailOnConfig, Schedule};
use dagflow_core::graph::validate_acyclic;
use std::collections::HashSet;

const RESERVED_HANDLER_NAMES: &[&str] = &["exit", "success", "failure", "cancel"];

fn get<'a>(map: &'a [(String, ConfigValue)], key: &str) -> Option<&'a ConfigValue> {
    map.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn build_env(
    value: Option<&ConfigValue>,
    ctx: &BuildContext,
    errors: &mut Vec<BuildError>,
) -> Vec<(String, String)> {
    let mut push_entry = |key: &str, val: &ConfigValue, env: &mut Vec<(String, String)>| {
        match val.render_scalar() {
            Some(s) => env.push((key.to_string(), expand_env_value(s, ctx))),
            None => errors.push(BuildError::InvalidEnvValue(key.to_string())),
        }
    };

    match value {
        Some(ConfigValue::Map(entries)) => {
            let mut env = Vec::with_capacity(entries.len());
            for (key, val) in entries {
                push_entry(key, val, &mut env);
            }
            env
        }
        Some(ConfigValue::Seq(items)) => {
            let mut env = Vec::with_capacity(items.len());
            for item in items {
                let Some(map) = item.as_map() else {
                    continue;
                };
                for (key, val) in map {
                    push_entry(key, val, &mut env);
                }
            }
            env
        }
        _ => Vec::new(),
    }
}

/// Runs one `env` value through the expander with `onlyReplaceVars`
/// disabled (spec.md §4.3 item 2), suppressed by `ctx.no_eval` per the
/// same departure documented on [`BuildContext`].
fn expand_env_value(value: String, ctx: &BuildContext) -> String {
    if ctx.no_eval {
        return value;
    }
    dagflow_expand::eval_string(&value, &dagflow_expand::ExpandOptions::new()).unwrap_or(value)
}

fn build_crons(value: &ConfigValue, errors: &mut Vec<BuildError>) -> Vec<Cron> {
    let raw: Vec<String> = match value {
        ConfigValue::Scalar(s) => vec![s.clone()],
        ConfigValue::Seq(items) => items.iter().filter_map(ConfigValue::render_scalar).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .filter_map(|expr| match Cron::parse(&expr) {
            Ok(cron) => Some(cron),
            Err(_) => {
                errors.push(BuildError::InvalidSchedule(expr));
                None
            }
        })
        .collect()
}

/// `schedule` may be a single cron string, a list of cron strings, or a
/// mapping with `start`/`stop`/`restart` keys (spec.md §4.3 item 3).
fn build_schedule(value: Option<&ConfigValue>, errors: &mut Vec<BuildError>) -> Schedule {
    let Some(value) = value else {
        return Schedule::default();
    };
    match value {
        ConfigValue::Scalar(_) | ConfigValue::Seq(_) => Schedule {
            start: build_crons(value, errors),
            stop: Vec::new(),
            restart: Vec::new(),
        },
        ConfigValue::Map(entries) => {
            for (key, _) in entries {
                if !matches!(key.as_str(), "start" | "stop" | "restart") {
                    errors.push(BuildError::ScheduleKey(key.clone()));
                }
            }
            Schedule {
                start: get(entries, "start")
                    .map(|v| build_crons(v, errors))
                    .unwrap_or_default(),
                stop: get(entries, "stop")
                    .map(|v| build_crons(v, errors))
                    .unwrap_or_default(),
                restart: get(entries, "restart")
                    .map(|v| build_crons(v, errors))
                    .unwrap_or_default(),
            }
        }
        _ => {
            errors.push(BuildError::InvalidScheduleType);
            Schedule::default()
        }
    }
}

fn build_functions(value: Option<&ConfigValue>, errors: &mut Vec<BuildError>) -> Vec<Function> {
    let Some(items) = value.and_then(ConfigValue::as_seq) else {
        return Vec::new();
    };
    let mut functions = Vec::new();
    let mut seen = HashSet::new();
    for item in items {
        let Some(map) = item.as_map() else { continue };
        let name = get(map, "name").and_then(ConfigValue::as_str).unwrap_or_default();
        if !seen.insert(name.to_string()) {
            errors.push(BuildError::DuplicateFunction(name.to_string()));
            continue;
        }
        let params: Vec<String> = get(map, "params")
            .map(|v| match v {
                ConfigValue::Seq(items) => {
                    items.iter().filter_map(ConfigValue::render_scalar).collect()
                }
                ConfigValue::Scalar(s) => s.split_whitespace().map(str::to_string).collect(),
                _ => Vec::new(),
            })
            .unwrap_or_default();
        let template = get(map, "command").and_then(ConfigValue::as_str).unwrap_or_default();
        match Function::new(name, params, template) {
            Ok(f) => functions.push(f),
            Err(e) => errors.push(e),
        }
    }
    functions
}

/// Builds a [`Dag`] from a decoded document (spec.md §4.3 top-level
/// `buildDAG`). `base` is an already-built base config to overlay onto, if
/// the document has a `base`/parent reference resolved by the caller
/// (spec.md §4.3 item 8); `None` when this document is itself a base or
/// stands alone.
pub fn build_dag(
    value: &ConfigValue,
    base: Option<&Dag>,
    ctx: &BuildContext,
) -> Result<Dag, BuildErrors> {
    let mut errors = BuildErrors::default();
    let map = value.as_map().unwrap_or(&[]);

    let mut dag = base.cloned().unwrap_or_default();

    if let Some(name) = get(map, "name").and_then(ConfigValue::as_str) {
        dag.name = name.to_string();
    }
    if let Some(group) = get(map, "group").and_then(ConfigValue::as_str) {
        dag.group = group.to_string();
    }
    if let Some(description) = get(map, "description").and_then(ConfigValue::as_str) {
        dag.description = description.to_string();
    }
    if let Some(tags) = get(map, "tags") {
        dag.tags = match tags {
            ConfigValue::Seq(items) => {
                items.iter().filter_map(ConfigValue::render_scalar).collect()
            }
            ConfigValue::Scalar(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
            _ => dag.tags,
        };
    }

    let mut env = build_env(get(map, "env"), ctx, &mut errors.0);
    if env.is_empty() {
        env = dag.env.clone();
    } else {
        let mut merged = env;
        merged.extend(dag.env.clone());
        env = merged;
    }
    dag.env = env;

    dag.params = get(map, "params")
        .and_then(ConfigValue::as_str)
        .unwrap_or(&dag.params)
        .to_string();
    let param_env = match parse_params(&dag.params) {
        Ok(entries) => entries,
        Err(e) => {
            errors.push(e);
            Vec::new()
        }
    };
    dag.env.extend(param_env);

    if let Some(schedule_val) = get(map, "schedule") {
        dag.schedule = build_schedule(Some(schedule_val), &mut errors.0);
    }

    if let Some(max_active) = get(map, "maxActiveRuns").and_then(ConfigValue::as_int) {
        dag.max_active_runs = max_active.max(0) as u32;
    } else if dag.max_active_runs == 0 {
        dag.max_active_runs = 1;
    }

    if let Some(retention) = get(map, "histRetentionDays").and_then(ConfigValue::as_int) {
        dag.hist_retention_days = Some(retention);
    }
    if let Some(log_dir) = get(map, "logDir").and_then(ConfigValue::as_str) {
        dag.log_dir = Some(log_dir.to_string());
    }
    if let Some(delay) = get(map, "delaySec").and_then(ConfigValue::as_int) {
        dag.delay_sec = delay.max(0) as u64;
    }
    if let Some(restart_wait) = get(map, "restartWaitSec").and_then(ConfigValue::as_int) {
        dag.restart_wait_sec = restart_wait.max(0) as u64;
    }
    if let Some(cleanup) = get(map, "maxCleanupTimeSec").and_then(ConfigValue::as_int) {
        dag.max_cleanup_time_sec = cleanup.max(0) as u64;
    }

    // `mailOn` uses present-or-absent semantics, not a default-then-overlay:
    // an absent key leaves the base's value untouched (spec.md §4.3 item 8).
    if let Some(mail_on) = get(map, "mailOn").and_then(ConfigValue::as_map) {
        dag.mail_on = MailOnConfig {
            failure: get(mail_on, "failure").and_then(ConfigValue::as_bool).unwrap_or(false),
            success: get(mail_on, "success").and_then(ConfigValue::as_bool).unwrap_or(false),
        };
    }

    if let Some(preconditions) = get(map, "preconditions") {
        dag.preconditions = crate::step_builder::build_preconditions(Some(preconditions));
    }

    let functions = build_functions(get(map, "functions"), &mut errors.0);

    let mut steps = Vec::new();
    if let Some(steps_val) = get(map, "steps") {
        match steps_val {
            ConfigValue::Seq(items) => {
                for item in items {
                    let (step, step_errors) =
                        compile_step(None, item, &functions, ctx);
                    errors.0.extend(step_errors);
                    steps.push(step);
                }
            }
            ConfigValue::Map(entries) => {
                for (key, item) in entries {
                    let (step, step_errors) =
                        compile_step(Some(key.as_str()), item, &functions, ctx);
                    errors.0.extend(step_errors);
                    steps.push(step);
                }
            }
            _ => {}
        }
    }
    if !steps.is_empty() {
        dag.steps = steps;
    }

    if let Some(handlers_val) = get(map, "handlers").and_then(ConfigValue::as_map) {
        for name in RESERVED_HANDLER_NAMES {
            if let Some(handler_val) = get(handlers_val, name) {
                let (mut step, step_errors) =
                    compile_step(Some(name), handler_val, &functions, ctx);
                step.name = (*name).to_string();
                errors.0.extend(step_errors);
                dag.handlers.insert((*name).to_string(), step);
            }
        }
        for (key, _) in handlers_val {
            if !RESERVED_HANDLER_NAMES.contains(&key.as_str()) {
                errors.push(BuildError::StepNameRequired);
            }
        }
    }

    let pairs = dag.dependency_pairs();
    if let Err(e) = validate_acyclic(&pairs) {
        errors.push(BuildError::from(e));
    }

    errors.into_result(dag)
}
