// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiles one decoded step entry into a [`dagflow_core::Step`]
//! (spec.md §4.3 item 6, `buildStep`).

use crate::config_value::ConfigValue;
use crate::error::BuildError;
use crate::function::Function;
use crate::signal::is_known_signal;
use dagflow_core::step::{
    ContinueOn, ExecutorConfig, RepeatPolicy, RetryPolicy, Step, StepKind, SubWorkflowRef,
};
use dagflow_core::Condition;
use std::collections::HashMap;
use std::time::Duration;

/// Controls whether build-time environment expansion of `dir`/`stdout`/
/// `stderr` (and env-block values) runs, per spec.md §9's documented
/// departure from the source's unconditional global-env mutation: callers
/// loading multiple DAGs concurrently pass `no_eval: true` to suppress it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext {
    pub no_eval: bool,
}

fn get<'a>(map: &'a [(String, ConfigValue)], key: &str) -> Option<&'a ConfigValue> {
    map.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn string_list(value: &ConfigValue) -> Vec<String> {
    match value {
        ConfigValue::Seq(items) => items.iter().filter_map(ConfigValue::render_scalar).collect(),
        ConfigValue::Scalar(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn maybe_expand_env(value: String, ctx: &BuildContext) -> String {
    if ctx.no_eval {
        return value;
    }
    dagflow_expand::eval_string(&value, &dagflow_expand::ExpandOptions::new()).unwrap_or(value)
}

fn build_command_from_scalar(name: &str, s: &str) -> Result<(String, Vec<String>), BuildError> {
    dagflow_shell::split_command(s, false).map_err(|_| {
        let _ = name;
        BuildError::EmptyCommand
    })
}

fn build_command_from_seq(items: &[ConfigValue]) -> Option<(String, Vec<String>)> {
    let mut iter = items.iter();
    let command = iter.next()?.render_scalar()?;
    let args = iter.filter_map(ConfigValue::render_scalar).collect();
    Some((command, args))
}

fn resolve_call(
    step_name: &str,
    call: &ConfigValue,
    functions: &[Function],
) -> Result<(String, Vec<String>), BuildError> {
    let map = call
        .as_map()
        .ok_or_else(|| BuildError::CallTargetMissing(step_name.to_string(), String::new()))?;
    let func_name = get(map, "function")
        .and_then(ConfigValue::as_str)
        .ok_or_else(|| BuildError::CallTargetMissing(step_name.to_string(), String::new()))?;
    let function = functions
        .iter()
        .find(|f| f.name == func_name)
        .ok_or_else(|| {
            BuildError::CallTargetMissing(step_name.to_string(), func_name.to_string())
        })?;

    let args_map = get(map, "args").and_then(ConfigValue::as_map).unwrap_or(&[]);
    let mut resolved = HashMap::new();
    for (k, v) in args_map {
        if !function.params.iter().any(|p| p == k) {
            return Err(BuildError::UnknownCallArg(step_name.to_string(), k.clone()));
        }
        if let Some(s) = v.render_scalar() {
            resolved.insert(k.clone(), s);
        }
    }

    let mut template = function.template.clone();
    for param in &function.params {
        let value = resolved.get(param).ok_or_else(|| {
            BuildError::RequiredParamMissing(step_name.to_string(), param.clone())
        })?;
        template = template.replace(&format!("${param}"), value);
    }

    dagflow_shell::split_command(&template, false).map_err(|_| BuildError::EmptyCommand)
}

fn build_run(
    step_name: &str,
    run: &ConfigValue,
) -> Result<(String, Vec<String>, SubWorkflowRef), BuildError> {
    let (sub_name, params_str) = match run {
        ConfigValue::Scalar(s) => (s.clone(), String::new()),
        ConfigValue::Map(_) => {
            let sub_name = run
                .get("name")
                .and_then(ConfigValue::as_str)
                .unwrap_or_default()
                .to_string();
            let params_str = run
                .get("params")
                .and_then(ConfigValue::as_str)
                .unwrap_or_default()
                .to_string();
            (sub_name, params_str)
        }
        _ => return Err(BuildError::ArgsKind(step_name.to_string())),
    };

    let params: Vec<(String, String)> = params_str
        .split_whitespace()
        .filter_map(|tok| tok.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .collect();

    let command = "run".to_string();
    let mut args = vec![sub_name.clone()];
    args.extend(params_str.split_whitespace().map(str::to_string));

    Ok((
        command,
        args,
        SubWorkflowRef {
            name: sub_name,
            params,
        },
    ))
}

fn build_executor(
    step_name: &str,
    executor: Option<&ConfigValue>,
    is_sub_workflow: bool,
    errors: &mut Vec<BuildError>,
) -> Option<ExecutorConfig> {
    match executor {
        Some(ConfigValue::Scalar(kind)) => Some(ExecutorConfig {
            kind: kind.clone(),
            config: HashMap::new(),
        }),
        Some(ConfigValue::Map(entries)) => {
            let kind = get(entries, "type")
                .and_then(ConfigValue::as_str)
                .unwrap_or_default()
                .to_string();
            let mut config = HashMap::new();
            if let Some(cfg_entries) = get(entries, "config").and_then(ConfigValue::as_map) {
                for (k, v) in cfg_entries {
                    match v.render_scalar() {
                        Some(s) => {
                            config.insert(k.clone(), s);
                        }
                        None => errors.push(BuildError::ExecutorKey(k.clone())),
                    }
                }
            }
            for (k, _) in entries {
                if k != "type" && k != "config" {
                    errors.push(BuildError::ExecutorKey(k.clone()));
                }
            }
            let _ = step_name;
            Some(ExecutorConfig { kind, config })
        }
        Some(_) => {
            errors.push(BuildError::ExecutorMustBeStringOrMap);
            None
        }
        None if is_sub_workflow => Some(ExecutorConfig {
            kind: "subworkflow".to_string(),
            config: HashMap::new(),
        }),
        None => None,
    }
}

fn build_retry_policy(value: Option<&ConfigValue>) -> RetryPolicy {
    let Some(map) = value.and_then(ConfigValue::as_map) else {
        return RetryPolicy::default();
    };
    RetryPolicy {
        limit: get(map, "limit").and_then(ConfigValue::as_int).unwrap_or(0) as u32,
        interval: Duration::from_secs(
            get(map, "interval").and_then(ConfigValue::as_int).unwrap_or(0).max(0) as u64,
        ),
    }
}

fn build_repeat_policy(value: Option<&ConfigValue>) -> RepeatPolicy {
    let Some(map) = value.and_then(ConfigValue::as_map) else {
        return RepeatPolicy::default();
    };
    RepeatPolicy {
        repeat: get(map, "repeat").and_then(ConfigValue::as_bool).unwrap_or(false),
        interval: Duration::from_secs(
            get(map, "interval").and_then(ConfigValue::as_int).unwrap_or(0).max(0) as u64,
        ),
    }
}

fn build_continue_on(value: Option<&ConfigValue>) -> ContinueOn {
    let Some(map) = value.and_then(ConfigValue::as_map) else {
        return ContinueOn::default();
    };
    ContinueOn {
        failure: get(map, "failure").and_then(ConfigValue::as_bool).unwrap_or(false),
        skipped: get(map, "skipped").and_then(ConfigValue::as_bool).unwrap_or(false),
    }
}

pub(crate) fn build_preconditions(value: Option<&ConfigValue>) -> Vec<Condition> {
    let Some(items) = value.and_then(ConfigValue::as_seq) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let map = item.as_map()?;
            let condition = get(map, "condition").and_then(ConfigValue::as_str)?.to_string();
            let expected = get(map, "expected").and_then(ConfigValue::as_str)?.to_string();
            Some(Condition::new(condition, expected))
        })
        .collect()
}

/// Compiles one step entry. `entry_key` is the map key when steps are
/// decoded from a mapping shape rather than a sequence (mirroring the
/// teacher's `StepDef`/`deserialize_steps` dual-shape handling,
/// `examples/groblegark-oddjobs/crates/runbook/src/pipeline.rs`).
pub fn compile_step(
    entry_key: Option<&str>,
    value: &ConfigValue,
    functions: &[Function],
    ctx: &BuildContext,
) -> (Step, Vec<BuildError>) {
    let mut errors = Vec::new();
    let map = value.as_map().unwrap_or(&[]);

    let name = get(map, "name")
        .and_then(ConfigValue::as_str)
        .map(str::to_string)
        .or_else(|| entry_key.map(str::to_string))
        .unwrap_or_default();
    if name.is_empty() {
        errors.push(BuildError::StepNameRequired);
    }

    let description = get(map, "description")
        .and_then(ConfigValue::as_str)
        .unwrap_or_default()
        .to_string();

    let command_val = get(map, "command");
    let call_val = get(map, "call");
    let run_val = get(map, "run");
    let executor_val = get(map, "executor");

    if command_val.is_none() && call_val.is_none() && run_val.is_none() && executor_val.is_none() {
        errors.push(BuildError::StepCommandOrCallRequired(name.clone()));
    }

    let mut kind = StepKind::Command;
    let mut command = String::new();
    let mut args = Vec::new();
    let mut sub_workflow = None;

    if let Some(cmd_val) = command_val {
        match cmd_val {
            ConfigValue::Scalar(s) => match build_command_from_scalar(&name, s) {
                Ok((c, a)) => {
                    command = c;
                    args = a;
                }
                Err(e) => errors.push(e),
            },
            ConfigValue::Seq(items) => match build_command_from_seq(items) {
                Some((c, a)) => {
                    command = c;
                    args = a;
                }
                None => errors.push(BuildError::EmptyCommand),
            },
            _ => errors.push(BuildError::ArgsKind(name.clone())),
        }
    } else if let Some(call_val) = call_val {
        match resolve_call(&name, call_val, functions) {
            Ok((c, a)) => {
                command = c;
                args = a;
            }
            Err(e) => errors.push(e),
        }
    } else if let Some(run_val) = run_val {
        kind = StepKind::SubWorkflow;
        match build_run(&name, run_val) {
            Ok((c, a, sw)) => {
                command = c;
                args = a;
                sub_workflow = Some(sw);
            }
            Err(e) => errors.push(e),
        }
    }

    if get(map, "script").and_then(ConfigValue::as_str).is_some() {
        kind = StepKind::Script;
    }

    let executor = build_executor(
        &name,
        executor_val,
        matches!(kind, StepKind::SubWorkflow),
        &mut errors,
    );

    let script = get(map, "script")
        .and_then(ConfigValue::as_str)
        .unwrap_or_default()
        .to_string();

    let dir = get(map, "dir")
        .and_then(ConfigValue::as_str)
        .map(|s| maybe_expand_env(s.to_string(), ctx));
    let stdout = get(map, "stdout")
        .and_then(ConfigValue::as_str)
        .map(|s| maybe_expand_env(s.to_string(), ctx));
    let stderr = get(map, "stderr")
        .and_then(ConfigValue::as_str)
        .map(|s| maybe_expand_env(s.to_string(), ctx));

    let output = get(map, "output").and_then(ConfigValue::as_str).map(str::to_string);
    let depends = get(map, "depends").map(string_list).unwrap_or_default();

    let signal_on_stop = get(map, "signalOnStop").and_then(ConfigValue::as_str).map(|s| {
        if !is_known_signal(s) {
            errors.push(BuildError::InvalidSignal(s.to_string()));
        }
        s.to_string()
    });

    let mail_on_error = get(map, "mailOnError").and_then(ConfigValue::as_bool).unwrap_or(false);

    let step = Step {
        name,
        description,
        kind,
        command,
        args,
        script,
        dir,
        stdout,
        stderr,
        output,
        depends,
        continue_on: build_continue_on(get(map, "continueOn")),
        retry_policy: build_retry_policy(get(map, "retryPolicy")),
        repeat_policy: build_repeat_policy(get(map, "repeatPolicy")),
        signal_on_stop,
        executor,
        sub_workflow,
        preconditions: build_preconditions(get(map, "preconditions")),
        mail_on_error,
    };

    (step, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> ConfigValue {
        ConfigValue::Scalar(s.to_string())
    }

    #[test]
    fn compiles_simple_command_step() {
        let value = ConfigValue::Map(vec![
            ("name".to_string(), scalar("build")),
            ("command".to_string(), scalar("make -j4")),
        ]);
        let (step, errors) = compile_step(None, &value, &[], &BuildContext::default());
        assert!(errors.is_empty());
        assert_eq!(step.name, "build");
        assert_eq!(step.command, "make");
        assert_eq!(step.args, vec!["-j4".to_string()]);
    }

    #[test]
    fn requires_name() {
        let value = ConfigValue::Map(vec![("command".to_string(), scalar("ls"))]);
        let (_step, errors) = compile_step(None, &value, &[], &BuildContext::default());
        assert!(errors.contains(&BuildError::StepNameRequired));
    }

    #[test]
    fn requires_command_call_run_or_executor() {
        let value = ConfigValue::Map(vec![("name".to_string(), scalar("noop"))]);
        let (_step, errors) = compile_step(None, &value, &[], &BuildContext::default());
        assert!(errors
            .iter()
            .any(|e| matches!(e, BuildError::StepCommandOrCallRequired(_))));
    }

    #[test]
    fn rejects_invalid_signal() {
        let value = ConfigValue::Map(vec![
            ("name".to_string(), scalar("x")),
            ("command".to_string(), scalar("sleep 1")),
            ("signalOnStop".to_string(), scalar("SIGBOGUS")),
        ]);
        let (_step, errors) = compile_step(None, &value, &[], &BuildContext::default());
        assert!(errors
            .iter()
            .any(|e| matches!(e, BuildError::InvalidSignal(_))));
    }

    #[test]
    fn call_resolves_function_template() {
        let functions = vec![Function::new(
            "greet",
            vec!["name".to_string()],
            "echo hello $name",
        )
        .unwrap()];
        let value = ConfigValue::Map(vec![
            ("name".to_string(), scalar("greet-step")),
            (
                "call".to_string(),
                ConfigValue::Map(vec![
                    ("function".to_string(), scalar("greet")),
                    (
                        "args".to_string(),
                        ConfigValue::Map(vec![("name".to_string(), scalar("world"))]),
                    ),
                ]),
            ),
        ]);
        let (step, errors) = compile_step(None, &value, &functions, &BuildContext::default());
        assert!(errors.is_empty());
        assert_eq!(step.command, "echo");
        assert_eq!(step.args, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn call_missing_param_errors() {
        let functions = vec![Function::new(
            "greet",
            vec!["name".to_string()],
            "echo hello $name",
        )
        .unwrap()];
        let value = ConfigValue::Map(vec![
            ("name".to_string(), scalar("greet-step")),
            (
                "call".to_string(),
                ConfigValue::Map(vec![("function".to_string(), scalar("greet"))]),
            ),
        ]);
        let (_step, errors) = compile_step(None, &value, &functions, &BuildContext::default());
        assert!(errors
            .iter()
            .any(|e| matches!(e, BuildError::RequiredParamMissing(_, _))));
    }

    #[test]
    fn call_unknown_arg_errors() {
        let functions = vec![Function::new(
            "greet",
            vec!["name".to_string()],
            "echo hello $name",
        )
        .unwrap()];
        let value = ConfigValue::Map(vec![
            ("name".to_string(), scalar("greet-step")),
            (
                "call".to_string(),
                ConfigValue::Map(vec![
                    ("function".to_string(), scalar("greet")),
                    (
                        "args".to_string(),
                        ConfigValue::Map(vec![
                            ("name".to_string(), scalar("world")),
                            ("extra".to_string(), scalar("nope")),
                        ]),
                    ),
                ]),
            ),
        ]);
        let (_step, errors) = compile_step(None, &value, &functions, &BuildContext::default());
        assert!(errors
            .iter()
            .any(|e| matches!(e, BuildError::UnknownCallArg(_, name) if name == "extra")));
    }

    #[test]
    fn run_produces_subworkflow_step() {
        let value = ConfigValue::Map(vec![
            ("name".to_string(), scalar("sub")),
            ("run".to_string(), scalar("other-dag")),
        ]);
        let (step, errors) = compile_step(None, &value, &[], &BuildContext::default());
        assert!(errors.is_empty());
        assert!(matches!(step.kind, StepKind::SubWorkflow));
        assert_eq!(step.sub_workflow.as_ref().unwrap().name, "other-dag");
        assert_eq!(step.executor.as_ref().unwrap().kind, "subworkflow");
    }
}
