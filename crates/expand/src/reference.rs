// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quoted-reference promotion and reference expansion — stages 1 and 2 of
//! [`crate::eval_string`] (spec.md §4.2).

use crate::json_path;
use crate::options::{ExpandOptions, StepObservable};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn brace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_]+|\[[0-9]+\])*)\}")
            .expect("static pattern is valid")
    })
}

fn bare_dotted_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_]+|\[[0-9]+\])+)")
            .expect("static pattern is valid")
    })
}

fn quoted_brace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""\$\{([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_]+|\[[0-9]+\])*)\}""#)
            .expect("static pattern is valid")
    })
}

fn path_of(captures: &Captures, group: usize) -> Option<String> {
    match captures.get(group) {
        Some(m) if !m.as_str().is_empty() => Some(m.as_str().to_string()),
        _ => None,
    }
}

fn resolve_value(raw: &str, path: Option<&str>) -> Option<String> {
    match path {
        None => Some(raw.to_string()),
        Some(p) => {
            let json: Value = serde_json::from_str(raw).ok()?;
            let value = json_path::eval(&json, p)?;
            Some(json_path::render(&value))
        }
    }
}

fn resolve_step(step: &StepObservable, path: Option<&str>) -> Option<String> {
    let suffix = path?.trim_start_matches('.').to_string();
    match suffix.as_str() {
        "stdout" => Some(step.stdout.display().to_string()),
        "stderr" => Some(step.stderr.display().to_string()),
        "exitCode" | "exit_code" => Some(step.exit_code.to_string()),
        _ => None,
    }
}

/// Resolution order: (a) variable mapping, (b) process environment,
/// (c) stepMap. A hit at a higher-priority source that fails its own path
/// lookup does not fall through to a lower one (spec.md §9 open question:
/// variables win on name collision).
fn resolve(name: &str, path: Option<&str>, opts: &ExpandOptions) -> Option<String> {
    if let Some(raw) = opts.variable(name) {
        return resolve_value(raw, path);
    }
    if let Ok(raw) = std::env::var(name) {
        return resolve_value(&raw, path);
    }
    if let Some(step) = opts.step(name) {
        return resolve_step(step, path);
    }
    None
}

/// Stage 1: finds `"${NAME}"` or `"${NAME.path}"`; if resolvable, replaces
/// the entire quoted construct (quotes included) with a properly quoted
/// string, escaping embedded `"`. Unresolved references are left literal.
pub fn promote_quoted_references(input: &str, opts: &ExpandOptions) -> String {
    quoted_brace_pattern()
        .replace_all(input, |caps: &Captures| {
            let name = &caps[1];
            let path = path_of(caps, 2);
            match resolve(name, path.as_deref(), opts) {
                Some(value) => format!("\"{}\"", value.replace('"', "\\\"")),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Stage 2: expands all `${NAME(.path)?}` and `$NAME.path` references.
/// Lookup failure leaves the token unchanged.
pub fn expand_references(input: &str, opts: &ExpandOptions) -> String {
    let braced = brace_pattern().replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        let path = path_of(caps, 2);
        resolve(name, path.as_deref(), opts).unwrap_or_else(|| caps[0].to_string())
    });
    bare_dotted_pattern()
        .replace_all(&braced, |caps: &Captures| {
            let name = &caps[1];
            let path = path_of(caps, 2);
            resolve(name, path.as_deref(), opts).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_quoted_reference_with_escaped_quotes() {
        let opts = ExpandOptions::new().with_variable("ITEM", r#"{"file":"a.txt"}"#);
        let result = promote_quoted_references(r#"params: aJson="${ITEM}""#, &opts);
        assert_eq!(result, r#"params: aJson="{\"file\":\"a.txt\"}""#);
    }

    #[test]
    fn leaves_unresolved_quoted_reference_literal() {
        let opts = ExpandOptions::new();
        let result = promote_quoted_references(r#"x="${MISSING}""#, &opts);
        assert_eq!(result, r#"x="${MISSING}""#);
    }

    #[test]
    fn expands_dotted_json_path_reference() {
        let opts = ExpandOptions::new()
            .with_variable("CFG", r#"{"database":{"host":"db.example.com"}}"#);
        let result = expand_references("${CFG.database.host}", &opts);
        assert_eq!(result, "db.example.com");
    }

    #[test]
    fn expands_bare_dotted_reference() {
        let opts = ExpandOptions::new().with_variable("CFG", r#"{"a":1}"#);
        let result = expand_references("value=$CFG.a", &opts);
        assert_eq!(result, "value=1");
    }

    #[test]
    fn resolves_step_output_suffixes() {
        let opts = ExpandOptions::new().with_step(
            "build",
            StepObservable {
                stdout: "/tmp/build.out".into(),
                stderr: "/tmp/build.err".into(),
                exit_code: 0,
            },
        );
        assert_eq!(
            expand_references("${build.stdout}", &opts),
            "/tmp/build.out"
        );
        assert_eq!(expand_references("${build.exitCode}", &opts), "0");
    }

    #[test]
    fn unresolved_reference_left_unchanged() {
        let opts = ExpandOptions::new();
        assert_eq!(expand_references("${NOPE}", &opts), "${NOPE}");
    }

    #[test]
    fn variable_priority_beats_stepmap_on_collision() {
        let opts = ExpandOptions::new()
            .with_variable("build", "from-variable")
            .with_step(
                "build",
                StepObservable {
                    stdout: "/tmp/out".into(),
                    stderr: "/tmp/err".into(),
                    exit_code: 0,
                },
            );
        assert_eq!(expand_references("${build}", &opts), "from-variable");
    }
}
