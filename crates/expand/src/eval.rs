// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `evalString`/`evalIntString` — the fixed five-stage expansion pipeline
//! (spec.md §4.2).

use crate::command_sub::substitute_commands;
use crate::env_expand::expand_process_env;
use crate::error::ExpandError;
use crate::options::ExpandOptions;
use crate::reference::{expand_references, promote_quoted_references};
use crate::simple_var::replace_simple_variables;
use tracing::instrument;

/// Evaluates `input` through the fixed pipeline: quoted-reference
/// promotion, reference expansion, simple variable replacement, command
/// substitution, environment expansion — each stage toggled by `opts`.
#[instrument(level = "debug", skip(opts), fields(input_len = input.len()))]
pub fn eval_string(input: &str, opts: &ExpandOptions) -> Result<String, ExpandError> {
    let mut value = promote_quoted_references(input, opts);
    value = expand_references(&value, opts);
    value = replace_simple_variables(&value, opts);

    if opts.should_substitute() {
        value = substitute_commands(&value, opts)?;
    }
    if opts.should_expand_env() {
        value = expand_process_env(&value);
    }

    Ok(value)
}

/// Evaluates `input` then parses the result as a decimal integer.
pub fn eval_int_string(input: &str, opts: &ExpandOptions) -> Result<i64, ExpandError> {
    let evaluated = eval_string(input, opts)?;
    evaluated
        .trim()
        .parse::<i64>()
        .map_err(|_| ExpandError::NotAnInteger(evaluated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_plain_command() {
        let opts = ExpandOptions::new().with_variable("NAME", "ls -al test/");
        assert_eq!(eval_string("$NAME", &opts).unwrap(), "ls -al test/");
    }

    #[test]
    fn evaluates_quoted_json_reference() {
        let opts = ExpandOptions::new().with_variable("ITEM", r#"{"file":"a.txt"}"#);
        let result = eval_string(r#"params: aJson="${ITEM}""#, &opts).unwrap();
        assert_eq!(result, r#"params: aJson="{\"file\":\"a.txt\"}""#);
    }

    #[test]
    fn evaluates_json_path_reference() {
        let opts = ExpandOptions::new()
            .with_variable("CFG", r#"{"database":{"host":"db.example.com"}}"#);
        assert_eq!(
            eval_string("${CFG.database.host}", &opts).unwrap(),
            "db.example.com"
        );
    }

    #[test]
    fn is_idempotent_once_resolved() {
        let opts = ExpandOptions::new().with_variable("NAME", "world");
        let once = eval_string("hello $NAME", &opts).unwrap();
        let twice = eval_string(&once, &opts).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn eval_int_string_parses_result() {
        let opts = ExpandOptions::new().with_variable("N", "42");
        assert_eq!(eval_int_string("$N", &opts).unwrap(), 42);
    }

    #[test]
    fn eval_int_string_rejects_non_integer() {
        let opts = ExpandOptions::new().with_variable("N", "not-a-number");
        assert!(matches!(
            eval_int_string("$N", &opts),
            Err(ExpandError::NotAnInteger(_))
        ));
    }

    #[test]
    fn only_replace_vars_skips_substitute_and_env() {
        std::env::set_var("DAGFLOW_EVAL_TEST", "env-value");
        let opts = ExpandOptions::new()
            .with_variable("CMD", "echo hi")
            .only_replace_vars(true);
        let result = eval_string("`$CMD` $DAGFLOW_EVAL_TEST", &opts).unwrap();
        assert_eq!(result, "`echo hi` $DAGFLOW_EVAL_TEST");
        std::env::remove_var("DAGFLOW_EVAL_TEST");
    }
}
