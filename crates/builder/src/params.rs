// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default-param-string tokenization (spec.md §4.3 item 4). Each token is
//! either `NAME=VALUE` (named) or positional. Positionals are assigned env
//! names `1`, `2`, ...; named entries additionally set their own env var.

use crate::error::BuildError;
use dagflow_expand::ExpandOptions;

fn is_env_key_char(c: char, first: bool) -> bool {
    if first {
        c.is_alphabetic() || c == '_'
    } else {
        c.is_alphanumeric() || c == '_'
    }
}

fn split_name_value(token: &str) -> Option<(&str, &str)> {
    let eq = token.find('=')?;
    let (name, rest) = (&token[..eq], &token[eq + 1..]);
    if name.is_empty() {
        return None;
    }
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| is_env_key_char(c, true));
    if !first_ok || !chars.all(|c| is_env_key_char(c, false)) {
        return None;
    }
    Some((name, rest))
}

/// Tokenizes the default param string (honoring quoted tokens via the
/// pipeline lexer, then backtick command substitution via the expander —
/// spec.md §4.3 item 4) and returns ordered `(env_key, value)` pairs:
/// every token gets a positional key (`"1"`, `"2"`, ...); `NAME=VALUE`
/// tokens additionally get their own named key.
pub fn parse_params(default_params: &str) -> Result<Vec<(String, String)>, BuildError> {
    let segments = dagflow_shell::parse_pipeline(default_params);
    let tokens = segments.into_iter().next().unwrap_or_default();
    let opts = ExpandOptions::new();

    let mut entries = Vec::with_capacity(tokens.len() * 2);
    for (idx, token) in tokens.iter().enumerate() {
        let token = dagflow_expand::substitute_commands(token, &opts)
            .map_err(|e| BuildError::ParamSubstitution(e.to_string()))?;
        let position_key = (idx + 1).to_string();
        match split_name_value(&token) {
            Some((name, value)) => {
                entries.push((position_key, value.to_string()));
                entries.push((name.to_string(), value.to_string()));
            }
            None => entries.push((position_key, token.clone())),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_tokens_get_indexed_env_keys() {
        let entries = parse_params("foo bar").unwrap();
        assert_eq!(
            entries,
            vec![
                ("1".to_string(), "foo".to_string()),
                ("2".to_string(), "bar".to_string()),
            ]
        );
    }

    #[test]
    fn named_tokens_get_both_keys() {
        let entries = parse_params("env=prod foo").unwrap();
        assert_eq!(
            entries,
            vec![
                ("1".to_string(), "prod".to_string()),
                ("env".to_string(), "prod".to_string()),
                ("2".to_string(), "foo".to_string()),
            ]
        );
    }

    #[test]
    fn honors_quoted_tokens() {
        let entries = parse_params(r#"name="John Doe" env=prod"#).unwrap();
        assert_eq!(entries[0], ("1".to_string(), "John Doe".to_string()));
    }

    #[test]
    fn substitutes_backticks_in_named_token() {
        let entries = parse_params("STAMP=`echo 2024`").unwrap();
        assert_eq!(
            entries,
            vec![
                ("1".to_string(), "2024".to_string()),
                ("STAMP".to_string(), "2024".to_string()),
            ]
        );
    }

    #[test]
    fn nonzero_exit_in_substitution_is_a_build_error() {
        let err = parse_params("`exit 3`").unwrap_err();
        assert!(matches!(err, BuildError::ParamSubstitution(_)));
    }
}
