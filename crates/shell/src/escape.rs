// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Escape helpers used by [`crate::split_command`] (substitution mode) and
//! [`crate::build_escaped`].

/// Doubles the backslash in `\t`, `\r`, `\n` escape sequences so that a
/// downstream parser (command substitution, a nested shell) sees a literal
/// two-character escape instead of interpreting it early. Any other
/// backslash sequence passes through unchanged (spec.md §4.1 `splitCommand`,
/// `substitute=true`).
pub fn double_control_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('t') | Some('r') | Some('n') => {
                    let next = chars.next().expect("peeked Some");
                    out.push('\\');
                    out.push('\\');
                    out.push(next);
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

/// True if `arg` is already wrapped in a matching pair of quotes (`"..."` or
/// `'...'`), in which case [`crate::build_escaped`] passes it through as-is.
fn already_quoted(arg: &str) -> bool {
    let bytes = arg.as_bytes();
    bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
}

/// True for the special `key="value"` form, which [`crate::build_escaped`]
/// preserves verbatim rather than re-wrapping in an outer pair of quotes.
fn is_key_value_form(arg: &str) -> bool {
    match arg.find('=') {
        Some(idx) if idx > 0 => {
            let key = &arg[..idx];
            let rest = &arg[idx + 1..];
            key.chars().all(|c| c.is_alphanumeric() || c == '_')
                && rest.starts_with('"')
                && rest.ends_with('"')
                && rest.len() >= 2
        }
        _ => false,
    }
}

/// Wraps `arg` in double quotes (escaping embedded `"`) if it needs it to
/// survive re-lexing: contains whitespace and is not already quoted and is
/// not the `key="value"` special form. Used by [`crate::build_escaped`].
pub fn quote_if_needed(arg: &str) -> String {
    if already_quoted(arg) || is_key_value_form(arg) {
        return arg.to_string();
    }
    if arg.chars().any(char::is_whitespace) {
        let escaped = arg.replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_known_control_escapes() {
        assert_eq!(double_control_escapes("a\\tb"), "a\\\\tb");
        assert_eq!(double_control_escapes("a\\rb\\nc"), "a\\\\rb\\\\nc");
    }

    #[test]
    fn leaves_other_backslashes_alone() {
        assert_eq!(double_control_escapes("a\\qb"), "a\\qb");
        assert_eq!(double_control_escapes("no backslash"), "no backslash");
    }

    #[yare::parameterized(
        wraps_whitespace       = { "hello world",          "\"hello world\"" },
        leaves_single_word     = { "hello",                 "hello" },
        leaves_double_quoted   = { "\"already quoted\"",    "\"already quoted\"" },
        leaves_single_quoted   = { "'already quoted'",      "'already quoted'" },
        preserves_key_value    = { "key=\"value here\"",    "key=\"value here\"" },
    )]
    fn quote_if_needed_cases(arg: &str, expected: &str) {
        assert_eq!(quote_if_needed(arg), expected);
    }
}
