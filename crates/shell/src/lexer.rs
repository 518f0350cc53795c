// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::ShellError;
use crate::escape::{double_control_escapes, quote_if_needed};

/// Field-delimiter used by [`join_command_args`]/[`split_command_args`] for
/// internal message channels. Chosen as a non-printable byte that will
/// never occur in ordinary command text (spec.md §6.1).
const ARG_DELIMITER: char = '\u{1f}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteMode {
    None,
    Double,
    Single,
    Backtick,
}

/// Splits `input` into pipeline segments on unquoted, unescaped `|`
/// (spec.md §4.1). Inside double quotes, single quotes, or backticks, `|`
/// is literal. A backslash quotes the next character (it is never
/// interpreted as a boundary) and is preserved verbatim in the output — no
/// unescaping happens at this layer. Whitespace separates tokens only
/// outside quotes/backticks.
///
/// Double and single quotes are structural: they group a token and are not
/// included in its text. Backticks are content: they are always preserved
/// verbatim, because a later stage (command substitution, spec.md §4.2a)
/// scans the reconstructed string for them.
///
/// A run of two or more consecutive, unescaped, unquoted `|` characters is
/// not a pipeline boundary — `||` (and by extension longer runs) is an
/// ordinary token, matching `&&`, `;`, and `&` (spec.md §4.1, §9).
///
/// An unterminated quote or backtick is tolerated: the remainder of the
/// input becomes a single token. For quotes, the opening quote character is
/// retained in that token (this is the one place a quote is not stripped);
/// backticks are always retained anyway.
pub fn parse_pipeline(input: &str) -> Vec<Vec<String>> {
    if input.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut has_token = false;
    let mut mode = QuoteMode::None;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            token.push(c);
            has_token = true;
            if let Some(escaped) = chars.next() {
                token.push(escaped);
            }
            continue;
        }

        match mode {
            QuoteMode::Double => {
                if c == '"' {
                    mode = QuoteMode::None;
                } else {
                    token.push(c);
                }
                has_token = true;
                continue;
            }
            QuoteMode::Single => {
                if c == '\'' {
                    mode = QuoteMode::None;
                } else {
                    token.push(c);
                }
                has_token = true;
                continue;
            }
            QuoteMode::Backtick => {
                token.push(c);
                has_token = true;
                if c == '`' {
                    mode = QuoteMode::None;
                }
                continue;
            }
            QuoteMode::None => {}
        }

        match c {
            '"' => {
                mode = QuoteMode::Double;
                has_token = true;
            }
            '\'' => {
                mode = QuoteMode::Single;
                has_token = true;
            }
            '`' => {
                mode = QuoteMode::Backtick;
                token.push(c);
                has_token = true;
            }
            '|' => {
                if chars.peek() == Some(&'|') {
                    chars.next();
                    token.push('|');
                    token.push('|');
                    has_token = true;
                } else {
                    if has_token {
                        tokens.push(std::mem::take(&mut token));
                        has_token = false;
                    }
                    segments.push(std::mem::take(&mut tokens));
                }
            }
            c if c.is_whitespace() => {
                if has_token {
                    tokens.push(std::mem::take(&mut token));
                    has_token = false;
                }
            }
            c => {
                token.push(c);
                has_token = true;
            }
        }
    }

    // Unterminated quote: remainder becomes one token, opening quote retained.
    // (Unterminated backtick needs no special handling — the opening
    // backtick was already pushed when the mode was entered.)
    if mode == QuoteMode::Double {
        token.insert(0, '"');
    } else if mode == QuoteMode::Single {
        token.insert(0, '\'');
    }

    if has_token {
        tokens.push(token);
    }
    segments.push(tokens);
    segments
}

/// Splits `input` into a command and its arguments (spec.md §4.1
/// `splitCommand`). The first pipeline segment's head is the command; its
/// tail, followed by any later segments (each preceded by a literal `"|"`
/// token), forms the argument list.
///
/// When `substitute` is true, every argument is run through
/// [`double_control_escapes`]. Full backtick command substitution
/// (spec.md §4.2a) is layered on top by `dagflow-expand`, which owns shell
/// invocation (spec.md §4.2b) — this crate only tokenizes.
pub fn split_command(input: &str, substitute: bool) -> Result<(String, Vec<String>), ShellError> {
    let mut segments = parse_pipeline(input).into_iter();
    let first = segments.next().unwrap_or_default();
    let mut iter = first.into_iter();
    let cmd = iter.next().ok_or(ShellError::EmptyCommand)?;
    let mut args: Vec<String> = iter.collect();

    for segment in segments {
        args.push("|".to_string());
        args.extend(segment);
    }

    if substitute {
        for arg in &mut args {
            *arg = double_control_escapes(arg);
        }
    }

    Ok((cmd, args))
}

/// Rebuilds a shell-ready command line from a command and its arguments
/// (spec.md §4.1 `buildEscaped`). Arguments already wrapped in matching
/// quotes, or in the special `key="value"` form, pass through verbatim;
/// arguments containing whitespace are wrapped in double quotes with
/// embedded `"` escaped.
pub fn build_escaped(cmd: &str, args: &[String]) -> String {
    let mut parts = vec![cmd.to_string()];
    parts.extend(args.iter().map(|a| quote_if_needed(a)));
    parts.join(" ")
}

/// Joins `cmd` and `args` with [`ARG_DELIMITER`] for an internal message
/// channel (spec.md §6.1). Inverse of [`split_command_args`].
pub fn join_command_args(cmd: &str, args: &[String]) -> String {
    let mut parts = vec![cmd.to_string()];
    parts.extend(args.iter().cloned());
    parts.join(&ARG_DELIMITER.to_string())
}

/// Inverse of [`join_command_args`].
pub fn split_command_args(joined: &str) -> (String, Vec<String>) {
    let mut parts = joined.split(ARG_DELIMITER);
    let cmd = parts.next().unwrap_or_default().to_string();
    let args = parts.map(str::to_string).collect();
    (cmd, args)
}
