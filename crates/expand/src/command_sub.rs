// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backtick command substitution (spec.md §4.2a) and shell selection
//! (spec.md §4.2b). Stage 4 of [`crate::eval_string`].

use crate::error::ExpandError;
use crate::options::ExpandOptions;
use std::path::{Path, PathBuf};

/// Shell selection rule (spec.md §4.2b):
/// 1. caller-supplied shell path, if non-empty;
/// 2. else `DAGU_DEFAULT_SHELL`, if non-empty;
/// 3. else `SHELL`, if non-empty;
/// 4. else `sh` on `PATH`, if found;
/// 5. else empty (callers fall back to `sh -c` at spawn time).
pub fn resolve_shell(caller_shell: Option<&str>) -> String {
    if let Some(shell) = caller_shell {
        if !shell.is_empty() {
            return shell.to_string();
        }
    }
    if let Ok(shell) = std::env::var("DAGU_DEFAULT_SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    if which_sh().is_some() {
        return "sh".to_string();
    }
    String::new()
}

fn which_sh() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        let candidate = dir.join("sh");
        candidate.is_file().then_some(candidate)
    })
}

/// Argument form for invoking `command` through `shell`, keyed on the
/// shell's basename, case-insensitively (spec.md §4.2b).
pub fn shell_invocation_args(shell: &str, command: &str) -> Vec<String> {
    let basename = Path::new(shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(shell)
        .to_ascii_lowercase();

    match basename.as_str() {
        "cmd" | "cmd.exe" => vec!["/c".to_string(), command.to_string()],
        "powershell" | "powershell.exe" | "pwsh" | "pwsh.exe" => {
            vec!["-Command".to_string(), command.to_string()]
        }
        _ => vec!["-c".to_string(), command.to_string()],
    }
}

fn run_shell_command(command: &str, opts: &ExpandOptions) -> Result<String, ExpandError> {
    let mut shell = resolve_shell(opts.shell_override());
    if shell.is_empty() {
        shell = "sh".to_string();
    }
    let args = shell_invocation_args(&shell, command);

    let output = std::process::Command::new(&shell)
        .args(&args)
        .output()
        .map_err(|e| ExpandError::CommandSubstitution {
            command: command.to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ExpandError::CommandSubstitution {
            command: command.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Scans `input` for backtick command substitutions and executes each
/// non-empty one, replacing the span with its trimmed stdout (spec.md
/// §4.2a). The specific literal/escape/unterminated rules below are
/// preserved exactly, not "cleaned up", because downstream test suites
/// depend on them:
///
/// - `\` followed by a backtick emits both characters literally and never
///   enters command mode.
/// - A lone backtick toggles command-accumulation mode.
/// - Two consecutive backticks (an empty command) are emitted literally.
/// - An unterminated command (opening backtick, no matching close) is
///   emitted literally — this is not an error.
/// - A non-zero exit from a *terminated*, non-empty command raises
///   [`ExpandError::CommandSubstitution`].
pub fn substitute_commands(input: &str, opts: &ExpandOptions) -> Result<String, ExpandError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1) == Some(&'`') {
            out.push('\\');
            out.push('`');
            i += 2;
            continue;
        }

        if chars[i] == '`' {
            let start = i;
            let mut j = i + 1;
            let mut body = String::new();
            let mut closed = false;

            while j < chars.len() {
                if chars[j] == '\\' && chars.get(j + 1) == Some(&'`') {
                    body.push('\\');
                    body.push('`');
                    j += 2;
                    continue;
                }
                if chars[j] == '`' {
                    closed = true;
                    break;
                }
                body.push(chars[j]);
                j += 1;
            }

            if !closed {
                out.extend(&chars[start..]);
                break;
            }

            if body.is_empty() {
                out.push_str("``");
                i = j + 1;
                continue;
            }

            let stdout = run_shell_command(&body, opts)?;
            out.push_str(stdout.trim_end());
            i = j + 1;
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_arg_form_by_basename() {
        assert_eq!(
            shell_invocation_args("/bin/bash", "echo hi"),
            vec!["-c".to_string(), "echo hi".to_string()]
        );
        assert_eq!(
            shell_invocation_args("cmd.exe", "dir"),
            vec!["/c".to_string(), "dir".to_string()]
        );
        assert_eq!(
            shell_invocation_args("pwsh", "Get-Item ."),
            vec!["-Command".to_string(), "Get-Item .".to_string()]
        );
        assert_eq!(
            shell_invocation_args("C:\\Windows\\PowerShell.exe", "Get-Item ."),
            vec!["-Command".to_string(), "Get-Item .".to_string()]
        );
    }

    #[test]
    fn escaped_backtick_emitted_literally() {
        let opts = ExpandOptions::new();
        assert_eq!(substitute_commands(r"a\`b", &opts).unwrap(), r"a\`b");
    }

    #[test]
    fn empty_backticks_emitted_literally() {
        let opts = ExpandOptions::new();
        assert_eq!(substitute_commands("a``b", &opts).unwrap(), "a``b");
    }

    #[test]
    fn unterminated_backtick_emitted_literally() {
        let opts = ExpandOptions::new();
        assert_eq!(substitute_commands("a `echo hi", &opts).unwrap(), "a `echo hi");
    }

    #[test]
    fn executes_command_and_trims_trailing_whitespace() {
        let opts = ExpandOptions::new();
        let result = substitute_commands("value: `echo hello`", &opts).unwrap();
        assert_eq!(result, "value: hello");
    }

    #[test]
    fn nonzero_exit_raises_command_substitution_error() {
        let opts = ExpandOptions::new();
        let err = substitute_commands("`exit 3`", &opts).unwrap_err();
        assert!(matches!(err, ExpandError::CommandSubstitution { .. }));
    }
}
