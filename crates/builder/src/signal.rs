// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognized platform signal names (spec.md §4.3 item 6, `signalOnStop`).

const KNOWN_SIGNALS: &[&str] = &[
    "SIGHUP", "SIGINT", "SIGQUIT", "SIGILL", "SIGTRAP", "SIGABRT", "SIGBUS", "SIGFPE", "SIGKILL",
    "SIGUSR1", "SIGSEGV", "SIGUSR2", "SIGPIPE", "SIGALRM", "SIGTERM", "SIGCHLD", "SIGCONT",
    "SIGSTOP", "SIGTSTP", "SIGTTIN", "SIGTTOU", "SIGURG", "SIGXCPU", "SIGXFSZ", "SIGVTALRM",
    "SIGPROF", "SIGWINCH", "SIGIO", "SIGSYS",
];

pub fn is_known_signal(name: &str) -> bool {
    KNOWN_SIGNALS.contains(&name.to_ascii_uppercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_common_signals() {
        assert!(is_known_signal("SIGTERM"));
        assert!(is_known_signal("sigterm"));
        assert!(is_known_signal("SIGKILL"));
    }

    #[test]
    fn rejects_unknown_signal() {
        assert!(!is_known_signal("SIGBOGUS"));
    }
}
