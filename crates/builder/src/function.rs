// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reusable command templates with positional parameter names
//! (spec.md §4.3 item 5).

use crate::error::BuildError;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub template: String,
}

/// Extracts `$NAME` tokens from `template`, in first-occurrence order,
/// deduplicated.
fn extract_template_params(template: &str) -> Vec<String> {
    let chars: Vec<char> = template.chars().collect();
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '$' {
            let start = i + 1;
            if chars.get(start).is_some_and(|c| c.is_alphabetic() || *c == '_') {
                let mut end = start + 1;
                while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                if seen.insert(name.clone()) {
                    names.push(name);
                }
                i = end;
                continue;
            }
        }
        i += 1;
    }
    names
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        params: Vec<String>,
        template: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        let template = template.into();
        let extracted = extract_template_params(&template);
        if extracted != params {
            return Err(BuildError::FuncParamsMismatch(name));
        }
        Ok(Self {
            name,
            params,
            template,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_params() {
        let f = Function::new(
            "greet",
            vec!["name".to_string(), "greeting".to_string()],
            "echo $greeting, $name!",
        );
        assert!(f.is_ok());
    }

    #[test]
    fn rejects_mismatched_params() {
        let f = Function::new("greet", vec!["other".to_string()], "echo $name");
        assert_eq!(f.unwrap_err(), BuildError::FuncParamsMismatch("greet".to_string()));
    }

    #[test]
    fn rejects_wrong_order() {
        let f = Function::new(
            "greet",
            vec!["b".to_string(), "a".to_string()],
            "echo $a $b",
        );
        assert!(f.is_err());
    }
}
