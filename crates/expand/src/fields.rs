// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic field expansion — the Rust re-architecture of the source's
//! reflection-driven `evalStructFields` walk (spec.md §9): records apply
//! expansion to every string field; mappings recreate with expanded
//! string values; non-string leaves pass through unchanged.

use crate::error::ExpandError;
use crate::eval::eval_string;
use crate::options::ExpandOptions;
use serde_json::Value;
use std::collections::HashMap;

/// Implemented per-type, rather than via runtime reflection: every string
/// leaf is expanded, every container recurses.
pub trait ExpandFields {
    fn expand_fields(&mut self, opts: &ExpandOptions) -> Result<(), ExpandError>;
}

impl ExpandFields for String {
    fn expand_fields(&mut self, opts: &ExpandOptions) -> Result<(), ExpandError> {
        *self = eval_string(self, opts)?;
        Ok(())
    }
}

impl ExpandFields for Option<String> {
    fn expand_fields(&mut self, opts: &ExpandOptions) -> Result<(), ExpandError> {
        if let Some(s) = self {
            *s = eval_string(s, opts)?;
        }
        Ok(())
    }
}

impl<T: ExpandFields> ExpandFields for Vec<T> {
    fn expand_fields(&mut self, opts: &ExpandOptions) -> Result<(), ExpandError> {
        for item in self.iter_mut() {
            item.expand_fields(opts)?;
        }
        Ok(())
    }
}

impl<T: ExpandFields> ExpandFields for HashMap<String, T> {
    fn expand_fields(&mut self, opts: &ExpandOptions) -> Result<(), ExpandError> {
        for value in self.values_mut() {
            value.expand_fields(opts)?;
        }
        Ok(())
    }
}

impl ExpandFields for Value {
    fn expand_fields(&mut self, opts: &ExpandOptions) -> Result<(), ExpandError> {
        match self {
            Value::String(s) => *s = eval_string(s, opts)?,
            Value::Array(items) => {
                for item in items.iter_mut() {
                    item.expand_fields(opts)?;
                }
            }
            Value::Object(map) => {
                for value in map.values_mut() {
                    value.expand_fields(opts)?;
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
        Ok(())
    }
}

/// Entry point matching the source's `evalStructFields(value, opts)`
/// contract: the root must be a record or mapping shape (a JSON object or
/// array of objects); a bare scalar root is rejected.
pub fn expand_struct_fields(value: &mut Value, opts: &ExpandOptions) -> Result<(), ExpandError> {
    match value {
        Value::Object(_) | Value::Array(_) => value.expand_fields(opts),
        _ => Err(ExpandError::UnsupportedRoot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_string_leaves_recursively() {
        let opts = ExpandOptions::new().with_variable("NAME", "world");
        let mut value = json!({
            "greeting": "hello $NAME",
            "nested": {"again": "hi $NAME"},
            "list": ["$NAME", 42, null],
        });
        expand_struct_fields(&mut value, &opts).unwrap();
        assert_eq!(value["greeting"], json!("hello world"));
        assert_eq!(value["nested"]["again"], json!("hi world"));
        assert_eq!(value["list"][0], json!("world"));
        assert_eq!(value["list"][1], json!(42));
        assert_eq!(value["list"][2], Value::Null);
    }

    #[test]
    fn rejects_scalar_root() {
        let opts = ExpandOptions::new();
        let mut value = json!("just a string");
        let err = expand_struct_fields(&mut value, &opts).unwrap_err();
        assert_eq!(err, ExpandError::UnsupportedRoot);
    }
}
