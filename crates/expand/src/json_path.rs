// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dot-notation + `[index]` JSON-path evaluator over `serde_json::Value`
//! (spec.md §4.2 reference expansion, step 2).

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parses a path like `.database.host` or `.items[0].name` into segments.
/// A leading `.` is optional and ignored.
fn parse_segments(path: &str) -> Vec<Segment> {
    let path = path.strip_prefix('.').unwrap_or(path);
    let mut segments = Vec::new();
    let mut key = String::new();

    let flush_key = |key: &mut String, segments: &mut Vec<Segment>| {
        if !key.is_empty() {
            segments.push(Segment::Key(std::mem::take(key)));
        }
    };

    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => flush_key(&mut key, &mut segments),
            '[' => {
                flush_key(&mut key, &mut segments);
                let mut idx = String::new();
                for d in chars.by_ref() {
                    if d == ']' {
                        break;
                    }
                    idx.push(d);
                }
                if let Ok(i) = idx.parse::<usize>() {
                    segments.push(Segment::Index(i));
                }
            }
            c => key.push(c),
        }
    }
    flush_key(&mut key, &mut segments);
    segments
}

/// Evaluates `path` (dot notation + `[index]`) against `value`. Returns
/// `None` on any missing key/index, matching the "lookup failure leaves
/// token unchanged" rule one layer up.
pub fn eval(value: &Value, path: &str) -> Option<Value> {
    let segments = parse_segments(path);
    let mut current = value;
    for segment in &segments {
        current = match segment {
            Segment::Key(k) => current.get(k)?,
            Segment::Index(i) => current.get(i)?,
        };
    }
    Some(current.clone())
}

/// Default string formatting for a resolved JSON value: `null -> "<nil>"`,
/// scalars render literally, arrays/objects render as compact JSON
/// (spec.md §4.2 reference expansion, step 2).
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => "<nil>".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_nested_dot_path() {
        let v = json!({"database": {"host": "db.example.com"}});
        assert_eq!(eval(&v, ".database.host"), Some(json!("db.example.com")));
    }

    #[test]
    fn evaluates_array_index() {
        let v = json!({"items": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(eval(&v, ".items[1].name"), Some(json!("b")));
    }

    #[test]
    fn missing_path_is_none() {
        let v = json!({"a": 1});
        assert_eq!(eval(&v, ".b"), None);
    }

    #[test]
    fn renders_null_as_nil_literal() {
        assert_eq!(render(&Value::Null), "<nil>");
    }

    #[test]
    fn renders_scalars_literally() {
        assert_eq!(render(&json!("hello")), "hello");
        assert_eq!(render(&json!(42)), "42");
        assert_eq!(render(&json!(true)), "true");
    }

    #[test]
    fn renders_compound_values_as_compact_json() {
        assert_eq!(render(&json!({"a": 1})), "{\"a\":1}");
    }
}
