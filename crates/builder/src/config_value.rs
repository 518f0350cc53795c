// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ConfigValue` — the tagged-sum re-architecture of the reflection-driven
//! "heterogeneous decoded tree" from the source (spec.md §9): a YAML
//! document decoded by an external layer and handed to the builder as
//! this type, rather than via `any`-typed reflection.

use std::fmt;

/// A node in the decoded configuration tree. Order is preserved for maps
/// (needed for the DAG's own ordered-env invariant) by storing entries as
/// a `Vec` of pairs rather than a `HashMap`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Scalar(String),
    Seq(Vec<ConfigValue>),
    Map(Vec<(String, ConfigValue)>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::Scalar(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::Scalar(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(String, ConfigValue)]> {
        match self {
            ConfigValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_map()?.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Renders any scalar-ish leaf as a string. Used for fields that may
    /// legitimately arrive typed as a YAML string, int, or bool.
    pub fn render_scalar(&self) -> Option<String> {
        match self {
            ConfigValue::Null => None,
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Scalar(s) => Some(s.clone()),
            ConfigValue::Seq(_) | ConfigValue::Map(_) => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render_scalar() {
            Some(s) => write!(f, "{s}"),
            None => write!(f, "{self:?}"),
        }
    }
}

impl From<serde_yaml::Value> for ConfigValue {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Int(i),
                None => ConfigValue::Scalar(n.to_string()),
            },
            serde_yaml::Value::String(s) => ConfigValue::Scalar(s),
            serde_yaml::Value::Sequence(items) => {
                ConfigValue::Seq(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_yaml::Value::Mapping(map) => ConfigValue::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key_to_string(k), ConfigValue::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => ConfigValue::from(tagged.value),
        }
    }
}

fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => ConfigValue::from(other).to_string(),
    }
}
