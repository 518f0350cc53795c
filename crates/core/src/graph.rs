// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency graph helpers shared by the builder (cycle/reference
//! validation at load time) and the scheduler (indegree bookkeeping at
//! run time).

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while validating a dependency graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

/// Adjacency information derived from each step's `depends` list: the
/// forward edges (`children`: who depends on me) used by the scheduler to
/// decrement indegree on completion, and indegree counts used to seed the
/// initial ready set.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    children: HashMap<String, Vec<String>>,
    indegree: HashMap<String, usize>,
}

impl Adjacency {
    pub fn children(&self, name: &str) -> &[String] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn indegree(&self, name: &str) -> usize {
        self.indegree.get(name).copied().unwrap_or(0)
    }

    /// Step names with indegree zero, in the order they were supplied.
    pub fn initial_ready(&self, order: &[String]) -> Vec<String> {
        order
            .iter()
            .filter(|name| self.indegree(name) == 0)
            .cloned()
            .collect()
    }
}

/// Build the adjacency map from a name -> depends-on-names table. Does not
/// validate that dependencies exist; call [`validate_acyclic`] first.
pub fn adjacency_of(steps: &[(String, Vec<String>)]) -> Adjacency {
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    let mut indegree: HashMap<String, usize> = HashMap::new();

    for (name, _) in steps {
        children.entry(name.clone()).or_default();
        indegree.entry(name.clone()).or_insert(0);
    }
    for (name, depends) in steps {
        for dep in depends {
            children.entry(dep.clone()).or_default().push(name.clone());
            *indegree.entry(name.clone()).or_insert(0) += 1;
        }
    }

    Adjacency { children, indegree }
}

/// Validate that every dependency resolves to a known step name and that
/// the induced graph is acyclic, using depth-first traversal with a
/// visiting set (spec.md §4.3 item 9 / §9).
pub fn validate_acyclic(steps: &[(String, Vec<String>)]) -> Result<(), GraphError> {
    let names: HashSet<&str> = steps.iter().map(|(n, _)| n.as_str()).collect();
    let depends_of: HashMap<&str, &[String]> = steps
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();

    for (name, depends) in steps {
        for dep in depends {
            if !names.contains(dep.as_str()) {
                return Err(GraphError::UnknownDependency {
                    step: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    #[derive(PartialEq, Eq, Clone, Copy)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        name: &'a str,
        depends_of: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), GraphError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(name.to_string());
                return Err(GraphError::DependencyCycle(cycle));
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        stack.push(name);
        if let Some(depends) = depends_of.get(name) {
            for dep in depends.iter() {
                visit(dep.as_str(), depends_of, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for (name, _) in steps {
        visit(name.as_str(), &depends_of, &mut marks, &mut stack)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(pairs: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        pairs
            .iter()
            .map(|(n, d)| (n.to_string(), d.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn detects_unknown_dependency() {
        let s = steps(&[("a", &["missing"])]);
        assert_eq!(
            validate_acyclic(&s),
            Err(GraphError::UnknownDependency {
                step: "a".into(),
                dependency: "missing".into(),
            })
        );
    }

    #[test]
    fn detects_cycle() {
        let s = steps(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        assert!(matches!(validate_acyclic(&s), Err(GraphError::DependencyCycle(_))));
    }

    #[test]
    fn accepts_dag() {
        let s = steps(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"])]);
        assert!(validate_acyclic(&s).is_ok());
    }

    #[test]
    fn adjacency_tracks_children_and_indegree() {
        let s = steps(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
        let adj = adjacency_of(&s);
        assert_eq!(adj.indegree("a"), 0);
        assert_eq!(adj.indegree("d"), 2);
        let mut children = adj.children("a").to_vec();
        children.sort();
        assert_eq!(children, vec!["b".to_string(), "c".to_string()]);

        let order: Vec<String> = s.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(adj.initial_ready(&order), vec!["a".to_string()]);
    }
}
