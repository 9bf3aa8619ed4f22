//! Text, DOT, and JSON export for a [`DependencyGraph`] (§4.6).
//!
//! Grounded on the teacher's `graph/export.rs`, which renders the same
//! graph as an indented tree, a Graphviz `digraph`, and nested JSON. The
//! teacher's additional Mermaid export is dropped: nothing in this
//! system's query surface calls for it.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde_json::json;

use super::types::{DependencyGraph, NodeKey};

fn label(key: &NodeKey) -> String {
    format!("{}@{}", key.0, key.1)
}

/// A rooted, indented tree starting from the modules `module` directly
/// depends on. A subtree already printed earlier in the traversal is
/// abbreviated with a trailing `(*)` instead of being expanded again,
/// which also keeps cyclic graphs from printing forever.
#[must_use]
pub fn to_text(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    let mut seen: HashSet<NodeKey> = HashSet::new();

    let mut roots: Vec<&NodeKey> = graph.root_keys().iter().collect();
    roots.sort();

    for key in roots {
        write_text_node(graph, key, 0, &mut seen, &mut out);
    }
    out
}

fn write_text_node(graph: &DependencyGraph, key: &NodeKey, depth: usize, seen: &mut HashSet<NodeKey>, out: &mut String) {
    let indent = "  ".repeat(depth);
    let already_expanded = seen.contains(key);
    if already_expanded {
        let _ = writeln!(out, "{indent}{} (*)", label(key));
        return;
    }
    seen.insert(key.clone());
    let _ = writeln!(out, "{indent}{}", label(key));

    let Some(node) = graph.get_by_key(&key.0, &key.1) else { return };
    let mut child_keys: Vec<NodeKey> = node
        .module
        .dependencies
        .iter()
        .filter_map(|dep| graph.get_by_name(&dep.name).map(|n| n.key.clone()))
        .collect();
    child_keys.sort();
    for child in &child_keys {
        write_text_node(graph, child, depth + 1, seen, out);
    }
}

/// A Graphviz `digraph` with one node per `name@version` and one edge per
/// dependency relationship.
#[must_use]
pub fn to_dot(graph: &DependencyGraph) -> String {
    let mut out = String::from("digraph modules {\n");
    for node in graph.inner().node_weights() {
        let _ = writeln!(out, "  \"{}\";", label(&node.key));
    }
    for edge in graph.inner().edge_indices() {
        let Some((from, to)) = graph.inner().edge_endpoints(edge) else { continue };
        let from_key = &graph.inner()[from].key;
        let to_key = &graph.inner()[to].key;
        let _ = writeln!(out, "  \"{}\" -> \"{}\";", label(from_key), label(to_key));
    }
    out.push_str("}\n");
    out
}

/// Nested JSON, one tree per direct dependency of the root, matching the
/// shape of Bazel's `mod graph --output=json`: each node carries `key`,
/// `name`, `version`, `dependencies`, `indirectDependencies`, and
/// `unexpanded`. A node already expanded earlier in the traversal is
/// marked `unexpanded: true` with an empty `dependencies` array rather
/// than being walked again.
///
/// `indirectDependencies` is always empty: this engine does not track a
/// direct/indirect split at the per-edge level the way Bazel's own
/// resolver does, only the root-level `required_by` set already present
/// on each resolved module.
#[must_use]
pub fn to_json(graph: &DependencyGraph) -> serde_json::Value {
    let mut seen: HashSet<NodeKey> = HashSet::new();
    let mut roots: Vec<&NodeKey> = graph.root_keys().iter().collect();
    roots.sort();

    let trees: Vec<serde_json::Value> = roots.into_iter().map(|key| json_node(graph, key, &mut seen)).collect();
    json!(trees)
}

fn json_node(graph: &DependencyGraph, key: &NodeKey, seen: &mut HashSet<NodeKey>) -> serde_json::Value {
    let already_expanded = !seen.insert(key.clone());
    if already_expanded {
        return json!({
            "key": label(key),
            "name": key.0,
            "version": key.1,
            "dependencies": [],
            "indirectDependencies": [],
            "unexpanded": true,
        });
    }

    let mut child_keys: Vec<NodeKey> = graph
        .get_by_key(&key.0, &key.1)
        .map(|node| {
            node.module
                .dependencies
                .iter()
                .filter_map(|dep| graph.get_by_name(&dep.name).map(|n| n.key.clone()))
                .collect()
        })
        .unwrap_or_default();
    child_keys.sort();

    let dependencies: Vec<serde_json::Value> = child_keys.iter().map(|child| json_node(graph, child, seen)).collect();

    json!({
        "key": label(key),
        "name": key.0,
        "version": key.1,
        "dependencies": dependencies,
        "indirectDependencies": [],
        "unexpanded": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dependency, ResolutionList, ResolvedModule};
    use crate::version::Version;

    fn module(name: &str, version: &str, deps: &[&str], required_by: &[&str]) -> ResolvedModule {
        ResolvedModule {
            name: name.to_string(),
            version: Version::parse(version).unwrap(),
            registry_url: "https://example.test".to_string(),
            dev_dependency: false,
            required_by: required_by.iter().map(|s| s.to_string()).collect(),
            depth: 0,
            dependencies: deps
                .iter()
                .map(|d| Dependency {
                    name: d.to_string(),
                    version: Version::parse("1.0.0").unwrap(),
                    repo_name: None,
                    dev_dependency: false,
                    max_compat_level: None,
                })
                .collect(),
            yanked: false,
            yank_reason: None,
            deprecated: false,
            deprecation_reason: None,
            bazel_compatibility: Vec::new(),
            is_bazel_incompatible: false,
            incompatibility_reason: None,
        }
    }

    fn diamond() -> ResolutionList {
        ResolutionList {
            modules: vec![
                module("left", "1.0.0", &["bottom"], &["<root>"]),
                module("right", "1.0.0", &["bottom"], &["<root>"]),
                module("bottom", "2.0.0", &[], &["left", "right"]),
            ],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn text_export_abbreviates_repeated_subtree() {
        let graph = DependencyGraph::build(&diamond());
        let text = to_text(&graph);
        assert!(text.contains("bottom@2.0.0"));
        assert!(text.contains("(*)"));
    }

    #[test]
    fn dot_export_contains_all_edges() {
        let graph = DependencyGraph::build(&diamond());
        let dot = to_dot(&graph);
        assert!(dot.contains("\"left@1.0.0\" -> \"bottom@2.0.0\";"));
        assert!(dot.contains("\"right@1.0.0\" -> \"bottom@2.0.0\";"));
    }

    #[test]
    fn json_export_marks_second_occurrence_unexpanded() {
        let graph = DependencyGraph::build(&diamond());
        let value = to_json(&graph);
        let trees = value.as_array().unwrap();
        assert_eq!(trees.len(), 2);
        let unexpanded_count = trees
            .iter()
            .filter(|t| t["dependencies"][0]["unexpanded"] == json!(true))
            .count();
        assert_eq!(unexpanded_count, 1);
    }
}
