//! The post-selection dependency graph (§4.6).
//!
//! Grounded directly on the teacher's `graph/types.rs`: a `petgraph`
//! `DiGraph` plus a side index from a stable key to `NodeIndex`, re-keyed
//! here from `(module, provider)` pairs to `(name, version)` pairs.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{ResolutionList, ResolvedModule};

/// `(name, version)`, the stable identity of a resolved module.
pub type NodeKey = (String, String);

/// A single node: the resolved module data plus its key.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub key: NodeKey,
    pub module: ResolvedModule,
}

/// Aggregate counts returned by [`DependencyGraph::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStats {
    pub total: usize,
    pub direct: usize,
    pub transitive: usize,
    pub max_depth: u32,
    pub has_cycles: bool,
}

/// The resolved dependency graph: nodes keyed by `(name, version)`,
/// directed edges from dependent to dependency, built post-selection so
/// only edges whose endpoints survived selection appear.
pub struct DependencyGraph {
    inner: DiGraph<GraphNode, ()>,
    index: HashMap<NodeKey, NodeIndex>,
    by_name: HashMap<String, NodeKey>,
    root_keys: Vec<NodeKey>,
}

impl DependencyGraph {
    /// Build the graph from a finished `ResolutionList`.
    #[must_use]
    pub fn build(list: &ResolutionList) -> Self {
        let mut inner = DiGraph::new();
        let mut index = HashMap::new();
        let mut by_name = HashMap::new();

        for module in &list.modules {
            let key: NodeKey = (module.name.clone(), module.version.as_str().to_string());
            let idx = inner.add_node(GraphNode {
                key: key.clone(),
                module: module.clone(),
            });
            index.insert(key.clone(), idx);
            by_name.insert(module.name.clone(), key);
        }

        for module in &list.modules {
            let from_key: NodeKey = (module.name.clone(), module.version.as_str().to_string());
            let Some(&from_idx) = index.get(&from_key) else { continue };
            for dep in &module.dependencies {
                let Some(to_key) = by_name.get(&dep.name) else { continue };
                let Some(&to_idx) = index.get(to_key) else { continue };
                inner.add_edge(from_idx, to_idx, ());
            }
        }

        let root_keys = list
            .modules
            .iter()
            .filter(|m| m.required_by.iter().any(|r| r == "<root>"))
            .map(|m| (m.name.clone(), m.version.as_str().to_string()))
            .collect();

        Self {
            inner,
            index,
            by_name,
            root_keys,
        }
    }

    #[must_use]
    pub fn root_keys(&self) -> &[NodeKey] {
        &self.root_keys
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&GraphNode> {
        let key = self.by_name.get(name)?;
        self.get_by_key(&key.0, &key.1)
    }

    #[must_use]
    pub fn get_by_key(&self, name: &str, version: &str) -> Option<&GraphNode> {
        let idx = self.index.get(&(name.to_string(), version.to_string()))?;
        self.inner.node_weight(*idx)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total/direct/transitive counts, max depth, and cycle presence.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let total = self.inner.node_count();
        let direct = self.root_keys.len();
        let transitive = total.saturating_sub(direct);
        let max_depth = self
            .inner
            .node_weights()
            .map(|n| n.module.depth)
            .max()
            .unwrap_or(0);
        GraphStats {
            total,
            direct,
            transitive,
            max_depth,
            has_cycles: self.has_cycles(),
        }
    }

    /// BFS shortest path from `from` to `to`, breaking cycles by tracking
    /// visited keys. `None` if unreachable.
    #[must_use]
    pub fn path(&self, from: (&str, &str), to: (&str, &str)) -> Option<Vec<NodeKey>> {
        let from_key = (from.0.to_string(), from.1.to_string());
        let to_key = (to.0.to_string(), to.1.to_string());
        let start = *self.index.get(&from_key)?;
        let target = *self.index.get(&to_key)?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut predecessor: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if current == target {
                return Some(self.reconstruct_path(start, target, &predecessor));
            }
            for next in self.inner.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(next) {
                    predecessor.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    fn reconstruct_path(&self, start: NodeIndex, target: NodeIndex, predecessor: &HashMap<NodeIndex, NodeIndex>) -> Vec<NodeKey> {
        let mut path = vec![target];
        let mut current = target;
        while current != start {
            let prev = predecessor[&current];
            path.push(prev);
            current = prev;
        }
        path.reverse();
        path.into_iter().map(|idx| self.inner[idx].key.clone()).collect()
    }

    /// All simple paths from any root dependency to any node named `name`.
    #[must_use]
    pub fn why_included(&self, name: &str) -> Vec<Vec<NodeKey>> {
        let targets: HashSet<NodeIndex> = self
            .index
            .iter()
            .filter(|(k, _)| k.0 == name)
            .map(|(_, &idx)| idx)
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }

        let mut paths = Vec::new();
        for &root_key in &self.root_keys {
            let Some(&start) = self.index.get(root_key) else { continue };
            let mut visiting = HashSet::new();
            let mut stack = vec![self.inner[start].key.clone()];
            visiting.insert(start);
            self.collect_simple_paths(start, &targets, &mut visiting, &mut stack, &mut paths);
        }
        paths
    }

    #[allow(clippy::only_used_in_recursion)]
    fn collect_simple_paths(
        &self,
        current: NodeIndex,
        targets: &HashSet<NodeIndex>,
        visiting: &mut HashSet<NodeIndex>,
        stack: &mut Vec<NodeKey>,
        out: &mut Vec<Vec<NodeKey>>,
    ) {
        if targets.contains(&current) {
            out.push(stack.clone());
        }
        for next in self.inner.neighbors_directed(current, Direction::Outgoing) {
            if visiting.insert(next) {
                stack.push(self.inner[next].key.clone());
                self.collect_simple_paths(next, targets, visiting, stack, out);
                stack.pop();
                visiting.remove(&next);
            }
        }
    }

    /// The node plus an aggregated summary of who requires it.
    #[must_use]
    pub fn explain(&self, name: &str) -> Option<ExplainResult> {
        let node = self.get_by_name(name)?.clone();
        let requested_by = node.module.required_by.clone();
        Some(ExplainResult {
            node,
            requestor_count: requested_by.len(),
            requested_by,
        })
    }

    #[must_use]
    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.inner)
    }

    /// Every strongly connected component with more than one node (a
    /// self-loop counts as a one-node cycle), each rendered as a key list.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<NodeKey>> {
        petgraph::algo::kosaraju_scc(&self.inner)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.inner.contains_edge(scc[0], scc[0]))
            .map(|scc| scc.into_iter().map(|idx| self.inner[idx].key.clone()).collect())
            .collect()
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, ()> {
        &self.inner
    }
}

/// Result of [`DependencyGraph::explain`].
#[derive(Debug, Clone)]
pub struct ExplainResult {
    pub node: GraphNode,
    pub requested_by: Vec<String>,
    pub requestor_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResolutionList, ResolvedModule};
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
                .map(|d| crate::types::Dependency {
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
    fn stats_reflect_diamond_shape() {
        let graph = DependencyGraph::build(&diamond());
        let stats = graph.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.direct, 2);
        assert_eq!(stats.transitive, 1);
        assert!(!stats.has_cycles);
    }

    #[test]
    fn path_from_left_to_bottom() {
        let graph = DependencyGraph::build(&diamond());
        let path = graph.path(("left", "1.0.0"), ("bottom", "2.0.0")).unwrap();
        assert_eq!(path, vec![("left".to_string(), "1.0.0".to_string()), ("bottom".to_string(), "2.0.0".to_string())]);
    }

    #[test]
    fn why_included_covers_both_parents() {
        let graph = DependencyGraph::build(&diamond());
        let paths = graph.why_included("bottom");
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn mutual_cycle_detected() {
        let list = ResolutionList {
            modules: vec![
                module("cycle_a", "1.0.0", &["cycle_b"], &["<root>"]),
                module("cycle_b", "1.0.0", &["cycle_a"], &["cycle_a"]),
            ],
            warnings: Vec::new(),
        };
        let graph = DependencyGraph::build(&list);
        assert!(graph.has_cycles());
        assert_eq!(graph.find_cycles().len(), 1);
    }
}
