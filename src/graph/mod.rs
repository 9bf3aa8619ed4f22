//! The post-selection dependency graph and its export formats (§4.6).

mod export;
mod types;

pub use export::{to_dot, to_json, to_text};
pub use types::{DependencyGraph, ExplainResult, GraphNode, GraphStats, NodeKey};
