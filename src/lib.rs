//! # bzlresolve
//!
//! Resolves the transitive dependency set of a Bazel module: parses a
//! `MODULE.bazel` file, walks its `bazel_dep` graph against one or more
//! Bazel Central Registry-shaped sources, and selects a final version per
//! module name with Minimal Version Selection (MVS).
//!
//! ## Example
//!
//! ```rust,no_run
//! use bzlresolve::{Engine, ResolutionOptions};
//!
//! #[tokio::main]
//! async fn main() -> bzlresolve::Result<()> {
//!     let module_bazel = r#"
//!         module(name = "my_project", version = "1.0.0")
//!         bazel_dep(name = "rules_go", version = "0.41.0")
//!     "#;
//!
//!     let engine = Engine::new(ResolutionOptions::default());
//!     let (list, graph) = engine.resolve_str(module_bazel, Default::default()).await?;
//!
//!     println!("{} modules selected", list.modules.len());
//!     println!("{}", bzlresolve::graph::to_text(&graph));
//!     Ok(())
//! }
//! ```
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod fileurl;
pub mod graph;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod version;

pub use config::ResolutionOptions;
pub use error::{ResolveError, Result};
pub use graph::DependencyGraph;
pub use resolver::Resolver;
pub use types::{ModuleInfo, ResolutionList};

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use config::NetworkPolicy;

/// Top-level orchestrator: parses a `MODULE.bazel`, assembles the
/// registry chain from `options`, runs the resolver, and builds the
/// resulting dependency graph.
pub struct Engine {
    options: ResolutionOptions,
}

impl Engine {
    #[must_use]
    pub fn new(options: ResolutionOptions) -> Self {
        Self { options }
    }

    /// Parse `module_bazel` and resolve its transitive dependency set.
    ///
    /// `override_snapshots` supplies pre-parsed `ModuleInfo` for any
    /// module under a `git_override`/`local_path_override`/
    /// `archive_override`, keyed by module name, so discovery can walk
    /// their dependencies without a registry fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails, a registry URL is malformed, or
    /// resolution itself fails (module not found, yanked-version policy
    /// violation, direct-dependency mismatch, or cancellation).
    pub async fn resolve_str(
        &self,
        module_bazel: &str,
        override_snapshots: HashMap<String, ModuleInfo>,
    ) -> Result<(ResolutionList, DependencyGraph)> {
        let root = parser::parse(module_bazel)?;
        self.resolve(&root, override_snapshots).await
    }

    /// Resolve an already-parsed root module's transitive dependency set.
    ///
    /// # Errors
    ///
    /// See [`Engine::resolve_str`].
    pub async fn resolve(
        &self,
        root: &ModuleInfo,
        override_snapshots: HashMap<String, ModuleInfo>,
    ) -> Result<(ResolutionList, DependencyGraph)> {
        let chain = Arc::new(self.build_chain()?);
        let resolver = Resolver::new(chain, self.options.clone());
        let list = resolver.resolve(root, override_snapshots, CancellationToken::new()).await?;
        let graph = DependencyGraph::build(&list);
        Ok((list, graph))
    }

    fn build_chain(&self) -> Result<registry::RegistryChain> {
        let mut sources: Vec<Arc<dyn registry::RegistrySource>> = Vec::new();

        if let Some(vendor) = &self.options.vendor_dir {
            sources.push(Arc::new(registry::VendorSource::new(vendor.clone(), self.options.cache.clone())));
        }

        for url in self.options.effective_registries() {
            if !self.network_allows(&url) {
                warn!(registry = %url, policy = ?self.options.network, "skipping registry disallowed by network policy");
                continue;
            }
            sources.push(registry::build_source(&url, self.options.timeout, self.options.cache.clone())?);
        }

        Ok(registry::RegistryChain::new(sources))
    }

    /// Whether `url` may be consulted under `options.network` (§6
    /// "network"/"allowed_domains"). `file://` sources are always local
    /// and never subject to network policy.
    fn network_allows(&self, url: &str) -> bool {
        if url.starts_with("file://") {
            return true;
        }
        match self.options.network {
            NetworkPolicy::Online => true,
            NetworkPolicy::Offline => false,
            NetworkPolicy::Allowlist => url::Url::parse(url)
                .ok()
                .and_then(|parsed| parsed.host_str().map(str::to_string))
                .is_some_and(|host| self.options.allowed_domains.iter().any(|d| *d == host)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_construction() {
        let _engine = Engine::new(ResolutionOptions::default());
    }

    #[test]
    fn offline_policy_rejects_remote_but_not_file_sources() {
        let mut options = ResolutionOptions::default();
        options.network = NetworkPolicy::Offline;
        let engine = Engine::new(options);

        assert!(!engine.network_allows("https://bcr.bazel.build"));
        assert!(engine.network_allows("file:///vendor/registry"));
    }

    #[test]
    fn allowlist_policy_only_permits_listed_hosts() {
        let mut options = ResolutionOptions::default();
        options.network = NetworkPolicy::Allowlist;
        options.allowed_domains = vec!["bcr.bazel.build".to_string()];
        let engine = Engine::new(options);

        assert!(engine.network_allows("https://bcr.bazel.build/modules"));
        assert!(!engine.network_allows("https://evil.example.com/modules"));
    }

    #[test]
    fn online_policy_permits_any_remote_host() {
        let engine = Engine::new(ResolutionOptions::default());
        assert!(engine.network_allows("https://anything.example.com"));
    }
}
