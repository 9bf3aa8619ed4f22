//! The resolver (§4.5): discovery followed by selection, wired together
//! behind a small `Resolver` façade.

mod compat;
mod discovery;
mod selection;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ResolutionOptions;
use crate::error::Result;
use crate::registry::RegistryChain;
use crate::types::{ModuleInfo, ResolutionList};
use crate::version::Version;

/// `(name, version)` implicit dependencies injected for a given Bazel
/// version when `options.bazel_version` is set (§4.5 "Implicit
/// dependencies"). Keyed by the exact version string a caller passes.
const IMPLICIT_DEPS_TABLE: &[(&str, &[(&str, &str)])] = &[
    (
        "7.0.0",
        &[
            ("bazel_features", "1.1.1"),
            ("platforms", "0.0.8"),
            ("rules_cc", "0.0.9"),
            ("rules_license", "0.0.7"),
        ],
    ),
    (
        "6.4.0",
        &[("platforms", "0.0.6"), ("rules_cc", "0.0.6"), ("rules_license", "0.0.4")],
    ),
];

fn implicit_deps_for(bazel_version: &str) -> &'static [(&'static str, &'static str)] {
    IMPLICIT_DEPS_TABLE
        .iter()
        .find(|(v, _)| *v == bazel_version)
        .map(|(_, deps)| *deps)
        .unwrap_or(&[])
}

fn inject_implicit_deps(root: &mut ModuleInfo, bazel_version: &str) {
    let existing: std::collections::HashSet<String> = root.dependencies.iter().map(|d| d.name.clone()).collect();
    for (name, version) in implicit_deps_for(bazel_version) {
        if existing.contains(*name) {
            continue;
        }
        root.dependencies.push(crate::types::Dependency {
            name: (*name).to_string(),
            version: Version::parse(version).unwrap_or_else(|_| Version::empty()),
            repo_name: None,
            dev_dependency: false,
            max_compat_level: None,
        });
    }
}

/// Resolves a root [`ModuleInfo`] into a [`ResolutionList`] by running
/// discovery and selection against a [`RegistryChain`] (§4.5).
pub struct Resolver {
    chain: Arc<RegistryChain>,
    options: ResolutionOptions,
}

impl Resolver {
    #[must_use]
    pub fn new(chain: Arc<RegistryChain>, options: ResolutionOptions) -> Self {
        Self { chain, options }
    }

    /// Resolve `root`'s transitive dependency set.
    ///
    /// `override_snapshots` supplies pre-parsed `ModuleInfo` for modules
    /// under a `git_override`/`local_path_override`/`archive_override`,
    /// keyed by module name, so their own dependencies can be walked
    /// without a registry fetch.
    pub async fn resolve(
        &self,
        root: &ModuleInfo,
        override_snapshots: HashMap<String, ModuleInfo>,
        cancel: CancellationToken,
    ) -> Result<ResolutionList> {
        let mut root = root.clone();
        if let Some(bazel_version) = self.options.bazel_version.clone() {
            inject_implicit_deps(&mut root, &bazel_version);
        }

        info!(module = %root.name, deps = root.dependencies.len(), "starting discovery");
        let graph = discovery::discover(&root, Arc::clone(&self.chain), override_snapshots, &self.options, cancel).await?;

        info!(names = graph.len(), "discovery complete, starting selection");
        selection::select(graph, &root, &self.chain, &self.options).await
    }
}
