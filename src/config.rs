//! Resolution options.
//!
//! This module models the caller-facing knobs enumerated in §6 of the
//! design: network policy, yanked/deprecation handling, direct-dependency
//! checking, and the registry list itself. There is no on-disk config
//! format here — a CLI front-end that would parse one is out of scope —
//! callers construct `ResolutionOptions` programmatically, the way a host
//! application builds the options struct before handing it to the
//! resolver.

use std::time::Duration;

/// Policy for how yanked versions are treated after selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YankedBehavior {
    /// Ignore yanked status entirely.
    Allow,
    /// Surface a warning per module but do not fail.
    #[default]
    Warn,
    /// Fail resolution if any selected version is yanked.
    Error,
}

/// Policy for comparing declared direct-dependency versions against the
/// versions ultimately selected by MVS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectDepsMode {
    /// Do not compare.
    #[default]
    Off,
    /// Warn on mismatch.
    Warn,
    /// Fail resolution on mismatch.
    Error,
}

/// Network access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkPolicy {
    /// Unrestricted network access.
    #[default]
    Online,
    /// No network access; only local/vendor sources may answer.
    Offline,
    /// Network access restricted to `allowed_domains`.
    Allowlist,
}

/// The default registry chain used when `registries` is empty: the Bazel
/// Central Registry followed by its GitHub mirror.
pub const DEFAULT_REGISTRIES: &[&str] = &[
    "https://bcr.bazel.build",
    "https://raw.githubusercontent.com/bazelbuild/bazel-central-registry/main",
];

/// Caller-facing resolution options (§6).
#[derive(Debug, Clone)]
pub struct ResolutionOptions {
    /// Include `dev_dependency = True` edges during discovery.
    pub include_dev_deps: bool,

    /// Ordered registry URLs. `file://` selects a local source,
    /// `http(s)://` selects a remote source. Empty means the default
    /// chain (`DEFAULT_REGISTRIES`).
    pub registries: Vec<String>,

    /// Per-HTTP-request timeout.
    pub timeout: Duration,

    /// External key-value cache for module files, consulted by each
    /// registry source between its process-local memo and I/O.
    pub cache: Option<std::sync::Arc<dyn crate::registry::cache::ExternalCache>>,

    /// Enable the metadata post-check that populates `yanked` fields.
    pub check_yanked: bool,

    /// What to do when a selected version is yanked.
    pub yanked_behavior: YankedBehavior,

    /// Literal `"all"` or `name@version` strings that suppress the
    /// yanked flag even when `yanked_behavior` is `Error`.
    pub allow_yanked_versions: Vec<String>,

    /// Append deprecation warnings during the post-selection check.
    pub warn_deprecated: bool,

    /// Compare direct-dependency declarations against selected versions.
    pub direct_deps_mode: DirectDepsMode,

    /// Enable the yanked-substitution pass during selection.
    pub substitute_yanked: bool,

    /// Inject Bazel-version implicit deps and check `bazel_compatibility`
    /// against this Bazel version.
    pub bazel_version: Option<String>,

    /// Local filesystem root prepended as a vendor source ahead of the
    /// registry chain.
    pub vendor_dir: Option<std::path::PathBuf>,

    /// Network access policy.
    pub network: NetworkPolicy,

    /// Domains permitted when `network == Allowlist`.
    pub allowed_domains: Vec<String>,

    /// Number of concurrent discovery workers (§5 "fan-out 5").
    pub discovery_concurrency: usize,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            include_dev_deps: false,
            registries: Vec::new(),
            timeout: Duration::from_secs(15),
            cache: None,
            check_yanked: false,
            yanked_behavior: YankedBehavior::default(),
            allow_yanked_versions: Vec::new(),
            warn_deprecated: false,
            direct_deps_mode: DirectDepsMode::default(),
            substitute_yanked: false,
            bazel_version: None,
            vendor_dir: None,
            network: NetworkPolicy::default(),
            allowed_domains: Vec::new(),
            discovery_concurrency: 5,
        }
    }
}

impl ResolutionOptions {
    /// The effective registry URL list: `registries` if non-empty,
    /// otherwise `DEFAULT_REGISTRIES`.
    #[must_use]
    pub fn effective_registries(&self) -> Vec<String> {
        if self.registries.is_empty() {
            DEFAULT_REGISTRIES.iter().map(|s| s.to_string()).collect()
        } else {
            self.registries.clone()
        }
    }

    /// Whether `name@version` (or `"all"`) is present in
    /// `allow_yanked_versions`.
    #[must_use]
    pub fn allows_yanked(&self, name: &str, version: &str) -> bool {
        let needle = format!("{name}@{version}");
        self.allow_yanked_versions.iter().any(|s| s == "all" || *s == needle)
    }

    /// Sensible discovery work-queue buffer size: `max(min_buffer, 2 *
    /// direct_dep_count)` per §4.5 with `min_buffer` around 100.
    #[must_use]
    pub fn discovery_buffer(&self, direct_dep_count: usize) -> usize {
        const MIN_BUFFER: usize = 100;
        MIN_BUFFER.max(2 * direct_dep_count)
    }
}
