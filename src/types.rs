//! Core data types shared across the parser, resolver, and graph.
//!
//! Mirrors the shape of the teacher's `types.rs` (plain `serde`-derived
//! structs, one file per family of related types) but re-keyed around
//! Bazel modules instead of Terraform modules/providers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::version::Version;

/// A Bazel module name: `[a-z]([a-z0-9._-]*[a-z0-9])?`.
///
/// Every `Dependency.name` the parser emits has already been validated
/// against this grammar; this type exists so that "valid module name" is
/// a property of the type rather than a fact callers must re-check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleName(String);

impl ModuleName {
    /// Parse and validate a module name.
    pub fn parse(s: &str) -> crate::error::Result<Self> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(crate::error::ResolveError::Parse {
                message: format!("invalid module name '{s}'"),
            })
        }
    }

    fn is_valid(s: &str) -> bool {
        let bytes = s.as_bytes();
        if bytes.is_empty() {
            return false;
        }
        if !bytes[0].is_ascii_lowercase() {
            return false;
        }
        if bytes.len() == 1 {
            return true;
        }
        let is_mid = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-');
        let last = bytes[bytes.len() - 1];
        (bytes[1..bytes.len() - 1].iter().all(|&b| is_mid(b)))
            && (last.is_ascii_lowercase() || last.is_ascii_digit())
    }

    /// Borrow the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ModuleName> for String {
    fn from(n: ModuleName) -> Self {
        n.0
    }
}

/// A direct edge from the enclosing module to `name@version`, declared by
/// a `bazel_dep(...)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// The dependency's module name.
    pub name: String,
    /// The requested version.
    pub version: Version,
    /// The local repository name this dependency is bound to
    /// (`repo_name` attribute), if overridden from the default.
    pub repo_name: Option<String>,
    /// Whether this is a `dev_dependency`.
    pub dev_dependency: bool,
    /// `max_compatibility_level`, if declared.
    pub max_compat_level: Option<u32>,
}

/// Root-module directive that pins, replaces, or bypasses a dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Override {
    /// Pins the module's version and optionally redirects its registry.
    SingleVersion {
        /// The module being pinned.
        module_name: String,
        /// The pinned version.
        version: Version,
        /// Registry URL override, if any.
        registry: Option<String>,
    },
    /// The module is fetched via `git_repository` out of band; its
    /// version is treated as empty/highest.
    Git {
        /// The module name.
        module_name: String,
    },
    /// The module is a local filesystem path; its version is treated as
    /// empty/highest.
    LocalPath {
        /// The module name.
        module_name: String,
    },
    /// The module is fetched from an archive out of band; its version is
    /// treated as empty/highest.
    Archive {
        /// The module name.
        module_name: String,
    },
}

impl Override {
    /// The module name this override applies to.
    #[must_use]
    pub fn module_name(&self) -> &str {
        match self {
            Self::SingleVersion { module_name, .. }
            | Self::Git { module_name }
            | Self::LocalPath { module_name }
            | Self::Archive { module_name } => module_name,
        }
    }

    /// Whether this is one of the three non-registry override kinds.
    #[must_use]
    pub fn is_non_registry(&self) -> bool {
        !matches!(self, Self::SingleVersion { .. })
    }
}

/// A parsed `MODULE.bazel`: the module's own identity, its direct
/// dependencies, and any overrides it declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// The module's own name (empty for an unnamed root module).
    pub name: String,
    /// The module's own version.
    pub version: Version,
    /// The module's ABI compatibility level.
    pub compatibility_level: u32,
    /// `bazel_compatibility` constraint strings (§6).
    pub bazel_compatibility: Vec<String>,
    /// Direct `bazel_dep` declarations.
    pub dependencies: Vec<Dependency>,
    /// Override declarations.
    pub overrides: Vec<Override>,
}

impl ModuleInfo {
    /// Look up the override (if any) declared for `name`.
    #[must_use]
    pub fn override_for(&self, name: &str) -> Option<&Override> {
        self.overrides.iter().find(|o| o.module_name() == name)
    }
}

/// A version-specific request for a module during discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepRequest {
    /// The requested version.
    pub version: Version,
    /// Whether every requestor of this `(name, version)` pair marked it
    /// as dev-only; sticky-true, per §4.5 rule 2.
    pub dev_dependency: bool,
    /// Names of the modules (or `"<override>"`) that requested this
    /// version, in discovery order, deduplicated only within a single
    /// worker step.
    pub required_by: Vec<String>,
}

/// `name -> (version -> DepRequest)`, the two-level map built during
/// discovery (§4.5).
pub type DepGraph = HashMap<String, HashMap<String, DepRequest>>;

/// A module in the final resolution, after MVS selection and the
/// post-selection checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedModule {
    /// The module name.
    pub name: String,
    /// The selected version.
    pub version: Version,
    /// The registry URL this module was (or would be) fetched from.
    pub registry_url: String,
    /// Whether every requestor marked this module dev-only.
    pub dev_dependency: bool,
    /// Requestors, in discovery order.
    pub required_by: Vec<String>,
    /// Distance from the root in the resolved graph.
    pub depth: u32,
    /// The module's own direct dependencies, as discovered.
    pub dependencies: Vec<Dependency>,
    /// Set if the metadata post-check found this version yanked.
    pub yanked: bool,
    /// The reason given by the registry, if yanked.
    pub yank_reason: Option<String>,
    /// Set if the module's metadata marks it deprecated.
    pub deprecated: bool,
    /// The deprecation reason, if any.
    pub deprecation_reason: Option<String>,
    /// `bazel_compatibility` constraints carried from the parsed module.
    pub bazel_compatibility: Vec<String>,
    /// Set when `bazel_version` was supplied and this module's
    /// constraints reject it.
    pub is_bazel_incompatible: bool,
    /// The reason(s) the module is incompatible, joined by `" and "`.
    pub incompatibility_reason: Option<String>,
}

/// A warning surfaced by the `Warn` policies (yanked, direct-deps
/// mismatch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionWarning {
    /// The module the warning concerns.
    pub module: String,
    /// Human-readable warning text.
    pub message: String,
}

/// The final output of resolution: the flat module list plus warnings.
/// Owns the data the `Graph` is built from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolutionList {
    /// Selected modules, sorted by name.
    pub modules: Vec<ResolvedModule>,
    /// Non-fatal warnings collected during post-selection checks.
    pub warnings: Vec<ResolutionWarning>,
}

impl ResolutionList {
    /// Look up a resolved module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_validation() {
        assert!(ModuleName::parse("rules_go").is_ok());
        assert!(ModuleName::parse("a").is_ok());
        assert!(ModuleName::parse("a.b-c_d9").is_ok());
        assert!(ModuleName::parse("Rules_Go").is_err());
        assert!(ModuleName::parse("").is_err());
        assert!(ModuleName::parse("a-").is_err());
        assert!(ModuleName::parse("-a").is_err());
    }

    #[test]
    fn override_module_name_accessor() {
        let o = Override::Git { module_name: "foo".to_string() };
        assert_eq!(o.module_name(), "foo");
        assert!(o.is_non_registry());
    }
}
