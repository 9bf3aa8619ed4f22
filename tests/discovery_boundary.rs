//! Discovery-level boundary behavior: a `NotFound` transitive dependency
//! is pruned silently, while any other fetch error aborts resolution.
//! Driven through a fake `RegistrySource` wired directly into a
//! `RegistryChain`, bypassing HTTP/filesystem entirely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use bzlresolve::error::{ResolveError, Result};
use bzlresolve::registry::{ModuleMetadata, RegistryChain, RegistrySource, SourceDescriptor};
use bzlresolve::resolver::Resolver;
use bzlresolve::types::{Dependency, ModuleInfo, Override};
use bzlresolve::version::Version;
use bzlresolve::ResolutionOptions;

struct FakeSource {
    modules: HashMap<(String, String), ModuleInfo>,
}

#[async_trait]
impl RegistrySource for FakeSource {
    async fn get_module_file(&self, name: &str, version: &str) -> Result<ModuleInfo> {
        self.modules
            .get(&(name.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| ResolveError::not_found(name, version))
    }

    async fn get_module_metadata(&self, name: &str) -> Result<ModuleMetadata> {
        Err(ResolveError::not_found(name, ""))
    }

    async fn get_module_source(&self, name: &str, version: &str) -> Result<SourceDescriptor> {
        Err(ResolveError::not_found(name, version))
    }

    fn base_url(&self) -> &str {
        "fake://test"
    }
}

fn module(name: &str, version: &str, deps: &[(&str, &str)]) -> ModuleInfo {
    ModuleInfo {
        name: name.to_string(),
        version: Version::parse(version).unwrap(),
        compatibility_level: 0,
        bazel_compatibility: Vec::new(),
        dependencies: deps
            .iter()
            .map(|(n, v)| Dependency {
                name: (*n).to_string(),
                version: Version::parse(v).unwrap(),
                repo_name: None,
                dev_dependency: false,
                max_compat_level: None,
            })
            .collect(),
        overrides: Vec::new(),
    }
}

fn root_requiring(name: &str, version: &str) -> ModuleInfo {
    module("root", "1.0.0", &[(name, version)])
}

#[tokio::test]
async fn not_found_transitive_dep_is_pruned_silently() {
    let mut modules = HashMap::new();
    modules.insert(("stable".to_string(), "1.0.0".to_string()), module("stable", "1.0.0", &[("flaky", "1.0.0")]));
    // "flaky@1.0.0" is intentionally absent: the source answers NotFound.

    let chain = Arc::new(RegistryChain::new(vec![Arc::new(FakeSource { modules }) as Arc<dyn RegistrySource>]));
    let resolver = Resolver::new(chain, ResolutionOptions::default());
    let root = root_requiring("stable", "1.0.0");

    let list = resolver.resolve(&root, HashMap::new(), CancellationToken::new()).await.unwrap();

    assert!(list.get("stable").is_some());
    assert!(list.get("flaky").is_none());
}

struct AlwaysTransient;

#[async_trait]
impl RegistrySource for AlwaysTransient {
    async fn get_module_file(&self, name: &str, _version: &str) -> Result<ModuleInfo> {
        Err(ResolveError::Transient {
            name: name.to_string(),
            url: "fake://test".to_string(),
            message: "internal server error".to_string(),
            retryable: false,
        })
    }

    async fn get_module_metadata(&self, name: &str) -> Result<ModuleMetadata> {
        Err(ResolveError::not_found(name, ""))
    }

    async fn get_module_source(&self, name: &str, version: &str) -> Result<SourceDescriptor> {
        Err(ResolveError::not_found(name, version))
    }

    fn base_url(&self) -> &str {
        "fake://test"
    }
}

#[tokio::test]
async fn git_override_skips_registry_lookup_with_empty_version() {
    // "forked" is declared with a requested version but carries a
    // git_override, so it must never be looked up in the registry (the
    // source map stays empty) and lands in the list with an empty
    // version, per the non-registry-override rule (§8).
    let chain = Arc::new(RegistryChain::new(vec![Arc::new(FakeSource { modules: HashMap::new() }) as Arc<dyn RegistrySource>]));
    let resolver = Resolver::new(chain, ResolutionOptions::default());

    let mut root = root_requiring("forked", "1.0.0");
    root.overrides.push(Override::Git { module_name: "forked".to_string() });

    let list = resolver.resolve(&root, HashMap::new(), CancellationToken::new()).await.unwrap();

    let forked = list.get("forked").unwrap();
    assert!(forked.version.as_str().is_empty());
    assert!(forked.required_by.iter().any(|r| r == "<root>"));
}

#[tokio::test]
async fn non_not_found_error_aborts_resolution() {
    let chain = Arc::new(RegistryChain::new(vec![Arc::new(AlwaysTransient) as Arc<dyn RegistrySource>]));
    let resolver = Resolver::new(chain, ResolutionOptions::default());
    let root = root_requiring("broken", "1.0.0");

    let result = resolver.resolve(&root, HashMap::new(), CancellationToken::new()).await;

    assert!(matches!(result, Err(ResolveError::Transient { .. })));
}
