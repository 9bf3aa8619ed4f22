//! The registry-source capability (§4.3): a uniform interface over remote
//! (HTTP) and local (filesystem) sources, composed into an ordered,
//! sticky-per-module chain by [`chain::RegistryChain`].

pub mod cache;
pub mod chain;
pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ResolveError, Result};
use crate::types::ModuleInfo;

pub use cache::ExternalCache;
pub use chain::RegistryChain;
pub use local::{LocalSource, VendorSource};
pub use remote::RemoteSource;

/// `metadata.json` fields consumed by the engine (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// All versions the registry knows about for this module.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Yanked version → reason.
    #[serde(default)]
    pub yanked_versions: HashMap<String, String>,
    /// Present (and non-null) when the module is deprecated.
    #[serde(default)]
    pub deprecated: Option<String>,
}

/// `source.json`: the fetch recipe for a module version. The `type` field
/// and payload are carried through opaquely; actual fetching is out of
/// scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// One of `"archive"`, `"local_path"`, `"git_repository"`.
    #[serde(rename = "type")]
    pub source_type: String,
    /// The rest of the document, untyped.
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// `bazel_registry.json`: mirrors and the module base path, fetched lazily
/// on first use. Absence of the file is not an error (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Mirror base URLs, tried in order after the primary.
    #[serde(default)]
    pub mirrors: Vec<String>,
    /// Path prefix under which `{name}/{version}/...` lives.
    #[serde(default = "default_module_base_path")]
    pub module_base_path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mirrors: Vec::new(),
            module_base_path: default_module_base_path(),
        }
    }
}

fn default_module_base_path() -> String {
    "modules".to_string()
}

/// A single-source read capability over a module registry (§4.3). Remote,
/// local, and vendor-aware sources all implement this; the chain is a
/// composition over it.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Fetch and parse `{name}/{version}/MODULE.bazel`.
    async fn get_module_file(&self, name: &str, version: &str) -> Result<ModuleInfo>;
    /// Fetch and parse `{name}/metadata.json`.
    async fn get_module_metadata(&self, name: &str) -> Result<ModuleMetadata>;
    /// Fetch and parse `{name}/{version}/source.json`.
    async fn get_module_source(&self, name: &str, version: &str) -> Result<SourceDescriptor>;
    /// This source's base URL, used as a `ResolvedModule.registry_url`
    /// fallback when no override or sticky assignment applies.
    fn base_url(&self) -> &str;
}

/// Build a single [`RegistrySource`] for a registry URL: `file://` selects
/// a [`LocalSource`], `http(s)://` selects a [`RemoteSource`] (§6).
pub(crate) fn build_source(
    url: &str,
    timeout: Duration,
    external_cache: Option<Arc<dyn ExternalCache>>,
) -> Result<Arc<dyn RegistrySource>> {
    if url.starts_with("file://") {
        let path = crate::fileurl::parse_file_url(url)?;
        Ok(Arc::new(LocalSource::new(path, external_cache)))
    } else if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Arc::new(RemoteSource::new(url, timeout, external_cache)))
    } else {
        Err(ResolveError::InvalidFileUrl {
            url: url.to_string(),
            message: "registry URL must use file://, http://, or https://".to_string(),
        })
    }
}
