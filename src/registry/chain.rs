//! The registry chain (§4.4): an ordered list of sources plus a
//! sticky-per-module map, with fallback on miss or error.

use dashmap::DashMap;
use std::sync::Arc;

use super::{ModuleMetadata, RegistrySource, SourceDescriptor};
use crate::error::{ResolveError, Result};
use crate::types::ModuleInfo;

/// Ordered composition of registry sources with sticky per-module lookup
/// (§4.4). Reads are lock-free on the happy path; the sticky map uses
/// concurrent inserts so multiple discovery workers may race to set the
/// same entry without corrupting it.
pub struct RegistryChain {
    sources: Vec<Arc<dyn RegistrySource>>,
    sticky: DashMap<String, usize>,
}

impl RegistryChain {
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn RegistrySource>>) -> Self {
        Self {
            sources,
            sticky: DashMap::new(),
        }
    }

    /// The first source's base URL, used as the final fallback for
    /// `ResolvedModule.registry_url` when no sticky assignment exists.
    #[must_use]
    pub fn primary_base_url(&self) -> &str {
        self.sources.first().map(|s| s.base_url()).unwrap_or_default()
    }

    /// The base URL of the source currently sticky for `name`, if any.
    #[must_use]
    pub fn sticky_base_url(&self, name: &str) -> Option<String> {
        let idx = *self.sticky.get(name)?;
        self.sources.get(idx).map(|s| s.base_url().to_string())
    }

    pub async fn get_module_file(&self, name: &str, version: &str) -> Result<ModuleInfo> {
        if let Some(idx) = self.sticky.get(name).map(|r| *r) {
            match self.sources[idx].get_module_file(name, version).await {
                Ok(v) => return Ok(v),
                Err(_) => return self.scan_module_file(name, version, idx + 1).await,
            }
        }
        self.scan_module_file(name, version, 0).await
    }

    async fn scan_module_file(&self, name: &str, version: &str, start: usize) -> Result<ModuleInfo> {
        let mut last_err: Option<ResolveError> = None;
        for (i, src) in self.sources.iter().enumerate().skip(start) {
            match src.get_module_file(name, version).await {
                Ok(v) => {
                    self.sticky.insert(name.to_string(), i);
                    return Ok(v);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ResolveError::not_found(name, version)))
    }

    pub async fn get_module_source(&self, name: &str, version: &str) -> Result<SourceDescriptor> {
        if let Some(idx) = self.sticky.get(name).map(|r| *r) {
            match self.sources[idx].get_module_source(name, version).await {
                Ok(v) => return Ok(v),
                Err(_) => return self.scan_module_source(name, version, idx + 1).await,
            }
        }
        self.scan_module_source(name, version, 0).await
    }

    async fn scan_module_source(&self, name: &str, version: &str, start: usize) -> Result<SourceDescriptor> {
        let mut last_err: Option<ResolveError> = None;
        for (i, src) in self.sources.iter().enumerate().skip(start) {
            match src.get_module_source(name, version).await {
                Ok(v) => {
                    self.sticky.insert(name.to_string(), i);
                    return Ok(v);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ResolveError::not_found(name, version)))
    }

    /// Metadata lookup is fail-open and, per §4.4, consults only the
    /// sticky source once one is known (no fallback).
    pub async fn get_module_metadata(&self, name: &str) -> Result<ModuleMetadata> {
        if let Some(idx) = self.sticky.get(name).map(|r| *r) {
            return self.sources[idx].get_module_metadata(name).await;
        }
        let mut last_err: Option<ResolveError> = None;
        for (i, src) in self.sources.iter().enumerate() {
            match src.get_module_metadata(name).await {
                Ok(v) => {
                    self.sticky.insert(name.to_string(), i);
                    return Ok(v);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ResolveError::not_found(name, "")))
    }
}
