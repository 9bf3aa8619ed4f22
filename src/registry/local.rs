//! Filesystem-backed registry source (§4.3 "Local source", §6 layout).

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::cache::{ExternalCache, FileKind, SourceCache};
use super::{ModuleMetadata, RegistryConfig, RegistrySource, SourceDescriptor};
use crate::error::{ResolveError, Result};
use crate::parser;
use crate::types::ModuleInfo;

/// Reads `MODULE.bazel` / `metadata.json` / `source.json` from a
/// filesystem root laid out exactly as the remote layout, minus the
/// network round trip.
pub struct LocalSource {
    root: PathBuf,
    base_url: String,
    config: OnceCell<RegistryConfig>,
    cache: SourceCache,
}

impl LocalSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, external: Option<Arc<dyn ExternalCache>>) -> Self {
        let root = root.into();
        let base_url = format!("file://{}", root.display());
        Self {
            root,
            base_url,
            config: OnceCell::new(),
            cache: SourceCache::new(external),
        }
    }

    async fn config(&self) -> &RegistryConfig {
        self.config
            .get_or_init(|| async {
                let path = self.root.join("bazel_registry.json");
                match self.read_file(&path).await {
                    Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_default(),
                    _ => RegistryConfig::default(),
                }
            })
            .await
    }

    async fn module_base_path(&self) -> String {
        self.config().await.module_base_path.clone()
    }

    /// `Ok(None)` on a clean miss, `Err` on any other I/O failure.
    async fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ResolveError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }
}

#[async_trait]
impl RegistrySource for LocalSource {
    async fn get_module_file(&self, name: &str, version: &str) -> Result<ModuleInfo> {
        if let Some(bytes) = self.cache.get(name, version, FileKind::ModuleFile).await {
            return parser::parse(&String::from_utf8_lossy(&bytes));
        }
        let base = self.module_base_path().await;
        let path = self.root.join(base).join(name).join(version).join("MODULE.bazel");
        let bytes = self
            .read_file(&path)
            .await?
            .ok_or_else(|| ResolveError::not_found(name, version))?;
        self.cache.put(name, version, FileKind::ModuleFile, bytes.clone()).await;
        parser::parse(&String::from_utf8_lossy(&bytes))
    }

    async fn get_module_metadata(&self, name: &str) -> Result<ModuleMetadata> {
        if let Some(bytes) = self.cache.get(name, "", FileKind::Metadata).await {
            return serde_json::from_slice(&bytes).map_err(|e| ResolveError::Parse {
                message: format!("invalid metadata.json for '{name}': {e}"),
            });
        }
        let base = self.module_base_path().await;
        let path = self.root.join(base).join(name).join("metadata.json");
        let bytes = self
            .read_file(&path)
            .await?
            .ok_or_else(|| ResolveError::not_found(name, ""))?;
        self.cache.put(name, "", FileKind::Metadata, bytes.clone()).await;
        serde_json::from_slice(&bytes).map_err(|e| ResolveError::Parse {
            message: format!("invalid metadata.json for '{name}': {e}"),
        })
    }

    async fn get_module_source(&self, name: &str, version: &str) -> Result<SourceDescriptor> {
        if let Some(bytes) = self.cache.get(name, version, FileKind::Source).await {
            return serde_json::from_slice(&bytes).map_err(|e| ResolveError::Parse {
                message: format!("invalid source.json for '{name}@{version}': {e}"),
            });
        }
        let base = self.module_base_path().await;
        let path = self.root.join(base).join(name).join(version).join("source.json");
        let bytes = self
            .read_file(&path)
            .await?
            .ok_or_else(|| ResolveError::not_found(name, version))?;
        self.cache.put(name, version, FileKind::Source, bytes.clone()).await;
        serde_json::from_slice(&bytes).map_err(|e| ResolveError::Parse {
            message: format!("invalid source.json for '{name}@{version}': {e}"),
        })
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// A vendor-directory source (§6 `vendor_dir`): behaves exactly like
/// [`LocalSource`], except that when a module has no `metadata.json` its
/// `versions[]` are synthesized from the `{name}/{version}/` directory
/// listing instead of being reported as not found, so a vendored checkout
/// doesn't need to carry its own registry metadata.
pub struct VendorSource {
    inner: LocalSource,
}

impl VendorSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, external: Option<Arc<dyn ExternalCache>>) -> Self {
        Self {
            inner: LocalSource::new(root, external),
        }
    }

    async fn synthesize_metadata(&self, name: &str) -> Result<ModuleMetadata> {
        let base = self.inner.module_base_path().await;
        let dir = self.inner.root.join(base).join(name);

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResolveError::not_found(name, "")
            } else {
                ResolveError::Io {
                    path: dir.display().to_string(),
                    source: e,
                }
            }
        })?;

        let mut versions = Vec::new();
        loop {
            let next = entries.next_entry().await.map_err(|e| ResolveError::Io {
                path: dir.display().to_string(),
                source: e,
            })?;
            let Some(entry) = next else { break };
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if let Some(version) = entry.file_name().to_str() {
                    versions.push(version.to_string());
                }
            }
        }
        versions.sort();

        Ok(ModuleMetadata {
            versions,
            yanked_versions: HashMap::new(),
            deprecated: None,
        })
    }
}

#[async_trait]
impl RegistrySource for VendorSource {
    async fn get_module_file(&self, name: &str, version: &str) -> Result<ModuleInfo> {
        self.inner.get_module_file(name, version).await
    }

    async fn get_module_metadata(&self, name: &str) -> Result<ModuleMetadata> {
        match self.inner.get_module_metadata(name).await {
            Err(ResolveError::NotFound { .. }) => self.synthesize_metadata(name).await,
            other => other,
        }
    }

    async fn get_module_source(&self, name: &str, version: &str) -> Result<SourceDescriptor> {
        self.inner.get_module_source(name, version).await
    }

    fn base_url(&self) -> &str {
        self.inner.base_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture(name: &str, version: &str, module_bazel: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mod_dir = dir.path().join("modules").join(name).join(version);
        fs::create_dir_all(&mod_dir).unwrap();
        fs::write(mod_dir.join("MODULE.bazel"), module_bazel).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_module_file() {
        let dir = fixture("m", "1.0.0", r#"module(name = "m", version = "1.0.0")"#);
        let src = LocalSource::new(dir.path(), None);
        let info = src.get_module_file("m", "1.0.0").await.unwrap();
        assert_eq!(info.name, "m");
    }

    #[tokio::test]
    async fn missing_version_is_not_found() {
        let dir = fixture("m", "1.0.0", r#"module(name = "m", version = "1.0.0")"#);
        let src = LocalSource::new(dir.path(), None);
        let err = src.get_module_file("m", "9.9.9").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn repeated_read_hits_memo() {
        let dir = fixture("m", "1.0.0", r#"module(name = "m", version = "1.0.0")"#);
        let src = LocalSource::new(dir.path(), None);
        src.get_module_file("m", "1.0.0").await.unwrap();
        // Remove the file on disk; a memo hit must not need it anymore.
        fs::remove_file(dir.path().join("modules/m/1.0.0/MODULE.bazel")).unwrap();
        let info = src.get_module_file("m", "1.0.0").await.unwrap();
        assert_eq!(info.name, "m");
    }

    #[tokio::test]
    async fn vendor_source_reads_module_file_like_local_source() {
        let dir = fixture("m", "1.0.0", r#"module(name = "m", version = "1.0.0")"#);
        let src = VendorSource::new(dir.path(), None);
        let info = src.get_module_file("m", "1.0.0").await.unwrap();
        assert_eq!(info.name, "m");
    }

    #[tokio::test]
    async fn vendor_source_synthesizes_versions_without_metadata_json() {
        let dir = fixture("m", "1.0.0", r#"module(name = "m", version = "1.0.0")"#);
        fs::create_dir_all(dir.path().join("modules/m/2.0.0")).unwrap();
        fs::write(
            dir.path().join("modules/m/2.0.0/MODULE.bazel"),
            r#"module(name = "m", version = "2.0.0")"#,
        )
        .unwrap();

        let src = VendorSource::new(dir.path(), None);
        let meta = src.get_module_metadata("m").await.unwrap();

        assert_eq!(meta.versions, vec!["1.0.0".to_string(), "2.0.0".to_string()]);
        assert!(meta.yanked_versions.is_empty());
    }

    #[tokio::test]
    async fn vendor_source_prefers_real_metadata_json_when_present() {
        let dir = fixture("m", "1.0.0", r#"module(name = "m", version = "1.0.0")"#);
        fs::write(
            dir.path().join("modules/m/metadata.json"),
            r#"{"versions": ["1.0.0"], "yanked_versions": {"1.0.0": "bad build"}}"#,
        )
        .unwrap();

        let src = VendorSource::new(dir.path(), None);
        let meta = src.get_module_metadata("m").await.unwrap();

        assert_eq!(meta.yanked_versions.get("1.0.0").unwrap(), "bad build");
    }

    #[tokio::test]
    async fn vendor_source_missing_module_directory_is_not_found() {
        let dir = fixture("m", "1.0.0", r#"module(name = "m", version = "1.0.0")"#);
        let src = VendorSource::new(dir.path(), None);
        let err = src.get_module_metadata("nonexistent").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }
}
