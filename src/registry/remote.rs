//! HTTP-backed registry source (§4.3 "Remote source").
//!
//! Grounded on the teacher's `vcs_clients.rs` pattern of a shared HTTP
//! client wrapped by a single fetch helper that classifies status codes,
//! adapted to the primary-then-mirrors fallback chain §4.3 requires.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::cache::{ExternalCache, FileKind, SourceCache};
use super::{ModuleMetadata, RegistryConfig, RegistrySource, SourceDescriptor};
use crate::error::{ResolveError, Result};
use crate::parser;
use crate::types::ModuleInfo;

/// Reads `MODULE.bazel` / `metadata.json` / `source.json` over HTTP from a
/// primary base URL, falling back through `bazel_registry.json`'s
/// `mirrors[]` on non-404 failures (§4.3).
pub struct RemoteSource {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    config: OnceCell<RegistryConfig>,
    cache: SourceCache,
}

impl RemoteSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration, external: Option<Arc<dyn ExternalCache>>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
            config: OnceCell::new(),
            cache: SourceCache::new(external),
        }
    }

    async fn config(&self) -> &RegistryConfig {
        self.config
            .get_or_init(|| async {
                let url = format!("{}/bazel_registry.json", self.base_url);
                match self.client.get(&url).timeout(self.timeout).send().await {
                    Ok(resp) if resp.status().is_success() => resp
                        .bytes()
                        .await
                        .ok()
                        .and_then(|b| serde_json::from_slice(&b).ok())
                        .unwrap_or_default(),
                    _ => RegistryConfig::default(),
                }
            })
            .await
    }

    fn classify_status(status: reqwest::StatusCode, name: &str, url: &str) -> ResolveError {
        match status.as_u16() {
            401 | 403 => ResolveError::Unauthorized {
                name: name.to_string(),
                url: url.to_string(),
            },
            429 | 503 | 504 => ResolveError::Transient {
                name: name.to_string(),
                url: url.to_string(),
                message: format!("HTTP {status}"),
                retryable: true,
            },
            _ => ResolveError::Transient {
                name: name.to_string(),
                url: url.to_string(),
                message: format!("HTTP {status}"),
                retryable: false,
            },
        }
    }

    /// Try the primary URL, then each mirror in order, returning the body
    /// of the first 2xx. A 404 from the primary short-circuits; every
    /// other non-2xx or transport error falls through to the next URL.
    async fn fetch_bytes(&self, rel_path: &str, name: &str, version: &str) -> Result<Vec<u8>> {
        let config = self.config().await;
        let mut bases = Vec::with_capacity(1 + config.mirrors.len());
        bases.push(self.base_url.clone());
        bases.extend(config.mirrors.iter().cloned());

        let mut last_err: Option<ResolveError> = None;
        for (i, base) in bases.iter().enumerate() {
            let url = format!("{}/{}", base.trim_end_matches('/'), rel_path);
            match self.client.get(&url).timeout(self.timeout).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.bytes().await.map(|b| b.to_vec()).map_err(|e| ResolveError::Transient {
                        name: name.to_string(),
                        url: url.clone(),
                        message: e.to_string(),
                        retryable: true,
                    });
                }
                Ok(resp) if resp.status().as_u16() == 404 => {
                    if i == 0 {
                        return Err(ResolveError::NotFound {
                            name: name.to_string(),
                            version: version.to_string(),
                            url: Some(url),
                        });
                    }
                    last_err = Some(ResolveError::NotFound {
                        name: name.to_string(),
                        version: version.to_string(),
                        url: Some(url),
                    });
                }
                Ok(resp) => {
                    last_err = Some(Self::classify_status(resp.status(), name, &url));
                }
                Err(e) => {
                    last_err = Some(ResolveError::Transient {
                        name: name.to_string(),
                        url,
                        message: e.to_string(),
                        retryable: true,
                    });
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ResolveError::not_found(name, version)))
    }
}

#[async_trait]
impl RegistrySource for RemoteSource {
    async fn get_module_file(&self, name: &str, version: &str) -> Result<ModuleInfo> {
        if let Some(bytes) = self.cache.get(name, version, FileKind::ModuleFile).await {
            return parser::parse(&String::from_utf8_lossy(&bytes));
        }
        let base = self.config().await.module_base_path.clone();
        let path = format!("{base}/{name}/{version}/MODULE.bazel");
        let bytes = self.fetch_bytes(&path, name, version).await?;
        self.cache.put(name, version, FileKind::ModuleFile, bytes.clone()).await;
        parser::parse(&String::from_utf8_lossy(&bytes))
    }

    async fn get_module_metadata(&self, name: &str) -> Result<ModuleMetadata> {
        if let Some(bytes) = self.cache.get(name, "", FileKind::Metadata).await {
            return serde_json::from_slice(&bytes).map_err(|e| ResolveError::Parse {
                message: format!("invalid metadata.json for '{name}': {e}"),
            });
        }
        let base = self.config().await.module_base_path.clone();
        let path = format!("{base}/{name}/metadata.json");
        let bytes = self.fetch_bytes(&path, name, "").await?;
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
        let base = self.config().await.module_base_path.clone();
        let path = format!("{base}/{name}/{version}/source.json");
        let bytes = self.fetch_bytes(&path, name, version).await?;
        self.cache.put(name, version, FileKind::Source, bytes.clone()).await;
        serde_json::from_slice(&bytes).map_err(|e| ResolveError::Parse {
            message: format!("invalid source.json for '{name}@{version}': {e}"),
        })
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_module_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bazel_registry.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/modules/m/1.0.0/MODULE.bazel"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"module(name = "m", version = "1.0.0")"#))
            .mount(&server)
            .await;

        let src = RemoteSource::new(server.uri(), Duration::from_secs(5), None);
        let info = src.get_module_file("m", "1.0.0").await.unwrap();
        assert_eq!(info.name, "m");
    }

    #[tokio::test]
    async fn primary_404_short_circuits_without_mirrors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bazel_registry.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/modules/missing/1.0.0/MODULE.bazel"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let src = RemoteSource::new(server.uri(), Duration::from_secs(5), None);
        let err = src.get_module_file("missing", "1.0.0").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn server_error_is_transient_and_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bazel_registry.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/modules/m/1.0.0/MODULE.bazel"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let src = RemoteSource::new(server.uri(), Duration::from_secs(5), None);
        let err = src.get_module_file("m", "1.0.0").await.unwrap_err();
        match err {
            ResolveError::Transient { retryable, .. } => assert!(retryable),
            other => panic!("expected Transient, got {other:?}"),
        }
    }
}
