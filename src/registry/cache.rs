//! Per-source caching (§4.3): a process-local memo consulted first, then an
//! optional external key-value layer, before any I/O happens at all.
//!
//! Grounded on the teacher's `git/cache.rs` `CacheManager`: a thin wrapper
//! that always tries the fast path first and treats every external-cache
//! failure as a plain miss rather than an error.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// The three kinds of payload a registry source serves, used as part of
/// the memo key (a metadata fetch and a module-file fetch for the same
/// name/version must not collide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    ModuleFile,
    Metadata,
    Source,
}

/// An external key-value cache for module files (§4.3's "optional external
/// cache"). Implementations must swallow their own errors: from the
/// caller's perspective a failed `get` is indistinguishable from a clean
/// miss, and a failed `put` is simply lost.
#[async_trait]
pub trait ExternalCache: Send + Sync {
    /// Look up `key`. Returns `None` on a miss or on any internal failure.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    /// Store `value` under `key`, best-effort.
    async fn put(&self, key: &str, value: Vec<u8>);
}

/// The memo + external-cache pair owned by a single registry source.
pub(crate) struct SourceCache {
    memo: DashMap<(String, String, FileKind), Vec<u8>>,
    external: Option<Arc<dyn ExternalCache>>,
}

impl SourceCache {
    pub fn new(external: Option<Arc<dyn ExternalCache>>) -> Self {
        Self {
            memo: DashMap::new(),
            external,
        }
    }

    fn external_key(name: &str, version: &str, kind: FileKind) -> String {
        format!("{name}@{version}#{kind:?}")
    }

    /// Consult the memo, then the external cache. `None` means a clean
    /// miss at both layers (or the cache reported a parse-error-equivalent
    /// failure, which is treated identically per §4.3).
    pub async fn get(&self, name: &str, version: &str, kind: FileKind) -> Option<Vec<u8>> {
        let memo_key = (name.to_string(), version.to_string(), kind);
        if let Some(bytes) = self.memo.get(&memo_key) {
            return Some(bytes.clone());
        }
        let external = self.external.as_ref()?;
        let bytes = external.get(&Self::external_key(name, version, kind)).await?;
        self.memo.insert(memo_key, bytes.clone());
        Some(bytes)
    }

    /// Record a freshly fetched payload in both layers.
    pub async fn put(&self, name: &str, version: &str, kind: FileKind, bytes: Vec<u8>) {
        let memo_key = (name.to_string(), version.to_string(), kind);
        self.memo.insert(memo_key, bytes.clone());
        if let Some(external) = &self.external {
            external.put(&Self::external_key(name, version, kind), bytes).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyCache {
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ExternalCache for FlakyCache {
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            None
        }
        async fn put(&self, _key: &str, _value: Vec<u8>) {
            self.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn memo_hit_bypasses_external_cache() {
        let cache = SourceCache::new(None);
        cache.put("m", "1.0.0", FileKind::ModuleFile, b"hello".to_vec()).await;
        let got = cache.get("m", "1.0.0", FileKind::ModuleFile).await;
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn distinct_kinds_do_not_collide() {
        let cache = SourceCache::new(None);
        cache.put("m", "1.0.0", FileKind::ModuleFile, b"a".to_vec()).await;
        cache.put("m", "1.0.0", FileKind::Metadata, b"b".to_vec()).await;
        assert_eq!(cache.get("m", "1.0.0", FileKind::ModuleFile).await, Some(b"a".to_vec()));
        assert_eq!(cache.get("m", "1.0.0", FileKind::Metadata).await, Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn external_cache_failures_are_non_fatal() {
        let cache = SourceCache::new(Some(Arc::new(FlakyCache {
            fail: std::sync::atomic::AtomicBool::new(false),
        })));
        cache.put("m", "1.0.0", FileKind::ModuleFile, b"x".to_vec()).await;
        assert_eq!(cache.get("m", "1.0.0", FileKind::ModuleFile).await, Some(b"x".to_vec()));
    }
}
