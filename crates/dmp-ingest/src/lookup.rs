//! Cached external organization lookup using moka

use crate::error::LookupError;
use crate::ports::{OrgCandidate, OrgLookup};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupCacheStats {
    /// Number of cached terms
    pub entry_count: u64,
}

/// TTL cache in front of any `OrgLookup`
///
/// Terms are keyed case-insensitively. Failures are never cached.
#[derive(Clone)]
pub struct CachedLookup {
    inner: Arc<dyn OrgLookup>,
    cache: Cache<String, Arc<Vec<OrgCandidate>>>,
}

impl std::fmt::Debug for CachedLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedLookup")
            .field("entry_count", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CachedLookup {
    /// Wrap a lookup with a bounded, expiring cache
    #[must_use]
    pub fn new(inner: Arc<dyn OrgLookup>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Drop every cached term
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> LookupCacheStats {
        LookupCacheStats {
            entry_count: self.cache.entry_count(),
        }
    }

    fn key(term: &str) -> String {
        term.trim().to_lowercase()
    }
}

#[async_trait]
impl OrgLookup for CachedLookup {
    async fn search(&self, term: &str) -> Result<Vec<OrgCandidate>, LookupError> {
        let key = Self::key(term);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(term = %key, "org lookup cache hit");
            return Ok(hit.as_ref().clone());
        }

        let candidates = self.inner.search(term).await?;
        self.cache.insert(key, Arc::new(candidates.clone())).await;
        Ok(candidates)
    }
}
