//! Schema cache — owns the current `SchemaIndex` snapshot.
//!
//! The cache is the only shared mutable state in the crate. Readers get an
//! `Arc` to an immutable snapshot; a refresh builds a brand-new index and
//! swaps it in atomically, so in-flight validations keep the snapshot they
//! started with. Only one refresh is ever in flight: concurrent callers
//! await its result instead of issuing duplicate fetches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{CommonsError, Result};

use super::ingest::build_index;
use super::model::SchemaIndex;

/// Remote schema retrieval, supplied by the transport collaborator.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch_schema(&self) -> Result<Value>;
}

struct CacheState {
    index: Option<Arc<SchemaIndex>>,
    fetched_at: Option<Instant>,
}

/// TTL-based whole-or-nothing schema cache.
pub struct SchemaCache {
    fetcher: Arc<dyn SchemaFetcher>,
    ttl: Duration,
    state: RwLock<CacheState>,
    /// Serializes refreshes; waiters re-check freshness after acquisition.
    refresh_guard: Mutex<()>,
}

impl SchemaCache {
    pub fn new(fetcher: Arc<dyn SchemaFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            state: RwLock::new(CacheState {
                index: None,
                fetched_at: None,
            }),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Current index, refreshing first when empty or past its TTL.
    ///
    /// When a refresh fails but a previous snapshot exists, the stale
    /// snapshot is served and the failure is only logged. The error
    /// propagates only when there is nothing usable to serve.
    pub async fn get_index(&self) -> Result<Arc<SchemaIndex>> {
        if let Some(index) = self.fresh_index().await {
            return Ok(index);
        }

        let _guard = self.refresh_guard.lock().await;
        // A concurrent caller may have completed the refresh while this one
        // waited on the guard.
        if let Some(index) = self.fresh_index().await {
            debug!("schema refresh satisfied by concurrent caller");
            return Ok(index);
        }
        self.refresh_locked().await
    }

    /// Drop the freshness stamp; the next `get_index` call refreshes.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.fetched_at = None;
        debug!("schema cache invalidated");
    }

    /// Fetch and swap in a new snapshot regardless of TTL.
    pub async fn refresh(&self) -> Result<Arc<SchemaIndex>> {
        let _guard = self.refresh_guard.lock().await;
        self.refresh_locked().await
    }

    async fn fresh_index(&self) -> Option<Arc<SchemaIndex>> {
        let state = self.state.read().await;
        let fetched_at = state.fetched_at?;
        if fetched_at.elapsed() < self.ttl {
            state.index.clone()
        } else {
            None
        }
    }

    /// Perform the fetch; caller must hold `refresh_guard`.
    async fn refresh_locked(&self) -> Result<Arc<SchemaIndex>> {
        match self.fetcher.fetch_schema().await {
            Ok(payload) => {
                let index = Arc::new(build_index(&payload));
                info!(
                    entities = index.len(),
                    defects = index.defects.len(),
                    "schema index refreshed"
                );
                let mut state = self.state.write().await;
                state.index = Some(Arc::clone(&index));
                state.fetched_at = Some(Instant::now());
                Ok(index)
            }
            Err(e) => {
                let state = self.state.read().await;
                match &state.index {
                    Some(stale) => {
                        warn!(error = %e, "schema fetch failed, serving stale index");
                        Ok(Arc::clone(stale))
                    }
                    None => Err(CommonsError::SchemaUnavailable(format!(
                        "no cached schema and fetch failed: {}",
                        e
                    ))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubFetcher {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl StubFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaFetcher for StubFetcher {
        async fn fetch_schema(&self) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Simulate network latency so concurrent callers overlap.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(CommonsError::SchemaFetch("connection refused".into()));
            }
            Ok(json!({
                "subject": {"properties": {"gender": {"type": "string"}}}
            }))
        }
    }

    fn cache_with(fetcher: Arc<StubFetcher>, ttl_secs: u64) -> SchemaCache {
        SchemaCache::new(fetcher, Duration::from_secs(ttl_secs))
    }

    #[tokio::test]
    async fn test_first_call_fetches() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = cache_with(Arc::clone(&fetcher), 300);

        let index = cache.get_index().await.unwrap();
        assert!(index.entity("subject").is_some());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = cache_with(Arc::clone(&fetcher), 300);

        cache.get_index().await.unwrap();
        cache.get_index().await.unwrap();
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_single_refetch() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = Arc::new(cache_with(Arc::clone(&fetcher), 300));

        cache.get_index().await.unwrap();
        cache.invalidate().await;

        // Concurrent callers after invalidation share one refresh.
        let (a, b, c) = tokio::join!(cache.get_index(), cache.get_index(), cache.get_index());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_cold_start_single_fetch() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = Arc::new(cache_with(Arc::clone(&fetcher), 300));

        let (a, b) = tokio::join!(cache.get_index(), cache.get_index());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_serves_stale() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = cache_with(Arc::clone(&fetcher), 300);

        let good = cache.get_index().await.unwrap();
        cache.invalidate().await;
        fetcher.fail.store(true, Ordering::SeqCst);

        let stale = cache.get_index().await.unwrap();
        assert!(Arc::ptr_eq(&good, &stale));
    }

    #[tokio::test]
    async fn test_fetch_failure_with_no_prior_index_errors() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.fail.store(true, Ordering::SeqCst);
        let cache = cache_with(Arc::clone(&fetcher), 300);

        let err = cache.get_index().await.unwrap_err();
        assert!(matches!(err, CommonsError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn test_ttl_expiry_triggers_refetch() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = cache_with(Arc::clone(&fetcher), 0);

        cache.get_index().await.unwrap();
        cache.get_index().await.unwrap();
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = cache_with(Arc::clone(&fetcher), 300);

        cache.get_index().await.unwrap();
        fetcher.fail.store(true, Ordering::SeqCst);
        assert!(cache.refresh().await.is_ok());

        // Next read still serves a usable snapshot without fetching again.
        fetcher.fail.store(false, Ordering::SeqCst);
        let index = cache.get_index().await.unwrap();
        assert!(index.entity("subject").is_some());
    }
}
