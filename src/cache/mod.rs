//! Namespaced TTL cache
//!
//! Each namespace is its own `moka` cache with the namespace TTL. Concurrent
//! misses for one key share a single producer run.

pub mod entry;

pub use entry::{CacheEntry, EntryInfo};

use moka::future::Cache;
use moka::ops::compute::Op;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub approx_total_size_bytes: usize,
    pub producer_invocations: u64,
}

#[derive(Clone)]
struct Namespace {
    cache: Cache<String, Arc<CacheEntry>>,
    ttl: Duration,
}

impl Namespace {
    fn build(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    fn live_entries(&self) -> impl Iterator<Item = Arc<CacheEntry>> + '_ {
        self.cache
            .iter()
            .map(|(_, entry)| entry)
            .filter(|entry| !entry.is_expired())
    }
}

pub struct TtlCache {
    config: CacheConfig,
    namespaces: RwLock<HashMap<String, Namespace>>,
    hits: AtomicU64,
    misses: AtomicU64,
    producer_invocations: AtomicU64,
}

impl TtlCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            namespaces: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            producer_invocations: AtomicU64::new(0),
        }
    }

    /// Override a namespace TTL; existing entries in it are dropped
    pub fn configure_namespace(&self, namespace: &str, ttl: Duration) {
        let fresh = Namespace::build(ttl, self.config.max_capacity);
        if let Some(old) = self.namespaces.write().insert(namespace.to_string(), fresh) {
            old.cache.invalidate_all();
        }
    }

    fn namespace(&self, namespace: &str) -> Namespace {
        if let Some(ns) = self.namespaces.read().get(namespace) {
            return ns.clone();
        }
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_insert_with(|| {
                Namespace::build(self.config.ttl_for(namespace), self.config.max_capacity)
            })
            .clone()
    }

    /// Return the live value for `(namespace, key)` or compute, store and return it
    ///
    /// Concurrent callers missing on the same key wait for the first producer
    /// instead of running their own. A producer error reaches every waiting
    /// caller and nothing is stored.
    pub async fn with_cache<T, F, Fut>(&self, namespace: &str, key: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let ns = self.namespace(namespace);

        if let Some(entry) = ns.cache.get(key).await {
            if !entry.is_expired() {
                let hits = entry.record_hit();
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(namespace, key, hits, "Cache hit");
                return Ok(serde_json::from_value(entry.value.clone())?);
            }
            // Only drop the entry we saw; a concurrent caller may already have replaced it
            ns.cache
                .entry(key.to_string())
                .and_compute_with(|current| {
                    let op = match current {
                        Some(current) if Arc::ptr_eq(current.value(), &entry) => Op::Remove,
                        _ => Op::Nop,
                    };
                    std::future::ready(op)
                })
                .await;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(namespace, key, "Cache miss");

        let ttl = ns.ttl;
        let entry = ns
            .cache
            .try_get_with(key.to_string(), async move {
                self.producer_invocations.fetch_add(1, Ordering::Relaxed);
                let value = producer().await?;
                let json = serde_json::to_value(&value)?;
                Ok::<_, OrchestratorError>(Arc::new(CacheEntry::new(namespace, key, json, ttl)))
            })
            .await
            .map_err(|e: Arc<OrchestratorError>| OrchestratorError::CacheProducer {
                namespace: namespace.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(serde_json::from_value(entry.value.clone())?)
    }

    pub async fn invalidate(&self, namespace: &str, key: &str) {
        let existing = self.namespaces.read().get(namespace).cloned();
        if let Some(ns) = existing {
            ns.cache.invalidate(key).await;
            debug!(namespace, key, "Cache entry invalidated");
        }
    }

    /// Drop every entry in a namespace
    pub fn invalidate_type(&self, namespace: &str) {
        let mut namespaces = self.namespaces.write();
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.cache.invalidate_all();
            *ns = Namespace::build(ns.ttl, self.config.max_capacity);
            info!(namespace, "Cache namespace cleared");
        }
    }

    /// Drop every entry everywhere; counters are kept
    pub fn clear(&self) {
        let mut namespaces = self.namespaces.write();
        for ns in namespaces.values_mut() {
            ns.cache.invalidate_all();
            *ns = Namespace::build(ns.ttl, self.config.max_capacity);
        }
        info!("Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let (entries, approx_total_size_bytes) = self
            .namespaces
            .read()
            .values()
            .flat_map(|ns| ns.live_entries().collect::<Vec<_>>())
            .fold((0, 0), |(count, size), entry| (count + 1, size + entry.size_bytes));

        CacheStats {
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            entries,
            approx_total_size_bytes,
            producer_invocations: self.producer_invocations.load(Ordering::Relaxed),
        }
    }

    pub fn entry_info(&self, namespace: &str, key: &str) -> Option<EntryInfo> {
        let ns = self.namespaces.read().get(namespace).cloned()?;
        let info = ns
            .live_entries()
            .find(|entry| entry.key == key)
            .map(|entry| entry.info());
        info
    }

    /// Namespaces created so far, with their TTLs
    pub fn namespaces(&self) -> Vec<(String, Duration)> {
        let mut names: Vec<(String, Duration)> = self
            .namespaces
            .read()
            .iter()
            .map(|(name, ns)| (name.clone(), ns.ttl))
            .collect();
        names.sort();
        names
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            hit_rate = stats.hit_rate,
            entries = stats.entries,
            size_bytes = stats.approx_total_size_bytes,
            "Cache statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TtlCache {
        TtlCache::new(CacheConfig::default())
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_hit() {
        let cache = cache();
        let first: u32 = cache.with_cache("capabilities", "ai", || async { Ok(3) }).await.unwrap();
        let second: u32 = cache
            .with_cache("capabilities", "ai", || async { Ok(99) })
            .await
            .unwrap();

        assert_eq!(first, 3);
        assert_eq!(second, 3);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.producer_invocations, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(cache.entry_info("capabilities", "ai").unwrap().hit_count, 1);
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let cache = cache();
        let err = cache
            .with_cache::<u32, _, _>("workload", "all", || async {
                Err(OrchestratorError::validation("registry offline"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "cache_producer");
        assert!(err.to_string().contains("registry offline"));

        let value: u32 = cache.with_cache("workload", "all", || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(cache.stats().producer_invocations, 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed_once() {
        let cache = cache();
        cache.configure_namespace("test-results", Duration::from_millis(50));

        let _: u32 = cache.with_cache("test-results", "k", || async { Ok(1) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        let value: u32 = cache.with_cache("test-results", "k", || async { Ok(2) }).await.unwrap();
        let again: u32 = cache.with_cache("test-results", "k", || async { Ok(3) }).await.unwrap();

        assert_eq!(value, 2);
        assert_eq!(again, 2);
        assert_eq!(cache.stats().producer_invocations, 2);
    }

    #[tokio::test]
    async fn test_invalidation() {
        let cache = cache();
        for key in ["a", "b"] {
            let _: String = cache
                .with_cache("decomposition", key, || async move { Ok(key.to_string()) })
                .await
                .unwrap();
        }
        let _: u8 = cache.with_cache("capabilities", "x", || async { Ok(1) }).await.unwrap();

        cache.invalidate("decomposition", "a").await;
        assert!(cache.entry_info("decomposition", "a").is_none());
        assert!(cache.entry_info("decomposition", "b").is_some());

        cache.invalidate_type("decomposition");
        assert!(cache.entry_info("decomposition", "b").is_none());
        assert!(cache.entry_info("capabilities", "x").is_some());

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_entry_info_reports_hits_and_ttl() {
        let cache = cache();
        assert!(cache.entry_info("capabilities", "missing").is_none());

        let _: u8 = cache.with_cache("capabilities", "ui", || async { Ok(1) }).await.unwrap();
        let _: u8 = cache.with_cache("capabilities", "ui", || async { Ok(1) }).await.unwrap();

        let info = cache.entry_info("capabilities", "ui").unwrap();
        assert_eq!(info.namespace, "capabilities");
        assert_eq!(info.hit_count, 1);
        assert_eq!(info.ttl_ms, 86_400_000);
    }

    #[test]
    fn test_unknown_namespace_uses_default_ttl() {
        let cache = cache();
        let _ = cache.namespace("adhoc");
        let _ = cache.namespace("workload");
        assert_eq!(
            cache.namespaces(),
            vec![
                ("adhoc".to_string(), Duration::from_secs(300)),
                ("workload".to_string(), Duration::from_secs(5)),
            ]
        );
    }
}
