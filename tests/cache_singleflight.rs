// TTL cache behaviour under concurrency: one producer per key, errors never cached

use feature_orchestrator::cache::TtlCache;
use feature_orchestrator::config::CacheConfig;
use feature_orchestrator::OrchestratorError;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_producer() {
    let cache = Arc::new(TtlCache::new(CacheConfig::default()));
    let runs = Arc::new(AtomicUsize::new(0));

    let callers = (0..16).map(|_| {
        let cache = Arc::clone(&cache);
        let runs = Arc::clone(&runs);
        async move {
            cache
                .with_cache("workload", "agent-pool", move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(vec![3u32, 1, 4])
                })
                .await
        }
    });
    let results = join_all(callers).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap(), vec![3, 1, 4]);
    }
    assert_eq!(cache.stats().producer_invocations, 1);
}

#[tokio::test]
async fn test_distinct_keys_do_not_share() {
    let cache = TtlCache::new(CacheConfig::default());
    let runs = AtomicUsize::new(0);

    let a = cache.with_cache("decomposition", "a.1", || async {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok("a".to_string())
    });
    let b = cache.with_cache("decomposition", "b.1", || async {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok("b".to_string())
    });
    let (a, b) = futures::join!(a, b);

    assert_eq!(a.unwrap(), "a");
    assert_eq!(b.unwrap(), "b");
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_producer_is_retried_next_time() {
    let cache = TtlCache::new(CacheConfig::default());

    let err = cache
        .with_cache::<u32, _, _>("test-results", "suite", || async {
            Err(OrchestratorError::execution("suite", "runner crashed"))
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "cache_producer");
    assert!(err.to_string().contains("runner crashed"));
    assert_eq!(cache.stats().entries, 0);

    let value = cache
        .with_cache("test-results", "suite", || async { Ok(42u32) })
        .await
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(cache.stats().producer_invocations, 2);
}

#[tokio::test]
async fn test_expired_entry_is_recomputed() {
    let cache = TtlCache::new(CacheConfig::default());
    cache.configure_namespace("short", Duration::from_millis(40));

    let first = cache.with_cache("short", "k", || async { Ok(1u8) }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    let second = cache.with_cache("short", "k", || async { Ok(2u8) }).await.unwrap();

    assert_eq!((first, second), (1, 2));
    assert_eq!(cache.stats().hits, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_after_expiry_recompute_once() {
    let cache = Arc::new(TtlCache::new(CacheConfig::default()));
    cache.configure_namespace("test-results", Duration::from_millis(60));
    let runs = Arc::new(AtomicUsize::new(0));

    let first = cache
        .with_cache("test-results", "suite", || async { Ok(1u32) })
        .await
        .unwrap();
    assert_eq!(first, 1);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let callers = (0..8).map(|_| {
        let cache = Arc::clone(&cache);
        let runs = Arc::clone(&runs);
        async move {
            cache
                .with_cache("test-results", "suite", move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(2u32)
                })
                .await
        }
    });
    let results = join_all(callers).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(results.into_iter().all(|r| r.unwrap() == 2));
    assert_eq!(cache.stats().producer_invocations, 2);
}
