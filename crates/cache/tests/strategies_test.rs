//! 三种缓存策略的并发行为

use hmdp_adapter_memory::InMemoryKeyValueStore;
use hmdp_cache::{CacheClient, CacheConfig, CacheStrategy, LogicalEntry};
use hmdp_errors::{AppError, AppResult};
use hmdp_lock::StoreDistributedLock;
use hmdp_ports::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const PREFIX: &str = "cache:shop:";
const TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Shop {
    id: i64,
    name: String,
}

fn shop(id: i64, name: &str) -> Shop {
    Shop {
        id,
        name: name.to_string(),
    }
}

fn setup(config: CacheConfig) -> (Arc<InMemoryKeyValueStore>, Arc<CacheClient>) {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let lock = Arc::new(StoreDistributedLock::new(store.clone()));
    let cache = Arc::new(CacheClient::new(store.clone(), lock, config));
    (store, cache)
}

type LoadFuture = Pin<Box<dyn Future<Output = AppResult<Option<Shop>>> + Send>>;

/// 计数的回源函数
fn counting_loader(
    calls: Arc<AtomicUsize>,
    result: Option<Shop>,
    delay: Duration,
) -> impl FnOnce(i64) -> LoadFuture + Send + 'static {
    move |_id| {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(result)
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_pass_through_tombstone_blocks_penetration_until_ttl() {
    let (store, cache) = setup(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache
        .cached_lookup(
            PREFIX,
            404i64,
            counting_loader(calls.clone(), None, Duration::ZERO),
            TTL,
            CacheStrategy::PassThrough,
        )
        .await
        .unwrap();
    assert_eq!(first, None);
    assert_eq!(store.get("cache:shop:404").await.unwrap().as_deref(), Some(""));
    assert_eq!(store.ttl("cache:shop:404"), Some(Duration::from_secs(120)));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .cached_lookup(
                    PREFIX,
                    404i64,
                    counting_loader(calls, None, Duration::ZERO),
                    TTL,
                    CacheStrategy::PassThrough,
                )
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(121)).await;
    cache
        .cached_lookup(
            PREFIX,
            404i64,
            counting_loader(calls.clone(), None, Duration::ZERO),
            TTL,
            CacheStrategy::PassThrough,
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pass_through_applies_ttl_jitter() {
    let (store, cache) = setup(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let value = cache
        .get_with_pass_through(
            PREFIX,
            1i64,
            counting_loader(calls, Some(shop(1, "tea house")), Duration::ZERO),
            TTL,
        )
        .await
        .unwrap();
    assert_eq!(value, Some(shop(1, "tea house")));

    let ttl = store.ttl("cache:shop:1").unwrap();
    assert!(ttl >= TTL + Duration::from_secs(60));
    assert!(ttl <= TTL + Duration::from_secs(300));
}

#[tokio::test]
async fn test_pass_through_propagates_loader_error() {
    let (store, cache) = setup(CacheConfig::default());

    let result: AppResult<Option<Shop>> = cache
        .get_with_pass_through(
            PREFIX,
            7i64,
            |_| async { Err(AppError::database("connection reset")) },
            TTL,
        )
        .await;

    assert!(matches!(result, Err(AppError::Database(_))));
    assert!(!store.contains_key("cache:shop:7"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_mutex_rebuilds_exactly_once_under_concurrent_misses() {
    let (_store, cache) = setup(CacheConfig {
        retry_backoff: Duration::from_millis(10),
        ..CacheConfig::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .cached_lookup(
                    PREFIX,
                    1i64,
                    counting_loader(calls, Some(shop(1, "tea house")), Duration::from_millis(100)),
                    TTL,
                    CacheStrategy::Mutex,
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Some(shop(1, "tea house")));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mutex_gives_up_after_bounded_retries() {
    let (store, cache) = setup(CacheConfig {
        retry_backoff: Duration::from_millis(1),
        max_lock_retries: 3,
        ..CacheConfig::default()
    });
    // 模拟崩溃的持有者留下的锁
    store
        .set_if_absent("lock:cache:shop:1", "crashed-holder", Duration::from_secs(10))
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let result = cache
        .get_with_mutex(
            PREFIX,
            1i64,
            counting_loader(calls.clone(), Some(shop(1, "tea house")), Duration::ZERO),
            TTL,
        )
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, AppError::LockContention(_)));
    assert!(err.is_retryable());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mutex_releases_lock_when_loader_fails() {
    let (store, cache) = setup(CacheConfig::default());

    let result: AppResult<Option<Shop>> = cache
        .get_with_mutex(
            PREFIX,
            9i64,
            |_| async { Err(AppError::unavailable("db down")) },
            TTL,
        )
        .await;

    assert!(result.is_err());
    assert!(!store.contains_key("lock:cache:shop:9"));
}

#[tokio::test]
async fn test_logical_expire_does_not_load_missing_keys() {
    let (_store, cache) = setup(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let value = cache
        .cached_lookup(
            PREFIX,
            1i64,
            counting_loader(calls.clone(), Some(shop(1, "tea house")), Duration::ZERO),
            TTL,
            CacheStrategy::LogicalExpire,
        )
        .await
        .unwrap();

    assert_eq!(value, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_logical_expire_serves_stale_and_rebuilds_once() {
    let (store, cache) = setup(CacheConfig::default());
    cache
        .set_with_logical_expire("cache:shop:1", shop(1, "old name"), Duration::ZERO)
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let loader_delay = Duration::from_millis(500);

    let started = std::time::Instant::now();
    let mut handles = Vec::new();
    for _ in 0..20 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .cached_lookup(
                    PREFIX,
                    1i64,
                    counting_loader(calls, Some(shop(1, "new name")), loader_delay),
                    TTL,
                    CacheStrategy::LogicalExpire,
                )
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Some(shop(1, "old name")));
    }
    assert!(started.elapsed() < loader_delay);

    cache.drain_rebuilds().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!store.contains_key("lock:cache:shop:1"));
    assert_eq!(store.ttl("cache:shop:1"), None);

    let raw = store.get("cache:shop:1").await.unwrap().unwrap();
    let entry: LogicalEntry<Shop> = serde_json::from_str(&raw).unwrap();
    assert_eq!(entry.data, shop(1, "new name"));
    assert!(!entry.is_expired());

    let fresh = cache
        .cached_lookup(
            PREFIX,
            1i64,
            counting_loader(calls.clone(), None, Duration::ZERO),
            TTL,
            CacheStrategy::LogicalExpire,
        )
        .await
        .unwrap();
    assert_eq!(fresh, Some(shop(1, "new name")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_logical_expire_rebuild_failure_keeps_stale_and_releases_lock() {
    let (store, cache) = setup(CacheConfig::default());
    cache
        .set_with_logical_expire("cache:shop:1", shop(1, "old name"), Duration::ZERO)
        .await
        .unwrap();

    let value: Option<Shop> = cache
        .get_with_logical_expire(
            PREFIX,
            1i64,
            |_| async { Err(AppError::database("timeout")) },
            TTL,
        )
        .await
        .unwrap();
    assert_eq!(value, Some(shop(1, "old name")));

    cache.drain_rebuilds().await;
    assert!(!store.contains_key("lock:cache:shop:1"));

    let raw = store.get("cache:shop:1").await.unwrap().unwrap();
    let entry: LogicalEntry<Shop> = serde_json::from_str(&raw).unwrap();
    assert_eq!(entry.data, shop(1, "old name"));
}

#[tokio::test]
async fn test_logical_expire_rebuild_removes_deleted_rows() {
    let (store, cache) = setup(CacheConfig::default());
    cache
        .set_with_logical_expire("cache:shop:1", shop(1, "closed"), Duration::ZERO)
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    cache
        .get_with_logical_expire(
            PREFIX,
            1i64,
            counting_loader(calls, None, Duration::ZERO),
            TTL,
        )
        .await
        .unwrap();
    cache.drain_rebuilds().await;

    assert!(!store.contains_key("cache:shop:1"));
}

#[tokio::test]
async fn test_logical_expire_saturated_pool_serves_stale_without_locking() {
    let (store, cache) = setup(CacheConfig {
        rebuild_workers: 1,
        ..CacheConfig::default()
    });
    for (id, name) in [(1, "first"), (2, "second")] {
        cache
            .set_with_logical_expire(&format!("cache:shop:{}", id), shop(id, name), Duration::ZERO)
            .await
            .unwrap();
    }

    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));

    // 唯一的重建槽位被 key 1 占用
    let first = cache
        .get_with_logical_expire(
            PREFIX,
            1i64,
            counting_loader(first_calls.clone(), Some(shop(1, "first v2")), Duration::from_millis(100)),
            TTL,
        )
        .await
        .unwrap();
    assert_eq!(first, Some(shop(1, "first")));

    let second = cache
        .get_with_logical_expire(
            PREFIX,
            2i64,
            counting_loader(second_calls.clone(), Some(shop(2, "second v2")), Duration::ZERO),
            TTL,
        )
        .await
        .unwrap();
    assert_eq!(second, Some(shop(2, "second")));
    assert!(!store.contains_key("lock:cache:shop:2"));

    cache.drain_rebuilds().await;
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    // 槽位释放后，下一次过期读取会触发重建
    cache
        .get_with_logical_expire(
            PREFIX,
            2i64,
            counting_loader(second_calls.clone(), Some(shop(2, "second v2")), Duration::ZERO),
            TTL,
        )
        .await
        .unwrap();
    cache.drain_rebuilds().await;
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    assert!(!store.contains_key("lock:cache:shop:2"));
}
