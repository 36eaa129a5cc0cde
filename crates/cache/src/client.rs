//! 缓存访问客户端

use crate::config::{CacheConfig, CacheStrategy};
use crate::entry::{Cached, LogicalEntry, TOMBSTONE};
use crate::metrics;
use hmdp_errors::{AppError, AppResult};
use hmdp_lock::run_locked;
use hmdp_ports::{DistributedLock, KeyValueStore, LockLease};
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// 缓存访问客户端
///
/// 重建锁名即缓存键，例如 `cache:shop:1` 的锁存放在 `lock:cache:shop:1`。
pub struct CacheClient {
    store: Arc<dyn KeyValueStore>,
    lock: Arc<dyn DistributedLock>,
    config: CacheConfig,
    rebuild_slots: Arc<Semaphore>,
    rebuilds: TaskTracker,
}

impl CacheClient {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        lock: Arc<dyn DistributedLock>,
        config: CacheConfig,
    ) -> Self {
        let workers = config.rebuild_workers.max(1);
        Self {
            store,
            lock,
            config,
            rebuild_slots: Arc::new(Semaphore::new(workers)),
            rebuilds: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// 写入缓存，带物理 TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> AppResult<()> {
        let payload = serde_json::to_string(value)?;
        self.store.set(key, &payload, Some(ttl)).await
    }

    /// 写入逻辑过期条目，不设物理 TTL
    pub async fn set_with_logical_expire<T: Serialize>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> AppResult<()> {
        write_logical(self.store.as_ref(), key, value, ttl).await
    }

    /// 删除缓存
    pub async fn invalidate(&self, key: &str) -> AppResult<()> {
        self.store.delete(key).await?;
        debug!(key = %key, "Cache invalidated");
        Ok(())
    }

    /// 按策略读取缓存，未命中时通过 `loader` 回源
    pub async fn cached_lookup<T, ID, F, Fut>(
        &self,
        prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
        strategy: CacheStrategy,
    ) -> AppResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        ID: Display + Send + 'static,
        F: FnOnce(ID) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<Option<T>>> + Send + 'static,
    {
        match strategy {
            CacheStrategy::PassThrough => self.get_with_pass_through(prefix, id, loader, ttl).await,
            CacheStrategy::Mutex => self.get_with_mutex(prefix, id, loader, ttl).await,
            CacheStrategy::LogicalExpire => {
                self.get_with_logical_expire(prefix, id, loader, ttl).await
            }
        }
    }

    /// 缓存穿透防护
    ///
    /// 数据源中不存在时写入墓碑，墓碑 TTL 内不再回源。
    pub async fn get_with_pass_through<T, ID, F, Fut>(
        &self,
        prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> AppResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = AppResult<Option<T>>>,
    {
        let key = format!("{}{}", prefix, id);
        if let Some(cached) = self.read_cached(&key, CacheStrategy::PassThrough).await? {
            return Ok(cached);
        }

        let loaded = loader(id).await?;
        self.fill(&key, loaded.as_ref(), ttl).await?;
        Ok(loaded)
    }

    /// 互斥锁防击穿
    ///
    /// 未命中时只有拿到重建锁的调用方回源，其余调用方等待后重新查询缓存。
    /// 超过 `max_lock_retries` 次仍未拿到锁返回 `AppError::LockContention`。
    pub async fn get_with_mutex<T, ID, F, Fut>(
        &self,
        prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> AppResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = AppResult<Option<T>>>,
    {
        let key = format!("{}{}", prefix, id);
        let mut retries = 0u32;

        let lease = loop {
            if let Some(cached) = self.read_cached(&key, CacheStrategy::Mutex).await? {
                return Ok(cached);
            }
            if let Some(lease) = self.lock.try_acquire(&key, self.config.lock_ttl).await? {
                break lease;
            }
            if retries >= self.config.max_lock_retries {
                warn!(key = %key, retries, "Gave up waiting for cache rebuild lock");
                return Err(AppError::lock_contention(format!(
                    "Cache rebuild lock busy: {}",
                    key
                )));
            }
            retries += 1;
            tokio::time::sleep(self.config.retry_backoff).await;
        };

        run_locked(self.lock.as_ref(), lease, async move {
            // 等锁期间其他调用方可能已经重建完成
            if let Some(cached) = self.peek(&key).await? {
                return Ok(cached);
            }
            let loaded = loader(id).await?;
            self.fill(&key, loaded.as_ref(), ttl).await?;
            debug!(key = %key, found = loaded.is_some(), "Cache rebuilt under lock");
            Ok(loaded)
        })
        .await
    }

    /// 逻辑过期防击穿
    ///
    /// 键不存在直接返回 None（要求预热）。过期时最多提交一个异步重建任务，
    /// 当前调用方总是拿到旧值。
    pub async fn get_with_logical_expire<T, ID, F, Fut>(
        &self,
        prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> AppResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        ID: Display + Send + 'static,
        F: FnOnce(ID) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<Option<T>>> + Send + 'static,
    {
        let key = format!("{}{}", prefix, id);
        let strategy = CacheStrategy::LogicalExpire;

        let Some(entry) = self.read_logical::<T>(&key).await? else {
            metrics::record_request(strategy, "miss");
            return Ok(None);
        };

        if !entry.is_expired() {
            metrics::record_request(strategy, "hit");
            return Ok(Some(entry.data));
        }

        metrics::record_request(strategy, "stale");
        metrics::record_stale_served();

        // 先占重建槽位再加锁，池满时不持有锁，避免锁在排队期间过期
        let Ok(permit) = self.rebuild_slots.clone().try_acquire_owned() else {
            debug!(key = %key, "Rebuild pool saturated, serving stale entry");
            return Ok(Some(entry.data));
        };

        let lease = match self.lock.try_acquire(&key, self.config.lock_ttl).await {
            Ok(Some(lease)) => lease,
            Ok(None) => return Ok(Some(entry.data)),
            Err(e) => {
                warn!(key = %key, error = %e, "Rebuild lock unavailable, serving stale entry");
                return Ok(Some(entry.data));
            }
        };

        // 拿到锁后再确认一次，避免刚完成的重建被重复执行
        match self.read_logical::<T>(&key).await {
            Ok(Some(current)) if !current.is_expired() => {
                hmdp_lock::release_quietly(self.lock.as_ref(), &lease).await;
                return Ok(Some(current.data));
            }
            Ok(_) => {}
            Err(e) => {
                hmdp_lock::release_quietly(self.lock.as_ref(), &lease).await;
                warn!(key = %key, error = %e, "Double check failed, serving stale entry");
                return Ok(Some(entry.data));
            }
        }

        self.spawn_rebuild(key, lease, permit, loader(id), ttl);
        Ok(Some(entry.data))
    }

    /// 等待所有已提交的异步重建完成
    pub async fn drain_rebuilds(&self) {
        self.rebuilds.close();
        self.rebuilds.wait().await;
        self.rebuilds.reopen();
    }

    fn spawn_rebuild<T, Fut>(
        &self,
        key: String,
        lease: LockLease,
        permit: OwnedSemaphorePermit,
        load: Fut,
        ttl: Duration,
    ) where
        T: Serialize + Send + 'static,
        Fut: Future<Output = AppResult<Option<T>>> + Send + 'static,
    {
        let store = self.store.clone();
        let lock = self.lock.clone();

        self.rebuilds.spawn(async move {
            let _permit = permit;
            let result = run_locked(lock.as_ref(), lease, async {
                match load.await? {
                    Some(value) => write_logical(store.as_ref(), &key, value, ttl).await,
                    None => store.delete(&key).await,
                }
            })
            .await;

            match result {
                Ok(()) => info!(key = %key, "Logical cache entry rebuilt"),
                Err(e) => {
                    metrics::record_rebuild_failure();
                    error!(key = %key, error = %e, "Logical cache rebuild failed");
                }
            }
        });
    }

    /// 查询缓存并记录指标，未命中返回 None
    async fn read_cached<T: DeserializeOwned>(
        &self,
        key: &str,
        strategy: CacheStrategy,
    ) -> AppResult<Option<Option<T>>> {
        let result = match self.read::<T>(key).await? {
            Cached::Hit(value) => {
                metrics::record_request(strategy, "hit");
                Some(Some(value))
            }
            Cached::Tombstone => {
                metrics::record_request(strategy, "tombstone");
                Some(None)
            }
            Cached::Miss => {
                metrics::record_request(strategy, "miss");
                None
            }
        };
        Ok(result)
    }

    async fn peek<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<Option<T>>> {
        Ok(match self.read::<T>(key).await? {
            Cached::Hit(value) => Some(Some(value)),
            Cached::Tombstone => Some(None),
            Cached::Miss => None,
        })
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> AppResult<Cached<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Cached::Miss);
        };
        if raw == TOMBSTONE {
            return Ok(Cached::Tombstone);
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Cached::Hit(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt cache payload, treating as miss");
                Ok(Cached::Miss)
            }
        }
    }

    async fn read_logical<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> AppResult<Option<LogicalEntry<T>>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt logical cache entry, treating as miss");
                Ok(None)
            }
        }
    }

    /// 回源结果写回缓存：存在时 TTL 加随机抖动，不存在时写墓碑
    async fn fill<T: Serialize>(&self, key: &str, value: Option<&T>, ttl: Duration) -> AppResult<()> {
        match value {
            Some(value) => self.set(key, value, ttl + self.jitter()).await,
            None => {
                self.store
                    .set(key, TOMBSTONE, Some(self.config.null_ttl))
                    .await
            }
        }
    }

    fn jitter(&self) -> Duration {
        let min = self.config.jitter_min.as_millis() as u64;
        let max = self.config.jitter_max.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

async fn write_logical<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: T,
    ttl: Duration,
) -> AppResult<()> {
    let payload = serde_json::to_string(&LogicalEntry::new(value, ttl))?;
    store.set(key, &payload, None).await
}
