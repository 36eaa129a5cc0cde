//! 将加载的配置转换为各组件的运行参数

use hmdp_cache::{CacheConfig, CacheStrategy};
use hmdp_common::ShopId;
use hmdp_config::{CacheSettings, SeckillSettings};
use hmdp_errors::{AppError, AppResult};
use std::time::Duration;

use crate::voucher::PipelineConfig;

/// 商铺查询参数
#[derive(Debug, Clone)]
pub struct ShopSettings {
    pub strategy: CacheStrategy,
    pub ttl: Duration,
    pub logical_ttl: Duration,
    pub warm_ids: Vec<ShopId>,
}

pub fn cache_config(settings: &CacheSettings) -> AppResult<CacheConfig> {
    if settings.jitter_min_secs > settings.jitter_max_secs {
        return Err(AppError::validation(format!(
            "cache.jitter_min_secs ({}) exceeds cache.jitter_max_secs ({})",
            settings.jitter_min_secs, settings.jitter_max_secs
        )));
    }

    Ok(CacheConfig {
        null_ttl: Duration::from_secs(settings.null_ttl_secs),
        jitter_min: Duration::from_secs(settings.jitter_min_secs),
        jitter_max: Duration::from_secs(settings.jitter_max_secs),
        lock_ttl: Duration::from_secs(settings.lock_ttl_secs),
        retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        max_lock_retries: settings.max_lock_retries,
        rebuild_workers: settings.rebuild_workers.max(1),
    })
}

pub fn shop_settings(settings: &CacheSettings) -> AppResult<ShopSettings> {
    Ok(ShopSettings {
        strategy: settings.shop_strategy.parse()?,
        ttl: Duration::from_secs(settings.shop_ttl_secs),
        logical_ttl: Duration::from_secs(settings.logical_ttl_secs),
        warm_ids: settings.warm_shop_ids.iter().copied().map(ShopId::new).collect(),
    })
}

pub fn pipeline_config(settings: &SeckillSettings) -> AppResult<PipelineConfig> {
    if settings.queue_capacity == 0 {
        return Err(AppError::validation("seckill.queue_capacity must be positive"));
    }

    Ok(PipelineConfig {
        queue_capacity: settings.queue_capacity,
        worker_count: settings.worker_count.max(1),
        buyer_lock_ttl: Duration::from_secs(settings.buyer_lock_ttl_secs),
        buyer_lock_attempts: settings.buyer_lock_attempts.max(1),
        node_id: settings.node_id,
        ..PipelineConfig::default()
    })
}
