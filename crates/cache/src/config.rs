//! 缓存配置

use hmdp_errors::AppError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 缓存读取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// 未命中时直接回源，不存在的数据写入墓碑
    PassThrough,
    /// 未命中时通过分布式锁保证只有一个调用方回源
    Mutex,
    /// 数据永不物理过期，逻辑过期后返回旧值并异步重建
    LogicalExpire,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Mutex => "mutex",
            Self::LogicalExpire => "logical_expire",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pass_through" => Ok(Self::PassThrough),
            "mutex" => Ok(Self::Mutex),
            "logical_expire" => Ok(Self::LogicalExpire),
            other => Err(AppError::validation(format!(
                "Unknown cache strategy: {}",
                other
            ))),
        }
    }
}

/// 缓存访问层配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// 墓碑 TTL
    pub null_ttl: Duration,
    /// TTL 抖动下限
    pub jitter_min: Duration,
    /// TTL 抖动上限
    pub jitter_max: Duration,
    /// 重建锁 TTL
    pub lock_ttl: Duration,
    /// 互斥策略加锁失败后的等待时间
    pub retry_backoff: Duration,
    /// 互斥策略最大重试次数
    pub max_lock_retries: u32,
    /// 逻辑过期重建并发上限
    pub rebuild_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            null_ttl: Duration::from_secs(2 * 60),
            jitter_min: Duration::from_secs(60),
            jitter_max: Duration::from_secs(5 * 60),
            lock_ttl: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(50),
            max_lock_retries: 200,
            rebuild_workers: 10,
        }
    }
}
