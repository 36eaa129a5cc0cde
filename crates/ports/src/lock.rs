//! 分布式锁 trait 定义

use async_trait::async_trait;
use hmdp_errors::AppResult;
use std::time::Duration;

/// 一次成功加锁的凭证
///
/// `token` 在每次加锁时唯一生成，释放时只有值匹配才会删除锁，
/// 防止锁过期后被其他持有者重新获取时误删。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    /// 逻辑锁名（不含存储前缀）
    pub name: String,
    /// 持有者令牌
    pub token: String,
    /// 加锁时使用的 TTL
    pub ttl: Duration,
}

/// 分布式锁 trait
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 尝试加锁，只尝试一次，不阻塞也不重试
    ///
    /// 成功返回 `Some(lease)`，锁已被占用返回 `None`
    async fn try_acquire(&self, name: &str, ttl: Duration) -> AppResult<Option<LockLease>>;

    /// 释放锁
    ///
    /// 返回 `false` 表示锁已不属于该持有者（过期或被他人持有），这不是错误
    async fn release(&self, lease: &LockLease) -> AppResult<bool>;
}
