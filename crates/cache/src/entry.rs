//! 缓存条目

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 墓碑：确认数据源中不存在
pub(crate) const TOMBSTONE: &str = "";

/// 带逻辑过期时间的缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalEntry<T> {
    pub data: T,
    pub expire_time: DateTime<Utc>,
}

impl<T> LogicalEntry<T> {
    /// 从当前时间起 `ttl` 后逻辑过期
    pub fn new(data: T, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expire_time = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { data, expire_time }
    }

    pub fn is_expired(&self) -> bool {
        self.expire_time <= Utc::now()
    }
}

/// 一次缓存读取的结果
#[derive(Debug)]
pub(crate) enum Cached<T> {
    Hit(T),
    Tombstone,
    Miss,
}
