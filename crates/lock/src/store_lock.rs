//! 基于 [`KeyValueStore`] 原子原语的分布式锁
//!
//! - 加锁：`SET lock:{name} {token} NX PX {ttl}`
//! - 释放：Lua 脚本比较令牌后删除，令牌不匹配时什么也不做

use async_trait::async_trait;
use hmdp_errors::{AppError, AppResult};
use hmdp_ports::{AtomicScript, DistributedLock, KeyValueStore, LockLease, ScriptContext};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const UNLOCK_LUA: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

fn unlock_native(ctx: &mut dyn ScriptContext, keys: &[&str], args: &[&str]) -> AppResult<i64> {
    let key = keys
        .first()
        .ok_or_else(|| AppError::internal("unlock script requires one key"))?;
    let token = args
        .first()
        .ok_or_else(|| AppError::internal("unlock script requires the owner token"))?;

    if ctx.get(key)?.as_deref() == Some(*token) {
        Ok(ctx.delete(key)? as i64)
    } else {
        Ok(0)
    }
}

/// 比较令牌并删除锁的脚本
pub const UNLOCK_SCRIPT: AtomicScript = AtomicScript::new("unlock", UNLOCK_LUA, unlock_native);

/// 进程标识，进程生命周期内不变
fn process_id() -> &'static str {
    static PROCESS_ID: OnceLock<String> = OnceLock::new();
    PROCESS_ID.get_or_init(|| Uuid::new_v4().simple().to_string())
}

/// 生成持有者令牌：进程标识 + 线程标识 + 随机部分
///
/// 同一逻辑锁名在同一进程的不同任务间也不会产生相同令牌。
pub fn new_owner_token() -> String {
    let thread = format!("{:?}", std::thread::current().id());
    let thread: String = thread.chars().filter(char::is_ascii_digit).collect();
    format!("{}-{}-{}", process_id(), thread, Uuid::new_v4().simple())
}

/// 分布式锁实现
pub struct StoreDistributedLock {
    store: Arc<dyn KeyValueStore>,
    lock_prefix: String,
}

impl StoreDistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock_prefix: "lock:".to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    /// 锁在存储中的实际键
    pub fn lock_key(&self, name: &str) -> String {
        format!("{}{}", self.lock_prefix, name)
    }
}

#[async_trait]
impl DistributedLock for StoreDistributedLock {
    async fn try_acquire(&self, name: &str, ttl: Duration) -> AppResult<Option<LockLease>> {
        let token = new_owner_token();
        let acquired = self
            .store
            .set_if_absent(&self.lock_key(name), &token, ttl)
            .await?;

        if !acquired {
            debug!(lock = %name, "Lock is held by another owner");
            return Ok(None);
        }

        debug!(lock = %name, ttl_ms = ttl.as_millis() as u64, "Lock acquired");
        Ok(Some(LockLease {
            name: name.to_string(),
            token,
            ttl,
        }))
    }

    async fn release(&self, lease: &LockLease) -> AppResult<bool> {
        let key = self.lock_key(&lease.name);
        let deleted = self
            .store
            .eval_script(&UNLOCK_SCRIPT, &[key.as_str()], &[lease.token.as_str()])
            .await?;

        if deleted == 0 {
            warn!(
                lock = %lease.name,
                "Lock was no longer held by this owner at release (expired or re-acquired)"
            );
            return Ok(false);
        }

        debug!(lock = %lease.name, "Lock released");
        Ok(true)
    }
}
