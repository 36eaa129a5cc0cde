//! Redis KeyValueStore 实现
//!
//! 脚本通过 EVALSHA 执行，服务端缺少脚本时自动回退到 EVAL

use async_trait::async_trait;
use hmdp_errors::{AppError, AppResult};
use hmdp_ports::{AtomicScript, KeyValueStore};
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Script};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// 将 Redis 错误映射为应用错误
///
/// 连接、超时类错误映射为可重试的 `Unavailable`
pub fn map_redis_error(op: &str, e: RedisError) -> AppError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
    {
        warn!(op = op, error = %e, "Redis unavailable");
        AppError::unavailable(format!("Redis {} failed: {}", op, e))
    } else {
        AppError::internal(format!("Redis {} failed: {}", op, e))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 不接受 0
    (ttl.as_millis() as u64).max(1)
}

/// Redis 键值存储
pub struct RedisKeyValueStore {
    conn: ConnectionManager,
    scripts: Mutex<HashMap<&'static str, Arc<Script>>>,
}

impl RedisKeyValueStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            scripts: Mutex::new(HashMap::new()),
        }
    }

    fn script(&self, script: &AtomicScript) -> Arc<Script> {
        self.scripts
            .lock()
            .entry(script.id())
            .or_insert_with(|| Arc::new(Script::new(script.lua())))
            .clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| map_redis_error("get", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("set", e))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| map_redis_error("del", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| map_redis_error("pexpire", e))?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("set_nx", e))?;

        Ok(result.is_some())
    }

    async fn eval_script(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        let compiled = self.script(script);

        let mut invocation = compiled.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }

        invocation
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| map_redis_error(script.id(), e))
    }
}
