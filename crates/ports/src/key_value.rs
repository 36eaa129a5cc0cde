//! 键值存储 trait 定义

use async_trait::async_trait;
use hmdp_errors::AppResult;
use std::fmt;
use std::time::Duration;

/// 共享键值存储（Redis 或进程内实现）
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 获取字符串值
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 设置字符串值，`ttl` 为 None 时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// 删除键
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// 设置过期时间
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;

    /// 键不存在时写入（SET NX PX），返回是否写入成功
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool>;

    /// 原子执行脚本，执行期间不会与其他调用方对相同键的操作交错
    async fn eval_script(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> AppResult<i64>;
}

/// 脚本在进程内存储上的等价实现
pub type NativeScript = fn(&mut dyn ScriptContext, &[&str], &[&str]) -> AppResult<i64>;

/// 原子脚本
///
/// 同一段逻辑的两种表达：Redis 通过 Lua 执行，进程内存储在持有全局锁的
/// 情况下调用 `native`。两者必须保持语义一致。
#[derive(Clone, Copy)]
pub struct AtomicScript {
    id: &'static str,
    lua: &'static str,
    native: NativeScript,
}

impl AtomicScript {
    pub const fn new(id: &'static str, lua: &'static str, native: NativeScript) -> Self {
        Self { id, lua, native }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn lua(&self) -> &'static str {
        self.lua
    }

    /// 在给定上下文中执行原生实现
    pub fn run_native(
        &self,
        ctx: &mut dyn ScriptContext,
        keys: &[&str],
        args: &[&str],
    ) -> AppResult<i64> {
        (self.native)(ctx, keys, args)
    }
}

impl fmt::Debug for AtomicScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicScript").field("id", &self.id).finish()
    }
}

/// 脚本执行上下文，对应 Lua 中可用的 `redis.call` 子集
pub trait ScriptContext {
    /// GET
    fn get(&mut self, key: &str) -> AppResult<Option<String>>;

    /// SET（保留已有 TTL 语义不做要求）
    fn set(&mut self, key: &str, value: &str) -> AppResult<()>;

    /// DEL，返回是否删除了键
    fn delete(&mut self, key: &str) -> AppResult<bool>;

    /// INCRBY，键不存在时视为 0
    fn incr_by(&mut self, key: &str, delta: i64) -> AppResult<i64>;

    /// SADD，返回是否新增
    fn set_add(&mut self, key: &str, member: &str) -> AppResult<bool>;

    /// SISMEMBER
    fn set_contains(&mut self, key: &str, member: &str) -> AppResult<bool>;
}
