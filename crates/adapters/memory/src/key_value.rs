//! 进程内 KeyValueStore 实现

use async_trait::async_trait;
use hmdp_errors::{AppError, AppResult};
use hmdp_ports::{AtomicScript, KeyValueStore, ScriptContext};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Data = HashMap<String, Entry>;

fn wrong_type(key: &str) -> AppError {
    AppError::internal(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
        key
    ))
}

/// 进程内键值存储
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: Mutex<Data>,
    offline: AtomicBool,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储不可达，之后所有操作返回 `AppError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// 剩余 TTL，键不存在或永不过期时返回 None
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut data = self.data.lock();
        let entry = live_entry(&mut data, key, now)?;
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    /// 键是否存在（未过期）
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut data = self.data.lock();
        live_entry(&mut data, key, now).is_some()
    }

    /// 集合成员，键不存在时为空
    pub fn set_members(&self, key: &str) -> Vec<String> {
        let now = Instant::now();
        let mut data = self.data.lock();
        match live_entry(&mut data, key, now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                let mut members: Vec<_> = members.iter().cloned().collect();
                members.sort();
                members
            }
            _ => Vec::new(),
        }
    }

    fn check_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::unavailable("In-memory store is offline"));
        }
        Ok(())
    }
}

/// 取未过期的条目，过期条目顺便清除
fn live_entry<'a>(data: &'a mut Data, key: &str, now: Instant) -> Option<&'a mut Entry> {
    if data.get(key).is_some_and(|entry| entry.is_expired(now)) {
        data.remove(key);
        return None;
    }
    data.get_mut(key)
}

fn read_string(data: &mut Data, key: &str, now: Instant) -> AppResult<Option<String>> {
    match live_entry(data, key, now) {
        None => Ok(None),
        Some(Entry {
            value: Value::Str(value),
            ..
        }) => Ok(Some(value.clone())),
        Some(_) => Err(wrong_type(key)),
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.check_online()?;
        let now = Instant::now();
        read_string(&mut self.data.lock(), key, now)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.check_online()?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.data.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.check_online()?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        self.check_online()?;
        let now = Instant::now();
        if let Some(entry) = live_entry(&mut self.data.lock(), key, now) {
            entry.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        let mut data = self.data.lock();
        if live_entry(&mut data, key, now).is_some() {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn eval_script(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> AppResult<i64> {
        self.check_online()?;
        trace!(script = script.id(), "Evaluating script in memory");
        let mut data = self.data.lock();
        let mut ctx = MemoryScriptContext {
            data: &mut data,
            now: Instant::now(),
        };
        script.run_native(&mut ctx, keys, args)
    }
}

/// 脚本执行期间持有整个存储的独占引用
struct MemoryScriptContext<'a> {
    data: &'a mut Data,
    now: Instant,
}

impl ScriptContext for MemoryScriptContext<'_> {
    fn get(&mut self, key: &str) -> AppResult<Option<String>> {
        read_string(self.data, key, self.now)
    }

    fn set(&mut self, key: &str, value: &str) -> AppResult<()> {
        self.data.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    fn delete(&mut self, key: &str) -> AppResult<bool> {
        let existed = live_entry(self.data, key, self.now).is_some();
        self.data.remove(key);
        Ok(existed)
    }

    fn incr_by(&mut self, key: &str, delta: i64) -> AppResult<i64> {
        let current = match read_string(self.data, key, self.now)? {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                AppError::internal(format!("ERR value is not an integer: {}", key))
            })?,
        };
        let next = current + delta;
        match live_entry(self.data, key, self.now) {
            Some(entry) => entry.value = Value::Str(next.to_string()),
            None => {
                self.data.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Str(next.to_string()),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(next)
    }

    fn set_add(&mut self, key: &str, member: &str) -> AppResult<bool> {
        match live_entry(self.data, key, self.now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.insert(member.to_string())),
            Some(_) => Err(wrong_type(key)),
            None => {
                let mut members = HashSet::new();
                members.insert(member.to_string());
                self.data.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Set(members),
                        expires_at: None,
                    },
                );
                Ok(true)
            }
        }
    }

    fn set_contains(&mut self, key: &str, member: &str) -> AppResult<bool> {
        match live_entry(self.data, key, self.now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.contains(member)),
            Some(_) => Err(wrong_type(key)),
            None => Ok(false),
        }
    }
}
