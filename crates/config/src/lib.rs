//! hmdp-config - 配置加载库
//!
//! 加载顺序（后者覆盖前者）：
//! 1. `{config_dir}/default.toml`
//! 2. `{config_dir}/{APP_ENV}.toml`
//! 3. `HMDP_` 前缀的环境变量，`__` 分隔层级，例如 `HMDP_SECKILL__QUEUE_CAPACITY`

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

/// 缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_null_ttl_secs")]
    pub null_ttl_secs: u64,
    #[serde(default = "default_jitter_min_secs")]
    pub jitter_min_secs: u64,
    #[serde(default = "default_jitter_max_secs")]
    pub jitter_max_secs: u64,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_lock_retries")]
    pub max_lock_retries: u32,
    #[serde(default = "default_rebuild_workers")]
    pub rebuild_workers: usize,
    /// 店铺缓存 TTL
    #[serde(default = "default_shop_ttl_secs")]
    pub shop_ttl_secs: u64,
    /// 店铺查询策略：pass_through / mutex / logical_expire
    #[serde(default = "default_shop_strategy")]
    pub shop_strategy: String,
    /// 逻辑过期时长
    #[serde(default = "default_logical_ttl_secs")]
    pub logical_ttl_secs: u64,
    /// 启动时预热的热点店铺
    #[serde(default)]
    pub warm_shop_ids: Vec<i64>,
}

fn default_null_ttl_secs() -> u64 {
    120
}

fn default_jitter_min_secs() -> u64 {
    60
}

fn default_jitter_max_secs() -> u64 {
    300
}

fn default_lock_ttl_secs() -> u64 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    50
}

fn default_max_lock_retries() -> u32 {
    200
}

fn default_rebuild_workers() -> usize {
    10
}

fn default_shop_ttl_secs() -> u64 {
    30 * 60
}

fn default_shop_strategy() -> String {
    "mutex".to_string()
}

fn default_logical_ttl_secs() -> u64 {
    20
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            null_ttl_secs: default_null_ttl_secs(),
            jitter_min_secs: default_jitter_min_secs(),
            jitter_max_secs: default_jitter_max_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_lock_retries: default_max_lock_retries(),
            rebuild_workers: default_rebuild_workers(),
            shop_ttl_secs: default_shop_ttl_secs(),
            shop_strategy: default_shop_strategy(),
            logical_ttl_secs: default_logical_ttl_secs(),
            warm_shop_ids: Vec::new(),
        }
    }
}

/// 秒杀配置
#[derive(Debug, Clone, Deserialize)]
pub struct SeckillSettings {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_buyer_lock_ttl_secs")]
    pub buyer_lock_ttl_secs: u64,
    #[serde(default = "default_buyer_lock_attempts")]
    pub buyer_lock_attempts: u32,
    /// 订单号中的节点标识（0..1024）
    #[serde(default)]
    pub node_id: u16,
}

fn default_queue_capacity() -> usize {
    1024 * 1024
}

fn default_worker_count() -> usize {
    1
}

fn default_buyer_lock_ttl_secs() -> u64 {
    10
}

fn default_buyer_lock_attempts() -> u32 {
    3
}

impl Default for SeckillSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            worker_count: default_worker_count(),
            buyer_lock_ttl_secs: default_buyer_lock_ttl_secs(),
            buyer_lock_attempts: default_buyer_lock_attempts(),
            node_id: 0,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub seckill: SeckillSettings,
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("HMDP_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
