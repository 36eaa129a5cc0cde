//! 基础设施资源管理

use std::sync::Arc;

use hmdp_adapter_postgres::{PostgresConfig, create_pool};
use hmdp_adapter_redis::{
    RedisConfig, RedisKeyValueStore, check_connection, create_connection_manager,
};
use hmdp_common::{RetryConfig, with_retry};
use hmdp_config::AppConfig;
use hmdp_errors::{AppError, AppResult};
use hmdp_ports::KeyValueStore;
use hmdp_telemetry::HealthStatus;
use redis::aio::ConnectionManager;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    postgres_pool: PgPool,
    redis_conn: ConnectionManager,
}

impl Infrastructure {
    /// 从配置创建基础设施资源（带重试）
    ///
    /// 只重试 `Unavailable` 类错误，配置错误立即返回
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let retry_config = RetryConfig::default();

        let pg_config = PostgresConfig::new(config.database.url.expose_secret())
            .with_max_connections(config.database.max_connections);
        let postgres_pool = with_retry(
            &retry_config,
            "PostgreSQL connection",
            || {
                let cfg = pg_config.clone();
                async move { create_pool(&cfg).await }
            },
            AppError::is_retryable,
        )
        .await?;

        let redis_config = RedisConfig::new(config.redis.url.expose_secret());
        let redis_conn = with_retry(
            &retry_config,
            "Redis connection",
            || {
                let cfg = redis_config.clone();
                async move { create_connection_manager(&cfg).await }
            },
            AppError::is_retryable,
        )
        .await?;

        info!("Infrastructure ready");
        Ok(Self {
            config,
            postgres_pool,
            redis_conn,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn postgres_pool(&self) -> PgPool {
        self.postgres_pool.clone()
    }

    pub fn redis_connection(&self) -> ConnectionManager {
        self.redis_conn.clone()
    }

    /// Redis 上的共享键值存储
    pub fn key_value_store(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(RedisKeyValueStore::new(self.redis_conn.clone()))
    }

    /// 检查 PostgreSQL 与 Redis 连通性
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new();
        status.record(
            "postgres",
            hmdp_adapter_postgres::check_connection(&self.postgres_pool).await,
        );
        let mut conn = self.redis_conn.clone();
        status.record("redis", check_connection(&mut conn).await);
        status
    }
}
