//! Redis 连接管理

use crate::config::RedisConfig;
use crate::key_value::map_redis_error;
use hmdp_errors::{AppError, AppResult};
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::info;

/// 创建 Redis 连接管理器
pub async fn create_connection_manager(config: &RedisConfig) -> AppResult<ConnectionManager> {
    let client = Client::open(config.url.as_str())
        .map_err(|e| AppError::internal(format!("Failed to create Redis client: {}", e)))?;

    let manager_config = ConnectionManagerConfig::new()
        .set_connection_timeout(config.connection_timeout)
        .set_response_timeout(config.response_timeout);

    let manager = ConnectionManager::new_with_config(client, manager_config)
        .await
        .map_err(|e| map_redis_error("connect", e))?;

    info!(url = %config.redacted_url(), "Redis connection manager created");
    Ok(manager)
}

/// 检查 Redis 连接
pub async fn check_connection(conn: &mut ConnectionManager) -> AppResult<()> {
    redis::cmd("PING")
        .query_async::<String>(conn)
        .await
        .map_err(|e| map_redis_error("ping", e))?;
    Ok(())
}
