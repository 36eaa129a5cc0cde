//! sqlx 错误映射

use hmdp_errors::AppError;
use tracing::warn;

/// 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";

/// 将 sqlx 错误映射为应用错误
///
/// - 唯一约束冲突 → `Conflict`
/// - 连接池超时、IO 错误 → `Unavailable`（可重试）
/// - 其他 → `Database`
pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::RowNotFound => AppError::not_found("Row not found"),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            AppError::conflict(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            warn!(error = %e, "PostgreSQL unavailable");
            AppError::unavailable(format!("PostgreSQL unavailable: {}", e))
        }
        _ => AppError::database(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_retryable() {
        assert!(map_sqlx_error(sqlx::Error::PoolTimedOut).is_retryable());
    }

    #[test]
    fn test_row_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_protocol_error_is_database() {
        let err = map_sqlx_error(sqlx::Error::Protocol("bad frame".into()));
        assert!(matches!(err, AppError::Database(_)));
        assert!(!err.is_retryable());
    }
}
