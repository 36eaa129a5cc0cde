//! 服务运行时

use hmdp_config::AppConfig;
use hmdp_errors::{AppError, AppResult};
use hmdp_telemetry::{init_tracing, init_tracing_json};
use tracing::{error, info};

/// 初始化服务运行时
///
/// `telemetry.json` 或生产环境使用 JSON 日志
pub fn init_runtime(config: &AppConfig) -> AppResult<()> {
    let level = &config.telemetry.log_level;
    let result = if config.telemetry.json || config.is_production() {
        init_tracing_json(level)
    } else {
        init_tracing(level)
    };
    result.map_err(|e| AppError::internal(e.to_string()))?;

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        "Runtime initialized"
    );
    Ok(())
}

/// 等待关闭信号（Ctrl+C 或 SIGTERM）
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
