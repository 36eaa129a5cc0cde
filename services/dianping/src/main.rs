//! Dianping Service - 点评服务入口

use dianping::DianpingApp;
use hmdp_bootstrap::{Infrastructure, init_runtime, shutdown_signal};
use hmdp_config::AppConfig;
use hmdp_errors::AppError;
use hmdp_telemetry::init_metrics;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let config = AppConfig::load("config")?;
    init_runtime(&config)?;
    let metrics = init_metrics()?;

    let infra = Infrastructure::from_config(config).await?;
    sqlx::migrate!("./migrations")
        .run(&infra.postgres_pool())
        .await
        .map_err(|e| AppError::database(format!("Migration failed: {}", e)))?;

    let health = infra.health_check().await;
    if !health.healthy {
        error!(failing = ?health.failing(), "Dependencies unhealthy at startup");
    }

    let app = DianpingApp::from_infrastructure(&infra)?;
    app.start().await?;
    info!(app_name = %infra.config().app_name, "Dianping service started");

    shutdown_signal().await;

    app.shutdown().await;
    debug!(metrics = %metrics.render(), "Final metrics snapshot");
    Ok(())
}
