//! hmdp-telemetry - 日志与指标

use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    #[error("Failed to install Prometheus recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 初始化 tracing
pub fn init_tracing(log_level: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()?;
    Ok(())
}

/// 初始化 Prometheus metrics
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// 注册指标说明
pub fn describe_metrics() {
    describe_counter!(
        "cache_requests_total",
        Unit::Count,
        "Cache lookups by strategy and result"
    );
    describe_counter!(
        "cache_stale_served_total",
        Unit::Count,
        "Logically expired entries returned while a rebuild runs"
    );
    describe_counter!(
        "cache_rebuild_failures_total",
        Unit::Count,
        "Asynchronous cache rebuilds that failed"
    );
    describe_counter!(
        "seckill_reservations_total",
        Unit::Count,
        "Seckill purchase attempts by outcome"
    );
    describe_counter!(
        "seckill_orders_total",
        Unit::Count,
        "Queued seckill orders by persistence outcome"
    );
    describe_counter!(
        "seckill_persistence_divergence_total",
        Unit::Count,
        "Reserved orders the durable store refused (cache and database stock diverged)"
    );
}

/// 健康检查状态
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            healthy: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, name: impl Into<String>, healthy: bool, message: Option<String>) {
        if !healthy {
            self.healthy = false;
        }
        self.checks.push(HealthCheck {
            name: name.into(),
            healthy,
            message,
        });
    }

    /// 记录一次检查结果，错误信息作为 message
    pub fn record<E: std::fmt::Display>(&mut self, name: impl Into<String>, result: Result<(), E>) {
        match result {
            Ok(()) => self.add_check(name, true, None),
            Err(e) => self.add_check(name, false, Some(e.to_string())),
        }
    }

    /// 失败检查的名称
    pub fn failing(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|check| !check.healthy)
            .map(|check| check.name.as_str())
            .collect()
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_aggregates() {
        let mut status = HealthStatus::new();
        status.record::<String>("postgres", Ok(()));
        assert!(status.healthy);

        status.record("redis", Err("connection refused"));
        assert!(!status.healthy);
        assert_eq!(status.failing(), vec!["redis"]);
        assert_eq!(
            status.checks[1].message.as_deref(),
            Some("connection refused")
        );
    }

    #[test]
    fn test_second_tracing_init_fails() {
        let _ = init_tracing("debug");
        assert!(init_tracing("debug").is_err());
    }
}
