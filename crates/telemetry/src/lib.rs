//! telemetry - 可观测性库

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 初始化 Prometheus metrics
///
/// 返回的 handle 用于在 `/metrics` 端点渲染指标
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// 记录一次审批流转
pub fn record_transition(action: &'static str, outcome: &'static str) {
    metrics::counter!(
        "rsp_approval_transitions_total",
        "action" => action,
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录一次价格计算
pub fn record_calculation(kind: &'static str, outcome: &'static str) {
    metrics::counter!(
        "rsp_pricing_calculations_total",
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}
