//! 服务启动器
//!
//! 封装配置加载、日志初始化、基础设施构建和 HTTP 服务启动

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use rsp_config::AppConfig;
use rsp_errors::AppResult;
use rsp_telemetry::init_metrics;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{Infrastructure, health_router, init_runtime, shutdown_signal};

/// 启动 HTTP 服务
///
/// `app_builder` 接收初始化好的基础设施，返回服务自己的业务路由；
/// 健康检查与指标端点由这里统一挂载。
pub async fn run_http<F, Fut>(
    config_dir: &str,
    app_builder: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(Infrastructure) -> Fut,
    Fut: Future<Output = AppResult<Router>>,
{
    dotenvy::dotenv().ok();

    // 1. 加载配置
    let config = AppConfig::load(config_dir)?;

    // 2. 初始化运行时（日志）
    init_runtime(&config);
    info!("Starting {} service", config.app_name);

    // 3. 初始化指标导出
    let metrics_handle = if config.telemetry.metrics_enabled {
        match init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
                None
            }
        }
    } else {
        None
    };

    // 4. 初始化基础设施
    let infra = Infrastructure::from_config(config.clone(), metrics_handle).await?;
    let health = health_router(&infra);

    // 5. 构建业务路由
    let app = app_builder(infra)
        .await?
        .merge(health)
        .layer(TraceLayer::new_for_http());

    // 6. 启动服务器
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Service stopped");
    Ok(())
}
