//! 基础设施资源管理
//!
//! 统一管理服务共享的基础设施资源

use metrics_exporter_prometheus::PrometheusHandle;
use rsp_adapter_postgres::{PostgresConfig, create_pool};
use rsp_config::{AppConfig, StorageBackend};
use rsp_errors::{AppError, AppResult};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

use crate::retry::{RetryConfig, with_retry};

/// 基础设施资源容器
///
/// 由 bootstrap 统一初始化，然后交给服务构建自己的路由
#[derive(Clone)]
pub struct Infrastructure {
    /// 应用配置
    config: AppConfig,
    /// PostgreSQL 连接池（内存存储模式下为空）
    postgres_pool: Option<PgPool>,
    /// Prometheus 指标句柄
    metrics_handle: Option<PrometheusHandle>,
}

impl Infrastructure {
    /// 从配置创建基础设施资源（带重试）
    pub async fn from_config(
        config: AppConfig,
        metrics_handle: Option<PrometheusHandle>,
    ) -> AppResult<Self> {
        let postgres_pool = match config.storage {
            StorageBackend::Postgres => {
                let database = config.database.as_ref().ok_or_else(|| {
                    AppError::internal("storage = postgres but no database configured")
                })?;

                let retry_config = RetryConfig::default();
                let pg_config = PostgresConfig::new(database.url.expose_secret())
                    .with_max_connections(database.max_connections)
                    .with_application_name(&config.app_name);
                let pool = with_retry(&retry_config, "PostgreSQL connection", || {
                    let cfg = pg_config.clone();
                    async move { create_pool(&cfg).await }
                })
                .await?;
                info!(
                    "PostgreSQL connection pool created (max_connections: {})",
                    database.max_connections
                );
                Some(pool)
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage, no database connection");
                None
            }
        };

        Ok(Self {
            config,
            postgres_pool,
            metrics_handle,
        })
    }

    /// 获取应用配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取 PostgreSQL 连接池
    pub fn postgres_pool(&self) -> Option<PgPool> {
        self.postgres_pool.clone()
    }

    /// 获取 Prometheus 指标句柄
    pub fn metrics_handle(&self) -> Option<PrometheusHandle> {
        self.metrics_handle.clone()
    }

    /// 启动时是否需要执行迁移
    pub fn should_run_migrations(&self) -> bool {
        self.postgres_pool.is_some()
            && self
                .config
                .database
                .as_ref()
                .is_some_and(|db| db.run_migrations)
    }
}
