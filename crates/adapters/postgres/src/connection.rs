//! PostgreSQL 连接管理

use std::time::Duration;

use rsp_errors::{AppError, AppResult};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::debug;

/// 连接池参数
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// 写入 `pg_stat_activity.application_name`
    pub application_name: Option<String>,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            application_name: None,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }
}

/// 创建连接池，建立首个连接失败即返回错误
pub async fn create_pool(config: &PostgresConfig) -> AppResult<PgPool> {
    let mut options: PgConnectOptions = config
        .url
        .parse()
        .map_err(|e| AppError::database(format!("Invalid database url: {}", e)))?;
    if let Some(name) = &config.application_name {
        options = options.application_name(name);
    }

    debug!(max_connections = config.max_connections, "Connecting to PostgreSQL");

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database(format!("Failed to create pool: {}", e)))
}

/// 就绪检查
pub async fn check_connection(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::database(format!("Database health check failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_clamps_pool_size() {
        let config = PostgresConfig::new("postgres://localhost/rsp")
            .with_max_connections(0)
            .with_application_name("rsp-approval");
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.application_name.as_deref(), Some("rsp-approval"));
    }
}
