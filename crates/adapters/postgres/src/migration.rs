//! PostgreSQL 迁移管理模块

use rsp_errors::{AppError, AppResult};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

/// 执行服务内嵌的迁移
///
/// 迁移由各服务通过 `sqlx::migrate!` 编译期嵌入，这里只负责执行和记录日志
pub async fn run_migrations(pool: &PgPool, migrator: &Migrator) -> AppResult<()> {
    let pending = migrator.iter().count();
    info!(migrations = pending, "Applying database migrations");

    migrator
        .run(pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to run migrations: {}", e)))?;

    info!("Database migrations applied");
    Ok(())
}
