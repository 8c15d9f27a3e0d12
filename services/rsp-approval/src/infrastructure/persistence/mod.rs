//! 持久化实现
//!
//! PostgreSQL 事务仓储与进程内存储共享同一组领域接口。

mod memory;
mod postgres_unit_of_work;
mod rows;
mod tx_repositories;

pub use memory::*;
pub use postgres_unit_of_work::*;
pub use tx_repositories::SharedTx;

/// 内置迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
