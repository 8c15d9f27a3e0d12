//! RSP Approval Service - 服务入口

use std::sync::Arc;

use rsp_adapter_postgres::run_migrations;
use rsp_approval::api::{self, AppState};
use rsp_approval::domain::request::{RoutingMode, TransitionTable};
use rsp_approval::domain::unit_of_work::UnitOfWorkFactory;
use rsp_approval::infrastructure::persistence::{
    InMemoryStore, MIGRATOR, MemoryData, PostgresUnitOfWorkFactory,
};
use rsp_bootstrap::{Infrastructure, run_http};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    run_http("config", |infra: Infrastructure| async move {
        info!("Initializing RSP approval service...");

        let uow_factory: Arc<dyn UnitOfWorkFactory> = match infra.postgres_pool() {
            Some(pool) => {
                if infra.should_run_migrations() {
                    run_migrations(&pool, &MIGRATOR).await?;
                }
                Arc::new(PostgresUnitOfWorkFactory::new(pool))
            }
            None => {
                warn!("No database configured, serving in-memory demo data");
                Arc::new(InMemoryStore::new(MemoryData::demo()))
            }
        };

        let mode = RoutingMode::from_legacy_flag(infra.config().workflow.legacy_cogs_stage);
        info!(?mode, "Approval routing configured");

        Ok(api::router(AppState::new(
            uow_factory,
            TransitionTable::new(mode),
        )))
    })
    .await
}
