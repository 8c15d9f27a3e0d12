//! HTTP 接口

pub mod actor;
pub mod dto;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};

use crate::application::{PricingService, RequestQueryHandler, WorkflowHandler};
use crate::domain::request::TransitionTable;
use crate::domain::unit_of_work::UnitOfWorkFactory;

pub use actor::CurrentActor;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<WorkflowHandler>,
    pub queries: Arc<RequestQueryHandler>,
    pub pricing: Arc<PricingService>,
}

impl AppState {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>, table: TransitionTable) -> Self {
        Self {
            workflow: Arc::new(WorkflowHandler::new(uow_factory.clone(), table)),
            queries: Arc::new(RequestQueryHandler::new(uow_factory.clone())),
            pricing: Arc::new(PricingService::new(uow_factory)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    use handlers::*;

    let requests = Router::new()
        .route("/", get(list_all).post(submit))
        .route("/inbox", get(inbox))
        .route("/mine", get(mine))
        .route("/{id}", get(get_request))
        .route("/{id}/tts/approve", post(approve_tts))
        .route("/{id}/tts/reject", post(reject_tts))
        .route("/{id}/tts/counter-proposal", post(counter_propose_tts))
        .route("/{id}/tts/accept", post(accept_counter_proposal))
        .route("/{id}/rsp", post(revise_rsp))
        .route("/{id}/cogs/approve", post(approve_cogs))
        .route("/{id}/cogs/reject", post(reject_cogs))
        .route("/{id}/pre-final/approve", post(approve_pre_final))
        .route("/{id}/pre-final/reject", post(reject_pre_final))
        .route("/{id}/final/approve", post(approve_final))
        .route("/{id}/final/reject", post(reject_final))
        .route("/{id}/close", post(close));

    let api = Router::new()
        .route("/skus", get(list_skus))
        .route("/skus/{sku}/countries/{country}", get(get_sku_inputs))
        .route("/pricing/calculate", post(calculate))
        .route("/pricing/preview", post(preview))
        .route("/currency-rates/{country}", put(update_currency_rate))
        .nest("/requests", requests);

    Router::new().nest("/api/v1", api).with_state(state)
}
