//! HTTP 处理函数

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use rsp_common::PagedResult;
use rsp_errors::{AppError, AppResult};
use uuid::Uuid;

use super::AppState;
use super::actor::CurrentActor;
use super::dto::*;
use crate::application::{
    ChangeTtsCommand, PricingPreview, ReviseRspCommand, SkuPricingView, SubmitRequestCommand,
    TransitionCommand, UpdateCurrencyRateCommand,
};
use crate::domain::pricing::PricingResult;
use crate::domain::request::{Actor, ApprovalRequest, ApprovalRequestId, RequestState};
use crate::error::ServiceResult;

fn respond(
    state: &AppState,
    actor: &Actor,
    result: ServiceResult<ApprovalRequest>,
) -> AppResult<Json<RequestResponse>> {
    let request = result?;
    Ok(Json(RequestResponse::new(
        request,
        state.workflow.table(),
        actor.role,
    )))
}

fn respond_page(
    state: &AppState,
    actor: &Actor,
    result: ServiceResult<PagedResult<ApprovalRequest>>,
) -> AppResult<Json<PagedResult<RequestResponse>>> {
    let page = result?;
    let table = state.workflow.table();
    Ok(Json(
        page.map(|request| RequestResponse::new(request, table, actor.role)),
    ))
}

pub async fn list_skus(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.pricing.list_skus().await?))
}

pub async fn get_sku_inputs(
    State(state): State<AppState>,
    Path((sku, country)): Path<(String, String)>,
) -> AppResult<Json<SkuPricingView>> {
    Ok(Json(state.pricing.sku_inputs(&sku, &country).await?))
}

pub async fn calculate(
    State(state): State<AppState>,
    Json(body): Json<CalculateRequest>,
) -> AppResult<Json<PricingResult>> {
    Ok(Json(state.pricing.calculate(&body.inputs, body.rsp)?))
}

pub async fn preview(
    State(state): State<AppState>,
    Json(body): Json<PreviewRequest>,
) -> AppResult<Json<PricingPreview>> {
    let preview = state
        .pricing
        .preview(&body.sku_code, &body.country, body.rsp, body.tts_percentage)
        .await?;
    Ok(Json(preview))
}

pub async fn submit(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<SubmitRequest>,
) -> AppResult<(StatusCode, Json<RequestResponse>)> {
    let result = state
        .workflow
        .submit(SubmitRequestCommand {
            actor: actor.clone(),
            sku_code: body.sku_code,
            country: body.country,
            rsp: body.rsp,
            tts_percentage: body.tts_percentage,
        })
        .await;
    Ok((StatusCode::CREATED, respond(&state, &actor, result)?))
}

pub async fn get_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequestResponse>> {
    let result = state.queries.get(&ApprovalRequestId(id)).await;
    respond(&state, &actor, result)
}

pub async fn inbox(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PagedResult<RequestResponse>>> {
    let result = state.queries.inbox(&actor, &query.pagination()).await;
    respond_page(&state, &actor, result)
}

pub async fn mine(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PagedResult<RequestResponse>>> {
    let result = state.queries.mine(&actor, &query.pagination()).await;
    respond_page(&state, &actor, result)
}

pub async fn list_all(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PagedResult<RequestResponse>>> {
    let filter = query
        .status
        .as_deref()
        .map(RequestState::from_name)
        .transpose()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let result = state
        .queries
        .list_all(&actor, filter, &query.pagination())
        .await;
    respond_page(&state, &actor, result)
}

/// 无请求体的流转动作
macro_rules! transition_handler {
    ($($name:ident),+ $(,)?) => {
        $(
            pub async fn $name(
                State(state): State<AppState>,
                CurrentActor(actor): CurrentActor,
                Path(id): Path<Uuid>,
            ) -> AppResult<Json<RequestResponse>> {
                let cmd = TransitionCommand::new(actor.clone(), ApprovalRequestId(id));
                let result = state.workflow.$name(cmd).await;
                respond(&state, &actor, result)
            }
        )+
    };
}

transition_handler! {
    approve_tts,
    reject_tts,
    accept_counter_proposal,
    approve_cogs,
    reject_cogs,
    approve_pre_final,
    reject_pre_final,
    approve_final,
    reject_final,
    close,
}

pub async fn counter_propose_tts(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(body): Json<CounterProposalRequest>,
) -> AppResult<Json<RequestResponse>> {
    let result = state
        .workflow
        .counter_propose_tts(ChangeTtsCommand {
            actor: actor.clone(),
            request_id: ApprovalRequestId(id),
            tts_percentage: body.tts_percentage,
        })
        .await;
    respond(&state, &actor, result)
}

pub async fn revise_rsp(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviseRspRequest>,
) -> AppResult<Json<RequestResponse>> {
    let result = state
        .workflow
        .revise_rsp(ReviseRspCommand {
            actor: actor.clone(),
            request_id: ApprovalRequestId(id),
            rsp: body.rsp,
        })
        .await;
    respond(&state, &actor, result)
}

pub async fn update_currency_rate(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(country): Path<String>,
    Json(body): Json<CurrencyRateRequest>,
) -> AppResult<StatusCode> {
    state
        .pricing
        .update_currency_rate(UpdateCurrencyRateCommand {
            actor,
            country,
            to_usd: body.to_usd,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
