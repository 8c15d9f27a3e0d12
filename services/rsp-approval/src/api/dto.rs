//! 请求/响应结构

use chrono::{DateTime, Utc};
use rsp_common::{Pagination, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::pricing::{PricingInputs, PricingResult, RateSet};
use crate::domain::request::{ApprovalRequest, ApprovalRequestId, Role, TransitionTable};

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub inputs: PricingInputs,
    pub rsp: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub sku_code: String,
    pub country: String,
    pub rsp: Decimal,
    #[serde(default)]
    pub tts_percentage: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub sku_code: String,
    pub country: String,
    pub rsp: Decimal,
    /// 不填则使用主数据中的 TTS%
    #[serde(default)]
    pub tts_percentage: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CounterProposalRequest {
    pub tts_percentage: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ReviseRspRequest {
    pub rsp: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CurrencyRateRequest {
    pub to_usd: Decimal,
}

/// 列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// 状态名，如 `awaiting_final`
    pub status: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination::new(
            self.page.unwrap_or(default.page),
            self.page_size.unwrap_or(default.page_size),
        )
    }
}

/// 审批请求视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResponse {
    pub id: ApprovalRequestId,
    pub request_code: String,
    pub sku_code: String,
    pub country: String,
    pub sku_description: String,
    pub state: String,
    pub status: String,
    pub approval_type: String,
    pub rates: RateSet,
    pub pieces_per_case: Decimal,
    pub result: PricingResult,
    pub requester_id: UserId,
    pub requester_name: String,
    pub current_approver_id: Option<UserId>,
    pub next_approver_id: Option<UserId>,
    pub approver_name: Option<String>,
    /// 调用方角色在当前状态下可执行的动作
    pub allowed_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestResponse {
    pub fn new(request: ApprovalRequest, table: &TransitionTable, role: Role) -> Self {
        let allowed_actions = table
            .allowed_actions(role, &request.state)
            .into_iter()
            .map(|action| action.as_str().to_string())
            .collect();

        Self {
            id: request.id,
            request_code: request.request_code.as_str().to_string(),
            state: request.state.name().to_string(),
            status: request.state.status().to_string(),
            approval_type: request.state.approval_type().as_str().to_string(),
            rates: request.snapshot.rates,
            pieces_per_case: request.snapshot.pieces_per_case,
            result: request.snapshot.result,
            sku_code: request.sku_code,
            country: request.country,
            sku_description: request.sku_description,
            requester_id: request.requester_id,
            requester_name: request.requester_name,
            current_approver_id: request.current_approver_id,
            next_approver_id: request.next_approver_id,
            approver_name: request.approver_name,
            allowed_actions,
            created_at: request.audit_info.created_at,
            updated_at: request.audit_info.updated_at,
        }
    }
}
