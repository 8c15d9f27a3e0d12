//! 数据库行结构与领域对象转换

use chrono::{DateTime, Utc};
use rsp_common::{AuditInfo, UserId};
use rsp_errors::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::pricing::{PricingResult, RateSet, SkuAttributes, SkuPricingInputs};
use crate::domain::reference::{CountryDetails, User};
use crate::domain::request::{
    ApprovalRequest, ApprovalRequestId, PricingSnapshot, RequestCode, RequestState, Role,
};

fn decode_error(e: impl std::fmt::Display) -> AppError {
    AppError::internal(format!("Failed to decode row: {}", e))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub role: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            name: row.name,
            username: row.username,
            role: row.role.parse::<Role>().map_err(decode_error)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CountryRow {
    pub country: String,
    pub vat: Decimal,
    pub cd_manager: Option<String>,
    pub db_manager: Option<String>,
    pub currency: String,
}

impl From<CountryRow> for CountryDetails {
    fn from(row: CountryRow) -> Self {
        CountryDetails {
            country: row.country,
            vat: row.vat,
            cd_manager: row.cd_manager,
            db_manager: row.db_manager,
            currency: row.currency,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SkuInputsRow {
    pub sku_code: String,
    pub country: String,
    pub description: String,
    pub brand: Option<String>,
    pub sector: Option<String>,
    pub flavor: Option<String>,
    pub format: Option<String>,
    pub packing: Option<String>,
    pub vat: Decimal,
    pub rm: Decimal,
    pub wsm: Decimal,
    pub dm: Decimal,
    pub duty: Decimal,
    pub clearing_charges: Decimal,
    pub bd: Decimal,
    pub cpp: Decimal,
    pub tts: Decimal,
    pub pcs_per_case: Decimal,
    pub case_per_ton: Decimal,
    pub cogs_usd: Decimal,
    pub currency: String,
    pub to_usd: Decimal,
}

impl From<SkuInputsRow> for SkuPricingInputs {
    fn from(row: SkuInputsRow) -> Self {
        SkuPricingInputs {
            sku_code: row.sku_code,
            country: row.country,
            description: row.description,
            attributes: SkuAttributes {
                brand: row.brand,
                sector: row.sector,
                flavor: row.flavor,
                format: row.format,
                packing: row.packing,
            },
            rates: RateSet {
                vat: row.vat,
                rm: row.rm,
                wsm: row.wsm,
                dm: row.dm,
                duty: row.duty,
                clearing_charges: row.clearing_charges,
                bd: row.bd,
                cpp: row.cpp,
            },
            tts_rate: row.tts,
            pieces_per_case: row.pcs_per_case,
            case_per_ton: row.case_per_ton,
            currency: row.currency,
            cogs_usd: row.cogs_usd,
            currency_rate: row.to_usd,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ApprovalRequestRow {
    pub id: Uuid,
    pub request_code: String,
    pub sku_code: String,
    pub country: String,
    pub sku_description: String,
    pub vat: Decimal,
    pub rm: Decimal,
    pub wsm: Decimal,
    pub dm: Decimal,
    pub duty: Decimal,
    pub clearing_charges: Decimal,
    pub bd: Decimal,
    pub cpp: Decimal,
    pub pieces_per_case: Decimal,
    pub rsp: Decimal,
    pub rsp_without_vat: Decimal,
    pub rsp_per_case: Decimal,
    pub retail_markup: Decimal,
    pub bptt: Decimal,
    pub dplc: Decimal,
    pub cif: Decimal,
    pub gsv: Decimal,
    pub tts_percentage: Decimal,
    pub tts: Decimal,
    pub trade_output: Decimal,
    pub gp: Decimal,
    pub gm_percentage: Decimal,
    pub cogs_per_case: Decimal,
    pub status: String,
    pub approval_type: String,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub current_approver_id: Option<Uuid>,
    pub next_approver_id: Option<Uuid>,
    pub approver_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

/// 查询审批请求的列清单
pub(crate) const APPROVAL_REQUEST_COLUMNS: &str = r#"
    id, request_code, sku_code, country, sku_description,
    vat, rm, wsm, dm, duty, clearing_charges, bd, cpp, pieces_per_case,
    rsp, rsp_without_vat, rsp_per_case, retail_markup, bptt, dplc, cif, gsv,
    tts_percentage, tts, trade_output, gp, gm_percentage, cogs_per_case,
    status, approval_type, requester_id, requester_name,
    current_approver_id, next_approver_id, approver_name,
    created_at, created_by, updated_at, updated_by
"#;

impl TryFrom<ApprovalRequestRow> for ApprovalRequest {
    type Error = AppError;

    fn try_from(row: ApprovalRequestRow) -> Result<Self, Self::Error> {
        let state =
            RequestState::from_columns(&row.status, &row.approval_type).map_err(decode_error)?;

        Ok(ApprovalRequest {
            id: ApprovalRequestId(row.id),
            request_code: RequestCode::from_raw(row.request_code),
            sku_code: row.sku_code,
            country: row.country,
            sku_description: row.sku_description,
            snapshot: PricingSnapshot {
                rates: RateSet {
                    vat: row.vat,
                    rm: row.rm,
                    wsm: row.wsm,
                    dm: row.dm,
                    duty: row.duty,
                    clearing_charges: row.clearing_charges,
                    bd: row.bd,
                    cpp: row.cpp,
                },
                pieces_per_case: row.pieces_per_case,
                result: PricingResult {
                    rsp: row.rsp,
                    rsp_without_vat: row.rsp_without_vat,
                    rsp_per_case: row.rsp_per_case,
                    retail_markup: row.retail_markup,
                    bptt: row.bptt,
                    dplc: row.dplc,
                    cif: row.cif,
                    gsv: row.gsv,
                    tts_percentage: row.tts_percentage,
                    tts: row.tts,
                    to: row.trade_output,
                    gp: row.gp,
                    gm_percentage: row.gm_percentage,
                    cogs_per_case: row.cogs_per_case,
                },
            },
            state,
            requester_id: UserId(row.requester_id),
            requester_name: row.requester_name,
            current_approver_id: row.current_approver_id.map(UserId),
            next_approver_id: row.next_approver_id.map(UserId),
            approver_name: row.approver_name,
            audit_info: AuditInfo {
                created_at: row.created_at,
                created_by: row.created_by.map(UserId),
                updated_at: row.updated_at,
                updated_by: row.updated_by.map(UserId),
            },
        })
    }
}
