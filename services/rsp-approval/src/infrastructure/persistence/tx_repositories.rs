//! 事务仓储
//!
//! 这些仓储共享同一个事务，而不是直接使用连接池。

use std::sync::Arc;

use async_trait::async_trait;
use rsp_adapter_postgres::map_sqlx_error;
use rsp_common::{PagedResult, Pagination, UserId};
use rsp_errors::{AppError, AppResult};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;

use super::rows::{APPROVAL_REQUEST_COLUMNS, ApprovalRequestRow, CountryRow, SkuInputsRow, UserRow};
use crate::domain::pricing::SkuPricingInputs;
use crate::domain::reference::{CountryDetails, User};
use crate::domain::repositories::{
    ApprovalRequestRepository, CountryPrice, MasterPriceRepository, ReferenceDataRepository,
    RequestFilter,
};
use crate::domain::request::{ApprovalRequest, ApprovalRequestId, Role, TransitionGuard};

/// Shared transaction type
pub type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// Macro to define a TxRepository structure
macro_rules! define_tx_repo {
    ($name:ident) => {
        pub struct $name {
            tx: SharedTx,
        }

        impl $name {
            pub fn new(tx: SharedTx) -> Self {
                Self { tx }
            }
        }
    };
}

define_tx_repo!(TxApprovalRequestRepository);
define_tx_repo!(TxReferenceDataRepository);
define_tx_repo!(TxMasterPriceRepository);

fn user_uuid(id: &Option<UserId>) -> Option<uuid::Uuid> {
    id.as_ref().map(|u| u.0)
}

#[async_trait]
impl ApprovalRequestRepository for TxApprovalRequestRepository {
    async fn find_by_id(&self, id: &ApprovalRequestId) -> AppResult<Option<ApprovalRequest>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let sql = format!(
            "SELECT {} FROM approval_requests WHERE id = $1",
            APPROVAL_REQUEST_COLUMNS
        );
        let row = sqlx::query_as::<_, ApprovalRequestRow>(&sql)
            .bind(id.0)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        row.map(ApprovalRequest::try_from).transpose()
    }

    async fn find_active(&self, sku_code: &str, country: &str) -> AppResult<Vec<ApprovalRequest>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        // 行锁防止并发提交同时替代同一条请求
        let sql = format!(
            "SELECT {} FROM approval_requests WHERE sku_code = $1 AND country = $2 \
             AND status NOT IN ('INACTIVE', 'Request Approved', 'Request Rejected', \
             'TTS Rejected', 'COGS Rejected', 'Rejected') FOR UPDATE",
            APPROVAL_REQUEST_COLUMNS
        );
        let rows = sqlx::query_as::<_, ApprovalRequestRow>(&sql)
            .bind(sku_code)
            .bind(country)
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(ApprovalRequest::try_from).collect()
    }

    async fn insert(&self, request: &ApprovalRequest) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let rates = &request.snapshot.rates;
        let result = &request.snapshot.result;

        sqlx::query(
            r#"
            INSERT INTO approval_requests (
                id, request_code, sku_code, country, sku_description,
                vat, rm, wsm, dm, duty, clearing_charges, bd, cpp, pieces_per_case,
                rsp, rsp_without_vat, rsp_per_case, retail_markup, bptt, dplc, cif, gsv,
                tts_percentage, tts, trade_output, gp, gm_percentage, cogs_per_case,
                status, approval_type, requester_id, requester_name,
                current_approver_id, next_approver_id, approver_name,
                created_at, created_by, updated_at, updated_by
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22,
                $23, $24, $25, $26, $27, $28,
                $29, $30, $31, $32,
                $33, $34, $35,
                $36, $37, $38, $39
            )
            "#,
        )
        .bind(request.id.0)
        .bind(request.request_code.as_str())
        .bind(&request.sku_code)
        .bind(&request.country)
        .bind(&request.sku_description)
        .bind(rates.vat)
        .bind(rates.rm)
        .bind(rates.wsm)
        .bind(rates.dm)
        .bind(rates.duty)
        .bind(rates.clearing_charges)
        .bind(rates.bd)
        .bind(rates.cpp)
        .bind(request.snapshot.pieces_per_case)
        .bind(result.rsp)
        .bind(result.rsp_without_vat)
        .bind(result.rsp_per_case)
        .bind(result.retail_markup)
        .bind(result.bptt)
        .bind(result.dplc)
        .bind(result.cif)
        .bind(result.gsv)
        .bind(result.tts_percentage)
        .bind(result.tts)
        .bind(result.to)
        .bind(result.gp)
        .bind(result.gm_percentage)
        .bind(result.cogs_per_case)
        .bind(request.state.status())
        .bind(request.state.approval_type().as_str())
        .bind(request.requester_id.0)
        .bind(&request.requester_name)
        .bind(user_uuid(&request.current_approver_id))
        .bind(user_uuid(&request.next_approver_id))
        .bind(&request.approver_name)
        .bind(request.audit_info.created_at)
        .bind(user_uuid(&request.audit_info.created_by))
        .bind(request.audit_info.updated_at)
        .bind(user_uuid(&request.audit_info.updated_by))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_guarded(
        &self,
        request: &ApprovalRequest,
        guard_on: &TransitionGuard,
    ) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let result = &request.snapshot.result;

        let done = sqlx::query(
            r#"
            UPDATE approval_requests
            SET request_code = $5, status = $6, approval_type = $7,
                current_approver_id = $8, next_approver_id = $9, approver_name = $10,
                rsp = $11, rsp_without_vat = $12, rsp_per_case = $13, retail_markup = $14,
                bptt = $15, dplc = $16, cif = $17, gsv = $18,
                tts_percentage = $19, tts = $20, trade_output = $21, gp = $22,
                gm_percentage = $23, cogs_per_case = $24,
                updated_at = $25, updated_by = $26
            WHERE id = $1
              AND current_approver_id IS NOT DISTINCT FROM $2
              AND status = $3
              AND approval_type = $4
            "#,
        )
        .bind(guard_on.id.0)
        .bind(user_uuid(&guard_on.current_approver_id))
        .bind(guard_on.status)
        .bind(guard_on.approval_type)
        .bind(request.request_code.as_str())
        .bind(request.state.status())
        .bind(request.state.approval_type().as_str())
        .bind(user_uuid(&request.current_approver_id))
        .bind(user_uuid(&request.next_approver_id))
        .bind(&request.approver_name)
        .bind(result.rsp)
        .bind(result.rsp_without_vat)
        .bind(result.rsp_per_case)
        .bind(result.retail_markup)
        .bind(result.bptt)
        .bind(result.dplc)
        .bind(result.cif)
        .bind(result.gsv)
        .bind(result.tts_percentage)
        .bind(result.tts)
        .bind(result.to)
        .bind(result.gp)
        .bind(result.gm_percentage)
        .bind(result.cogs_per_case)
        .bind(request.audit_info.updated_at)
        .bind(user_uuid(&request.audit_info.updated_by))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(done.rows_affected())
    }

    async fn delete(&self, id: &ApprovalRequestId) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let done = sqlx::query("DELETE FROM approval_requests WHERE id = $1")
            .bind(id.0)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(done.rows_affected())
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> AppResult<PagedResult<ApprovalRequest>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        const WHERE: &str = r#"
            WHERE status <> 'INACTIVE'
              AND ($1::uuid IS NULL OR current_approver_id = $1)
              AND ($2::uuid IS NULL OR requester_id = $2)
              AND ($3::text IS NULL OR (status = $3 AND approval_type = $4))
        "#;

        let status = filter.state.as_ref().map(|s| s.status());
        let approval_type = filter.state.as_ref().map(|s| s.approval_type().as_str());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM approval_requests {}",
            WHERE
        ))
        .bind(user_uuid(&filter.current_approver_id))
        .bind(user_uuid(&filter.requester_id))
        .bind(status)
        .bind(approval_type)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {} FROM approval_requests {} ORDER BY updated_at DESC LIMIT $5 OFFSET $6",
            APPROVAL_REQUEST_COLUMNS, WHERE
        );
        let rows = sqlx::query_as::<_, ApprovalRequestRow>(&sql)
            .bind(user_uuid(&filter.current_approver_id))
            .bind(user_uuid(&filter.requester_id))
            .bind(status)
            .bind(approval_type)
            .bind(pagination.page_size as i64)
            .bind(pagination.offset() as i64)
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        let items = rows
            .into_iter()
            .map(ApprovalRequest::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PagedResult::new(items, total as u64, pagination))
    }
}

#[async_trait]
impl ReferenceDataRepository for TxReferenceDataRepository {
    async fn find_user_by_role(&self, role: Role) -> AppResult<Option<User>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, username, role FROM users WHERE LOWER(role) = $1 ORDER BY name LIMIT 1",
        )
        .bind(role.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_role_and_name(&self, role: Role, name: &str) -> AppResult<Option<User>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, username, role FROM users WHERE LOWER(role) = $1 AND name = $2 LIMIT 1",
        )
        .bind(role.as_str())
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(User::try_from).transpose()
    }

    async fn find_country(&self, country: &str) -> AppResult<Option<CountryDetails>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, CountryRow>(
            "SELECT country, vat, cd_manager, db_manager, currency FROM country_details WHERE country = $1",
        )
        .bind(country)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CountryDetails::from))
    }

    async fn find_sku_inputs(
        &self,
        sku_code: &str,
        country: &str,
    ) -> AppResult<Option<SkuPricingInputs>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, SkuInputsRow>(
            r#"
            SELECT t.sku_code, t.country, t.description,
                   t.brand, t.sector, t.flavor, t.format, t.packing,
                   t.vat, t.rm, t.wsm, t.dm, t.duty, t.clearing_charges, t.bd, t.cpp, t.tts,
                   m.pcs_per_case, m.case_per_ton, m.cogs_usd,
                   c.currency, r.to_usd
            FROM sku_trade_spend t
            JOIN sku_master m ON m.sku_code = t.sku_code
            JOIN country_details c ON c.country = t.country
            JOIN currency_rates r ON r.country = t.country
            WHERE t.sku_code = $1 AND t.country = $2
            "#,
        )
        .bind(sku_code)
        .bind(country)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SkuPricingInputs::from))
    }

    async fn list_sku_codes(&self) -> AppResult<Vec<String>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let codes = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT sku_code FROM sku_trade_spend ORDER BY sku_code",
        )
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(codes)
    }

    async fn update_currency_rate(&self, country: &str, to_usd: Decimal) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let done = sqlx::query("UPDATE currency_rates SET to_usd = $1 WHERE country = $2")
            .bind(to_usd)
            .bind(country)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(done.rows_affected())
    }
}

#[async_trait]
impl MasterPriceRepository for TxMasterPriceRepository {
    // 不带 country 条件，SKU 的所有国家行一起更新
    async fn update_trade_spend(&self, sku_code: &str, tts_rate: Decimal) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let done = sqlx::query("UPDATE sku_trade_spend SET tts = $1 WHERE sku_code = $2")
            .bind(tts_rate)
            .bind(sku_code)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(done.rows_affected())
    }

    async fn update_country_price(
        &self,
        country: &str,
        sku_code: &str,
        price: &CountryPrice,
    ) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let done = sqlx::query(
            r#"
            UPDATE country_price_master
            SET bptt = $1, cif = $2, rsp_per_case = $3
            WHERE country = $4 AND sku_code = $5
            "#,
        )
        .bind(price.bptt)
        .bind(price.cif)
        .bind(price.rsp_per_case)
        .bind(country)
        .bind(sku_code)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(done.rows_affected())
    }
}
