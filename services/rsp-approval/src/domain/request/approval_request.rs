//! 审批请求实体

use std::fmt;

use chrono::{DateTime, Utc};
use rsp_common::{AuditInfo, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Actor, RequestState};
use crate::domain::pricing::{
    PricingInputs, PricingResult, PricingResultOf, RateSet, calculate, recompute_tts,
};

/// 请求 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalRequestId(pub Uuid);

impl ApprovalRequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ApprovalRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApprovalRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 业务编号 `{sku}_{country}_{yyyy-mm}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestCode(String);

impl RequestCode {
    pub fn generate(sku_code: &str, country: &str, at: DateTime<Utc>) -> Self {
        Self(format!("{}_{}_{}", sku_code, country, at.format("%Y-%m")))
    }

    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 编号中的年月
    pub fn year_month(&self) -> Option<&str> {
        self.0.rsplit('_').next().filter(|m| m.len() == 7)
    }

    pub fn same_month(&self, at: DateTime<Utc>) -> bool {
        self.year_month() == Some(at.format("%Y-%m").to_string().as_str())
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 提交时冻结的定价快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub rates: RateSet,
    pub pieces_per_case: Decimal,
    /// 已按两位小数舍入
    pub result: PricingResult,
}

impl PricingSnapshot {
    pub fn new(inputs: &PricingInputs, result: &PricingResult) -> Self {
        Self {
            rates: inputs.rates,
            pieces_per_case: inputs.pieces_per_case,
            result: result.rounded(),
        }
    }
}

/// 迁移前的守卫条件，用于条件更新
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionGuard {
    pub id: ApprovalRequestId,
    pub current_approver_id: Option<UserId>,
    pub status: &'static str,
    pub approval_type: &'static str,
}

/// 迁移后的审批人
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproverAssignment {
    pub current: Option<UserId>,
    pub next: Option<UserId>,
}

/// 新建请求所需数据
#[derive(Debug, Clone)]
pub struct NewApprovalRequest {
    pub sku_code: String,
    pub country: String,
    pub sku_description: String,
    pub snapshot: PricingSnapshot,
    pub requester: Actor,
    pub approvers: ApproverAssignment,
    pub approver_name: String,
}

/// 审批请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub request_code: RequestCode,
    pub sku_code: String,
    pub country: String,
    pub sku_description: String,
    pub snapshot: PricingSnapshot,
    pub state: RequestState,
    pub requester_id: UserId,
    pub requester_name: String,
    pub current_approver_id: Option<UserId>,
    pub next_approver_id: Option<UserId>,
    /// 最近一次处理人
    pub approver_name: Option<String>,
    pub audit_info: AuditInfo,
}

impl ApprovalRequest {
    /// 市场部提交新请求
    pub fn submit(new: NewApprovalRequest, now: DateTime<Utc>) -> Self {
        let mut audit_info = AuditInfo::new(Some(new.requester.id.clone()));
        audit_info.created_at = now;
        audit_info.updated_at = now;

        Self {
            id: ApprovalRequestId::new(),
            request_code: RequestCode::generate(&new.sku_code, &new.country, now),
            sku_code: new.sku_code,
            country: new.country,
            sku_description: new.sku_description,
            snapshot: new.snapshot,
            state: RequestState::PendingTts,
            requester_id: new.requester.id,
            requester_name: new.requester.name,
            current_approver_id: new.approvers.current,
            next_approver_id: new.approvers.next,
            approver_name: Some(new.approver_name),
            audit_info,
        }
    }

    /// 当前行的守卫条件
    pub fn guard(&self) -> TransitionGuard {
        TransitionGuard {
            id: self.id,
            current_approver_id: self.current_approver_id.clone(),
            status: self.state.status(),
            approval_type: self.state.approval_type().as_str(),
        }
    }

    pub fn is_current_approver(&self, user: &UserId) -> bool {
        self.current_approver_id.as_ref() == Some(user)
    }

    pub fn is_requester(&self, user: &UserId) -> bool {
        &self.requester_id == user
    }

    /// 应用迁移，业务编号按当前年月重新生成
    pub fn apply_transition(
        &mut self,
        to: RequestState,
        approvers: ApproverAssignment,
        actor: &Actor,
        now: DateTime<Utc>,
    ) {
        self.state = to;
        self.current_approver_id = approvers.current;
        self.next_approver_id = approvers.next;
        self.approver_name = Some(actor.name.clone());
        self.request_code = RequestCode::generate(&self.sku_code, &self.country, now);
        self.audit_info.update(Some(actor.id.clone()));
        self.audit_info.updated_at = now;
    }

    /// 被新的提交替代，清空当前审批人
    pub fn deactivate(&mut self, by: &Actor, now: DateTime<Utc>) {
        self.state = self.state.closed();
        self.current_approver_id = None;
        self.audit_info.update(Some(by.id.clone()));
        self.audit_info.updated_at = now;
    }

    /// 固定 GSV 与 COGS，按新的 TTS% 重算
    pub fn change_tts(&mut self, tts_percentage: Decimal) -> PricingResultOf<()> {
        let current = self.snapshot.result;
        let breakdown = recompute_tts(current.gsv, current.cogs_per_case, tts_percentage)?;
        self.snapshot.result = current.with_trade_spend(breakdown.rounded());
        Ok(())
    }

    /// 以新的 RSP 重算整条链
    pub fn change_rsp(&mut self, rsp: Decimal) -> PricingResultOf<()> {
        let inputs = PricingInputs {
            rates: self.snapshot.rates,
            pieces_per_case: self.snapshot.pieces_per_case,
            tts_percentage: self.snapshot.result.tts_percentage,
            cogs_per_case: self.snapshot.result.cogs_per_case,
        };
        let result = calculate(&inputs, rsp)?;
        self.snapshot = PricingSnapshot::new(&inputs, &result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::Role;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_request(at: DateTime<Utc>) -> (ApprovalRequest, Actor) {
        let inputs = PricingInputs {
            rates: RateSet {
                vat: dec!(0.05),
                rm: dec!(0.20),
                wsm: dec!(0.10),
                dm: dec!(0.08),
                duty: dec!(0.05),
                clearing_charges: dec!(0.02),
                bd: dec!(0.01),
                cpp: dec!(0.03),
            },
            pieces_per_case: dec!(24),
            tts_percentage: dec!(5),
            cogs_per_case: dec!(40),
        };
        let result = calculate(&inputs, dec!(10)).unwrap();
        let requester = Actor::new(UserId::new(), "Mona Marketing", Role::Marketing);
        let approver = Actor::new(UserId::new(), "Tariq Finance", Role::TtsApprover);
        let request = ApprovalRequest::submit(
            NewApprovalRequest {
                sku_code: "SKU1".to_string(),
                country: "Qatar".to_string(),
                sku_description: "Orange Juice".to_string(),
                snapshot: PricingSnapshot::new(&inputs, &result),
                requester,
                approvers: ApproverAssignment {
                    current: Some(approver.id.clone()),
                    next: None,
                },
                approver_name: approver.name.clone(),
            },
            at,
        );
        (request, approver)
    }

    #[test]
    fn test_transition_regenerates_request_code_for_new_month() {
        let submitted_at = Utc.with_ymd_and_hms(2024, 1, 31, 23, 0, 0).unwrap();
        let (mut request, approver) = sample_request(submitted_at);
        assert_eq!(request.request_code.as_str(), "SKU1_Qatar_2024-01");

        let approved_at = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
        request.apply_transition(
            RequestState::AwaitingCdManager,
            ApproverAssignment::default(),
            &approver,
            approved_at,
        );
        assert_eq!(request.request_code.as_str(), "SKU1_Qatar_2024-02");
        assert!(request.request_code.same_month(approved_at));
        assert_eq!(request.state, RequestState::AwaitingCdManager);
        assert_eq!(request.approver_name.as_deref(), Some("Tariq Finance"));
        assert_eq!(request.audit_info.updated_at, approved_at);
    }

    #[test]
    fn test_request_code_uses_year_month() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let code = RequestCode::generate("SKU1", "Qatar", at);
        assert_eq!(code.as_str(), "SKU1_Qatar_2024-03");
        assert_eq!(code.year_month(), Some("2024-03"));
        assert!(code.same_month(at));

        let next_month = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert!(!code.same_month(next_month));
    }

    #[test]
    fn test_request_code_with_underscored_sku() {
        let at = Utc.with_ymd_and_hms(2025, 11, 30, 0, 0, 0).unwrap();
        let code = RequestCode::generate("SKU_A_1", "UAE", at);
        assert_eq!(code.year_month(), Some("2025-11"));
    }
}
