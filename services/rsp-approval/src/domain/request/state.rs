//! 请求状态
//!
//! 存储层以 `(status, approval_type)` 两列表示状态，这里收敛为封闭枚举，
//! 未知组合在解码时直接拒绝。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 无法识别的存储值
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// 审批类型列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalType {
    Tts,
    TtsUpdated,
    CdManagerApproval,
    Cogs,
    Approval,
    FinalApproval,
    Approved,
    Rejected,
}

impl ApprovalType {
    const ALL: [ApprovalType; 8] = [
        ApprovalType::Tts,
        ApprovalType::TtsUpdated,
        ApprovalType::CdManagerApproval,
        ApprovalType::Cogs,
        ApprovalType::Approval,
        ApprovalType::FinalApproval,
        ApprovalType::Approved,
        ApprovalType::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalType::Tts => "TTS",
            ApprovalType::TtsUpdated => "TTSUpdated",
            ApprovalType::CdManagerApproval => "CD Manager Approval",
            ApprovalType::Cogs => "COGS",
            ApprovalType::Approval => "Approval",
            ApprovalType::FinalApproval => "FinalApproval",
            ApprovalType::Approved => "Approved",
            ApprovalType::Rejected => "Rejected",
        }
    }
}

impl FromStr for ApprovalType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApprovalType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownValue::new("approval_type", s))
    }
}

/// 状态列取值
pub mod status {
    pub const PENDING: &str = "Pending";
    pub const UPDATED_TTS: &str = "UpdatedTTS%";
    pub const TTS_APPROVED: &str = "TTS Approved";
    pub const COGS_APPROVED: &str = "COGS Approved";
    pub const APPROVED: &str = "Approved";
    pub const REQUEST_APPROVED: &str = "Request Approved";
    pub const TTS_REJECTED: &str = "TTS Rejected";
    pub const COGS_REJECTED: &str = "COGS Rejected";
    pub const REJECTED: &str = "Rejected";
    pub const REQUEST_REJECTED: &str = "Request Rejected";
    pub const INACTIVE: &str = "INACTIVE";
}

/// 请求状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    /// 待 TTS 审批
    PendingTts,
    /// TTS 审批人提出了新的 TTS%，退回申请人
    TtsCounterProposed,
    /// 待国家 CD 经理审批
    AwaitingCdManager,
    /// 待 COGS 审批（旧流程）
    AwaitingCogs,
    /// 待区域经理预审（旧流程）
    AwaitingPreFinal,
    /// 待终审
    AwaitingFinal,
    RequestApproved,
    TtsRejected,
    CogsRejected,
    PreFinalRejected,
    RequestRejected,
    /// 已被替代或撤回，保留关闭前的审批类型
    Inactive { previous: ApprovalType },
}

impl RequestState {
    /// 从存储列解码
    pub fn from_columns(status: &str, approval_type: &str) -> Result<Self, UnknownValue> {
        use self::status as s;

        if status == s::INACTIVE {
            let previous = approval_type.parse()?;
            return Ok(RequestState::Inactive { previous });
        }

        let state = match (status, approval_type) {
            (s::PENDING, "TTS") => RequestState::PendingTts,
            (s::UPDATED_TTS, "TTSUpdated") => RequestState::TtsCounterProposed,
            (s::TTS_APPROVED, "CD Manager Approval") => RequestState::AwaitingCdManager,
            (s::TTS_APPROVED, "COGS") => RequestState::AwaitingCogs,
            (s::COGS_APPROVED, "Approval") => RequestState::AwaitingPreFinal,
            (s::APPROVED, "FinalApproval") => RequestState::AwaitingFinal,
            (s::REQUEST_APPROVED, "Approved") => RequestState::RequestApproved,
            (s::TTS_REJECTED, "Rejected") => RequestState::TtsRejected,
            (s::COGS_REJECTED, "Rejected") => RequestState::CogsRejected,
            (s::REJECTED, "Rejected") => RequestState::PreFinalRejected,
            (s::REQUEST_REJECTED, "Rejected") => RequestState::RequestRejected,
            _ => {
                return Err(UnknownValue::new(
                    "request state",
                    format!("{}/{}", status, approval_type),
                ));
            }
        };
        Ok(state)
    }

    /// `status` 列
    pub fn status(&self) -> &'static str {
        use self::status as s;

        match self {
            RequestState::PendingTts => s::PENDING,
            RequestState::TtsCounterProposed => s::UPDATED_TTS,
            RequestState::AwaitingCdManager | RequestState::AwaitingCogs => s::TTS_APPROVED,
            RequestState::AwaitingPreFinal => s::COGS_APPROVED,
            RequestState::AwaitingFinal => s::APPROVED,
            RequestState::RequestApproved => s::REQUEST_APPROVED,
            RequestState::TtsRejected => s::TTS_REJECTED,
            RequestState::CogsRejected => s::COGS_REJECTED,
            RequestState::PreFinalRejected => s::REJECTED,
            RequestState::RequestRejected => s::REQUEST_REJECTED,
            RequestState::Inactive { .. } => s::INACTIVE,
        }
    }

    /// `approval_type` 列
    pub fn approval_type(&self) -> ApprovalType {
        match self {
            RequestState::PendingTts => ApprovalType::Tts,
            RequestState::TtsCounterProposed => ApprovalType::TtsUpdated,
            RequestState::AwaitingCdManager => ApprovalType::CdManagerApproval,
            RequestState::AwaitingCogs => ApprovalType::Cogs,
            RequestState::AwaitingPreFinal => ApprovalType::Approval,
            RequestState::AwaitingFinal => ApprovalType::FinalApproval,
            RequestState::RequestApproved => ApprovalType::Approved,
            RequestState::TtsRejected
            | RequestState::CogsRejected
            | RequestState::PreFinalRejected
            | RequestState::RequestRejected => ApprovalType::Rejected,
            RequestState::Inactive { previous } => *previous,
        }
    }

    /// 终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::RequestApproved
                | RequestState::TtsRejected
                | RequestState::CogsRejected
                | RequestState::PreFinalRejected
                | RequestState::RequestRejected
        )
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, RequestState::Inactive { .. })
    }

    /// 仍在流转中（非终态且未关闭）
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && !self.is_inactive()
    }

    /// 关闭后的状态
    pub fn closed(&self) -> Self {
        RequestState::Inactive {
            previous: self.approval_type(),
        }
    }

    /// 所有流转中的状态
    pub fn active_states() -> [RequestState; 6] {
        [
            RequestState::PendingTts,
            RequestState::TtsCounterProposed,
            RequestState::AwaitingCdManager,
            RequestState::AwaitingCogs,
            RequestState::AwaitingPreFinal,
            RequestState::AwaitingFinal,
        ]
    }

    /// API 中使用的名称
    pub fn name(&self) -> &'static str {
        match self {
            RequestState::PendingTts => "pending_tts",
            RequestState::TtsCounterProposed => "tts_counter_proposed",
            RequestState::AwaitingCdManager => "awaiting_cd_manager",
            RequestState::AwaitingCogs => "awaiting_cogs",
            RequestState::AwaitingPreFinal => "awaiting_pre_final",
            RequestState::AwaitingFinal => "awaiting_final",
            RequestState::RequestApproved => "request_approved",
            RequestState::TtsRejected => "tts_rejected",
            RequestState::CogsRejected => "cogs_rejected",
            RequestState::PreFinalRejected => "pre_final_rejected",
            RequestState::RequestRejected => "request_rejected",
            RequestState::Inactive { .. } => "inactive",
        }
    }

    /// 按 API 名称解析，`inactive` 不可查询
    pub fn from_name(name: &str) -> Result<Self, UnknownValue> {
        let name = name.trim();
        Self::active_states()
            .into_iter()
            .chain([
                RequestState::RequestApproved,
                RequestState::TtsRejected,
                RequestState::CogsRejected,
                RequestState::PreFinalRejected,
                RequestState::RequestRejected,
            ])
            .find(|state| state.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownValue::new("state", name))
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.status(), self.approval_type().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [RequestState; 12] = [
        RequestState::PendingTts,
        RequestState::TtsCounterProposed,
        RequestState::AwaitingCdManager,
        RequestState::AwaitingCogs,
        RequestState::AwaitingPreFinal,
        RequestState::AwaitingFinal,
        RequestState::RequestApproved,
        RequestState::TtsRejected,
        RequestState::CogsRejected,
        RequestState::PreFinalRejected,
        RequestState::RequestRejected,
        RequestState::Inactive {
            previous: ApprovalType::CdManagerApproval,
        },
    ];

    #[test]
    fn test_columns_decode_back_to_same_state() {
        for state in ALL_STATES {
            let decoded =
                RequestState::from_columns(state.status(), state.approval_type().as_str()).unwrap();
            assert_eq!(decoded, state);
        }
    }

    #[test]
    fn test_unknown_pairs_rejected() {
        assert!(RequestState::from_columns("Pending", "COGS").is_err());
        assert!(RequestState::from_columns("Approved", "Approved").is_err());
        assert!(RequestState::from_columns("Draft", "TTS").is_err());
        assert!(RequestState::from_columns("INACTIVE", "Whatever").is_err());
    }

    #[test]
    fn test_closed_keeps_previous_approval_type() {
        let closed = RequestState::AwaitingFinal.closed();
        assert_eq!(closed.status(), "INACTIVE");
        assert_eq!(closed.approval_type(), ApprovalType::FinalApproval);
        assert!(!closed.is_active());
    }

    #[test]
    fn test_active_and_terminal_are_disjoint() {
        for state in ALL_STATES {
            assert!(!(state.is_active() && state.is_terminal()), "{state}");
        }
        assert_eq!(
            ALL_STATES.iter().filter(|s| s.is_active()).count(),
            RequestState::active_states().len()
        );
    }

    #[test]
    fn test_from_name() {
        for state in ALL_STATES.iter().filter(|s| !s.is_inactive()) {
            assert_eq!(RequestState::from_name(state.name()).unwrap(), *state);
        }
        assert_eq!(
            RequestState::from_name(" Awaiting_Final ").unwrap(),
            RequestState::AwaitingFinal
        );
        assert!(RequestState::from_name("inactive").is_err());
    }
}
