//! 状态迁移表
//!
//! 所有 (角色, 动作, 当前状态) 的合法组合集中在这里，处理器只查表。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RequestState, Role};
use crate::error::{ServiceError, ServiceResult};

/// 流程动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Submit,
    ApproveTts,
    RejectTts,
    CounterProposeTts,
    AcceptCounterProposal,
    ReviseRsp,
    ApproveCogs,
    RejectCogs,
    ApprovePreFinal,
    RejectPreFinal,
    ApproveFinal,
    RejectFinal,
    Close,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Submit => "submit",
            Action::ApproveTts => "approve_tts",
            Action::RejectTts => "reject_tts",
            Action::CounterProposeTts => "counter_propose_tts",
            Action::AcceptCounterProposal => "accept_counter_proposal",
            Action::ReviseRsp => "revise_rsp",
            Action::ApproveCogs => "approve_cogs",
            Action::RejectCogs => "reject_cogs",
            Action::ApprovePreFinal => "approve_pre_final",
            Action::RejectPreFinal => "reject_pre_final",
            Action::ApproveFinal => "approve_final",
            Action::RejectFinal => "reject_final",
            Action::Close => "close",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 审批路由模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingMode {
    /// TTS → CD 经理 → 区域经理
    #[default]
    Current,
    /// TTS → COGS → 区域经理预审 → CD 经理终审
    LegacyCogs,
}

impl RoutingMode {
    pub fn from_legacy_flag(legacy_cogs_stage: bool) -> Self {
        if legacy_cogs_stage {
            RoutingMode::LegacyCogs
        } else {
            RoutingMode::Current
        }
    }
}

/// 迁移后审批人的分配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// 当前 = TTS 审批人，下一位 = 指定角色
    TtsApproverThen(Role),
    /// 当前 = 本国 CD 经理，下一位 = 区域经理
    CountryCdManagerThenManager,
    /// 当前 = COGS 审批人，下一位 = 区域经理
    CogsApproverThenManager,
    /// 当前 = 区域经理，下一位 = 本国 CD 经理
    ManagerThenCountryCdManager,
    /// 当前 = 原下一位审批人
    NextApprover,
    /// 退回申请人
    Requester,
    /// 清空当前和下一位审批人
    Clear,
    /// 只清空当前审批人
    ClearCurrent,
}

/// 谁可以对请求执行动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    /// 任何持有该角色的人（仅提交）
    Anyone,
    /// 必须是当前审批人
    CurrentApprover,
    /// 申请人、当前审批人或管理员
    Participant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    State(RequestState),
    Inactive,
}

/// 一条迁移规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub role: Role,
    pub action: Action,
    /// `None` 表示新建请求
    pub from: Option<RequestState>,
    target: Target,
    pub assignment: Assignment,
    pub holder: Holder,
}

impl TransitionRule {
    fn new(
        role: Role,
        action: Action,
        from: RequestState,
        to: RequestState,
        assignment: Assignment,
    ) -> Self {
        Self {
            role,
            action,
            from: Some(from),
            target: Target::State(to),
            assignment,
            holder: Holder::CurrentApprover,
        }
    }

    /// 迁移后的状态
    pub fn target(&self, from: &RequestState) -> RequestState {
        match self.target {
            Target::State(state) => state,
            Target::Inactive => from.closed(),
        }
    }

    /// 是否需要写回主数据
    pub fn commits_masters(&self) -> bool {
        self.action == Action::ApproveFinal
    }
}

/// 状态迁移表
#[derive(Debug, Clone)]
pub struct TransitionTable {
    mode: RoutingMode,
    rules: Vec<TransitionRule>,
}

impl TransitionTable {
    pub fn new(mode: RoutingMode) -> Self {
        use Action::*;
        use Assignment::*;
        use RequestState::*;

        let (after_tts, after_tts_assignment, submit_next) = match mode {
            RoutingMode::Current => (AwaitingCdManager, CountryCdManagerThenManager, Role::Manager),
            RoutingMode::LegacyCogs => (AwaitingCogs, CogsApproverThenManager, Role::CogsApprover),
        };

        let mut rules = vec![
            TransitionRule {
                role: Role::Marketing,
                action: Submit,
                from: None,
                target: Target::State(PendingTts),
                assignment: TtsApproverThen(submit_next),
                holder: Holder::Anyone,
            },
            // TTS 阶段
            TransitionRule::new(Role::TtsApprover, ApproveTts, PendingTts, after_tts, after_tts_assignment),
            TransitionRule::new(Role::TtsApprover, RejectTts, PendingTts, TtsRejected, Clear),
            TransitionRule::new(Role::TtsApprover, CounterProposeTts, PendingTts, TtsCounterProposed, Requester),
            TransitionRule::new(Role::Marketing, AcceptCounterProposal, TtsCounterProposed, after_tts, after_tts_assignment),
            TransitionRule::new(Role::Marketing, ReviseRsp, TtsCounterProposed, after_tts, after_tts_assignment),
            // CD 经理预审
            TransitionRule::new(Role::CdManager, ApprovePreFinal, AwaitingCdManager, AwaitingFinal, NextApprover),
            TransitionRule::new(Role::CdManager, RejectPreFinal, AwaitingCdManager, PreFinalRejected, Clear),
            // COGS 阶段与区域经理预审，旧数据在两种模式下都能走完
            TransitionRule::new(Role::CogsApprover, ApproveCogs, AwaitingCogs, AwaitingPreFinal, ManagerThenCountryCdManager),
            TransitionRule::new(Role::CogsApprover, RejectCogs, AwaitingCogs, CogsRejected, Clear),
            TransitionRule::new(Role::Manager, ApprovePreFinal, AwaitingPreFinal, AwaitingFinal, NextApprover),
            TransitionRule::new(Role::Manager, RejectPreFinal, AwaitingPreFinal, PreFinalRejected, Clear),
            // 终审：两种流程的终审人都登记，由当前审批人决定谁能操作
            TransitionRule::new(Role::Manager, ApproveFinal, AwaitingFinal, RequestApproved, Clear),
            TransitionRule::new(Role::Manager, RejectFinal, AwaitingFinal, RequestRejected, Clear),
            TransitionRule::new(Role::CdManager, ApproveFinal, AwaitingFinal, RequestApproved, Clear),
            TransitionRule::new(Role::CdManager, RejectFinal, AwaitingFinal, RequestRejected, Clear),
        ];

        for role in Role::ALL {
            for from in RequestState::active_states() {
                rules.push(TransitionRule {
                    role,
                    action: Close,
                    from: Some(from),
                    target: Target::Inactive,
                    assignment: ClearCurrent,
                    holder: Holder::Participant,
                });
            }
        }

        Self { mode, rules }
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// 查找规则
    ///
    /// 角色没有该动作的任何规则返回 `Unauthorized`；角色可以执行该动作
    /// 但当前状态不匹配返回 `Conflict`。
    pub fn authorize(
        &self,
        role: Role,
        action: Action,
        from: Option<&RequestState>,
    ) -> ServiceResult<&TransitionRule> {
        let mut candidates = self
            .rules
            .iter()
            .filter(|rule| rule.role == role && rule.action == action)
            .peekable();

        if candidates.peek().is_none() {
            return Err(ServiceError::Unauthorized(format!(
                "role '{}' may not {}",
                role, action
            )));
        }

        candidates
            .find(|rule| rule.from.as_ref() == from)
            .ok_or_else(|| match from {
                Some(state) => ServiceError::Conflict(format!(
                    "cannot {} a request in state {}",
                    action, state
                )),
                None => ServiceError::Conflict(format!("{} requires an existing request", action)),
            })
    }

    /// 角色在给定状态下可执行的动作
    pub fn allowed_actions(&self, role: Role, from: &RequestState) -> Vec<Action> {
        self.rules
            .iter()
            .filter(|rule| rule.role == role && rule.from.as_ref() == Some(from))
            .map(|rule| rule.action)
            .collect()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::new(RoutingMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marketing_cannot_approve_tts() {
        let table = TransitionTable::default();
        let err = table
            .authorize(Role::Marketing, Action::ApproveTts, Some(&RequestState::PendingTts))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn test_approve_tts_from_wrong_state_is_conflict() {
        let table = TransitionTable::default();
        let err = table
            .authorize(
                Role::TtsApprover,
                Action::ApproveTts,
                Some(&RequestState::AwaitingCdManager),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn test_current_routing() {
        let table = TransitionTable::new(RoutingMode::Current);
        let rule = table
            .authorize(Role::TtsApprover, Action::ApproveTts, Some(&RequestState::PendingTts))
            .unwrap();
        assert_eq!(rule.target(&RequestState::PendingTts), RequestState::AwaitingCdManager);
        assert_eq!(rule.assignment, Assignment::CountryCdManagerThenManager);

        let submit = table.authorize(Role::Marketing, Action::Submit, None).unwrap();
        assert_eq!(submit.assignment, Assignment::TtsApproverThen(Role::Manager));

        assert!(table
            .authorize(Role::Manager, Action::ApproveFinal, Some(&RequestState::AwaitingFinal))
            .unwrap()
            .commits_masters());
    }

    #[test]
    fn test_final_rules_exist_in_both_modes() {
        for mode in [RoutingMode::Current, RoutingMode::LegacyCogs] {
            let table = TransitionTable::new(mode);
            for role in [Role::Manager, Role::CdManager] {
                for action in [Action::ApproveFinal, Action::RejectFinal] {
                    let rule = table
                        .authorize(role, action, Some(&RequestState::AwaitingFinal))
                        .unwrap();
                    assert_eq!(rule.holder, Holder::CurrentApprover);
                }
            }
            assert!(table
                .authorize(Role::TtsApprover, Action::ApproveFinal, Some(&RequestState::AwaitingFinal))
                .is_err());
        }
    }

    #[test]
    fn test_legacy_routing() {
        let table = TransitionTable::new(RoutingMode::LegacyCogs);
        let rule = table
            .authorize(Role::TtsApprover, Action::ApproveTts, Some(&RequestState::PendingTts))
            .unwrap();
        assert_eq!(rule.target(&RequestState::PendingTts), RequestState::AwaitingCogs);

        let rule = table
            .authorize(Role::CogsApprover, Action::ApproveCogs, Some(&RequestState::AwaitingCogs))
            .unwrap();
        assert_eq!(rule.assignment, Assignment::ManagerThenCountryCdManager);

        let rule = table
            .authorize(Role::CdManager, Action::ApproveFinal, Some(&RequestState::AwaitingFinal))
            .unwrap();
        assert_eq!(rule.target(&RequestState::AwaitingFinal), RequestState::RequestApproved);
    }

    #[test]
    fn test_close_allowed_for_every_role_on_active_states_only() {
        let table = TransitionTable::default();
        for role in Role::ALL {
            let rule = table
                .authorize(role, Action::Close, Some(&RequestState::AwaitingFinal))
                .unwrap();
            assert_eq!(rule.holder, Holder::Participant);
            assert!(rule.target(&RequestState::AwaitingFinal).is_inactive());
        }

        let err = table
            .authorize(Role::Admin, Action::Close, Some(&RequestState::RequestApproved))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn test_allowed_actions_for_tts_approver() {
        let table = TransitionTable::default();
        let actions = table.allowed_actions(Role::TtsApprover, &RequestState::PendingTts);
        assert!(actions.contains(&Action::ApproveTts));
        assert!(actions.contains(&Action::RejectTts));
        assert!(actions.contains(&Action::CounterProposeTts));
        assert!(actions.contains(&Action::Close));
        assert!(!actions.contains(&Action::ApproveFinal));
    }
}
