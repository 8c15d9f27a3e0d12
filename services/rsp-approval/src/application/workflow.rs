//! 审批流程处理器
//!
//! 每个动作在一个 Unit of Work 内完成：读取请求、查表鉴权、解析审批人、
//! 条件更新，终审时再写回主数据。任何一步失败都整体回滚。

use std::sync::Arc;

use chrono::Utc;
use rsp_errors::AppError;
use rsp_telemetry::record_transition;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::commands::*;
use super::rollback_quietly;
use crate::domain::pricing::calculate;
use crate::domain::reference::User;
use crate::domain::repositories::CountryPrice;
use crate::domain::request::{
    Action, Actor, ApprovalRequest, ApproverAssignment, Assignment, Holder, NewApprovalRequest,
    PricingSnapshot, RequestState, Role, TransitionTable,
};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use crate::error::{ServiceError, ServiceResult};

/// 解析后的审批人
struct ResolvedApprovers {
    assignment: ApproverAssignment,
    current_name: Option<String>,
}

/// 审批流程处理器
pub struct WorkflowHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    table: TransitionTable,
}

impl WorkflowHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>, table: TransitionTable) -> Self {
        Self { uow_factory, table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// 提交定价申请
    pub async fn submit(&self, cmd: SubmitRequestCommand) -> ServiceResult<ApprovalRequest> {
        let uow = self.uow_factory.begin().await?;
        let result = self.submit_in(uow.as_ref(), &cmd).await;
        let result = finish(uow, result).await;
        observe(Action::Submit, &cmd.actor, &result);
        result
    }

    /// TTS 审批通过
    pub async fn approve_tts(&self, cmd: TransitionCommand) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::ApproveTts, cmd, |_| Ok(())).await
    }

    /// TTS 审批驳回
    pub async fn reject_tts(&self, cmd: TransitionCommand) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::RejectTts, cmd, |_| Ok(())).await
    }

    /// TTS 审批人提出新的 TTS%，退回申请人确认
    pub async fn counter_propose_tts(
        &self,
        cmd: ChangeTtsCommand,
    ) -> ServiceResult<ApprovalRequest> {
        cmd.validate()?;
        let tts_percentage = cmd.tts_percentage;
        self.transition(
            Action::CounterProposeTts,
            TransitionCommand::new(cmd.actor, cmd.request_id),
            move |request| Ok(request.change_tts(tts_percentage)?),
        )
        .await
    }

    /// 申请人接受新的 TTS%
    pub async fn accept_counter_proposal(
        &self,
        cmd: TransitionCommand,
    ) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::AcceptCounterProposal, cmd, |_| Ok(()))
            .await
    }

    /// 申请人改用新的 RSP
    pub async fn revise_rsp(&self, cmd: ReviseRspCommand) -> ServiceResult<ApprovalRequest> {
        cmd.validate()?;
        let rsp = cmd.rsp;
        self.transition(
            Action::ReviseRsp,
            TransitionCommand::new(cmd.actor, cmd.request_id),
            move |request| Ok(request.change_rsp(rsp)?),
        )
        .await
    }

    /// COGS 审批通过（旧流程）
    pub async fn approve_cogs(&self, cmd: TransitionCommand) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::ApproveCogs, cmd, |_| Ok(())).await
    }

    /// COGS 审批驳回（旧流程）
    pub async fn reject_cogs(&self, cmd: TransitionCommand) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::RejectCogs, cmd, |_| Ok(())).await
    }

    /// 预审通过
    pub async fn approve_pre_final(
        &self,
        cmd: TransitionCommand,
    ) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::ApprovePreFinal, cmd, |_| Ok(())).await
    }

    /// 预审驳回
    pub async fn reject_pre_final(
        &self,
        cmd: TransitionCommand,
    ) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::RejectPreFinal, cmd, |_| Ok(())).await
    }

    /// 终审通过，写回主数据
    pub async fn approve_final(&self, cmd: TransitionCommand) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::ApproveFinal, cmd, |_| Ok(())).await
    }

    /// 终审驳回
    pub async fn reject_final(&self, cmd: TransitionCommand) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::RejectFinal, cmd, |_| Ok(())).await
    }

    /// 关闭（撤回）请求
    pub async fn close(&self, cmd: TransitionCommand) -> ServiceResult<ApprovalRequest> {
        self.transition(Action::Close, cmd, |_| Ok(())).await
    }

    async fn transition<F>(
        &self,
        action: Action,
        cmd: TransitionCommand,
        mutate: F,
    ) -> ServiceResult<ApprovalRequest>
    where
        F: FnOnce(&mut ApprovalRequest) -> ServiceResult<()> + Send,
    {
        let uow = self.uow_factory.begin().await?;
        let result = self.transition_in(uow.as_ref(), action, &cmd, mutate).await;
        let result = finish(uow, result).await;
        observe(action, &cmd.actor, &result);
        result
    }

    async fn submit_in(
        &self,
        uow: &dyn UnitOfWork,
        cmd: &SubmitRequestCommand,
    ) -> ServiceResult<ApprovalRequest> {
        let rule = self.table.authorize(cmd.actor.role, Action::Submit, None)?;
        cmd.validate()?;

        let inputs = uow
            .reference()
            .find_sku_inputs(&cmd.sku_code, &cmd.country)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "SKU {} does not exist for {}",
                    cmd.sku_code, cmd.country
                ))
            })?;
        let pricing_inputs = inputs.to_pricing_inputs(cmd.tts_percentage)?;
        let result = calculate(&pricing_inputs, cmd.rsp)?;

        let resolved = self
            .resolve_approvers(uow, rule.assignment, &cmd.country, None)
            .await?;

        let now = Utc::now();

        // 同一 SKU + 国家只保留一条流转中的请求
        for mut existing in uow
            .requests()
            .find_active(&cmd.sku_code, &cmd.country)
            .await?
        {
            if existing.state == RequestState::PendingTts && existing.request_code.same_month(now)
            {
                uow.requests().delete(&existing.id).await?;
                info!(request_id = %existing.id, "Superseded pending request removed");
            } else {
                let guard = existing.guard();
                existing.deactivate(&cmd.actor, now);
                if uow.requests().update_guarded(&existing, &guard).await? == 0 {
                    return Err(ServiceError::Conflict(format!(
                        "request {} changed while being superseded",
                        existing.id
                    )));
                }
                info!(request_id = %existing.id, "Superseded request marked inactive");
            }
        }

        let request = ApprovalRequest::submit(
            NewApprovalRequest {
                sku_code: inputs.sku_code.clone(),
                country: inputs.country.clone(),
                sku_description: inputs.description.clone(),
                snapshot: PricingSnapshot::new(&pricing_inputs, &result),
                requester: cmd.actor.clone(),
                approvers: resolved.assignment,
                approver_name: resolved.current_name.unwrap_or_default(),
            },
            now,
        );
        uow.requests().insert(&request).await?;

        Ok(request)
    }

    async fn transition_in<F>(
        &self,
        uow: &dyn UnitOfWork,
        action: Action,
        cmd: &TransitionCommand,
        mutate: F,
    ) -> ServiceResult<ApprovalRequest>
    where
        F: FnOnce(&mut ApprovalRequest) -> ServiceResult<()> + Send,
    {
        let actor = &cmd.actor;
        let mut request = uow
            .requests()
            .find_by_id(&cmd.request_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("request {}", cmd.request_id)))?;

        let rule = self.table.authorize(actor.role, action, Some(&request.state))?;
        ensure_holder(rule.holder, &request, actor)?;

        let guard = request.guard();
        let from = request.state;

        mutate(&mut request)?;

        let resolved = self
            .resolve_approvers(uow, rule.assignment, &request.country, Some(&request))
            .await?;
        request.apply_transition(rule.target(&from), resolved.assignment, actor, Utc::now());

        if uow.requests().update_guarded(&request, &guard).await? == 0 {
            return Err(ServiceError::Conflict(format!(
                "request {} is no longer in state {}",
                request.id, from
            )));
        }

        if rule.commits_masters() {
            commit_masters(uow, &request).await?;
        }

        Ok(request)
    }

    async fn resolve_approvers(
        &self,
        uow: &dyn UnitOfWork,
        assignment: Assignment,
        country: &str,
        existing: Option<&ApprovalRequest>,
    ) -> ServiceResult<ResolvedApprovers> {
        let (current, next) = match assignment {
            Assignment::TtsApproverThen(next_role) => {
                let current = user_with_role(uow, Role::TtsApprover).await?;
                let next = user_with_role(uow, next_role).await?;
                (Some(current), Some(next.id))
            }
            Assignment::CountryCdManagerThenManager => {
                let current = country_cd_manager(uow, country).await?;
                let next = user_with_role(uow, Role::Manager).await?;
                (Some(current), Some(next.id))
            }
            Assignment::CogsApproverThenManager => {
                let current = user_with_role(uow, Role::CogsApprover).await?;
                let next = user_with_role(uow, Role::Manager).await?;
                (Some(current), Some(next.id))
            }
            Assignment::ManagerThenCountryCdManager => {
                let current = user_with_role(uow, Role::Manager).await?;
                let next = country_cd_manager(uow, country).await?;
                (Some(current), Some(next.id))
            }
            Assignment::NextApprover => {
                let next_id = existing
                    .and_then(|r| r.next_approver_id.clone())
                    .ok_or_else(|| {
                        ServiceError::ApproverNotFound("no next approver recorded".to_string())
                    })?;
                return Ok(ResolvedApprovers {
                    assignment: ApproverAssignment {
                        current: Some(next_id),
                        next: None,
                    },
                    current_name: None,
                });
            }
            Assignment::Requester => {
                let request = existing_request(existing)?;
                return Ok(ResolvedApprovers {
                    assignment: ApproverAssignment {
                        current: Some(request.requester_id.clone()),
                        next: request.next_approver_id.clone(),
                    },
                    current_name: Some(request.requester_name.clone()),
                });
            }
            Assignment::Clear => (None, None),
            Assignment::ClearCurrent => {
                let request = existing_request(existing)?;
                return Ok(ResolvedApprovers {
                    assignment: ApproverAssignment {
                        current: None,
                        next: request.next_approver_id.clone(),
                    },
                    current_name: None,
                });
            }
        };

        Ok(ResolvedApprovers {
            current_name: current.as_ref().map(|u| u.name.clone()),
            assignment: ApproverAssignment {
                current: current.map(|u| u.id),
                next,
            },
        })
    }
}

fn existing_request(existing: Option<&ApprovalRequest>) -> ServiceResult<&ApprovalRequest> {
    existing.ok_or_else(|| {
        ServiceError::Infrastructure(AppError::internal(
            "assignment requires an existing request",
        ))
    })
}

fn ensure_holder(holder: Holder, request: &ApprovalRequest, actor: &Actor) -> ServiceResult<()> {
    let allowed = match holder {
        Holder::Anyone => true,
        Holder::CurrentApprover => request.is_current_approver(&actor.id),
        Holder::Participant => {
            actor.role == Role::Admin
                || request.is_requester(&actor.id)
                || request.is_current_approver(&actor.id)
        }
    };

    if !allowed {
        return Err(ServiceError::Unauthorized(format!(
            "user {} is not the current approver of request {}",
            actor.id, request.id
        )));
    }
    Ok(())
}

async fn user_with_role(uow: &dyn UnitOfWork, role: Role) -> ServiceResult<User> {
    uow.reference()
        .find_user_by_role(role)
        .await?
        .ok_or_else(|| ServiceError::ApproverNotFound(format!("no user with role '{}'", role)))
}

/// 国家 CD 经理按姓名 + 角色解析
async fn country_cd_manager(uow: &dyn UnitOfWork, country: &str) -> ServiceResult<User> {
    let details = uow
        .reference()
        .find_country(country)
        .await?
        .ok_or_else(|| {
            ServiceError::ApproverNotFound(format!("no country details for '{}'", country))
        })?;

    let name = details.cd_manager.ok_or_else(|| {
        ServiceError::ApproverNotFound(format!("no CD manager configured for '{}'", country))
    })?;

    uow.reference()
        .find_user_by_role_and_name(Role::CdManager, &name)
        .await?
        .ok_or_else(|| {
            ServiceError::ApproverNotFound(format!(
                "CD manager '{}' for '{}' has no user account",
                name, country
            ))
        })
}

async fn commit_masters(uow: &dyn UnitOfWork, request: &ApprovalRequest) -> ServiceResult<()> {
    let result = &request.snapshot.result;
    let tts_rate = result.tts_percentage / Decimal::ONE_HUNDRED;

    if uow
        .masters()
        .update_trade_spend(&request.sku_code, tts_rate)
        .await?
        == 0
    {
        return Err(ServiceError::NotFound(format!(
            "trade-spend master has no row for SKU {}",
            request.sku_code
        )));
    }

    let price = CountryPrice {
        bptt: result.bptt,
        cif: result.cif,
        rsp_per_case: result.rsp_per_case,
    };
    if uow
        .masters()
        .update_country_price(&request.country, &request.sku_code, &price)
        .await?
        == 0
    {
        return Err(ServiceError::NotFound(format!(
            "{} price master has no row for SKU {}",
            request.country, request.sku_code
        )));
    }

    info!(
        request_id = %request.id,
        sku_code = %request.sku_code,
        country = %request.country,
        "Master prices committed"
    );
    Ok(())
}

/// 成功提交，失败回滚
async fn finish<T>(uow: Box<dyn UnitOfWork>, result: ServiceResult<T>) -> ServiceResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            rollback_quietly(uow).await;
            Err(e)
        }
    }
}

fn observe(action: Action, actor: &Actor, result: &ServiceResult<ApprovalRequest>) {
    match result {
        Ok(request) => {
            record_transition(action.as_str(), "ok");
            info!(
                action = action.as_str(),
                request_id = %request.id,
                request_code = %request.request_code,
                actor = %actor.id,
                state = %request.state,
                "Workflow transition applied"
            );
        }
        Err(e) => {
            record_transition(action.as_str(), e.kind());
            warn!(
                action = action.as_str(),
                actor = %actor.id,
                role = %actor.role,
                error = %e,
                "Workflow transition rejected"
            );
        }
    }
}
