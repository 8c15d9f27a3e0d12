//! 审批流程测试（进程内存储）

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rsp_approval::ServiceError;
use rsp_approval::application::{
    ChangeTtsCommand, RequestQueryHandler, ReviseRspCommand, SubmitRequestCommand,
    TransitionCommand, WorkflowHandler,
};
use rsp_approval::domain::reference::User;
use rsp_approval::domain::request::{
    Actor, ApprovalRequest, ApprovalType, RequestCode, RequestState, Role, RoutingMode,
    TransitionTable,
};
use rsp_approval::infrastructure::persistence::{InMemoryStore, MemoryData};
use rsp_common::Pagination;
use rust_decimal_macros::dec;

const SKU: &str = "SKU-1001";
const COUNTRY: &str = "Qatar";

struct Fixture {
    store: InMemoryStore,
    workflow: WorkflowHandler,
    queries: RequestQueryHandler,
    data: MemoryData,
}

impl Fixture {
    fn new(mode: RoutingMode) -> Self {
        Self::with_data(MemoryData::demo(), mode)
    }

    fn with_data(data: MemoryData, mode: RoutingMode) -> Self {
        let store = InMemoryStore::new(data.clone());
        let factory = Arc::new(store.clone());
        Self {
            workflow: WorkflowHandler::new(factory.clone(), TransitionTable::new(mode)),
            queries: RequestQueryHandler::new(factory),
            store,
            data,
        }
    }

    fn user(&self, role: Role) -> User {
        self.data
            .users
            .iter()
            .find(|u| u.role == role)
            .cloned()
            .unwrap()
    }

    fn actor(&self, role: Role) -> Actor {
        let user = self.user(role);
        Actor::new(user.id, user.name, user.role)
    }

    async fn submit(&self) -> ApprovalRequest {
        self.workflow
            .submit(SubmitRequestCommand {
                actor: self.actor(Role::Marketing),
                sku_code: SKU.to_string(),
                country: COUNTRY.to_string(),
                rsp: dec!(10.00),
                tts_percentage: None,
            })
            .await
            .unwrap()
    }

    fn cmd(&self, role: Role, request: &ApprovalRequest) -> TransitionCommand {
        TransitionCommand::new(self.actor(role), request.id)
    }

    async fn stored(&self, request: &ApprovalRequest) -> Option<ApprovalRequest> {
        self.store.snapshot().await.requests.get(&request.id).cloned()
    }
}

// ============ Current Routing ============

#[tokio::test]
async fn test_full_workflow_commits_masters() {
    let fx = Fixture::new(RoutingMode::Current);

    let request = fx.submit().await;
    assert_eq!(request.state, RequestState::PendingTts);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::TtsApprover).id));
    assert_eq!(request.next_approver_id, Some(fx.user(Role::Manager).id));
    assert_eq!(request.snapshot.result.gsv, dec!(145.47));

    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::AwaitingCdManager);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::CdManager).id));

    let request = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::AwaitingFinal);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::Manager).id));
    assert_eq!(request.next_approver_id, None);

    let request = fx
        .workflow
        .approve_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::RequestApproved);
    assert_eq!(request.current_approver_id, None);
    assert_eq!(request.approver_name.as_deref(), Some("Rana Regional"));

    let data = fx.store.snapshot().await;
    let trade = &data.trade_spend[&(SKU.to_string(), COUNTRY.to_string())];
    assert_eq!(trade.tts, dec!(0.05));
    let price = data.country_prices[&(COUNTRY.to_string(), SKU.to_string())];
    assert_eq!(price.bptt, dec!(173.16));
    assert_eq!(price.cif, dec!(149.83));
    assert_eq!(price.rsp_per_case, dec!(228.57));
}

#[tokio::test]
async fn test_counter_proposal_then_accept() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;

    let request = fx
        .workflow
        .counter_propose_tts(ChangeTtsCommand {
            actor: fx.actor(Role::TtsApprover),
            request_id: request.id,
            tts_percentage: dec!(8),
        })
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::TtsCounterProposed);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::Marketing).id));

    let result = request.snapshot.result;
    assert_eq!(result.gsv, dec!(145.47));
    assert_eq!(result.tts, dec!(11.64));
    assert_eq!(result.to, dec!(133.83));
    assert_eq!(result.gp, dec!(93.83));
    assert_eq!(result.gm_percentage, dec!(70.11));

    let request = fx
        .workflow
        .accept_counter_proposal(fx.cmd(Role::Marketing, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::AwaitingCdManager);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::CdManager).id));
}

#[tokio::test]
async fn test_revised_rsp_recomputes_chain() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;
    let request = fx
        .workflow
        .counter_propose_tts(ChangeTtsCommand {
            actor: fx.actor(Role::TtsApprover),
            request_id: request.id,
            tts_percentage: dec!(8),
        })
        .await
        .unwrap();

    let request = fx
        .workflow
        .revise_rsp(ReviseRspCommand {
            actor: fx.actor(Role::Marketing),
            request_id: request.id,
            rsp: dec!(12),
        })
        .await
        .unwrap();

    assert_eq!(request.state, RequestState::AwaitingCdManager);
    let result = request.snapshot.result;
    assert_eq!(result.bptt, dec!(207.79));
    assert_eq!(result.gsv, dec!(174.57));
    assert_eq!(result.tts, dec!(13.97));
    assert_eq!(result.gm_percentage, dec!(75.09));
}

#[tokio::test]
async fn test_rejections_are_terminal() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;

    let rejected = fx
        .workflow
        .reject_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();
    assert_eq!(rejected.state, RequestState::TtsRejected);
    assert_eq!(rejected.current_approver_id, None);

    let err = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_cd_manager_rejects_pre_final() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;
    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();

    let rejected = fx
        .workflow
        .reject_pre_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();
    assert_eq!(rejected.state, RequestState::PreFinalRejected);
    assert_eq!(rejected.state.status(), "Rejected");
    assert_eq!(rejected.current_approver_id, None);
    assert_eq!(rejected.next_approver_id, None);

    let err = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_final_rejection_leaves_masters_untouched() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;
    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();
    let request = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();

    let rejected = fx
        .workflow
        .reject_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap();
    assert_eq!(rejected.state, RequestState::RequestRejected);
    assert_eq!(rejected.current_approver_id, None);

    let key = (COUNTRY.to_string(), SKU.to_string());
    let data = fx.store.snapshot().await;
    assert_eq!(data.country_prices[&key], fx.data.country_prices[&key]);
    assert_eq!(
        data.trade_spend[&(SKU.to_string(), COUNTRY.to_string())].tts,
        dec!(0.05)
    );
}

// ============ Authorization & Guards ============

#[tokio::test]
async fn test_marketing_cannot_approve_tts() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;

    let err = fx
        .workflow
        .approve_tts(fx.cmd(Role::Marketing, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
    assert_eq!(fx.stored(&request).await.unwrap(), request);
}

#[tokio::test]
async fn test_approve_tts_on_wrong_state_is_conflict() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;
    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();

    let err = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(fx.stored(&request).await.unwrap(), request);
}

#[tokio::test]
async fn test_only_current_approver_may_act() {
    let mut data = MemoryData::demo();
    data.users
        .push(User::new("Zed Second", "zed", Role::TtsApprover));
    let fx = Fixture::with_data(data, RoutingMode::Current);
    let request = fx.submit().await;

    let other = fx
        .data
        .users
        .iter()
        .find(|u| u.username == "zed")
        .cloned()
        .unwrap();
    // 按姓名排序第一位的 TTS 审批人才是当前审批人
    assert_eq!(request.current_approver_id, Some(fx.user(Role::TtsApprover).id));

    let err = fx
        .workflow
        .approve_tts(TransitionCommand::new(
            Actor::new(other.id, other.name, other.role),
            request.id,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn test_missing_cd_manager_leaves_request_unchanged() {
    let mut data = MemoryData::demo();
    if let Some(country) = data.countries.get_mut(COUNTRY) {
        country.cd_manager = None;
    }
    let fx = Fixture::with_data(data, RoutingMode::Current);
    let request = fx.submit().await;

    let err = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ApproverNotFound(_)));
    assert_eq!(fx.stored(&request).await.unwrap().state, RequestState::PendingTts);
}

#[tokio::test]
async fn test_tts_over_hundred_is_validation_error() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;

    let err = fx
        .workflow
        .counter_propose_tts(ChangeTtsCommand {
            actor: fx.actor(Role::TtsApprover),
            request_id: request.id,
            tts_percentage: dec!(150),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_unknown_sku_is_not_found() {
    let fx = Fixture::new(RoutingMode::Current);
    let err = fx
        .workflow
        .submit(SubmitRequestCommand {
            actor: fx.actor(Role::Marketing),
            sku_code: "SKU-9999".to_string(),
            country: COUNTRY.to_string(),
            rsp: dec!(10),
            tts_percentage: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

// ============ Superseding ============

#[tokio::test]
async fn test_resubmit_replaces_pending_request() {
    let fx = Fixture::new(RoutingMode::Current);
    let first = fx.submit().await;
    let second = fx.submit().await;

    assert!(fx.stored(&first).await.is_none());
    assert_eq!(fx.stored(&second).await.unwrap().state, RequestState::PendingTts);
}

#[tokio::test]
async fn test_resubmit_deactivates_request_in_progress() {
    let fx = Fixture::new(RoutingMode::Current);
    let first = fx.submit().await;
    let first = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &first))
        .await
        .unwrap();

    let second = fx.submit().await;

    let old = fx.stored(&first).await.unwrap();
    assert_eq!(
        old.state,
        RequestState::Inactive {
            previous: ApprovalType::CdManagerApproval
        }
    );
    assert_eq!(old.current_approver_id, None);

    let mine = fx
        .queries
        .mine(&fx.actor(Role::Marketing), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items[0].id, second.id);

    let inbox = fx
        .queries
        .inbox(&fx.actor(Role::CdManager), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(inbox.total, 0);
}

#[tokio::test]
async fn test_pending_request_from_earlier_month_is_kept_inactive() {
    let mut data = MemoryData::demo();
    let seed = Fixture::with_data(data.clone(), RoutingMode::Current);
    let mut old = seed.submit().await;
    old.request_code =
        RequestCode::generate(SKU, COUNTRY, Utc.with_ymd_and_hms(2000, 1, 15, 9, 0, 0).unwrap());
    data.requests.insert(old.id, old.clone());

    let fx = Fixture::with_data(data, RoutingMode::Current);
    let second = fx.submit().await;
    assert_ne!(second.id, old.id);

    let stored = fx.stored(&old).await.unwrap();
    assert_eq!(
        stored.state,
        RequestState::Inactive {
            previous: ApprovalType::Tts
        }
    );
    assert_eq!(stored.current_approver_id, None);
    assert_eq!(stored.request_code, old.request_code);
}

// ============ Close ============

#[tokio::test]
async fn test_requester_can_close() {
    let fx = Fixture::new(RoutingMode::Current);
    let request = fx.submit().await;

    let err = fx
        .workflow
        .close(fx.cmd(Role::CogsApprover, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));

    let closed = fx
        .workflow
        .close(fx.cmd(Role::Marketing, &request))
        .await
        .unwrap();
    assert!(closed.state.is_inactive());
    assert_eq!(closed.state.approval_type(), ApprovalType::Tts);
    assert_eq!(closed.current_approver_id, None);
}

// ============ Final Commit ============

#[tokio::test]
async fn test_missing_price_master_rolls_back() {
    let mut data = MemoryData::demo();
    data.country_prices.clear();
    let fx = Fixture::with_data(data, RoutingMode::Current);

    let request = fx.submit().await;
    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();
    let request = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();

    let err = fx
        .workflow
        .approve_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    assert_eq!(fx.stored(&request).await.unwrap().state, RequestState::AwaitingFinal);
    let data = fx.store.snapshot().await;
    assert_eq!(
        data.trade_spend[&(SKU.to_string(), COUNTRY.to_string())].tts,
        dec!(0.05)
    );
}

#[tokio::test]
async fn test_approved_tts_updates_every_country_row_of_sku() {
    let mut data = MemoryData::demo();
    let qatar = data.trade_spend[&(SKU.to_string(), COUNTRY.to_string())].clone();
    data.trade_spend.insert((SKU.to_string(), "Oman".to_string()), qatar);
    let fx = Fixture::with_data(data, RoutingMode::Current);

    let request = fx.submit().await;
    let request = fx
        .workflow
        .counter_propose_tts(ChangeTtsCommand {
            actor: fx.actor(Role::TtsApprover),
            request_id: request.id,
            tts_percentage: dec!(8),
        })
        .await
        .unwrap();
    let request = fx
        .workflow
        .accept_counter_proposal(fx.cmd(Role::Marketing, &request))
        .await
        .unwrap();
    let request = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();
    fx.workflow
        .approve_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap();

    // TTS 费率按 SKU 写回，同一 SKU 的其他国家一并更新
    let data = fx.store.snapshot().await;
    assert_eq!(data.trade_spend[&(SKU.to_string(), COUNTRY.to_string())].tts, dec!(0.08));
    assert_eq!(data.trade_spend[&(SKU.to_string(), "Oman".to_string())].tts, dec!(0.08));
}

// ============ Legacy COGS Routing ============

#[tokio::test]
async fn test_legacy_routing_passes_through_cogs() {
    let fx = Fixture::new(RoutingMode::LegacyCogs);

    let request = fx.submit().await;
    assert_eq!(request.next_approver_id, Some(fx.user(Role::CogsApprover).id));

    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::AwaitingCogs);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::CogsApprover).id));

    let request = fx
        .workflow
        .approve_cogs(fx.cmd(Role::CogsApprover, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::AwaitingPreFinal);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::Manager).id));
    assert_eq!(request.next_approver_id, Some(fx.user(Role::CdManager).id));

    let request = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::AwaitingFinal);

    // 旧流程的终审人是 CD 经理
    let err = fx
        .workflow
        .approve_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));

    let request = fx
        .workflow
        .approve_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::RequestApproved);
}

#[tokio::test]
async fn test_legacy_cogs_rejection() {
    let fx = Fixture::new(RoutingMode::LegacyCogs);
    let request = fx.submit().await;
    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();

    let request = fx
        .workflow
        .reject_cogs(fx.cmd(Role::CogsApprover, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::CogsRejected);
}

#[tokio::test]
async fn test_request_started_in_legacy_mode_finishes_after_switch() {
    let fx = Fixture::new(RoutingMode::LegacyCogs);
    let current = WorkflowHandler::new(
        Arc::new(fx.store.clone()),
        TransitionTable::new(RoutingMode::Current),
    );

    let request = fx.submit().await;
    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();
    let request = fx
        .workflow
        .approve_cogs(fx.cmd(Role::CogsApprover, &request))
        .await
        .unwrap();
    let request = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::AwaitingFinal);
    assert_eq!(request.current_approver_id, Some(fx.user(Role::CdManager).id));

    let err = current
        .approve_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));

    let request = current
        .approve_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::RequestApproved);
    assert_eq!(request.current_approver_id, None);
}

#[tokio::test]
async fn test_request_started_in_current_mode_finishes_after_switch() {
    let fx = Fixture::new(RoutingMode::Current);
    let legacy = WorkflowHandler::new(
        Arc::new(fx.store.clone()),
        TransitionTable::new(RoutingMode::LegacyCogs),
    );

    let request = fx.submit().await;
    let request = fx
        .workflow
        .approve_tts(fx.cmd(Role::TtsApprover, &request))
        .await
        .unwrap();
    let request = fx
        .workflow
        .approve_pre_final(fx.cmd(Role::CdManager, &request))
        .await
        .unwrap();
    assert_eq!(request.current_approver_id, Some(fx.user(Role::Manager).id));

    let request = legacy
        .reject_final(fx.cmd(Role::Manager, &request))
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::RequestRejected);
}
