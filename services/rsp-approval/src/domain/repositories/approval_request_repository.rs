//! 审批请求仓储接口

use async_trait::async_trait;
use rsp_common::{PagedResult, Pagination, UserId};
use rsp_errors::AppResult;

use crate::domain::request::{ApprovalRequest, ApprovalRequestId, RequestState, TransitionGuard};

/// 列表过滤条件，`INACTIVE` 的请求永远不出现在列表中
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub current_approver_id: Option<UserId>,
    pub requester_id: Option<UserId>,
    pub state: Option<RequestState>,
}

impl RequestFilter {
    pub fn inbox(user: UserId) -> Self {
        Self {
            current_approver_id: Some(user),
            ..Default::default()
        }
    }

    pub fn requested_by(user: UserId) -> Self {
        Self {
            requester_id: Some(user),
            ..Default::default()
        }
    }

    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        if request.state.is_inactive() {
            return false;
        }
        if let Some(approver) = &self.current_approver_id
            && request.current_approver_id.as_ref() != Some(approver)
        {
            return false;
        }
        if let Some(requester) = &self.requester_id
            && &request.requester_id != requester
        {
            return false;
        }
        if let Some(state) = &self.state
            && &request.state != state
        {
            return false;
        }
        true
    }
}

/// 审批请求仓储接口
#[async_trait]
pub trait ApprovalRequestRepository: Send + Sync {
    /// 根据 ID 查找
    async fn find_by_id(&self, id: &ApprovalRequestId) -> AppResult<Option<ApprovalRequest>>;

    /// 查找同一 SKU + 国家下仍在流转中的请求
    async fn find_active(&self, sku_code: &str, country: &str) -> AppResult<Vec<ApprovalRequest>>;

    /// 新建
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<()>;

    /// 条件更新，返回受影响行数
    ///
    /// 仅当 id、当前审批人、status、approval_type 都与 `guard` 一致时才更新。
    async fn update_guarded(
        &self,
        request: &ApprovalRequest,
        guard: &TransitionGuard,
    ) -> AppResult<u64>;

    /// 删除
    async fn delete(&self, id: &ApprovalRequestId) -> AppResult<u64>;

    /// 分页列表，按更新时间倒序
    async fn list(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> AppResult<PagedResult<ApprovalRequest>>;
}
