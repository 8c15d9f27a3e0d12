//! 审批请求查询

use std::sync::Arc;

use rsp_common::{PagedResult, Pagination};

use crate::domain::repositories::RequestFilter;
use crate::domain::request::{Actor, ApprovalRequest, ApprovalRequestId, RequestState, Role};
use crate::domain::unit_of_work::UnitOfWorkFactory;
use crate::error::{ServiceError, ServiceResult};

/// 审批请求查询处理器
///
/// 导出和报表直接使用这里返回的完整 [`ApprovalRequest`]。
pub struct RequestQueryHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl RequestQueryHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    /// 按 ID 读取
    pub async fn get(&self, id: &ApprovalRequestId) -> ServiceResult<ApprovalRequest> {
        let uow = self.uow_factory.begin().await?;
        let request = uow.requests().find_by_id(id).await;
        uow.commit().await?;

        request?.ok_or_else(|| ServiceError::NotFound(format!("request {}", id)))
    }

    /// 待我审批
    pub async fn inbox(
        &self,
        actor: &Actor,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<ApprovalRequest>> {
        self.list(&RequestFilter::inbox(actor.id.clone()), pagination)
            .await
    }

    /// 我提交的
    pub async fn mine(
        &self,
        actor: &Actor,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<ApprovalRequest>> {
        self.list(&RequestFilter::requested_by(actor.id.clone()), pagination)
            .await
    }

    /// 管理员查看全部
    pub async fn list_all(
        &self,
        actor: &Actor,
        state: Option<RequestState>,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<ApprovalRequest>> {
        if actor.role != Role::Admin {
            return Err(ServiceError::Unauthorized(
                "only admins may list all requests".to_string(),
            ));
        }

        let filter = RequestFilter {
            state,
            ..Default::default()
        };
        self.list(&filter, pagination).await
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<ApprovalRequest>> {
        let uow = self.uow_factory.begin().await?;
        let page = uow.requests().list(filter, pagination).await;
        uow.commit().await?;
        Ok(page?)
    }
}
