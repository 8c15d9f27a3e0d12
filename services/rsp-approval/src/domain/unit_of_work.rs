//! Unit of Work 模式
//!
//! 每次流程迁移在一个事务内完成。

use async_trait::async_trait;
use rsp_errors::AppResult;

use crate::domain::repositories::{
    ApprovalRequestRepository, MasterPriceRepository, ReferenceDataRepository,
};

/// Unit of Work trait
///
/// ```ignore
/// let uow = uow_factory.begin().await?;
/// uow.requests().insert(&request).await?;
/// uow.commit().await?;
/// ```
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 获取审批请求 Repository
    fn requests(&self) -> &dyn ApprovalRequestRepository;

    /// 获取参考数据 Repository
    fn reference(&self) -> &dyn ReferenceDataRepository;

    /// 获取主价格 Repository
    fn masters(&self) -> &dyn MasterPriceRepository;

    /// 提交事务
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Unit of Work 工厂 trait
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// 开始新的事务
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}
