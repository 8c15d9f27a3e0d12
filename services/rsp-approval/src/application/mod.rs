//! 应用层

pub mod commands;
pub mod pricing;
pub mod queries;
pub mod workflow;

pub use commands::*;
pub use pricing::{PricingPreview, PricingService, SkuPricingView};
pub use queries::RequestQueryHandler;
pub use workflow::WorkflowHandler;

use rsp_errors::AppResult;
use tracing::warn;

use crate::domain::unit_of_work::UnitOfWork;

/// 回滚失败只记录日志，调用方返回原始错误
pub(crate) async fn rollback_quietly(uow: Box<dyn UnitOfWork>) {
    let result: AppResult<()> = uow.rollback().await;
    if let Err(e) = result {
        warn!(error = %e, "Failed to rollback transaction");
    }
}
