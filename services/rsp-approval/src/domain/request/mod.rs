//! 审批请求聚合与状态机

mod actor;
mod approval_request;
mod role;
mod state;
mod transition;

pub use actor::*;
pub use approval_request::*;
pub use role::*;
pub use state::*;
pub use transition::*;
