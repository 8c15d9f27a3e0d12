//! 仓储接口

mod approval_request_repository;
mod master_price_repository;
mod reference_data_repository;

pub use approval_request_repository::*;
pub use master_price_repository::*;
pub use reference_data_repository::*;
