//! RSP 定价与审批服务
//!
//! 按 SKU × 国家从零售价反推整条价格链，并驱动多角色审批流程，
//! 终审通过后写回贸易费用与国家价格主数据。

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ServiceError, ServiceResult};
