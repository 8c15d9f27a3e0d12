//! 领域层

pub mod pricing;
pub mod reference;
pub mod repositories;
pub mod request;
pub mod unit_of_work;
