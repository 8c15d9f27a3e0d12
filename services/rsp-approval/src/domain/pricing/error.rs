//! 价格计算错误

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Invalid pricing input: {0}")]
    InvalidInput(String),

    #[error("Division by zero: {0}")]
    DivisionByZero(&'static str),
}

pub type PricingResultOf<T> = Result<T, PricingError>;
