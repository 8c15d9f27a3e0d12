//! Service error types

use rsp_errors::AppError;
use thiserror::Error;

use crate::domain::pricing::PricingError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    #[error("Approver not found: {0}")]
    ApproverNotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// 数据存储等基础设施故障
    #[error(transparent)]
    Infrastructure(#[from] AppError),
}

impl ServiceError {
    /// 指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::DivisionByZero(_) => "division_by_zero",
            Self::ApproverNotFound(_) => "approver_not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Infrastructure(_) => "infrastructure",
        }
    }
}

impl From<PricingError> for ServiceError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            PricingError::DivisionByZero(what) => ServiceError::DivisionByZero(what.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(msg) => AppError::validation(msg),
            ServiceError::Validation(msg) => AppError::validation(msg),
            ServiceError::DivisionByZero(msg) => {
                AppError::unprocessable(format!("Division by zero: {}", msg))
            }
            ServiceError::ApproverNotFound(msg) => {
                AppError::failed_precondition(format!("Approver not found: {}", msg))
            }
            // 调用方身份已知，只是无权执行该操作
            ServiceError::Unauthorized(msg) => AppError::forbidden(msg),
            ServiceError::Conflict(msg) => AppError::conflict(msg),
            ServiceError::NotFound(msg) => AppError::not_found(msg),
            ServiceError::Infrastructure(e) => e,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_maps_to_http_status() {
        let cases = [
            (ServiceError::InvalidInput("rsp".into()), 400),
            (ServiceError::Validation("tts".into()), 400),
            (ServiceError::DivisionByZero("to".into()), 422),
            (ServiceError::ApproverNotFound("cdmanager".into()), 412),
            (ServiceError::Unauthorized("role".into()), 403),
            (ServiceError::Conflict("stale".into()), 409),
            (ServiceError::NotFound("request".into()), 404),
            (ServiceError::Infrastructure(AppError::database("down")), 500),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_pricing_error_conversion() {
        let err: ServiceError = PricingError::DivisionByZero("trade output").into();
        assert!(matches!(err, ServiceError::DivisionByZero(ref m) if m == "trade output"));
    }
}
