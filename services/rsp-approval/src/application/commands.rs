//! 流程命令定义

use rust_decimal::Decimal;

use crate::domain::request::{Actor, ApprovalRequestId};
use crate::error::{ServiceError, ServiceResult};

/// TTS 百分比上限
const MAX_TTS_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;

pub(crate) fn validate_tts_percentage(tts_percentage: Decimal) -> ServiceResult<()> {
    if tts_percentage < Decimal::ZERO {
        return Err(ServiceError::InvalidInput(
            "TTS percentage must be non-negative".to_string(),
        ));
    }
    if tts_percentage > MAX_TTS_PERCENTAGE {
        return Err(ServiceError::Validation(format!(
            "TTS percentage cannot exceed 100, got {}",
            tts_percentage
        )));
    }
    Ok(())
}

fn validate_rsp(rsp: Decimal) -> ServiceResult<()> {
    if rsp <= Decimal::ZERO {
        return Err(ServiceError::InvalidInput(format!(
            "RSP must be positive, got {}",
            rsp
        )));
    }
    Ok(())
}

/// 提交定价申请
#[derive(Debug, Clone)]
pub struct SubmitRequestCommand {
    pub actor: Actor,
    pub sku_code: String,
    pub country: String,
    pub rsp: Decimal,
    /// 不填时使用主表中的 TTS%
    pub tts_percentage: Option<Decimal>,
}

impl SubmitRequestCommand {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.sku_code.trim().is_empty() {
            return Err(ServiceError::InvalidInput("SKU code cannot be empty".to_string()));
        }
        if self.country.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Country cannot be empty".to_string()));
        }
        validate_rsp(self.rsp)?;
        if let Some(tts) = self.tts_percentage {
            validate_tts_percentage(tts)?;
        }
        Ok(())
    }
}

/// 无附加参数的流程动作
#[derive(Debug, Clone)]
pub struct TransitionCommand {
    pub actor: Actor,
    pub request_id: ApprovalRequestId,
}

impl TransitionCommand {
    pub fn new(actor: Actor, request_id: ApprovalRequestId) -> Self {
        Self { actor, request_id }
    }
}

/// TTS 审批人提出新的 TTS%
#[derive(Debug, Clone)]
pub struct ChangeTtsCommand {
    pub actor: Actor,
    pub request_id: ApprovalRequestId,
    pub tts_percentage: Decimal,
}

impl ChangeTtsCommand {
    pub fn validate(&self) -> ServiceResult<()> {
        validate_tts_percentage(self.tts_percentage)
    }
}

/// 申请人修改 RSP
#[derive(Debug, Clone)]
pub struct ReviseRspCommand {
    pub actor: Actor,
    pub request_id: ApprovalRequestId,
    pub rsp: Decimal,
}

impl ReviseRspCommand {
    pub fn validate(&self) -> ServiceResult<()> {
        validate_rsp(self.rsp)
    }
}

/// 管理员更新国家汇率
#[derive(Debug, Clone)]
pub struct UpdateCurrencyRateCommand {
    pub actor: Actor,
    pub country: String,
    pub to_usd: Decimal,
}

impl UpdateCurrencyRateCommand {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.to_usd <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Currency rate must be positive, got {}",
                self.to_usd
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::Role;
    use rsp_common::UserId;
    use rust_decimal_macros::dec;

    fn marketing() -> Actor {
        Actor::new(UserId::new(), "Mona", Role::Marketing)
    }

    #[test]
    fn test_tts_above_hundred_is_validation_error() {
        let cmd = ChangeTtsCommand {
            actor: marketing(),
            request_id: ApprovalRequestId::new(),
            tts_percentage: dec!(100.01),
        };
        assert!(matches!(cmd.validate(), Err(ServiceError::Validation(_))));

        let cmd = ChangeTtsCommand {
            tts_percentage: dec!(100),
            ..cmd
        };
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_submit_requires_positive_rsp() {
        let cmd = SubmitRequestCommand {
            actor: marketing(),
            sku_code: "SKU1".to_string(),
            country: "Qatar".to_string(),
            rsp: dec!(0),
            tts_percentage: None,
        };
        assert!(matches!(cmd.validate(), Err(ServiceError::InvalidInput(_))));
    }
}
