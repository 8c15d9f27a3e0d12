//! 价格预览与参考数据服务

use std::sync::Arc;

use rsp_telemetry::record_calculation;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use super::commands::{UpdateCurrencyRateCommand, validate_tts_percentage};
use crate::domain::pricing::{PricingInputs, PricingResult, SkuPricingInputs, calculate};
use crate::domain::request::Role;
use crate::domain::unit_of_work::UnitOfWorkFactory;
use crate::error::{ServiceError, ServiceResult};

/// SKU 参考数据及派生值
#[derive(Debug, Clone, Serialize)]
pub struct SkuPricingView {
    pub inputs: SkuPricingInputs,
    pub tts_percentage: Decimal,
    pub cogs_per_case: Decimal,
}

/// 基于主数据的价格预览
#[derive(Debug, Clone, Serialize)]
pub struct PricingPreview {
    pub sku: SkuPricingView,
    pub result: PricingResult,
}

/// 价格预览服务，不做持久化
pub struct PricingService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl PricingService {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    /// 按显式输入计算，结果已舍入到两位小数
    pub fn calculate(&self, inputs: &PricingInputs, rsp: Decimal) -> ServiceResult<PricingResult> {
        validate_tts_percentage(inputs.tts_percentage)?;
        let result = calculate(inputs, rsp);
        record_calculation("explicit", if result.is_ok() { "ok" } else { "error" });
        Ok(result?.rounded())
    }

    /// 使用主数据计算
    pub async fn preview(
        &self,
        sku_code: &str,
        country: &str,
        rsp: Decimal,
        tts_percentage: Option<Decimal>,
    ) -> ServiceResult<PricingPreview> {
        if let Some(tts_percentage) = tts_percentage {
            validate_tts_percentage(tts_percentage)?;
        }
        let sku = self.sku_inputs(sku_code, country).await?;
        let inputs = sku.inputs.to_pricing_inputs(tts_percentage)?;

        let result = calculate(&inputs, rsp);
        record_calculation("stored", if result.is_ok() { "ok" } else { "error" });

        Ok(PricingPreview {
            sku,
            result: result?.rounded(),
        })
    }

    /// SKU × 国家 参考数据
    pub async fn sku_inputs(&self, sku_code: &str, country: &str) -> ServiceResult<SkuPricingView> {
        let uow = self.uow_factory.begin().await?;
        let inputs = uow.reference().find_sku_inputs(sku_code, country).await;
        uow.commit().await?;

        let inputs = inputs?.ok_or_else(|| {
            ServiceError::NotFound(format!("SKU {} does not exist for {}", sku_code, country))
        })?;

        Ok(SkuPricingView {
            tts_percentage: inputs.tts_percentage(),
            cogs_per_case: inputs.cogs_per_case()?,
            inputs,
        })
    }

    /// 所有 SKU 编码
    pub async fn list_skus(&self) -> ServiceResult<Vec<String>> {
        let uow = self.uow_factory.begin().await?;
        let skus = uow.reference().list_sku_codes().await;
        uow.commit().await?;
        Ok(skus?)
    }

    /// 更新国家汇率（仅管理员）
    pub async fn update_currency_rate(&self, cmd: UpdateCurrencyRateCommand) -> ServiceResult<()> {
        if cmd.actor.role != Role::Admin {
            return Err(ServiceError::Unauthorized(
                "only admins may update currency rates".to_string(),
            ));
        }
        cmd.validate()?;

        let uow = self.uow_factory.begin().await?;
        match uow
            .reference()
            .update_currency_rate(&cmd.country, cmd.to_usd)
            .await
        {
            Ok(0) => {
                super::rollback_quietly(uow).await;
                Err(ServiceError::NotFound(format!(
                    "no currency rate for {}",
                    cmd.country
                )))
            }
            Ok(_) => {
                uow.commit().await?;
                info!(country = %cmd.country, to_usd = %cmd.to_usd, "Currency rate updated");
                Ok(())
            }
            Err(e) => {
                super::rollback_quietly(uow).await;
                Err(e.into())
            }
        }
    }
}
