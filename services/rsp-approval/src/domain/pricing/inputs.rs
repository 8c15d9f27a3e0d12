//! 价格计算输入

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PricingError, PricingResultOf, derive_cogs_per_case};

/// 费率集合（均为小数，如 0.05 表示 5%）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RateSet {
    pub vat: Decimal,
    /// Retail markup
    pub rm: Decimal,
    /// Wholesale markup
    pub wsm: Decimal,
    /// Distributor markup
    pub dm: Decimal,
    pub duty: Decimal,
    pub clearing_charges: Decimal,
    /// Buying discount
    pub bd: Decimal,
    /// Cost-per-piece load
    pub cpp: Decimal,
}

impl RateSet {
    /// 所有费率必须非负
    pub fn validate(&self) -> PricingResultOf<()> {
        let named = [
            ("vat", self.vat),
            ("rm", self.rm),
            ("wsm", self.wsm),
            ("dm", self.dm),
            ("duty", self.duty),
            ("clearing_charges", self.clearing_charges),
            ("bd", self.bd),
            ("cpp", self.cpp),
        ];

        for (name, value) in named {
            if value < Decimal::ZERO {
                return Err(PricingError::InvalidInput(format!(
                    "rate '{}' must be non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// 单个 SKU 在单个国家的计算输入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInputs {
    pub rates: RateSet,
    pub pieces_per_case: Decimal,
    /// 贸易费用百分比（5 表示 5%）
    pub tts_percentage: Decimal,
    /// 每箱本币 COGS
    pub cogs_per_case: Decimal,
}

/// SKU 描述属性，仅用于展示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SkuAttributes {
    pub brand: Option<String>,
    pub sector: Option<String>,
    pub flavor: Option<String>,
    pub format: Option<String>,
    pub packing: Option<String>,
}

/// SKU × 国家 参考数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuPricingInputs {
    pub sku_code: String,
    pub country: String,
    pub description: String,
    pub attributes: SkuAttributes,
    pub rates: RateSet,
    /// 主表中的 TTS 费率（小数）
    pub tts_rate: Decimal,
    pub pieces_per_case: Decimal,
    pub case_per_ton: Decimal,
    pub currency: String,
    /// 每吨美元成本
    pub cogs_usd: Decimal,
    /// 本币兑换率
    pub currency_rate: Decimal,
}

impl SkuPricingInputs {
    /// 展示给计算器的 TTS 百分比
    pub fn tts_percentage(&self) -> Decimal {
        self.tts_rate * Decimal::ONE_HUNDRED
    }

    /// 每箱本币 COGS
    pub fn cogs_per_case(&self) -> PricingResultOf<Decimal> {
        derive_cogs_per_case(self.cogs_usd, self.currency_rate, self.case_per_ton)
    }

    /// 转换为计算输入，可覆盖 TTS 百分比
    pub fn to_pricing_inputs(
        &self,
        tts_percentage: Option<Decimal>,
    ) -> PricingResultOf<PricingInputs> {
        Ok(PricingInputs {
            rates: self.rates,
            pieces_per_case: self.pieces_per_case,
            tts_percentage: tts_percentage.unwrap_or_else(|| self.tts_percentage()),
            cogs_per_case: self.cogs_per_case()?,
        })
    }
}
