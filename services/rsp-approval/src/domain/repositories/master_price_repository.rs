//! 主价格表仓储接口

use async_trait::async_trait;
use rsp_errors::AppResult;
use rust_decimal::Decimal;

/// 写回国家价格主表的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryPrice {
    pub bptt: Decimal,
    pub cif: Decimal,
    pub rsp_per_case: Decimal,
}

/// 终审通过后写回的主数据
#[async_trait]
pub trait MasterPriceRepository: Send + Sync {
    /// 更新 SKU 的 TTS 费率（小数），返回受影响行数
    ///
    /// 费率表按 `(sku_code, country)` 存储，但这里只按 SKU 匹配：
    /// 同一 SKU 在所有国家的行都会被改写。
    async fn update_trade_spend(&self, sku_code: &str, tts_rate: Decimal) -> AppResult<u64>;

    /// 更新国家价格主表，返回受影响行数
    async fn update_country_price(
        &self,
        country: &str,
        sku_code: &str,
        price: &CountryPrice,
    ) -> AppResult<u64>;
}
