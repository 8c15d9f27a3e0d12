//! 参考数据仓储接口

use async_trait::async_trait;
use rsp_errors::AppResult;
use rust_decimal::Decimal;

use crate::domain::pricing::SkuPricingInputs;
use crate::domain::reference::{CountryDetails, User};
use crate::domain::request::Role;

/// 用户、国家、SKU 参考数据
#[async_trait]
pub trait ReferenceDataRepository: Send + Sync {
    /// 按角色取第一位用户（按姓名排序）
    async fn find_user_by_role(&self, role: Role) -> AppResult<Option<User>>;

    /// 按角色 + 姓名精确查找
    async fn find_user_by_role_and_name(&self, role: Role, name: &str) -> AppResult<Option<User>>;

    async fn find_country(&self, country: &str) -> AppResult<Option<CountryDetails>>;

    /// SKU × 国家 的完整计算输入
    async fn find_sku_inputs(
        &self,
        sku_code: &str,
        country: &str,
    ) -> AppResult<Option<SkuPricingInputs>>;

    /// 所有 SKU 编码（去重、排序）
    async fn list_sku_codes(&self) -> AppResult<Vec<String>>;

    /// 更新汇率，返回受影响行数
    async fn update_currency_rate(&self, country: &str, to_usd: Decimal) -> AppResult<u64>;
}
