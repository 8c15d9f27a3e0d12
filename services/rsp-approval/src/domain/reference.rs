//! 参考数据：用户与国家

use rsp_common::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::Role;

/// 系统用户（只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn new(name: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            username: username.into(),
            role,
        }
    }
}

/// 国家参考数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryDetails {
    pub country: String,
    pub vat: Decimal,
    /// CD 经理姓名，与 `users.name` 关联
    pub cd_manager: Option<String>,
    /// 分销商经理姓名
    pub db_manager: Option<String>,
    pub currency: String,
}
