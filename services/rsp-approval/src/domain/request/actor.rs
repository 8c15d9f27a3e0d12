//! 当前操作人

use rsp_common::UserId;
use serde::{Deserialize, Serialize};

use super::Role;

/// 由上游认证网关传入的操作人身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}
