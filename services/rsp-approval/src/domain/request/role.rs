//! 用户角色

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UnknownValue;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 市场部，发起定价申请
    Marketing,
    /// TTS 审批人
    #[serde(rename = "ttsapprover")]
    TtsApprover,
    /// COGS 审批人（旧流程）
    #[serde(rename = "cogsapprover")]
    CogsApprover,
    /// 国家 CD 经理
    #[serde(rename = "cdmanager")]
    CdManager,
    /// 区域经理
    Manager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Marketing,
        Role::TtsApprover,
        Role::CogsApprover,
        Role::CdManager,
        Role::Manager,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Marketing => "marketing",
            Role::TtsApprover => "ttsapprover",
            Role::CogsApprover => "cogsapprover",
            Role::CdManager => "cdmanager",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownValue::new("role", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("CDManager".parse::<Role>().unwrap(), Role::CdManager);
        assert_eq!(" marketing ".parse::<Role>().unwrap(), Role::Marketing);
        assert!("finance".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_matches_storage_value() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
