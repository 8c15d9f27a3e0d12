//! 调用方身份提取
//!
//! 身份由上游网关认证后以请求头传入：`x-user-id`、`x-user-name`、`x-user-role`。

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rsp_common::UserId;
use rsp_errors::AppError;

use crate::domain::request::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// 当前调用方
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthenticated(format!("Missing {} header", name)))
}

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = UserId::from_string(header(parts, USER_ID_HEADER)?)
            .map_err(|_| AppError::unauthenticated(format!("Invalid {} header", USER_ID_HEADER)))?;
        let name = header(parts, USER_NAME_HEADER)?;
        let role: Role = header(parts, USER_ROLE_HEADER)?
            .parse()
            .map_err(|e| AppError::unauthenticated(format!("{}", e)))?;

        Ok(CurrentActor(Actor::new(id, name, role)))
    }
}
