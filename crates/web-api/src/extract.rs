//! 请求头中的调用者身份
//!
//! 没有认证，`User` 请求头里的显示名称就是调用者身份。

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const USER_HEADER: &str = "user";

/// `User` 请求头，缺失或为空白时为 `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Option<String>);

impl Caller {
    /// 缺失时返回空串，交给应用层守卫统一报告为未知参与者
    pub fn name(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Ok(Caller(None));
        };

        // 名称允许非 ASCII 字符，按 UTF-8 解码原始字节
        let raw = std::str::from_utf8(value.as_bytes()).map_err(|_| {
            ApiError::unprocessable("INVALID_USER_HEADER", "User header must be valid UTF-8")
        })?;
        let name = raw.trim();
        Ok(Caller((!name.is_empty()).then(|| name.to_owned())))
    }
}
