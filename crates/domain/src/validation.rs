//! 入站记录的形状校验。
//!
//! 纯函数，不做 I/O：字段缺失或为空、`type` 不在允许集合内都会得到
//! [`DomainError::InvalidArgument`]。

use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::errors::DomainError;
use crate::message::MessageKind;
use crate::participant::ParticipantName;

/// 加入房间的请求体
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ParticipantPayload {
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "cannot be empty")
    )]
    pub name: Option<String>,
}

impl ParticipantPayload {
    pub fn into_name(self) -> Result<ParticipantName, DomainError> {
        self.validate().map_err(into_domain_error)?;
        ParticipantName::parse(self.name.unwrap_or_default())
    }
}

/// 发送消息的请求体，发送者来自请求头而不是请求体
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MessagePayload {
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "cannot be empty")
    )]
    pub to: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "cannot be empty")
    )]
    pub text: Option<String>,
    /// 取值集合在 [`MessagePayload::into_outgoing`] 中检查
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// 通过校验的待发送消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub text: String,
    pub kind: MessageKind,
}

impl MessagePayload {
    pub fn into_outgoing(self) -> Result<OutgoingMessage, DomainError> {
        self.validate().map_err(into_domain_error)?;

        let to = non_blank("to", self.to)?.trim().to_owned();
        let text = non_blank("text", self.text)?;
        let kind = self
            .kind
            .as_deref()
            .and_then(MessageKind::parse)
            .filter(MessageKind::is_user_sendable)
            .ok_or_else(|| {
                DomainError::invalid_argument("type", "must be one of message, private_message")
            })?;

        Ok(OutgoingMessage { to, text, kind })
    }
}

/// 去掉空白后为空即拒绝，返回值保持原样
fn non_blank(field: &str, value: Option<String>) -> Result<String, DomainError> {
    let value = value.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(DomainError::invalid_argument(field, "cannot be empty"));
    }
    Ok(value)
}

/// 取字段名排序后的第一个错误，保证同一输入得到同一条错误信息。
fn into_domain_error(errors: ValidationErrors) -> DomainError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    match fields.first() {
        Some((field, field_errors)) => {
            let reason = field_errors
                .first()
                .map(|err| {
                    err.message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| err.code.to_string())
                })
                .unwrap_or_else(|| "invalid".to_string());
            DomainError::invalid_argument(field.to_string(), reason)
        }
        None => DomainError::invalid_argument("payload", "invalid"),
    }
}
