use serde::{Deserialize, Serialize};

use crate::participant::ParticipantName;
use crate::Timestamp;

/// 广播收件人：发给房间内所有人。
pub const BROADCAST_RECIPIENT: &str = "Todos";

pub const ENTERED_ROOM_TEXT: &str = "entered the room";
pub const LEFT_ROOM_TEXT: &str = "left the room";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "message")]
    Normal,
    #[serde(rename = "private_message")]
    Private,
    /// 系统生成的进入/离开通知，只由服务端写入
    #[serde(rename = "status")]
    Status,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Normal => "message",
            MessageKind::Private => "private_message",
            MessageKind::Status => "status",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "message" => Some(MessageKind::Normal),
            "private_message" => Some(MessageKind::Private),
            "status" => Some(MessageKind::Status),
            _ => None,
        }
    }

    /// 参与者可以自己发送的类型
    pub fn is_user_sendable(&self) -> bool {
        matches!(self, MessageKind::Normal | MessageKind::Private)
    }
}

/// 聊天消息。写入后不可变，顺序以写入顺序为准，`time` 只用于展示。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub time: String,
}

impl Message {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
        at: Timestamp,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            text: text.into(),
            kind,
            time: format_clock_time(at),
        }
    }

    pub fn entered(name: &ParticipantName, at: Timestamp) -> Self {
        Self::status(name, ENTERED_ROOM_TEXT, at)
    }

    pub fn left(name: &ParticipantName, at: Timestamp) -> Self {
        Self::status(name, LEFT_ROOM_TEXT, at)
    }

    fn status(name: &ParticipantName, text: &str, at: Timestamp) -> Self {
        Self::new(
            name.as_str(),
            BROADCAST_RECIPIENT,
            text,
            MessageKind::Status,
            at,
        )
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_RECIPIENT
    }

    /// 广播消息、发给自己的消息、自己发出的消息对读者可见。
    pub fn is_visible_to(&self, reader: &str) -> bool {
        self.is_broadcast() || self.to == reader || self.from == reader
    }
}

/// `HH:mm:ss`（UTC）
pub fn format_clock_time(at: Timestamp) -> String {
    at.format("%H:%M:%S").to_string()
}
