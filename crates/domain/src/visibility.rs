//! 消息可见性过滤与条数截断。
//!
//! 先按读者过滤，再保留最近的 N 条；两步的顺序对全量列表和按读者列表一致。

use std::num::NonZeroUsize;

use crate::errors::DomainError;
use crate::message::Message;

/// 读取消息的一方。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience<'a> {
    /// 不做可见性过滤
    Everyone,
    Participant(&'a str),
}

impl Audience<'_> {
    pub fn can_see(&self, message: &Message) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::Participant(reader) => message.is_visible_to(reader),
        }
    }
}

/// 返回最近消息的条数上限，必须为正整数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimit(NonZeroUsize);

impl MessageLimit {
    pub fn new(value: usize) -> Result<Self, DomainError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or_else(|| DomainError::invalid_argument("limit", "must be a positive integer"))
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw
            .trim()
            .parse::<usize>()
            .map_err(|_| DomainError::invalid_argument("limit", "must be a positive integer"))?;
        Self::new(value)
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// 按写入顺序过滤出可见消息，并在给定上限时只保留尾部。
/// 上限超过可见条数时返回全部。
pub fn select_visible(
    messages: Vec<Message>,
    audience: Audience<'_>,
    limit: Option<MessageLimit>,
) -> Vec<Message> {
    let mut visible: Vec<Message> = messages
        .into_iter()
        .filter(|message| audience.can_see(message))
        .collect();

    if let Some(limit) = limit {
        let skip = visible.len().saturating_sub(limit.get());
        visible.drain(..skip);
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use chrono::Utc;

    fn log() -> Vec<Message> {
        let at = Utc::now();
        vec![
            Message::new("A", "Todos", "hello all", MessageKind::Normal, at),
            Message::new("A", "B", "hello B", MessageKind::Private, at),
            Message::new("C", "D", "hello D", MessageKind::Private, at),
        ]
    }

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn recipient_sees_broadcast_and_own_private() {
        let visible = select_visible(log(), Audience::Participant("B"), None);
        assert_eq!(texts(&visible), vec!["hello all", "hello B"]);
    }

    #[test]
    fn outsider_sees_only_broadcast() {
        let visible = select_visible(log(), Audience::Participant("Z"), None);
        assert_eq!(texts(&visible), vec!["hello all"]);
    }

    #[test]
    fn sender_sees_own_private_messages() {
        let visible = select_visible(log(), Audience::Participant("C"), None);
        assert_eq!(texts(&visible), vec!["hello all", "hello D"]);
    }

    #[test]
    fn limit_keeps_most_recent_after_filtering() {
        let limit = MessageLimit::new(1).unwrap();
        let visible = select_visible(log(), Audience::Participant("B"), Some(limit));
        assert_eq!(texts(&visible), vec!["hello B"]);

        let all = select_visible(log(), Audience::Everyone, Some(limit));
        assert_eq!(texts(&all), vec!["hello D"]);
    }

    #[test]
    fn limit_larger_than_log_returns_everything() {
        let limit = MessageLimit::new(50).unwrap();
        let visible = select_visible(log(), Audience::Everyone, Some(limit));
        assert_eq!(visible.len(), 3);
    }

    #[test]
    fn limit_must_be_positive() {
        assert!(MessageLimit::new(0).is_err());
        assert!(MessageLimit::parse("-3").is_err());
        assert!(MessageLimit::parse("abc").is_err());
        assert_eq!(MessageLimit::parse(" 7 ").unwrap().get(), 7);
    }
}
