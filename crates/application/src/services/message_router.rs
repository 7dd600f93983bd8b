use std::sync::Arc;

use domain::{select_visible, Audience, Message, MessageLimit, MessagePayload};

use crate::{
    clock::Clock,
    error::{store_failure, ApplicationError},
    guards,
    repository::{MessageRepository, ParticipantRepository, MESSAGES},
};

pub struct MessageRouterDependencies {
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 消息发送与按读者过滤的消息读取。
pub struct MessageRouter {
    deps: MessageRouterDependencies,
}

impl MessageRouter {
    pub fn new(deps: MessageRouterDependencies) -> Self {
        Self { deps }
    }

    /// 发送者必须在线；校验在任何读写之前完成。
    pub async fn send(
        &self,
        from: &str,
        payload: MessagePayload,
    ) -> Result<Message, ApplicationError> {
        let outgoing = payload.into_outgoing()?;
        let sender = guards::known_name(from)?;
        guards::ensure_participant(self.deps.participant_repository.as_ref(), &sender).await?;

        let message = Message::new(
            sender.as_str(),
            outgoing.to,
            outgoing.text,
            outgoing.kind,
            self.deps.clock.now(),
        );

        self.deps
            .message_repository
            .insert(message.clone())
            .await
            .map_err(|err| store_failure("send", MESSAGES, sender.as_str(), err))?;

        tracing::debug!(
            from = %message.from,
            to = %message.to,
            kind = message.kind.as_str(),
            "message stored"
        );
        Ok(message)
    }

    /// 对 `requester` 可见的消息，按写入顺序；给定上限时只保留最近的部分。
    pub async fn list_visible(
        &self,
        requester: &str,
        limit: Option<MessageLimit>,
    ) -> Result<Vec<Message>, ApplicationError> {
        let messages = self.load(requester).await?;
        Ok(select_visible(
            messages,
            Audience::Participant(requester),
            limit,
        ))
    }

    /// 不做可见性过滤的全量消息列表
    pub async fn list_all(
        &self,
        limit: Option<MessageLimit>,
    ) -> Result<Vec<Message>, ApplicationError> {
        let messages = self.load("*").await?;
        Ok(select_visible(messages, Audience::Everyone, limit))
    }

    async fn load(&self, key: &str) -> Result<Vec<Message>, ApplicationError> {
        self.deps
            .message_repository
            .list()
            .await
            .map_err(|err| store_failure("list_messages", MESSAGES, key, err))
    }
}
