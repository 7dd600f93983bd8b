use std::sync::Arc;

use domain::{DomainError, Message, Participant, ParticipantName, RepositoryError};

use crate::{
    clock::Clock,
    error::{store_failure, ApplicationError},
    guards,
    repository::{MessageRepository, ParticipantRepository, MESSAGES, PARTICIPANTS},
};

pub struct ParticipantRegistryDependencies {
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 参与者的加入、心跳、离开与查询。
pub struct ParticipantRegistry {
    deps: ParticipantRegistryDependencies,
}

impl ParticipantRegistry {
    pub fn new(deps: ParticipantRegistryDependencies) -> Self {
        Self { deps }
    }

    /// 加入房间并写入一条进入通知。
    ///
    /// 两次写入视为一个逻辑单元：参与者已写入但通知写入失败时返回存储错误，
    /// 已写入的参与者不会回滚，需要人工对账。
    pub async fn join(&self, name: impl Into<String>) -> Result<Participant, ApplicationError> {
        let name = ParticipantName::parse(name)?;
        guards::ensure_name_available(self.deps.participant_repository.as_ref(), &name).await?;

        let now = self.deps.clock.now();
        let participant = Participant::join(name.clone(), now);

        match self
            .deps
            .participant_repository
            .insert(participant.clone())
            .await
        {
            Ok(()) => {}
            // 并发加入同名参与者时由存储层唯一约束兜底
            Err(RepositoryError::Conflict) => {
                return Err(DomainError::participant_already_exists(name.as_str()).into());
            }
            Err(err) => return Err(store_failure("join", PARTICIPANTS, name.as_str(), err)),
        }

        self.deps
            .message_repository
            .insert(Message::entered(&name, now))
            .await
            .map_err(|err| {
                tracing::error!(
                    participant = %name,
                    "participant stored without entry status message, needs reconciliation"
                );
                store_failure("join", MESSAGES, name.as_str(), err)
            })?;

        tracing::info!(participant = %name, "participant joined");
        Ok(participant)
    }

    /// 刷新心跳，不产生消息。
    pub async fn heartbeat(&self, name: &str) -> Result<(), ApplicationError> {
        let name = guards::known_name(name)?;
        let now = self.deps.clock.now();

        let touched = self
            .deps
            .participant_repository
            .touch(&name, now)
            .await
            .map_err(|err| store_failure("heartbeat", PARTICIPANTS, name.as_str(), err))?;

        if !touched {
            return Err(DomainError::participant_not_found(name.as_str()).into());
        }

        tracing::debug!(participant = %name, "heartbeat refreshed");
        Ok(())
    }

    /// 主动离开房间并写入一条离开通知。
    pub async fn leave(&self, name: &str) -> Result<(), ApplicationError> {
        let name = guards::known_name(name)?;

        let removed = self
            .deps
            .participant_repository
            .remove(&name)
            .await
            .map_err(|err| store_failure("leave", PARTICIPANTS, name.as_str(), err))?;

        if !removed {
            return Err(DomainError::participant_not_found(name.as_str()).into());
        }

        let now = self.deps.clock.now();
        self.deps
            .message_repository
            .insert(Message::left(&name, now))
            .await
            .map_err(|err| store_failure("leave", MESSAGES, name.as_str(), err))?;

        tracing::info!(participant = %name, "participant left");
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> Result<bool, ApplicationError> {
        let Ok(name) = ParticipantName::parse(name) else {
            return Ok(false);
        };

        let found = self
            .deps
            .participant_repository
            .find_by_name(&name)
            .await
            .map_err(|err| store_failure("exists", PARTICIPANTS, name.as_str(), err))?;

        Ok(found.is_some())
    }

    pub async fn list(&self) -> Result<Vec<Participant>, ApplicationError> {
        self.deps
            .participant_repository
            .list()
            .await
            .map_err(|err| store_failure("list_participants", PARTICIPANTS, "*", err))
    }
}
