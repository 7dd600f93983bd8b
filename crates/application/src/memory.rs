//! 内存实现的存储适配器（用于开发和测试）
//!
//! 与 PostgreSQL 实现遵守相同的约束：参与者名称唯一，消息保持写入顺序。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{Message, Participant, ParticipantName, RepositoryError, RepositoryResult, Timestamp};
use tokio::sync::RwLock;

use crate::repository::{MessageRepository, ParticipantRepository};

#[derive(Debug, Default)]
pub struct MemoryParticipantRepository {
    participants: RwLock<HashMap<ParticipantName, Participant>>,
}

impl MemoryParticipantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParticipantRepository for MemoryParticipantRepository {
    async fn insert(&self, participant: Participant) -> RepositoryResult<()> {
        let mut participants = self.participants.write().await;
        if participants.contains_key(&participant.name) {
            return Err(RepositoryError::Conflict);
        }
        participants.insert(participant.name.clone(), participant);
        Ok(())
    }

    async fn find_by_name(
        &self,
        name: &ParticipantName,
    ) -> RepositoryResult<Option<Participant>> {
        Ok(self.participants.read().await.get(name).cloned())
    }

    async fn list(&self) -> RepositoryResult<Vec<Participant>> {
        Ok(self.participants.read().await.values().cloned().collect())
    }

    async fn touch(&self, name: &ParticipantName, at: Timestamp) -> RepositoryResult<bool> {
        let mut participants = self.participants.write().await;
        match participants.get_mut(name) {
            Some(participant) => {
                participant.refresh(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, name: &ParticipantName) -> RepositoryResult<bool> {
        Ok(self.participants.write().await.remove(name).is_some())
    }

    async fn remove_if_idle(
        &self,
        name: &ParticipantName,
        seen: Timestamp,
    ) -> RepositoryResult<bool> {
        let mut participants = self.participants.write().await;
        let still_idle = participants
            .get(name)
            .map(|participant| participant.last_heartbeat == seen)
            .unwrap_or(false);
        if still_idle {
            participants.remove(name);
        }
        Ok(still_idle)
    }
}

#[derive(Debug, Default)]
pub struct MemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn insert(&self, message: Message) -> RepositoryResult<()> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn list(&self) -> RepositoryResult<Vec<Message>> {
        Ok(self.messages.read().await.clone())
    }
}
