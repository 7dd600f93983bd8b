//! 存储适配器接口。
//!
//! 两个集合：参与者与消息。每个方法对应一次独立的存储操作，
//! 除单条操作本身的原子性外不提供任何跨操作的并发控制。

use async_trait::async_trait;
use domain::{Message, Participant, ParticipantName, RepositoryResult, Timestamp};

pub const PARTICIPANTS: &str = "participants";
pub const MESSAGES: &str = "messages";

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// 名称唯一；同名记录已存在时返回 `RepositoryError::Conflict`
    async fn insert(&self, participant: Participant) -> RepositoryResult<()>;

    async fn find_by_name(&self, name: &ParticipantName)
        -> RepositoryResult<Option<Participant>>;

    /// 顺序不保证
    async fn list(&self) -> RepositoryResult<Vec<Participant>>;

    /// 刷新心跳时间，返回是否有记录被更新
    async fn touch(&self, name: &ParticipantName, at: Timestamp) -> RepositoryResult<bool>;

    /// 返回是否有记录被删除
    async fn remove(&self, name: &ParticipantName) -> RepositoryResult<bool>;

    /// 仅当心跳时间仍等于 `seen` 时删除，返回是否删除
    async fn remove_if_idle(
        &self,
        name: &ParticipantName,
        seen: Timestamp,
    ) -> RepositoryResult<bool>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: Message) -> RepositoryResult<()>;

    /// 按写入顺序返回全部消息
    async fn list(&self) -> RepositoryResult<Vec<Message>>;
}
