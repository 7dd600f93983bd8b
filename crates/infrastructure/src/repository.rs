use std::sync::Arc;

use application::repository::{MessageRepository, ParticipantRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Message, MessageKind, Participant, ParticipantName, RepositoryError, RepositoryResult,
    Timestamp,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

/// 唯一约束冲突单独映射为 `Conflict`，其余一律视为存储故障
fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    name: String,
    last_heartbeat: DateTime<Utc>,
}

impl TryFrom<ParticipantRecord> for Participant {
    type Error = RepositoryError;

    fn try_from(value: ParticipantRecord) -> Result<Self, Self::Error> {
        let name =
            ParticipantName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Participant {
            name,
            last_heartbeat: value.last_heartbeat,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    from_name: String,
    to_name: String,
    text: String,
    kind: String,
    time: String,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let kind = MessageKind::parse(&value.kind)
            .ok_or_else(|| invalid_data(format!("unknown message kind: {}", value.kind)))?;
        Ok(Message {
            from: value.from_name,
            to: value.to_name,
            text: value.text,
            kind,
            time: value.time,
        })
    }
}

#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    async fn insert(&self, participant: Participant) -> RepositoryResult<()> {
        sqlx::query(r#"INSERT INTO participants (name, last_heartbeat) VALUES ($1, $2)"#)
            .bind(participant.name.as_str())
            .bind(participant.last_heartbeat)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn find_by_name(
        &self,
        name: &ParticipantName,
    ) -> RepositoryResult<Option<Participant>> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"SELECT name, last_heartbeat FROM participants WHERE name = $1"#,
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Participant::try_from).transpose()
    }

    async fn list(&self) -> RepositoryResult<Vec<Participant>> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            r#"SELECT name, last_heartbeat FROM participants"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Participant::try_from).collect()
    }

    async fn touch(&self, name: &ParticipantName, at: Timestamp) -> RepositoryResult<bool> {
        let result = sqlx::query(r#"UPDATE participants SET last_heartbeat = $2 WHERE name = $1"#)
            .bind(name.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, name: &ParticipantName) -> RepositoryResult<bool> {
        let result = sqlx::query(r#"DELETE FROM participants WHERE name = $1"#)
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_if_idle(
        &self,
        name: &ParticipantName,
        seen: Timestamp,
    ) -> RepositoryResult<bool> {
        // 快照之后到达的心跳会改写 last_heartbeat，此时不删除
        let result =
            sqlx::query(r#"DELETE FROM participants WHERE name = $1 AND last_heartbeat = $2"#)
                .bind(name.as_str())
                .bind(seen)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: Message) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (from_name, to_name, text, kind, time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&message.from)
        .bind(&message.to)
        .bind(&message.text)
        .bind(message.kind.as_str())
        .bind(&message.time)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn list(&self) -> RepositoryResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"SELECT from_name, to_name, text, kind, time FROM messages ORDER BY id ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub participant_repository: Arc<PgParticipantRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            participant_repository: Arc::new(PgParticipantRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
