use std::sync::Arc;

use application::repository::{MessageRepository, ParticipantRepository};
use application::{MemoryMessageRepository, MemoryParticipantRepository};
use config::{StorageBackend, StorageConfig};
use sqlx::PgPool;
use thiserror::Error;

use crate::{
    migrations::MIGRATOR,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("postgres backend selected without database_url")]
    MissingDatabaseUrl,
}

/// 按配置装配好的存储适配器
#[derive(Clone)]
pub struct Infrastructure {
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub pool: Option<PgPool>,
}

impl Infrastructure {
    pub async fn connect(config: &StorageConfig) -> Result<Self, InfrastructureError> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or(InfrastructureError::MissingDatabaseUrl)?;
                let pool = create_pg_pool(url, config.max_connections).await?;
                MIGRATOR.run(&pool).await?;
                tracing::info!(max_connections = config.max_connections, "postgres storage ready");
                Ok(Self::from_storage(PgStorage::new(pool)))
            }
        }
    }

    pub fn in_memory() -> Self {
        tracing::info!("using in-memory storage");
        Self {
            participant_repository: Arc::new(MemoryParticipantRepository::new()),
            message_repository: Arc::new(MemoryMessageRepository::new()),
            pool: None,
        }
    }

    pub fn from_storage(storage: PgStorage) -> Self {
        Self {
            participant_repository: storage.participant_repository,
            message_repository: storage.message_repository,
            pool: Some(storage.pool),
        }
    }
}
