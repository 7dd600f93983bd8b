//! 基础设施层实现。
//!
//! 提供 PostgreSQL 存储适配器与迁移，并按配置装配参与者/消息仓储。

pub mod builder;
pub mod migrations;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureError};
pub use migrations::MIGRATOR;
pub use repository::{create_pg_pool, PgMessageRepository, PgParticipantRepository, PgStorage};
