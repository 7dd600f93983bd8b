//! 应用层实现。
//!
//! 围绕领域模型的用例服务：参与者登记、消息路由、心跳超时清理，
//! 以及对存储适配器与时钟的抽象。

pub mod clock;
pub mod error;
pub mod guards;
pub mod memory;
pub mod reaper;
pub mod repository;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ApplicationError;
pub use memory::{MemoryMessageRepository, MemoryParticipantRepository};
pub use reaper::{LivenessReaper, ReaperDependencies, ReaperHandle, ReaperSettings, SweepReport};
pub use repository::{MessageRepository, ParticipantRepository};
pub use services::{
    MessageRouter, MessageRouterDependencies, ParticipantRegistry,
    ParticipantRegistryDependencies,
};
