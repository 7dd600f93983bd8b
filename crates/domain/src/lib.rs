//! 聊天室核心领域模型
//!
//! 包含参与者、消息实体，入站记录校验，以及消息可见性规则。

pub mod errors;
pub mod message;
pub mod participant;
pub mod validation;
pub mod visibility;

pub use errors::*;
pub use message::*;
pub use participant::*;
pub use validation::*;
pub use visibility::*;

/// 统一的时间戳类型。
pub type Timestamp = chrono::DateTime<chrono::Utc>;
