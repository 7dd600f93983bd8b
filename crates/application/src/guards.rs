//! 请求前置检查。
//!
//! 每个检查都返回 `Result`，调用方用 `?` 组合，检查不通过时不会产生任何写入。

use domain::{DomainError, Participant, ParticipantName};

use crate::error::{store_failure, ApplicationError};
use crate::repository::{ParticipantRepository, PARTICIPANTS};

/// 名称未被占用
pub async fn ensure_name_available(
    participants: &dyn ParticipantRepository,
    name: &ParticipantName,
) -> Result<(), ApplicationError> {
    let existing = participants
        .find_by_name(name)
        .await
        .map_err(|err| store_failure("find_participant", PARTICIPANTS, name.as_str(), err))?;

    match existing {
        Some(_) => Err(DomainError::participant_already_exists(name.as_str()).into()),
        None => Ok(()),
    }
}

/// 参与者在线（已加入且尚未被清理）
pub async fn ensure_participant(
    participants: &dyn ParticipantRepository,
    name: &ParticipantName,
) -> Result<Participant, ApplicationError> {
    participants
        .find_by_name(name)
        .await
        .map_err(|err| store_failure("find_participant", PARTICIPANTS, name.as_str(), err))?
        .ok_or_else(|| DomainError::participant_not_found(name.as_str()).into())
}

/// 解析请求头中的名称；空名称不可能对应任何参与者，按不存在处理
pub fn known_name(raw: &str) -> Result<ParticipantName, ApplicationError> {
    ParticipantName::parse(raw).map_err(|_| DomainError::participant_not_found(raw).into())
}
