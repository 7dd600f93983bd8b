use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::Timestamp;

/// 经过校验的参与者名称（去除首尾空白后非空）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantName(String);

impl ParticipantName {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::invalid_argument("name", "cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ParticipantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ParticipantName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 房间内的在线参与者。
///
/// `last_heartbeat` 在加入时初始化，每次心跳刷新；清理任务只依据它判断是否过期。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: ParticipantName,
    #[serde(rename = "lastStatus", with = "chrono::serde::ts_milliseconds")]
    pub last_heartbeat: Timestamp,
}

impl Participant {
    pub fn join(name: ParticipantName, now: Timestamp) -> Self {
        Self {
            name,
            last_heartbeat: now,
        }
    }

    pub fn refresh(&mut self, now: Timestamp) {
        self.last_heartbeat = now;
    }

    pub fn idle_for(&self, now: Timestamp) -> Duration {
        now - self.last_heartbeat
    }

    /// 空闲时间严格大于阈值才算过期，恰好等于阈值的参与者保留。
    pub fn is_expired(&self, now: Timestamp, timeout: Duration) -> bool {
        self.idle_for(now) > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(seconds: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn name_is_trimmed() {
        let name = ParticipantName::parse("  alice ").unwrap();
        assert_eq!(name.as_str(), "alice");
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = ParticipantName::parse("   ").unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument { ref field, .. } if field == "name"));
    }

    #[test]
    fn expiry_is_strictly_greater_than_timeout() {
        let participant = Participant::join(ParticipantName::parse("bob").unwrap(), at(0));
        let timeout = Duration::seconds(10);

        assert!(!participant.is_expired(at(10), timeout));
        assert!(participant.is_expired(at(11), timeout));
    }

    #[test]
    fn refresh_resets_idle_time() {
        let mut participant = Participant::join(ParticipantName::parse("bob").unwrap(), at(0));
        participant.refresh(at(15));
        assert_eq!(participant.idle_for(at(16)), Duration::seconds(1));
    }

    #[test]
    fn serializes_heartbeat_as_millis() {
        let participant = Participant::join(ParticipantName::parse("bob").unwrap(), at(0));
        let json = serde_json::to_value(&participant).unwrap();
        assert_eq!(json["name"], "bob");
        assert_eq!(json["lastStatus"], 1_700_000_000_000_i64);
    }
}
