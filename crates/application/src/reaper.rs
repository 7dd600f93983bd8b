//! 心跳超时清理任务。
//!
//! 每个周期对参与者列表做一次快照，空闲时间严格超过阈值的参与者被删除，
//! 并为每次删除写入一条离开通知。每次驱逐相互独立，一个失败不影响其余。
//!
//! 删除是条件删除：只有心跳时间仍等于快照中的值才会删除，
//! 快照之后到达的心跳会让该参与者保留下来。
//!
//! # Graceful Shutdown
//!
//! 任务由 [`CancellationToken`] 控制，取消后完成当前周期并退出。

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use domain::{Message, Participant, Timestamp};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    clock::Clock,
    error::{store_failure, ApplicationError},
    repository::{MessageRepository, ParticipantRepository, MESSAGES, PARTICIPANTS},
};

/// 默认清理周期（秒）
pub const DEFAULT_INTERVAL_SECONDS: u64 = 15;
/// 默认心跳超时（秒），短于清理周期，过期后的下一个周期即可清理
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECONDS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

pub struct ReaperDependencies {
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 单个周期的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub evicted: Vec<String>,
    /// 快照后刷新了心跳（或已自行离开）的参与者
    pub spared: Vec<String>,
    pub failed: Vec<String>,
}

enum Eviction {
    Evicted,
    Spared,
}

pub struct LivenessReaper {
    deps: ReaperDependencies,
    settings: ReaperSettings,
}

impl LivenessReaper {
    pub fn new(deps: ReaperDependencies, settings: ReaperSettings) -> Self {
        Self { deps, settings }
    }

    /// 执行一次清理。只有快照读取失败会返回错误。
    pub async fn sweep(&self) -> Result<SweepReport, ApplicationError> {
        let snapshot = self
            .deps
            .participant_repository
            .list()
            .await
            .map_err(|err| store_failure("reap_snapshot", PARTICIPANTS, "*", err))?;

        let now = self.deps.clock.now();
        let timeout = ChronoDuration::from_std(self.settings.timeout)
            .unwrap_or_else(|_| ChronoDuration::seconds(DEFAULT_TIMEOUT_SECONDS as i64));

        let mut report = SweepReport {
            scanned: snapshot.len(),
            ..SweepReport::default()
        };

        for participant in snapshot
            .into_iter()
            .filter(|participant| participant.is_expired(now, timeout))
        {
            let name = participant.name.to_string();
            match self.evict(&participant, now).await {
                Ok(Eviction::Evicted) => report.evicted.push(name),
                Ok(Eviction::Spared) => report.spared.push(name),
                Err(_) => report.failed.push(name),
            }
        }

        Ok(report)
    }

    async fn evict(
        &self,
        participant: &Participant,
        now: Timestamp,
    ) -> Result<Eviction, ApplicationError> {
        let name = &participant.name;

        let removed = self
            .deps
            .participant_repository
            .remove_if_idle(name, participant.last_heartbeat)
            .await
            .map_err(|err| store_failure("reap", PARTICIPANTS, name.as_str(), err))?;

        if !removed {
            info!(participant = %name, "heartbeat arrived after snapshot, eviction skipped");
            return Ok(Eviction::Spared);
        }

        self.deps
            .message_repository
            .insert(Message::left(name, now))
            .await
            .map_err(|err| store_failure("reap", MESSAGES, name.as_str(), err))?;

        info!(
            participant = %name,
            idle_seconds = participant.idle_for(now).num_seconds(),
            "idle participant evicted"
        );
        Ok(Eviction::Evicted)
    }

    /// 周期循环，直到 `cancel_token` 被取消。第一次清理在一个周期之后执行。
    #[instrument(skip_all, name = "task.liveness_reaper")]
    pub async fn run(self: Arc<Self>, cancel_token: CancellationToken) {
        info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            timeout_ms = self.settings.timeout.as_millis() as u64,
            "Starting liveness reaper"
        );

        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(report) => {
                            if !report.failed.is_empty() {
                                warn!(
                                    failed = report.failed.len(),
                                    evicted = report.evicted.len(),
                                    "some evictions failed this tick"
                                );
                            }
                        }
                        // 存储可能恢复，继续下一个周期
                        Err(err) => warn!(error = %err, "reaper tick skipped"),
                    }
                }
                _ = cancel_token.cancelled() => {
                    info!("Liveness reaper received shutdown signal, exiting");
                    break;
                }
            }
        }

        info!("Liveness reaper stopped");
    }

    /// 在后台启动清理循环
    pub fn spawn(self: Arc<Self>) -> ReaperHandle {
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel_token.clone()));
        ReaperHandle { cancel_token, task }
    }
}

/// 后台清理任务的句柄，随进程生命周期持有
pub struct ReaperHandle {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.task.await {
            warn!(error = %err, "liveness reaper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::{MemoryMessageRepository, MemoryParticipantRepository};
    use crate::repository::{MockMessageRepository, MockParticipantRepository};
    use crate::services::{ParticipantRegistry, ParticipantRegistryDependencies};
    use chrono::{TimeZone, Utc};
    use domain::{
        MessageKind, ParticipantName, RepositoryError, BROADCAST_RECIPIENT, LEFT_ROOM_TEXT,
    };

    fn t(seconds: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + ChronoDuration::seconds(seconds)
    }

    struct Fixture {
        registry: ParticipantRegistry,
        reaper: LivenessReaper,
        participants: Arc<MemoryParticipantRepository>,
        messages: Arc<MemoryMessageRepository>,
        clock: Arc<ManualClock>,
    }

    fn fixture(settings: ReaperSettings) -> Fixture {
        let participants = Arc::new(MemoryParticipantRepository::new());
        let messages = Arc::new(MemoryMessageRepository::new());
        let clock = Arc::new(ManualClock::new(t(0)));

        let registry = ParticipantRegistry::new(ParticipantRegistryDependencies {
            participant_repository: participants.clone(),
            message_repository: messages.clone(),
            clock: clock.clone(),
        });
        let reaper = LivenessReaper::new(
            ReaperDependencies {
                participant_repository: participants.clone(),
                message_repository: messages.clone(),
                clock: clock.clone(),
            },
            settings,
        );

        Fixture {
            registry,
            reaper,
            participants,
            messages,
            clock,
        }
    }

    fn participant(name: &str, heartbeat: Timestamp) -> Participant {
        Participant::join(ParticipantName::parse(name).unwrap(), heartbeat)
    }

    #[tokio::test]
    async fn evicts_expired_and_keeps_recent() {
        let f = fixture(ReaperSettings::default());
        f.registry.join("stale").await.unwrap();
        f.clock.set(t(15));
        f.registry.join("fresh").await.unwrap();

        f.clock.set(t(16));
        let report = f.reaper.sweep().await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.evicted, vec!["stale".to_string()]);
        assert!(report.failed.is_empty());

        let remaining = f.participants.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name.as_str(), "fresh");

        let last = f.messages.list().await.unwrap().pop().unwrap();
        assert_eq!(last.from, "stale");
        assert_eq!(last.to, BROADCAST_RECIPIENT);
        assert_eq!(last.text, LEFT_ROOM_TEXT);
        assert_eq!(last.kind, MessageKind::Status);
    }

    #[tokio::test]
    async fn idle_exactly_at_threshold_is_kept() {
        let f = fixture(ReaperSettings::default());
        f.registry.join("edge").await.unwrap();

        f.clock.set(t(10));
        let report = f.reaper.sweep().await.unwrap();

        assert!(report.evicted.is_empty());
        assert!(f.registry.exists("edge").await.unwrap());
    }

    #[tokio::test]
    async fn heartbeat_keeps_participant_alive() {
        let f = fixture(ReaperSettings::default());
        f.registry.join("ana").await.unwrap();

        f.clock.set(t(9));
        f.registry.heartbeat("ana").await.unwrap();
        f.clock.set(t(16));

        assert!(f.reaper.sweep().await.unwrap().evicted.is_empty());
        assert!(f.registry.exists("ana").await.unwrap());
    }

    #[tokio::test]
    async fn heartbeat_after_snapshot_spares_participant() {
        let mut participants = MockParticipantRepository::new();
        participants
            .expect_list()
            .returning(|| Ok(vec![participant("ana", t(0))]));
        participants
            .expect_remove_if_idle()
            .withf(|name, seen| name.as_str() == "ana" && *seen == t(0))
            .returning(|_, _| Ok(false));

        let mut messages = MockMessageRepository::new();
        messages.expect_insert().times(0);

        let reaper = LivenessReaper::new(
            ReaperDependencies {
                participant_repository: Arc::new(participants),
                message_repository: Arc::new(messages),
                clock: Arc::new(ManualClock::new(t(16))),
            },
            ReaperSettings::default(),
        );

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.spared, vec!["ana".to_string()]);
        assert!(report.evicted.is_empty());
    }

    #[tokio::test]
    async fn one_failed_eviction_does_not_block_others() {
        let mut participants = MockParticipantRepository::new();
        participants.expect_list().returning(|| {
            Ok(vec![
                participant("broken", t(0)),
                participant("ok", t(0)),
                participant("alive", t(14)),
            ])
        });
        participants
            .expect_remove_if_idle()
            .withf(|name, _| name.as_str() == "broken")
            .returning(|_, _| Err(RepositoryError::storage("connection reset")));
        participants
            .expect_remove_if_idle()
            .withf(|name, _| name.as_str() == "ok")
            .returning(|_, _| Ok(true));

        let mut messages = MockMessageRepository::new();
        messages
            .expect_insert()
            .withf(|message| message.from == "ok" && message.text == LEFT_ROOM_TEXT)
            .times(1)
            .returning(|_| Ok(()));

        let reaper = LivenessReaper::new(
            ReaperDependencies {
                participant_repository: Arc::new(participants),
                message_repository: Arc::new(messages),
                clock: Arc::new(ManualClock::new(t(16))),
            },
            ReaperSettings::default(),
        );

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.evicted, vec!["ok".to_string()]);
        assert_eq!(report.failed, vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn snapshot_failure_is_reported() {
        let mut participants = MockParticipantRepository::new();
        participants
            .expect_list()
            .returning(|| Err(RepositoryError::storage("timeout")));

        let reaper = LivenessReaper::new(
            ReaperDependencies {
                participant_repository: Arc::new(participants),
                message_repository: Arc::new(MockMessageRepository::new()),
                clock: Arc::new(ManualClock::new(t(0))),
            },
            ReaperSettings::default(),
        );

        assert!(matches!(
            reaper.sweep().await,
            Err(ApplicationError::Repository(RepositoryError::Storage { .. }))
        ));
    }

    #[tokio::test]
    async fn background_task_evicts_and_stops_on_shutdown() {
        let f = fixture(ReaperSettings {
            interval: Duration::from_millis(20),
            timeout: Duration::from_secs(10),
        });
        f.registry.join("sleepy").await.unwrap();
        f.clock.set(t(60));

        let handle = Arc::new(f.reaper).spawn();

        let mut gone = false;
        for _ in 0..100 {
            if f.participants.list().await.unwrap().is_empty() {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(gone, "reaper should evict the idle participant");

        let token = handle.cancel_token();
        handle.shutdown().await;
        assert!(token.is_cancelled());
    }
}
