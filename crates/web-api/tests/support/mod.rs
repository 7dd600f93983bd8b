use std::{net::SocketAddr, sync::Arc};

use application::{
    Clock, LivenessReaper, ManualClock, MemoryMessageRepository, MemoryParticipantRepository,
    MessageRepository, MessageRouter, MessageRouterDependencies, ParticipantRegistry,
    ParticipantRegistryDependencies, ParticipantRepository, ReaperDependencies, ReaperSettings,
};
use chrono::{TimeZone, Utc};
use reqwest::Client;
use tokio::{net::TcpListener, sync::oneshot};
use web_api::{router, AppState};

/// 跑在临时端口上的服务，时钟与清理任务由测试手动驱动
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub clock: Arc<ManualClock>,
    pub reaper: LivenessReaper,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let participant_repository: Arc<dyn ParticipantRepository> =
            Arc::new(MemoryParticipantRepository::new());
        let message_repository: Arc<dyn MessageRepository> =
            Arc::new(MemoryMessageRepository::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let shared_clock: Arc<dyn Clock> = clock.clone();

        let registry = ParticipantRegistry::new(ParticipantRegistryDependencies {
            participant_repository: participant_repository.clone(),
            message_repository: message_repository.clone(),
            clock: shared_clock.clone(),
        });
        let message_router = MessageRouter::new(MessageRouterDependencies {
            participant_repository: participant_repository.clone(),
            message_repository: message_repository.clone(),
            clock: shared_clock.clone(),
        });
        let reaper = LivenessReaper::new(
            ReaperDependencies {
                participant_repository,
                message_repository,
                clock: shared_clock,
            },
            ReaperSettings::default(),
        );

        let state = AppState::new(Arc::new(registry), Arc::new(message_router));
        let app = router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr: SocketAddr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: Client::new(),
            clock,
            reaper,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
