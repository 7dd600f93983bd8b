//! 主应用程序入口
//!
//! 加载配置，装配存储与服务，启动心跳超时清理任务和 Axum Web API 服务。

use std::{sync::Arc, time::Duration};

use application::{
    Clock, LivenessReaper, MessageRouter, MessageRouterDependencies, ParticipantRegistry,
    ParticipantRegistryDependencies, ReaperDependencies, ReaperSettings, SystemClock,
};
use config::AppConfig;
use infrastructure::Infrastructure;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use web_api::{cors_layer, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "配置加载完成");

    let infrastructure = Infrastructure::connect(&config.storage).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let registry = ParticipantRegistry::new(ParticipantRegistryDependencies {
        participant_repository: infrastructure.participant_repository.clone(),
        message_repository: infrastructure.message_repository.clone(),
        clock: clock.clone(),
    });

    let message_router = MessageRouter::new(MessageRouterDependencies {
        participant_repository: infrastructure.participant_repository.clone(),
        message_repository: infrastructure.message_repository.clone(),
        clock: clock.clone(),
    });

    let reaper = Arc::new(LivenessReaper::new(
        ReaperDependencies {
            participant_repository: infrastructure.participant_repository.clone(),
            message_repository: infrastructure.message_repository.clone(),
            clock,
        },
        ReaperSettings {
            interval: Duration::from_secs(config.reaper.interval_seconds),
            timeout: Duration::from_secs(config.reaper.timeout_seconds),
        },
    ));
    let reaper_handle = reaper.spawn();

    let state = AppState::new(Arc::new(registry), Arc::new(message_router));
    let app = router(state).layer(cors_layer(&config.server.cors_origins));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("聊天室服务器启动在 http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP 服务已停止，等待清理任务退出...");
    reaper_handle.shutdown().await;

    if let Some(pool) = infrastructure.pool {
        pool.close().await;
    }

    tracing::info!("服务已关闭");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "无法监听 Ctrl+C 信号");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig_term) => {
                sig_term.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "无法监听终止信号");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("接收到 Ctrl+C 信号，开始优雅停机...");
        }
        _ = terminate => {
            tracing::info!("接收到终止信号，开始优雅停机...");
        }
    }
}
