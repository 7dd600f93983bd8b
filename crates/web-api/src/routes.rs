use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use domain::{Message, MessageLimit, MessagePayload, Participant, ParticipantPayload};

use crate::{error::ApiError, extract::Caller, state::AppState};

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/participants",
            post(register_participant)
                .get(list_participants)
                .delete(leave_participant),
        )
        .route("/messages", post(send_message).get(list_messages))
        .route("/status", post(heartbeat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 空列表或包含 `*` 时允许任意来源
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid cors origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register_participant(
    State(state): State<AppState>,
    payload: Result<Json<ParticipantPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let Json(payload) = payload?;
    let name = payload.into_name()?;
    let participant = state.registry.join(name.into_inner()).await?;

    Ok((StatusCode::CREATED, Json(participant)))
}

async fn list_participants(
    State(state): State<AppState>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let participants = state.registry.list().await?;
    Ok(Json(participants))
}

async fn leave_participant(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<StatusCode, ApiError> {
    state.registry.leave(caller.name()).await?;
    Ok(StatusCode::OK)
}

async fn send_message(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<MessagePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let Json(payload) = payload?;
    let message = state
        .message_router
        .send(caller.name(), payload)
        .await
        .map_err(ApiError::from_send)?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// 带 `User` 头时只返回其可见的消息，否则返回全部
async fn list_messages(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let limit = query
        .limit
        .as_deref()
        .map(MessageLimit::parse)
        .transpose()?;

    let messages = match caller.0.as_deref() {
        Some(requester) => state.message_router.list_visible(requester, limit).await?,
        None => state.message_router.list_all(limit).await?,
    };

    Ok(Json(messages))
}

async fn heartbeat(State(state): State<AppState>, caller: Caller) -> Result<StatusCode, ApiError> {
    state.registry.heartbeat(caller.name()).await?;
    Ok(StatusCode::OK)
}
