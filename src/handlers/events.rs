use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Json,
    },
    routing::get,
    Router,
};
use serde::Deserialize;
use std::time::Duration;
use validator::Validate;

use crate::{
    errors::ServiceError,
    events::RealtimeEvent,
    handlers::AppState,
    models::Sector,
    ApiResponse, ApiResult,
};

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(publish_event))
        .route("/recent", get(recent_events))
        .route("/stream", get(stream_events))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PublishEventRequest {
    pub sector: Sector,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64))]
    pub event_type: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

pub async fn recent_events(State(state): State<AppState>) -> ApiResult<Vec<RealtimeEvent>> {
    Ok(Json(ApiResponse::success(
        state.dashboard.recent_events().await,
    )))
}

/// Accepts an event from another sector's station and fans it out.
pub async fn publish_event(
    State(state): State<AppState>,
    Json(payload): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let event = RealtimeEvent::new(
        payload.sector,
        payload.event_type,
        payload.message,
        payload.data,
    );
    let delivered = state.events.send(event.clone());
    tracing::debug!(event_id = %event.id, delivered, "external event published");

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(event))))
}

pub async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    Sse::new(state.events.sse_stream()).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
