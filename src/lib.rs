//! Torre de Controle
//!
//! Warehouse control tower: per-sector aggregation over a shared record store,
//! a cross-sector dashboard refreshed by realtime events, and barcode-driven
//! inventory sessions.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{middleware::from_fn, response::Json, routing::get, routing::post, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    auth::AuthService,
    config::AppConfig,
    events::EventSender,
    repositories::SectorRepository,
    services::{
        dashboard::{DashboardService, DashboardTimeouts},
        inventory::InventoryService,
    },
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub events: EventSender,
    pub repository: SectorRepository,
    pub dashboard: DashboardService,
    pub inventory: InventoryService,
    pub auth: AuthService,
    pub started_at: DateTime<Utc>,
    /// True when the configured database could not be reached and the
    /// process fell back to in-memory storage.
    pub local_mode: bool,
}

impl AppState {
    /// Wires the services over one repository and one event channel.
    pub fn new(
        config: AppConfig,
        repository: SectorRepository,
        auth: AuthService,
        local_mode: bool,
    ) -> Self {
        let events = EventSender::new(config.event_channel_capacity);
        let dashboard = DashboardService::new(
            repository.clone(),
            DashboardTimeouts::from(&config),
            config.recent_events_limit,
        );
        let inventory = InventoryService::new(repository.clone(), events.clone());

        Self {
            config: Arc::new(config),
            events,
            repository,
            dashboard,
            inventory,
            auth,
            started_at: Utc::now(),
            local_mode,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .nest("/dashboard", handlers::dashboard::dashboard_routes())
        .nest("/events", handlers::events::event_routes())
        .nest("/inventory", handlers::inventory::inventory_routes())
}

/// Full application router with request-id and tracing layers applied.
/// CORS and timeouts are added by the binary.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::health_routes())
        .route("/api/auth/custos", post(handlers::auth::cost_login))
        .nest("/api/v1", api_v1_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(from_fn(middleware_helpers::request_id_middleware))
        .with_state(state)
}

async fn api_status(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
        "service": "torre-controle",
        "environment": state.config.environment,
        "store_backend": state.repository.store().backend_name(),
        "local_mode": state.local_mode,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

pub mod prelude {
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::models::*;
    pub use crate::services::*;
    pub use crate::{ApiResponse, ApiResult, AppState};
}
