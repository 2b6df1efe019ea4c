/*!
 * # Health Check Module
 *
 * Endpoints for monitoring the control tower:
 *
 * - Basic health check (`/health`) - store probe plus dashboard freshness
 * - Liveness check (`/health/live`) - the process is serving requests
 * - Version (`/health/version`) - build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::AppState;

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Overall health information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub local_mode: bool,
    pub details: HashMap<String, HealthDetail>,
}

impl HealthInfo {
    /// Worst component status wins.
    fn compute_status(details: &HashMap<String, HealthDetail>) -> HealthStatus {
        if details.values().any(|d| d.status == HealthStatus::Down) {
            HealthStatus::Down
        } else if details.values().any(|d| d.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Up
        }
    }
}

fn detail(status: HealthStatus, message: Option<String>) -> HealthDetail {
    HealthDetail {
        status,
        message,
        timestamp: Utc::now(),
    }
}

/// Collects component health for the running application.
pub async fn collect_health(state: &AppState) -> HealthInfo {
    let mut details = HashMap::new();

    let store = match state.dashboard.probe_store().await {
        Ok(()) => detail(
            HealthStatus::Up,
            Some(format!("backend: {}", state.repository.store().backend_name())),
        ),
        Err(e) => {
            warn!("Record store health check failed: {}", e);
            detail(HealthStatus::Down, Some(e.to_string()))
        }
    };
    details.insert("record_store".to_string(), store);

    let dashboard = match state.dashboard.latest().await {
        Some(view) if view.is_degraded() => detail(
            HealthStatus::Degraded,
            Some(format!(
                "degraded sectors: {}",
                view.degraded_sectors
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        ),
        Some(view) => detail(
            HealthStatus::Up,
            Some(format!("generated at {}", view.generated_at.to_rfc3339())),
        ),
        None => detail(HealthStatus::Degraded, Some("no view loaded yet".into())),
    };
    details.insert("dashboard".to_string(), dashboard);

    details.insert(
        "event_bus".to_string(),
        detail(
            HealthStatus::Up,
            Some(format!("{} subscribers", state.events.subscriber_count())),
        ),
    );

    HealthInfo {
        status: HealthInfo::compute_status(&details),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        local_mode: state.local_mode,
        details,
    }
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Health check endpoint called");

    let health = collect_health(&state).await;
    let status_code = match health.status {
        HealthStatus::Up | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Liveness check endpoint
pub async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime_seconds(),
            "timestamp": Utc::now(),
        })),
    )
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
    }))
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
        .route("/version", get(version_info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_component_status_wins() {
        let mut details = HashMap::new();
        details.insert("a".to_string(), detail(HealthStatus::Up, None));
        assert_eq!(HealthInfo::compute_status(&details), HealthStatus::Up);

        details.insert("b".to_string(), detail(HealthStatus::Degraded, None));
        assert_eq!(HealthInfo::compute_status(&details), HealthStatus::Degraded);

        details.insert("c".to_string(), detail(HealthStatus::Down, None));
        assert_eq!(HealthInfo::compute_status(&details), HealthStatus::Down);
    }
}
