use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    errors::ServiceError,
    handlers::AppState,
    models::InventoryReport,
    services::{
        inventory::{FinalizeRequest, InventoryOverview, ItemFilter, SessionStats},
        inventory_session::ScanOutcome,
    },
    ApiResponse, ApiResult,
};

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/start", post(start_session))
        .route("/sessions/:id/scan", post(scan))
        .route("/sessions/:id/reset", post(reset_session))
        .route("/sessions/:id/finalize", post(finalize_session))
        .route("/items", get(list_items))
        .route("/items/export.csv", get(export_csv))
        .route("/reports", get(list_reports))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(length(min = 1, max = 64))]
    pub rua: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(alias = "codigo", alias = "code")]
    pub payload: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<StartSessionRequest>,
) -> ApiResult<SessionStats> {
    payload.validate()?;
    let stats = state.inventory.start(&session_id, &payload.rua).await?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn scan(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<ScanRequest>,
) -> ApiResult<ScanOutcome> {
    let outcome = state.inventory.scan(&session_id, &payload.payload).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Option<Json<ResetRequest>>,
) -> ApiResult<SessionStats> {
    let Json(payload) = payload.unwrap_or_default();
    let stats = state
        .inventory
        .reset(&session_id, payload.confirm)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<FinalizeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.inventory.finalize(&session_id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(report))))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionStats> {
    let stats = state.inventory.session_stats(&session_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(filter): Query<ItemFilter>,
) -> ApiResult<InventoryOverview> {
    let overview = state.inventory.list_items(&filter).await?;
    Ok(Json(ApiResponse::success(overview)))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Query(filter): Query<ItemFilter>,
) -> Result<Response, ServiceError> {
    let csv = state.inventory.export_csv(&filter).await?;
    let filename = format!(
        "inventario_completo_{}.csv",
        chrono::Utc::now().format("%Y-%m-%d")
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response())
}

pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Vec<InventoryReport>> {
    let reports = state.inventory.reports().await?;
    Ok(Json(ApiResponse::success(reports)))
}
