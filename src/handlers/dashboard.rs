use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::str::FromStr;

use crate::{
    errors::ServiceError,
    handlers::AppState,
    models::Sector,
    services::{aggregator::SectorSummary, reconciler::CrossSectorView},
    ApiResponse, ApiResult,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_dashboard))
        .route("/sectors/:sector", get(get_sector_summary))
}

/// Fresh cross-sector view. Degraded sectors come back zeroed, never as an error.
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<CrossSectorView> {
    let view = state.dashboard.load_view().await;
    Ok(Json(ApiResponse::success(view.as_ref().clone())))
}

pub async fn get_sector_summary(
    State(state): State<AppState>,
    Path(sector): Path<String>,
) -> ApiResult<SectorSummary> {
    let sector = Sector::from_str(&sector)
        .map_err(|_| ServiceError::BadRequest(format!("unknown sector '{}'", sector)))?;
    let summary = state.dashboard.load_sector(sector).await?;
    Ok(Json(ApiResponse::success(summary)))
}
