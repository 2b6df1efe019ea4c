use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::{
    auth::{AuthError, CostLoginRequest, CostLoginResponse},
    handlers::AppState,
};

/// `POST /api/auth/custos`. Unparseable bodies are treated as missing fields.
pub async fn cost_login(
    State(state): State<AppState>,
    payload: Result<Json<CostLoginRequest>, JsonRejection>,
) -> Result<Json<CostLoginResponse>, AuthError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "unreadable login body");
        AuthError::MissingFields
    })?;
    state.auth.verify_cost_login(request).await.map(Json)
}
