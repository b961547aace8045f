//! Preset management endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use sieve_core::{PresetFields, PresetResponse};

use super::error::ApiResult;
use super::AppState;

/// Body of `POST /api/configurations/{id}/state`.
#[derive(Debug, Deserialize)]
pub struct StateRequest {
    /// New filtering state.
    pub enabled: bool,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `POST /api/configurations`
pub async fn create_preset(
    State(state): State<AppState>,
    Json(request): Json<PresetFields>,
) -> ApiResult<Json<PresetResponse>> {
    Ok(Json(state.presets.add(&request).await?))
}

/// `GET /api/configurations`
pub async fn list_presets(State(state): State<AppState>) -> ApiResult<Json<Vec<PresetResponse>>> {
    Ok(Json(state.presets.list().await?))
}

/// `GET /api/configurations/{id}`
pub async fn get_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PresetResponse>> {
    Ok(Json(state.presets.get(&id).await?))
}

/// `PUT /api/configurations/{id}`
pub async fn update_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<PresetFields>,
) -> ApiResult<Json<PresetResponse>> {
    Ok(Json(state.presets.update(&id, &fields).await?))
}

/// `DELETE /api/configurations/{id}`
pub async fn delete_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.presets.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/configurations/{id}/state`
pub async fn set_preset_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StateRequest>,
) -> ApiResult<StatusCode> {
    state.presets.set_state(&id, request.enabled).await?;
    Ok(StatusCode::OK)
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
