// 档案与客户端级别的路由。
use crate::api::errors::service_error_response;
use crate::api::parse_json_body;
use crate::core::schemas::{SavePositionRequest, SetCitiesRequest, SetDefaultRequest};
use crate::core::state::AppState;
use crate::document::ProfileRecord;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile/{id}", get(get_profile).post(update_profile))
        .route("/set-default", post(set_default))
        .route("/save-position", post(save_position))
        .route("/set-cities", post(set_cities))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> Result<Json<ProfileRecord>, Response> {
    let record = state
        .profiles
        .get_profile(&profile_id)
        .await
        .map_err(service_error_response)?;
    Ok(Json(record))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let fields: Map<String, Value> = parse_json_body(&body)?;
    let profile = state
        .profiles
        .upsert_profile(&profile_id, fields)
        .await
        .map_err(service_error_response)?;
    info!(profile_id = %profile_id, "档案已更新");
    Ok(Json(json!({ "status": "ok", "profile": profile })))
}

async fn set_default(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let request: SetDefaultRequest = parse_json_body(&body)?;
    let (browser_id, default) = state
        .profiles
        .set_default(request.browser_id.as_deref(), request.default.as_deref())
        .await
        .map_err(service_error_response)?;
    Ok(Json(json!({
        "status": "ok",
        "browser_id": browser_id,
        "default": default,
    })))
}

async fn save_position(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let request: SavePositionRequest = parse_json_body(&body)?;
    state
        .profiles
        .save_position(
            request.browser_id.as_deref(),
            request.top.as_ref(),
            request.left.as_ref(),
        )
        .await
        .map_err(service_error_response)?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn set_cities(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let request: SetCitiesRequest = parse_json_body(&body)?;
    let count = state
        .profiles
        .set_cities(request.browser_id.as_deref(), request.cities.as_deref())
        .await
        .map_err(service_error_response)?;
    Ok(Json(json!({ "status": "ok", "count": count })))
}
