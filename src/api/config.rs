// 整文档路由：/config、/local-default、/debug 与根路径存活检查。
use crate::api::errors::service_error_response;
use crate::api::parse_json_body;
use crate::core::schemas::{ConfigQuery, ConfigResponse, LocalDefaultRequest};
use crate::core::state::AppState;
use crate::document::DocumentFragment;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const LIVENESS_TEXT: &str = "Profile config server is running";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(liveness))
        .route("/config", get(get_config).post(update_config))
        .route(
            "/local-default",
            get(get_local_default).post(set_local_default),
        )
        .route("/debug", get(debug_document))
}

async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

async fn get_config(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<ConfigResponse>, Response> {
    let config = state
        .profiles
        .effective_config(query.browser_id.as_deref())
        .await
        .map_err(service_error_response)?;
    Ok(Json(config))
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let fragment: DocumentFragment = parse_json_body(&body)?;
    state
        .profiles
        .replace_config(fragment)
        .await
        .map_err(service_error_response)?;
    info!("已通过 /config 更新文档");
    Ok(Json(json!({ "status": "ok" })))
}

async fn get_local_default(State(state): State<Arc<AppState>>) -> Result<Json<Value>, Response> {
    let value = state
        .profiles
        .local_default()
        .await
        .map_err(service_error_response)?;
    Ok(Json(json!({ "default": value })))
}

async fn set_local_default(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let request: LocalDefaultRequest = parse_json_body(&body)?;
    let value = state
        .profiles
        .set_local_default(request.default.as_deref())
        .await
        .map_err(service_error_response)?;
    Ok(Json(json!({ "status": "ok", "default": value })))
}

async fn debug_document(State(state): State<Arc<AppState>>) -> Result<Json<Value>, Response> {
    let raw = state
        .profiles
        .raw_document()
        .await
        .map_err(service_error_response)?;
    Ok(Json(raw))
}
