// 城市日志相关路由。
use crate::api::errors::service_error_response;
use crate::api::parse_json_body;
use crate::core::schemas::{AddCityRequest, CityListResponse};
use crate::core::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_DOWNLOAD_NAME: &str = "cities.txt";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add-city", post(add_city))
        .route("/get-cities", get(get_cities))
        .route("/download-cities", get(download_cities))
        .route("/clear-cities", post(clear_cities))
}

async fn add_city(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let request: AddCityRequest = parse_json_body(&body)?;
    let status = state
        .profiles
        .record_city(
            request.name.as_deref(),
            request.location.as_deref(),
            request.browser_id.as_deref(),
        )
        .await
        .map_err(service_error_response)?;
    Ok(Json(json!({ "status": status.as_str() })))
}

async fn get_cities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CityListResponse>, Response> {
    let cities = state
        .profiles
        .list_cities()
        .await
        .map_err(service_error_response)?;
    let count = cities.len();
    Ok(Json(CityListResponse { cities, count }))
}

async fn download_cities(State(state): State<Arc<AppState>>) -> Result<Response, Response> {
    let bytes = state
        .profiles
        .city_log_bytes()
        .await
        .map_err(service_error_response)?;
    let filename = std::path::Path::new(&state.config.storage.city_log_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_DOWNLOAD_NAME)
        .to_string();
    Ok(attachment_response(bytes, &filename))
}

async fn clear_cities(State(state): State<Arc<AppState>>) -> Result<Json<Value>, Response> {
    state
        .profiles
        .clear_cities()
        .await
        .map_err(service_error_response)?;
    Ok(Json(json!({ "status": "cleared" })))
}

fn attachment_response(bytes: Vec<u8>, filename: &str) -> Response {
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&build_content_disposition(filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

fn build_content_disposition(filename: &str) -> String {
    let ascii_name = sanitize_filename(filename);
    format!("attachment; filename=\"{ascii_name}\"")
}

fn sanitize_filename(value: &str) -> String {
    let output: String = value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if output.trim_matches('_').is_empty() {
        DEFAULT_DOWNLOAD_NAME.to_string()
    } else {
        output
    }
}
