// HTTP 路由，按操作的文档部分拆分。
pub mod cities;
pub mod config;
pub mod errors;
pub mod profiles;

use crate::api::errors::{error_response_with_detail, hint_for_error_code};
use crate::core::state::AppState;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(config::router())
        .merge(profiles::router())
        .merge(cities::router())
        .with_state(state)
}

/// 解析可选 JSON 请求体；空请求体返回 `T::default()`，由处理函数自行校验必填字段。
pub(crate) fn parse_json_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        error_response_with_detail(
            StatusCode::BAD_REQUEST,
            Some("INVALID_JSON"),
            err.to_string(),
            hint_for_error_code("INVALID_JSON"),
        )
    })
}
