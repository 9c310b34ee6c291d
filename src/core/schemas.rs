// HTTP 处理函数共用的请求与响应结构。
use crate::document::{Position, ProfileRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub struct ConfigQuery {
    #[serde(default)]
    pub browser_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub default: Option<String>,
    pub profiles: BTreeMap<String, ProfileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<BTreeMap<String, Position>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cities: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalDefaultRequest {
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SetDefaultRequest {
    #[serde(default)]
    pub browser_id: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

/// `top`/`left` 保持宽松类型，字符串或非法值回退到默认位置。
#[derive(Debug, Default, Deserialize)]
pub struct SavePositionRequest {
    #[serde(default)]
    pub browser_id: Option<String>,
    #[serde(default)]
    pub top: Option<Value>,
    #[serde(default)]
    pub left: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SetCitiesRequest {
    #[serde(default)]
    pub browser_id: Option<String>,
    #[serde(default)]
    pub cities: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddCityRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub browser_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CityListResponse {
    pub cities: Vec<String>,
    pub count: usize,
}
