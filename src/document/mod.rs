// 持久化 JSON 文档及其合并片段的类型化视图。
mod merge;
mod schema;

pub use merge::merge_fragment;
pub use schema::{migrate_legacy_default, seed_document};

use crate::core::config::SchemaVariant;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 自由格式的档案字段，例如 `name`、`age`。
pub type ProfileRecord = Map<String, Value>;

pub const DEFAULT_POSITION: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            top: DEFAULT_POSITION,
            left: DEFAULT_POSITION,
        }
    }
}

/// 完整文档。未识别的顶层键保存在 `extra` 中，类型化往返不会丢失数据。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_default: Option<String>,
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub legacy_default: Option<String>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<BTreeMap<String, Position>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cities: Option<BTreeMap<String, Vec<String>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// `global_default` 优先于旧版扁平 `default` 键。
    pub fn global_default(&self) -> Option<&str> {
        self.global_default
            .as_deref()
            .or(self.legacy_default.as_deref())
    }

    pub fn client_default(&self, client_id: &str) -> Option<&str> {
        self.defaults.get(client_id).map(String::as_str)
    }

    /// 先查客户端覆盖，再回退全局默认。
    pub fn resolve_default(&self, client_id: Option<&str>) -> Option<&str> {
        client_id
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|client_id| self.client_default(client_id))
            .or_else(|| self.global_default())
    }

    pub fn profile(&self, profile_id: &str) -> Option<&ProfileRecord> {
        self.profiles.get(profile_id)
    }

    pub fn position(&self, client_id: &str) -> Option<Position> {
        self.positions
            .as_ref()
            .and_then(|positions| positions.get(client_id))
            .copied()
    }

    pub fn client_cities(&self, client_id: &str) -> Option<&[String]> {
        self.cities
            .as_ref()
            .and_then(|cities| cities.get(client_id))
            .map(Vec::as_slice)
    }
}

/// 交给存储合并写的部分文档。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<BTreeMap<String, ProfileRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_default: Option<String>,
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub legacy_default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<BTreeMap<String, Position>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cities: Option<BTreeMap<String, Vec<String>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentFragment {
    pub fn profile(profile_id: &str, record: ProfileRecord) -> Self {
        Self {
            profiles: Some(BTreeMap::from([(profile_id.to_string(), record)])),
            ..Self::default()
        }
    }

    pub fn client_default(client_id: &str, profile_id: &str) -> Self {
        Self {
            defaults: Some(BTreeMap::from([(
                client_id.to_string(),
                profile_id.to_string(),
            )])),
            ..Self::default()
        }
    }

    pub fn position(client_id: &str, position: Position) -> Self {
        Self {
            positions: Some(BTreeMap::from([(client_id.to_string(), position)])),
            ..Self::default()
        }
    }

    pub fn client_cities(client_id: &str, cities: Vec<String>) -> Self {
        Self {
            cities: Some(BTreeMap::from([(client_id.to_string(), cities)])),
            ..Self::default()
        }
    }

    /// 把 `default` 与 `global_default` 统一到当前 schema 使用的键，
    /// 两者同时出现时保留该 schema 自己的键。
    pub fn align_default_key(mut self, schema: SchemaVariant) -> Self {
        match schema {
            SchemaVariant::Keyed => {
                if let Some(value) = self.legacy_default.take() {
                    self.global_default.get_or_insert(value);
                }
            }
            SchemaVariant::Flat => {
                if let Some(value) = self.global_default.take() {
                    self.legacy_default.get_or_insert(value);
                }
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
