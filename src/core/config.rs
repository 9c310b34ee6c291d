// 服务配置：YAML 文件，支持 ${VAR} 占位符与环境变量覆盖。
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::env;
use std::fmt;
use std::fs;
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "PROFILE_SERVER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/profile-server.yaml";
pub const PORT_ENV: &str = "PORT";
pub const HOST_ENV: &str = "HOST";
pub const BIN_ID_ENV: &str = "JSONBIN_BIN_ID";
pub const MASTER_KEY_ENV: &str = "JSONBIN_MASTER_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_u16_from_any")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    pub allow_origins: Option<Vec<String>>,
    pub allow_methods: Option<Vec<String>>,
    pub allow_headers: Option<Vec<String>>,
    pub allow_credentials: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `file` 或 `remote`。
    #[serde(default)]
    pub backend: String,
    #[serde(default = "default_document_path")]
    pub document_path: String,
    #[serde(default = "default_local_default_path")]
    pub local_default_path: String,
    #[serde(default = "default_city_log_path")]
    pub city_log_path: String,
    #[serde(default)]
    pub remote: RemoteStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: String::new(),
            document_path: default_document_path(),
            local_default_path: default_local_default_path(),
            city_log_path: default_city_log_path(),
            remote: RemoteStorageConfig::default(),
        }
    }
}

fn default_document_path() -> String {
    "settings.json".to_string()
}

fn default_local_default_path() -> String {
    "settings.local.json".to_string()
}

fn default_city_log_path() -> String {
    "cities.txt".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStorageConfig {
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub bin_id: Option<String>,
    #[serde(default)]
    pub master_key: Option<String>,
    #[serde(default = "default_remote_timeout_s")]
    pub timeout_s: u64,
}

impl Default for RemoteStorageConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            bin_id: None,
            master_key: None,
            timeout_s: default_remote_timeout_s(),
        }
    }
}

fn default_remote_base_url() -> String {
    "https://api.jsonbin.io/v3".to_string()
}

fn default_remote_timeout_s() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// `global_default` 加按客户端的 `defaults` 映射。
    #[default]
    Keyed,
    /// 旧版扁平 `default` 键。
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentConfig {
    #[serde(default)]
    pub schema: SchemaVariant,
    #[serde(default)]
    pub migrate_legacy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    File,
    Remote,
}

impl StorageConfig {
    pub fn backend_kind(&self) -> Result<BackendKind, String> {
        let backend = self.backend.trim().to_lowercase();
        match backend.as_str() {
            "" | "file" | "local" | "default" => Ok(BackendKind::File),
            "remote" | "jsonbin" => Ok(BackendKind::Remote),
            other => Err(other.to_string()),
        }
    }
}

impl RemoteStorageConfig {
    /// 环境变量优先于配置文件中的值。
    pub fn bin_id(&self) -> Option<String> {
        resolve_secret(BIN_ID_ENV, self.bin_id.as_deref())
    }

    pub fn master_key(&self) -> Option<String> {
        resolve_secret(MASTER_KEY_ENV, self.master_key.as_deref())
    }
}

fn resolve_secret(env_name: &str, inline: Option<&str>) -> Option<String> {
    env::var(env_name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            inline
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
}

impl Config {
    pub fn bind_address(&self) -> String {
        let host = env::var(HOST_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.server.host.clone());
        let port = env::var(PORT_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(self.server.port);
        format!("{host}:{port}")
    }
}

fn deserialize_u16_from_any<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    struct U16Visitor;

    impl<'de> Visitor<'de> for U16Visitor {
        type Value = u16;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("u16 or numeric string")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u16::try_from(value).map_err(|_| E::custom("u16 out of range"))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value < 0 {
                return Err(E::custom("u16 must be non-negative"));
            }
            self.visit_u64(value as u64)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(E::custom("u16 string is empty"));
            }
            trimmed
                .parse::<u16>()
                .map_err(|_| E::custom("invalid u16 string"))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            self.visit_str(&value)
        }
    }

    deserializer.deserialize_any(U16Visitor)
}

pub fn load_config() -> Config {
    let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(&path)
}

pub fn load_config_from(path: &str) -> Config {
    let mut value = read_yaml(path);
    if value.is_null() {
        return Config::default();
    }
    expand_yaml_env(&mut value);
    serde_yaml::from_value::<Config>(value).unwrap_or_else(|err| {
        warn!("配置解析失败，使用默认配置: {err}");
        Config::default()
    })
}

fn read_yaml(path: &str) -> Value {
    // 首次启动时配置文件可以不存在。
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("读取配置失败: {path}, {err}");
            return Value::Null;
        }
    };
    serde_yaml::from_str(&content).unwrap_or_else(|err| {
        warn!("解析 YAML 失败: {path}, {err}");
        Value::Null
    })
}

fn expand_yaml_env(value: &mut Value) {
    match value {
        Value::String(text) => {
            *text = expand_env_placeholders(text);
        }
        Value::Sequence(items) => {
            for item in items {
                expand_yaml_env(item);
            }
        }
        Value::Mapping(map) => {
            for (_, value) in map.iter_mut() {
                expand_yaml_env(value);
            }
        }
        _ => {}
    }
}

fn expand_env_placeholders(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        rest = &rest[start + 2..];
        let Some(end) = rest.find('}') else {
            output.push_str("${");
            output.push_str(rest);
            return output;
        };
        let inner = &rest[..end];
        rest = &rest[end + 1..];
        let (name, default_value) = match inner.split_once(":-") {
            Some((name, default_value)) => (name.trim(), Some(default_value)),
            None => (inner.trim(), None),
        };
        if name.is_empty() {
            output.push_str("${");
            output.push_str(inner);
            output.push('}');
            continue;
        }
        let resolved = env::var(name).ok().filter(|value| !value.is_empty());
        match (resolved, default_value) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(default_value)) => output.push_str(default_value),
            (None, None) => {}
        }
    }
    output.push_str(rest);
    output
}
