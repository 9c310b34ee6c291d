// 远程 JSON 存储后端，对接 JSONBin v3 接口。
use crate::core::config::{RemoteStorageConfig, BIN_ID_ENV, MASTER_KEY_ENV};
use crate::storage::DocumentBackend;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;

const MASTER_KEY_HEADER: &str = "X-Master-Key";
const BIN_META_HEADER: &str = "X-Bin-Meta";
const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct RemoteBackend {
    client: Client,
    base_url: String,
    bin_id: String,
    master_key: String,
}

impl RemoteBackend {
    pub fn new(
        base_url: &str,
        bin_id: impl Into<String>,
        master_key: impl Into<String>,
        timeout_s: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_s.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build remote store http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            bin_id: bin_id.into(),
            master_key: master_key.into(),
        })
    }

    /// bin id 与 master key 均为必填。
    pub fn from_config(config: &RemoteStorageConfig) -> Result<Self> {
        let bin_id = config
            .bin_id()
            .ok_or_else(|| anyhow!("remote storage requires a bin id ({BIN_ID_ENV})"))?;
        let master_key = config
            .master_key()
            .ok_or_else(|| anyhow!("remote storage requires a master key ({MASTER_KEY_ENV})"))?;
        Self::new(&config.base_url, bin_id, master_key, config.timeout_s)
    }

    fn latest_url(&self) -> String {
        format!("{}/b/{}/latest", self.base_url, self.bin_id)
    }

    fn bin_url(&self) -> String {
        format!("{}/b/{}", self.base_url, self.bin_id)
    }
}

#[async_trait]
impl DocumentBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load(&self) -> Result<Option<Value>> {
        let response = self
            .client
            .get(self.latest_url())
            .header(MASTER_KEY_HEADER, &self.master_key)
            .header(BIN_META_HEADER, "false")
            .send()
            .await
            .context("remote store read request failed")?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .context("read remote store response body")?;
        if !status.is_success() {
            return Err(anyhow!(
                "remote store read failed: {status} {}",
                truncate_text(&body, MAX_ERROR_BODY_CHARS)
            ));
        }
        let value: Value =
            serde_json::from_str(&body).context("parse remote store response body")?;
        Ok(Some(unwrap_record(value)))
    }

    async fn save(&self, document: &Value) -> Result<()> {
        let response = self
            .client
            .put(self.bin_url())
            .header(MASTER_KEY_HEADER, &self.master_key)
            .json(document)
            .send()
            .await
            .context("remote store write request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "remote store write failed: {status} {}",
                truncate_text(&body, MAX_ERROR_BODY_CHARS)
            ));
        }
        Ok(())
    }
}

/// 部分部署忽略 `X-Bin-Meta: false`，返回 `{record, metadata}` 包装。
/// 只有顶层恰好是这两个键且 `metadata.id` 为字符串时才拆包。
fn unwrap_record(value: Value) -> Value {
    match value {
        Value::Object(mut map) if is_bin_envelope(&map) => {
            map.remove("record").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn is_bin_envelope(map: &Map<String, Value>) -> bool {
    map.len() == 2
        && map.contains_key("record")
        && map
            .get("metadata")
            .and_then(|metadata| metadata.get("id"))
            .is_some_and(Value::is_string)
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut output: String = text.chars().take(max_chars).collect();
    output.push_str("...");
    output
}
