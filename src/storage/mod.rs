// 存储模块：JSON 文档后端，以及城市日志和本机默认档案等本地资源。

mod city_log;
mod file;
mod local_default;
mod remote;

use crate::core::config::{BackendKind, DocumentConfig, SchemaVariant, StorageConfig};
use crate::document::{
    merge_fragment, migrate_legacy_default, seed_document, Document, DocumentFragment,
};
use crate::services::errors::{ServiceError, ServiceResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub use city_log::{CityLog, CityRecordStatus};
pub use file::FileBackend;
pub use local_default::LocalDefaultStore;
pub use remote::RemoteBackend;

/// 文档存储介质抽象，只能整体读取与整体替换。
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// 资源尚未创建时返回 `Ok(None)`。
    async fn load(&self) -> Result<Option<Value>>;

    async fn save(&self, document: &Value) -> Result<()>;
}

/// [`DocumentBackend`] 的读取与合并写入口，不缓存文档，每次调用都回到存储介质。
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    options: DocumentConfig,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, options: DocumentConfig) -> Self {
        Self { backend, options }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn schema(&self) -> SchemaVariant {
        self.options.schema
    }

    /// 文档不存在时写入种子，开启时执行旧版迁移；可重复调用，返回是否发生写入。
    pub async fn ensure_initialized(&self) -> Result<bool> {
        let current = self.backend.load().await?;
        let Some(current) = current else {
            let seed = seed_document(self.options.schema);
            self.backend.save(&seed).await?;
            info!(backend = self.backend.name(), "已写入初始文档");
            return Ok(true);
        };
        let Value::Object(mut map) = current else {
            return Err(anyhow!("stored document is not a JSON object"));
        };
        if self.options.migrate_legacy
            && self.options.schema == SchemaVariant::Keyed
            && migrate_legacy_default(&mut map)
        {
            self.backend.save(&Value::Object(map)).await?;
            info!(backend = self.backend.name(), "已迁移旧版 default 键");
            return Ok(true);
        }
        Ok(false)
    }

    /// 原样返回存储中的文档。
    pub async fn read_raw(&self) -> ServiceResult<Value> {
        match self.backend.load().await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(ServiceError::store_unavailable(
                "document store has not been initialized",
            )),
            Err(err) => {
                warn!(backend = self.backend.name(), "读取文档失败: {err:#}");
                Err(ServiceError::store_unavailable(format!(
                    "document read failed: {err:#}"
                )))
            }
        }
    }

    pub async fn read(&self) -> ServiceResult<Document> {
        let raw = self.read_raw().await?;
        parse_document(raw)
    }

    /// 将 `fragment` 合并到当前文档并整体写回。
    pub async fn write(&self, fragment: DocumentFragment) -> ServiceResult<Document> {
        let mut current = match self.read_raw().await? {
            Value::Object(map) => map,
            _ => {
                return Err(ServiceError::store_unavailable(
                    "stored document is not a JSON object",
                ))
            }
        };
        let fragment = fragment.align_default_key(self.options.schema);
        merge_fragment(&mut current, fragment.into_map());
        let merged = Value::Object(current);
        let document = parse_document(merged.clone())?;
        self.persist(&merged).await?;
        Ok(document)
    }

    async fn persist(&self, document: &Value) -> ServiceResult<()> {
        self.backend.save(document).await.map_err(|err| {
            warn!(backend = self.backend.name(), "写入文档失败: {err:#}");
            ServiceError::write_failed(format!("document write failed: {err:#}"))
        })
    }
}

fn parse_document(raw: Value) -> ServiceResult<Document> {
    if !raw.is_object() {
        return Err(ServiceError::store_unavailable(
            "stored document is not a JSON object",
        ));
    }
    Document::from_value(raw)
        .map_err(|err| ServiceError::store_unavailable(format!("malformed document: {err}")))
}

/// 根据 backend 配置选择文档后端，远程凭据缺失时直接中止启动。
pub fn build_backend(config: &StorageConfig) -> Result<Arc<dyn DocumentBackend>> {
    match config.backend_kind() {
        Ok(BackendKind::File) => Ok(Arc::new(FileBackend::new(&config.document_path))),
        Ok(BackendKind::Remote) => Ok(Arc::new(RemoteBackend::from_config(&config.remote)?)),
        Err(other) => Err(anyhow!("unknown storage backend: {other}")),
    }
}
