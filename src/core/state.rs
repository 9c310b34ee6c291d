// 全局状态：配置与绑定存储后的档案服务。

use crate::core::config::{BackendKind, Config};
use crate::services::profiles::ProfileService;
use crate::storage::{build_backend, CityLog, DocumentBackend, DocumentStore, LocalDefaultStore};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub profiles: ProfileService,
}

impl AppState {
    /// 按配置构建存储并初始化文档，远程凭据缺失会在这里中止启动。
    pub async fn new(config: Config) -> Result<Self> {
        let backend = build_backend(&config.storage)?;
        Self::with_backend(config, backend).await
    }

    pub async fn with_backend(config: Config, backend: Arc<dyn DocumentBackend>) -> Result<Self> {
        let kind = config
            .storage
            .backend_kind()
            .map_err(|other| anyhow!("unknown storage backend: {other}"))?;
        let store = DocumentStore::new(backend, config.document.clone());
        store
            .ensure_initialized()
            .await
            .context("document store initialization failed")?;
        info!(
            backend = store.backend_name(),
            schema = ?store.schema(),
            "文档存储已就绪"
        );

        let city_log = CityLog::new(&config.storage.city_log_path);
        let local_default = match kind {
            BackendKind::File => Some(LocalDefaultStore::new(&config.storage.local_default_path)),
            BackendKind::Remote => None,
        };
        let profiles = ProfileService::new(store, city_log, local_default);
        Ok(Self { config, profiles })
    }
}
