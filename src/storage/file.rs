// 本地 JSON 文件后端。
use crate::storage::DocumentBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<Option<Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read document failed: {}", self.path.display()))
            }
        };
        let value = serde_json::from_str(&text)
            .with_context(|| format!("parse document failed: {}", self.path.display()))?;
        Ok(Some(value))
    }

    async fn save(&self, document: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create document dir failed: {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&self.path, text)
            .await
            .with_context(|| format!("write document failed: {}", self.path.display()))?;
        Ok(())
    }
}
