// 本机默认档案，与共享文档分开保存（仅文件后端）。
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalDefault {
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocalDefaultStore {
    path: PathBuf,
}

impl LocalDefaultStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> Result<Option<String>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read local default failed: {}", self.path.display()))
            }
        };
        let parsed: LocalDefault = serde_json::from_str(&text)
            .with_context(|| format!("parse local default failed: {}", self.path.display()))?;
        Ok(parsed
            .default
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }

    pub async fn set(&self, profile_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("create local default dir failed: {}", parent.display())
            })?;
        }
        let payload = LocalDefault {
            default: Some(profile_id.to_string()),
        };
        let text = serde_json::to_string_pretty(&payload)?;
        tokio::fs::write(&self.path, text)
            .await
            .with_context(|| format!("write local default failed: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDefaultStore::new(dir.path().join("settings.local.json"));
        assert_eq!(store.get().await.unwrap(), None);

        store.set("B").await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some("B".to_string()));
    }

    #[tokio::test]
    async fn blank_value_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.local.json");
        std::fs::write(&path, r#"{"default": "  "}"#).unwrap();
        let store = LocalDefaultStore::new(&path);
        assert_eq!(store.get().await.unwrap(), None);
    }
}
