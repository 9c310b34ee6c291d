// 只追加的城市日志，每行格式为 "<name> - <location> (<client>)"。
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CityRecordStatus {
    Added,
    Duplicate,
}

impl CityRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ok",
            Self::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CityLog {
    path: PathBuf,
}

impl CityLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 字段内的换行折叠为空格，保证一条记录只占一行。
    pub fn format_line(name: &str, location: &str, client_id: Option<&str>) -> String {
        let client = client_id
            .map(single_line)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
        format!(
            "{} - {} ({client})",
            single_line(name),
            single_line(location)
        )
    }

    /// 日志中没有完全相同的行时才追加。
    pub async fn append_unique(&self, line: &str) -> Result<CityRecordStatus> {
        let existing = self.read_text().await?.unwrap_or_default();
        if existing
            .lines()
            .any(|current| current.trim_end_matches('\r') == line)
        {
            return Ok(CityRecordStatus::Duplicate);
        }
        self.ensure_parent().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("open city log failed: {}", self.path.display()))?;
        let mut entry = String::with_capacity(line.len() + 2);
        if !existing.is_empty() && !existing.ends_with('\n') {
            entry.push('\n');
        }
        entry.push_str(line);
        entry.push('\n');
        file.write_all(entry.as_bytes())
            .await
            .with_context(|| format!("append city log failed: {}", self.path.display()))?;
        file.flush().await?;
        Ok(CityRecordStatus::Added)
    }

    /// 返回非空行；日志从未创建时返回 `None`。
    pub async fn lines(&self) -> Result<Option<Vec<String>>> {
        let Some(text) = self.read_text().await? else {
            return Ok(None);
        };
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Some(lines))
    }

    pub async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("read city log failed: {}", self.path.display()))
            }
        }
    }

    /// 清空日志，不存在时创建空文件。
    pub async fn clear(&self) -> Result<()> {
        self.ensure_parent().await?;
        tokio::fs::write(&self.path, b"")
            .await
            .with_context(|| format!("clear city log failed: {}", self.path.display()))
    }

    async fn read_text(&self) -> Result<Option<String>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create city log dir failed: {}", parent.display()))?;
        }
        Ok(())
    }
}

fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
