// 解析层：在文档存储之上处理默认档案、档案、窗口位置与城市列表。
use crate::core::schemas::ConfigResponse;
use crate::document::{Document, DocumentFragment, Position, ProfileRecord, DEFAULT_POSITION};
use crate::services::errors::{ServiceError, ServiceResult};
use crate::storage::{CityLog, CityRecordStatus, DocumentStore, LocalDefaultStore};
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ProfileService {
    store: DocumentStore,
    city_log: CityLog,
    local_default: Option<LocalDefaultStore>,
}

impl ProfileService {
    pub fn new(
        store: DocumentStore,
        city_log: CityLog,
        local_default: Option<LocalDefaultStore>,
    ) -> Self {
        Self {
            store,
            city_log,
            local_default,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub async fn raw_document(&self) -> ServiceResult<Value> {
        self.store.read_raw().await
    }

    /// 优先取客户端覆盖值，否则回退到全局默认，只读。
    pub async fn resolve_default(&self, client_id: Option<&str>) -> ServiceResult<Option<String>> {
        let document = self.store.read().await?;
        Ok(document.resolve_default(client_id).map(str::to_string))
    }

    /// `GET /config` 的响应体。本机默认存在时替代全局默认，客户端覆盖仍然优先。
    pub async fn effective_config(&self, client_id: Option<&str>) -> ServiceResult<ConfigResponse> {
        let document = self.store.read().await?;
        let local = self.local_default_value().await;
        let client_override = normalize(client_id)
            .and_then(|client_id| document.client_default(client_id))
            .map(str::to_string);
        let default = client_override
            .or(local)
            .or_else(|| document.global_default().map(str::to_string));
        let Document {
            profiles,
            positions,
            cities,
            ..
        } = document;
        Ok(ConfigResponse {
            default,
            profiles,
            positions,
            cities,
        })
    }

    /// 旧版整文档写入，仍走合并写。
    pub async fn replace_config(&self, fragment: DocumentFragment) -> ServiceResult<Document> {
        if fragment.is_empty() {
            return Err(ServiceError::invalid_request("No data"));
        }
        self.store.write(fragment).await
    }

    pub async fn set_default(
        &self,
        client_id: Option<&str>,
        profile_id: Option<&str>,
    ) -> ServiceResult<(String, String)> {
        let (Some(client_id), Some(profile_id)) = (normalize(client_id), normalize(profile_id))
        else {
            return Err(ServiceError::invalid_request(
                "browser_id and default are required",
            ));
        };
        self.store
            .write(DocumentFragment::client_default(client_id, profile_id))
            .await?;
        debug!(client_id, profile_id, "客户端默认档案已更新");
        Ok((client_id.to_string(), profile_id.to_string()))
    }

    pub async fn get_profile(&self, profile_id: &str) -> ServiceResult<ProfileRecord> {
        let document = self.store.read().await?;
        match document.profile(profile_id) {
            Some(record) if !record.is_empty() => Ok(record.clone()),
            _ => Err(ServiceError::not_found("Profile not found")),
        }
    }

    /// 档案不存在时先创建，再按一层深度合并 `fields`。
    pub async fn upsert_profile(
        &self,
        profile_id: &str,
        fields: Map<String, Value>,
    ) -> ServiceResult<ProfileRecord> {
        let profile_id = normalize(Some(profile_id))
            .ok_or_else(|| ServiceError::invalid_request("profile id is required"))?;
        let document = self.store.read().await?;
        let mut record = document.profile(profile_id).cloned().unwrap_or_default();
        for (key, value) in fields {
            record.insert(key, value);
        }
        self.store
            .write(DocumentFragment::profile(profile_id, record.clone()))
            .await?;
        Ok(record)
    }

    pub async fn save_position(
        &self,
        client_id: Option<&str>,
        top: Option<&Value>,
        left: Option<&Value>,
    ) -> ServiceResult<Position> {
        let client_id = normalize(client_id)
            .ok_or_else(|| ServiceError::invalid_request("browser_id is required"))?;
        let position = Position {
            top: coerce_coordinate(top),
            left: coerce_coordinate(left),
        };
        self.store
            .write(DocumentFragment::position(client_id, position))
            .await?;
        Ok(position)
    }

    /// 按换行拆分并保存单个客户端的城市列表，返回保留的数量。
    pub async fn set_cities(
        &self,
        client_id: Option<&str>,
        text: Option<&str>,
    ) -> ServiceResult<usize> {
        let client_id = normalize(client_id)
            .ok_or_else(|| ServiceError::invalid_request("browser_id is required"))?;
        let cities = split_city_lines(text.unwrap_or_default());
        let count = cities.len();
        self.store
            .write(DocumentFragment::client_cities(client_id, cities))
            .await?;
        Ok(count)
    }

    pub async fn record_city(
        &self,
        name: Option<&str>,
        location: Option<&str>,
        client_id: Option<&str>,
    ) -> ServiceResult<CityRecordStatus> {
        let (Some(name), Some(location)) = (normalize(name), normalize(location)) else {
            return Err(ServiceError::invalid_request(
                "name and location are required",
            ));
        };
        let line = CityLog::format_line(name, location, client_id);
        self.city_log.append_unique(&line).await.map_err(|err| {
            warn!("城市日志追加失败: {err:#}");
            ServiceError::write_failed(err.to_string())
        })
    }

    pub async fn list_cities(&self) -> ServiceResult<Vec<String>> {
        match self.city_log.lines().await {
            Ok(Some(lines)) => Ok(lines),
            Ok(None) => Err(ServiceError::not_found("City log not found")),
            Err(err) => Err(ServiceError::store_unavailable(err.to_string())),
        }
    }

    pub async fn clear_cities(&self) -> ServiceResult<()> {
        self.city_log.clear().await.map_err(|err| {
            warn!("城市日志清空失败: {err:#}");
            ServiceError::write_failed(err.to_string())
        })
    }

    pub async fn city_log_bytes(&self) -> ServiceResult<Vec<u8>> {
        match self.city_log.read_bytes().await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(ServiceError::not_found("City log not found")),
            Err(err) => Err(ServiceError::store_unavailable(err.to_string())),
        }
    }

    pub async fn local_default(&self) -> ServiceResult<Option<String>> {
        let store = self.local_default_store()?;
        store
            .get()
            .await
            .map_err(|err| ServiceError::store_unavailable(err.to_string()))
    }

    pub async fn set_local_default(&self, profile_id: Option<&str>) -> ServiceResult<String> {
        let store = self.local_default_store()?;
        let profile_id = normalize(profile_id)
            .ok_or_else(|| ServiceError::invalid_request("No default provided"))?;
        store
            .set(profile_id)
            .await
            .map_err(|err| ServiceError::write_failed(err.to_string()))?;
        Ok(profile_id.to_string())
    }

    fn local_default_store(&self) -> ServiceResult<&LocalDefaultStore> {
        self.local_default
            .as_ref()
            .ok_or_else(|| ServiceError::not_found("local default is only kept by the file backend"))
    }

    /// 本地文件损坏时忽略，不影响 `GET /config`。
    async fn local_default_value(&self) -> Option<String> {
        let store = self.local_default.as_ref()?;
        match store.get().await {
            Ok(value) => value,
            Err(err) => {
                warn!("忽略本机默认档案: {err:#}");
                None
            }
        }
    }
}

fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// 接受数字与数字字符串，其余情况回退到 15.0。
pub fn coerce_coordinate(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_POSITION)
}

pub fn split_city_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinates_coerce_or_fall_back() {
        assert_eq!(coerce_coordinate(None), 15.0);
        assert_eq!(coerce_coordinate(Some(&json!(null))), 15.0);
        assert_eq!(coerce_coordinate(Some(&json!(42))), 42.0);
        assert_eq!(coerce_coordinate(Some(&json!(-3.5))), -3.5);
        assert_eq!(coerce_coordinate(Some(&json!(" 12.25 "))), 12.25);
        assert_eq!(coerce_coordinate(Some(&json!("left"))), 15.0);
        assert_eq!(coerce_coordinate(Some(&json!("NaN"))), 15.0);
        assert_eq!(coerce_coordinate(Some(&json!([1]))), 15.0);
    }

    #[test]
    fn city_lines_are_trimmed_and_blank_lines_dropped() {
        assert_eq!(
            split_city_lines("Paris\n\nLondon\n"),
            vec!["Paris".to_string(), "London".to_string()]
        );
        assert_eq!(
            split_city_lines("  Oslo \r\n\t\r\nRome"),
            vec!["Oslo".to_string(), "Rome".to_string()]
        );
        assert!(split_city_lines("").is_empty());
    }
}
