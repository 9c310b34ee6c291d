// 种子文档与旧版 default 键的一次性迁移。
use crate::core::config::SchemaVariant;
use serde_json::{json, Map, Value};

pub fn seed_document(variant: SchemaVariant) -> Value {
    let profiles = json!({
        "A": { "name": "Анна", "age": 27 },
        "B": { "name": "Мария", "age": 30 }
    });
    match variant {
        SchemaVariant::Keyed => json!({
            "global_default": "A",
            "defaults": {},
            "profiles": profiles,
        }),
        SchemaVariant::Flat => json!({
            "default": "A",
            "profiles": profiles,
        }),
    }
}

/// 把扁平 `default` 键迁移为 `global_default` 并补齐空的 `defaults`，返回是否有改动。
pub fn migrate_legacy_default(document: &mut Map<String, Value>) -> bool {
    let mut changed = false;
    if let Some(legacy) = document.remove("default") {
        let has_keyed = document
            .get("global_default")
            .map(|value| !value.is_null())
            .unwrap_or(false);
        if !has_keyed {
            document.insert("global_default".to_string(), legacy);
        }
        changed = true;
    }
    if changed && !document.contains_key("defaults") {
        document.insert("defaults".to_string(), Value::Object(Map::new()));
    }
    changed
}
