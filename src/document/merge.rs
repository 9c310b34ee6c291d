use serde_json::{Map, Value};

/// 将 `fragment` 按一层深度合并进 `base`。
///
/// 片段中没有的顶层键保持不变；两侧都是对象时逐个覆盖子键并保留其余子键，
/// 其他情况（包括第二层以下的对象）整体替换。
pub fn merge_fragment(base: &mut Map<String, Value>, fragment: Map<String, Value>) {
    for (key, incoming) in fragment {
        match incoming {
            Value::Object(incoming_map) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => {
                    for (sub_key, sub_value) in incoming_map {
                        existing.insert(sub_key, sub_value);
                    }
                }
                _ => {
                    base.insert(key, Value::Object(incoming_map));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}
