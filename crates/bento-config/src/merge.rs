//! JSON-level merging used for config layering.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Deep-merge `update` into `target`. Objects merge key by key; arrays and
/// scalars replace.
pub fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, update) => {
            *target_slot = update.clone();
        }
    }
}

/// Shallow merge: top-level keys of `update` replace those of `target`.
pub fn layer_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                target_map.insert(key.clone(), value.clone());
            }
        }
        (target_slot, update) => {
            *target_slot = update.clone();
        }
    }
}

/// Deep-merge two serializable configs, `overrides` winning.
///
/// Nested objects such as `deps` or `define` are merged key by key, arrays are
/// replaced wholesale.
pub fn merge_config<T>(defaults: &T, overrides: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut base = to_value(defaults)?;
    merge_values(&mut base, &to_value(overrides)?);
    from_value(base)
}

/// Shallow-merge two serializable configs, `overrides` winning per top-level key.
pub fn layer_config<T>(base: &T, overrides: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = to_value(base)?;
    layer_values(&mut value, &to_value(overrides)?);
    from_value(value)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ConfigError::invalid("config", e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ConfigError::invalid("config", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_replaces_arrays_and_merges_objects() {
        let mut base = json!({ "a": 1, "obj": { "c": 2, "d": 3 }, "arr": [1, 2, 3] });
        merge_values(&mut base, &json!({ "obj": { "c": 42 }, "arr": [4, 5], "e": 5 }));
        assert_eq!(
            base,
            json!({ "a": 1, "obj": { "c": 42, "d": 3 }, "arr": [4, 5], "e": 5 })
        );
    }

    #[test]
    fn shallow_layer_replaces_nested_objects() {
        let mut base = json!({ "deps": { "neverBundle": ["a"] }, "outDir": "dist" });
        layer_values(&mut base, &json!({ "deps": { "alwaysBundle": ["b"] } }));
        assert_eq!(
            base,
            json!({ "deps": { "alwaysBundle": ["b"] }, "outDir": "dist" })
        );
    }
}
