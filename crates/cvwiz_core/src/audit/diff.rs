//! Minimal before/after diffs for audit payloads.

use crate::model::audit::JsonMap;
use serde::Serialize;
use serde_json::Value;

/// Changed keys only. A key missing on one side is stored as `null` there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditDiff {
    pub old_values: JsonMap,
    pub new_values: JsonMap,
}

impl AuditDiff {
    pub fn is_empty(&self) -> bool {
        self.old_values.is_empty() && self.new_values.is_empty()
    }
}

/// Returns the keys whose values differ between `old` and `new`.
///
/// Comparison is by JSON value equality at the top level; nested objects are
/// compared whole. Unchanged keys are omitted from both sides.
pub fn calculate_diff(old: &JsonMap, new: &JsonMap) -> AuditDiff {
    let mut diff = AuditDiff::default();

    for (key, old_value) in old {
        match new.get(key) {
            Some(new_value) if new_value == old_value => {}
            Some(new_value) => {
                diff.old_values.insert(key.clone(), old_value.clone());
                diff.new_values.insert(key.clone(), new_value.clone());
            }
            None => {
                diff.old_values.insert(key.clone(), old_value.clone());
                diff.new_values.insert(key.clone(), Value::Null);
            }
        }
    }

    for (key, new_value) in new {
        if !old.contains_key(key) {
            diff.old_values.insert(key.clone(), Value::Null);
            diff.new_values.insert(key.clone(), new_value.clone());
        }
    }

    diff
}

/// Serializes an entity into a JSON object for audit snapshots.
///
/// Non-object serializations are wrapped under a `value` key.
pub fn snapshot<T: Serialize>(value: &T) -> JsonMap {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = JsonMap::new();
            map.insert("value".to_string(), other);
            map
        }
        Err(_) => JsonMap::new(),
    }
}
