//! Sensitive-value redaction for audit payloads.

use crate::model::audit::JsonMap;
use serde_json::Value;

/// Placeholder stored in place of any sensitive value.
pub const REDACTED: &str = "[REDACTED]";

/// Lower-cased name fragments; a key matches when it contains any of them.
///
/// `passwordHash`, `accessToken`, `refreshToken` and friends are covered by
/// their shorter fragments.
pub const SENSITIVE_KEY_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "apikey",
    "api_key",
    "api-key",
    "secret",
    "authorization",
    "credential",
];

pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEY_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

/// Returns a copy of `value` with every sensitive key's value redacted.
///
/// Objects nested in objects or arrays are walked; scalars pass through.
pub fn sanitize_for_audit(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_for_audit).collect()),
        other => other.clone(),
    }
}

pub fn sanitize_map(map: &JsonMap) -> JsonMap {
    map.iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                Value::String(REDACTED.to_string())
            } else {
                sanitize_for_audit(value)
            };
            (key.clone(), value)
        })
        .collect()
}
