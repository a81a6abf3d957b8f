//! Audit log entry model.
//!
//! # Invariants
//! - Entries are append-only; nothing in core updates a persisted entry.
//! - `old_values`, `new_values` and `metadata` are redacted before they are
//!   built into an entry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// JSON object payload stored in audit columns.
pub type JsonMap = Map<String, Value>;

/// State-changing action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Export,
    Import,
    View,
}

impl AuditAction {
    pub const ALL: [AuditAction; 7] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::Login,
        Self::Export,
        Self::Import,
        Self::View,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Login => "LOGIN",
            Self::Export => "EXPORT",
            Self::Import => "IMPORT",
            Self::View => "VIEW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// One immutable audit trail row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Acting user; absent for system actions.
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub old_values: Option<JsonMap>,
    pub new_values: Option<JsonMap>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub metadata: Option<JsonMap>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::AuditAction;

    #[test]
    fn action_parse_is_case_insensitive() {
        assert_eq!(AuditAction::parse("import"), Some(AuditAction::Import));
        assert_eq!(AuditAction::parse(" DELETE "), Some(AuditAction::Delete));
        assert_eq!(AuditAction::parse("PURGE"), None);
    }

    #[test]
    fn action_serializes_as_upper_case() {
        let json = serde_json::to_string(&AuditAction::Create).unwrap();
        assert_eq!(json, "\"CREATE\"");
    }
}
