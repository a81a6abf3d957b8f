//! Audit log repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append audit entries and serve the audit query surface.
//! - Select and delete entries past a retention cutoff.
//!
//! # Invariants
//! - No update path exists; the schema also rejects `UPDATE` via trigger.
//! - Query results are newest first: `created_at DESC, id ASC`.
//! - Archive reads and deletes inside one transaction with the same filter.

use crate::model::audit::{AuditAction, AuditLogEntry, JsonMap};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use serde_json::Value;

pub const AUDIT_DEFAULT_LIMIT: u32 = 50;
pub const AUDIT_LIMIT_MAX: u32 = 500;

const AUDIT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    action,
    entity_type,
    entity_id,
    old_values,
    new_values,
    ip_address,
    user_agent,
    request_id,
    metadata,
    created_at
FROM audit_logs";

/// Limit/offset window for audit listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Defaults to 50 and clamps to 1..=500.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Filter for the history of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAuditQuery {
    pub entity_type: String,
    pub entity_id: String,
    /// Empty means every action.
    pub actions: Vec<AuditAction>,
    pub page: Pagination,
}

/// Filter for everything one user did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAuditQuery {
    pub user_id: String,
    /// Inclusive lower bound, epoch ms.
    pub from: Option<i64>,
    /// Exclusive upper bound, epoch ms.
    pub to: Option<i64>,
    pub page: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentAuditQuery {
    pub limit: Option<u32>,
    pub actions: Vec<AuditAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCount {
    pub action: AuditAction,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeCount {
    pub entity_type: String,
    pub count: u64,
}

/// Grouped aggregation over the whole audit table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_count: u64,
    /// Sorted by count descending, then action name.
    pub action_counts: Vec<ActionCount>,
    /// Sorted by count descending, then entity type.
    pub entity_type_counts: Vec<EntityTypeCount>,
}

pub trait AuditRepository {
    fn insert_entry(&self, entry: &AuditLogEntry) -> RepoResult<()>;
    fn list_by_entity(&self, query: &EntityAuditQuery) -> RepoResult<Vec<AuditLogEntry>>;
    fn list_by_user(&self, query: &UserAuditQuery) -> RepoResult<Vec<AuditLogEntry>>;
    fn list_recent(&self, query: &RecentAuditQuery) -> RepoResult<Vec<AuditLogEntry>>;
    fn stats(&self) -> RepoResult<AuditStats>;
    /// Deletes entries created strictly before `cutoff_ms`.
    fn delete_before(&self, cutoff_ms: i64) -> RepoResult<usize>;
    /// Returns then deletes entries created strictly before `cutoff_ms`.
    fn archive_before(&self, cutoff_ms: i64) -> RepoResult<Vec<AuditLogEntry>>;
}

pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_entries(&self, sql: &str, bind_values: Vec<SqlValue>) -> RepoResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_audit_row(row)?);
        }
        Ok(entries)
    }
}

impl AuditRepository for SqliteAuditRepository<'_> {
    fn insert_entry(&self, entry: &AuditLogEntry) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO audit_logs (
                id, user_id, action, entity_type, entity_id, old_values, new_values,
                ip_address, user_agent, request_id, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                entry.id.to_string(),
                entry.user_id.as_deref(),
                entry.action.as_str(),
                entry.entity_type.as_str(),
                entry.entity_id.as_deref(),
                encode_map(entry.old_values.as_ref())?,
                encode_map(entry.new_values.as_ref())?,
                entry.ip_address.as_deref(),
                entry.user_agent.as_deref(),
                entry.request_id.as_deref(),
                encode_map(entry.metadata.as_ref())?,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_by_entity(&self, query: &EntityAuditQuery) -> RepoResult<Vec<AuditLogEntry>> {
        let mut sql = format!("{AUDIT_SELECT_SQL} WHERE entity_type = ? AND entity_id = ?");
        let mut bind_values = vec![
            SqlValue::Text(query.entity_type.clone()),
            SqlValue::Text(query.entity_id.clone()),
        ];
        push_action_filter(&mut sql, &mut bind_values, &query.actions);
        push_order_and_page(&mut sql, &mut bind_values, query.page);
        self.query_entries(&sql, bind_values)
    }

    fn list_by_user(&self, query: &UserAuditQuery) -> RepoResult<Vec<AuditLogEntry>> {
        let mut sql = format!("{AUDIT_SELECT_SQL} WHERE user_id = ?");
        let mut bind_values = vec![SqlValue::Text(query.user_id.clone())];
        if let Some(from) = query.from {
            sql.push_str(" AND created_at >= ?");
            bind_values.push(SqlValue::Integer(from));
        }
        if let Some(to) = query.to {
            sql.push_str(" AND created_at < ?");
            bind_values.push(SqlValue::Integer(to));
        }
        push_order_and_page(&mut sql, &mut bind_values, query.page);
        self.query_entries(&sql, bind_values)
    }

    fn list_recent(&self, query: &RecentAuditQuery) -> RepoResult<Vec<AuditLogEntry>> {
        let mut sql = format!("{AUDIT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values = Vec::new();
        push_action_filter(&mut sql, &mut bind_values, &query.actions);
        push_order_and_page(
            &mut sql,
            &mut bind_values,
            Pagination {
                limit: query.limit,
                offset: 0,
            },
        );
        self.query_entries(&sql, bind_values)
    }

    fn stats(&self) -> RepoResult<AuditStats> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_logs;", [], |row| row.get(0))?;

        let mut action_counts = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT action, COUNT(*) AS count
             FROM audit_logs
             GROUP BY action
             ORDER BY count DESC, action ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let action_text: String = row.get("action")?;
            action_counts.push(ActionCount {
                action: parse_action(&action_text)?,
                count: to_count(row.get("count")?)?,
            });
        }

        let mut entity_type_counts = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, COUNT(*) AS count
             FROM audit_logs
             GROUP BY entity_type
             ORDER BY count DESC, entity_type ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            entity_type_counts.push(EntityTypeCount {
                entity_type: row.get("entity_type")?,
                count: to_count(row.get("count")?)?,
            });
        }

        Ok(AuditStats {
            total_count: to_count(total)?,
            action_counts,
            entity_type_counts,
        })
    }

    fn delete_before(&self, cutoff_ms: i64) -> RepoResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM audit_logs WHERE created_at < ?1;", [cutoff_ms])?;
        Ok(deleted)
    }

    fn archive_before(&self, cutoff_ms: i64) -> RepoResult<Vec<AuditLogEntry>> {
        // Repositories hold a shared borrow, so the checked variant is unavailable.
        let tx = self.conn.unchecked_transaction()?;
        let entries = SqliteAuditRepository::new(&tx).query_entries(
            &format!("{AUDIT_SELECT_SQL} WHERE created_at < ? ORDER BY created_at ASC, id ASC"),
            vec![SqlValue::Integer(cutoff_ms)],
        )?;
        let deleted = tx.execute("DELETE FROM audit_logs WHERE created_at < ?1;", [cutoff_ms])?;
        if deleted != entries.len() {
            return Err(RepoError::InvalidData(format!(
                "archive selected {} entries but deleted {deleted}",
                entries.len()
            )));
        }
        tx.commit()?;
        Ok(entries)
    }
}

/// Normalizes a listing limit to the audit contract.
pub fn normalize_audit_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => AUDIT_DEFAULT_LIMIT,
        Some(value) => value.min(AUDIT_LIMIT_MAX),
    }
}

fn push_action_filter(sql: &mut String, bind_values: &mut Vec<SqlValue>, actions: &[AuditAction]) {
    if actions.is_empty() {
        return;
    }
    let placeholders = vec!["?"; actions.len()].join(", ");
    sql.push_str(&format!(" AND action IN ({placeholders})"));
    bind_values.extend(
        actions
            .iter()
            .map(|action| SqlValue::Text(action.as_str().to_string())),
    );
}

fn push_order_and_page(sql: &mut String, bind_values: &mut Vec<SqlValue>, page: Pagination) {
    sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ?");
    bind_values.push(SqlValue::Integer(i64::from(normalize_audit_limit(page.limit))));
    if page.offset > 0 {
        sql.push_str(" OFFSET ?");
        bind_values.push(SqlValue::Integer(i64::from(page.offset)));
    }
}

fn encode_map(map: Option<&JsonMap>) -> RepoResult<Option<String>> {
    map.map(|value| {
        serde_json::to_string(value)
            .map_err(|err| RepoError::InvalidData(format!("cannot encode audit payload: {err}")))
    })
    .transpose()
}

fn decode_map(raw: Option<String>, column: &str) -> RepoResult<Option<JsonMap>> {
    match raw {
        None => Ok(None),
        Some(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            _ => Err(RepoError::InvalidData(format!(
                "audit_logs.{column} is not a json object"
            ))),
        },
    }
}

fn parse_action(value: &str) -> RepoResult<AuditAction> {
    AuditAction::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid audit action `{value}` in audit_logs.action"))
    })
}

fn to_count(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepoError::InvalidData(format!("negative count `{value}`")))
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<AuditLogEntry> {
    let id_text: String = row.get("id")?;
    let action_text: String = row.get("action")?;
    Ok(AuditLogEntry {
        id: parse_uuid(&id_text, "audit_logs.id")?,
        user_id: row.get("user_id")?,
        action: parse_action(&action_text)?,
        entity_type: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        old_values: decode_map(row.get("old_values")?, "old_values")?,
        new_values: decode_map(row.get("new_values")?, "new_values")?,
        ip_address: row.get("ip_address")?,
        user_agent: row.get("user_agent")?,
        request_id: row.get("request_id")?,
        metadata: decode_map(row.get("metadata")?, "metadata")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{normalize_audit_limit, AUDIT_DEFAULT_LIMIT, AUDIT_LIMIT_MAX};

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(normalize_audit_limit(None), AUDIT_DEFAULT_LIMIT);
        assert_eq!(normalize_audit_limit(Some(0)), AUDIT_DEFAULT_LIMIT);
        assert_eq!(normalize_audit_limit(Some(7)), 7);
        assert_eq!(normalize_audit_limit(Some(10_000)), AUDIT_LIMIT_MAX);
    }
}
