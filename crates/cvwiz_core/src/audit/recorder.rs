//! Best-effort audit recorder and query facade.
//!
//! # Invariants
//! - `record` never returns an error; a failed write is logged and dropped.
//! - Snapshots and metadata are redacted before the entry is built.
//! - When both snapshots are present only the changed keys are stored.

use crate::audit::diff::calculate_diff;
use crate::audit::redact::sanitize_map;
use crate::logging::{sanitize_message, MAX_ERROR_CHARS};
use crate::model::audit::{AuditAction, AuditLogEntry, JsonMap};
use crate::model::now_epoch_ms;
use crate::repo::audit_repo::{
    AuditRepository, AuditStats, EntityAuditQuery, Pagination, RecentAuditQuery, UserAuditQuery,
};
use crate::repo::RepoResult;
use crate::request_context::RequestContext;
use log::{debug, error, info};
use uuid::Uuid;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// One completed mutation, before redaction and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub old_values: Option<JsonMap>,
    pub new_values: Option<JsonMap>,
    pub metadata: Option<JsonMap>,
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, entity_type: impl Into<String>) -> Self {
        Self {
            action,
            entity_type: entity_type.into(),
            entity_id: None,
            old_values: None,
            new_values: None,
            metadata: None,
            actor_id: None,
            ip_address: None,
            user_agent: None,
            request_id: None,
        }
    }

    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn old_values(mut self, values: JsonMap) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: JsonMap) -> Self {
        self.new_values = Some(values);
        self
    }

    pub fn metadata(mut self, metadata: JsonMap) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Copies actor and transport metadata from `ctx`.
    pub fn context(mut self, ctx: &RequestContext) -> Self {
        self.actor_id = ctx.actor_id.clone();
        self.ip_address = ctx.ip_address.clone();
        self.user_agent = ctx.user_agent.clone();
        self.request_id = Some(ctx.request_id.clone());
        self
    }

    /// Sets the actor when the context did not carry one.
    pub fn default_actor(mut self, actor_id: &str) -> Self {
        if self.actor_id.is_none() {
            self.actor_id = Some(actor_id.to_string());
        }
        self
    }

    /// Builds the diffed, redacted entry that would be persisted.
    ///
    /// The diff runs on raw values, so a changed secret keeps its key with
    /// both sides redacted.
    pub fn into_entry(self, created_at: i64) -> AuditLogEntry {
        let (old_values, new_values) = match (self.old_values, self.new_values) {
            (Some(old), Some(new)) => {
                let diff = calculate_diff(&old, &new);
                (Some(diff.old_values), Some(diff.new_values))
            }
            other => other,
        };
        let old_values = old_values.map(|values| sanitize_map(&values));
        let new_values = new_values.map(|values| sanitize_map(&values));

        AuditLogEntry {
            id: Uuid::new_v4(),
            user_id: self.actor_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            old_values,
            new_values,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            request_id: self.request_id,
            metadata: self.metadata.map(|values| sanitize_map(&values)),
            created_at,
        }
    }
}

/// Audit facade over an [`AuditRepository`].
pub struct AuditRecorder<R: AuditRepository> {
    repo: R,
}

impl<R: AuditRepository> AuditRecorder<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists one entry for `event`.
    ///
    /// Returns the stored entry, or `None` when the write failed. Failures are
    /// logged and never propagated.
    pub fn record(&self, event: AuditEvent) -> Option<AuditLogEntry> {
        let entry = event.into_entry(now_epoch_ms());
        match self.repo.insert_entry(&entry) {
            Ok(()) => {
                debug!(
                    "event=audit_record module=audit status=ok action={} entity_type={} request_id={}",
                    entry.action.as_str(),
                    entry.entity_type,
                    entry.request_id.as_deref().unwrap_or("-")
                );
                Some(entry)
            }
            Err(err) => {
                error!(
                    "event=audit_record module=audit status=error action={} entity_type={} request_id={} error_code=audit_write_failed error={}",
                    entry.action.as_str(),
                    entry.entity_type,
                    entry.request_id.as_deref().unwrap_or("-"),
                    sanitize_message(&err.to_string(), MAX_ERROR_CHARS)
                );
                None
            }
        }
    }

    /// History of one entity, newest first.
    pub fn by_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        actions: &[AuditAction],
        page: Pagination,
    ) -> RepoResult<Vec<AuditLogEntry>> {
        self.repo.list_by_entity(&EntityAuditQuery {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            actions: actions.to_vec(),
            page,
        })
    }

    /// Everything `user_id` did within `[from, to)`, newest first.
    pub fn by_user(
        &self,
        user_id: &str,
        from: Option<i64>,
        to: Option<i64>,
        page: Pagination,
    ) -> RepoResult<Vec<AuditLogEntry>> {
        self.repo.list_by_user(&UserAuditQuery {
            user_id: user_id.to_string(),
            from,
            to,
            page,
        })
    }

    pub fn recent(
        &self,
        limit: Option<u32>,
        actions: &[AuditAction],
    ) -> RepoResult<Vec<AuditLogEntry>> {
        self.repo.list_recent(&RecentAuditQuery {
            limit,
            actions: actions.to_vec(),
        })
    }

    pub fn stats(&self) -> RepoResult<AuditStats> {
        self.repo.stats()
    }

    /// Deletes entries older than `max_age_days`; returns how many.
    pub fn cleanup(&self, max_age_days: u32) -> RepoResult<usize> {
        self.cleanup_before(cutoff_for(now_epoch_ms(), max_age_days))
    }

    /// Deletes entries created before `cutoff_ms`.
    pub fn cleanup_before(&self, cutoff_ms: i64) -> RepoResult<usize> {
        let deleted = self.repo.delete_before(cutoff_ms)?;
        info!(
            "event=audit_cleanup module=audit status=ok cutoff_ms={} deleted={}",
            cutoff_ms, deleted
        );
        Ok(deleted)
    }

    /// Returns entries older than `max_age_days`, then deletes them.
    pub fn archive(&self, max_age_days: u32) -> RepoResult<Vec<AuditLogEntry>> {
        let cutoff = cutoff_for(now_epoch_ms(), max_age_days);
        let archived = self.repo.archive_before(cutoff)?;
        info!(
            "event=audit_archive module=audit status=ok max_age_days={} cutoff_ms={} archived={}",
            max_age_days,
            cutoff,
            archived.len()
        );
        Ok(archived)
    }
}

/// Epoch ms before which entries count as older than `max_age_days`.
pub fn cutoff_for(now_ms: i64, max_age_days: u32) -> i64 {
    now_ms.saturating_sub(i64::from(max_age_days).saturating_mul(MS_PER_DAY))
}
