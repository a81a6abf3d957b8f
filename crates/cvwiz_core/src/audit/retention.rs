//! Audit retention horizon and periodic cleanup scheduling.

use crate::audit::recorder::{cutoff_for, AuditRecorder};
use crate::repo::audit_repo::AuditRepository;
use crate::repo::RepoResult;
use log::debug;
use serde::Serialize;

pub const DEFAULT_RETENTION_DAYS: u32 = 90;
pub const MIN_RETENTION_DAYS: u32 = 30;
pub const MAX_RETENTION_DAYS: u32 = 365;

/// Minimum spacing between two cleanup runs.
const RUN_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// Retention horizon clamped to `MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    retention_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS)
    }
}

/// Outcome of one cleanup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    pub deleted: usize,
    /// Entries created before this epoch-ms instant were eligible.
    pub cutoff: i64,
    pub retention_days: u32,
}

impl RetentionPolicy {
    pub fn new(retention_days: u32) -> Self {
        Self {
            retention_days: retention_days.clamp(MIN_RETENTION_DAYS, MAX_RETENTION_DAYS),
        }
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn cutoff_ms(&self, now_ms: i64) -> i64 {
        cutoff_for(now_ms, self.retention_days)
    }

    /// Returns whether a cleanup is due; runs at most once per day.
    pub fn should_run(&self, last_run_ms: Option<i64>, now_ms: i64) -> bool {
        match last_run_ms {
            None => true,
            Some(last_run) => now_ms.saturating_sub(last_run) >= RUN_INTERVAL_MS,
        }
    }

    /// Runs cleanup through `recorder` when due.
    ///
    /// Returns `Ok(None)` when the previous run is less than a day old.
    pub fn run_if_due<R: AuditRepository>(
        &self,
        recorder: &AuditRecorder<R>,
        last_run_ms: Option<i64>,
        now_ms: i64,
    ) -> RepoResult<Option<RetentionReport>> {
        if !self.should_run(last_run_ms, now_ms) {
            debug!(
                "event=audit_retention module=audit status=skip retention_days={}",
                self.retention_days
            );
            return Ok(None);
        }

        let cutoff = self.cutoff_ms(now_ms);
        let deleted = recorder.cleanup_before(cutoff)?;
        Ok(Some(RetentionReport {
            deleted,
            cutoff,
            retention_days: self.retention_days,
        }))
    }
}
