//! Audit trail: diffing, redaction, recording, querying and retention.
//!
//! # Responsibility
//! - Turn a completed mutation into one immutable, redacted log entry.
//! - Serve entity/user/recent/stats queries over the trail.
//! - Prune or archive entries past the retention horizon.
//!
//! # Invariants
//! - Recording happens only after the business transaction committed.
//! - Recording failures are logged and swallowed; they never reach the
//!   caller of the business operation.

pub mod diff;
pub mod recorder;
pub mod redact;
pub mod retention;

pub use diff::{calculate_diff, snapshot, AuditDiff};
pub use recorder::{AuditEvent, AuditRecorder};
pub use redact::{is_sensitive_key, sanitize_for_audit, sanitize_map, REDACTED};
pub use retention::{RetentionPolicy, RetentionReport};
