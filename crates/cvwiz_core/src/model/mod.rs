//! Canonical records persisted by the profile store.
//!
//! # Responsibility
//! - Define the profile entities owned by one user.
//! - Define the append-only audit log entry.
//!
//! # Invariants
//! - Every entity row carries the owning `user_id`.
//! - Dates are Unix epoch milliseconds.

pub mod audit;
pub mod profile;

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
