//! Core domain logic for cvwiz profile storage.
//! Atomic batch import, transactional coordination and audit recording.

pub mod audit;
pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod repo;
pub mod request_context;
pub mod sanitize;
pub mod service;
pub mod tx;

pub use audit::{AuditEvent, AuditRecorder, RetentionPolicy, RetentionReport};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use import::{BatchImporter, ImportError, ImportResult, RawProfile};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit::{AuditAction, AuditLogEntry};
pub use model::profile::SettingsPatch;
pub use repo::audit_repo::{AuditRepository, SqliteAuditRepository};
pub use repo::{RepoError, RepoResult};
pub use request_context::RequestContext;
pub use sanitize::{DefaultSanitizer, Sanitizer};
pub use service::{ProfileService, ProfileServiceError};
pub use tx::{IsolationLevel, RetryPolicy, TransactionCoordinator, TxError, TxOptions, TxResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
