//! Transaction error taxonomy and contention classification.

use crate::db::DbError;
use crate::repo::RepoError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Lower-cased message fragments that mark a store error as transient.
pub const CONTENTION_SIGNATURES: &[&str] = &[
    "deadlock",
    "database is locked",
    "database table is locked",
    "could not serialize access",
];

pub type TxResult<T> = Result<T, TxError>;

/// Failure of one coordinator invocation. The transaction is always rolled
/// back before this value reaches the caller.
#[derive(Debug)]
pub enum TxError {
    /// Store or repository failure raised inside the unit of work.
    Repo(RepoError),
    /// The unit of work ran past its allotted time.
    Timeout { elapsed: Duration, limit: Duration },
    /// The unit of work gave up for a reason of its own.
    Aborted(String),
}

impl TxError {
    /// Returns the underlying SQLite error, if any.
    pub fn sqlite(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::Repo(err) => err.sqlite(),
            _ => None,
        }
    }

    /// Whether the error matches a transient-contention signature.
    ///
    /// SQLite busy/locked result codes always match; any other error matches
    /// when its message contains one of [`CONTENTION_SIGNATURES`].
    pub fn is_transient_contention(&self) -> bool {
        if matches!(self, Self::Timeout { .. }) {
            return false;
        }
        if let Some(rusqlite::Error::SqliteFailure(err, _)) = self.sqlite() {
            if matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) {
                return true;
            }
        }
        let message = self.to_string().to_ascii_lowercase();
        CONTENTION_SIGNATURES
            .iter()
            .any(|signature| message.contains(signature))
    }

    /// Whether retrying the whole unit of work later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. }) || self.is_transient_contention()
    }

    pub(crate) fn is_interrupt(&self) -> bool {
        matches!(
            self.sqlite(),
            Some(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::OperationInterrupted
        )
    }

    /// Stable short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "tx_timeout",
            Self::Aborted(_) if self.is_transient_contention() => "tx_contention",
            Self::Aborted(_) => "tx_aborted",
            Self::Repo(RepoError::Validation(_)) => "tx_validation",
            Self::Repo(RepoError::NotFound { .. }) => "tx_not_found",
            Self::Repo(_) if self.is_transient_contention() => "tx_contention",
            Self::Repo(_) => "tx_persistence",
        }
    }
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Timeout { elapsed, limit } => write!(
                f,
                "transaction exceeded its timeout ({} ms > {} ms) and was rolled back",
                elapsed.as_millis(),
                limit.as_millis()
            ),
            Self::Aborted(reason) => write!(f, "transaction aborted: {reason}"),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Timeout { .. } | Self::Aborted(_) => None,
        }
    }
}

impl From<RepoError> for TxError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for TxError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for TxError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::TxError;
    use crate::repo::RepoError;
    use rusqlite::ffi;
    use std::time::Duration;

    fn sqlite_failure(code: i32, message: &str) -> TxError {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), Some(message.to_string())).into()
    }

    #[test]
    fn busy_and_locked_codes_are_transient() {
        assert!(sqlite_failure(ffi::SQLITE_BUSY, "database is locked").is_transient_contention());
        assert!(sqlite_failure(ffi::SQLITE_LOCKED, "table locked").is_transient_contention());
    }

    #[test]
    fn deadlock_message_is_transient_regardless_of_variant() {
        assert!(TxError::Aborted("Deadlock detected".to_string()).is_transient_contention());
        assert!(sqlite_failure(ffi::SQLITE_ERROR, "deadlock found").is_transient_contention());
    }

    #[test]
    fn constraint_and_validation_errors_are_permanent() {
        let constraint = sqlite_failure(ffi::SQLITE_CONSTRAINT, "UNIQUE constraint failed");
        assert!(!constraint.is_transient_contention());
        assert!(!constraint.is_retryable());
        assert_eq!(constraint.code(), "tx_persistence");

        let missing = TxError::Repo(RepoError::InvalidData("bad row".to_string()));
        assert!(!missing.is_retryable());
    }

    #[test]
    fn timeout_is_retryable_but_not_contention() {
        let timeout = TxError::Timeout {
            elapsed: Duration::from_millis(40),
            limit: Duration::from_millis(10),
        };
        assert!(!timeout.is_transient_contention());
        assert!(timeout.is_retryable());
        assert_eq!(timeout.code(), "tx_timeout");
    }
}
