//! Transaction coordinator for multi-entity units of work.
//!
//! # Responsibility
//! - Run a caller-supplied unit of work inside one SQLite transaction.
//! - Enforce a per-invocation timeout and lock wait.
//! - Retry units of work that fail on transient store contention.
//!
//! # Invariants
//! - A unit of work either commits as a whole or leaves prior state
//!   unchanged; every error path drops the transaction, which rolls back.
//! - Only errors classified by [`TxError::is_transient_contention`] are
//!   retried; timeouts and permanent errors propagate on first occurrence.
//! - The connection's busy timeout and progress handler are restored after
//!   every invocation.

mod error;

pub use error::{TxError, TxResult, CONTENTION_SIGNATURES};

use crate::db::DEFAULT_BUSY_TIMEOUT;
use log::{debug, error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::{Duration, Instant};

/// SQLite VM instructions between deadline checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// Largest busy timeout SQLite accepts.
const MAX_BUSY_WAIT: Duration = Duration::from_millis(i32::MAX as u64);

/// Requested isolation for one invocation.
///
/// SQLite serializes writers; the level picks how early the write lock is
/// taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    /// `BEGIN DEFERRED`: lock taken on first write.
    ReadCommitted,
    /// `BEGIN DEFERRED`: a read snapshot is held from the first read.
    RepeatableRead,
    /// `BEGIN IMMEDIATE`: write lock taken before the unit of work runs.
    #[default]
    Serializable,
}

impl IsolationLevel {
    fn behavior(self) -> TransactionBehavior {
        match self {
            Self::ReadCommitted | Self::RepeatableRead => TransactionBehavior::Deferred,
            Self::Serializable => TransactionBehavior::Immediate,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::ReadCommitted => "read_committed",
            Self::RepeatableRead => "repeatable_read",
            Self::Serializable => "serializable",
        }
    }
}

/// Per-invocation transaction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    /// Short label used in log events.
    pub name: &'static str,
    pub isolation: IsolationLevel,
    /// Total time allotted to the unit of work, lock wait included.
    pub timeout: Duration,
    /// How long to wait for a competing writer to release the store.
    pub max_wait: Duration,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            name: "unit_of_work",
            isolation: IsolationLevel::Serializable,
            timeout: Duration::from_secs(5),
            max_wait: Duration::from_secs(2),
        }
    }
}

impl TxOptions {
    /// Options for large batches such as profile imports.
    pub fn extended() -> Self {
        Self {
            name: "extended_unit_of_work",
            timeout: Duration::from_secs(30),
            max_wait: Duration::from_secs(10),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }
}

/// Bounded linear backoff for transient contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Values below 1 act as 1.
    pub retries: u32,
    /// Wait before attempt `n + 1` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    fn max_attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

/// Runs units of work atomically against an explicitly passed connection.
#[derive(Debug, Clone, Default)]
pub struct TransactionCoordinator {
    defaults: TxOptions,
    retry: RetryPolicy,
}

impl TransactionCoordinator {
    pub fn new(defaults: TxOptions, retry: RetryPolicy) -> Self {
        Self { defaults, retry }
    }

    pub fn defaults(&self) -> &TxOptions {
        &self.defaults
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Executes `unit` inside one transaction and commits it.
    ///
    /// `options` falls back to the coordinator defaults.
    ///
    /// # Errors
    /// - `TxError::Timeout` when the deadline passes before commit.
    /// - Whatever `unit` returns, after rollback.
    /// - Store errors from begin/commit.
    pub fn run<T, F>(
        &self,
        conn: &mut Connection,
        options: Option<&TxOptions>,
        unit: F,
    ) -> TxResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> TxResult<T>,
    {
        let options = options.unwrap_or(&self.defaults);
        let started_at = Instant::now();
        debug!(
            "event=tx_run module=tx status=start name={} isolation={} timeout_ms={}",
            options.name,
            options.isolation.as_str(),
            options.timeout.as_millis()
        );

        conn.busy_timeout(options.max_wait.min(options.timeout).min(MAX_BUSY_WAIT))?;
        // An unrepresentable deadline means the unit of work is never interrupted.
        if let Some(deadline) = started_at.checked_add(options.timeout) {
            conn.progress_handler(PROGRESS_CHECK_OPS, Some(move || Instant::now() >= deadline));
        }

        let outcome = execute(conn, options, started_at, unit);

        conn.progress_handler(0, None::<fn() -> bool>);
        if let Err(err) = conn.busy_timeout(DEFAULT_BUSY_TIMEOUT) {
            warn!(
                "event=tx_run module=tx status=warn name={} error_code=busy_timeout_restore_failed error={}",
                options.name, err
            );
        }

        let outcome = outcome.map_err(|err| {
            if err.is_interrupt() {
                TxError::Timeout {
                    elapsed: started_at.elapsed(),
                    limit: options.timeout,
                }
            } else {
                err
            }
        });

        match &outcome {
            Ok(_) => info!(
                "event=tx_run module=tx status=ok name={} duration_ms={}",
                options.name,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=tx_run module=tx status=error name={} duration_ms={} error_code={}",
                options.name,
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        outcome
    }

    /// [`run`](Self::run) with the coordinator's retry policy.
    pub fn run_with_retry<T, F>(
        &self,
        conn: &mut Connection,
        options: Option<&TxOptions>,
        unit: F,
    ) -> TxResult<T>
    where
        F: FnMut(&Transaction<'_>) -> TxResult<T>,
    {
        self.run_with_policy(conn, options, &self.retry, unit)
    }

    /// Runs `unit`, retrying on transient contention per `policy`.
    ///
    /// Attempt `n` that fails with contention waits `base_delay * n` before
    /// attempt `n + 1`. The last error is returned once attempts run out.
    pub fn run_with_policy<T, F>(
        &self,
        conn: &mut Connection,
        options: Option<&TxOptions>,
        policy: &RetryPolicy,
        mut unit: F,
    ) -> TxResult<T>
    where
        F: FnMut(&Transaction<'_>) -> TxResult<T>,
    {
        let name = options.unwrap_or(&self.defaults).name;
        let max_attempts = policy.max_attempts();
        let mut attempt = 1;
        loop {
            match self.run(conn, options, &mut unit) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient_contention() && attempt < max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        "event=tx_retry module=tx status=retry name={} attempt={} max_attempts={} delay_ms={}",
                        name,
                        attempt,
                        max_attempts,
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient_contention() {
                        error!(
                            "event=tx_retry module=tx status=error name={} attempts={} error_code=retries_exhausted",
                            name, attempt
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

fn execute<T, F>(
    conn: &mut Connection,
    options: &TxOptions,
    started_at: Instant,
    unit: F,
) -> TxResult<T>
where
    F: FnOnce(&Transaction<'_>) -> TxResult<T>,
{
    let tx = conn.transaction_with_behavior(options.isolation.behavior())?;
    let value = unit(&tx)?;

    let elapsed = started_at.elapsed();
    if elapsed > options.timeout {
        return Err(TxError::Timeout {
            elapsed,
            limit: options.timeout,
        });
    }

    tx.commit()?;
    Ok(value)
}
