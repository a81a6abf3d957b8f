//! Operator-configurable parameters.
//!
//! Resolution order: explicit `CVWIZ_*` environment values, then compiled
//! defaults. Malformed values are rejected rather than silently ignored.

use crate::audit::retention::DEFAULT_RETENTION_DAYS;
use crate::tx::{RetryPolicy, TxOptions};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_TX_RETRIES: &str = "CVWIZ_TX_RETRIES";
pub const ENV_TX_RETRY_BASE_DELAY_MS: &str = "CVWIZ_TX_RETRY_BASE_DELAY_MS";
pub const ENV_TX_TIMEOUT_MS: &str = "CVWIZ_TX_TIMEOUT_MS";
pub const ENV_TX_MAX_WAIT_MS: &str = "CVWIZ_TX_MAX_WAIT_MS";
pub const ENV_IMPORT_TIMEOUT_MS: &str = "CVWIZ_IMPORT_TIMEOUT_MS";
pub const ENV_AUDIT_RETENTION_DAYS: &str = "CVWIZ_AUDIT_RETENTION_DAYS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for {key}; expected {expected}"),
        }
    }
}

impl Error for ConfigError {}

/// Core tuning knobs shared by the importer, services and retention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub retry: RetryPolicy,
    /// Defaults for single-entity mutations.
    pub tx: TxOptions,
    /// Options for batch imports.
    pub import_tx: TxOptions,
    /// Requested audit horizon; clamped by the retention policy.
    pub audit_retention_days: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            tx: TxOptions::default(),
            import_tx: TxOptions::extended().named("import_batch"),
            audit_retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl CoreConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, which returns the raw value for a key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(retries) = read_u64(&lookup, ENV_TX_RETRIES)? {
            config.retry.retries = u32::try_from(retries).map_err(|_| ConfigError::InvalidValue {
                key: ENV_TX_RETRIES,
                value: retries.to_string(),
                expected: "a 32-bit unsigned integer",
            })?;
        }
        if let Some(delay) = read_u64(&lookup, ENV_TX_RETRY_BASE_DELAY_MS)? {
            config.retry.base_delay = Duration::from_millis(delay);
        }
        if let Some(timeout) = read_u64(&lookup, ENV_TX_TIMEOUT_MS)? {
            config.tx.timeout = Duration::from_millis(timeout);
        }
        if let Some(max_wait) = read_u64(&lookup, ENV_TX_MAX_WAIT_MS)? {
            config.tx.max_wait = Duration::from_millis(max_wait);
            config.import_tx.max_wait = Duration::from_millis(max_wait);
        }
        if let Some(timeout) = read_u64(&lookup, ENV_IMPORT_TIMEOUT_MS)? {
            config.import_tx.timeout = Duration::from_millis(timeout);
        }
        if let Some(days) = read_u64(&lookup, ENV_AUDIT_RETENTION_DAYS)? {
            config.audit_retention_days = u32::try_from(days).unwrap_or(u32::MAX);
        }

        Ok(config)
    }
}

fn read_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            expected: "a non-negative integer",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = CoreConfig::default();
        assert_eq!(config.retry.retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(100));
        assert_eq!(config.import_tx.timeout, Duration::from_secs(30));
        assert_eq!(config.audit_retention_days, 90);
    }

    #[test]
    fn overrides_are_applied() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_TX_RETRIES, "5"),
            (ENV_TX_RETRY_BASE_DELAY_MS, " 20 "),
            (ENV_IMPORT_TIMEOUT_MS, "60000"),
            (ENV_AUDIT_RETENTION_DAYS, "120"),
        ]))
        .unwrap();
        assert_eq!(config.retry.retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(20));
        assert_eq!(config.import_tx.timeout, Duration::from_secs(60));
        assert_eq!(config.tx.timeout, Duration::from_secs(5));
        assert_eq!(config.audit_retention_days, 120);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_TX_TIMEOUT_MS, "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_TX_TIMEOUT_MS,
                ..
            }
        ));
    }
}
