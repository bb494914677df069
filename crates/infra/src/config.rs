//! Runtime configuration for the inventory services.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Pagination;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Tunables for the ledger engine and query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Total attempts per movement when the store reports a concurrent write.
    pub max_attempts: u32,
    /// Base backoff between attempts; doubles with each further attempt.
    pub retry_backoff_ms: u64,
    /// Low-stock threshold for products without their own `min_stock`.
    pub low_stock_threshold: i64,
    pub history_limit: u32,
    pub page_size: u32,
    pub max_page_size: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 10,
            low_stock_threshold: 10,
            history_limit: 50,
            page_size: 100,
            max_page_size: 1000,
        }
    }
}

impl InventoryConfig {
    /// Read `STOCKLEDGER_*` variables from the process environment; unset keys keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        read(&lookup, "STOCKLEDGER_MAX_ATTEMPTS", &mut config.max_attempts)?;
        read(&lookup, "STOCKLEDGER_RETRY_BACKOFF_MS", &mut config.retry_backoff_ms)?;
        read(&lookup, "STOCKLEDGER_LOW_STOCK_THRESHOLD", &mut config.low_stock_threshold)?;
        read(&lookup, "STOCKLEDGER_HISTORY_LIMIT", &mut config.history_limit)?;
        read(&lookup, "STOCKLEDGER_PAGE_SIZE", &mut config.page_size)?;
        read(&lookup, "STOCKLEDGER_MAX_PAGE_SIZE", &mut config.max_page_size)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String| ConfigError::Invalid {
            key: key.to_string(),
            value,
        };
        if self.max_attempts == 0 {
            return Err(invalid("STOCKLEDGER_MAX_ATTEMPTS", "0".to_string()));
        }
        if self.low_stock_threshold < 0 {
            return Err(invalid(
                "STOCKLEDGER_LOW_STOCK_THRESHOLD",
                self.low_stock_threshold.to_string(),
            ));
        }
        for (key, value) in [
            ("STOCKLEDGER_HISTORY_LIMIT", self.history_limit),
            ("STOCKLEDGER_PAGE_SIZE", self.page_size),
            ("STOCKLEDGER_MAX_PAGE_SIZE", self.max_page_size),
        ] {
            if value == 0 {
                return Err(invalid(key, value.to_string()));
            }
        }
        Ok(())
    }

    /// Delay before retrying after failed attempt number `attempt` (1-indexed).
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let pow = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(pow))
    }

    /// Pagination for a report request, with the default page size and the configured cap.
    pub fn pagination(&self, limit: Option<u32>, offset: Option<u32>) -> Pagination {
        Pagination::new(
            limit.unwrap_or(self.page_size).min(self.max_page_size),
            offset.unwrap_or(0),
        )
    }

    pub fn history_limit(&self, limit: Option<u32>) -> u32 {
        limit.unwrap_or(self.history_limit).min(self.max_page_size)
    }
}

fn read<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}
