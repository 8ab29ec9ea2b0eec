//! Scheduler and reconciler configuration structures.

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AccountConfig, AccountId, AppResult};

/// Environment variable holding the configuration as inline JSON.
pub const CONFIG_ENV: &str = "QUOTA_SCHEDULER_CONFIG";
/// Environment variable holding a path to a JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "QUOTA_SCHEDULER_CONFIG_PATH";

/// Reconciler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds a queued decision may wait for acknowledgement before it is
    /// dropped. `None` disables expiry.
    #[serde(default)]
    pub ack_timeout_secs: Option<u64>,
}

impl ReconcilerConfig {
    /// Ack timeout as a time delta, if enabled.
    pub fn ack_timeout(&self) -> Option<chrono::TimeDelta> {
        self.ack_timeout_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::TimeDelta::try_seconds)
    }

    /// Validate reconciler settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.ack_timeout_secs == Some(0) {
            return Err("ack_timeout_secs must be greater than 0 when set".into());
        }
        if self.ack_timeout_secs.is_some() && self.ack_timeout().is_none() {
            return Err("ack_timeout_secs is out of range".into());
        }
        Ok(())
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Per-account policy. Accounts not listed have unbounded fan-out.
    #[serde(default)]
    pub accounts: HashMap<AccountId, AccountConfig>,
    /// Reconciler settings.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl SchedulerConfig {
    /// Fan-out ceiling for an account, or `None` when it is unbounded.
    pub fn max_fanout(&self, account: &AccountId) -> Option<u32> {
        self.accounts
            .get(account)
            .map(|cfg| cfg.max_fanout)
            .filter(|&limit| limit > 0)
    }

    /// Set an account's policy.
    #[must_use]
    pub fn with_account(mut self, account: impl Into<AccountId>, config: AccountConfig) -> Self {
        self.accounts.insert(account.into(), config);
        self
    }

    /// Validate account entries and reconciler settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.accounts.keys().any(|id| id.as_str().is_empty()) {
            return Err("account ids must not be empty".into());
        }
        self.reconciler
            .validate()
            .map_err(|e| format!("reconciler invalid: {e}"))
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, reading `.env` first.
    ///
    /// [`CONFIG_ENV`] takes inline JSON; otherwise [`CONFIG_PATH_ENV`] names a
    /// JSON file. With neither set the defaults apply.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or the JSON is invalid.
    pub fn from_env() -> AppResult<Self> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();

        if let Ok(inline) = std::env::var(CONFIG_ENV) {
            return Self::from_json_str(&inline)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid {CONFIG_ENV}"));
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            return Self::from_json_str(&raw)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid config file {path}"));
        }
        tracing::debug!("no scheduler configuration in environment; using defaults");
        Ok(Self::default())
    }
}
