//! Serializable ingestion configuration (TOML).
//!
//! Every field has a default, so an empty file describes a valid run over the
//! default exchange list. Validation happens once at load time; the rest of
//! the runner trusts the values it is handed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use barsync_core::data::FetchWindow;
use barsync_core::RewriteRule;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::{BackoffPolicy, WaitWindow};

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

/// One exchange to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange code; names both the catalog and the artifact directory.
    pub code: String,

    /// Optional identifier-rewrite fallback for not-found symbols.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<RewriteRule>,
}

impl ExchangeConfig {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rewrite: None,
        }
    }

    pub fn with_rewrite(mut self, rule: RewriteRule) -> Self {
        self.rewrite = Some(rule);
        self
    }
}

/// Concurrency budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Simultaneous symbol attempts within one exchange.
    pub per_exchange: usize,
    /// Exchanges processed at the same time.
    pub across_exchanges: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            per_exchange: 5,
            across_exchanges: 2,
        }
    }
}

/// Retry budget and delay windows (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub rate_limited_wait_ms: WaitWindow,
    pub transient_wait_ms: WaitWindow,
    pub inter_symbol_delay_ms: WaitWindow,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            rate_limited_wait_ms: policy.rate_limited,
            transient_wait_ms: policy.transient,
            inter_symbol_delay_ms: WaitWindow::from_millis(500, 2_000),
        }
    }
}

impl RetryConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            rate_limited: self.rate_limited_wait_ms,
            transient: self.transient_wait_ms,
        }
    }
}

/// Top-level ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Artifact root: `{data_dir}/{EXCHANGE}/{SYMBOL}.csv`.
    pub data_dir: PathBuf,
    /// Catalog root: `{catalog_dir}/{EXCHANGE}.json`.
    pub catalog_dir: PathBuf,
    /// Calendar days of history requested, ending today.
    pub lookback_days: u32,
    /// Optional JSONL event log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
    /// Fixed seed for retry/pacing jitter (reproducible runs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_seed: Option<u64>,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub exchanges: Vec<ExchangeConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("public"),
            catalog_dir: PathBuf::from("catalogs"),
            lookback_days: 3650,
            event_log: None,
            jitter_seed: None,
            concurrency: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
            exchanges: vec![
                ExchangeConfig::new("US"),
                ExchangeConfig::new("CC").with_rewrite(RewriteRule::AppendSuffix("-USD".into())),
            ],
        }
    }
}

impl IngestConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Check every invariant the runner relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if self.concurrency.per_exchange == 0 {
            return invalid("concurrency.per_exchange must be at least 1".into());
        }
        if self.concurrency.across_exchanges == 0 {
            return invalid("concurrency.across_exchanges must be at least 1".into());
        }

        for (name, window) in [
            ("retry.rate_limited_wait_ms", self.retry.rate_limited_wait_ms),
            ("retry.transient_wait_ms", self.retry.transient_wait_ms),
            ("retry.inter_symbol_delay_ms", self.retry.inter_symbol_delay_ms),
        ] {
            if window.min > window.max {
                return invalid(format!("{name}: min {} exceeds max {}", window.min, window.max));
            }
        }
        // Retryable outcomes must always back off for a nonzero time.
        for (name, window) in [
            ("retry.rate_limited_wait_ms", self.retry.rate_limited_wait_ms),
            ("retry.transient_wait_ms", self.retry.transient_wait_ms),
        ] {
            if window.min == 0 {
                return invalid(format!("{name}: min must be greater than zero"));
            }
        }

        let mut seen = HashSet::new();
        for exchange in &self.exchanges {
            let code = exchange.code.as_str();
            if code.trim().is_empty() {
                return invalid("exchange code must not be empty".into());
            }
            if code.contains(['/', '\\']) || code == "." || code == ".." {
                return invalid(format!("exchange code '{code}' is not a valid directory name"));
            }
            if !seen.insert(code) {
                return invalid(format!("exchange '{code}' listed twice"));
            }
        }

        Ok(())
    }

    /// Restrict to the given exchange codes, in the order given.
    pub fn select_exchanges(&self, codes: &[String]) -> Result<Vec<ExchangeConfig>, ConfigError> {
        codes
            .iter()
            .map(|code| {
                self.exchanges
                    .iter()
                    .find(|e| &e.code == code)
                    .cloned()
                    .ok_or_else(|| ConfigError::Invalid(format!("unknown exchange '{code}'")))
            })
            .collect()
    }

    /// Requested date range for a run ending on `today`.
    pub fn fetch_window(&self, today: NaiveDate) -> FetchWindow {
        FetchWindow::lookback(today, self.lookback_days)
    }
}
