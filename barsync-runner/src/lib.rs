//! barsync runner: retry, scheduling and catalog reconciliation for the ingestion job.
//!
//! This crate builds on `barsync-core` to provide:
//! - TOML configuration with validation
//! - Backoff policy with randomized per-outcome wait windows
//! - Per-symbol fetch attempts with bounded retries and identifier rewrite
//! - Concurrency-bounded exchange runner on a private thread pool
//! - Catalog reconciliation and atomic persistence
//! - Pipeline driver, run reports and a JSONL event log

pub mod attempt;
pub mod backoff;
pub mod config;
pub mod driver;
pub mod events;
pub mod exchange;
pub mod reconcile;
pub mod report;
pub mod sleeper;

pub use attempt::{SymbolAttempt, SymbolResult, SymbolStatus};
pub use backoff::{BackoffPolicy, Decision, WaitWindow};
pub use config::{ConcurrencyConfig, ConfigError, ExchangeConfig, IngestConfig, RetryConfig};
pub use driver::{PipelineDriver, RunSettings};
pub use events::{Event, EventRecord, EventSink, JsonlEventLog};
pub use exchange::{ExchangeRun, ExchangeRunner, RunnerError};
pub use reconcile::{apply, reconcile, Applied, Reconciliation, Rename, RenameRecord};
pub use report::{ExchangeReport, ExchangeStatus, IngestReport, OutcomeCounts};
pub use sleeper::{Sleeper, ThreadSleeper};
