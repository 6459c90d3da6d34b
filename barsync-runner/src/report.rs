//! Run reports: per-exchange outcomes and run totals.

use std::fmt::Write as _;
use std::path::Path;

use barsync_core::data::FetchWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attempt::{SymbolResult, SymbolStatus};
use crate::reconcile::RenameRecord;

/// Terminal status counts for one exchange (or the whole run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub success: usize,
    pub not_found: usize,
    pub failed: usize,
    pub no_data: usize,
}

impl OutcomeCounts {
    pub fn from_results(results: &[SymbolResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            counts.record(result.status);
        }
        counts
    }

    pub fn record(&mut self, status: SymbolStatus) {
        match status {
            SymbolStatus::Success => self.success += 1,
            SymbolStatus::NotFound => self.not_found += 1,
            SymbolStatus::Failed => self.failed += 1,
            SymbolStatus::NoData => self.no_data += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.not_found + self.failed + self.no_data
    }

    pub fn add(&mut self, other: &Self) {
        self.success += other.success;
        self.not_found += other.not_found;
        self.failed += other.failed;
        self.no_data += other.no_data;
    }
}

/// How an exchange's processing ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExchangeStatus {
    Completed,
    /// No catalog to process.
    Skipped { reason: String },
    /// Catalog could not be loaded, or the worker pool could not start.
    Aborted { reason: String },
    /// Stopped early; only completed symbols were reconciled.
    Cancelled,
}

impl ExchangeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped { .. } => "skipped",
            Self::Aborted { .. } => "aborted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Everything that happened to one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub exchange: String,
    pub status: ExchangeStatus,
    /// Unique symbols scheduled.
    pub symbols: usize,
    pub counts: OutcomeCounts,
    pub removed: Vec<String>,
    pub renamed: Vec<RenameRecord>,
    pub catalog_written: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_error: Option<String>,
    pub elapsed_ms: u64,
}

impl ExchangeReport {
    fn empty(exchange: &str, status: ExchangeStatus) -> Self {
        Self {
            exchange: exchange.to_string(),
            status,
            symbols: 0,
            counts: OutcomeCounts::default(),
            removed: Vec::new(),
            renamed: Vec::new(),
            catalog_written: false,
            catalog_error: None,
            elapsed_ms: 0,
        }
    }

    pub fn skipped(exchange: &str, reason: impl Into<String>) -> Self {
        Self::empty(exchange, ExchangeStatus::Skipped { reason: reason.into() })
    }

    pub fn aborted(exchange: &str, reason: impl Into<String>) -> Self {
        Self::empty(exchange, ExchangeStatus::Aborted { reason: reason.into() })
    }

    /// Report for an exchange that never started because the run was cancelled.
    pub fn cancelled(exchange: &str) -> Self {
        Self::empty(exchange, ExchangeStatus::Cancelled)
    }
}

/// Report for a whole ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub window: FetchWindow,
    /// One entry per requested exchange, in request order.
    pub exchanges: Vec<ExchangeReport>,
}

impl IngestReport {
    pub fn totals(&self) -> OutcomeCounts {
        let mut totals = OutcomeCounts::default();
        for report in &self.exchanges {
            totals.add(&report.counts);
        }
        totals
    }

    pub fn exchange(&self, code: &str) -> Option<&ExchangeReport> {
        self.exchanges.iter().find(|r| r.exchange == code)
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Fixed-width summary, one row per exchange plus a totals row.
    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<8} {:<10} {:>8} {:>8} {:>9} {:>7} {:>8} {:>8} {:>8}",
            "Exchange", "Status", "Symbols", "Success", "NotFound", "Failed", "NoData", "Removed", "Renamed"
        );
        let _ = writeln!(out, "{}", "-".repeat(82));
        for r in &self.exchanges {
            let _ = writeln!(
                out,
                "{:<8} {:<10} {:>8} {:>8} {:>9} {:>7} {:>8} {:>8} {:>8}",
                r.exchange,
                r.status.label(),
                r.symbols,
                r.counts.success,
                r.counts.not_found,
                r.counts.failed,
                r.counts.no_data,
                r.removed.len(),
                r.renamed.len(),
            );
        }
        let totals = self.totals();
        let _ = writeln!(out, "{}", "-".repeat(82));
        let _ = writeln!(
            out,
            "{:<8} {:<10} {:>8} {:>8} {:>9} {:>7} {:>8} {:>8} {:>8}",
            "TOTAL",
            "",
            self.exchanges.iter().map(|r| r.symbols).sum::<usize>(),
            totals.success,
            totals.not_found,
            totals.failed,
            totals.no_data,
            self.exchanges.iter().map(|r| r.removed.len()).sum::<usize>(),
            self.exchanges.iter().map(|r| r.renamed.len()).sum::<usize>(),
        );
        out
    }
}
