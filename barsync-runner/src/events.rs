//! Event log: append-only JSONL record of symbol and exchange outcomes.
//!
//! Each line is an independent JSON object, so a partially written log stays
//! readable. Logging is best-effort: a failed write is reported through
//! `tracing` and never affects the ingestion run.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::attempt::SymbolResult;
use crate::report::ExchangeReport;

/// Receives terminal outcomes as they happen. Called from worker threads.
pub trait EventSink: Send + Sync {
    fn symbol_finished(&self, exchange: &str, result: &SymbolResult);
    fn exchange_finished(&self, report: &ExchangeReport);
}

/// Payload of one log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Symbol { result: SymbolResult },
    Exchange { report: ExchangeReport },
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: DateTime<Utc>,
    pub exchange: String,
    #[serde(flatten)]
    pub event: Event,
}

/// JSONL event log file.
pub struct JsonlEventLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Lines from concurrent workers never interleave.
    pub fn append(&self, record: &EventRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Read every record back, skipping malformed lines.
    pub fn read_all(&self) -> io::Result<Vec<EventRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<EventRecord>(&line) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn log(&self, exchange: &str, event: Event) {
        let record = EventRecord {
            ts: Utc::now(),
            exchange: exchange.to_string(),
            event,
        };
        if let Err(e) = self.append(&record) {
            warn!(path = %self.path.display(), error = %e, "event log write failed");
        }
    }
}

impl EventSink for JsonlEventLog {
    fn symbol_finished(&self, exchange: &str, result: &SymbolResult) {
        self.log(
            exchange,
            Event::Symbol {
                result: result.clone(),
            },
        );
    }

    fn exchange_finished(&self, report: &ExchangeReport) {
        self.log(
            &report.exchange,
            Event::Exchange {
                report: report.clone(),
            },
        );
    }
}
