//! Per-symbol artifact storage (CSV daily-bar series).
//!
//! Layout: `{data_dir}/{EXCHANGE}/{SYMBOL}.csv`
//!
//! - Header `Date,Open,High,Low,Close,Adjusted Close,Volume`
//! - Rows ascending by date, one per trading day (later duplicates win)
//! - Atomic writes (unique temp file in the exchange directory, renamed into
//!   place), so a failed write never leaves a truncated artifact behind
//! - BLAKE3 digest of the written bytes reported back in the receipt

use crate::data::DailyBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from artifact storage.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("refusing to write an empty artifact for '{symbol}'")]
    Empty { symbol: String },

    #[error("artifact encoding failed: {0}")]
    Encode(String),

    #[error("artifact I/O at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a successful write produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReceipt {
    pub path: PathBuf,
    pub rows: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub digest: String,
}

/// Outcome of moving an artifact from an old identifier to a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relocation {
    /// Old artifact renamed to the new identifier.
    Renamed,
    /// New artifact already existed; the stale old one was removed.
    Superseded,
    /// Nothing stored under the old identifier.
    Absent,
}

/// Writable store of one artifact per (exchange, symbol).
pub trait ArtifactStore: Send + Sync {
    /// Write (or replace) the artifact for a symbol.
    fn write(
        &self,
        exchange: &str,
        symbol: &str,
        bars: &[DailyBar],
    ) -> Result<ArtifactReceipt, ArtifactError>;

    fn exists(&self, exchange: &str, symbol: &str) -> bool;

    /// Move the artifact stored under `from` to `to` without refetching.
    fn relocate(&self, exchange: &str, from: &str, to: &str) -> Result<Relocation, ArtifactError>;
}

#[derive(Serialize)]
struct ArtifactRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: Option<f64>,
    #[serde(rename = "High")]
    high: Option<f64>,
    #[serde(rename = "Low")]
    low: Option<f64>,
    #[serde(rename = "Close")]
    close: Option<f64>,
    #[serde(rename = "Adjusted Close")]
    adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    volume: u64,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

impl From<&DailyBar> for ArtifactRow {
    fn from(bar: &DailyBar) -> Self {
        Self {
            date: bar.date.format("%Y-%m-%d").to_string(),
            open: finite(bar.open),
            high: finite(bar.high),
            low: finite(bar.low),
            close: finite(bar.close),
            adj_close: finite(bar.adj_close),
            volume: bar.volume,
        }
    }
}

/// CSV artifact store rooted at a data directory.
pub struct CsvArtifactStore {
    root: PathBuf,
}

impl CsvArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for one exchange: `{root}/{EXCHANGE}/`
    fn exchange_dir(&self, exchange: &str) -> PathBuf {
        self.root.join(exchange)
    }

    /// Path of the artifact for a symbol. Path separators in the symbol become `_`.
    pub fn path_for(&self, exchange: &str, symbol: &str) -> PathBuf {
        let file_stem = symbol.replace(['/', '\\'], "_");
        self.exchange_dir(exchange).join(format!("{file_stem}.csv"))
    }
}

/// Encode bars as CSV bytes, ascending by date with one row per date.
fn encode(bars: &[DailyBar]) -> Result<(Vec<u8>, usize, NaiveDate, NaiveDate), ArtifactError> {
    let by_date: BTreeMap<NaiveDate, &DailyBar> = bars.iter().map(|b| (b.date, b)).collect();

    let (Some(first), Some(last)) = (
        by_date.keys().next().copied(),
        by_date.keys().next_back().copied(),
    ) else {
        return Err(ArtifactError::Encode("no rows".into()));
    };

    let mut wtr = csv::Writer::from_writer(vec![]);
    for bar in by_date.values() {
        wtr.serialize(ArtifactRow::from(*bar))
            .map_err(|e| ArtifactError::Encode(e.to_string()))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| ArtifactError::Encode(e.to_string()))?;

    Ok((bytes, by_date.len(), first, last))
}

impl ArtifactStore for CsvArtifactStore {
    fn write(
        &self,
        exchange: &str,
        symbol: &str,
        bars: &[DailyBar],
    ) -> Result<ArtifactReceipt, ArtifactError> {
        if bars.is_empty() {
            return Err(ArtifactError::Empty {
                symbol: symbol.to_string(),
            });
        }

        let (bytes, rows, first_date, last_date) = encode(bars)?;

        let dir = self.exchange_dir(exchange);
        fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = self.path_for(exchange, symbol);
        let io_err = |source: io::Error| ArtifactError::Io {
            path: path.clone(),
            source,
        };

        // One temp file per write: two attempts may resolve to the same artifact.
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".csv.tmp")
            .tempfile_in(&dir)
            .map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        Ok(ArtifactReceipt {
            path,
            rows,
            first_date,
            last_date,
            digest: blake3::hash(&bytes).to_hex().to_string(),
        })
    }

    fn exists(&self, exchange: &str, symbol: &str) -> bool {
        self.path_for(exchange, symbol).is_file()
    }

    fn relocate(&self, exchange: &str, from: &str, to: &str) -> Result<Relocation, ArtifactError> {
        let from_path = self.path_for(exchange, from);
        if !from_path.is_file() {
            return Ok(Relocation::Absent);
        }

        let to_path = self.path_for(exchange, to);
        if to_path.is_file() {
            fs::remove_file(&from_path).map_err(|source| ArtifactError::Io {
                path: from_path.clone(),
                source,
            })?;
            return Ok(Relocation::Superseded);
        }

        fs::rename(&from_path, &to_path).map_err(|source| ArtifactError::Io {
            path: to_path.clone(),
            source,
        })?;
        Ok(Relocation::Renamed)
    }
}
