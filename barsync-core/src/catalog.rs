//! Symbol catalogs: the durable, per-exchange list of symbols to ingest.
//!
//! Each exchange's catalog is stored as one JSON file holding an array of
//! records. A record is an object with a `symbol` key plus any number of
//! opaque metadata fields, which are carried through untouched. Bare strings
//! are accepted on load as records without metadata.
//!
//! Writes are atomic: write to a temp file beside the catalog, then rename
//! over the old file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// One symbol in a catalog plus its pass-through metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub symbol: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl SymbolRecord {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            metadata: Map::new(),
        }
    }

    /// Same metadata, different identifier.
    pub fn renamed(&self, symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Ordered sequence of symbol records for one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub exchange: String,
    pub records: Vec<SymbolRecord>,
}

impl Catalog {
    pub fn new(exchange: impl Into<String>, records: Vec<SymbolRecord>) -> Self {
        Self {
            exchange: exchange.into(),
            records,
        }
    }

    /// Build a metadata-free catalog from symbol names.
    pub fn from_symbols<S: AsRef<str>>(exchange: impl Into<String>, symbols: &[S]) -> Self {
        Self::new(
            exchange,
            symbols.iter().map(|s| SymbolRecord::new(s.as_ref())).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.records.iter().any(|r| r.symbol == symbol)
    }

    /// Symbols in catalog order.
    pub fn symbols(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.symbol.as_str()).collect()
    }

    /// Symbols in catalog order with repeats removed (first occurrence wins).
    pub fn unique_symbols(&self) -> Vec<&str> {
        let mut seen = HashSet::with_capacity(self.records.len());
        self.records
            .iter()
            .map(|r| r.symbol.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }
}

/// Errors from catalog storage.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no catalog for exchange '{exchange}'")]
    Missing { exchange: String },

    #[error("malformed catalog for exchange '{exchange}': {reason}")]
    Malformed { exchange: String, reason: String },

    #[error("catalog I/O for exchange '{exchange}': {source}")]
    Io {
        exchange: String,
        #[source]
        source: io::Error,
    },
}

/// Key-value-like store of catalogs, one per exchange code.
pub trait CatalogStore: Send + Sync {
    /// Read the catalog for an exchange.
    fn load(&self, exchange: &str) -> Result<Catalog, CatalogError>;

    /// Replace the stored catalog wholesale.
    fn save(&self, catalog: &Catalog) -> Result<(), CatalogError>;
}

/// On-disk catalog entry: a bare symbol or a full record.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Bare(String),
    Full(SymbolRecord),
}

/// Catalog store backed by `{root}/{EXCHANGE}.json` files.
pub struct JsonCatalogStore {
    root: PathBuf,
}

impl JsonCatalogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path to the catalog file for an exchange.
    pub fn path_for(&self, exchange: &str) -> PathBuf {
        self.root.join(format!("{exchange}.json"))
    }

    fn parse(exchange: &str, content: &str) -> Result<Catalog, CatalogError> {
        let malformed = |reason: String| CatalogError::Malformed {
            exchange: exchange.to_string(),
            reason,
        };

        let stored: Vec<StoredRecord> =
            serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;

        let records = stored
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let record = match entry {
                    StoredRecord::Bare(symbol) => SymbolRecord::new(symbol),
                    StoredRecord::Full(record) => record,
                };
                if record.symbol.trim().is_empty() {
                    Err(malformed(format!("entry {i} has an empty symbol")))
                } else {
                    Ok(record)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Catalog::new(exchange, records))
    }
}

impl CatalogStore for JsonCatalogStore {
    fn load(&self, exchange: &str) -> Result<Catalog, CatalogError> {
        let path = self.path_for(exchange);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::Missing {
                    exchange: exchange.to_string(),
                })
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    exchange: exchange.to_string(),
                    source,
                })
            }
        };
        Self::parse(exchange, &content)
    }

    fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let io_err = |source: io::Error| CatalogError::Io {
            exchange: catalog.exchange.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(&catalog.records)
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        fs::create_dir_all(&self.root).map_err(io_err)?;

        let path = self.path_for(&catalog.exchange);
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".json.tmp")
            .tempfile_in(&self.root)
            .map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        tracing::debug!(
            exchange = %catalog.exchange,
            symbols = catalog.len(),
            path = %path.display(),
            "catalog written"
        );
        Ok(())
    }
}
