//! Catalog reconciliation: fold terminal symbol results back into the catalog.
//!
//! `reconcile()` is pure data comparison (no I/O, fully testable):
//! - NotFound symbols are removed
//! - Successful rewrites replace the original record in place, keeping its metadata
//! - Failed / NoData symbols are left untouched
//! - Duplicate symbols collapse to their first record
//!
//! `apply()` performs the side effects: artifact relocation for rewrites, then
//! a single wholesale catalog write, skipped when nothing changed.

use std::collections::{HashMap, HashSet};

use barsync_core::{ArtifactStore, Catalog, CatalogStore, Relocation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attempt::{SymbolResult, SymbolStatus};

/// An identifier rewrite to apply to the catalog and artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Output of `reconcile()`: the new catalog and what changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub catalog: Catalog,
    pub removed: Vec<String>,
    pub renamed: Vec<Rename>,
    pub changed: bool,
}

/// A rename after its artifact was relocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRecord {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relocation: Option<Relocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Side effects performed by `apply()`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Applied {
    pub renamed: Vec<RenameRecord>,
    pub catalog_written: bool,
    pub catalog_error: Option<String>,
}

/// Compute the reconciled catalog for a set of terminal results.
pub fn reconcile(catalog: &Catalog, results: &[SymbolResult]) -> Reconciliation {
    let not_found: HashSet<&str> = results
        .iter()
        .filter(|r| r.status == SymbolStatus::NotFound)
        .map(|r| r.catalog_symbol())
        .collect();
    let rewrites: HashMap<&str, &str> = results.iter().filter_map(|r| r.rewrite()).collect();

    let mut records = Vec::with_capacity(catalog.records.len());
    let mut seen: HashSet<String> = HashSet::with_capacity(catalog.records.len());
    let mut removed: Vec<String> = Vec::new();
    let mut renamed: Vec<Rename> = Vec::new();

    for record in &catalog.records {
        let symbol = record.symbol.as_str();

        if not_found.contains(symbol) {
            if !removed.iter().any(|s| s == symbol) {
                removed.push(symbol.to_string());
            }
            continue;
        }

        let next = match rewrites.get(symbol) {
            Some(&to) => {
                if !renamed.iter().any(|r| r.from == symbol) {
                    renamed.push(Rename {
                        from: symbol.to_string(),
                        to: to.to_string(),
                    });
                }
                record.renamed(to)
            }
            None => record.clone(),
        };

        if seen.insert(next.symbol.clone()) {
            records.push(next);
        }
    }

    let changed = records != catalog.records;
    Reconciliation {
        catalog: Catalog::new(catalog.exchange.clone(), records),
        removed,
        renamed,
        changed,
    }
}

/// Relocate artifacts for renames, then persist the catalog if it changed.
///
/// Errors are recorded, not propagated: a failed relocation or catalog write
/// must not take down the rest of the run.
pub fn apply(
    reconciliation: &Reconciliation,
    catalogs: &dyn CatalogStore,
    artifacts: &dyn ArtifactStore,
) -> Applied {
    let exchange = reconciliation.catalog.exchange.as_str();

    let renamed = reconciliation
        .renamed
        .iter()
        .map(|Rename { from, to }| match artifacts.relocate(exchange, from, to) {
            Ok(relocation) => {
                info!(exchange, from = %from, to = %to, ?relocation, "symbol renamed");
                RenameRecord {
                    from: from.clone(),
                    to: to.clone(),
                    relocation: Some(relocation),
                    error: None,
                }
            }
            Err(e) => {
                warn!(exchange, from = %from, to = %to, error = %e, "artifact relocation failed");
                RenameRecord {
                    from: from.clone(),
                    to: to.clone(),
                    relocation: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    let mut applied = Applied {
        renamed,
        ..Applied::default()
    };

    if !reconciliation.changed {
        return applied;
    }

    match catalogs.save(&reconciliation.catalog) {
        Ok(()) => {
            info!(
                exchange,
                symbols = reconciliation.catalog.len(),
                removed = reconciliation.removed.len(),
                renamed = reconciliation.renamed.len(),
                "catalog updated"
            );
            applied.catalog_written = true;
        }
        Err(e) => {
            warn!(exchange, error = %e, "catalog write failed");
            applied.catalog_error = Some(e.to_string());
        }
    }

    applied
}
