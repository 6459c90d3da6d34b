//! barsync core: domain types and the collaborator seams the ingestion job runs against.
//!
//! This crate contains everything the orchestrator consumes but does not own:
//! - Market-data provider trait, raw error shape and the Yahoo Finance client
//! - Outcome classifier mapping raw fetch results onto outcome kinds
//! - Symbol catalogs and their JSON store
//! - Per-symbol CSV artifacts and their store
//! - Identifier rewrite rules
//! - Deterministic jitter seeds

pub mod artifact;
pub mod catalog;
pub mod data;
pub mod rewrite;
pub mod rng;

pub use artifact::{ArtifactError, ArtifactReceipt, ArtifactStore, CsvArtifactStore, Relocation};
pub use catalog::{Catalog, CatalogError, CatalogStore, JsonCatalogStore, SymbolRecord};
pub use rewrite::RewriteRule;
pub use rng::JitterSeeds;
