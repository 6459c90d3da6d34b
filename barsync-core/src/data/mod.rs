//! Market-data access: provider seam, outcome classification, Yahoo client.

pub mod classify;
pub mod provider;
pub mod yahoo;

pub use classify::{classify, classify_error, FetchOutcome, OutcomeKind};
pub use provider::{DailyBar, DataProvider, FetchWindow, ProviderError};
pub use yahoo::YahooProvider;
